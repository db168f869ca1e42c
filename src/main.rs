/// API сервер предсказания цены дома

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use house_price_ml::{
    serving::{router, AppState, PredictionService},
    storage::PredictionLog,
    ModelKind, PipelineConfig,
};

#[derive(Parser, Debug)]
#[command(name = "house-price-server", version, about = "Serve house price predictions over HTTP")]
struct Args {
    /// JSON-конфиг пайплайна
    #[arg(short, long, default_value = "config/pipeline.json")]
    config: PathBuf,

    /// Адрес вместо serving.addr из конфига
    #[arg(long)]
    addr: Option<String>,

    /// Семейство модели вместо serving.model из конфига
    #[arg(long)]
    model: Option<ModelKind>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Инициализация логирования
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = PipelineConfig::load_or_default(&args.config)
        .with_context(|| format!("failed to read config {}", args.config.display()))?;
    let serving = &config.serving;
    let kind = args.model.unwrap_or(serving.model);

    let service = PredictionService::load(&config.layout(), kind, serving.precision)
        .context("failed to load trained artifacts, run the pipeline first")?;
    let log = PredictionLog::open(&serving.database)
        .with_context(|| format!("failed to open {}", serving.database.display()))?;

    let app = router(AppState::new(service, log));

    let addr = args.addr.unwrap_or_else(|| serving.addr.clone());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
