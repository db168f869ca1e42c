/// CLI стадий пайплайна

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use house_price_ml::{metrics::Metric, ModelKind, Pipeline, PipelineConfig};

#[derive(Parser, Debug)]
#[command(name = "house-price-pipeline", version, about = "House price prediction pipeline stages")]
struct Cli {
    /// JSON-конфиг пайплайна
    #[arg(short, long, global = true, default_value = "config/pipeline.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Распаковать архив и сохранить raw.csv
    Ingest {
        /// Архив вместо указанного в конфиге
        #[arg(long)]
        archive: Option<PathBuf>,
    },
    /// Обработать пропущенные значения
    Clean,
    /// Разбить данные на train/test
    Split,
    /// Обучить преобразования признаков и цели
    Engineer,
    /// Обучить модель с поиском по сетке
    Train {
        #[arg(long)]
        model: Option<ModelKind>,
    },
    /// Оценить модель запуска на тестовой выборке
    Evaluate {
        #[arg(long)]
        evaluator: Option<ModelKind>,
        /// По умолчанию: последний запуск обучения этого семейства
        #[arg(long)]
        run_id: Option<String>,
        /// Список метрик через запятую: r2,mae,rmse,mse
        #[arg(long, value_delimiter = ',')]
        metrics: Vec<Metric>,
    },
    /// Все стадии подряд
    Run {
        #[arg(long)]
        model: Option<ModelKind>,
    },
}

fn main() -> anyhow::Result<()> {
    // Инициализация логирования
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = PipelineConfig::load_or_default(&cli.config)
        .with_context(|| format!("failed to read config {}", cli.config.display()))?;
    if let Command::Ingest { archive: Some(archive) } = &cli.command {
        config.archive = archive.clone();
    }
    let default_model = config.training.model;
    let pipeline = Pipeline::new(config);

    match cli.command {
        Command::Ingest { .. } => {
            let summary = pipeline.ingest()?;
            println!("{}: {} rows x {} columns", summary.source, summary.rows, summary.columns);
        }
        Command::Clean => {
            let clean = pipeline.clean()?;
            println!("clean data: {} rows x {} columns", clean.height(), clean.width());
        }
        Command::Split => {
            let split = pipeline.split()?;
            println!("train: {} rows, test: {} rows", split.x_train.height(), split.x_test.height());
        }
        Command::Engineer => {
            let arrays = pipeline.engineer()?;
            println!(
                "x_train {:?}, x_test {:?}",
                arrays.x_train.dim(),
                arrays.x_test.dim()
            );
        }
        Command::Train { model } => {
            let trained = pipeline.train(model.unwrap_or(default_model))?;
            println!("{}", trained.run_id);
        }
        Command::Evaluate {
            evaluator,
            run_id,
            metrics,
        } => {
            let kind = evaluator.unwrap_or(default_model);
            let run_id = match run_id {
                Some(run_id) => run_id,
                None => pipeline.last_run_id(kind)?,
            };
            let metrics = if metrics.is_empty() {
                pipeline.config().evaluation.metrics.clone()
            } else {
                metrics
            };
            let report = pipeline.evaluate(kind, &run_id, &metrics)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Run { model } => {
            let report = pipeline.run(model.unwrap_or(default_model))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
