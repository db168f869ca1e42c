#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use house_price_ml::config::{StackingGrid, TrainingConfig};
use house_price_ml::tracking::TrackingConfig;
use house_price_ml::PipelineConfig;

pub const HEADER: &str = "price,area,bedrooms,bathrooms,stories,mainroad,guestroom,basement,hotwaterheating,airconditioning,parking,prefarea,furnishingstatus";

const FURNISHING: [&str; 3] = ["furnished", "semi-furnished", "unfurnished"];

/// Синтетический датасет цен на дома с несколькими пропусками
pub fn housing_csv(rows: usize, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut csv = String::from(HEADER);
    csv.push('\n');

    for i in 0..rows {
        let area: f64 = rng.gen_range(1650.0..16200.0_f64).round();
        let bedrooms: u32 = rng.gen_range(1..=6);
        let bathrooms: u32 = rng.gen_range(1..=4);
        let stories: u32 = rng.gen_range(1..=4);
        let parking: u32 = rng.gen_range(0..=3);
        let flags: Vec<bool> = (0..6).map(|_| rng.gen_bool(0.5)).collect();
        let furnishing = FURNISHING[i % 3];

        let mut price = 1_000_000.0
            + 450.0 * area
            + 150_000.0 * bedrooms as f64
            + 900_000.0 * bathrooms as f64
            + 400_000.0 * stories as f64
            + 250_000.0 * parking as f64;
        for (k, flag) in flags.iter().enumerate() {
            if *flag {
                price += 200_000.0 * (k + 1) as f64;
            }
        }
        if furnishing == "furnished" {
            price += 500_000.0;
        }
        price += rng.gen_range(-300_000.0..300_000.0);

        let yes_no = |flag: bool| if flag { "yes" } else { "no" };
        // Пара пропусков для стадии очистки
        let area_cell = if i == 3 { String::new() } else { area.to_string() };
        let furnishing_cell = if i == 7 { "" } else { furnishing };

        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{}\n",
            price.round(),
            area_cell,
            bedrooms,
            bathrooms,
            stories,
            yes_no(flags[0]),
            yes_no(flags[1]),
            yes_no(flags[2]),
            yes_no(flags[3]),
            yes_no(flags[4]),
            parking,
            yes_no(flags[5]),
            furnishing_cell,
        ));
    }
    csv
}

/// Zip-архив с одним CSV-файлом
pub fn write_archive(path: &Path, entry: &str, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let file = fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file(entry, zip::write::FileOptions::default()).unwrap();
    zip.write_all(content.as_bytes()).unwrap();
    zip.finish().unwrap();
}

/// Конфиг с артефактами во временном каталоге и маленькой сеткой для стекинга
pub fn test_config(root: &Path) -> PipelineConfig {
    let archive = root.join("zip_data").join("archive.zip");
    write_archive(&archive, "Housing.csv", &housing_csv(80, 7));

    let mut config = PipelineConfig::default();
    config.data_dir = root.join("data");
    config.archive = archive;
    config.training = TrainingConfig {
        cv_folds: 3,
        stacking_grid: StackingGrid {
            rf_n_estimators: vec![5],
            gb_n_estimators: vec![5, 10],
            rf_max_depth: vec![2],
            gb_max_depth: vec![2],
        },
        ..TrainingConfig::default()
    };
    config.tracking = TrackingConfig {
        root: root.join("mlruns"),
        ..TrackingConfig::default()
    };
    config.serving.database = root.join("predictions.db");
    config
}
