//! Разбиение на обучающую и тестовую выборки

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::{ArtifactLayout, SplitConfig};
use crate::error::{PipelineError, Result};
use crate::table::Table;

/// Четыре согласованные по строкам части: признаки/цель × train/test
#[derive(Debug, Clone, PartialEq)]
pub struct SplitArtifact {
    pub x_train: Table,
    pub x_test: Table,
    pub y_train: Table,
    pub y_test: Table,
}

impl SplitArtifact {
    pub const PARTS: [&'static str; 4] = ["x_train", "x_test", "y_train", "y_test"];

    fn parts(&self) -> [&Table; 4] {
        [&self.x_train, &self.x_test, &self.y_train, &self.y_test]
    }

    pub fn save(&self, layout: &ArtifactLayout) -> Result<()> {
        for (name, table) in Self::PARTS.iter().zip(self.parts()) {
            table.write_csv(layout.split_csv(name))?;
        }
        Ok(())
    }

    pub fn load(layout: &ArtifactLayout) -> Result<Self> {
        Ok(Self {
            x_train: Table::read_csv(layout.split_csv("x_train"))?,
            x_test: Table::read_csv(layout.split_csv("x_test"))?,
            y_train: Table::read_csv(layout.split_csv("y_train"))?,
            y_test: Table::read_csv(layout.split_csv("y_test"))?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    test_size: f64,
    seed: u64,
    shuffle: bool,
    target: String,
}

impl TrainTestSplit {
    pub fn new(test_size: f64, seed: u64, target: impl Into<String>) -> Self {
        Self {
            test_size,
            seed,
            shuffle: true,
            target: target.into(),
        }
    }

    pub fn from_config(config: &SplitConfig, target: impl Into<String>) -> Self {
        Self::new(config.test_size, config.seed, target).with_shuffle(config.shuffle)
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Размеры (train, test): n_test = ceil(test_size * n)
    fn sizes(&self, n_samples: usize) -> Result<(usize, usize)> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(PipelineError::InvalidRatio(self.test_size));
        }
        let n_test = (self.test_size * n_samples as f64).ceil() as usize;
        let n_train = n_samples.saturating_sub(n_test);
        if n_test == 0 || n_train == 0 {
            return Err(PipelineError::InvalidRatio(self.test_size));
        }
        Ok((n_train, n_test))
    }

    pub fn split(&self, table: &Table) -> Result<SplitArtifact> {
        let y = table.select(&[self.target.as_str()])?;
        let x = table.drop_column(&self.target)?;

        let (n_train, n_test) = self.sizes(table.height())?;

        let (train_idx, test_idx): (Vec<usize>, Vec<usize>) = if self.shuffle {
            let mut indices: Vec<usize> = (0..table.height()).collect();
            let mut rng = StdRng::seed_from_u64(self.seed);
            indices.shuffle(&mut rng);
            let test = indices[..n_test].to_vec();
            let train = indices[n_test..].to_vec();
            (train, test)
        } else {
            ((0..n_train).collect(), (n_train..n_train + n_test).collect())
        };

        tracing::info!(
            "Split {} rows into {} train / {} test (seed {}, shuffle {})",
            table.height(),
            train_idx.len(),
            test_idx.len(),
            self.seed,
            self.shuffle
        );

        Ok(SplitArtifact {
            x_train: x.take(&train_idx)?,
            x_test: x.take(&test_idx)?,
            y_train: y.take(&train_idx)?,
            y_test: y.take(&test_idx)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{NamedFrom, Series};
    use proptest::prelude::*;

    fn numbered(n: usize) -> Table {
        let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let c: Vec<String> = (0..n).map(|i| format!("c{}", i % 3)).collect();
        let price: Vec<f64> = (0..n).map(|i| 100.0 * i as f64).collect();
        Table::new(vec![
            Series::new("x", x),
            Series::new("c", c),
            Series::new("price", price),
        ])
        .unwrap()
    }

    #[test]
    fn test_split_sizes_and_columns() {
        let parts = TrainTestSplit::new(0.2, 42, "price").split(&numbered(11)).unwrap();
        assert_eq!(parts.x_train.shape(), (8, 2));
        assert_eq!(parts.x_test.shape(), (3, 2));
        assert_eq!(parts.y_train.column_names(), vec!["price"]);
        assert_eq!(parts.y_test.height(), 3);
        assert_eq!(parts.x_train.column_names(), parts.x_test.column_names());
    }

    #[test]
    fn test_split_keeps_rows_aligned() {
        let parts = TrainTestSplit::new(0.3, 7, "price").split(&numbered(20)).unwrap();
        let x = parts.x_train.numeric_values("x").unwrap();
        let y = parts.y_train.numeric_values("price").unwrap();
        for (xi, yi) in x.iter().zip(&y) {
            assert_eq!(xi * 100.0, *yi);
        }
    }

    #[test]
    fn test_split_without_shuffle_preserves_order() {
        let parts = TrainTestSplit::new(0.25, 1, "price")
            .with_shuffle(false)
            .split(&numbered(8))
            .unwrap();
        assert_eq!(
            parts.x_train.numeric_values("x").unwrap(),
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]
        );
        assert_eq!(parts.x_test.numeric_values("x").unwrap(), vec![6.0, 7.0]);
    }

    #[test]
    fn test_split_errors() {
        assert!(matches!(
            TrainTestSplit::new(0.2, 42, "medv").split(&numbered(10)),
            Err(PipelineError::ColumnNotFound(name)) if name == "medv"
        ));
        assert!(matches!(
            TrainTestSplit::new(1.0, 42, "price").split(&numbered(10)),
            Err(PipelineError::InvalidRatio(_))
        ));
        assert!(matches!(
            TrainTestSplit::new(0.0, 42, "price").split(&numbered(10)),
            Err(PipelineError::InvalidRatio(_))
        ));
        assert!(matches!(
            TrainTestSplit::new(0.5, 42, "price").split(&numbered(1)),
            Err(PipelineError::InvalidRatio(_))
        ));
    }

    #[test]
    fn test_split_roundtrips_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let parts = TrainTestSplit::new(0.2, 42, "price").split(&numbered(15)).unwrap();
        parts.save(&layout).unwrap();
        assert_eq!(SplitArtifact::load(&layout).unwrap(), parts);
    }

    proptest! {
        #[test]
        fn prop_split_is_deterministic(ratio in 0.05f64..0.95, seed in any::<u64>(), shuffle in any::<bool>()) {
            let table = numbered(40);
            let splitter = TrainTestSplit::new(ratio, seed, "price").with_shuffle(shuffle);
            let first = splitter.split(&table).unwrap();
            let second = splitter.split(&table).unwrap();

            let mut a = Vec::new();
            let mut b = Vec::new();
            for (left, right) in first.parts().iter().zip(second.parts()) {
                left.to_csv_writer(&mut a).unwrap();
                right.to_csv_writer(&mut b).unwrap();
            }
            prop_assert_eq!(a, b);
            prop_assert_eq!(first.x_train.height() + first.x_test.height(), 40);
        }
    }
}
