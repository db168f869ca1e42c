/// Модуль предобработки данных

pub mod encoding;
pub mod feature_engineering;
pub mod missing_values;
pub mod normalization;
pub mod splitting;

pub use encoding::{CategoryDrop, OneHotEncoder, UnknownCategory};
pub use feature_engineering::{
    ColumnGroups, FeatureEngineer, FeaturePipeline, Mode, TargetPipeline, Transformer,
};
pub use missing_values::MissingValueStrategy;
pub use normalization::{PowerTransformer, RobustScaler};
pub use splitting::{SplitArtifact, TrainTestSplit};
