pub mod bundle;
pub mod encoder;
pub mod linear;
pub mod registry;

pub use bundle::{ModelBundle, ModelPrediction, MODEL_FILE};
pub use encoder::{align_features, encode_row, FeatureEncoder};
pub use linear::{LinearClassifier, LinearRegressor};
pub use registry::{ModelRegistry, MODEL_MISSING};
