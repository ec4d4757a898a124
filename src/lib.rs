pub mod cli;
pub mod config;
pub mod error;
pub mod labels;
pub mod logging;
pub mod model;
pub mod postprocess;
pub mod preprocess;
pub mod server;
pub mod service;
pub mod utils;

pub use crate::cli::{ModelArgs, OfflineArgs, ServeArgs};
pub use crate::config::{ModelConfig, ModelVariant};
pub use crate::error::{ClassifyError, ClassifyResult};
pub use crate::labels::{HEALTHY_LABEL, LEAF_DISEASE_LABELS, LabelTable};
pub use crate::model::{Classifier, OnnxClassifier, OnnxModel};
pub use crate::postprocess::{Classification, argmax_and_max, classify_scores, softmax};
pub use crate::preprocess::{Normalization, PreprocessConfig, Processor, ResizeFilter, TensorLayout};
pub use crate::server::{PredictResponse, router};
pub use crate::service::InferenceService;
