use std::path::PathBuf;

use clap::ValueEnum;

use crate::labels::LabelTable;
use crate::preprocess::{Normalization, PreprocessConfig};

/// Known deployments of the leaf disease model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelVariant {
    /// Ensemble export, 256x256 raw pixels.
    Ensemble,
    /// MobileNetV2 fine-tune, 224x224 with MobileNetV2 scaling.
    #[value(name = "mobilenet-v2")]
    MobileNetV2,
    /// Small CNN, 128x128 raw pixels. Replies carry no confidence.
    Compact,
}

impl ModelVariant {
    pub fn default_model_path(self) -> PathBuf {
        let file = match self {
            Self::Ensemble => "best_ensemble_model.onnx",
            Self::MobileNetV2 => "mobilenet_v2.onnx",
            Self::Compact => "compact.onnx",
        };
        PathBuf::from("models").join(file)
    }

    pub fn preprocess(self) -> PreprocessConfig {
        match self {
            Self::Ensemble => PreprocessConfig::square(256, Normalization::Raw),
            Self::MobileNetV2 => PreprocessConfig::square(224, Normalization::MobileNetV2),
            Self::Compact => PreprocessConfig::square(128, Normalization::Raw),
        }
    }

    pub fn reports_confidence(self) -> bool {
        !matches!(self, Self::Compact)
    }
}

/// Everything the inference service needs to know about one model artefact.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub model_path: PathBuf,
    pub preprocess: PreprocessConfig,
    pub labels: LabelTable,
    /// Softmax the output before picking the class, for logit heads.
    pub apply_softmax: bool,
    pub report_confidence: bool,
}

impl ModelConfig {
    pub fn for_variant(variant: ModelVariant) -> Self {
        Self {
            model_path: variant.default_model_path(),
            preprocess: variant.preprocess(),
            labels: LabelTable::default(),
            apply_softmax: false,
            report_confidence: variant.reports_confidence(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::for_variant(ModelVariant::MobileNetV2)
    }
}
