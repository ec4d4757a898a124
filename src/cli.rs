use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser};

use crate::config::{ModelConfig, ModelVariant};
use crate::labels::LabelTable;
use crate::preprocess::{Normalization, ResizeFilter, TensorLayout};

pub const DEFAULT_PORT: u16 = 8000;

/// 16 MiB, enough for a full-resolution phone photo.
pub const DEFAULT_UPLOAD_LIMIT: usize = 16 * 1024 * 1024;

/// Model selection shared by the server and the offline tool.
#[derive(Args, Clone, Debug)]
pub struct ModelArgs {
    /// Deployment preset [server default: mobilenet-v2, offline default: ensemble]
    #[arg(long, value_enum, env = "LEAF_VARIANT")]
    pub variant: Option<ModelVariant>,

    /// ONNX model path, defaults to the preset's artefact
    #[arg(long, env = "LEAF_MODEL")]
    pub model: Option<PathBuf>,

    /// Label file, one class per line in output order
    #[arg(long, env = "LEAF_LABELS")]
    pub labels: Option<PathBuf>,

    /// Square input resolution
    #[arg(long)]
    pub input_size: Option<u32>,

    #[arg(long, value_enum)]
    pub normalization: Option<Normalization>,

    #[arg(long, value_enum)]
    pub layout: Option<TensorLayout>,

    #[arg(long, value_enum)]
    pub resize_filter: Option<ResizeFilter>,

    /// Apply softmax to the model output (for logit heads)
    #[arg(long)]
    pub softmax: bool,

    /// Run on the CUDA execution provider
    #[arg(long)]
    pub cuda: bool,

    /// ONNX Runtime intra-op threads
    #[arg(long)]
    pub intra_threads: Option<usize>,
}

impl ModelArgs {
    /// Preset first, then every explicit override on top. `default_variant`
    /// applies when `--variant` is absent.
    pub fn to_config(&self, default_variant: ModelVariant) -> Result<ModelConfig> {
        let mut config = ModelConfig::for_variant(self.variant.unwrap_or(default_variant));
        if let Some(model) = &self.model {
            config.model_path = model.clone();
        }
        if let Some(path) = &self.labels {
            config.labels = LabelTable::from_file(path)?;
        }
        if let Some(size) = self.input_size {
            config.preprocess.width = size;
            config.preprocess.height = size;
        }
        if let Some(normalization) = self.normalization {
            config.preprocess.normalization = normalization;
        }
        if let Some(layout) = self.layout {
            config.preprocess.layout = layout;
        }
        if let Some(filter) = self.resize_filter {
            config.preprocess.filter = filter;
        }
        config.apply_softmax |= self.softmax;
        Ok(config)
    }
}

#[derive(Parser, Clone, Debug)]
#[command(author, version, about = "Leaf disease classification over HTTP", long_about = None)]
pub struct ServeArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Host IP to bind to
    #[arg(long, env = "LEAF_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "LEAF_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Largest accepted request body in bytes
    #[arg(long, default_value_t = DEFAULT_UPLOAD_LIMIT)]
    pub max_upload_bytes: usize,
}

impl ServeArgs {
    pub const DEFAULT_VARIANT: ModelVariant = ModelVariant::MobileNetV2;

    pub fn variant(&self) -> ModelVariant {
        self.model.variant.unwrap_or(Self::DEFAULT_VARIANT)
    }

    pub fn model_config(&self) -> Result<ModelConfig> {
        self.model.to_config(Self::DEFAULT_VARIANT)
    }
}

#[derive(Parser, Clone, Debug)]
#[command(author, version, about = "Classify leaf images from disk", long_about = None)]
pub struct OfflineArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Image file or directory of images
    #[arg(long, default_value = "Clorosis.jpg")]
    pub source: PathBuf,
}

impl OfflineArgs {
    /// The offline script ran the ensemble artefact on raw 256x256 pixels.
    pub const DEFAULT_VARIANT: ModelVariant = ModelVariant::Ensemble;

    pub fn model_config(&self) -> Result<ModelConfig> {
        self.model.to_config(Self::DEFAULT_VARIANT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply_on_top_of_preset() {
        let args = ServeArgs::try_parse_from([
            "leaf-classifier",
            "--variant",
            "ensemble",
            "--model",
            "other.onnx",
            "--input-size",
            "300",
            "--normalization",
            "unit",
            "--layout",
            "nchw",
            "--softmax",
            "--port",
            "9000",
        ])
        .unwrap();
        let config = args.model_config().unwrap();
        assert_eq!(config.model_path, PathBuf::from("other.onnx"));
        assert_eq!(config.preprocess.tensor_shape(), [1, 3, 300, 300]);
        assert_eq!(config.preprocess.normalization, Normalization::Unit);
        assert!(config.apply_softmax);
        assert!(config.report_confidence);
        assert_eq!(args.port, 9000);
    }

    #[test]
    fn offline_defaults() {
        let args = OfflineArgs::try_parse_from(["leaf-offline"]).unwrap();
        assert_eq!(args.source, PathBuf::from("Clorosis.jpg"));
        assert_eq!(args.model.variant, None);
        assert!(!args.model.cuda);

        let config = args.model_config().unwrap();
        assert_eq!(config.model_path, PathBuf::from("models/best_ensemble_model.onnx"));
        assert_eq!(config.preprocess.tensor_shape(), [1, 256, 256, 3]);
        assert_eq!(config.preprocess.normalization, Normalization::Raw);
    }

    #[test]
    fn server_defaults_to_mobilenet_and_variant_overrides_offline_default() {
        let serve = ServeArgs::try_parse_from(["leaf-classifier"]).unwrap();
        assert_eq!(serve.variant(), ModelVariant::MobileNetV2);
        assert_eq!(serve.model_config().unwrap().preprocess.tensor_shape(), [1, 224, 224, 3]);

        let offline = OfflineArgs::try_parse_from(["leaf-offline", "--variant", "compact"]).unwrap();
        let config = offline.model_config().unwrap();
        assert_eq!(config.preprocess.tensor_shape(), [1, 128, 128, 3]);
        assert!(!config.report_confidence);
    }
}
