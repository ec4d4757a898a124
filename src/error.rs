use thiserror::Error;

/// Failures of the classification pipeline.
#[derive(Error, Debug)]
pub enum ClassifyError {
    /// The bytes are not an image the decoder understands.
    #[error("Invalid image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Preprocessing error: {0}")]
    Preprocess(String),

    /// A tensor or output vector does not have the shape the model or the
    /// label table requires.
    #[error("Shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<i64>,
        actual: Vec<i64>,
    },

    #[error("Model run error: {0}")]
    Inference(String),
}

impl ClassifyError {
    /// Short stable tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::Preprocess(_) => "preprocess",
            Self::ShapeMismatch { .. } => "shape_mismatch",
            Self::Inference(_) => "inference",
        }
    }

    /// True when the caller sent something unusable, false when the
    /// service itself is misconfigured or the runtime failed.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

impl From<ort::Error> for ClassifyError {
    fn from(e: ort::Error) -> Self {
        Self::Inference(e.to_string())
    }
}

pub type ClassifyResult<T> = Result<T, ClassifyError>;
