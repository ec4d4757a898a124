use std::path::Path;

use anyhow::{Context, Result};
use ndarray::{Array1, Array4, CowArray};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider, ExecutionProviderDispatch};
use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::value::ValueType;
use tracing::info;

use crate::error::{ClassifyError, ClassifyResult};

/// A loaded classifier: maps a preprocessed batch of one to a score vector.
///
/// Implementations are shared read-only between requests.
pub trait Classifier: Send + Sync {
    fn classify(&self, input: &Array4<f32>) -> ClassifyResult<Array1<f32>>;

    /// Declared input shape, `-1` for free dimensions. `None` when unknown.
    fn input_shape(&self) -> Option<Vec<i64>> {
        None
    }

    /// Length of the output vector when the artefact declares it.
    fn num_classes(&self) -> Option<usize> {
        None
    }
}

pub struct OnnxModel {
    provider: [ExecutionProviderDispatch; 1],
    intra_threads: Option<usize>,
}

impl OnnxModel {
    pub fn new(cuda: bool) -> Self {
        let provider = if cuda {
            [CUDAExecutionProvider::default().build().error_on_failure()]
        } else {
            [CPUExecutionProvider::default().build()]
        };
        Self {
            provider,
            intra_threads: None,
        }
    }

    pub fn with_intra_threads(mut self, threads: Option<usize>) -> Self {
        self.intra_threads = threads;
        self
    }

    pub fn load_model(&self, model_path: &Path) -> Result<OnnxClassifier> {
        let mut builder = SessionBuilder::new()?
            .with_execution_providers(self.provider.clone())?
            .with_optimization_level(GraphOptimizationLevel::Level3)?;
        if let Some(threads) = self.intra_threads {
            builder = builder.with_intra_threads(threads)?;
        }
        let session = builder
            .commit_from_file(model_path)
            .with_context(|| format!("Loading model {}", model_path.display()))?;

        let classifier = OnnxClassifier { session };
        info!(
            model = %model_path.display(),
            input = ?classifier.input_shape(),
            classes = ?classifier.num_classes(),
            "model loaded"
        );
        Ok(classifier)
    }
}

/// [`Classifier`] backed by an ONNX Runtime session.
pub struct OnnxClassifier {
    session: Session,
}

impl OnnxClassifier {
    fn tensor_dims(value_type: &ValueType) -> Option<Vec<i64>> {
        match value_type {
            ValueType::Tensor { dimensions, .. } => Some(dimensions.clone()),
            _ => None,
        }
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, input: &Array4<f32>) -> ClassifyResult<Array1<f32>> {
        let xs = CowArray::from(input.view().into_dyn());
        let ys = self.session.run(ort::inputs![xs.view()]?)?;

        let (_name, output) = ys
            .iter()
            .next()
            .ok_or_else(|| ClassifyError::Inference("model produced no outputs".into()))?;
        let scores = output.try_extract_tensor::<f32>()?;

        // Batch of one: anything but a single row is a shape problem.
        let shape: Vec<i64> = scores.shape().iter().map(|&d| d as i64).collect();
        if shape.iter().rev().skip(1).any(|&d| d != 1) {
            return Err(ClassifyError::ShapeMismatch {
                what: "model output",
                expected: vec![1, -1],
                actual: shape,
            });
        }
        Ok(scores.iter().copied().collect())
    }

    fn input_shape(&self) -> Option<Vec<i64>> {
        self.session
            .inputs
            .first()
            .and_then(|input| Self::tensor_dims(&input.input_type))
    }

    fn num_classes(&self) -> Option<usize> {
        let dims = self
            .session
            .outputs
            .first()
            .and_then(|output| Self::tensor_dims(&output.output_type))?;
        dims.last().and_then(|&d| usize::try_from(d).ok())
    }
}
