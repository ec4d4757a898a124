use std::fmt;
use std::sync::Arc;

use image::DynamicImage;
use ndarray::Array4;
use tracing::{error, info, warn};

use crate::config::ModelConfig;
use crate::error::{ClassifyError, ClassifyResult};
use crate::labels::LabelTable;
use crate::model::Classifier;
use crate::postprocess::{Classification, classify_scores};
use crate::preprocess::Processor;

/// Decode → preprocess → classify → label, over one shared model.
pub struct InferenceService {
    model: Arc<dyn Classifier>,
    processor: Processor,
    labels: LabelTable,
    apply_softmax: bool,
    report_confidence: bool,
}

impl fmt::Debug for InferenceService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceService")
            .field("model", &"dyn Classifier")
            .field("processor", &self.processor)
            .field("labels", &self.labels)
            .finish()
    }
}

impl InferenceService {
    /// Builds the service and checks the configuration against whatever
    /// the model declares about its input and output.
    pub fn new(model: Arc<dyn Classifier>, config: ModelConfig) -> ClassifyResult<Self> {
        let expected: Vec<i64> = config
            .preprocess
            .tensor_shape()
            .iter()
            .map(|&d| d as i64)
            .collect();
        if let Some(declared) = model.input_shape() {
            let compatible = declared.len() == expected.len()
                && declared.iter().zip(&expected).all(|(&d, &e)| d < 0 || d == e);
            if !compatible {
                return Err(ClassifyError::ShapeMismatch {
                    what: "model input",
                    expected,
                    actual: declared,
                });
            }
        }
        if let Some(classes) = model.num_classes() {
            if classes != config.labels.len() {
                return Err(ClassifyError::ShapeMismatch {
                    what: "label table",
                    expected: vec![classes as i64],
                    actual: vec![config.labels.len() as i64],
                });
            }
        }

        Ok(Self {
            model,
            processor: Processor::new(config.preprocess),
            labels: config.labels,
            apply_softmax: config.apply_softmax,
            report_confidence: config.report_confidence,
        })
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    pub fn reports_confidence(&self) -> bool {
        self.report_confidence
    }

    /// Classifies an encoded image.
    #[tracing::instrument(skip_all, fields(bytes = image_bytes.len()))]
    pub fn predict(&self, image_bytes: &[u8]) -> ClassifyResult<Classification> {
        let result = self
            .processor
            .decode(image_bytes)
            .and_then(|image| self.predict_image(&image));
        match &result {
            Ok(c) => info!(label = %c.label, confidence = c.confidence, "prediction"),
            Err(e) if e.is_input_error() => warn!(kind = e.kind(), "rejected upload: {e}"),
            Err(e) => error!(kind = e.kind(), "prediction failed: {e}"),
        }
        result
    }

    pub fn predict_image(&self, image: &DynamicImage) -> ClassifyResult<Classification> {
        let tensor = self.processor.preprocess(image)?;
        self.predict_tensor(&tensor)
    }

    /// Runs an already preprocessed batch of one.
    pub fn predict_tensor(&self, tensor: &Array4<f32>) -> ClassifyResult<Classification> {
        let t = std::time::Instant::now();
        let scores = self.model.classify(tensor)?;
        tracing::debug!(elapsed = ?t.elapsed(), "model");
        classify_scores(scores, &self.labels, self.apply_softmax)
    }
}
