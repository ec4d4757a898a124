use ndarray::Array1;
use serde::Serialize;

use crate::error::{ClassifyError, ClassifyResult};
use crate::labels::LabelTable;

/// Applies softmax to a 1D array and returns a new Array1<f32>.
pub fn softmax(slice: &Array1<f32>) -> Array1<f32> {
    let max_val = slice.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exp_vals: Array1<f32> = slice.mapv(|x| (x - max_val).exp());
    let sum_exp: f32 = exp_vals.sum();
    exp_vals.mapv(|v| v / sum_exp)
}

/// Index and value of the largest score. Ties resolve to the lowest index.
pub fn argmax_and_max(scores: &Array1<f32>) -> (usize, f32) {
    scores
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(max_idx, max_val), (i, &val)| {
            if val > max_val { (i, val) } else { (max_idx, max_val) }
        })
}

/// Outcome of one classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub class_index: usize,
    pub label: String,
    pub confidence: f32,
    /// Full probability vector, aligned with the label table.
    pub probabilities: Vec<f32>,
}

/// Turns a raw output vector into a labelled result.
pub fn classify_scores(
    scores: Array1<f32>,
    labels: &LabelTable,
    apply_softmax: bool,
) -> ClassifyResult<Classification> {
    if scores.len() != labels.len() {
        return Err(ClassifyError::ShapeMismatch {
            what: "model output",
            expected: vec![labels.len() as i64],
            actual: vec![scores.len() as i64],
        });
    }
    if scores.iter().any(|v| !v.is_finite()) {
        return Err(ClassifyError::Inference("model output contains non-finite values".into()));
    }

    let probabilities = if apply_softmax { softmax(&scores) } else { scores };
    let (class_index, confidence) = argmax_and_max(&probabilities);
    if !(0.0..=1.0).contains(&confidence) {
        return Err(ClassifyError::Inference(format!(
            "model output is not a probability vector (max {confidence}); enable softmax for logit outputs"
        )));
    }

    let label = labels
        .get(class_index)
        .ok_or_else(|| ClassifyError::Inference(format!("no label for class {class_index}")))?
        .to_string();

    Ok(Classification {
        class_index,
        label,
        confidence,
        probabilities: probabilities.to_vec(),
    })
}
