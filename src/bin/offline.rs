use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::warn;

use leaf_classifier::utils::collect_sources;
use leaf_classifier::{InferenceService, OfflineArgs, OnnxModel, logging};

fn main() -> Result<()> {
    logging::init();
    let args = OfflineArgs::parse();

    let config = args.model_config()?;
    let model = OnnxModel::new(args.model.cuda)
        .with_intra_threads(args.model.intra_threads)
        .load_model(&config.model_path)?;
    let service = InferenceService::new(Arc::new(model), config)
        .context("Model does not match the configuration")?;

    let sources = collect_sources(&args.source)
        .with_context(|| format!("Reading {}", args.source.display()))?;
    if sources.is_empty() {
        bail!("No images found in {}", args.source.display());
    }

    let tensors = service.processor().preprocess_files(&sources);
    let mut failures = 0;
    for (path, tensor) in sources.iter().zip(tensors) {
        let result = tensor.and_then(|t| service.predict_tensor(&t));
        match result {
            Ok(c) => {
                if sources.len() > 1 {
                    println!("{}", path.display());
                }
                println!("Predictions: {:?}", c.probabilities);
                println!("Predicted class: {}", c.class_index);
                println!("Label: {}", c.label);
                println!("Confidence: {}", c.confidence);
            }
            Err(e) => {
                failures += 1;
                warn!(kind = e.kind(), "{}: {e}", path.display());
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} images failed", sources.len());
    }
    Ok(())
}
