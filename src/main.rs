use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use leaf_classifier::{InferenceService, OnnxModel, ServeArgs, logging, server};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = ServeArgs::parse();

    // Load the model once; every request shares it.
    let config = args.model_config()?;
    let model = OnnxModel::new(args.model.cuda)
        .with_intra_threads(args.model.intra_threads)
        .load_model(&config.model_path)?;
    info!(
        variant = ?args.variant(),
        input = ?config.preprocess.tensor_shape(),
        normalization = ?config.preprocess.normalization,
        "configured"
    );
    let service = InferenceService::new(Arc::new(model), config)
        .context("Model does not match the configuration")?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", args.host, args.port))?;
    server::serve(Arc::new(service), addr, args.max_upload_bytes).await
}
