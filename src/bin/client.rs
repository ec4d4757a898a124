use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};

use leaf_classifier::logging;
use leaf_classifier::server::FILE_FIELD;

#[derive(Parser, Debug)]
#[command(author, version, about = "Send an image to a running leaf classifier", long_about = None)]
struct Args {
    /// Prediction endpoint
    #[arg(long, env = "LEAF_URL", default_value = "http://127.0.0.1:8000/predict/")]
    url: String,

    /// Image to upload
    #[arg(long, default_value = "Purpura.jpg")]
    image: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    let content = tokio::fs::read(&args.image)
        .await
        .with_context(|| format!("Reading {}", args.image.display()))?;
    let file_name = args
        .image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let form = Form::new().part(FILE_FIELD, Part::bytes(content).file_name(file_name));

    let response = Client::new()
        .post(&args.url)
        .multipart(form)
        .send()
        .await
        .context("Sending request")?;

    let status = response.status();
    let body = response.text().await?;
    if status == StatusCode::OK {
        println!("Prediction: {body}");
        Ok(())
    } else {
        bail!("{} {}", status, body);
    }
}
