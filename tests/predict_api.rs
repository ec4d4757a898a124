use std::io::Cursor;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use ndarray::{Array1, Array4, array};
use serde_json::Value;
use tower::ServiceExt;

use leaf_classifier::{
    ClassifyError, ClassifyResult, Classifier, HEALTHY_LABEL, InferenceService, ModelConfig,
    ModelVariant, router,
};

const BOUNDARY: &str = "leaf-test-boundary";

/// Healthy when the mean green channel dominates the red one.
struct LeafColourModel;

impl Classifier for LeafColourModel {
    fn classify(&self, input: &Array4<f32>) -> ClassifyResult<Array1<f32>> {
        let mut sums = [0.0f32; 3];
        for ((_, _, _, c), v) in input.indexed_iter() {
            sums[c] += v;
        }
        Ok(if sums[1] > sums[0] {
            array![0.02, 0.03, 0.9, 0.03, 0.02]
        } else {
            array![0.1, 0.1, 0.1, 0.1, 0.6]
        })
    }
}

struct BrokenModel;

impl Classifier for BrokenModel {
    fn classify(&self, _: &Array4<f32>) -> ClassifyResult<Array1<f32>> {
        Err(ClassifyError::Inference("backend unavailable".into()))
    }
}

fn app(model: impl Classifier + 'static, variant: ModelVariant) -> Router {
    let service = InferenceService::new(Arc::new(model), ModelConfig::for_variant(variant)).unwrap();
    router(Arc::new(service), 1024 * 1024)
}

fn encode(image: DynamicImage, format: image::ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

fn healthy_leaf() -> Vec<u8> {
    encode(
        DynamicImage::ImageRgb8(RgbImage::from_fn(512, 384, |x, y| {
            Rgb([40 + (x % 20) as u8, 150 + (y % 40) as u8, 50])
        })),
        image::ImageFormat::Png,
    )
}

fn multipart(field: &str, filename: Option<&str>, content: &[u8]) -> Request<Body> {
    let disposition = match filename {
        Some(name) => format!("form-data; name=\"{field}\"; filename=\"{name}\""),
        None => format!("form-data; name=\"{field}\""),
    };
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: {disposition}\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/predict/")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn healthy_leaf_is_recognised() {
    let app = app(LeafColourModel, ModelVariant::MobileNetV2);
    let (status, json) = send(app, multipart("file", Some("hoja.png"), &healthy_leaf())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["prediction"], HEALTHY_LABEL);
    assert!(json["confidence"].as_f64().unwrap() > 0.5);
}

#[tokio::test]
async fn jpeg_and_grayscale_uploads_are_accepted() {
    let jpeg = encode(
        DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 300, Rgb([180, 60, 40]))),
        image::ImageFormat::Jpeg,
    );
    let (status, json) = send(app(LeafColourModel, ModelVariant::Ensemble), multipart("file", Some("roya.jpg"), &jpeg)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["prediction"], "Roya purpura");

    let gray = encode(
        DynamicImage::ImageLuma8(GrayImage::from_pixel(64, 64, Luma([120]))),
        image::ImageFormat::Png,
    );
    let (status, _) = send(app(LeafColourModel, ModelVariant::Ensemble), multipart("file", Some("gris.png"), &gray)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn compact_variant_omits_confidence() {
    let app = app(LeafColourModel, ModelVariant::Compact);
    let (status, json) = send(app, multipart("file", Some("hoja.png"), &healthy_leaf())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["prediction"], HEALTHY_LABEL);
    assert!(json.get("confidence").is_none());
}

#[tokio::test]
async fn any_named_file_field_is_used() {
    let app = app(LeafColourModel, ModelVariant::MobileNetV2);
    let (status, json) = send(app, multipart("upload", Some("hoja.png"), &healthy_leaf())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["prediction"], HEALTHY_LABEL);
}

#[tokio::test]
async fn text_posing_as_image_is_a_bad_request() {
    let app = app(LeafColourModel, ModelVariant::MobileNetV2);
    let (status, json) = send(app, multipart("file", Some("leaf.jpg"), b"just some text")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let detail = json["detail"].as_str().unwrap();
    assert!(detail.starts_with("Error processing image: Invalid image"), "{detail}");
}

#[tokio::test]
async fn upload_without_file_is_a_bad_request() {
    let app = app(LeafColourModel, ModelVariant::MobileNetV2);
    let (status, json) = send(app, multipart("comment", None, b"no image here")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["detail"].as_str().unwrap().contains("no file field"));
}

#[tokio::test]
async fn model_failures_surface_as_bad_request() {
    let app = app(BrokenModel, ModelVariant::MobileNetV2);
    let (status, json) = send(app, multipart("file", Some("hoja.png"), &healthy_leaf())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["detail"].as_str().unwrap().contains("backend unavailable"));
}

#[tokio::test]
async fn root_answers_with_banner() {
    let app = app(LeafColourModel, ModelVariant::MobileNetV2);
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"leaf disease classifier\n");
}

#[tokio::test]
async fn non_multipart_body_gets_json_detail() {
    let app = app(LeafColourModel, ModelVariant::MobileNetV2);
    let request = Request::builder()
        .method("POST")
        .uri("/predict/")
        .header("content-type", "image/png")
        .body(Body::from("abc"))
        .unwrap();
    let (status, json) = send(app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let detail = json["detail"].as_str().unwrap();
    assert!(detail.starts_with("Error processing image: "), "{detail}");
}

#[tokio::test]
async fn oversized_upload_is_rejected_with_size_detail() {
    let service =
        InferenceService::new(Arc::new(LeafColourModel), ModelConfig::for_variant(ModelVariant::MobileNetV2))
            .unwrap();
    let app = router(Arc::new(service), 64);
    let (status, json) = send(app, multipart("file", Some("big.png"), &[7u8; 4096])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let detail = json["detail"].as_str().unwrap();
    assert_eq!(detail, "Error processing image: upload exceeds the size limit");
}
