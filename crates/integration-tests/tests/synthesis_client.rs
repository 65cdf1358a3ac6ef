//! Integration tests for `GeminiSynthesizer` and the try-on flow around it.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use luxe_core::{Category, Price, Product, ProductId};
use luxe_storefront::tryon::{
    Completion, GeminiSynthesizer, ImagePayload, ImageSource, ImageSynthesizer, SynthesisError,
    SynthesisRequest, TryOnDialog, TryOnPhase,
};
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "gemini-2.5-flash-image";
const GENERATE_PATH: &str = "/v1beta/models/gemini-2.5-flash-image:generateContent";

fn synthesizer(server: &MockServer) -> GeminiSynthesizer {
    GeminiSynthesizer::with_api_base(
        &SecretString::from("AIzaSyD4kq9Zr8Xw2Vt7Lm3Np6Qb"),
        MODEL,
        &server.uri(),
    )
    .unwrap()
}

fn shopper_photo() -> ImagePayload {
    ImagePayload::from_bytes("image/jpeg", b"shopper").unwrap()
}

async fn mount_garment(server: &MockServer, expected_fetches: u64) {
    Mock::given(method("GET"))
        .and(path("/garment.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(b"garment".to_vec()),
        )
        .expect(expected_fetches)
        .mount(server)
        .await;
}

fn request(server: &MockServer) -> SynthesisRequest {
    SynthesisRequest {
        user_image: ImageSource::Inline(shopper_photo()),
        garment_image: ImageSource::Remote(format!("{}/garment.jpg", server.uri())),
        instruction: "Dress the person in the gown.".to_string(),
    }
}

fn image_reply() -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {
                "parts": [
                    {"text": "Here is the look."},
                    {"inlineData": {"mimeType": "image/png", "data": "bG9vaw=="}}
                ]
            }
        }]
    })
}

#[tokio::test]
async fn test_synthesize_sends_three_parts_and_returns_image() {
    let server = MockServer::start().await;
    mount_garment(&server, 1).await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "AIzaSyD4kq9Zr8Xw2Vt7Lm3Np6Qb"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_reply()))
        .expect(1)
        .mount(&server)
        .await;

    let image = synthesizer(&server)
        .synthesize(&request(&server))
        .await
        .unwrap();
    assert_eq!(image.mime_type, "image/png");
    assert_eq!(image.data, "bG9vaw==");

    let received = server.received_requests().await.unwrap();
    let generate = received
        .iter()
        .find(|r| r.url.path() == GENERATE_PATH)
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&generate.body).unwrap();
    let parts = body["contents"][0]["parts"].as_array().unwrap();

    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0]["inlineData"]["data"], json!("c2hvcHBlcg=="));
    assert_eq!(parts[1]["text"], json!("Dress the person in the gown."));
    assert_eq!(parts[2]["inlineData"]["data"], json!("Z2FybWVudA=="));
    assert_eq!(parts[2]["inlineData"]["mimeType"], json!("image/jpeg"));
}

#[tokio::test]
async fn test_api_key_only_reaches_generate_endpoint() {
    let api = MockServer::start().await;
    let images = MockServer::start().await;
    mount_garment(&images, 1).await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_reply()))
        .expect(1)
        .mount(&api)
        .await;

    let image = synthesizer(&api)
        .synthesize(&request(&images))
        .await
        .unwrap();
    assert_eq!(image.data, "bG9vaw==");

    let downloads = images.received_requests().await.unwrap();
    assert_eq!(downloads.len(), 1);
    assert!(downloads[0].headers.get("x-goog-api-key").is_none());

    let calls = api.received_requests().await.unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].headers.get("x-goog-api-key").unwrap(),
        "AIzaSyD4kq9Zr8Xw2Vt7Lm3Np6Qb"
    );
}

#[tokio::test]
async fn test_reference_image_is_cached() {
    let server = MockServer::start().await;
    mount_garment(&server, 1).await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_reply()))
        .expect(2)
        .mount(&server)
        .await;

    let client = synthesizer(&server);
    client.synthesize(&request(&server)).await.unwrap();
    client.synthesize(&request(&server)).await.unwrap();
}

#[tokio::test]
async fn test_api_error_is_reported() {
    let server = MockServer::start().await;
    mount_garment(&server, 1).await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = synthesizer(&server).synthesize(&request(&server)).await;
    match result {
        Err(SynthesisError::Api { status, message }) => {
            assert_eq!(status, 429);
            assert_eq!(message, "Resource has been exhausted");
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_reply_without_image() {
    let server = MockServer::start().await;
    mount_garment(&server, 1).await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "I can't do that."}]}}]
        })))
        .mount(&server)
        .await;

    let result = synthesizer(&server).synthesize(&request(&server)).await;
    assert!(matches!(result, Err(SynthesisError::NoImage)));
}

#[tokio::test]
async fn test_missing_reference_image() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/garment.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_reply()))
        .expect(0)
        .mount(&server)
        .await;

    let result = synthesizer(&server).synthesize(&request(&server)).await;
    assert!(matches!(result, Err(SynthesisError::ImageFetch { .. })));
}

#[tokio::test]
async fn test_dialog_flow_against_mock() {
    let server = MockServer::start().await;
    mount_garment(&server, 1).await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_reply()))
        .mount(&server)
        .await;

    let product = Arc::new(Product {
        id: ProductId::new("silk-evening-gown"),
        name: "Silk Evening Gown".to_string(),
        category: Category::Clothing,
        price: Price::from_units(2450),
        description: String::new(),
        images: vec![format!("{}/garment.jpg", server.uri())],
        details: vec!["100% silk".to_string()],
        is_new: None,
    });

    let client = synthesizer(&server);
    let mut dialog = TryOnDialog::new();
    dialog.open(product).submit_upload(shopper_photo()).unwrap();

    assert_eq!(dialog.run(&client).await.unwrap(), Completion::Applied);
    let session = dialog.session().unwrap();
    assert_eq!(session.phase(), TryOnPhase::Failed);
    assert_eq!(
        session.status_text(),
        Some("Error in processing. Please try again.")
    );

    dialog.run(&client).await.unwrap();
    assert_eq!(dialog.session().unwrap().phase(), TryOnPhase::Result);
}
