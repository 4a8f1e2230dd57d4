//! Gemini client behaviour against a mock `generateContent` endpoint.

use std::time::Duration;

use image::{Rgb, RgbImage};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lumen_ai::client::encode_png;
use lumen_ai::{AiClientConfig, AiError, GeminiClient, ImageCritic, ImageEnhancer, SurgicalEditor};

fn client_for(server: &MockServer) -> GeminiClient {
    GeminiClient::new(AiClientConfig {
        api_key: "test-key".to_string(),
        base_url: server.uri(),
        enhance_model: "image-model".to_string(),
        critique_model: "text-model".to_string(),
        edit_model: "edit-model".to_string(),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn frame() -> RgbImage {
    RgbImage::from_fn(8, 6, |x, y| Rgb([x as u8 * 30, y as u8 * 40, 100]))
}

fn text_response(text: &str) -> Value {
    json!({"candidates": [{"content": {"parts": [{"text": text}]}, "finishReason": "STOP"}]})
}

fn image_response(image: &RgbImage) -> Value {
    json!({"candidates": [{"content": {"parts": [
        {"text": "Here is the edited image."},
        {"inlineData": {"mimeType": "image/png", "data": encode_png(image).unwrap()}}
    ]}}]})
}

#[tokio::test]
async fn critique_is_coerced_from_fenced_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/text-model:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response(
            "```json\n{\"score\": \"7/10\", \"problems\": [{\"description\": \"blurry sign\", \"region\": \"top left\", \"type\": \"local\"}]}\n```",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let critique = client_for(&server).critique(&frame()).await.unwrap();
    assert!((critique.score - 7.0).abs() < 1e-9);
    assert_eq!(critique.issues.len(), 1);
    assert!(critique.issues[0].is_surgical());
    assert_eq!(critique.issues[0].region, "top left");
}

#[tokio::test]
async fn enhance_sends_inline_png_and_decodes_result() {
    let server = MockServer::start().await;
    let edited = RgbImage::from_pixel(8, 6, Rgb([200, 150, 90]));
    Mock::given(method("POST"))
        .and(path("/models/image-model:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_response(&edited)))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server)
        .enhance(&frame(), "make it cinematic")
        .await
        .unwrap();
    assert_eq!(result, edited);

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let parts = &body["contents"][0]["parts"];
    assert!(parts[0]["text"]
        .as_str()
        .unwrap()
        .starts_with("make it cinematic"));
    assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
    assert_eq!(body["generationConfig"]["responseModalities"][1], "IMAGE");
}

#[tokio::test]
async fn surgical_edit_uses_edit_model_and_region() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/edit-model:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_response(&frame())))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .edit(&frame(), "the left hand", "fix the fingers")
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("the left hand"));
}

#[tokio::test]
async fn server_errors_are_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let err = client_for(&server).critique(&frame()).await.unwrap_err();
    assert!(matches!(err, AiError::ServiceUnavailable(_)));
    assert!(err.is_retryable());
    assert!(!err.is_malformed());
}

#[tokio::test]
async fn rate_limit_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .enhance(&frame(), "enhance")
        .await
        .unwrap_err();
    assert!(matches!(err, AiError::RateLimited(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .enhance(&frame(), "enhance")
        .await
        .unwrap_err();
    assert!(matches!(err, AiError::Http { status: 400, .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn text_only_image_response_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("I cannot do that")))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .enhance(&frame(), "enhance")
        .await
        .unwrap_err();
    assert!(err.is_malformed());
}

#[tokio::test]
async fn unparseable_critique_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("looks great!")))
        .mount(&server)
        .await;

    let err = client_for(&server).critique(&frame()).await.unwrap_err();
    assert!(err.is_malformed());
    assert!(err.is_retryable());
}

#[tokio::test]
async fn blocked_prompt_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"promptFeedback": {"blockReason": "SAFETY"}})),
        )
        .mount(&server)
        .await;

    let err = client_for(&server).critique(&frame()).await.unwrap_err();
    assert!(err.is_malformed());
    assert!(err.to_string().contains("SAFETY"));
}
