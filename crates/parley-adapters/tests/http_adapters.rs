//! Adapter tests against a local mock HTTP server

use futures::StreamExt;
use parley_adapters::{
    ChatProvider, ChatRequest, GeminiProvider, GenerationParams, OpenAiCompatibleProvider,
    ProviderError,
};
use parley_core::{ConversationTurn, ProviderConfig};
use reqwest::Client;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn openai(base_url: &str) -> OpenAiCompatibleProvider {
    let config = ProviderConfig::new("together", base_url)
        .with_api_key("test-api-key")
        .with_models(["test-model-turbo"]);
    OpenAiCompatibleProvider::from_config(&config, Client::new()).unwrap()
}

fn gemini(base_url: &str) -> GeminiProvider {
    let config = ProviderConfig::new("gemini", base_url)
        .with_api_key("gemini-key")
        .with_models(["gemini-1.5-flash"]);
    GeminiProvider::from_config(&config, Client::new()).unwrap()
}

fn turns() -> Vec<ConversationTurn> {
    vec![ConversationTurn::user("What superpower would you pick?")]
}

fn request(turns: &[ConversationTurn]) -> ChatRequest<'_> {
    ChatRequest {
        turns,
        system_instructions: "You are friendly.",
        params: GenerationParams::new(0.7, 256),
    }
}

#[tokio::test]
async fn test_openai_send_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-api-key"))
        .and(body_partial_json(json!({"model": "test-model-turbo", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "  Flight, obviously.  "}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let turns = turns();
    let text = openai(&server.uri()).send(&request(&turns)).await.unwrap();
    assert_eq!(text, "Flight, obviously.");
}

#[tokio::test]
async fn test_openai_status_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exhausted"))
        .mount(&server)
        .await;

    let turns = turns();
    let err = openai(&server.uri()).send(&request(&turns)).await.unwrap_err();
    assert!(matches!(err, ProviderError::RateLimited(ref m) if m.contains("quota")));
}

#[tokio::test]
async fn test_openai_blank_content_is_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "   "}}]
        })))
        .mount(&server)
        .await;

    let turns = turns();
    let err = openai(&server.uri()).send(&request(&turns)).await.unwrap_err();
    assert!(matches!(err, ProviderError::EmptyResponse));
}

#[tokio::test]
async fn test_openai_native_stream() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\", friend\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let turns = turns();
    let stream = openai(&server.uri())
        .send_stream(&request(&turns))
        .await
        .unwrap();
    let fragments: Vec<String> = stream.map(|f| f.unwrap()).collect().await;
    assert_eq!(fragments, vec!["Hello", ", friend"]);
}

#[tokio::test]
async fn test_gemini_send_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .and(query_param("key", "gemini-key"))
        .and(body_partial_json(json!({
            "contents": [{"role": "user", "parts": [{"text": "What superpower would you pick?"}]}],
            "systemInstruction": {"parts": [{"text": "You are friendly."}]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"role": "model", "parts": [
                {"text": "Teleportation, "},
                {"text": "so I'd never miss a sunset."}
            ]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let turns = turns();
    let text = gemini(&server.uri()).send(&request(&turns)).await.unwrap();
    assert_eq!(text, "Teleportation, so I'd never miss a sunset.");
}

#[tokio::test]
async fn test_gemini_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
        .mount(&server)
        .await;

    let turns = turns();
    let err = gemini(&server.uri()).send(&request(&turns)).await.unwrap_err();
    assert!(matches!(err, ProviderError::Auth(_)));
}

#[tokio::test]
async fn test_gemini_has_no_native_stream() {
    let turns = turns();
    let provider = gemini("http://127.0.0.1:9");
    let err = provider.send_stream(&request(&turns)).await.err().unwrap();
    assert!(matches!(err, ProviderError::StreamingUnsupported(_)));
}

#[tokio::test]
async fn test_connection_refused_is_unavailable() {
    let turns = turns();
    let err = openai("http://127.0.0.1:9")
        .send(&request(&turns))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), parley_adapters::ProviderErrorKind::Unavailable);
}
