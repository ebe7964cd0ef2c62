use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lernsession::config::GatewayConfig;
use lernsession::error::GatewayError;
use lernsession::gateway::{GenerationTask, HttpQuestionGateway, QuestionGateway};
use lernsession::model::{Difficulty, ModuleId, SessionModule};

fn config(base_url: String) -> GatewayConfig {
    GatewayConfig {
        api_key: "test_key".to_string(),
        base_url,
        timeout_ms: 5000,
    }
}

fn task() -> GenerationTask {
    GenerationTask {
        module_id: ModuleId::MultipleChoice,
        session_module: SessionModule::Reading,
        difficulty: Difficulty::Intermediate,
        question_count: 2,
        prompt_overrides: None,
        source_overrides: None,
        scoring_overrides: None,
    }
}

#[tokio::test]
async fn generate_parses_a_successful_batch() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/modules/multiple_choice/generate"))
        .and(header("Authorization", "Bearer test_key"))
        .and(body_partial_json(json!({ "questionCount": 2 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "questions": [
                { "prompt": "Frage 1", "correctOptionId": "b" },
                { "prompt": "Frage 2", "correctOptionId": "a" }
            ],
            "usage": [
                { "modelId": "gen-v2", "inputTokens": 420, "outputTokens": 180 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = HttpQuestionGateway::new(&config(server.uri())).expect("client");
    let batch = gateway.generate(&task()).await.expect("generate");

    assert_eq!(batch.questions.len(), 2);
    assert_eq!(batch.questions[0].prompt, "Frage 1");
    assert_eq!(batch.questions[0].correct_option_id.as_deref(), Some("b"));
    assert_eq!(batch.usage.len(), 1);
    assert_eq!(batch.usage[0].model_id, "gen-v2");
}

#[tokio::test]
async fn generate_surfaces_api_errors_with_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let gateway = HttpQuestionGateway::new(&config(server.uri())).expect("client");
    let result = gateway.generate(&task()).await;

    match result {
        Err(GatewayError::Api { status, message }) => {
            assert_eq!(status, 502);
            assert_eq!(message, "upstream exploded");
        }
        other => panic!("expected Api error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn generate_rejects_malformed_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let gateway = HttpQuestionGateway::new(&config(server.uri())).expect("client");
    let result = gateway.generate(&task()).await;

    assert!(matches!(result, Err(GatewayError::InvalidResponse { .. })));
}

#[tokio::test]
async fn generate_rejects_empty_batch() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "questions": [] })))
        .mount(&server)
        .await;

    let gateway = HttpQuestionGateway::new(&config(server.uri())).expect("client");
    let result = gateway.generate(&task()).await;

    assert!(matches!(result, Err(GatewayError::InvalidResponse { .. })));
}
