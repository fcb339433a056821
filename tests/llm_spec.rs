use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;
use vectal::llm::{Assistant, ChatTurn, LlmConfig, LlmError, OpenAiAssistant};
use vectal::models::*;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> LlmConfig {
    LlmConfig {
        base_url: server.uri(),
        api_key: Some("sk-test".to_string()),
        rank_model: "gpt-4".to_string(),
        timeout: Duration::from_secs(5),
    }
}

fn completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

fn task(title: &str) -> Task {
    let now = Utc::now();
    Task {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        project_id: None,
        title: title.to_string(),
        description: None,
        status: TaskStatus::Pending,
        priority: TaskPriority::Medium,
        ai_priority: None,
        due_date: None,
        completed_at: None,
        tags: vec![],
        created_at: now,
        updated_at: now,
    }
}

async fn request_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| request.body_json::<Value>().expect("Request body was not JSON"))
        .collect()
}

mod complete {
    use super::*;

    #[tokio::test]
    async fn sends_the_conversation_and_returns_the_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Try a short list.")))
            .expect(1)
            .mount(&server)
            .await;

        let assistant = OpenAiAssistant::new(config_for(&server)).expect("Failed to build client");
        let turns = vec![
            ChatTurn::new(ChatRole::System, "Be helpful."),
            ChatTurn::new(ChatRole::User, "How do I plan my day?"),
        ];
        let reply = assistant
            .complete("gpt-3.5-turbo", &turns)
            .await
            .expect("Completion failed");
        assert_eq!(reply, "Try a short list.");

        let bodies = request_bodies(&server).await;
        let body = &bodies[0];
        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["max_tokens"], 1000);
        assert!((body["temperature"].as_f64().unwrap_or_default() - 0.7).abs() < 1e-6);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "How do I plan my day?");
    }

    #[tokio::test]
    async fn returns_empty_text_for_a_null_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": null } }]
            })))
            .mount(&server)
            .await;

        let assistant = OpenAiAssistant::new(config_for(&server)).expect("Failed to build client");
        let reply = assistant
            .complete("gpt-4", &[ChatTurn::new(ChatRole::User, "Hi")])
            .await
            .expect("Completion failed");
        assert!(reply.is_empty());
    }

    #[tokio::test]
    async fn reports_the_upstream_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "message": "Rate limit reached", "type": "requests" }
            })))
            .mount(&server)
            .await;

        let assistant = OpenAiAssistant::new(config_for(&server)).expect("Failed to build client");
        let err = assistant
            .complete("gpt-4", &[ChatTurn::new(ChatRole::User, "Hi")])
            .await
            .unwrap_err();

        match err {
            LlmError::Status { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "Rate limit reached");
            }
            other => panic!("Expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn falls_back_when_the_error_body_is_not_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let assistant = OpenAiAssistant::new(config_for(&server)).expect("Failed to build client");
        let err = assistant
            .complete("gpt-4", &[ChatTurn::new(ChatRole::User, "Hi")])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LlmError::Status { status: 502, ref message } if message == "Unknown error"
        ));
    }

    #[tokio::test]
    async fn times_out_a_slow_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("late"))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let config = LlmConfig {
            timeout: Duration::from_millis(50),
            ..config_for(&server)
        };
        let assistant = OpenAiAssistant::new(config).expect("Failed to build client");
        let err = assistant
            .complete("gpt-4", &[ChatTurn::new(ChatRole::User, "Hi")])
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::Timeout(_)));
    }

    #[tokio::test]
    async fn requires_an_api_key() {
        let server = MockServer::start().await;
        let config = LlmConfig {
            api_key: None,
            ..config_for(&server)
        };
        let assistant = OpenAiAssistant::new(config).expect("Failed to build client");

        let err = assistant
            .complete("gpt-4", &[ChatTurn::new(ChatRole::User, "Hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured));
        assert!(request_bodies(&server).await.is_empty());
    }
}

mod rank_tasks {
    use super::*;

    #[tokio::test]
    async fn parses_a_fenced_reply() {
        let server = MockServer::start().await;
        let reply = "Here you go:\n```json\n{\"priorities\": [{\"taskIndex\": 1, \"priorityScore\": 90}, {\"index\": 0, \"priority\": 40}]}\n```";
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(reply)))
            .mount(&server)
            .await;

        let assistant = OpenAiAssistant::new(config_for(&server)).expect("Failed to build client");
        let suggestions = assistant
            .rank_tasks(&[task("Email Sam"), task("File taxes")])
            .await
            .expect("Ranking failed");

        let pairs: Vec<(usize, f64)> = suggestions.iter().map(|s| (s.index, s.score)).collect();
        assert_eq!(pairs, vec![(1, 90.0), (0, 40.0)]);

        let bodies = request_bodies(&server).await;
        assert_eq!(bodies[0]["model"], "gpt-4");
        let prompt = bodies[0]["messages"][1]["content"].as_str().unwrap_or_default();
        assert!(prompt.contains("0. Email Sam"));
        assert!(prompt.contains("1. File taxes"));
    }

    #[tokio::test]
    async fn rejects_prose() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("I think you should do the taxes first.")),
            )
            .mount(&server)
            .await;

        let assistant = OpenAiAssistant::new(config_for(&server)).expect("Failed to build client");
        let err = assistant.rank_tasks(&[task("File taxes")]).await.unwrap_err();
        assert!(matches!(err, LlmError::Malformed(_)));
    }

    #[tokio::test]
    async fn skips_the_call_without_tasks() {
        let server = MockServer::start().await;
        let assistant = OpenAiAssistant::new(config_for(&server)).expect("Failed to build client");

        let suggestions = assistant.rank_tasks(&[]).await.expect("Ranking failed");
        assert!(suggestions.is_empty());
        assert!(request_bodies(&server).await.is_empty());
    }
}
