use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::ClassifierConfig;
use crate::error::AppError;
use crate::models::grouping::{Grouping, IncrementalChoice};
use crate::models::tab::TabId;
use crate::services::prompt_service::{PromptPayload, MISCELLANEOUS_GROUP};

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

/// One-shot client for the remote chat-completions classifier. Never retries.
pub struct ClassificationClient {
    client: reqwest::Client,
    config: ClassifierConfig,
}

impl ClassificationClient {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    fn build_request<'a>(&'a self, payload: &'a PromptPayload) -> ApiRequest<'a> {
        ApiRequest {
            model: &self.config.model,
            messages: vec![
                ApiMessage {
                    role: "system",
                    content: &payload.system,
                },
                ApiMessage {
                    role: "user",
                    content: &payload.user,
                },
            ],
            temperature: self.config.temperature,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        }
    }

    /// Sends the prompt and returns the assistant's raw text.
    pub async fn complete(
        &self,
        payload: &PromptPayload,
        api_key: &str,
    ) -> Result<String, AppError> {
        if api_key.trim().is_empty() {
            return Err(AppError::missing_api_key());
        }

        tracing::debug!(
            "[classifier] Sending prompt ({} chars) to {}",
            payload.user.len(),
            self.config.api_url
        );

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(api_key.trim())
            .json(&self.build_request(payload))
            .send()
            .await
            .map_err(|e| AppError::Transport {
                status: None,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|parsed| parsed.error.message)
                .filter(|message| !message.trim().is_empty());
            let status_text = status.canonical_reason().unwrap_or("request failed");
            return Err(AppError::Transport {
                status: Some(status.as_u16()),
                message: detail.unwrap_or_else(|| format!("{} {status_text}", status.as_u16())),
            });
        }

        let body = response.text().await.map_err(|e| AppError::Transport {
            status: Some(status.as_u16()),
            message: e.to_string(),
        })?;
        let parsed: ApiResponse = serde_json::from_str(&body).map_err(|e| {
            AppError::MalformedResponse(format!("unexpected response envelope: {e}"))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(AppError::EmptyResponse)?;

        tracing::debug!(
            "[classifier] Response ({} chars): {}",
            content.len(),
            content.chars().take(500).collect::<String>()
        );
        Ok(content)
    }

    pub async fn classify_bulk(
        &self,
        payload: &PromptPayload,
        api_key: &str,
        tab_ids: &[TabId],
    ) -> Result<Grouping, AppError> {
        let content = self.complete(payload, api_key).await?;
        decode_grouping(&content, tab_ids)
    }

    pub async fn classify_incremental(
        &self,
        payload: &PromptPayload,
        api_key: &str,
    ) -> Result<IncrementalChoice, AppError> {
        let content = self.complete(payload, api_key).await?;
        decode_incremental(&content)
    }
}

/// Pulls the JSON object out of model text that may be wrapped in a code fence.
pub fn extract_json_payload(text: &str) -> Option<&str> {
    let trimmed = text.trim();

    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + "```json".len()..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim());
        }
    }

    if let Some(start) = trimmed.find("```") {
        let rest = &trimmed[start + 3..];
        if let Some(newline) = rest.find('\n') {
            let body = &rest[newline + 1..];
            if let Some(end) = body.find("```") {
                return Some(body[..end].trim());
            }
        }
    }

    let first = trimmed.find('{')?;
    let last = trimmed.rfind('}')?;
    if first <= last {
        return Some(&trimmed[first..=last]);
    }

    None
}

fn parse_object(text: &str) -> Result<serde_json::Map<String, serde_json::Value>, AppError> {
    let payload = extract_json_payload(text)
        .ok_or_else(|| AppError::MalformedResponse("response is not JSON".to_string()))?;
    let value: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| AppError::MalformedResponse(format!("invalid JSON: {e}")))?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(AppError::MalformedResponse(
            "expected a JSON object".to_string(),
        )),
    }
}

/// Decodes `{"group": [tab ids]}`. Every value must be an array of integers.
/// Ids outside `tab_ids` and repeats of an already assigned id are dropped.
pub fn decode_grouping(text: &str, tab_ids: &[TabId]) -> Result<Grouping, AppError> {
    let object = parse_object(text)?;
    let known: HashSet<TabId> = tab_ids.iter().copied().collect();
    let mut grouping = Grouping::new();

    for (raw_name, value) in &object {
        let ids = value
            .as_array()
            .and_then(|items| items.iter().map(|item| item.as_i64()).collect::<Option<Vec<_>>>())
            .ok_or_else(|| {
                AppError::MalformedResponse(format!(
                    "group {raw_name:?} must map to an array of tab IDs"
                ))
            })?;

        let name = match raw_name.trim() {
            "" => MISCELLANEOUS_GROUP,
            trimmed => trimmed,
        };
        for id in ids {
            if !known.contains(&id) {
                tracing::warn!("Dropping unknown tab id {id} suggested for group {name:?}");
                continue;
            }
            if !grouping.assign(name, id) {
                tracing::warn!("Tab {id} suggested for more than one group, keeping first");
            }
        }
    }

    let missing = tab_ids.iter().filter(|id| !grouping.contains_tab(**id)).count();
    if missing > 0 {
        tracing::debug!("{missing} tabs were left out of the suggested grouping");
    }
    Ok(grouping)
}

pub fn decode_incremental(text: &str) -> Result<IncrementalChoice, AppError> {
    let object = parse_object(text)?;
    let name = object
        .get("groupName")
        .and_then(|value| value.as_str())
        .ok_or_else(|| {
            AppError::MalformedResponse("missing \"groupName\" string field".to_string())
        })?
        .trim();
    if name.is_empty() {
        return Err(AppError::MalformedResponse(
            "\"groupName\" is blank".to_string(),
        ));
    }
    Ok(IncrementalChoice {
        group_name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> PromptPayload {
        PromptPayload {
            system: "system".to_string(),
            user: "user".to_string(),
        }
    }

    #[test]
    fn extract_json_payload_handles_codeblock() {
        let text = "hello\n```json\n{\"News\": [1]}\n```\n";
        assert_eq!(extract_json_payload(text), Some("{\"News\": [1]}"));
        assert_eq!(extract_json_payload("not json"), None);
    }

    #[test]
    fn decode_grouping_accepts_valid_object() {
        let grouping = decode_grouping(
            r#"{"Research": [101, 102], "News": [103]}"#,
            &[101, 102, 103],
        )
        .unwrap();
        assert_eq!(grouping.get("Research"), Some(&[101, 102][..]));
        assert_eq!(grouping.get("News"), Some(&[103][..]));
    }

    #[test]
    fn decode_grouping_rejects_plain_text() {
        let err = decode_grouping("not json", &[1]).unwrap_err();
        assert!(err.is_protocol_error());
        assert!(err.to_string().contains("invalid response format"));
    }

    #[test]
    fn decode_grouping_rejects_non_array_values() {
        let err = decode_grouping(r#"{"News": 3}"#, &[3]).unwrap_err();
        assert!(matches!(err, AppError::MalformedResponse(_)));

        let err = decode_grouping(r#"{"News": ["3"]}"#, &[3]).unwrap_err();
        assert!(matches!(err, AppError::MalformedResponse(_)));

        let err = decode_grouping("[1, 2]", &[1, 2]).unwrap_err();
        assert!(matches!(err, AppError::MalformedResponse(_)));
    }

    #[test]
    fn decode_grouping_drops_unknown_and_duplicate_ids() {
        let grouping =
            decode_grouping(r#"{"A": [1, 99], "B": [1, 2]}"#, &[1, 2]).unwrap();
        assert_eq!(grouping.get("A"), Some(&[1][..]));
        assert_eq!(grouping.get("B"), Some(&[2][..]));
        assert!(!grouping.contains_tab(99));
    }

    #[test]
    fn decode_incremental_requires_group_name() {
        let choice = decode_incremental(r#"{"groupName": "  Work "}"#).unwrap();
        assert_eq!(choice.group_name, "Work");

        assert!(decode_incremental(r#"{"group": "Work"}"#).is_err());
        assert!(decode_incremental(r#"{"groupName": "   "}"#).is_err());
        assert!(decode_incremental(r#"{"groupName": 4}"#).is_err());
    }

    #[test]
    fn build_request_asks_for_json_object() {
        let client = ClassificationClient::new(ClassifierConfig::default());
        let payload = payload();
        let request = serde_json::to_value(client.build_request(&payload)).unwrap();
        assert_eq!(request["model"], "gpt-4o");
        assert_eq!(request["response_format"]["type"], "json_object");
        assert_eq!(request["messages"][1]["content"], "user");
    }

    // Wiremock-based tests for actual HTTP calls
    mod http_tests {
        use super::*;
        use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

        fn client_for(server: &MockServer) -> ClassificationClient {
            ClassificationClient::new(ClassifierConfig::default().with_url(server.uri()))
        }

        fn completion(content: &str) -> serde_json::Value {
            serde_json::json!({
                "id": "chatcmpl-1",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": content},
                    "finish_reason": "stop"
                }]
            })
        }

        #[tokio::test]
        async fn missing_key_fails_before_any_request() {
            let mock_server = MockServer::start().await;
            Mock::given(matchers::any())
                .respond_with(ResponseTemplate::new(200))
                .expect(0)
                .mount(&mock_server)
                .await;

            let err = client_for(&mock_server)
                .classify_bulk(&payload(), "  ", &[1])
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Configuration(_)));
        }

        #[tokio::test]
        async fn classify_bulk_success() {
            let mock_server = MockServer::start().await;
            Mock::given(matchers::method("POST"))
                .and(matchers::header("authorization", "Bearer sk-test"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(completion(r#"{"Work": [1, 2], "News": [3]}"#)),
                )
                .expect(1)
                .mount(&mock_server)
                .await;

            let grouping = client_for(&mock_server)
                .classify_bulk(&payload(), "sk-test", &[1, 2, 3])
                .await
                .unwrap();
            assert_eq!(grouping.get("Work"), Some(&[1, 2][..]));
            assert_eq!(grouping.tab_count(), 3);
        }

        #[tokio::test]
        async fn api_error_message_is_captured() {
            let mock_server = MockServer::start().await;
            let error_body =
                r#"{"error": {"message": "Invalid API key", "type": "invalid_request_error"}}"#;
            Mock::given(matchers::method("POST"))
                .respond_with(ResponseTemplate::new(401).set_body_string(error_body))
                .expect(1)
                .mount(&mock_server)
                .await;

            let err = client_for(&mock_server)
                .complete(&payload(), "bad-key")
                .await
                .unwrap_err();
            match err {
                AppError::Transport { status, message } => {
                    assert_eq!(status, Some(401));
                    assert_eq!(message, "Invalid API key");
                }
                other => panic!("Expected Transport, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn unparsable_error_body_falls_back_to_status_text() {
            let mock_server = MockServer::start().await;
            Mock::given(matchers::method("POST"))
                .respond_with(ResponseTemplate::new(503).set_body_string("<html>down</html>"))
                .mount(&mock_server)
                .await;

            let err = client_for(&mock_server)
                .complete(&payload(), "sk-test")
                .await
                .unwrap_err();
            match err {
                AppError::Transport { status, message } => {
                    assert_eq!(status, Some(503));
                    assert_eq!(message, "503 Service Unavailable");
                }
                other => panic!("Expected Transport, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn empty_content_is_reported() {
            let mock_server = MockServer::start().await;
            Mock::given(matchers::method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_json(completion("  ")))
                .mount(&mock_server)
                .await;

            let err = client_for(&mock_server)
                .complete(&payload(), "sk-test")
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::EmptyResponse));
        }

        #[tokio::test]
        async fn malformed_content_is_protocol_error() {
            let mock_server = MockServer::start().await;
            Mock::given(matchers::method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_json(completion("not json")))
                .expect(1)
                .mount(&mock_server)
                .await;

            let err = client_for(&mock_server)
                .classify_bulk(&payload(), "sk-test", &[1])
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::MalformedResponse(_)));
        }

        #[tokio::test]
        async fn classify_incremental_success() {
            let mock_server = MockServer::start().await;
            Mock::given(matchers::method("POST"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(completion(r#"{"groupName": "Work"}"#)),
                )
                .mount(&mock_server)
                .await;

            let choice = client_for(&mock_server)
                .classify_incremental(&payload(), "sk-test")
                .await
                .unwrap();
            assert_eq!(choice.group_name, "Work");
        }
    }
}
