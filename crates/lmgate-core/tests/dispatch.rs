//! End-to-end dispatch scenarios against a scripted upstream.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use lmgate_common::{GatewayConfig, GeminiApiKeyEntry, ProviderKind};
use lmgate_core::upstream::{
    TransportError, UpstreamBody, UpstreamClient, UpstreamRequest, UpstreamResponse,
};
use lmgate_core::{Gateway, Reply};
use lmgate_pool::Credential;
use lmgate_protocol::Dialect;
use serde_json::{json, Value};

#[derive(Clone)]
struct ScriptedResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

struct MockUpstream {
    responses: Mutex<Vec<ScriptedResponse>>,
    requests: Mutex<Vec<UpstreamRequest>>,
}

impl MockUpstream {
    fn new(responses: Vec<ScriptedResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn recorded(&self) -> Vec<UpstreamRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl UpstreamClient for MockUpstream {
    fn send<'a>(
        &'a self,
        request: UpstreamRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UpstreamResponse, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request);
            let mut responses = self.responses.lock().unwrap();
            let scripted = if responses.len() > 1 {
                responses.remove(0)
            } else {
                responses[0].clone()
            };
            Ok(UpstreamResponse {
                status: scripted.status,
                headers: scripted.headers,
                body: UpstreamBody::Bytes(Bytes::from(scripted.body)),
            })
        })
    }
}

fn ok(body: &str) -> ScriptedResponse {
    ScriptedResponse {
        status: 200,
        headers: vec![("content-type".to_string(), "application/json".to_string())],
        body: body.to_string(),
    }
}

fn gemini_cli_credential(id: &str) -> Credential {
    let mut credential = Credential::oauth(
        ProviderKind::GeminiCli,
        id,
        "access-token",
        None,
        Some(time::OffsetDateTime::now_utc().unix_timestamp() + 3600),
    );
    credential.project_id = Some("proj-1".to_string());
    credential
}

async fn collect_sse(reply: Reply) -> Vec<String> {
    match reply {
        Reply::Sse { mut frames } => {
            let mut out = Vec::new();
            while let Some(chunk) = frames.recv().await {
                out.push(String::from_utf8_lossy(&chunk).into_owned());
            }
            out
        }
        Reply::Json { .. } => panic!("expected a streaming reply"),
    }
}

fn data_payloads(frames: &[String]) -> Vec<Value> {
    frames
        .iter()
        .flat_map(|frame| frame.lines())
        .filter_map(|line| line.strip_prefix("data: "))
        .filter(|payload| *payload != "[DONE]")
        .filter_map(|payload| serde_json::from_str(payload).ok())
        .collect()
}

#[tokio::test]
async fn openai_chat_to_gemini_cli_streams_with_budget_and_model_rewrite() {
    let upstream_body = concat!(
        "data: {\"response\":{\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hi there\"}]}}],\"modelVersion\":\"gemini-2.5-pro\"}}\n\n",
        "data: {\"response\":{\"candidates\":[{\"content\":{\"parts\":[]},\"finishReason\":\"STOP\"}],\"usageMetadata\":{\"promptTokenCount\":1,\"candidatesTokenCount\":2,\"totalTokenCount\":3}}}\n\n",
    );
    let mock = MockUpstream::new(vec![ok(upstream_body)]);
    let gateway = Gateway::new(GatewayConfig::default(), mock.clone())
        .await
        .unwrap();
    gateway.add_credential(gemini_cli_credential("acct")).await;

    let request = json!({
        "model": "gemini-2.5-pro(8192)",
        "messages": [{"role": "user", "content": "hi"}],
        "stream": true,
    });
    let reply = gateway
        .dispatcher
        .dispatch(
            &gateway.config(),
            Dialect::OpenAiChat,
            Bytes::from(request.to_string()),
            None,
            true,
        )
        .await
        .unwrap();

    // Upstream payload: wrapped envelope with project id, base model id
    // and the projected thinking budget.
    let recorded = mock.recorded();
    assert_eq!(recorded.len(), 1);
    let sent: Value = serde_json::from_slice(&recorded[0].body).unwrap();
    assert_eq!(sent["model"], "gemini-2.5-pro");
    assert_eq!(sent["project"], "proj-1");
    assert_eq!(
        sent["request"]["generationConfig"]["thinkingConfig"]["thinkingBudget"],
        8192
    );
    assert!(recorded[0].url.contains("streamGenerateContent"));

    let frames = collect_sse(reply).await;
    assert!(frames.last().unwrap().contains("[DONE]"));
    let events = data_payloads(&frames);
    assert!(!events.is_empty());
    // Every event carries the originally requested model string.
    for event in &events {
        assert_eq!(event["model"], "gemini-2.5-pro(8192)");
    }
    assert_eq!(events[0]["choices"][0]["delta"]["content"], "Hi there");
    let last = events.last().unwrap();
    assert_eq!(last["choices"][0]["finish_reason"], "stop");
}

#[tokio::test]
async fn claude_to_codex_translates_tools_and_reasoning_effort() {
    let upstream_body = concat!(
        "event: response.created\n",
        "data: {\"type\":\"response.created\",\"response\":{\"id\":\"resp_1\",\"object\":\"response\",\"model\":\"gpt-5\",\"output\":[]}}\n\n",
        "event: response.output_item.added\n",
        "data: {\"type\":\"response.output_item.added\",\"output_index\":0,\"item\":{\"type\":\"function_call\",\"call_id\":\"call_1\",\"name\":\"get_weather\",\"arguments\":\"\"}}\n\n",
        "event: response.function_call_arguments.delta\n",
        "data: {\"type\":\"response.function_call_arguments.delta\",\"output_index\":0,\"delta\":\"{\\\"city\\\":\\\"Paris\\\"}\"}\n\n",
        "event: response.completed\n",
        "data: {\"type\":\"response.completed\",\"response\":{\"id\":\"resp_1\",\"object\":\"response\",\"model\":\"gpt-5\",\"output\":[]}}\n\n",
    );
    let mock = MockUpstream::new(vec![ok(upstream_body)]);
    let gateway = Gateway::new(GatewayConfig::default(), mock.clone())
        .await
        .unwrap();
    gateway
        .add_credential(Credential::oauth(
            ProviderKind::Codex,
            "codex-acct",
            "token",
            None,
            Some(time::OffsetDateTime::now_utc().unix_timestamp() + 3600),
        ))
        .await;

    let request = json!({
        "model": "gpt-5(high)",
        "max_tokens": 1024,
        "messages": [{"role": "user", "content": "weather in paris"}],
        "stream": true,
    });
    let reply = gateway
        .dispatcher
        .dispatch(
            &gateway.config(),
            Dialect::ClaudeMessages,
            Bytes::from(request.to_string()),
            None,
            true,
        )
        .await
        .unwrap();

    let recorded = mock.recorded();
    let sent: Value = serde_json::from_slice(&recorded[0].body).unwrap();
    assert_eq!(sent["model"], "gpt-5");
    assert_eq!(sent["reasoning"]["effort"], "high");
    assert_eq!(sent["stream"], true);
    assert!(sent.get("previous_response_id").is_none());

    let frames = collect_sse(reply).await;
    let names: Vec<&str> = frames
        .iter()
        .flat_map(|frame| frame.lines())
        .filter_map(|line| line.strip_prefix("event: "))
        .collect();
    assert!(names.contains(&"message_start"));
    assert!(names.contains(&"content_block_start"));
    assert!(names.contains(&"content_block_delta"));
    assert!(names.contains(&"content_block_stop"));
    assert!(names.contains(&"message_stop"));

    // The tool_use block surfaces the upstream call and its arguments.
    let joined = frames.join("");
    assert!(joined.contains("get_weather"));
    assert!(joined.contains("tool_use"));
}

#[tokio::test]
async fn gemini_to_claude_injects_thinking_budget() {
    let upstream_body = json!({
        "id": "msg_1",
        "type": "message",
        "role": "assistant",
        "model": "claude-sonnet-4",
        "content": [{"type": "text", "text": "ok"}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 1, "output_tokens": 1},
    })
    .to_string();
    let mock = MockUpstream::new(vec![ok(&upstream_body)]);
    let gateway = Gateway::new(GatewayConfig::default(), mock.clone())
        .await
        .unwrap();
    gateway
        .add_credential(Credential::oauth(
            ProviderKind::ClaudeCode,
            "claude-acct",
            "token",
            None,
            Some(time::OffsetDateTime::now_utc().unix_timestamp() + 3600),
        ))
        .await;

    let request = json!({
        "contents": [{"role": "user", "parts": [{"text": "hi"}]}],
    });
    let reply = gateway
        .dispatcher
        .dispatch(
            &gateway.config(),
            Dialect::GeminiGenerate,
            Bytes::from(request.to_string()),
            Some("claude-sonnet-4(1025)"),
            false,
        )
        .await
        .unwrap();

    let recorded = mock.recorded();
    let sent: Value = serde_json::from_slice(&recorded[0].body).unwrap();
    assert_eq!(sent["thinking"]["type"], "enabled");
    assert_eq!(sent["thinking"]["budget_tokens"], 1025);

    let Reply::Json { body } = reply else {
        panic!("expected unary reply");
    };
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["modelVersion"], "claude-sonnet-4(1025)");
    assert_eq!(
        body["candidates"][0]["content"]["parts"][0]["text"],
        "ok"
    );
}

#[tokio::test]
async fn responses_to_gemini_maps_input_image_to_inline_data() {
    let upstream_body = json!({
        "candidates": [{"content": {"parts": [{"text": "a png"}]}, "finishReason": "STOP"}],
    })
    .to_string();
    let mock = MockUpstream::new(vec![ok(&upstream_body)]);
    let mut config = GatewayConfig::default();
    config.gemini_api_key = vec![GeminiApiKeyEntry {
        api_key: "aistudio-key".to_string(),
    }];
    let gateway = Gateway::new(config, mock.clone()).await.unwrap();

    let request = json!({
        "model": "gemini-2.5-pro",
        "input": [{
            "role": "user",
            "content": [
                {"type": "input_text", "text": "describe"},
                {"type": "input_image", "image_url": "data:image/png;base64,iVBORw0KGgo="},
            ],
        }],
    });
    gateway
        .dispatcher
        .dispatch(
            &gateway.config(),
            Dialect::OpenAiResponses,
            Bytes::from(request.to_string()),
            None,
            false,
        )
        .await
        .unwrap();

    let recorded = mock.recorded();
    let sent: Value = serde_json::from_slice(&recorded[0].body).unwrap();
    let parts = &sent["contents"][0]["parts"];
    assert_eq!(parts[0]["text"], "describe");
    assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
    assert_eq!(parts[1]["inlineData"]["data"], "iVBORw0KGgo=");
    assert!(recorded[0]
        .headers
        .iter()
        .any(|(name, value)| name == "x-goog-api-key" && value == "aistudio-key"));
}

#[tokio::test]
async fn rate_limited_account_fails_over_and_stays_bypassed() {
    let success = json!({
        "candidates": [{"content": {"parts": [{"text": "ok"}]}, "finishReason": "STOP"}],
    })
    .to_string();
    let mock = MockUpstream::new(vec![
        ScriptedResponse {
            status: 429,
            headers: vec![("retry-after".to_string(), "5".to_string())],
            body: json!({"error": {"message": "slow down"}}).to_string(),
        },
        ok(&success),
    ]);
    let mut config = GatewayConfig::default();
    config.gemini_api_key = vec![
        GeminiApiKeyEntry {
            api_key: "key-a".to_string(),
        },
        GeminiApiKeyEntry {
            api_key: "key-b".to_string(),
        },
    ];
    let gateway = Gateway::new(config, mock.clone()).await.unwrap();

    let request = json!({
        "model": "gemini-2.5-pro",
        "messages": [{"role": "user", "content": "hi"}],
    });

    // First request: lands on A (429), retried on B, succeeds.
    gateway
        .dispatcher
        .dispatch(
            &gateway.config(),
            Dialect::OpenAiChat,
            Bytes::from(request.to_string()),
            None,
            false,
        )
        .await
        .unwrap();

    // Second request inside the Retry-After window bypasses A entirely.
    gateway
        .dispatcher
        .dispatch(
            &gateway.config(),
            Dialect::OpenAiChat,
            Bytes::from(request.to_string()),
            None,
            false,
        )
        .await
        .unwrap();

    let keys: Vec<String> = mock
        .recorded()
        .iter()
        .map(|request| {
            request
                .headers
                .iter()
                .find(|(name, _)| name == "x-goog-api-key")
                .map(|(_, value)| value.clone())
                .unwrap_or_default()
        })
        .collect();
    assert_eq!(keys[0], "key-a");
    assert_eq!(keys[1], "key-b");
    assert_eq!(keys[2], "key-b");
}

#[tokio::test]
async fn upstream_401_triggers_one_refresh_and_a_same_account_retry() {
    let success = json!({
        "candidates": [{"content": {"parts": [{"text": "ok"}]}, "finishReason": "STOP"}],
    })
    .to_string();
    let mock = MockUpstream::new(vec![
        ScriptedResponse {
            status: 401,
            headers: Vec::new(),
            body: json!({"error": {"message": "token expired"}}).to_string(),
        },
        ok(json!({"access_token": "rotated", "expires_in": 3600}).to_string().as_str()),
        ok(&success),
    ]);
    let gateway = Gateway::new(GatewayConfig::default(), mock.clone())
        .await
        .unwrap();
    let mut credential = gemini_cli_credential("acct");
    credential.refresh_token = Some("refresh-token".to_string());
    gateway.add_credential(credential).await;

    let request = json!({
        "model": "gemini-2.5-pro",
        "messages": [{"role": "user", "content": "hi"}],
    });
    gateway
        .dispatcher
        .dispatch(
            &gateway.config(),
            Dialect::OpenAiChat,
            Bytes::from(request.to_string()),
            None,
            false,
        )
        .await
        .unwrap();

    let recorded = mock.recorded();
    assert_eq!(recorded.len(), 3);
    // Exactly one token-endpoint exchange between the 401 and the retry.
    assert!(recorded[1].url.contains("oauth2.googleapis.com/token"));
    let retried: Vec<&UpstreamRequest> = recorded
        .iter()
        .filter(|request| request.url.contains("cloudcode"))
        .collect();
    assert_eq!(retried.len(), 2);
    assert!(retried[1]
        .headers
        .iter()
        .any(|(name, value)| name == "authorization" && value == "Bearer rotated"));
}

#[tokio::test]
async fn unknown_model_is_a_404() {
    let mock = MockUpstream::new(vec![ok("{}")]);
    let gateway = Gateway::new(GatewayConfig::default(), mock).await.unwrap();
    let request = json!({"model": "made-up", "messages": []});
    let err = gateway
        .dispatcher
        .dispatch(
            &gateway.config(),
            Dialect::OpenAiChat,
            Bytes::from(request.to_string()),
            None,
            false,
        )
        .await
        .unwrap_err();
    assert_eq!(err.status(), 404);
}

#[tokio::test]
async fn invalid_effort_for_strict_target_is_a_400() {
    let mock = MockUpstream::new(vec![ok("{}")]);
    let gateway = Gateway::new(GatewayConfig::default(), mock).await.unwrap();
    gateway
        .add_credential(Credential::oauth(
            ProviderKind::Codex,
            "codex-acct",
            "token",
            None,
            None,
        ))
        .await;
    // gpt-5's ladder tops out at high; xhigh is not valid for it.
    let request_with_suffix = json!({
        "model": "gpt-5(xhigh)",
        "max_tokens": 128,
        "messages": [{"role": "user", "content": "hi"}],
    });
    let err = gateway
        .dispatcher
        .dispatch(
            &gateway.config(),
            Dialect::ClaudeMessages,
            Bytes::from(request_with_suffix.to_string()),
            None,
            false,
        )
        .await
        .unwrap_err();
    assert_eq!(err.status(), 400);
}

#[tokio::test]
async fn reload_swaps_compat_providers_and_reports_the_diff() {
    let mock = MockUpstream::new(vec![ok("{}")]);
    let mut config = GatewayConfig::default();
    config.access.providers = vec![lmgate_common::AccessProviderConfig {
        provider_type: "config-api-key".to_string(),
        name: "old".to_string(),
        api_keys: vec!["k1".to_string()],
        config: None,
    }];
    config.openai_compatibility = vec![lmgate_common::OpenAiCompatConfig {
        name: "legacy".to_string(),
        base_url: "http://legacy/v1".to_string(),
        api_key_entries: vec![lmgate_common::OpenAiCompatKeyEntry {
            api_key: "sk".to_string(),
        }],
        model_mappings: vec![lmgate_common::ModelMapping {
            from: "legacy-model".to_string(),
            to: "legacy-served".to_string(),
        }],
    }];
    let gateway = Gateway::new(config.clone(), mock).await.unwrap();
    assert!(gateway.models.lookup("legacy-model").is_some());

    let mut new_config = config.clone();
    new_config.access.providers = vec![lmgate_common::AccessProviderConfig {
        provider_type: "config-api-key".to_string(),
        name: "new".to_string(),
        api_keys: vec!["k2".to_string()],
        config: None,
    }];
    new_config.openai_compatibility = vec![];

    let report = gateway.reload(new_config).await.unwrap();
    assert_eq!(report.added, vec!["new"]);
    assert!(report.updated.is_empty());
    assert_eq!(report.removed, vec!["old"]);
    assert!(gateway.models.lookup("legacy-model").is_none());
}
