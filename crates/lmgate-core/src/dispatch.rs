//! Binds an inbound request to a provider and a translation pair, then
//! drives the executor and streams the translated response back.

use std::sync::Arc;

use bytes::Bytes;
use lmgate_common::{GatewayConfig, ProviderKind};
use lmgate_protocol::rewrite::rewrite_frame_model;
use lmgate_protocol::sse::{JsonStreamDecoder, SseFrame};
use lmgate_protocol::Dialect;
use lmgate_registry::thinking::{self, EffortField};
use lmgate_registry::{ModelDescriptor, ModelRegistry, ParsedModel, ThinkingDirective};
use lmgate_translate::{stream2nostream, TranslateError, TranslatorRegistry};
use serde_json::Value;

use crate::error::{ErrorKind, GatewayError};
use crate::executor::{ExecuteSpec, Executor};
use crate::providers::ProviderProfile;
use crate::upstream::UpstreamBody;

#[derive(Debug)]
pub enum Reply {
    Json {
        body: Bytes,
    },
    /// Encoded SSE frames, ready to write to the client.
    Sse {
        frames: tokio::sync::mpsc::Receiver<Bytes>,
    },
}

pub struct Dispatcher {
    models: Arc<ModelRegistry>,
    translators: Arc<TranslatorRegistry>,
    executor: Arc<Executor>,
}

impl Dispatcher {
    pub fn new(
        models: Arc<ModelRegistry>,
        translators: Arc<TranslatorRegistry>,
        executor: Arc<Executor>,
    ) -> Self {
        Self {
            models,
            translators,
            executor,
        }
    }

    /// `model_override` carries the model parsed from the URL path for
    /// the Gemini endpoints; the other dialects name it in the body.
    pub async fn dispatch(
        &self,
        config: &GatewayConfig,
        inbound: Dialect,
        body: Bytes,
        model_override: Option<&str>,
        stream: bool,
    ) -> Result<Reply, GatewayError> {
        let requested_model = match model_override {
            Some(model) => model.to_string(),
            None => model_from_body(&body)
                .ok_or_else(|| GatewayError::invalid_request("request is missing \"model\""))?,
        };

        let ParsedModel { base, directive } = thinking::parse_model_suffix(&requested_model);
        if let ThinkingDirective::Raw(raw) = &directive {
            tracing::debug!(model = %base, suffix = %raw, "ignoring unrecognized thinking suffix");
        }

        let descriptor = self.models.lookup(&base);
        let provider = self
            .resolve_provider(config, &base, descriptor.as_ref())
            .ok_or_else(|| GatewayError::model_unknown(&requested_model))?;
        let profile = ProviderProfile::for_kind(&provider, config)
            .ok_or_else(|| GatewayError::model_unknown(&requested_model))?;
        let upstream_model = profile.map_model(&base).to_string();

        let translated = self
            .translators
            .translate_request(inbound, profile.dialect, &upstream_model, &body, stream)
            .map_err(map_translate_error)?;
        let mut payload: Value = serde_json::from_slice(&translated)
            .map_err(|err| GatewayError::invalid_request(err.to_string()))?;

        project_thinking(
            &mut payload,
            profile.dialect,
            &base,
            descriptor.as_ref(),
            &directive,
            profile.allow_compat_effort,
        )?;

        let spec = ExecuteSpec {
            profile: profile.clone(),
            payload,
            upstream_model,
            stream,
        };
        let result = self.executor.execute(config, &spec).await?;

        if stream {
            self.relay_stream(inbound, profile, result, requested_model)
        } else {
            self.unary_reply(inbound, profile, result, requested_model)
        }
    }

    /// The provider claiming the model: descriptor-owned first, then
    /// configured model mappings (openai-compat, Amp) in config order.
    fn resolve_provider(
        &self,
        config: &GatewayConfig,
        base: &str,
        descriptor: Option<&ModelDescriptor>,
    ) -> Option<ProviderKind> {
        if let Some(descriptor) = descriptor {
            return Some(descriptor.provider.clone());
        }
        for entry in &config.openai_compatibility {
            if entry.model_mappings.iter().any(|m| m.from == base) {
                return Some(ProviderKind::OpenAiCompat(entry.name.clone()));
            }
        }
        if let Some(amp) = &config.ampcode {
            if amp.model_mappings.iter().any(|m| m.from == base) {
                return Some(ProviderKind::Amp);
            }
        }
        None
    }

    fn unary_reply(
        &self,
        inbound: Dialect,
        profile: ProviderProfile,
        result: crate::executor::ExecuteResult,
        requested_model: String,
    ) -> Result<Reply, GatewayError> {
        let crate::executor::ExecuteResult { response, .. } = result;
        let bytes = match response.body {
            UpstreamBody::Bytes(bytes) => bytes,
            UpstreamBody::Stream(_) => {
                return Err(GatewayError::upstream("expected buffered upstream body"))
            }
        };
        let bytes = unwrap_provider_envelope(&profile.kind, bytes);

        // Upstreams that only stream (Codex) answer unary requests with
        // an SSE body; collapse it through the stream path first.
        let body = if looks_like_sse(&bytes) {
            let mut translator = self
                .translators
                .open_stream(inbound, profile.dialect)
                .map_err(map_translate_error)?;
            let mut decoder = JsonStreamDecoder::new();
            let mut frames: Vec<SseFrame> = Vec::new();
            for doc in decoder.push(&bytes) {
                if doc == "[DONE]" {
                    continue;
                }
                frames.extend(translator.push(&unwrap_stream_doc(&profile.kind, doc)));
            }
            for doc in decoder.finish() {
                if doc == "[DONE]" {
                    continue;
                }
                frames.extend(translator.push(&unwrap_stream_doc(&profile.kind, doc)));
            }
            frames.extend(translator.finish());
            let value = stream2nostream::aggregate(inbound, &frames)
                .ok_or_else(|| GatewayError::upstream("empty upstream stream"))?;
            serde_json::to_vec(&value).map_err(|err| GatewayError::upstream(err.to_string()))?
        } else {
            self.translators
                .translate_response(inbound, profile.dialect, &bytes)
                .map_err(map_translate_error)?
        };

        let rendered = rewrite_frame_model(
            std::str::from_utf8(&body)
                .map_err(|err| GatewayError::upstream(err.to_string()))?,
            &requested_model,
        );
        Ok(Reply::Json {
            body: Bytes::from(rendered),
        })
    }

    fn relay_stream(
        &self,
        inbound: Dialect,
        profile: ProviderProfile,
        result: crate::executor::ExecuteResult,
        requested_model: String,
    ) -> Result<Reply, GatewayError> {
        let mut translator = self
            .translators
            .open_stream(inbound, profile.dialect)
            .map_err(map_translate_error)?;
        let (tx, rx) = tokio::sync::mpsc::channel::<Bytes>(64);
        let kind = profile.kind.clone();

        tokio::spawn(async move {
            // The executor's lease is released when `result` drops at
            // the end of this task.
            let result = result;
            let mut emitted = false;
            let mut decoder = JsonStreamDecoder::new();

            let mut push_docs = |docs: Vec<String>,
                                 translator: &mut Box<dyn lmgate_translate::StreamTranslator>|
             -> Vec<SseFrame> {
                docs.into_iter()
                    .filter(|doc| doc != "[DONE]" && !doc.is_empty())
                    .flat_map(|doc| translator.push(&unwrap_stream_doc(&kind, doc)))
                    .collect()
            };

            match result.response.body {
                UpstreamBody::Stream(mut upstream) => {
                    'relay: while let Some(chunk) = upstream.recv().await {
                        let frames = push_docs(decoder.push(&chunk), &mut translator);
                        for frame in frames {
                            emitted = true;
                            if send_frame(&tx, frame, &requested_model).await.is_err() {
                                break 'relay;
                            }
                        }
                    }
                }
                UpstreamBody::Bytes(bytes) => {
                    let frames = push_docs(decoder.push(&bytes), &mut translator);
                    for frame in frames {
                        emitted = true;
                        let _ = send_frame(&tx, frame, &requested_model).await;
                    }
                }
            }

            let mut tail = push_docs(decoder.finish(), &mut translator);
            tail.extend(translator.finish());
            for frame in tail {
                emitted = true;
                if send_frame(&tx, frame, &requested_model).await.is_err() {
                    return;
                }
            }

            if !emitted {
                // Upstream closed before producing anything usable;
                // signal a terminal error instead of an empty stream.
                let err = GatewayError::upstream("upstream closed without data");
                let frame = terminal_error_frame(inbound, &err);
                let _ = tx.send(frame.encode()).await;
            }
            if inbound == Dialect::OpenAiChat {
                let _ = tx.send(Bytes::from_static(b"data: [DONE]\n\n")).await;
            }
        });

        Ok(Reply::Sse { frames: rx })
    }
}

async fn send_frame(
    tx: &tokio::sync::mpsc::Sender<Bytes>,
    mut frame: SseFrame,
    requested_model: &str,
) -> Result<(), ()> {
    frame.data = rewrite_frame_model(&frame.data, requested_model);
    tx.send(frame.encode()).await.map_err(|_| ())
}

/// Terminal in-stream error event: a committed stream never gets a
/// second HTTP status.
pub fn terminal_error_frame(dialect: Dialect, err: &GatewayError) -> SseFrame {
    let body = err.body(dialect).to_string();
    match dialect {
        Dialect::ClaudeMessages => SseFrame::named("error", body),
        Dialect::OpenAiResponses => SseFrame::named("error", body),
        Dialect::OpenAiChat | Dialect::GeminiGenerate => SseFrame::data(body),
    }
}

fn model_from_body(body: &Bytes) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value
        .get("model")
        .and_then(|model| model.as_str())
        .map(|model| model.to_string())
}

fn project_thinking(
    payload: &mut Value,
    target: Dialect,
    base_model: &str,
    descriptor: Option<&ModelDescriptor>,
    directive: &ThinkingDirective,
    allow_compat: bool,
) -> Result<(), GatewayError> {
    match target {
        Dialect::GeminiGenerate => {
            thinking::project_gemini(payload, base_model, descriptor, directive);
            Ok(())
        }
        Dialect::ClaudeMessages => {
            thinking::project_claude(payload, descriptor, directive);
            Ok(())
        }
        Dialect::OpenAiChat => {
            thinking::project_effort(
                payload,
                descriptor,
                directive,
                EffortField::TopLevel,
                allow_compat,
            )
            .map_err(|err| GatewayError::new(ErrorKind::ThinkingInvalid, err.to_string()))
        }
        Dialect::OpenAiResponses => thinking::project_effort(
            payload,
            descriptor,
            directive,
            EffortField::Nested,
            false,
        )
        .map_err(|err| GatewayError::new(ErrorKind::ThinkingInvalid, err.to_string())),
    }
}

fn map_translate_error(err: TranslateError) -> GatewayError {
    match err {
        TranslateError::UnsupportedPair { .. } => {
            GatewayError::new(ErrorKind::TranslationUnsupported, err.to_string())
        }
        TranslateError::Malformed { .. } => GatewayError::invalid_request(err.to_string()),
    }
}

fn looks_like_sse(bytes: &Bytes) -> bool {
    let head = &bytes[..bytes.len().min(64)];
    let Ok(text) = std::str::from_utf8(head) else {
        return false;
    };
    let trimmed = text.trim_start();
    trimmed.starts_with("data:") || trimmed.starts_with("event:")
}

/// Cloud Code wraps unary bodies in `{"response": {...}}`.
fn unwrap_provider_envelope(kind: &ProviderKind, bytes: Bytes) -> Bytes {
    if *kind != ProviderKind::GeminiCli {
        return bytes;
    }
    let Ok(value) = serde_json::from_slice::<Value>(&bytes) else {
        return bytes;
    };
    match value.get("response") {
        Some(inner) => Bytes::from(inner.to_string()),
        None => bytes,
    }
}

/// Cloud Code stream documents carry the same envelope per chunk.
fn unwrap_stream_doc(kind: &ProviderKind, doc: String) -> String {
    if *kind != ProviderKind::GeminiCli {
        return doc;
    }
    let Ok(value) = serde_json::from_str::<Value>(&doc) else {
        return doc;
    };
    match value.get("response") {
        Some(inner) => inner.to_string(),
        None => doc,
    }
}
