use std::sync::Arc;

use lmgate_protocol::sse::SseFrame;
use lmgate_protocol::Dialect;

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("no translation edge from {from} to {to}")]
    UnsupportedPair { from: Dialect, to: Dialect },
    #[error("malformed {dialect} payload: {message}")]
    Malformed { dialect: Dialect, message: String },
}

impl TranslateError {
    pub fn malformed(dialect: Dialect, err: serde_json::Error) -> Self {
        TranslateError::Malformed {
            dialect,
            message: err.to_string(),
        }
    }
}

/// Stateful streaming response translator. One instance per upstream
/// stream; `push` takes one upstream JSON payload and yields zero or
/// more client-dialect frames.
pub trait StreamTranslator: Send {
    fn push(&mut self, data: &str) -> Vec<SseFrame>;
    /// Flush frames owed at end of stream (closing events and the like).
    fn finish(&mut self) -> Vec<SseFrame>;
}

pub type RequestFn =
    Arc<dyn Fn(&str, &[u8], bool) -> Result<Vec<u8>, TranslateError> + Send + Sync>;
pub type ResponseFn = Arc<dyn Fn(&[u8]) -> Result<Vec<u8>, TranslateError> + Send + Sync>;
pub type StreamFactory = Arc<dyn Fn() -> Box<dyn StreamTranslator> + Send + Sync>;

/// One directed translation edge.
#[derive(Clone)]
pub struct Edge {
    pub from: Dialect,
    pub to: Dialect,
    pub request: RequestFn,
    pub response: ResponseFn,
    pub stream: StreamFactory,
}

impl Edge {
    pub fn identity(dialect: Dialect) -> Self {
        Edge {
            from: dialect,
            to: dialect,
            request: Arc::new(|_, raw, _| Ok(raw.to_vec())),
            response: Arc::new(|raw| Ok(raw.to_vec())),
            stream: Arc::new(move || Box::new(IdentityStream { dialect })),
        }
    }

    /// Function composition: `first` must end where `second` begins.
    /// Requests run left-to-right; responses and streams chain back
    /// right-to-left.
    pub fn compose(first: &Edge, second: &Edge) -> Edge {
        debug_assert_eq!(first.to, second.from);
        let req_a = first.request.clone();
        let req_b = second.request.clone();
        let resp_a = first.response.clone();
        let resp_b = second.response.clone();
        let stream_a = first.stream.clone();
        let stream_b = second.stream.clone();
        Edge {
            from: first.from,
            to: second.to,
            request: Arc::new(move |model, raw, stream| {
                let mid = req_a(model, raw, stream)?;
                req_b(model, &mid, stream)
            }),
            response: Arc::new(move |raw| {
                let mid = resp_b(raw)?;
                resp_a(&mid)
            }),
            stream: Arc::new(move || {
                Box::new(ChainedStream {
                    inner: stream_b(),
                    outer: stream_a(),
                })
            }),
        }
    }
}

/// Passes payloads through unchanged, restoring the event name that
/// named-event dialects carry in their `type` field.
struct IdentityStream {
    dialect: Dialect,
}

impl StreamTranslator for IdentityStream {
    fn push(&mut self, data: &str) -> Vec<SseFrame> {
        let event = match self.dialect.framing() {
            lmgate_protocol::StreamFraming::SseNamedEvent => serde_json::from_str::<
                serde_json::Value,
            >(data)
            .ok()
            .and_then(|value| {
                value
                    .get("type")
                    .and_then(|kind| kind.as_str())
                    .map(|kind| kind.to_string())
            }),
            lmgate_protocol::StreamFraming::SseDataOnly => None,
        };
        vec![SseFrame {
            event,
            data: data.to_string(),
        }]
    }

    fn finish(&mut self) -> Vec<SseFrame> {
        Vec::new()
    }
}

/// Two chained stream states: upstream payloads feed `inner`; its
/// frames feed `outer`, whose frames reach the client.
struct ChainedStream {
    inner: Box<dyn StreamTranslator>,
    outer: Box<dyn StreamTranslator>,
}

impl StreamTranslator for ChainedStream {
    fn push(&mut self, data: &str) -> Vec<SseFrame> {
        let mut out = Vec::new();
        for frame in self.inner.push(data) {
            out.extend(self.outer.push(&frame.data));
        }
        out
    }

    fn finish(&mut self) -> Vec<SseFrame> {
        let mut out = Vec::new();
        for frame in self.inner.finish() {
            out.extend(self.outer.push(&frame.data));
        }
        out.extend(self.outer.finish());
        out
    }
}
