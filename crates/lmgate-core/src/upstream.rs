//! Outbound HTTP plumbing. The executor talks to a trait object so
//! tests can swap in a scripted upstream.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use wreq::{Client, Proxy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Other,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub stream: bool,
}

#[derive(Debug)]
pub enum UpstreamBody {
    Bytes(Bytes),
    Stream(tokio::sync::mpsc::Receiver<Bytes>),
}

#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: UpstreamBody,
}

impl UpstreamResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

pub trait UpstreamClient: Send + Sync {
    fn send<'a>(
        &'a self,
        request: UpstreamRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UpstreamResponse, TransportError>> + Send + 'a>>;
}

#[derive(Debug, Clone)]
pub struct UpstreamClientConfig {
    pub proxy: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub stream_idle_timeout: Duration,
}

impl Default for UpstreamClientConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(600),
            stream_idle_timeout: Duration::from_secs(60),
        }
    }
}

/// `wreq`-backed client; one cached `Client` per proxy value so a
/// config reload that changes `proxy-url` takes effect on the next
/// request without rebuilding in-flight ones.
pub struct WreqUpstreamClient {
    config: UpstreamClientConfig,
    proxy_resolver: Arc<dyn Fn() -> Option<String> + Send + Sync>,
    clients: Mutex<HashMap<Option<String>, Client>>,
}

impl WreqUpstreamClient {
    pub fn new(config: UpstreamClientConfig) -> Result<Self, wreq::Error> {
        let proxy = config.proxy.clone();
        Self::with_proxy_resolver(config, move || proxy.clone())
    }

    pub fn with_proxy_resolver<F>(
        config: UpstreamClientConfig,
        proxy_resolver: F,
    ) -> Result<Self, wreq::Error>
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        let client = Self {
            config,
            proxy_resolver: Arc::new(proxy_resolver),
            clients: Mutex::new(HashMap::new()),
        };
        // Fail fast on an unusable proxy URL.
        client.client_for(client.current_proxy())?;
        Ok(client)
    }

    fn current_proxy(&self) -> Option<String> {
        (self.proxy_resolver)()
            .map(|proxy| proxy.trim().to_string())
            .filter(|proxy| !proxy.is_empty())
    }

    fn client_for(&self, proxy: Option<String>) -> Result<Client, wreq::Error> {
        let mut clients = self.clients.lock().expect("client cache poisoned");
        if let Some(client) = clients.get(&proxy) {
            return Ok(client.clone());
        }
        let mut builder = Client::builder()
            .connect_timeout(self.config.connect_timeout)
            .timeout(self.config.request_timeout)
            .read_timeout(self.config.stream_idle_timeout);
        if let Some(proxy) = proxy.as_deref() {
            builder = builder.proxy(Proxy::all(proxy)?);
        }
        let client = builder.build()?;
        clients.insert(proxy, client.clone());
        Ok(client)
    }
}

impl UpstreamClient for WreqUpstreamClient {
    fn send<'a>(
        &'a self,
        request: UpstreamRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UpstreamResponse, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            let client = self
                .client_for(self.current_proxy())
                .map_err(map_wreq_error)?;
            let mut builder = client.post(&request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }
            let response = builder
                .body(request.body.clone())
                .send()
                .await
                .map_err(map_wreq_error)?;

            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|value| (name.as_str().to_string(), value.to_string()))
                })
                .collect();

            let success = (200..300).contains(&status);
            if !success || !request.stream {
                let body = response.bytes().await.map_err(map_wreq_error)?;
                return Ok(UpstreamResponse {
                    status,
                    headers,
                    body: UpstreamBody::Bytes(body),
                });
            }

            let idle = self.config.stream_idle_timeout;
            let (tx, rx) = tokio::sync::mpsc::channel::<Bytes>(32);
            tokio::spawn(async move {
                let mut stream = response.bytes_stream();
                loop {
                    let next = tokio::time::timeout(idle, stream.next()).await;
                    let Ok(item) = next else { break };
                    let Some(item) = item else { break };
                    let Ok(chunk) = item else { break };
                    if tx.send(chunk).await.is_err() {
                        break;
                    }
                }
            });
            Ok(UpstreamResponse {
                status,
                headers,
                body: UpstreamBody::Stream(rx),
            })
        })
    }
}

fn map_wreq_error(err: wreq::Error) -> TransportError {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else {
        TransportErrorKind::Other
    };
    TransportError {
        kind,
        message: err.to_string(),
    }
}
