use axum::body::Body;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use pkix_proto::{HttpReply, InboundRequest, TransportError, UpstreamClient};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::config::{Config, ConfigError, Mode};
use crate::forwarder::Forwarder;
use crate::responder::{OcspHandler, Responder};
use crate::store::{FsStore, StoreError};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("HTTP client error: {0}")]
    Client(#[from] TransportError),
}

#[derive(Clone)]
struct AppState {
    handler: Arc<dyn OcspHandler>,
    prefix: Arc<str>,
}

/// HTTP front end for a responder or forwarder
pub struct PkixServer {
    addr: SocketAddr,
    router: Router,
}

impl PkixServer {
    /// Build the handler `config.mode` asks for
    pub fn from_config(config: &Config) -> Result<Self, ServerError> {
        config.validate()?;
        let methods = config.methods()?;

        let handler: Arc<dyn OcspHandler> = match config.mode {
            Mode::Responder => {
                let store_config = config
                    .store
                    .as_ref()
                    .ok_or_else(|| ConfigError::Invalid("missing store section".to_string()))?;
                let store = FsStore::new(&store_config.base_dir)?;
                info!(base_dir = %store.base_dir().display(), "Serving responses from store");
                Arc::new(Responder::new(Arc::new(store), config.max_age, methods))
            }
            Mode::Forwarder => {
                let upstream = config
                    .upstream
                    .as_ref()
                    .ok_or_else(|| ConfigError::Invalid("missing upstream section".to_string()))?;
                let client = UpstreamClient::new(upstream.timeout(), upstream.retry_policy())?;
                info!(
                    url = %upstream.url,
                    method = %upstream.method,
                    timeout_secs = upstream.timeout_secs,
                    max_retries = upstream.max_retries,
                    "Forwarding requests upstream"
                );
                Arc::new(Forwarder::new(client, upstream.url.clone(), upstream.method()?, methods))
            }
        };

        Ok(Self {
            addr: config.socket_addr()?,
            router: router(handler, config.normalized_prefix()),
        })
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn run(self) -> Result<(), ServerError> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!("Listening on http://{}", listener.local_addr()?);
        axum::serve(listener, self.router).await?;
        Ok(())
    }
}

/// Router sending every request under `prefix` to `handler`
pub fn router(handler: Arc<dyn OcspHandler>, prefix: &str) -> Router {
    let state = AppState {
        handler,
        prefix: Arc::from(prefix.trim_end_matches('/')),
    };
    Router::new()
        .fallback(handle)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(path_info) = strip_prefix(uri.path(), &state.prefix) else {
        debug!(path = uri.path(), "Request outside the service prefix");
        return StatusCode::NOT_FOUND.into_response();
    };

    let request = InboundRequest {
        method,
        path_info: path_info.to_string(),
        content_type: headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    };
    to_response(state.handler.handle(&request).await)
}

/// Path below `prefix`, keeping its leading slash
fn strip_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

pub fn to_response(reply: HttpReply) -> Response {
    let mut response = Response::new(Body::from(reply.body));
    *response.status_mut() = reply.status;
    let headers = response.headers_mut();
    for (name, value) in reply.headers {
        headers.append(name, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_prefix("/MFAw", ""), Some("/MFAw"));
        assert_eq!(strip_prefix("/", ""), Some("/"));
        assert_eq!(strip_prefix("/ocsp/MFAw", "/ocsp"), Some("/MFAw"));
        assert_eq!(strip_prefix("/ocsp", "/ocsp"), Some(""));
        assert_eq!(strip_prefix("/ocspx/MFAw", "/ocsp"), None);
        assert_eq!(strip_prefix("/other", "/ocsp"), None);
    }

    #[test]
    fn test_to_response() {
        let reply = HttpReply {
            status: StatusCode::OK,
            headers: vec![(CONTENT_TYPE, "application/ocsp-response".parse().unwrap())],
            body: Bytes::from_static(&[0x30, 0x03, 0x0a, 0x01, 0x01]),
        };
        let response = to_response(reply);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/ocsp-response");
    }

    #[test]
    fn test_from_config_rejects_missing_store_dir() {
        let config = Config {
            store: Some(crate::config::StoreConfig {
                base_dir: "/nonexistent/pkix".into(),
            }),
            ..Config::default()
        };
        assert!(matches!(PkixServer::from_config(&config), Err(ServerError::Store(_))));
    }
}
