//! Socket id propagation to outbound HTTP requests
//!
//! Broadcasting servers skip the connection that triggered an event when the
//! originating HTTP request carries its socket id in `X-Socket-Id`. The
//! [`SocketIdHook`] reads the id from the connector at request time; HTTP
//! integrations decide where the hook runs.
//!
//! Integrations are collected from [`EchoOptions::integration`] and from the
//! process-wide registry ([`register_http_integration`]). Each one reports
//! whether it is in use; absent integrations are skipped silently.
//!
//! [`EchoOptions::integration`]: crate::EchoOptions::integration

use crate::connector::Connector;
use http::{HeaderMap, HeaderValue, Request};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{debug, warn};

/// Header carrying the socket id
pub const SOCKET_ID_HEADER: &str = "x-socket-id";

/// Stamps the current socket id on request headers
///
/// Holds the connector weakly; once the client is dropped the hook does
/// nothing.
#[derive(Clone)]
pub struct SocketIdHook {
    connector: Weak<dyn Connector>,
}

impl SocketIdHook {
    pub fn new(connector: &Arc<dyn Connector>) -> Self {
        Self {
            connector: Arc::downgrade(connector),
        }
    }

    /// Whether the client this hook reads from still exists
    pub(crate) fn is_live(&self) -> bool {
        self.connector.strong_count() > 0
    }

    /// Current socket id, `None` when absent or empty
    pub fn socket_id(&self) -> Option<String> {
        self.connector
            .upgrade()?
            .socket_id()
            .filter(|id| !id.is_empty())
    }

    /// Insert `X-Socket-Id` when a socket id is available
    ///
    /// Returns whether the header was set.
    pub fn apply(&self, headers: &mut HeaderMap) -> bool {
        let Some(socket_id) = self.socket_id() else {
            return false;
        };

        match HeaderValue::from_str(&socket_id) {
            Ok(value) => {
                headers.insert(SOCKET_ID_HEADER, value);
                true
            }
            Err(_) => {
                warn!("Socket id {:?} is not a valid header value", socket_id);
                false
            }
        }
    }
}

/// An HTTP client the socket id hook can be installed on
pub trait HttpIntegration: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the integration is in use in this process
    fn is_present(&self) -> bool;

    fn install(&self, hook: SocketIdHook);
}

static HTTP_INTEGRATIONS: Lazy<RwLock<Vec<Arc<dyn HttpIntegration>>>> =
    Lazy::new(|| RwLock::new(Vec::new()));

/// Make an integration available to every client created afterwards
pub fn register_http_integration(integration: Arc<dyn HttpIntegration>) {
    debug!("Registered HTTP integration {}", integration.name());
    HTTP_INTEGRATIONS.write().push(integration);
}

pub fn registered_http_integrations() -> Vec<Arc<dyn HttpIntegration>> {
    HTTP_INTEGRATIONS.read().clone()
}

pub fn clear_http_integrations() {
    HTTP_INTEGRATIONS.write().clear();
}

/// Integration for `tower` based HTTP clients
///
/// Build a layer with [`layer`](Self::layer) and wrap the client service in
/// it; the integration reports itself present from then on.
#[derive(Clone, Default)]
pub struct TowerIntegration {
    hooks: Arc<RwLock<Vec<SocketIdHook>>>,
    layered: Arc<AtomicBool>,
}

impl TowerIntegration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(&self) -> SocketIdLayer {
        self.layered.store(true, Ordering::SeqCst);
        SocketIdLayer {
            hooks: self.hooks.clone(),
        }
    }

    /// Number of installed hooks; hooks of dropped clients are pruned on install
    pub fn hook_count(&self) -> usize {
        self.hooks.read().len()
    }
}

impl HttpIntegration for TowerIntegration {
    fn name(&self) -> &str {
        "tower"
    }

    fn is_present(&self) -> bool {
        self.layered.load(Ordering::SeqCst)
    }

    fn install(&self, hook: SocketIdHook) {
        let mut hooks = self.hooks.write();
        hooks.retain(SocketIdHook::is_live);
        hooks.push(hook);
    }
}

/// Layer adding `X-Socket-Id` to requests
#[derive(Clone)]
pub struct SocketIdLayer {
    hooks: Arc<RwLock<Vec<SocketIdHook>>>,
}

impl<S> Layer<S> for SocketIdLayer {
    type Service = SocketIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SocketIdService {
            inner,
            hooks: self.hooks.clone(),
        }
    }
}

#[derive(Clone)]
pub struct SocketIdService<S> {
    inner: S,
    hooks: Arc<RwLock<Vec<SocketIdHook>>>,
}

impl<S, B> Service<Request<B>> for SocketIdService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<B>) -> Self::Future {
        let hooks = self.hooks.read().clone();
        for hook in &hooks {
            hook.apply(request.headers_mut());
        }
        self.inner.call(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Broadcaster, EchoOptions};
    use crate::connector::{NullConnector, PusherConnector};
    use crate::transport::{MemoryPusherClient, TransportClient};
    use serial_test::serial;
    use std::convert::Infallible;
    use tower::{service_fn, ServiceExt};

    fn pusher_connector(client: &MemoryPusherClient) -> Arc<dyn Connector> {
        let options =
            EchoOptions::new(Broadcaster::Pusher).client(TransportClient::pusher(client.clone()));
        Arc::new(PusherConnector::new(&options).unwrap())
    }

    #[test]
    fn test_hook_applies_socket_id_when_connected() {
        let client = MemoryPusherClient::new();
        let connector = pusher_connector(&client);
        let hook = SocketIdHook::new(&connector);

        let mut headers = HeaderMap::new();
        assert!(!hook.apply(&mut headers));
        assert!(headers.get(SOCKET_ID_HEADER).is_none());

        client.connect_with_id("1234.5678");
        assert!(hook.apply(&mut headers));
        assert_eq!(headers.get("X-Socket-ID").unwrap(), "1234.5678");
    }

    #[test]
    fn test_hook_skips_empty_id() {
        let client = MemoryPusherClient::new();
        client.connect_with_id("");
        let connector = pusher_connector(&client);

        let mut headers = HeaderMap::new();
        assert!(!SocketIdHook::new(&connector).apply(&mut headers));
    }

    #[test]
    fn test_hook_inert_after_connector_dropped() {
        let connector: Arc<dyn Connector> =
            Arc::new(NullConnector::new(&EchoOptions::new(Broadcaster::Null)));
        let hook = SocketIdHook::new(&connector);
        assert_eq!(hook.socket_id().as_deref(), Some("fake-socket-id"));

        drop(connector);
        assert_eq!(hook.socket_id(), None);
    }

    #[test]
    fn test_install_prunes_hooks_of_dropped_clients() {
        let integration = TowerIntegration::new();

        for _ in 0..100 {
            let client = MemoryPusherClient::new();
            let connector = pusher_connector(&client);
            integration.install(SocketIdHook::new(&connector));
        }
        assert_eq!(integration.hook_count(), 1);

        let client = MemoryPusherClient::new();
        let live = pusher_connector(&client);
        integration.install(SocketIdHook::new(&live));
        let other = pusher_connector(&client);
        integration.install(SocketIdHook::new(&other));
        assert_eq!(integration.hook_count(), 2);
    }

    #[test]
    fn test_tower_integration_presence() {
        let integration = TowerIntegration::new();
        assert!(!integration.is_present());

        let _layer = integration.layer();
        assert!(integration.is_present());
    }

    #[tokio::test]
    async fn test_layer_stamps_request() {
        let client = MemoryPusherClient::new();
        client.connect_with_id("42.99");
        let connector = pusher_connector(&client);

        let integration = TowerIntegration::new();
        let layer = integration.layer();
        integration.install(SocketIdHook::new(&connector));

        let service = layer.layer(service_fn(|request: Request<()>| async move {
            Ok::<_, Infallible>(
                request
                    .headers()
                    .get(SOCKET_ID_HEADER)
                    .map(|value| value.to_str().unwrap_or_default().to_string()),
            )
        }));

        let stamped = service
            .oneshot(Request::get("/orders").body(()).unwrap())
            .await
            .unwrap();
        assert_eq!(stamped.as_deref(), Some("42.99"));
    }

    #[test]
    #[serial]
    fn test_global_registry() {
        clear_http_integrations();
        register_http_integration(Arc::new(TowerIntegration::new()));

        let registered = registered_http_integrations();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].name(), "tower");

        clear_http_integrations();
        assert!(registered_http_integrations().is_empty());
    }
}
