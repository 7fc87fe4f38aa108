//! Transport SDK boundary
//!
//! The connectors never speak a wire protocol themselves. They drive a
//! transport client through the traits below, which cover exactly the part of
//! a Pusher-compatible or Socket.IO-compatible client SDK the connectors use.
//! Connection establishment, reconnection and authentication stay inside the
//! client implementation.

pub mod memory;

pub use memory::{MemoryPusherClient, MemorySocketIoClient, MemorySubscription};

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Callback receiving an event payload
pub type EventCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Callback receiving an event name and its payload
pub type GlobalCallback = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Socket.IO listener receiving the channel name and the payload
pub type SocketListener = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Wrap a closure as an [`EventCallback`]
pub fn callback<F>(f: F) -> EventCallback
where
    F: Fn(&Value) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a closure as a [`GlobalCallback`]
pub fn global_callback<F>(f: F) -> GlobalCallback
where
    F: Fn(&str, &Value) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Client for a Pusher-protocol service (Pusher Channels, Laravel Reverb, Soketi)
pub trait PusherClient: Send + Sync {
    /// Subscribe to a channel, returning its subscription handle
    ///
    /// Subscribing to an already subscribed channel returns the same handle.
    /// Implementations must not deliver events synchronously from this call;
    /// it runs while the connector's channel registry is locked.
    fn subscribe(&self, channel: &str) -> Arc<dyn PusherSubscription>;

    /// Unsubscribe from a channel
    fn unsubscribe(&self, channel: &str);

    /// Socket id assigned by the server, `None` until the handshake completes
    fn socket_id(&self) -> Option<String>;

    /// Authenticate the connected user (user authentication endpoint)
    fn signin(&self) {}

    /// Close the connection
    fn disconnect(&self);
}

/// Handle for a single Pusher channel subscription
pub trait PusherSubscription: Send + Sync {
    fn bind(&self, event: &str, callback: EventCallback);

    /// Remove one callback (by identity) or every callback bound to `event`
    fn unbind(&self, event: &str, callback: Option<&EventCallback>);

    fn bind_global(&self, callback: GlobalCallback);

    /// Remove one global callback (by identity) or all of them
    fn unbind_global(&self, callback: Option<&GlobalCallback>);

    /// Trigger a client event, returning whether it was accepted
    fn trigger(&self, event: &str, data: &Value) -> bool;
}

/// Client for a Socket.IO broadcast server (laravel-echo-server style)
pub trait SocketIoClient: Send + Sync {
    /// Socket id, `None` while disconnected
    fn id(&self) -> Option<String>;

    /// Send an event to the server
    ///
    /// Must not invoke listeners synchronously; channel subscription emits
    /// run while the connector's channel registry is locked.
    fn emit(&self, event: &str, payload: Value);

    /// Register a listener; listeners receive the channel the event was sent on
    fn on(&self, event: &str, listener: SocketListener);

    /// Remove a listener by identity
    fn off(&self, event: &str, listener: &SocketListener);

    fn disconnect(&self);
}

/// A transport client handed to the broadcasting client at construction
#[derive(Clone)]
pub enum TransportClient {
    Pusher(Arc<dyn PusherClient>),
    SocketIo(Arc<dyn SocketIoClient>),
}

impl TransportClient {
    pub fn pusher<C: PusherClient + 'static>(client: C) -> Self {
        Self::Pusher(Arc::new(client))
    }

    pub fn socket_io<C: SocketIoClient + 'static>(client: C) -> Self {
        Self::SocketIo(Arc::new(client))
    }

    /// Transport family name, for diagnostics
    pub fn family(&self) -> &'static str {
        match self {
            Self::Pusher(_) => "pusher",
            Self::SocketIo(_) => "socket.io",
        }
    }
}

impl fmt::Debug for TransportClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TransportClient").field(&self.family()).finish()
    }
}
