//! In-process loopback transports
//!
//! `MemoryPusherClient` and `MemorySocketIoClient` implement the transport
//! traits without a network connection. They record every subscribe,
//! unsubscribe and emit so callers can observe what the connectors did, and
//! let the host deliver server events by hand. Handles are cheap to clone and
//! share state, so a test can keep one copy while the connector owns another.

use super::{
    EventCallback, GlobalCallback, PusherClient, PusherSubscription, SocketIoClient,
    SocketListener,
};
use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

fn pusher_socket_id() -> String {
    let mut rng = rand::thread_rng();
    format!(
        "{}.{}",
        rng.gen_range(100_000_000u64..1_000_000_000),
        rng.gen_range(100_000_000u64..1_000_000_000)
    )
}

fn socket_io_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(20)
        .map(char::from)
        .collect()
}

/// A subscription held by [`MemoryPusherClient`]
pub struct MemorySubscription {
    name: String,
    bindings: Mutex<Vec<(String, EventCallback)>>,
    globals: Mutex<Vec<GlobalCallback>>,
    triggered: Mutex<Vec<(String, Value)>>,
}

impl MemorySubscription {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            bindings: Mutex::new(Vec::new()),
            globals: Mutex::new(Vec::new()),
            triggered: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deliver a server event to the bound callbacks
    ///
    /// Returns the number of callbacks invoked, global bindings included.
    pub fn emit(&self, event: &str, data: &Value) -> usize {
        let callbacks: Vec<EventCallback> = self
            .bindings
            .lock()
            .iter()
            .filter(|(bound, _)| bound == event)
            .map(|(_, callback)| callback.clone())
            .collect();
        let globals: Vec<GlobalCallback> = self.globals.lock().clone();

        for callback in &callbacks {
            callback(data);
        }
        for callback in &globals {
            callback(event, data);
        }

        callbacks.len() + globals.len()
    }

    pub fn binding_count(&self, event: &str) -> usize {
        self.bindings
            .lock()
            .iter()
            .filter(|(bound, _)| bound == event)
            .count()
    }

    pub fn global_binding_count(&self) -> usize {
        self.globals.lock().len()
    }

    /// Client events triggered on this subscription, oldest first
    pub fn triggered(&self) -> Vec<(String, Value)> {
        self.triggered.lock().clone()
    }
}

impl PusherSubscription for MemorySubscription {
    fn bind(&self, event: &str, callback: EventCallback) {
        self.bindings.lock().push((event.to_string(), callback));
    }

    fn unbind(&self, event: &str, callback: Option<&EventCallback>) {
        self.bindings.lock().retain(|(bound, existing)| {
            let matches = bound == event && callback.map_or(true, |cb| Arc::ptr_eq(cb, existing));
            !matches
        });
    }

    fn bind_global(&self, callback: GlobalCallback) {
        self.globals.lock().push(callback);
    }

    fn unbind_global(&self, callback: Option<&GlobalCallback>) {
        match callback {
            Some(callback) => self
                .globals
                .lock()
                .retain(|existing| !Arc::ptr_eq(callback, existing)),
            None => self.globals.lock().clear(),
        }
    }

    fn trigger(&self, event: &str, data: &Value) -> bool {
        // Pusher only relays client events on authenticated channels
        if !(self.name.starts_with("private-") || self.name.starts_with("presence-")) {
            return false;
        }

        self.triggered.lock().push((event.to_string(), data.clone()));
        true
    }
}

#[derive(Default)]
struct PusherState {
    socket_id: Option<String>,
    subscriptions: HashMap<String, Arc<MemorySubscription>>,
    subscribe_calls: HashMap<String, usize>,
    unsubscribe_calls: HashMap<String, usize>,
    signins: usize,
}

/// Loopback Pusher-protocol client
#[derive(Clone, Default)]
pub struct MemoryPusherClient {
    state: Arc<Mutex<PusherState>>,
}

impl MemoryPusherClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Complete the handshake with a generated socket id
    pub fn connect(&self) -> String {
        let socket_id = pusher_socket_id();
        self.connect_with_id(socket_id.clone());
        socket_id
    }

    /// Complete the handshake with a fixed socket id
    pub fn connect_with_id(&self, socket_id: impl Into<String>) {
        let socket_id = socket_id.into();
        debug!("Memory pusher connection established: {}", socket_id);
        self.state.lock().socket_id = Some(socket_id);
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().socket_id.is_some()
    }

    pub fn subscription(&self, channel: &str) -> Option<Arc<MemorySubscription>> {
        self.state.lock().subscriptions.get(channel).cloned()
    }

    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.state.lock().subscriptions.contains_key(channel)
    }

    pub fn subscribed_channels(&self) -> Vec<String> {
        self.state.lock().subscriptions.keys().cloned().collect()
    }

    /// Number of times `subscribe` was called for `channel`
    pub fn subscribe_count(&self, channel: &str) -> usize {
        self.state
            .lock()
            .subscribe_calls
            .get(channel)
            .copied()
            .unwrap_or(0)
    }

    /// Number of times `unsubscribe` was called for `channel`
    pub fn unsubscribe_count(&self, channel: &str) -> usize {
        self.state
            .lock()
            .unsubscribe_calls
            .get(channel)
            .copied()
            .unwrap_or(0)
    }

    pub fn signin_count(&self) -> usize {
        self.state.lock().signins
    }

    /// Deliver a server event on a subscribed channel
    pub fn deliver(&self, channel: &str, event: &str, data: &Value) -> usize {
        match self.subscription(channel) {
            Some(subscription) => subscription.emit(event, data),
            None => 0,
        }
    }
}

impl PusherClient for MemoryPusherClient {
    fn subscribe(&self, channel: &str) -> Arc<dyn PusherSubscription> {
        let mut state = self.state.lock();
        *state.subscribe_calls.entry(channel.to_string()).or_insert(0) += 1;

        state
            .subscriptions
            .entry(channel.to_string())
            .or_insert_with(|| Arc::new(MemorySubscription::new(channel)))
            .clone()
    }

    fn unsubscribe(&self, channel: &str) {
        let mut state = self.state.lock();
        *state.unsubscribe_calls.entry(channel.to_string()).or_insert(0) += 1;
        state.subscriptions.remove(channel);
    }

    fn socket_id(&self) -> Option<String> {
        self.state.lock().socket_id.clone()
    }

    fn signin(&self) {
        self.state.lock().signins += 1;
    }

    fn disconnect(&self) {
        debug!("Memory pusher connection closed");
        self.state.lock().socket_id = None;
    }
}

#[derive(Default)]
struct SocketState {
    id: Option<String>,
    listeners: HashMap<String, Vec<SocketListener>>,
    emitted: Vec<(String, Value)>,
}

/// Loopback Socket.IO client
#[derive(Clone, Default)]
pub struct MemorySocketIoClient {
    state: Arc<Mutex<SocketState>>,
}

impl MemorySocketIoClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect with a generated socket id
    pub fn connect(&self) -> String {
        let id = socket_io_id();
        self.connect_with_id(id.clone());
        id
    }

    pub fn connect_with_id(&self, id: impl Into<String>) {
        self.state.lock().id = Some(id.into());
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().id.is_some()
    }

    /// Simulate a dropped and re-established connection
    ///
    /// Assigns a fresh socket id and fires the `reconnect` event.
    pub fn reconnect(&self) -> String {
        let id = self.connect();
        self.deliver("reconnect", "", &Value::Null);
        id
    }

    /// Deliver a server event; listeners receive `channel` and `data`
    pub fn deliver(&self, event: &str, channel: &str, data: &Value) -> usize {
        let listeners: Vec<SocketListener> = self
            .state
            .lock()
            .listeners
            .get(event)
            .cloned()
            .unwrap_or_default();

        for listener in &listeners {
            listener(channel, data);
        }

        listeners.len()
    }

    /// Every emitted event, oldest first
    pub fn emitted(&self) -> Vec<(String, Value)> {
        self.state.lock().emitted.clone()
    }

    /// Payloads emitted under `event`, oldest first
    pub fn emitted_payloads(&self, event: &str) -> Vec<Value> {
        self.state
            .lock()
            .emitted
            .iter()
            .filter(|(emitted, _)| emitted == event)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.state
            .lock()
            .listeners
            .get(event)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl SocketIoClient for MemorySocketIoClient {
    fn id(&self) -> Option<String> {
        self.state.lock().id.clone()
    }

    fn emit(&self, event: &str, payload: Value) {
        self.state.lock().emitted.push((event.to_string(), payload));
    }

    fn on(&self, event: &str, listener: SocketListener) {
        self.state
            .lock()
            .listeners
            .entry(event.to_string())
            .or_default()
            .push(listener);
    }

    fn off(&self, event: &str, listener: &SocketListener) {
        let mut state = self.state.lock();
        if let Some(listeners) = state.listeners.get_mut(event) {
            listeners.retain(|existing| !Arc::ptr_eq(existing, listener));
            if listeners.is_empty() {
                state.listeners.remove(event);
            }
        }
    }

    fn disconnect(&self) {
        self.state.lock().id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::callback;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_pusher_subscribe_is_shared_per_channel() {
        let client = MemoryPusherClient::new();
        let first = client.subscribe("orders");
        let second = client.subscribe("orders");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(client.subscribe_count("orders"), 2);

        client.unsubscribe("orders");
        assert!(!client.is_subscribed("orders"));
        assert_eq!(client.unsubscribe_count("orders"), 1);
    }

    #[test]
    fn test_pusher_deliver_and_unbind() {
        let client = MemoryPusherClient::new();
        let subscription = client.subscribe("orders");

        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        let cb = callback(move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        subscription.bind("created", cb.clone());
        assert_eq!(client.deliver("orders", "created", &json!({})), 1);
        assert_eq!(client.deliver("orders", "deleted", &json!({})), 0);

        subscription.unbind("created", Some(&cb));
        assert_eq!(client.deliver("orders", "created", &json!({})), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_trigger_rejected_on_public_channel() {
        let client = MemoryPusherClient::new();
        assert!(!client.subscribe("news").trigger("client-typing", &json!({})));
        assert!(client
            .subscribe("private-chat")
            .trigger("client-typing", &json!({})));
        assert_eq!(
            client.subscription("private-chat").unwrap().triggered().len(),
            1
        );
    }

    #[test]
    fn test_pusher_socket_id_lifecycle() {
        let client = MemoryPusherClient::new();
        assert_eq!(client.socket_id(), None);

        let id = client.connect();
        assert!(id.contains('.'));
        assert_eq!(client.socket_id(), Some(id));

        client.disconnect();
        assert!(!client.is_connected());
    }

    #[test]
    fn test_socket_io_listeners() {
        let client = MemorySocketIoClient::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let listener: SocketListener = Arc::new(move |channel, _| {
            seen_clone.lock().push(channel.to_string());
        });

        client.on("App\\Events\\Paid", listener.clone());
        client.deliver("App\\Events\\Paid", "orders", &json!({}));
        assert_eq!(*seen.lock(), vec!["orders".to_string()]);

        client.off("App\\Events\\Paid", &listener);
        assert_eq!(client.listener_count("App\\Events\\Paid"), 0);
        assert_eq!(client.deliver("App\\Events\\Paid", "orders", &json!({})), 0);
    }

    #[test]
    fn test_socket_io_records_emits() {
        let client = MemorySocketIoClient::new();
        client.emit("subscribe", json!({ "channel": "orders" }));
        client.emit("unsubscribe", json!({ "channel": "orders" }));

        assert_eq!(client.emitted().len(), 2);
        assert_eq!(
            client.emitted_payloads("subscribe"),
            vec![json!({ "channel": "orders" })]
        );
        assert_eq!(client.connect().len(), 20);
    }
}
