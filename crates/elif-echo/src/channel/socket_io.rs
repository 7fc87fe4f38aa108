//! Channels multiplexed over a Socket.IO connection
//!
//! A Socket.IO broadcast server emits every event on the shared socket with
//! the originating channel as the first argument. Each channel installs one
//! socket listener per event, filters on its own name and fans out to the
//! callbacks registered for that event.

use super::{client_events_unsupported, Channel, ChannelType, MembersCallback, PresenceChannel};
use crate::error::EchoResult;
use crate::formatter::EventFormatter;
use crate::transport::{EventCallback, GlobalCallback, SocketIoClient, SocketListener};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

type CallbackMap = HashMap<String, Vec<EventCallback>>;

/// A channel on a Socket.IO broadcast server
pub struct SocketIoChannel {
    name: String,
    channel_type: ChannelType,
    socket: Arc<dyn SocketIoClient>,
    formatter: EventFormatter,
    /// Authorization payload sent with subscribe/unsubscribe
    auth: Value,
    callbacks: Arc<Mutex<CallbackMap>>,
    /// Socket-level listener installed per event name
    listeners: Mutex<HashMap<String, SocketListener>>,
    /// Listeners for socket lifecycle events, not scoped to the channel
    lifecycle_listeners: Mutex<Vec<(String, SocketListener)>>,
}

impl SocketIoChannel {
    /// Create the channel and subscribe to it
    pub fn new(
        socket: Arc<dyn SocketIoClient>,
        name: impl Into<String>,
        channel_type: ChannelType,
        formatter: EventFormatter,
        auth: Value,
    ) -> Self {
        let channel = Self {
            name: name.into(),
            channel_type,
            socket,
            formatter,
            auth,
            callbacks: Arc::new(Mutex::new(HashMap::new())),
            listeners: Mutex::new(HashMap::new()),
            lifecycle_listeners: Mutex::new(Vec::new()),
        };
        channel.subscribe();
        channel
    }

    pub fn formatter(&self) -> &EventFormatter {
        &self.formatter
    }

    /// Events this channel currently has a socket listener for
    pub fn bound_events(&self) -> Vec<String> {
        self.listeners.lock().keys().cloned().collect()
    }

    /// Register a callback for a raw event name
    fn on(&self, event: &str, callback: EventCallback) -> &Self {
        self.callbacks
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(callback);

        let mut listeners = self.listeners.lock();
        if !listeners.contains_key(event) {
            let name = self.name.clone();
            let event_name = event.to_string();
            let callbacks = Arc::downgrade(&self.callbacks);

            let listener: SocketListener = Arc::new(move |channel: &str, data: &Value| {
                if channel != name {
                    return;
                }
                let Some(callbacks) = callbacks.upgrade() else {
                    return;
                };
                let bound = callbacks.lock().get(&event_name).cloned().unwrap_or_default();
                for callback in bound {
                    callback(data);
                }
            });

            self.socket.on(event, listener.clone());
            listeners.insert(event.to_string(), listener);
        }

        self
    }

    /// Remove one callback, or all of them, for a raw event name
    ///
    /// The socket listener goes away together with the last callback.
    fn unbind_event(&self, event: &str, callback: Option<&EventCallback>) {
        let remaining = {
            let mut callbacks = self.callbacks.lock();
            if let (Some(callback), Some(bound)) = (callback, callbacks.get_mut(event)) {
                bound.retain(|existing| !Arc::ptr_eq(existing, callback));
            }

            let remaining = match callback {
                Some(_) => callbacks.get(event).map(Vec::len).unwrap_or(0),
                None => 0,
            };
            if remaining == 0 {
                callbacks.remove(event);
            }
            remaining
        };

        if remaining == 0 {
            let listener = self.listeners.lock().remove(event);
            if let Some(listener) = listener {
                self.socket.off(event, &listener);
            }
        }
    }

    /// Remove every listener this channel installed on the socket
    fn unbind(&self) {
        let events: Vec<String> = self.listeners.lock().keys().cloned().collect();
        for event in events {
            self.unbind_event(&event, None);
        }

        let lifecycle: Vec<(String, SocketListener)> =
            self.lifecycle_listeners.lock().drain(..).collect();
        for (event, listener) in lifecycle {
            self.socket.off(&event, &listener);
        }
    }

    fn channel_payload(&self) -> Value {
        json!({ "channel": self.name, "auth": self.auth })
    }
}

impl Channel for SocketIoChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    fn subscribe(&self) {
        self.socket.emit("subscribe", self.channel_payload());
        debug!("Subscribed to {} channel {}", self.channel_type, self.name);
    }

    fn unsubscribe(&self) {
        self.unbind();
        self.socket.emit("unsubscribe", self.channel_payload());
    }

    fn listen(&self, event: &str, callback: EventCallback) -> &dyn Channel {
        self.on(&self.formatter.format(event), callback)
    }

    fn listen_to_all(&self, _callback: GlobalCallback) -> &dyn Channel {
        warn!(
            "Socket.IO channel {} does not support listening to all events",
            self.name
        );
        self
    }

    fn stop_listening(&self, event: &str, callback: Option<&EventCallback>) -> &dyn Channel {
        self.unbind_event(&self.formatter.format(event), callback);
        self
    }

    fn stop_listening_to_all(&self, _callback: Option<&GlobalCallback>) -> &dyn Channel {
        self
    }

    fn subscribed(&self, callback: EventCallback) -> &dyn Channel {
        let listener: SocketListener = Arc::new(move |_: &str, data: &Value| callback(data));
        self.socket.on("connect", listener.clone());
        self.lifecycle_listeners
            .lock()
            .push(("connect".to_string(), listener));
        self
    }

    fn error(&self, _callback: EventCallback) -> &dyn Channel {
        self
    }

    fn whisper(&self, event: &str, data: &Value) -> EchoResult<&dyn Channel> {
        if !self.channel_type.allows_client_events() {
            return Err(client_events_unsupported(self.channel_type, &self.name, event));
        }

        self.socket.emit(
            "client event",
            json!({
                "channel": self.name,
                "event": format!("client-{}", event),
                "data": data,
            }),
        );

        Ok(self)
    }
}

fn user_info(member: &Value) -> &Value {
    member.get("user_info").unwrap_or(&Value::Null)
}

impl PresenceChannel for SocketIoChannel {
    fn here(&self, callback: MembersCallback) -> &dyn PresenceChannel {
        self.on(
            "presence:subscribed",
            Arc::new(move |members: &Value| {
                let roster: Vec<Value> = members
                    .as_array()
                    .map(|members| members.iter().map(|m| user_info(m).clone()).collect())
                    .unwrap_or_default();
                callback(roster.as_slice());
            }),
        )
    }

    fn joining(&self, callback: EventCallback) -> &dyn PresenceChannel {
        self.on(
            "presence:joining",
            Arc::new(move |member: &Value| callback(user_info(member))),
        )
    }

    fn leaving(&self, callback: EventCallback) -> &dyn PresenceChannel {
        self.on(
            "presence:leaving",
            Arc::new(move |member: &Value| callback(user_info(member))),
        )
    }

    fn into_channel(self: Arc<Self>) -> Arc<dyn Channel> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::members_callback;
    use crate::transport::{callback, global_callback, MemorySocketIoClient};
    use tracing_test::traced_test;

    fn channel(socket: &MemorySocketIoClient, name: &str, channel_type: ChannelType) -> SocketIoChannel {
        SocketIoChannel::new(
            Arc::new(socket.clone()),
            name,
            channel_type,
            EventFormatter::default(),
            json!({ "headers": {} }),
        )
    }

    #[test]
    fn test_subscribe_emits_channel_and_auth() {
        let socket = MemorySocketIoClient::new();
        let _orders = channel(&socket, "orders", ChannelType::Public);

        assert_eq!(
            socket.emitted_payloads("subscribe"),
            vec![json!({ "channel": "orders", "auth": { "headers": {} } })]
        );
    }

    #[test]
    fn test_events_are_scoped_to_channel() {
        let socket = MemorySocketIoClient::new();
        let orders = channel(&socket, "orders", ChannelType::Public);

        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        orders.listen(
            "OrderShipped",
            callback(move |data| received_clone.lock().push(data.clone())),
        );

        socket.deliver("App\\Events\\OrderShipped", "orders", &json!({ "id": 1 }));
        socket.deliver("App\\Events\\OrderShipped", "invoices", &json!({ "id": 2 }));

        assert_eq!(*received.lock(), vec![json!({ "id": 1 })]);
    }

    #[test]
    fn test_one_socket_listener_per_event() {
        let socket = MemorySocketIoClient::new();
        let orders = channel(&socket, "orders", ChannelType::Public);
        let first = callback(|_| {});
        let second = callback(|_| {});

        orders
            .listen("OrderShipped", first.clone())
            .listen("OrderShipped", second.clone());
        assert_eq!(socket.listener_count("App\\Events\\OrderShipped"), 1);

        orders.stop_listening("OrderShipped", Some(&first));
        assert_eq!(socket.listener_count("App\\Events\\OrderShipped"), 1);

        orders.stop_listening("OrderShipped", Some(&second));
        assert_eq!(socket.listener_count("App\\Events\\OrderShipped"), 0);
        assert!(orders.bound_events().is_empty());
    }

    #[test]
    fn test_unsubscribe_removes_listeners() {
        let socket = MemorySocketIoClient::new();
        let orders = channel(&socket, "orders", ChannelType::Public);
        orders
            .listen("OrderShipped", callback(|_| {}))
            .listen("OrderCancelled", callback(|_| {}))
            .subscribed(callback(|_| {}));

        orders.unsubscribe();

        assert_eq!(socket.listener_count("App\\Events\\OrderShipped"), 0);
        assert_eq!(socket.listener_count("App\\Events\\OrderCancelled"), 0);
        assert_eq!(socket.listener_count("connect"), 0);
        assert_eq!(socket.emitted_payloads("unsubscribe").len(), 1);
    }

    #[test]
    #[traced_test]
    fn test_listen_to_all_is_ignored() {
        let socket = MemorySocketIoClient::new();
        let orders = channel(&socket, "orders", ChannelType::Public);

        orders.listen_to_all(global_callback(|_, _| {}));

        assert!(orders.bound_events().is_empty());
        assert!(logs_contain("does not support listening to all events"));
    }

    #[test]
    fn test_whisper_emits_client_event() {
        let socket = MemorySocketIoClient::new();
        let chat = channel(&socket, "private-chat", ChannelType::Private);

        chat.whisper("typing", &json!({ "user": "ada" })).unwrap();

        assert_eq!(
            socket.emitted_payloads("client event"),
            vec![json!({
                "channel": "private-chat",
                "event": "client-typing",
                "data": { "user": "ada" }
            })]
        );
    }

    #[test]
    fn test_presence_roster_events() {
        let socket = MemorySocketIoClient::new();
        let room = channel(&socket, "presence-room", ChannelType::Presence);

        let roster = Arc::new(Mutex::new(Vec::new()));
        let joined = Arc::new(Mutex::new(Vec::new()));
        let (roster_c, joined_c) = (roster.clone(), joined.clone());

        room.here(members_callback(move |members| {
            roster_c.lock().extend(members.iter().cloned())
        }))
        .joining(callback(move |info| joined_c.lock().push(info.clone())));

        socket.deliver(
            "presence:subscribed",
            "presence-room",
            &json!([
                { "user_id": 1, "user_info": { "name": "Ada" } },
                { "user_id": 2, "user_info": { "name": "Grace" } }
            ]),
        );
        socket.deliver(
            "presence:joining",
            "presence-room",
            &json!({ "user_id": 3, "user_info": { "name": "Linus" } }),
        );

        assert_eq!(
            *roster.lock(),
            vec![json!({ "name": "Ada" }), json!({ "name": "Grace" })]
        );
        assert_eq!(*joined.lock(), vec![json!({ "name": "Linus" })]);
    }
}
