//! Channels backed by a Pusher-protocol subscription

use super::{client_events_unsupported, Channel, ChannelType, MembersCallback, PresenceChannel};
use crate::error::EchoResult;
use crate::formatter::EventFormatter;
use crate::transport::{EventCallback, GlobalCallback, PusherClient, PusherSubscription};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

const SUBSCRIPTION_SUCCEEDED: &str = "pusher:subscription_succeeded";
const SUBSCRIPTION_ERROR: &str = "pusher:subscription_error";
const MEMBER_ADDED: &str = "pusher:member_added";
const MEMBER_REMOVED: &str = "pusher:member_removed";

/// A channel on a Pusher, Reverb or other Pusher-compatible service
///
/// One type covers every access mode; the connector records which mode the
/// channel was opened with and only hands out the presence API for
/// `presence-` channels.
pub struct PusherChannel {
    name: String,
    channel_type: ChannelType,
    client: Arc<dyn PusherClient>,
    formatter: EventFormatter,
    subscription: RwLock<Arc<dyn PusherSubscription>>,
    /// Global callbacks as registered, paired with the filtering wrapper bound on the subscription
    global_callbacks: Mutex<Vec<(GlobalCallback, GlobalCallback)>>,
}

impl PusherChannel {
    /// Create the channel and subscribe to it
    pub fn new(
        client: Arc<dyn PusherClient>,
        name: impl Into<String>,
        channel_type: ChannelType,
        formatter: EventFormatter,
    ) -> Self {
        let name = name.into();
        let subscription = client.subscribe(&name);
        debug!("Subscribed to {} channel {}", channel_type, name);

        Self {
            name,
            channel_type,
            client,
            formatter,
            subscription: RwLock::new(subscription),
            global_callbacks: Mutex::new(Vec::new()),
        }
    }

    pub fn formatter(&self) -> &EventFormatter {
        &self.formatter
    }

    fn subscription(&self) -> Arc<dyn PusherSubscription> {
        self.subscription.read().clone()
    }

    /// Bind a raw, unformatted event
    fn on(&self, event: &str, callback: EventCallback) -> &Self {
        self.subscription().bind(event, callback);
        self
    }
}

impl Channel for PusherChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    fn subscribe(&self) {
        *self.subscription.write() = self.client.subscribe(&self.name);
    }

    fn unsubscribe(&self) {
        self.client.unsubscribe(&self.name);
        self.global_callbacks.lock().clear();
    }

    fn listen(&self, event: &str, callback: EventCallback) -> &dyn Channel {
        self.on(&self.formatter.format(event), callback)
    }

    fn listen_to_all(&self, callback: GlobalCallback) -> &dyn Channel {
        let formatter = self.formatter.clone();
        let inner = callback.clone();
        let wrapper: GlobalCallback = Arc::new(move |event: &str, data: &Value| {
            if event.starts_with("pusher:") {
                return;
            }
            inner(&formatter.strip_namespace(event), data);
        });

        self.subscription().bind_global(wrapper.clone());
        self.global_callbacks.lock().push((callback, wrapper));
        self
    }

    fn stop_listening(&self, event: &str, callback: Option<&EventCallback>) -> &dyn Channel {
        self.subscription()
            .unbind(&self.formatter.format(event), callback);
        self
    }

    fn stop_listening_to_all(&self, callback: Option<&GlobalCallback>) -> &dyn Channel {
        let subscription = self.subscription();

        match callback {
            Some(callback) => {
                let mut registered = self.global_callbacks.lock();
                registered.retain(|(original, wrapper)| {
                    if Arc::ptr_eq(original, callback) {
                        subscription.unbind_global(Some(wrapper));
                        false
                    } else {
                        true
                    }
                });
            }
            None => {
                self.global_callbacks.lock().clear();
                subscription.unbind_global(None);
            }
        }

        self
    }

    fn subscribed(&self, callback: EventCallback) -> &dyn Channel {
        self.on(SUBSCRIPTION_SUCCEEDED, callback)
    }

    fn error(&self, callback: EventCallback) -> &dyn Channel {
        self.on(SUBSCRIPTION_ERROR, callback)
    }

    fn whisper(&self, event: &str, data: &Value) -> EchoResult<&dyn Channel> {
        if !self.channel_type.allows_client_events() {
            return Err(client_events_unsupported(self.channel_type, &self.name, event));
        }

        let client_event = format!("client-{}", event);
        if !self.subscription().trigger(&client_event, data) {
            warn!("Client event {} was not accepted on {}", client_event, self.name);
        }

        Ok(self)
    }
}

impl PresenceChannel for PusherChannel {
    fn here(&self, callback: MembersCallback) -> &dyn PresenceChannel {
        self.on(
            SUBSCRIPTION_SUCCEEDED,
            Arc::new(move |data: &Value| {
                let members: Vec<Value> = data
                    .get("members")
                    .and_then(Value::as_object)
                    .map(|members| members.values().cloned().collect())
                    .unwrap_or_default();
                callback(members.as_slice());
            }),
        )
    }

    fn joining(&self, callback: EventCallback) -> &dyn PresenceChannel {
        self.on(
            MEMBER_ADDED,
            Arc::new(move |member: &Value| callback(member.get("info").unwrap_or(&Value::Null))),
        )
    }

    fn leaving(&self, callback: EventCallback) -> &dyn PresenceChannel {
        self.on(
            MEMBER_REMOVED,
            Arc::new(move |member: &Value| callback(member.get("info").unwrap_or(&Value::Null))),
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
    use crate::transport::{callback, global_callback, MemoryPusherClient};
    use serde_json::json;

    fn channel(
        client: &MemoryPusherClient,
        name: &str,
        channel_type: ChannelType,
    ) -> PusherChannel {
        PusherChannel::new(
            Arc::new(client.clone()),
            name,
            channel_type,
            EventFormatter::default(),
        )
    }

    #[test]
    fn test_listen_binds_formatted_event() {
        let client = MemoryPusherClient::new();
        let orders = channel(&client, "orders", ChannelType::Public);

        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        orders.listen(
            "OrderShipped",
            callback(move |data| received_clone.lock().push(data.clone())),
        );

        client.deliver("orders", "App\\Events\\OrderShipped", &json!({ "id": 7 }));
        client.deliver("orders", "OrderShipped", &json!({ "id": 8 }));

        assert_eq!(*received.lock(), vec![json!({ "id": 7 })]);
    }

    #[test]
    fn test_stop_listening_single_callback() {
        let client = MemoryPusherClient::new();
        let orders = channel(&client, "orders", ChannelType::Public);
        let first = callback(|_| {});
        let second = callback(|_| {});

        orders
            .listen("OrderShipped", first.clone())
            .listen("OrderShipped", second);

        let subscription = client.subscription("orders").unwrap();
        assert_eq!(subscription.binding_count("App\\Events\\OrderShipped"), 2);

        orders.stop_listening("OrderShipped", Some(&first));
        assert_eq!(subscription.binding_count("App\\Events\\OrderShipped"), 1);

        orders.stop_listening("OrderShipped", None);
        assert_eq!(subscription.binding_count("App\\Events\\OrderShipped"), 0);
    }

    #[test]
    fn test_listen_to_all_filters_internal_events() {
        let client = MemoryPusherClient::new();
        let orders = channel(&client, "orders", ChannelType::Public);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let all = global_callback(move |event, _| seen_clone.lock().push(event.to_string()));
        orders.listen_to_all(all.clone());

        client.deliver("orders", "pusher:subscription_succeeded", &json!({}));
        client.deliver("orders", "App\\Events\\OrderShipped", &json!({}));
        client.deliver("orders", "client-typing", &json!({}));

        assert_eq!(
            *seen.lock(),
            vec!["OrderShipped".to_string(), ".client-typing".to_string()]
        );

        orders.stop_listening_to_all(Some(&all));
        assert_eq!(
            client.subscription("orders").unwrap().global_binding_count(),
            0
        );
    }

    #[test]
    fn test_whisper_on_private_channel() {
        let client = MemoryPusherClient::new();
        let chat = channel(&client, "private-chat", ChannelType::Private);

        chat.whisper("typing", &json!({ "user": "ada" })).unwrap();

        let triggered = client.subscription("private-chat").unwrap().triggered();
        assert_eq!(
            triggered,
            vec![("client-typing".to_string(), json!({ "user": "ada" }))]
        );
    }

    #[test]
    fn test_whisper_rejected_on_public_channel() {
        let client = MemoryPusherClient::new();
        let news = channel(&client, "news", ChannelType::Public);

        let err = news.whisper("typing", &json!({})).err().unwrap();
        assert!(err.is_capability());
    }

    #[test]
    fn test_listen_for_whisper_and_notification() {
        let client = MemoryPusherClient::new();
        let chat = channel(&client, "private-chat", ChannelType::Private);
        chat.listen_for_whisper("typing", callback(|_| {}))
            .notification(callback(|_| {}));

        let subscription = client.subscription("private-chat").unwrap();
        assert_eq!(subscription.binding_count("client-typing"), 1);
        assert_eq!(
            subscription.binding_count(
                "Illuminate\\Notifications\\Events\\BroadcastNotificationCreated"
            ),
            1
        );

        chat.stop_listening_for_whisper("typing", None)
            .stop_listening_for_notification(None);
        assert_eq!(subscription.binding_count("client-typing"), 0);
    }

    #[test]
    fn test_presence_roster_events() {
        let client = MemoryPusherClient::new();
        let room = channel(&client, "presence-room", ChannelType::Presence);

        let roster = Arc::new(Mutex::new(Vec::new()));
        let joined = Arc::new(Mutex::new(Vec::new()));
        let left = Arc::new(Mutex::new(Vec::new()));
        let (roster_c, joined_c, left_c) = (roster.clone(), joined.clone(), left.clone());

        room.here(members_callback(move |members| {
            roster_c.lock().extend(members.iter().cloned())
        }))
        .joining(callback(move |info| joined_c.lock().push(info.clone())))
        .leaving(callback(move |info| left_c.lock().push(info.clone())));

        client.deliver(
            "presence-room",
            "pusher:subscription_succeeded",
            &json!({ "members": { "1": { "name": "Ada" }, "2": { "name": "Grace" } } }),
        );
        client.deliver(
            "presence-room",
            "pusher:member_added",
            &json!({ "id": "3", "info": { "name": "Linus" } }),
        );
        client.deliver(
            "presence-room",
            "pusher:member_removed",
            &json!({ "id": "1", "info": { "name": "Ada" } }),
        );

        assert_eq!(
            *roster.lock(),
            vec![json!({ "name": "Ada" }), json!({ "name": "Grace" })]
        );
        assert_eq!(*joined.lock(), vec![json!({ "name": "Linus" })]);
        assert_eq!(*left.lock(), vec![json!({ "name": "Ada" })]);
    }

    #[test]
    fn test_resubscribe_replaces_handle() {
        let client = MemoryPusherClient::new();
        let orders = channel(&client, "orders", ChannelType::Public);

        orders.unsubscribe();
        assert!(!client.is_subscribed("orders"));

        orders.subscribe();
        assert!(client.is_subscribed("orders"));
        assert_eq!(client.subscribe_count("orders"), 2);
    }
}
