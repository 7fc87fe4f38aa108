//! Inert channels for environments where broadcasting is disabled

use super::{client_events_unsupported, Channel, ChannelType, MembersCallback, PresenceChannel};
use crate::error::EchoResult;
use crate::transport::{EventCallback, GlobalCallback};
use serde_json::Value;
use std::sync::Arc;

/// A channel that accepts every call and never delivers anything
#[derive(Debug, Clone)]
pub struct NullChannel {
    name: String,
    channel_type: ChannelType,
}

impl NullChannel {
    pub fn new(name: impl Into<String>, channel_type: ChannelType) -> Self {
        Self {
            name: name.into(),
            channel_type,
        }
    }
}

impl Channel for NullChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    fn subscribe(&self) {}

    fn unsubscribe(&self) {}

    fn listen(&self, _event: &str, _callback: EventCallback) -> &dyn Channel {
        self
    }

    fn listen_to_all(&self, _callback: GlobalCallback) -> &dyn Channel {
        self
    }

    fn stop_listening(&self, _event: &str, _callback: Option<&EventCallback>) -> &dyn Channel {
        self
    }

    fn stop_listening_to_all(&self, _callback: Option<&GlobalCallback>) -> &dyn Channel {
        self
    }

    fn subscribed(&self, _callback: EventCallback) -> &dyn Channel {
        self
    }

    fn error(&self, _callback: EventCallback) -> &dyn Channel {
        self
    }

    fn whisper(&self, event: &str, _data: &Value) -> EchoResult<&dyn Channel> {
        if !self.channel_type.allows_client_events() {
            return Err(client_events_unsupported(self.channel_type, &self.name, event));
        }
        Ok(self)
    }
}

impl PresenceChannel for NullChannel {
    fn here(&self, _callback: MembersCallback) -> &dyn PresenceChannel {
        self
    }

    fn joining(&self, _callback: EventCallback) -> &dyn PresenceChannel {
        self
    }

    fn leaving(&self, _callback: EventCallback) -> &dyn PresenceChannel {
        self
    }

    fn into_channel(self: Arc<Self>) -> Arc<dyn Channel> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::members_callback;
    use crate::transport::callback;
    use serde_json::json;

    #[test]
    fn test_calls_are_accepted() {
        let channel = NullChannel::new("presence-room", ChannelType::Presence);
        channel
            .here(members_callback(|_| panic!("null channels never deliver")))
            .joining(callback(|_| {}))
            .leaving(callback(|_| {}));

        channel
            .listen("OrderShipped", callback(|_| {}))
            .stop_listening("OrderShipped", None)
            .notification(callback(|_| {}));

        assert!(channel.whisper("typing", &json!({})).is_ok());
        assert_eq!(channel.name(), "presence-room");
    }

    #[test]
    fn test_whisper_rejected_on_public_channel() {
        let channel = NullChannel::new("news", ChannelType::Public);
        assert!(channel.whisper("typing", &json!({})).err().unwrap().is_capability());
    }
}
