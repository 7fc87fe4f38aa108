//! Connector that subscribes to nothing
//!
//! Used where broadcasting is disabled (tests, CLI tasks, server-side
//! rendering) so application code can keep calling the client unchanged.

use super::{ChannelRegistry, Connector};
use crate::channel::{Channel, ChannelType, NullChannel, PresenceChannel};
use crate::config::EchoOptions;
use crate::error::EchoResult;
use std::sync::Arc;
use tracing::info;

/// Socket id reported by the null connector
pub const NULL_SOCKET_ID: &str = "fake-socket-id";

#[derive(Default)]
pub struct NullConnector {
    channels: ChannelRegistry<NullChannel>,
}

impl NullConnector {
    pub fn new(_options: &EchoOptions) -> Self {
        info!("Null connector created, broadcasting is disabled");
        Self::default()
    }

    fn open(&self, name: &str, channel_type: ChannelType) -> Arc<NullChannel> {
        let wire_name = channel_type.wire_name(name);
        self.channels
            .get_or_create(&wire_name, || NullChannel::new(wire_name.as_str(), channel_type))
    }
}

impl Connector for NullConnector {
    fn channel(&self, name: &str) -> Arc<dyn Channel> {
        self.open(name, ChannelType::Public)
    }

    fn private_channel(&self, name: &str) -> Arc<dyn Channel> {
        self.open(name, ChannelType::Private)
    }

    fn encrypted_private_channel(&self, name: &str) -> EchoResult<Arc<dyn Channel>> {
        Ok(self.open(name, ChannelType::EncryptedPrivate))
    }

    fn presence_channel(&self, name: &str) -> Arc<dyn PresenceChannel> {
        self.open(name, ChannelType::Presence)
    }

    fn leave_channel(&self, wire_name: &str) {
        self.channels.leave(wire_name);
    }

    fn channel_names(&self) -> Vec<String> {
        self.channels.names()
    }

    fn socket_id(&self) -> Option<String> {
        Some(NULL_SOCKET_ID.to_string())
    }

    fn disconnect(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Broadcaster;

    #[test]
    fn test_registry_contract() {
        let connector = NullConnector::new(&EchoOptions::new(Broadcaster::Null));

        let first = connector.presence_channel("room");
        let second = connector.presence_channel("room");
        assert!(Arc::ptr_eq(&first, &second));

        connector.leave_channel("presence-room");
        assert!(connector.channel_names().is_empty());
    }

    #[test]
    fn test_placeholder_socket_id() {
        let connector = NullConnector::new(&EchoOptions::new(Broadcaster::Null));
        assert_eq!(connector.socket_id().as_deref(), Some("fake-socket-id"));

        connector.disconnect();
        assert_eq!(connector.socket_id().as_deref(), Some("fake-socket-id"));
    }
}
