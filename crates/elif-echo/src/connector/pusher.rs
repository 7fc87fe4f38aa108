//! Connector for Pusher-protocol services (Pusher Channels, Laravel Reverb)

use super::{ChannelRegistry, Connector};
use crate::channel::{Channel, ChannelType, PresenceChannel, PusherChannel};
use crate::config::EchoOptions;
use crate::error::{EchoError, EchoResult};
use crate::formatter::EventFormatter;
use crate::transport::{PusherClient, TransportClient};
use std::sync::Arc;
use tracing::info;

pub struct PusherConnector {
    client: Arc<dyn PusherClient>,
    formatter: EventFormatter,
    channels: ChannelRegistry<PusherChannel>,
}

impl PusherConnector {
    /// Create a connector around the Pusher client supplied in `options`
    pub fn new(options: &EchoOptions) -> EchoResult<Self> {
        let client = match &options.client {
            Some(TransportClient::Pusher(client)) => client.clone(),
            Some(other) => {
                return Err(EchoError::configuration(format!(
                    "Pusher client expected in options.client, got a {} client",
                    other.family()
                )))
            }
            None => {
                return Err(EchoError::configuration(
                    "Pusher client not found. Should be passed via options.client",
                ))
            }
        };

        info!(
            "Pusher connector created (cluster: {})",
            options.config.cluster().unwrap_or("default")
        );

        Ok(Self {
            client,
            formatter: options.formatter(),
            channels: ChannelRegistry::new(),
        })
    }

    pub fn client(&self) -> &Arc<dyn PusherClient> {
        &self.client
    }

    /// Authenticate the connected user against the user authentication endpoint
    pub fn signin(&self) {
        self.client.signin();
    }

    fn open(&self, name: &str, channel_type: ChannelType) -> Arc<PusherChannel> {
        let wire_name = channel_type.wire_name(name);
        self.channels.get_or_create(&wire_name, || {
            PusherChannel::new(
                self.client.clone(),
                wire_name.as_str(),
                channel_type,
                self.formatter.clone(),
            )
        })
    }
}

impl Connector for PusherConnector {
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
        self.client.socket_id()
    }

    fn disconnect(&self) {
        self.client.disconnect();
        info!("Pusher connector disconnected");
    }
}
