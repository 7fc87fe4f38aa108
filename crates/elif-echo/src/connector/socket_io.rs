//! Connector for Socket.IO broadcast servers

use super::{ChannelRegistry, Connector};
use crate::channel::{Channel, ChannelType, PresenceChannel, SocketIoChannel};
use crate::config::EchoOptions;
use crate::error::{EchoError, EchoResult};
use crate::formatter::EventFormatter;
use crate::transport::{SocketIoClient, SocketListener, TransportClient};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

pub struct SocketIoConnector {
    socket: Arc<dyn SocketIoClient>,
    formatter: EventFormatter,
    auth: Value,
    channels: ChannelRegistry<SocketIoChannel>,
    reconnect_listener: SocketListener,
}

impl SocketIoConnector {
    /// Create a connector around the Socket.IO client supplied in `options`
    ///
    /// The server forgets subscriptions when the socket drops, so every open
    /// channel is subscribed again on `reconnect`.
    pub fn new(options: &EchoOptions) -> EchoResult<Self> {
        let socket = match &options.client {
            Some(TransportClient::SocketIo(socket)) => socket.clone(),
            Some(other) => {
                return Err(EchoError::configuration(format!(
                    "Socket.io client expected in options.client, got a {} client",
                    other.family()
                )))
            }
            None => {
                return Err(EchoError::configuration(
                    "Socket.io client not found. Should be passed via options.client",
                ))
            }
        };

        let channels = ChannelRegistry::new();
        let registry = channels.downgrade();
        let reconnect_listener: SocketListener = Arc::new(move |_: &str, _: &Value| {
            let Some(channels) = registry.upgrade() else {
                return;
            };
            let open: Vec<Arc<SocketIoChannel>> = channels.all();
            debug!("Socket reconnected, resubscribing {} channels", open.len());
            for channel in open {
                channel.subscribe();
            }
        });
        socket.on("reconnect", reconnect_listener.clone());

        info!("Socket.IO connector created");

        Ok(Self {
            socket,
            formatter: options.formatter(),
            auth: options.auth_payload(),
            channels,
            reconnect_listener,
        })
    }

    pub fn socket(&self) -> &Arc<dyn SocketIoClient> {
        &self.socket
    }

    fn open(&self, name: &str, channel_type: ChannelType) -> Arc<SocketIoChannel> {
        let wire_name = channel_type.wire_name(name);
        self.channels.get_or_create(&wire_name, || {
            SocketIoChannel::new(
                self.socket.clone(),
                wire_name.as_str(),
                channel_type,
                self.formatter.clone(),
                self.auth.clone(),
            )
        })
    }
}

impl Connector for SocketIoConnector {
    fn channel(&self, name: &str) -> Arc<dyn Channel> {
        self.open(name, ChannelType::Public)
    }

    fn private_channel(&self, name: &str) -> Arc<dyn Channel> {
        self.open(name, ChannelType::Private)
    }

    fn encrypted_private_channel(&self, _name: &str) -> EchoResult<Arc<dyn Channel>> {
        Err(EchoError::capability("socket.io", "encrypted private channels"))
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
        self.socket.id()
    }

    fn disconnect(&self) {
        self.socket.disconnect();
        info!("Socket.IO connector disconnected");
    }
}

impl Drop for SocketIoConnector {
    fn drop(&mut self) {
        self.socket.off("reconnect", &self.reconnect_listener);
    }
}
