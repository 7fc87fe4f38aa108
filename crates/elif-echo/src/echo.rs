//! The broadcasting client facade

use crate::channel::{Channel, PresenceChannel};
use crate::config::{Broadcaster, EchoConfig, EchoOptions};
use crate::connector::{
    Capabilities, Connector, NullConnector, PusherConnector, SocketIoConnector,
};
use crate::error::{EchoError, EchoResult};
use crate::interceptors::{registered_http_integrations, SocketIdHook};
use crate::transport::{EventCallback, TransportClient};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Client-side entry point for real-time broadcasting
///
/// The transport family is chosen once, at construction; every call is then
/// forwarded to the resulting connector. Switching broadcasters means
/// creating a new `Echo`.
pub struct Echo {
    options: EchoOptions,
    connector: Arc<dyn Connector>,
    capabilities: Capabilities,
}

impl Echo {
    pub fn new(mut options: EchoOptions) -> EchoResult<Self> {
        let (connector, capabilities): (Arc<dyn Connector>, Capabilities) =
            match options.broadcaster.clone() {
                Broadcaster::Reverb => {
                    options.config.set_cluster(Some(String::new()));
                    (Arc::new(PusherConnector::new(&options)?), Capabilities::all())
                }
                Broadcaster::Pusher => {
                    (Arc::new(PusherConnector::new(&options)?), Capabilities::all())
                }
                Broadcaster::SocketIo => (
                    Arc::new(SocketIoConnector::new(&options)?),
                    Capabilities::none(),
                ),
                Broadcaster::Null => (Arc::new(NullConnector::new(&options)), Capabilities::all()),
                Broadcaster::Custom(factory) => {
                    (factory.create(&options)?, factory.capabilities())
                }
            };

        info!("Echo client created with {} broadcaster", options.broadcaster);

        let echo = Self {
            options,
            connector,
            capabilities,
        };

        if !echo.options.config.without_interceptors() {
            echo.register_interceptors();
        }

        Ok(echo)
    }

    /// Create a client from a loaded configuration and a transport client
    pub fn from_config(config: EchoConfig, client: Option<TransportClient>) -> EchoResult<Self> {
        let mut options = EchoOptions::from_config(config)?;
        options.client = client;
        Self::new(options)
    }

    /// Public channel `name`
    pub fn channel(&self, name: &str) -> Arc<dyn Channel> {
        self.connector.channel(name)
    }

    /// Private channel `private-{name}`
    pub fn private(&self, name: &str) -> Arc<dyn Channel> {
        self.connector.private_channel(name)
    }

    /// Encrypted private channel `private-encrypted-{name}`
    pub fn encrypted_private(&self, name: &str) -> EchoResult<Arc<dyn Channel>> {
        if !self.capabilities.encrypted_private_channels {
            return Err(EchoError::capability(
                self.broadcaster(),
                "encrypted private channels",
            ));
        }
        self.connector.encrypted_private_channel(name)
    }

    /// Presence channel `presence-{name}`
    pub fn join(&self, name: &str) -> Arc<dyn PresenceChannel> {
        self.connector.presence_channel(name)
    }

    /// Listen for an event on the public channel `name`
    pub fn listen(&self, name: &str, event: &str, callback: EventCallback) -> Arc<dyn Channel> {
        self.connector.listen(name, event, callback)
    }

    /// Leave every variant of `name`
    pub fn leave(&self, name: &str) {
        self.connector.leave(name);
    }

    /// Leave exactly the wire name given
    pub fn leave_channel(&self, wire_name: &str) {
        self.connector.leave_channel(wire_name);
    }

    pub fn leave_all_channels(&self) {
        for wire_name in self.connector.channel_names() {
            self.connector.leave_channel(&wire_name);
        }
    }

    /// Close the transport connection
    ///
    /// Open channels stay registered; a later accessor call returns the
    /// same instance without resubscribing.
    pub fn disconnect(&self) {
        self.connector.disconnect();
    }

    pub fn socket_id(&self) -> Option<String> {
        self.connector.socket_id()
    }

    /// Install the socket id hook on every present HTTP integration
    ///
    /// Returns how many integrations received a hook.
    pub fn register_interceptors(&self) -> usize {
        let hook = SocketIdHook::new(&self.connector);
        let integrations = self
            .options
            .integrations
            .iter()
            .cloned()
            .chain(registered_http_integrations());

        let mut installed = 0;
        for integration in integrations {
            if !integration.is_present() {
                continue;
            }
            integration.install(hook.clone());
            debug!("Installed socket id hook on {}", integration.name());
            installed += 1;
        }

        installed
    }

    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    pub fn options(&self) -> &EchoOptions {
        &self.options
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Tag of the active broadcaster
    pub fn broadcaster(&self) -> &str {
        self.options.broadcaster.tag()
    }
}

impl fmt::Debug for Echo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Echo")
            .field("broadcaster", &self.broadcaster())
            .field("capabilities", &self.capabilities)
            .field("channels", &self.connector.channel_names())
            .finish()
    }
}
