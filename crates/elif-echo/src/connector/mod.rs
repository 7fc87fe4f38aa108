//! Connectors: one per transport family
//!
//! A connector owns the channel registry for its transport and is the only
//! place channels are created or torn down. Repeated accessor calls for the
//! same wire name return the same channel instance.

pub mod null;
pub mod pusher;
pub mod socket_io;

pub use null::NullConnector;
pub use pusher::PusherConnector;
pub use socket_io::SocketIoConnector;

use crate::channel::{wire_names, Channel, PresenceChannel};
use crate::config::EchoOptions;
use crate::error::EchoResult;
use crate::transport::EventCallback;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Transport family driver behind the [`Echo`](crate::Echo) facade
pub trait Connector: Send + Sync {
    /// Get or create the public channel `name`
    fn channel(&self, name: &str) -> Arc<dyn Channel>;

    /// Get or create the private channel `private-{name}`
    fn private_channel(&self, name: &str) -> Arc<dyn Channel>;

    /// Get or create the encrypted private channel `private-encrypted-{name}`
    fn encrypted_private_channel(&self, name: &str) -> EchoResult<Arc<dyn Channel>>;

    /// Get or create the presence channel `presence-{name}`
    fn presence_channel(&self, name: &str) -> Arc<dyn PresenceChannel>;

    /// Leave exactly one wire name; unknown names are ignored
    fn leave_channel(&self, wire_name: &str);

    /// Leave every variant of a logical channel name
    fn leave(&self, name: &str) {
        for wire_name in wire_names(name) {
            self.leave_channel(&wire_name);
        }
    }

    /// Listen for an event on the public channel `name`
    fn listen(&self, name: &str, event: &str, callback: EventCallback) -> Arc<dyn Channel> {
        let channel = self.channel(name);
        channel.listen(event, callback);
        channel
    }

    /// Wire names of every open channel
    fn channel_names(&self) -> Vec<String>;

    /// Socket id of the current connection
    fn socket_id(&self) -> Option<String>;

    fn disconnect(&self);
}

/// Features a transport family supports beyond the common channel contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub encrypted_private_channels: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            encrypted_private_channels: true,
        }
    }

    pub fn none() -> Self {
        Self {
            encrypted_private_channels: false,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::all()
    }
}

/// Builds a connector for a transport family not shipped with this crate
///
/// Closures with the right signature implement this trait directly:
///
/// ```rust
/// use elif_echo::{Broadcaster, Connector, EchoOptions, NullConnector};
/// use std::sync::Arc;
///
/// let broadcaster = Broadcaster::custom(|options: &EchoOptions| {
///     Ok(Arc::new(NullConnector::new(options)) as Arc<dyn Connector>)
/// });
/// assert_eq!(broadcaster.tag(), "custom");
/// ```
pub trait ConnectorFactory: Send + Sync {
    fn create(&self, options: &EchoOptions) -> EchoResult<Arc<dyn Connector>>;

    /// Name used in logs and capability errors
    fn name(&self) -> &str {
        "custom"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }
}

impl<F> ConnectorFactory for F
where
    F: Fn(&EchoOptions) -> EchoResult<Arc<dyn Connector>> + Send + Sync,
{
    fn create(&self, options: &EchoOptions) -> EchoResult<Arc<dyn Connector>> {
        self(options)
    }
}

/// Open channels of one connector, keyed by wire name
pub struct ChannelRegistry<C> {
    channels: Arc<RwLock<HashMap<String, Arc<C>>>>,
}

impl<C> ChannelRegistry<C> {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Return the channel registered under `wire_name`, creating it on a miss
    ///
    /// `create` runs with the registry write lock held, so concurrent callers
    /// for one wire name subscribe exactly once. It must not call back into
    /// the registry, and neither may the transport calls it makes.
    pub fn get_or_create<F>(&self, wire_name: &str, create: F) -> Arc<C>
    where
        F: FnOnce() -> C,
    {
        if let Some(channel) = self.channels.read().get(wire_name) {
            debug!("Reusing channel {}", wire_name);
            return channel.clone();
        }

        let mut channels = self.channels.write();
        channels
            .entry(wire_name.to_string())
            .or_insert_with(|| Arc::new(create()))
            .clone()
    }

    pub fn remove(&self, wire_name: &str) -> Option<Arc<C>> {
        self.channels.write().remove(wire_name)
    }

    pub fn names(&self) -> Vec<String> {
        self.channels.read().keys().cloned().collect()
    }

    /// Snapshot of every registered channel
    pub fn all(&self) -> Vec<Arc<C>> {
        self.channels.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.read().is_empty()
    }

    /// Handle that does not keep the registry alive
    pub fn downgrade(&self) -> WeakChannelRegistry<C> {
        WeakChannelRegistry {
            channels: Arc::downgrade(&self.channels),
        }
    }
}

impl<C: Channel> ChannelRegistry<C> {
    /// Remove `wire_name` and unsubscribe it, returning whether it was open
    pub fn leave(&self, wire_name: &str) -> bool {
        match self.remove(wire_name) {
            Some(channel) => {
                channel.unsubscribe();
                info!("Left channel {}", wire_name);
                true
            }
            None => false,
        }
    }
}

impl<C> Default for ChannelRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Clone for ChannelRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            channels: self.channels.clone(),
        }
    }
}

/// Weak handle to a [`ChannelRegistry`]
pub struct WeakChannelRegistry<C> {
    channels: Weak<RwLock<HashMap<String, Arc<C>>>>,
}

impl<C> WeakChannelRegistry<C> {
    pub fn upgrade(&self) -> Option<ChannelRegistry<C>> {
        self.channels
            .upgrade()
            .map(|channels| ChannelRegistry { channels })
    }
}

impl<C> Clone for WeakChannelRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            channels: self.channels.clone(),
        }
    }
}
