//! Channel abstraction for the broadcasting client
//!
//! A channel wraps exactly one transport subscription. The connector that
//! created it owns its lifecycle; a channel only binds and unbinds event
//! callbacks on its subscription.
//!
//! - [`pusher`] - channels backed by a Pusher-protocol subscription
//! - [`socket_io`] - channels backed by a shared Socket.IO socket
//! - [`null`] - inert channels for disabled environments

pub mod null;
pub mod pusher;
pub mod socket_io;

pub use null::NullChannel;
pub use pusher::PusherChannel;
pub use socket_io::SocketIoChannel;

use crate::error::{EchoError, EchoResult};
use crate::transport::{EventCallback, GlobalCallback};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Event fired by the server for database notifications
pub const NOTIFICATION_EVENT: &str =
    ".Illuminate\\Notifications\\Events\\BroadcastNotificationCreated";

/// Callback receiving the member roster of a presence channel
pub type MembersCallback = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Wrap a closure as a [`MembersCallback`]
pub fn members_callback<F>(f: F) -> MembersCallback
where
    F: Fn(&[Value]) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Channel access mode, determining the wire name prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    /// No authorization, bare name
    Public,
    /// Authorized channel, `private-` prefix
    Private,
    /// Authorized channel with end-to-end encrypted payloads, `private-encrypted-` prefix
    EncryptedPrivate,
    /// Authorized channel reporting its member roster, `presence-` prefix
    Presence,
}

impl ChannelType {
    pub const ALL: [ChannelType; 4] = [
        ChannelType::Public,
        ChannelType::Private,
        ChannelType::EncryptedPrivate,
        ChannelType::Presence,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Public => "",
            Self::Private => "private-",
            Self::EncryptedPrivate => "private-encrypted-",
            Self::Presence => "presence-",
        }
    }

    /// Derive the wire name for a logical channel name
    pub fn wire_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix(), name)
    }

    /// Whether client events (whispers) may be sent on this channel
    pub fn allows_client_events(&self) -> bool {
        !matches!(self, Self::Public)
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::EncryptedPrivate => "encrypted private",
            Self::Presence => "presence",
        };
        f.write_str(label)
    }
}

/// Error for a whisper on a channel that does not relay client events
pub(crate) fn client_events_unsupported(
    channel_type: ChannelType,
    name: &str,
    event: &str,
) -> EchoError {
    EchoError::capability(
        format!("{} channel '{}'", channel_type, name),
        format!("client event '{}'", event),
    )
}

/// Every wire name a logical channel name can be registered under
pub fn wire_names(name: &str) -> Vec<String> {
    ChannelType::ALL
        .iter()
        .map(|channel_type| channel_type.wire_name(name))
        .collect()
}

/// A subscribed channel
///
/// Chaining methods return the channel so listeners can be registered
/// fluently:
///
/// ```rust
/// use elif_echo::{callback, Echo, EchoOptions, Broadcaster};
///
/// let echo = Echo::new(EchoOptions::new(Broadcaster::Null)).unwrap();
/// echo.channel("orders")
///     .listen("OrderShipped", callback(|order| println!("{}", order)))
///     .listen("OrderCancelled", callback(|order| println!("{}", order)));
/// ```
pub trait Channel: Send + Sync {
    /// Wire name of the channel
    fn name(&self) -> &str;

    /// Access mode the channel was opened with
    fn channel_type(&self) -> ChannelType;

    /// (Re)establish the transport subscription
    fn subscribe(&self);

    /// Drop the transport subscription and every callback bound through it
    fn unsubscribe(&self);

    /// Listen for an event, qualified with the configured namespace
    fn listen(&self, event: &str, callback: EventCallback) -> &dyn Channel;

    /// Listen for every event on the channel
    fn listen_to_all(&self, callback: GlobalCallback) -> &dyn Channel;

    /// Stop listening for an event; `None` removes every callback for it
    fn stop_listening(&self, event: &str, callback: Option<&EventCallback>) -> &dyn Channel;

    fn stop_listening_to_all(&self, callback: Option<&GlobalCallback>) -> &dyn Channel;

    /// Register a callback for a successful subscription
    fn subscribed(&self, callback: EventCallback) -> &dyn Channel;

    /// Register a callback for a failed subscription
    fn error(&self, callback: EventCallback) -> &dyn Channel;

    /// Send a client event to the other subscribers
    fn whisper(&self, event: &str, _data: &Value) -> EchoResult<&dyn Channel> {
        Err(client_events_unsupported(self.channel_type(), self.name(), event))
    }

    fn listen_for_whisper(&self, event: &str, callback: EventCallback) -> &dyn Channel {
        self.listen(&format!(".client-{}", event), callback)
    }

    fn stop_listening_for_whisper(
        &self,
        event: &str,
        callback: Option<&EventCallback>,
    ) -> &dyn Channel {
        self.stop_listening(&format!(".client-{}", event), callback)
    }

    /// Listen for database notifications broadcast to this channel
    fn notification(&self, callback: EventCallback) -> &dyn Channel {
        self.listen(NOTIFICATION_EVENT, callback)
    }

    fn stop_listening_for_notification(&self, callback: Option<&EventCallback>) -> &dyn Channel {
        self.stop_listening(NOTIFICATION_EVENT, callback)
    }
}

/// A channel that reports who else is subscribed
pub trait PresenceChannel: Channel {
    /// Called with the full roster once the subscription succeeds
    fn here(&self, callback: MembersCallback) -> &dyn PresenceChannel;

    /// Called with a member's info when they join
    fn joining(&self, callback: EventCallback) -> &dyn PresenceChannel;

    /// Called with a member's info when they leave
    fn leaving(&self, callback: EventCallback) -> &dyn PresenceChannel;

    /// View this presence channel as a plain channel
    fn into_channel(self: Arc<Self>) -> Arc<dyn Channel>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        assert_eq!(ChannelType::Public.wire_name("orders"), "orders");
        assert_eq!(ChannelType::Private.wire_name("orders"), "private-orders");
        assert_eq!(
            ChannelType::EncryptedPrivate.wire_name("orders"),
            "private-encrypted-orders"
        );
        assert_eq!(ChannelType::Presence.wire_name("orders"), "presence-orders");

        assert_eq!(
            wire_names("orders"),
            vec![
                "orders".to_string(),
                "private-orders".to_string(),
                "private-encrypted-orders".to_string(),
                "presence-orders".to_string(),
            ]
        );
    }

    #[test]
    fn test_client_events_allowed() {
        assert!(!ChannelType::Public.allows_client_events());
        assert!(ChannelType::Private.allows_client_events());
        assert!(ChannelType::Presence.allows_client_events());
    }
}
