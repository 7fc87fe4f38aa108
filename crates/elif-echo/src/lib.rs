//! # elif-echo
//!
//! Real-time broadcasting client for the elif.rs framework.
//!
//! ## Features
//!
//! - **Multiple transports**: Pusher, Laravel Reverb, Socket.IO and a null broadcaster
//! - **Channel bookkeeping**: repeated joins share one subscription, leaves tear down every variant
//! - **Presence channels**: member roster, join and leave callbacks
//! - **Socket id propagation**: `X-Socket-Id` on outbound HTTP requests through a tower layer
//! - **Pluggable**: custom transports through [`ConnectorFactory`]
//!
//! ## Quick Start
//!
//! ```rust
//! use elif_echo::{callback, Broadcaster, Echo, EchoOptions, MemoryPusherClient, TransportClient};
//!
//! let client = MemoryPusherClient::new();
//! let echo = Echo::new(
//!     EchoOptions::new(Broadcaster::Pusher).client(TransportClient::pusher(client.clone())),
//! )
//! .unwrap();
//!
//! echo.private("orders.1")
//!     .listen("OrderShipped", callback(|order| println!("shipped: {}", order)));
//!
//! // Joining again reuses the subscription
//! echo.private("orders.1");
//! assert_eq!(client.subscribe_count("private-orders.1"), 1);
//!
//! echo.leave("orders.1");
//! assert!(echo.connector().channel_names().is_empty());
//! ```

pub mod channel;
pub mod config;
pub mod connector;
pub mod echo;
pub mod error;
pub mod formatter;
pub mod interceptors;
pub mod transport;

pub use channel::{
    members_callback, wire_names, Channel, ChannelType, MembersCallback, NullChannel,
    PresenceChannel, PusherChannel, SocketIoChannel,
};
pub use config::{Broadcaster, EchoConfig, EchoConfigBuilder, EchoOptions};
pub use connector::{
    Capabilities, ChannelRegistry, Connector, ConnectorFactory, NullConnector, PusherConnector,
    SocketIoConnector,
};
pub use echo::Echo;
pub use error::{EchoError, EchoResult};
pub use formatter::EventFormatter;
pub use interceptors::{
    clear_http_integrations, register_http_integration, registered_http_integrations,
    HttpIntegration, SocketIdHook, SocketIdLayer, SocketIdService, TowerIntegration,
    SOCKET_ID_HEADER,
};
pub use transport::{
    callback, global_callback, EventCallback, GlobalCallback, MemoryPusherClient,
    MemorySocketIoClient, PusherClient, PusherSubscription, SocketIoClient, TransportClient,
};
