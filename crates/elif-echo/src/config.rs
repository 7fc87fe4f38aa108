//! Broadcasting client configuration
//!
//! `EchoConfig` is the serialisable part (loaded from YAML, JSON or the
//! environment); `EchoOptions` adds the runtime pieces that cannot be
//! written down in a file: the transport client handle, HTTP integrations
//! and custom connector factories.

use crate::connector::{Connector, ConnectorFactory};
use crate::error::{EchoError, EchoResult};
use crate::formatter::{EventFormatter, DEFAULT_NAMESPACE};
use crate::interceptors::HttpIntegration;
use crate::transport::TransportClient;
use http::HeaderName;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use service_builder::builder;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Serialisable broadcasting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[builder]
#[serde(default)]
pub struct EchoConfig {
    /// Broadcaster tag: `reverb`, `pusher`, `socket.io` or `null`
    #[builder(default = "\"pusher\".to_string()", getter)]
    pub broadcaster: String,

    /// Application key of the broadcasting service
    #[builder(optional)]
    pub key: Option<String>,

    /// Pusher cluster; forced to an empty string for Reverb
    #[builder(optional)]
    pub cluster: Option<String>,

    /// Host of a self-hosted broadcasting server
    #[builder(optional)]
    pub host: Option<String>,

    /// Endpoint authorizing private and presence channel subscriptions
    #[builder(default = "\"/broadcasting/auth\".to_string()", getter)]
    pub auth_endpoint: String,

    /// Endpoint authenticating the connected user
    #[builder(default = "\"/broadcasting/user-auth\".to_string()", getter)]
    pub user_authentication_endpoint: String,

    /// Extra headers sent with authorization requests
    #[builder(default)]
    pub auth_headers: HashMap<String, String>,

    #[builder(optional)]
    pub csrf_token: Option<String>,

    #[builder(optional)]
    pub bearer_token: Option<String>,

    /// Event namespace; `None` disables qualification
    #[builder(default = "Some(DEFAULT_NAMESPACE.to_string())", getter)]
    pub namespace: Option<String>,

    /// Skip installing the socket id hook on HTTP integrations
    #[builder(default = "false", getter)]
    pub without_interceptors: bool,

    /// Transport specific settings passed through to client constructors
    #[builder(default)]
    pub transport_options: HashMap<String, Value>,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            broadcaster: "pusher".to_string(),
            key: None,
            cluster: None,
            host: None,
            auth_endpoint: "/broadcasting/auth".to_string(),
            user_authentication_endpoint: "/broadcasting/user-auth".to_string(),
            auth_headers: HashMap::new(),
            csrf_token: None,
            bearer_token: None,
            namespace: Some(DEFAULT_NAMESPACE.to_string()),
            without_interceptors: false,
            transport_options: HashMap::new(),
        }
    }
}

impl EchoConfig {
    pub fn from_yaml(yaml: &str) -> EchoResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> EchoResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `ECHO_*` environment variables
    pub fn from_env() -> EchoResult<Self> {
        let defaults = Self::default();

        let without_interceptors = match get_env_optional("ECHO_WITHOUT_INTERCEPTORS") {
            Some(value) => parse_bool("ECHO_WITHOUT_INTERCEPTORS", &value)?,
            None => defaults.without_interceptors,
        };

        let namespace = match get_env_optional("ECHO_NAMESPACE") {
            Some(namespace) if namespace.is_empty() => None,
            Some(namespace) => Some(namespace),
            None => defaults.namespace,
        };

        let config = Self {
            broadcaster: get_env_or_default("ECHO_BROADCASTER", &defaults.broadcaster),
            key: get_env_optional("ECHO_KEY"),
            cluster: get_env_optional("ECHO_CLUSTER"),
            host: get_env_optional("ECHO_HOST"),
            auth_endpoint: get_env_or_default("ECHO_AUTH_ENDPOINT", &defaults.auth_endpoint),
            csrf_token: get_env_optional("ECHO_CSRF_TOKEN"),
            bearer_token: get_env_optional("ECHO_BEARER_TOKEN"),
            namespace,
            without_interceptors,
            ..defaults
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EchoResult<()> {
        Broadcaster::from_str(&self.broadcaster)?;

        if self.auth_endpoint.is_empty() {
            return Err(EchoError::configuration("auth_endpoint cannot be empty"));
        }

        if self.user_authentication_endpoint.is_empty() {
            return Err(EchoError::configuration(
                "user_authentication_endpoint cannot be empty",
            ));
        }

        for name in self.auth_headers.keys() {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                return Err(EchoError::configuration(format!(
                    "auth header '{}' is not a valid header name",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Headers to send with channel authorization requests
    ///
    /// The configured headers plus `X-CSRF-TOKEN` and a bearer
    /// `Authorization` header when the matching tokens are set.
    pub fn effective_auth_headers(&self) -> HashMap<String, String> {
        let mut headers = self.auth_headers.clone();

        if let Some(token) = &self.csrf_token {
            headers.insert("X-CSRF-TOKEN".to_string(), token.clone());
        }

        if let Some(token) = &self.bearer_token {
            headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        }

        headers
    }

    pub fn cluster(&self) -> Option<&str> {
        self.cluster.as_deref()
    }

    pub fn set_cluster(&mut self, cluster: Option<String>) {
        self.cluster = cluster;
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn without_interceptors(&self) -> bool {
        self.without_interceptors
    }

    pub fn set_csrf_token(&mut self, token: Option<String>) {
        self.csrf_token = token;
    }

    pub fn set_bearer_token(&mut self, token: Option<String>) {
        self.bearer_token = token;
    }
}

fn get_env_optional(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn get_env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_bool(key: &str, value: &str) -> EchoResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(EchoError::configuration(format!(
            "Invalid value for {}: '{}', expected a boolean",
            key, value
        ))),
    }
}

/// Transport family the client connects through
#[derive(Clone)]
pub enum Broadcaster {
    /// Laravel Reverb, a Pusher-protocol server without clusters
    Reverb,
    Pusher,
    SocketIo,
    /// Accepts every call and subscribes to nothing
    Null,
    Custom(Arc<dyn ConnectorFactory>),
}

impl Broadcaster {
    /// Wrap a closure building a connector as a custom broadcaster
    pub fn custom<F>(factory: F) -> Self
    where
        F: Fn(&EchoOptions) -> EchoResult<Arc<dyn Connector>> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(factory))
    }

    /// Tag used in configuration files
    pub fn tag(&self) -> &str {
        match self {
            Self::Reverb => "reverb",
            Self::Pusher => "pusher",
            Self::SocketIo => "socket.io",
            Self::Null => "null",
            Self::Custom(factory) => factory.name(),
        }
    }
}

impl FromStr for Broadcaster {
    type Err = EchoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reverb" => Ok(Self::Reverb),
            "pusher" => Ok(Self::Pusher),
            "socket.io" => Ok(Self::SocketIo),
            "null" => Ok(Self::Null),
            _ => Err(EchoError::configuration(format!(
                "Broadcaster '{}' is not supported",
                s
            ))),
        }
    }
}

impl fmt::Display for Broadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reverb => f.write_str("Reverb"),
            Self::Pusher => f.write_str("Pusher"),
            Self::SocketIo => f.write_str("SocketIo"),
            Self::Null => f.write_str("Null"),
            Self::Custom(factory) => f.debug_tuple("Custom").field(&factory.name()).finish(),
        }
    }
}

/// Runtime options for [`Echo`](crate::Echo)
#[derive(Clone)]
pub struct EchoOptions {
    pub broadcaster: Broadcaster,
    pub config: EchoConfig,
    /// Transport client the connector drives
    pub client: Option<TransportClient>,
    /// HTTP integrations to install the socket id hook on, in addition to
    /// the process-wide registry
    pub integrations: Vec<Arc<dyn HttpIntegration>>,
}

impl EchoOptions {
    pub fn new(broadcaster: Broadcaster) -> Self {
        let config = EchoConfig {
            broadcaster: broadcaster.tag().to_string(),
            ..EchoConfig::default()
        };

        Self {
            broadcaster,
            config,
            client: None,
            integrations: Vec::new(),
        }
    }

    /// Build options from a loaded configuration
    pub fn from_config(config: EchoConfig) -> EchoResult<Self> {
        config.validate()?;
        let broadcaster = Broadcaster::from_str(&config.broadcaster)?;

        Ok(Self {
            broadcaster,
            config,
            client: None,
            integrations: Vec::new(),
        })
    }

    pub fn from_yaml(yaml: &str) -> EchoResult<Self> {
        Self::from_config(EchoConfig::from_yaml(yaml)?)
    }

    pub fn from_json(json: &str) -> EchoResult<Self> {
        Self::from_config(EchoConfig::from_json(json)?)
    }

    pub fn client(mut self, client: TransportClient) -> Self {
        self.client = Some(client);
        self
    }

    pub fn namespace(mut self, namespace: Option<&str>) -> Self {
        self.config.namespace = namespace.map(str::to_string);
        self
    }

    pub fn without_interceptors(mut self) -> Self {
        self.config.without_interceptors = true;
        self
    }

    pub fn integration(mut self, integration: Arc<dyn HttpIntegration>) -> Self {
        self.integrations.push(integration);
        self
    }

    pub fn formatter(&self) -> EventFormatter {
        EventFormatter::new(self.config.namespace.clone())
    }

    /// Authorization payload sent by Socket.IO subscriptions
    pub fn auth_payload(&self) -> Value {
        json!({ "headers": self.config.effective_auth_headers() })
    }
}

impl fmt::Debug for EchoOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EchoOptions")
            .field("broadcaster", &self.broadcaster)
            .field("config", &self.config)
            .field("client", &self.client)
            .field("integrations", &self.integrations.len())
            .finish()
    }
}
