//! Event name formatting
//!
//! Server-side broadcast events are published under their fully qualified
//! class name (`App\Events\OrderShipped`). Listeners register short names and
//! the formatter qualifies them with the configured namespace.

/// Default namespace applied to event names
pub const DEFAULT_NAMESPACE: &str = "App.Events";

/// Qualifies event names with a namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFormatter {
    namespace: Option<String>,
}

impl EventFormatter {
    /// Create a formatter; `None` or an empty namespace disables qualification
    pub fn new(namespace: Option<String>) -> Self {
        Self {
            namespace: namespace.filter(|ns| !ns.is_empty()),
        }
    }

    /// Format an event name for the wire
    ///
    /// A leading `.` or `\` marks an already qualified name: the marker is
    /// stripped and the rest is returned untouched.
    pub fn format(&self, event: &str) -> String {
        if let Some(raw) = event.strip_prefix('.').or_else(|| event.strip_prefix('\\')) {
            return raw.to_string();
        }

        let qualified = match &self.namespace {
            Some(namespace) => format!("{}.{}", namespace, event),
            None => event.to_string(),
        };

        qualified.replace('.', "\\")
    }

    /// Reverse of [`format`](Self::format) for events received through a
    /// global binding
    ///
    /// Events inside the namespace come back as their short name, anything
    /// else is returned with a leading `.` so it can be passed to `listen`
    /// verbatim.
    pub fn strip_namespace(&self, event: &str) -> String {
        if let Some(namespace) = &self.namespace {
            let wire_namespace = namespace.replace('.', "\\");
            if let Some(short) = event
                .strip_prefix(wire_namespace.as_str())
                .and_then(|rest| rest.strip_prefix('\\'))
            {
                return short.to_string();
            }
        }

        format!(".{}", event)
    }

    /// Replace the namespace
    pub fn set_namespace(&mut self, namespace: Option<String>) {
        self.namespace = namespace.filter(|ns| !ns.is_empty());
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

impl Default for EventFormatter {
    fn default() -> Self {
        Self::new(Some(DEFAULT_NAMESPACE.to_string()))
    }
}
