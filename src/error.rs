use std::fmt;

/// Errors surfaced by the instrumentation gateway.
///
/// Registration is the only gateway operation that can fail; lookup and
/// cancellation are total. A failed registration leaves the existing
/// binding untouched.
#[derive(Debug, PartialEq, Eq)]
pub enum GatewayError {
    /// A callback is already bound to the named event.
    ///
    /// The registry holds at most one callback per event token. Rejecting
    /// the second registration instead of silently overwriting the first
    /// keeps "which engine is watching this hook" unambiguous.
    CallbackConflict {
        /// Name of the event that already has a bound callback.
        event: &'static str,
    },
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::CallbackConflict { event } => {
                write!(f, "callback already registered for event '{}'", event)
            }
        }
    }
}

impl std::error::Error for GatewayError {}

/// Error raised while reading one field during structural introspection.
///
/// A `FieldError` is absorbed at the boundary of the field that raised it:
/// the snapshotter replaces that single field with an error-marker leaf and
/// continues converting siblings and ancestors normally. It never aborts a
/// conversion.
///
/// # Security Properties
///
/// The message ends up verbatim inside the snapshot handed to the security
/// engine. Implementors of [`Introspect`](crate::Introspect) must describe
/// the failure ("backing store unavailable"), never echo the data that
/// caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    message: String,
}

impl FieldError {
    /// Creates a new field read error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the failure description.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field read failed: {}", self.message)
    }
}

impl std::error::Error for FieldError {}
