use std::fmt;

/// Result envelope returned by an event callback.
///
/// A `Flow<T>` carries an optional result value and an optional
/// short-circuit [`Action`]. Both accessors are total: they return `None`
/// rather than failing when the component is absent. A flow is immutable
/// once constructed.
///
/// The gateway only transports the action back to the instrumented call
/// site; it never enforces it. Whether a `Block` actually aborts the
/// request is entirely the call site's responsibility.
///
/// # Examples
///
/// ```
/// use appsec_gateway::{Action, Flow};
///
/// let plain: Flow<u32> = Flow::from_result(7);
/// assert_eq!(plain.result(), Some(&7));
/// assert!(plain.action().is_none());
///
/// let blocking: Flow<u32> = Flow::from_action(Action::block_default());
/// assert!(blocking.result().is_none());
/// assert!(blocking.action().is_some());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Flow<T> {
    result: Option<T>,
    action: Option<Action>,
}

impl<T> Flow<T> {
    /// Creates a flow carrying both an optional result and an optional
    /// action.
    pub fn new(result: Option<T>, action: Option<Action>) -> Self {
        Self { result, action }
    }

    /// Creates a plain-result flow: a value and no action.
    pub fn from_result(result: T) -> Self {
        Self {
            result: Some(result),
            action: None,
        }
    }

    /// Creates an action-only flow.
    pub fn from_action(action: Action) -> Self {
        Self {
            result: None,
            action: Some(action),
        }
    }

    /// Creates a flow carrying neither a result nor an action.
    pub fn empty() -> Self {
        Self {
            result: None,
            action: None,
        }
    }

    /// Returns the result value, if any.
    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    /// Returns the short-circuit action, if any.
    pub fn action(&self) -> Option<&Action> {
        self.action.as_ref()
    }

    /// Consumes the flow, returning the result value.
    pub fn into_result(self) -> Option<T> {
        self.result
    }
}

impl<T> Default for Flow<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Short-circuit directive requested by the security engine.
///
/// An action asks the call site to deviate from normal request
/// continuation. The gateway transports actions without interpreting them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Abort the request and respond with the given status.
    Block {
        /// HTTP status code the call site should respond with.
        status: u16,
        /// Body the call site should render for the blocked response.
        body: BlockBody,
    },
    /// Redirect the request instead of serving it.
    Redirect {
        /// HTTP redirect status code (3xx).
        status: u16,
        /// Target location for the redirect.
        location: String,
    },
}

impl Action {
    /// The conventional blocking action: 403 with a negotiated body.
    pub fn block_default() -> Self {
        Action::Block {
            status: 403,
            body: BlockBody::Auto,
        }
    }

    /// Returns `true` for actions that abort the request outright.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Action::Block { .. })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Block { status, body } => write!(f, "block(status={}, body={})", status, body),
            Action::Redirect { status, location } => {
                write!(f, "redirect(status={}, location={})", status, location)
            }
        }
    }
}

/// Body variant for a blocked response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockBody {
    /// Negotiate the body from the request's `Accept` header.
    Auto,
    /// Serve the HTML block page.
    Html,
    /// Serve the JSON block document.
    Json,
}

impl fmt::Display for BlockBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockBody::Auto => write!(f, "auto"),
            BlockBody::Html => write!(f, "html"),
            BlockBody::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_result_flow() {
        let flow = Flow::from_result("verdict".to_string());

        assert_eq!(flow.result().map(String::as_str), Some("verdict"));
        assert!(flow.action().is_none());
        assert_eq!(flow.into_result().as_deref(), Some("verdict"));
    }

    #[test]
    fn empty_flow_accessors_are_total() {
        let flow: Flow<()> = Flow::empty();

        assert!(flow.result().is_none());
        assert!(flow.action().is_none());
    }

    #[test]
    fn action_flow_carries_directive() {
        let flow: Flow<()> = Flow::from_action(Action::Block {
            status: 418,
            body: BlockBody::Json,
        });

        match flow.action() {
            Some(Action::Block { status, body }) => {
                assert_eq!(*status, 418);
                assert_eq!(*body, BlockBody::Json);
            }
            other => panic!("expected block action, got {:?}", other),
        }
    }

    #[test]
    fn action_and_value_flow() {
        let flow = Flow::new(Some(9), Some(Action::block_default()));

        assert_eq!(flow.result(), Some(&9));
        assert!(flow.action().is_some_and(Action::is_blocking));
    }

    #[test]
    fn default_block_is_403_auto() {
        assert_eq!(
            Action::block_default(),
            Action::Block {
                status: 403,
                body: BlockBody::Auto,
            }
        );
    }

    #[test]
    fn redirect_is_not_blocking() {
        let action = Action::Redirect {
            status: 303,
            location: "/denied".to_string(),
        };

        assert!(!action.is_blocking());
        assert_eq!(action.to_string(), "redirect(status=303, location=/denied)");
    }
}
