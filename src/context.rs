use std::any::Any;
use std::fmt;

/// Per-request state container passed to every event callback.
///
/// The instrumented call site creates one `RequestContext` when a request
/// enters and threads it through every event it fires for that request.
/// The security engine owns whatever it stores in the context; the gateway
/// never reads it.
///
/// # Examples
///
/// ```
/// use appsec_gateway::RequestContext;
///
/// struct EngineState {
///     rules_evaluated: u32,
/// }
///
/// let mut ctx = RequestContext::new("req-42");
/// ctx.set_engine_state(EngineState { rules_evaluated: 0 });
///
/// let state = ctx.engine_state_mut::<EngineState>().unwrap();
/// state.rules_evaluated += 1;
/// assert_eq!(ctx.engine_state::<EngineState>().unwrap().rules_evaluated, 1);
/// ```
pub struct RequestContext {
    request_id: String,
    engine_state: Option<Box<dyn Any + Send>>,
}

impl RequestContext {
    /// Creates a fresh context for one request.
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            engine_state: None,
        }
    }

    /// Returns the request identifier this context was created with.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Stores the engine's per-request state, replacing any previous state.
    ///
    /// Typically called by the engine's `request.started` callback.
    pub fn set_engine_state<T: Any + Send>(&mut self, state: T) {
        self.engine_state = Some(Box::new(state));
    }

    /// Returns the engine state if one of type `T` is stored.
    pub fn engine_state<T: Any>(&self) -> Option<&T> {
        self.engine_state.as_deref().and_then(|state| state.downcast_ref())
    }

    /// Returns the engine state mutably if one of type `T` is stored.
    pub fn engine_state_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.engine_state
            .as_deref_mut()
            .and_then(|state| state.downcast_mut())
    }

    /// Removes and returns the engine state if one of type `T` is stored.
    ///
    /// State of a different type stays in place.
    pub fn take_engine_state<T: Any>(&mut self) -> Option<T> {
        match self.engine_state.take() {
            Some(boxed) => match boxed.downcast::<T>() {
                Ok(state) => Some(*state),
                Err(other) => {
                    self.engine_state = Some(other);
                    None
                }
            },
            None => None,
        }
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("has_engine_state", &self.engine_state.is_some())
            .finish()
    }
}

/// One request header, the payload of the `request.header` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Header name as received from the client.
    pub name: String,
    /// Raw header value; untrusted request data.
    pub value: String,
}

impl Header {
    /// Creates a header payload.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}
