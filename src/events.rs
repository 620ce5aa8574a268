use std::fmt;
use std::marker::PhantomData;

use crate::context::{Header, RequestContext};
use crate::flow::Flow;
use crate::introspect::Introspect;

/// Identity token for one fixed hook point in request processing.
///
/// Tokens form a closed, statically known catalog (the `REQUEST_*` consts
/// in this module); instrumentation and engine code share the same consts,
/// so two tokens denote the same hook exactly when their ids are equal.
///
/// The `CB` type parameter pins the callback signature for the hook: a
/// callback can only be registered for a token whose signature it matches,
/// checked at compile time. The parameter is phantom; a token carries no
/// callback itself.
pub struct EventType<CB: ?Sized> {
    id: usize,
    name: &'static str,
    _signature: PhantomData<fn(&CB)>,
}

impl<CB: ?Sized> EventType<CB> {
    /// Creates a token. `pub(crate)` keeps the catalog closed.
    pub(crate) const fn new(id: usize, name: &'static str) -> Self {
        Self {
            id,
            name,
            _signature: PhantomData,
        }
    }

    /// Slot index of this token in the registry.
    pub(crate) fn id(&self) -> usize {
        self.id
    }

    /// Stable name of the hook point, e.g. `"request.started"`.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<CB: ?Sized> PartialEq for EventType<CB> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<CB: ?Sized> Eq for EventType<CB> {}

// Not derived: a derive would put a `CB: Debug` bound on the impl.
impl<CB: ?Sized> fmt::Debug for EventType<CB> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventType")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// Callback signature for [`REQUEST_STARTED`].
pub type RequestStartedCallback = dyn Fn(&mut RequestContext) -> Flow<()> + Send + Sync;

/// Callback signature for [`REQUEST_ENDED`].
pub type RequestEndedCallback = dyn Fn(&mut RequestContext) -> Flow<()> + Send + Sync;

/// Callback signature for [`REQUEST_HEADER`].
pub type RequestHeaderCallback = dyn Fn(&mut RequestContext, &Header) -> Flow<()> + Send + Sync;

/// Callback signature for [`REQUEST_HEADERS_DONE`].
pub type RequestHeadersDoneCallback = dyn Fn(&mut RequestContext) -> Flow<()> + Send + Sync;

/// Callback signature for [`REQUEST_BODY_START`].
pub type RequestBodyStartCallback = dyn Fn(&mut RequestContext) -> Flow<()> + Send + Sync;

/// Callback signature for [`REQUEST_BODY_PROCESSED`].
///
/// The call site hands over the raw parsed body; the engine is expected to
/// snapshot it with a [`Snapshotter`](crate::Snapshotter) before evaluating
/// rules against it.
pub type RequestBodyProcessedCallback =
    dyn Fn(&mut RequestContext, &dyn Introspect) -> Flow<()> + Send + Sync;

/// A request started being processed. Fired once, before anything else.
pub const REQUEST_STARTED: EventType<RequestStartedCallback> =
    EventType::new(0, "request.started");

/// A request finished, successfully or not. Fired once, last.
pub const REQUEST_ENDED: EventType<RequestEndedCallback> = EventType::new(1, "request.ended");

/// One request header was parsed. Fired per header.
pub const REQUEST_HEADER: EventType<RequestHeaderCallback> = EventType::new(2, "request.header");

/// All request headers were parsed.
pub const REQUEST_HEADERS_DONE: EventType<RequestHeadersDoneCallback> =
    EventType::new(3, "request.headers_done");

/// The request body started being read.
pub const REQUEST_BODY_START: EventType<RequestBodyStartCallback> =
    EventType::new(4, "request.body_start");

/// The request body was fully parsed into an object graph.
pub const REQUEST_BODY_PROCESSED: EventType<RequestBodyProcessedCallback> =
    EventType::new(5, "request.body_processed");

/// Number of slots in the registry; tokens index `0..MAX_EVENTS`.
pub(crate) const MAX_EVENTS: usize = 6;
