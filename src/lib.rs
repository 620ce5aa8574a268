//! In-process application security instrumentation gateway.
//!
//! This crate is the seam between instrumented call sites (HTTP request
//! entry, header parsing, request body processing) and a single registered
//! security engine:
//!
//! - **Event registry**: a fixed catalog of typed event tokens, each holding
//!   at most one engine callback; lookup is lock-free and runs on the
//!   request hot path, registration and cancellation race safely against it
//! - **Flow protocol**: the immutable result envelope a callback returns
//!   (optional value plus optional short-circuit [`Action`])
//! - **Bounded snapshotting**: [`Snapshotter`] converts arbitrary, possibly
//!   adversarial object graphs into a depth- and size-bounded [`Snapshot`]
//!   the engine can inspect without being affected by concurrent mutation
//!
//! The gateway only transports decisions; it never enforces them. A call
//! site fires an event, invokes the callback synchronously on its own
//! thread, and applies (or ignores) the returned action itself.
//!
//! # Core Types
//!
//! - [`InstrumentationGateway`]: register/lookup/cancel for event callbacks
//! - [`EventType`]: identity token for one hook point, pinning its callback
//!   signature at compile time
//! - [`Subscription`]: cancellable handle to one registered callback
//! - [`Flow`]: callback result envelope
//! - [`Snapshotter`] / [`Snapshot`]: bounded, cycle-safe object conversion
//! - [`Introspect`]: structural introspection seam replacing runtime
//!   reflection
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use appsec_gateway::{
//!     Flow, InstrumentationGateway, RequestContext, REQUEST_STARTED,
//! };
//!
//! let gateway = InstrumentationGateway::new();
//!
//! // The security engine registers a callback at initialization time.
//! let subscription = gateway
//!     .register(
//!         &REQUEST_STARTED,
//!         Arc::new(|_ctx: &mut RequestContext| Flow::empty()),
//!     )
//!     .expect("no callback registered yet");
//!
//! // An instrumented call site fires the event on the request path.
//! let mut ctx = RequestContext::new("req-1");
//! if let Some(callback) = gateway.callback(&REQUEST_STARTED) {
//!     let flow = (*callback)(&mut ctx);
//!     assert!(flow.action().is_none());
//! }
//!
//! // Teardown is idempotent and identity-checked.
//! subscription.cancel();
//! assert!(gateway.callback(&REQUEST_STARTED).is_none());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod context;
mod error;
mod events;
mod flow;
mod gateway;
mod introspect;
mod snapshot;

pub use context::{Header, RequestContext};
pub use error::{FieldError, GatewayError};
pub use events::{
    EventType, RequestBodyProcessedCallback, RequestBodyStartCallback, RequestEndedCallback,
    RequestHeaderCallback, RequestHeadersDoneCallback, RequestStartedCallback,
    REQUEST_BODY_PROCESSED, REQUEST_BODY_START, REQUEST_ENDED, REQUEST_HEADER,
    REQUEST_HEADERS_DONE, REQUEST_STARTED,
};
pub use flow::{Action, BlockBody, Flow};
pub use gateway::{InstrumentationGateway, Subscription};
pub use introspect::{Field, Introspect, Shape};
pub use snapshot::{Limits, Snapshot, Snapshotter};
