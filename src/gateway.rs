use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use arc_swap::ArcSwapOption;

use crate::error::GatewayError;
use crate::events::{EventType, MAX_EVENTS};

/// Published binding for one event slot.
///
/// The box erases the concrete `Arc<CB>` so all slots share one type; the
/// surrounding `Arc` gives each registration a distinct identity that
/// [`Subscription::cancel`] checks against.
struct Slot {
    callback: Box<dyn Any + Send + Sync>,
}

struct Registry {
    slots: Vec<ArcSwapOption<Slot>>,
    /// Serializes register/cancel. Lookups never touch it.
    write_lock: Mutex<()>,
}

/// Locks the write path, recovering from poison.
///
/// A poisoned lock only means another thread panicked inside register or
/// cancel; every slot mutation is a single atomic publish, so the slot
/// array is consistent regardless.
fn write_lock(registry: &Registry) -> MutexGuard<'_, ()> {
    registry
        .write_lock
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Process-wide event dispatch registry.
///
/// One slot per [`EventType`], each holding at most one callback. The
/// registry is built for a read-mostly life: callbacks are registered at
/// engine initialization and cancelled at teardown or reload, while
/// [`callback`](Self::callback) runs on every monitored request. Lookup is
/// a single lock-free atomic load of the token's slot; registration and
/// cancellation take a narrow mutex that lookups never contend on.
///
/// Cloning the gateway is cheap and clones share the same slots, so the
/// instrumentation side and the engine side can each hold a handle.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use appsec_gateway::{Flow, InstrumentationGateway, RequestContext, REQUEST_ENDED};
///
/// let gateway = InstrumentationGateway::new();
/// let subscription = gateway
///     .register(
///         &REQUEST_ENDED,
///         Arc::new(|_ctx: &mut RequestContext| Flow::empty()),
///     )
///     .expect("slot was empty");
///
/// assert!(gateway.callback(&REQUEST_ENDED).is_some());
///
/// // A second registration for the same token is rejected.
/// let conflict = gateway.register(
///     &REQUEST_ENDED,
///     Arc::new(|_ctx: &mut RequestContext| Flow::empty()),
/// );
/// assert!(conflict.is_err());
///
/// subscription.cancel();
/// assert!(gateway.callback(&REQUEST_ENDED).is_none());
/// ```
#[derive(Clone)]
pub struct InstrumentationGateway {
    registry: Arc<Registry>,
}

impl InstrumentationGateway {
    /// Creates a gateway with all slots empty.
    pub fn new() -> Self {
        let slots = (0..MAX_EVENTS).map(|_| ArcSwapOption::empty()).collect();
        Self {
            registry: Arc::new(Registry {
                slots,
                write_lock: Mutex::new(()),
            }),
        }
    }

    /// Registers a callback for an event token.
    ///
    /// Publishes the binding atomically: a concurrent lookup observes
    /// either no callback or the fully registered one, never a partial
    /// state. Of two concurrent registrations for the same token exactly
    /// one wins; the other gets the conflict error.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::CallbackConflict`] if the token already has
    /// a bound callback. The existing binding is untouched.
    pub fn register<CB>(
        &self,
        event: &EventType<CB>,
        callback: Arc<CB>,
    ) -> Result<Subscription, GatewayError>
    where
        CB: ?Sized + Send + Sync + 'static,
    {
        let _guard = write_lock(&self.registry);
        let slot_cell = &self.registry.slots[event.id()];
        if slot_cell.load().is_some() {
            return Err(GatewayError::CallbackConflict {
                event: event.name(),
            });
        }

        let slot = Arc::new(Slot {
            callback: Box::new(callback),
        });
        let issued_for = Arc::downgrade(&slot);
        slot_cell.store(Some(slot));
        tracing::debug!(event = event.name(), "callback registered");

        Ok(Subscription {
            registry: Arc::downgrade(&self.registry),
            slot_index: event.id(),
            event_name: event.name(),
            issued_for,
        })
    }

    /// Returns the currently published callback for a token, if any.
    ///
    /// This is the request hot path: a single lock-free atomic load, never
    /// blocked by a concurrent register or cancel.
    pub fn callback<CB>(&self, event: &EventType<CB>) -> Option<Arc<CB>>
    where
        CB: ?Sized + 'static,
    {
        let slot = self.registry.slots[event.id()].load_full()?;
        // The token's phantom signature guarantees the downcast matches
        // whatever register() erased for this slot.
        slot.callback.downcast_ref::<Arc<CB>>().cloned()
    }
}

impl Default for InstrumentationGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InstrumentationGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = self
            .registry
            .slots
            .iter()
            .filter(|slot| slot.load().is_some())
            .count();
        f.debug_struct("InstrumentationGateway")
            .field("bound_callbacks", &bound)
            .finish()
    }
}

/// Cancellable handle to one registered callback.
///
/// A subscription is tied to the exact registration it was issued for.
/// [`cancel`](Self::cancel) removes the binding only if the slot still
/// holds that registration; after the slot was cancelled already or
/// overwritten by a newer registration, cancelling is a no-op rather than
/// an error. The handle holds only weak references, so dropping it (or
/// keeping it around after teardown) never prolongs a callback's life.
pub struct Subscription {
    registry: Weak<Registry>,
    slot_index: usize,
    event_name: &'static str,
    issued_for: Weak<Slot>,
}

impl Subscription {
    /// Name of the event this subscription was issued for.
    pub fn event_name(&self) -> &'static str {
        self.event_name
    }

    /// Removes the callback binding, if it is still this subscription's.
    ///
    /// Idempotent and identity-checked: racing against a newer
    /// registration for the same token never removes the newer binding.
    pub fn cancel(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        // If the registration was already replaced or cancelled, the slot
        // it was issued for is gone and there is nothing to do.
        let Some(expected) = self.issued_for.upgrade() else {
            return;
        };

        let _guard = write_lock(&registry);
        let slot_cell = &registry.slots[self.slot_index];
        let current = slot_cell.load();
        if let Some(current_slot) = current.as_ref() {
            if Arc::ptr_eq(current_slot, &expected) {
                slot_cell.store(None);
                tracing::debug!(event = self.event_name, "callback cancelled");
            }
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::events::{RequestStartedCallback, REQUEST_ENDED, REQUEST_STARTED};
    use crate::flow::Flow;

    fn noop() -> Arc<RequestStartedCallback> {
        Arc::new(|_ctx: &mut RequestContext| Flow::empty())
    }

    #[test]
    fn lookup_on_empty_slot_is_none() {
        let gateway = InstrumentationGateway::new();

        assert!(gateway.callback(&REQUEST_STARTED).is_none());
        assert!(gateway.callback(&REQUEST_ENDED).is_none());
    }

    #[test]
    fn registered_callback_is_invocable() {
        let gateway = InstrumentationGateway::new();
        let _subscription = gateway
            .register(
                &REQUEST_STARTED,
                Arc::new(|ctx: &mut RequestContext| {
                    ctx.set_engine_state(1u32);
                    Flow::empty()
                }),
            )
            .expect("empty slot");

        let callback = gateway.callback(&REQUEST_STARTED).expect("registered");
        let mut ctx = RequestContext::new("req-1");
        let flow = (*callback)(&mut ctx);

        assert!(flow.action().is_none());
        assert_eq!(ctx.engine_state::<u32>(), Some(&1));
    }

    #[test]
    fn second_registration_conflicts() {
        let gateway = InstrumentationGateway::new();
        let _first = gateway.register(&REQUEST_STARTED, noop()).expect("empty");

        let second = gateway.register(&REQUEST_STARTED, noop());
        assert_eq!(
            second.expect_err("slot occupied"),
            GatewayError::CallbackConflict {
                event: "request.started"
            }
        );
        // The first binding survives.
        assert!(gateway.callback(&REQUEST_STARTED).is_some());
    }

    #[test]
    fn cancel_clears_only_its_own_slot() {
        let gateway = InstrumentationGateway::new();
        let started = gateway.register(&REQUEST_STARTED, noop()).expect("empty");
        let _ended = gateway
            .register(&REQUEST_ENDED, Arc::new(|_: &mut RequestContext| Flow::empty()))
            .expect("empty");

        started.cancel();

        assert!(gateway.callback(&REQUEST_STARTED).is_none());
        assert!(gateway.callback(&REQUEST_ENDED).is_some());
    }

    #[test]
    fn cancel_is_idempotent() {
        let gateway = InstrumentationGateway::new();
        let subscription = gateway.register(&REQUEST_STARTED, noop()).expect("empty");

        subscription.cancel();
        subscription.cancel();

        assert!(gateway.callback(&REQUEST_STARTED).is_none());
    }

    #[test]
    fn stale_cancel_spares_newer_registration() {
        let gateway = InstrumentationGateway::new();
        let old = gateway.register(&REQUEST_STARTED, noop()).expect("empty");
        old.cancel();

        let _new = gateway.register(&REQUEST_STARTED, noop()).expect("freed");

        // The old handle must not tear down the replacement.
        old.cancel();
        assert!(gateway.callback(&REQUEST_STARTED).is_some());
    }

    #[test]
    fn clones_share_slots() {
        let gateway = InstrumentationGateway::new();
        let clone = gateway.clone();

        let _subscription = clone.register(&REQUEST_STARTED, noop()).expect("empty");
        assert!(gateway.callback(&REQUEST_STARTED).is_some());
    }

    #[test]
    fn cancel_after_gateway_dropped_is_a_noop() {
        let gateway = InstrumentationGateway::new();
        let subscription = gateway.register(&REQUEST_STARTED, noop()).expect("empty");
        drop(gateway);

        subscription.cancel();
    }

    #[test]
    fn debug_reports_bound_slots() {
        let gateway = InstrumentationGateway::new();
        let _subscription = gateway.register(&REQUEST_STARTED, noop()).expect("empty");

        assert!(format!("{:?}", gateway).contains("bound_callbacks: 1"));
    }
}
