//! Input subscription
//!
//! The display surface pushes [`InputEvent`]s into an [`InputHub`]. Anything interested in
//! input subscribes and holds the returned [`Subscription`]; dropping the guard removes the
//! handler, so capture can never outlive the thing that asked for it.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::session::AnnotationSession;
use crate::translator::InputEvent;

type Handler = Rc<RefCell<dyn FnMut(&InputEvent)>>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: Vec<(u64, Handler)>,
}

impl Registry {
    fn is_registered(&self, id: u64) -> bool {
        self.handlers.iter().any(|(existing, _)| *existing == id)
    }
}

/// Single-threaded event fan-out. Cloning yields another handle to the same hub.
#[derive(Clone, Default)]
pub struct InputHub {
    registry: Rc<RefCell<Registry>>,
}

impl InputHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: impl FnMut(&InputEvent) + 'static) -> Subscription {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        let handler: Handler = Rc::new(RefCell::new(handler));
        registry.handlers.push((id, handler));

        Subscription { id, registry: Rc::downgrade(&self.registry) }
    }

    /// Deliver `event` to every live subscriber, returning how many received it.
    ///
    /// Handlers may subscribe or unsubscribe while being called. A handler that is already
    /// running (re-entrant dispatch) is skipped for the nested event.
    pub fn dispatch(&self, event: &InputEvent) -> usize {
        let snapshot: Vec<(u64, Handler)> = self.registry.borrow().handlers.clone();
        let mut delivered = 0;

        for (id, handler) in snapshot {
            if !self.registry.borrow().is_registered(id) {
                continue;
            }

            let Ok(mut handler) = handler.try_borrow_mut() else {
                log::warn!("input handler {id} is busy; skipping nested {event:?}");
                continue;
            };
            (&mut *handler)(event);
            delivered += 1;
        }

        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.borrow().handlers.len()
    }
}

/// Active subscription; unsubscribes when dropped
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    registry: Weak<RefCell<Registry>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let Ok(mut registry) = registry.try_borrow_mut() else {
            log::warn!("input registry busy while dropping subscription {}", self.id);
            return;
        };
        registry.handlers.retain(|(id, _)| *id != self.id);
    }
}

/// Binds a session to a hub for as long as the surface lives
pub struct ViewerSurface {
    _subscription: Subscription,
}

impl ViewerSurface {
    pub fn attach(hub: &InputHub, session: Rc<RefCell<AnnotationSession>>) -> Self {
        let subscription = hub.subscribe(move |event| {
            let Ok(mut session) = session.try_borrow_mut() else {
                log::warn!("session busy; dropping {event:?}");
                return;
            };
            if let Err(err) = session.handle_input(event) {
                log::warn!("input {event:?} failed: {err}");
            }
        });

        Self { _subscription: subscription }
    }
}
