//! Synchronous multicast notifications.
//!
//! [`Event`] carries no payload and [`Event1`] carries one value passed by
//! reference. Both invoke handlers in subscription order on the calling
//! thread.
//!
//! Handlers are snapshotted when an emission starts, so a handler may
//! subscribe or unsubscribe (itself or others) without affecting the
//! emission in progress. A handler that panics is logged and skipped; the
//! remaining handlers still run.

use std::{
    cell::{Cell, RefCell},
    fmt,
    panic::{self, AssertUnwindSafe},
    rc::Rc,
};

use smallvec::SmallVec;

/// Token returned by `subscribe`, used to remove the handler again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

struct HandlerList<F: ?Sized> {
    next_id: Cell<u64>,
    entries: RefCell<Vec<(Subscription, Rc<F>)>>,
}

impl<F: ?Sized> HandlerList<F> {
    fn new() -> Self {
        Self {
            next_id: Cell::new(0),
            entries: RefCell::new(Vec::new()),
        }
    }

    fn push(&self, handler: Rc<F>) -> Subscription {
        let token = Subscription(self.next_id.get());
        self.next_id.set(token.0 + 1);
        self.entries.borrow_mut().push((token, handler));
        token
    }

    fn remove(&self, token: Subscription) {
        self.entries.borrow_mut().retain(|(id, _)| *id != token);
    }

    fn snapshot(&self) -> SmallVec<[Rc<F>; 4]> {
        self.entries
            .borrow()
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

fn invoke_isolated(call: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(call)).is_err() {
        tracing::error!("event handler panicked; continuing with remaining handlers");
    }
}

/// Zero-argument event.
pub struct Event {
    handlers: HandlerList<dyn Fn()>,
}

impl Event {
    pub fn new() -> Self {
        Self {
            handlers: HandlerList::new(),
        }
    }

    /// Registers `handler`; it runs on every later emission until removed.
    pub fn subscribe(&self, handler: impl Fn() + 'static) -> Subscription {
        self.handlers.push(Rc::new(handler))
    }

    /// Removes a handler. Unknown or already removed tokens are ignored.
    pub fn unsubscribe(&self, token: Subscription) {
        self.handlers.remove(token);
    }

    /// Invokes every handler registered at the moment of the call.
    pub fn emit(&self) {
        for handler in self.handlers.snapshot() {
            invoke_isolated(|| handler());
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("handlers", &self.len())
            .finish()
    }
}

/// One-argument event. The payload is lent to each handler in turn.
pub struct Event1<T> {
    handlers: HandlerList<dyn Fn(&T)>,
}

impl<T> Event1<T> {
    pub fn new() -> Self {
        Self {
            handlers: HandlerList::new(),
        }
    }

    pub fn subscribe(&self, handler: impl Fn(&T) + 'static) -> Subscription {
        self.handlers.push(Rc::new(handler))
    }

    pub fn unsubscribe(&self, token: Subscription) {
        self.handlers.remove(token);
    }

    pub fn emit(&self, value: &T) {
        for handler in self.handlers.snapshot() {
            invoke_isolated(|| handler(value));
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for Event1<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Event1<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event1")
            .field("handlers", &self.len())
            .finish()
    }
}
