use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A single-assignment, single-threaded future value.
///
/// Mirrors the original `_promise_impl<T>`: a `Promise<T>` is a handle to a
/// shared, ref-counted cell that is fulfilled or rejected exactly once, and
/// that carries at most one chained continuation. There is no `Arc`, no
/// `Mutex`, no `Send`/`Sync` bound — a `Promise` never leaves the thread
/// that created it, which is what lets the event loop dispatch callbacks
/// without ever taking a lock.
///
/// Attaching a second continuation via [`then`](Promise::then),
/// [`catch`](Promise::catch) or [`on_settle`](Promise::on_settle) is a
/// programming error and panics, just as re-fulfilling an already-settled
/// promise does.
pub struct Promise<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Promise {
            inner: Rc::clone(&self.inner),
        }
    }
}

type Waiter<T> = Box<dyn FnOnce(Settlement<T>)>;

enum Settlement<T> {
    Fulfilled(T),
    Rejected(String),
}

enum Inner<T> {
    Pending { waiter: Option<Waiter<T>> },
    Settled,
}

impl<T: 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Promise<T> {
    /// Create a new, pending promise.
    pub fn new() -> Self {
        Promise {
            inner: Rc::new(RefCell::new(Inner::Pending { waiter: None })),
        }
    }

    /// An already-fulfilled promise, useful where a call can be answered
    /// synchronously.
    pub fn fulfilled(value: T) -> Self {
        let p = Self::new();
        p.fulfill(value);
        p
    }

    /// An already-rejected promise.
    pub fn rejected(message: impl Into<String>) -> Self {
        let p = Self::new();
        p.reject(message);
        p
    }

    /// Resolve the promise with a value. Settling a promise twice logs a
    /// warning and is otherwise ignored, matching single-assignment
    /// semantics without requiring callers to track whether they already
    /// settled it.
    pub fn fulfill(&self, value: T) {
        self.settle(Settlement::Fulfilled(value));
    }

    /// Resolve the promise with an error.
    pub fn reject(&self, message: impl Into<String>) {
        self.settle(Settlement::Rejected(message.into()));
    }

    fn settle(&self, settlement: Settlement<T>) {
        let waiter = {
            let mut inner = self.inner.borrow_mut();
            match std::mem::replace(&mut *inner, Inner::Settled) {
                Inner::Pending { waiter } => waiter,
                Inner::Settled => {
                    tracing::warn!("promise settled more than once; ignoring second settlement");
                    return;
                }
            }
        };
        if let Some(waiter) = waiter {
            waiter(settlement);
        }
        // No waiter registered yet: the settlement is dropped. A promise
        // whose continuation is attached after it already settled would
        // need buffering to see the value; this implementation, like the
        // original, expects `then`/`on_settle` to be attached before the
        // call that can settle the promise returns control to the loop.
    }

    /// Attach both a fulfillment and a rejection handler. At most one of the
    /// two ever runs, and it runs synchronously if the promise is already
    /// settled.
    pub fn on_settle(
        self,
        on_fulfill: impl FnOnce(T) + 'static,
        on_reject: impl FnOnce(String) + 'static,
    ) {
        let waiter: Waiter<T> = Box::new(move |settlement| match settlement {
            Settlement::Fulfilled(value) => on_fulfill(value),
            Settlement::Rejected(message) => on_reject(message),
        });
        self.attach(waiter);
    }

    fn attach(self, waiter: Waiter<T>) {
        let mut inner = self.inner.borrow_mut();
        match &mut *inner {
            Inner::Pending { waiter: slot } => {
                assert!(
                    slot.is_none(),
                    "promise already has a chained continuation"
                );
                *slot = Some(waiter);
            }
            Inner::Settled => {
                drop(inner);
                // Settled promises drop their value on settle, so a
                // continuation attached afterward can only ever observe
                // "already gone". Treat this as the caller's bug.
                panic!("continuation attached to a promise that settled with nothing listening");
            }
        }
    }

    /// Chain a transformation of the fulfilled value. Rejections pass
    /// through untouched to the returned promise.
    pub fn then<U: 'static>(self, f: impl FnOnce(T) -> U + 'static) -> Promise<U> {
        let next = Promise::<U>::new();
        let next_fulfill = next.clone();
        let next_reject = next.clone();
        self.on_settle(
            move |value| next_fulfill.fulfill(f(value)),
            move |message| next_reject.reject(message),
        );
        next
    }

    /// Like [`then`](Promise::then), but `f` can itself reject the chained
    /// promise (used to fold a decode failure into the same error channel
    /// as a peer-reported rejection).
    pub fn try_then<U: 'static>(
        self,
        f: impl FnOnce(T) -> Result<U, String> + 'static,
    ) -> Promise<U> {
        let next = Promise::<U>::new();
        let next_ok = next.clone();
        let next_reject = next.clone();
        self.on_settle(
            move |value| match f(value) {
                Ok(mapped) => next_ok.fulfill(mapped),
                Err(message) => next_ok.reject(message),
            },
            move |message| next_reject.reject(message),
        );
        next
    }

    /// Attach a rejection-only handler, for side effects like logging. The
    /// original promise's fulfillment path is left for a separate
    /// `on_settle`/`then` call.
    pub fn catch(self, f: impl FnOnce(String) + 'static) {
        self.on_settle(|_value| {}, f);
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.inner.borrow() {
            Inner::Pending { waiter } => {
                if waiter.is_some() {
                    "pending(awaited)"
                } else {
                    "pending"
                }
            }
            Inner::Settled => "settled",
        };
        f.debug_struct("Promise").field("state", &state).finish()
    }
}
