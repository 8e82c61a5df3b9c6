//! Change notification for sheet observers.
//!
//! Renderers and editors register a zero-argument callback and refresh
//! themselves when it fires. Callbacks run synchronously, in registration
//! order, once per mutating operation.
//!
//! A panicking callback is caught and logged; the remaining callbacks still
//! run.

use std::panic::{self, AssertUnwindSafe};

/// Handle returned by `add`, used to deregister a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Callback type for change notifications.
pub type ChangeCallback = Box<dyn FnMut()>;

#[derive(Default)]
pub struct ChangeNotifier {
    handlers: Vec<(SubscriptionId, ChangeCallback)>,
    next_id: u64,
    fired: u64,
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("handlers", &self.handlers.len())
            .field("fired", &self.fired)
            .finish()
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, handler: impl FnMut() + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Deregister a callback. Returns false if `id` was not registered.
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        match self.handlers.iter().position(|(h, _)| *h == id) {
            Some(ix) => {
                self.handlers.remove(ix);
                true
            }
            None => false,
        }
    }

    /// Run every callback in registration order.
    pub fn notify(&mut self) {
        self.fired += 1;
        for (id, handler) in self.handlers.iter_mut() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler())) {
                log::error!("change observer {:?} failed: {}", id, panic_message(&*payload));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Number of notifications sent so far.
    pub fn fired(&self) -> u64 {
        self.fired
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("non-string panic payload")
    }
}
