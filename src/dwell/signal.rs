//! Observer list for recognizer signals
//!
//! Handlers run synchronously on the recognizer's task, in subscription
//! order. A panicking handler stops delivery for that emission and is
//! reported back to the caller instead of unwinding through it.

use std::panic::{self, AssertUnwindSafe};

use super::DwellError;

/// Handle returned by [`Signal::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&str) + Send>;

/// A named notification channel carrying a target key
pub struct Signal {
    name: &'static str,
    next_id: u64,
    handlers: Vec<(SubscriptionId, Handler)>,
}

impl Signal {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            next_id: 0,
            handlers: Vec::new(),
        }
    }

    /// Register a handler
    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&str) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Remove a handler. Returns false if it was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(existing, _)| *existing != id);
        self.handlers.len() != before
    }

    /// Number of current subscribers
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Deliver `key` to every subscriber
    pub fn emit(&mut self, key: &str) -> Result<(), DwellError> {
        for (_, handler) in self.handlers.iter_mut() {
            panic::catch_unwind(AssertUnwindSafe(|| handler(key))).map_err(|_| {
                DwellError::HandlerPanicked {
                    signal: self.name,
                    key: key.to_string(),
                }
            })?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.name)
            .field("subscribers", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn test_emit_in_subscription_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut signal = Signal::new("focused");

        let first = Arc::clone(&seen);
        signal.subscribe(move |key| first.lock().unwrap().push(format!("1:{key}")));
        let second = Arc::clone(&seen);
        signal.subscribe(move |key| second.lock().unwrap().push(format!("2:{key}")));

        signal.emit("a").unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["1:a", "2:a"]);
    }

    #[test]
    fn test_unsubscribe() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut signal = Signal::new("committed");

        let sink = Arc::clone(&seen);
        let id = signal.subscribe(move |key| sink.lock().unwrap().push(key.to_string()));
        assert!(signal.unsubscribe(id));
        assert!(!signal.unsubscribe(id));
        assert_eq!(signal.len(), 0);

        signal.emit("a").unwrap();
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_panicking_handler_is_contained() {
        let mut signal = Signal::new("committed");
        signal.subscribe(|_| panic!("subscriber bug"));

        let err = signal.emit("a").unwrap_err();
        assert!(matches!(
            err,
            DwellError::HandlerPanicked { signal: "committed", .. }
        ));
    }
}
