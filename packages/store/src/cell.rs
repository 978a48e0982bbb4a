//! Observable cells.
//!
//! A [`ModelCell`] is the unit of shared state behind a two-way binding. Cells
//! are reference counted handles: cloning a cell clones the handle, so every
//! holder sees the same value and writes are visible through all of them.
//! Subscribers are how the host runtime's reactivity hooks in.

use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Identifier returned by [`ModelCell::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Rc<dyn Fn(&Value)>;

struct CellState {
    value: Value,
    version: u64,
    next_subscription: u64,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
}

/// Mutable, observable holder of an arbitrary JSON value
#[derive(Clone)]
pub struct ModelCell {
    state: Rc<RefCell<CellState>>,
}

impl ModelCell {
    pub fn new(value: Value) -> Self {
        Self {
            state: Rc::new(RefCell::new(CellState {
                value,
                version: 0,
                next_subscription: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Current value (cloned)
    pub fn get(&self) -> Value {
        self.state.borrow().value.clone()
    }

    /// Borrow the current value without cloning it
    pub fn with<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        f(&self.state.borrow().value)
    }

    /// Write a new value in place and notify subscribers.
    ///
    /// Writing a value equal to the current one is not a change: the version
    /// stays put and nobody is notified.
    pub fn set(&self, value: Value) {
        if self.state.borrow().value == value {
            return;
        }
        self.replace(value);
    }

    /// Write unconditionally, returning the previous value
    pub fn replace(&self, value: Value) -> Value {
        let (previous, subscribers) = {
            let mut state = self.state.borrow_mut();
            let previous = std::mem::replace(&mut state.value, value);
            state.version += 1;
            let subscribers: Vec<Subscriber> =
                state.subscribers.iter().map(|(_, s)| s.clone()).collect();
            (previous, subscribers)
        };

        // Subscribers run without the borrow held so they may read or write
        // the cell again.
        let current = self.get();
        for subscriber in subscribers {
            subscriber(&current);
        }
        previous
    }

    /// Number of writes since creation
    pub fn version(&self) -> u64 {
        self.state.borrow().version
    }

    pub fn subscribe(&self, f: impl Fn(&Value) + 'static) -> SubscriptionId {
        let mut state = self.state.borrow_mut();
        let id = SubscriptionId(state.next_subscription);
        state.next_subscription += 1;
        state.subscribers.push((id, Rc::new(f)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.state.borrow_mut();
        let before = state.subscribers.len();
        state.subscribers.retain(|(sid, _)| *sid != id);
        state.subscribers.len() != before
    }

    /// True when both handles point at the same cell
    pub fn ptr_eq(&self, other: &ModelCell) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl fmt::Debug for ModelCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ModelCell")
            .field("value", &state.value)
            .field("version", &state.version)
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn test_set_notifies_subscribers() {
        let cell = ModelCell::new(json!(1));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        cell.subscribe(move |v| sink.borrow_mut().push(v.clone()));

        cell.set(json!(2));
        cell.set(json!(3));

        assert_eq!(*seen.borrow(), vec![json!(2), json!(3)]);
        assert_eq!(cell.version(), 2);
    }

    #[test]
    fn test_equal_write_is_not_a_change() {
        let cell = ModelCell::new(json!("same"));
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        cell.subscribe(move |_| counter.set(counter.get() + 1));

        cell.set(json!("same"));

        assert_eq!(hits.get(), 0);
        assert_eq!(cell.version(), 0);
    }

    #[test]
    fn test_unsubscribe() {
        let cell = ModelCell::new(Value::Null);
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let id = cell.subscribe(move |_| counter.set(counter.get() + 1));

        assert!(cell.unsubscribe(id));
        assert!(!cell.unsubscribe(id));
        cell.set(json!(true));
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_clones_share_state() {
        let a = ModelCell::new(json!(0));
        let b = a.clone();
        b.set(json!(10));
        assert_eq!(a.get(), json!(10));
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&ModelCell::new(json!(10))));
    }

    #[test]
    fn test_subscriber_may_write_back() {
        let cell = ModelCell::new(json!(0));
        let inner = cell.clone();
        cell.subscribe(move |v| {
            if v == &json!(1) {
                inner.set(json!(2));
            }
        });

        cell.set(json!(1));
        assert_eq!(cell.get(), json!(2));
    }
}
