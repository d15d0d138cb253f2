//! The event primitive every lifecycle stage in this crate is built on.
//!
//! Each [`EventBus`] manages a fixed set of named events against a subject
//! type `S`. An event is declared either *once* (it fires at most one time;
//! a handler bound after it already fired is replayed immediately with the
//! recorded error instead of being queued) or *many* (it may fire any number
//! of times and stays bound across firings). Handlers may return a value of
//! type `V`; within one firing, the last handler to return `Some(_)` becomes
//! the event's chained result — this is how `post_request` turns into a
//! redispatch instruction for the client's request loop.

use std::collections::{HashMap, HashSet};

use crate::error::ConsumerError;

/// A single lifecycle-event handler. Takes the subject being acted on and,
/// if the firing was triggered by a failure, the error that caused it.
pub type Handler<S, V> = Box<dyn FnMut(&mut S, Option<&ConsumerError>) -> Option<V>>;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Arity {
    Once,
    Many,
}

struct Slot<S, V> {
    arity: Arity,
    handlers: Vec<Handler<S, V>>,
    /// `Some(err)` once a `Once` event has fired; used to replay late binds.
    fired: Option<Option<ConsumerError>>,
}

pub struct EventBus<S, V> {
    slots: HashMap<&'static str, Slot<S, V>>,
    silenced: HashSet<&'static str>,
}

impl<S, V> Default for EventBus<S, V> {
    fn default() -> Self {
        EventBus { slots: HashMap::new(), silenced: HashSet::new() }
    }
}

impl<S, V> EventBus<S, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a one-time event. Call during setup, before any bind/fire.
    pub fn register_once(&mut self, name: &'static str) {
        self.slots.insert(name, Slot { arity: Arity::Once, handlers: Vec::new(), fired: None });
    }

    /// Declare a many-times event.
    pub fn register_many(&mut self, name: &'static str) {
        self.slots.insert(name, Slot { arity: Arity::Many, handlers: Vec::new(), fired: None });
    }

    /// Append a handler to `name`. If `name` is a one-time event that has
    /// already fired, `handler` runs immediately against `subject` with the
    /// recorded error and is not retained.
    pub fn bind_event(&mut self, name: &'static str, subject: &mut S, mut handler: Handler<S, V>) {
        let slot = self.slots.get_mut(name).unwrap_or_else(|| panic!("unknown event `{name}`"));
        match &slot.fired {
            Some(err) => {
                let err = err.clone();
                let _ = handler(subject, err.as_ref());
            }
            None => slot.handlers.push(handler),
        }
    }

    /// Skip the next firing of `name` entirely — no handler runs and no
    /// result is produced. The skip is consumed by that one firing.
    pub fn silence_event(&mut self, name: &'static str) {
        self.silenced.insert(name);
    }

    /// Fire `name` against `subject`, chaining handler return values. Returns
    /// the final chained value, or `None` if no handler produced one (or the
    /// event was silenced, or a one-time event had already fired).
    pub fn fire_event(
        &mut self,
        name: &'static str,
        subject: &mut S,
        err: Option<ConsumerError>,
    ) -> Option<V> {
        if self.silenced.remove(name) {
            return None;
        }

        let mut handlers = {
            let slot = self.slots.get_mut(name).unwrap_or_else(|| panic!("unknown event `{name}`"));
            if slot.arity == Arity::Once && slot.fired.is_some() {
                return None;
            }
            std::mem::take(&mut slot.handlers)
        };

        let mut chained = None;
        for handler in handlers.iter_mut() {
            if let Some(value) = handler(subject, err.as_ref()) {
                chained = Some(value);
            }
        }

        let slot = self.slots.get_mut(name).expect("slot vanished during fire_event");
        match slot.arity {
            Arity::Once => slot.fired = Some(err),
            Arity::Many => slot.handlers = handlers,
        }

        chained
    }

    /// True once a one-time event has fired (always false for many-time events).
    pub fn has_fired(&self, name: &str) -> bool {
        self.slots.get(name).is_some_and(|slot| slot.fired.is_some())
    }
}
