use std::fmt;

use crate::objects::AttributeKind;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Equations, parameters, namespace or grid changed.
    DataChanged,
    AttributeUpdated {
        name: String,
        attribute: AttributeKind,
    },
    SolveStatus(String),
    SolveError {
        message: String,
        tags: Vec<String>,
    },
}

type Listener = Box<dyn FnMut(&Event) + Send>;

/// Synchronous fan-out; listeners run in subscription order on the
/// publishing thread.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Listener>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    pub fn publish(&mut self, event: &Event) {
        for listener in &mut self.listeners {
            listener(event);
        }
    }

    pub fn status(&mut self, message: impl Into<String>) {
        self.publish(&Event::SolveStatus(message.into()));
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
