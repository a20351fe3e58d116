use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use serde::{Deserialize, Serialize};

use crate::Entity;

/// Subscriber notified synchronously of every move and deletion.
///
/// Observers must not touch the environment from inside a callback.
pub trait Observer {
    fn entity_moved(&mut self, entity: &Entity);
    fn entity_deleted(&mut self, entity: &Entity);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorldEvent {
    Moved(Entity),
    Deleted(Entity),
}

impl WorldEvent {
    pub fn entity(&self) -> &Entity {
        match self {
            WorldEvent::Moved(entity) | WorldEvent::Deleted(entity) => entity,
        }
    }
}

/// Observer that records events into a buffer shared with its creator.
///
/// Keeps at most `capacity` events, dropping the oldest first.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: Rc<RefCell<VecDeque<WorldEvent>>>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Rc::new(RefCell::new(VecDeque::new())),
            capacity,
        }
    }

    pub fn snapshot(&self) -> Vec<WorldEvent> {
        self.events.borrow().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    fn record(&self, event: WorldEvent) {
        let mut events = self.events.borrow_mut();
        if self.capacity == 0 {
            return;
        }
        while events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }
}

impl Observer for EventLog {
    fn entity_moved(&mut self, entity: &Entity) {
        self.record(WorldEvent::Moved(*entity));
    }

    fn entity_deleted(&mut self, entity: &Entity) {
        self.record(WorldEvent::Deleted(*entity));
    }
}
