use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

pub mod action;
pub mod entity;
pub mod environment;
pub mod error;
pub mod grid;
pub mod map;
pub mod observer;
pub mod orientation;
pub mod policy;
pub mod wumpus;

pub use action::Action;
pub use entity::{Agent, Entity, EntityKind, Thing};
pub use environment::{Environment, Registry};
pub use error::WorldError;
pub use grid::{GridEnvironment, NearbyPercept};
pub use observer::{EventLog, Observer, WorldEvent};
pub use orientation::{Orientation, Turn};
pub use policy::{Policy, PolicyError, RandomPolicy, ScriptedPolicy};
pub use wumpus::{Outcome, WumpusConfig, WumpusPercept, WumpusWorld};

static ENTITY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for entities (walls, hazards, signals, agents...).
///
/// Allocated from a process-wide monotonic counter, so two entities created
/// separately never share an id even if they have the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Allocate a fresh id. Thread-safe.
    pub fn next() -> Self {
        Self(ENTITY_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Represents a 2D coordinate.
///
/// Coordinates are signed so that neighbours of edge cells can be expressed
/// (and then rejected by bounds checks) without wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// The four orthogonal neighbours in percept order: left, right, up, down.
    pub fn neighbours(self) -> [Position; 4] {
        [
            self.offset(-1, 0),
            self.offset(1, 0),
            self.offset(0, -1),
            self.offset(0, 1),
        ]
    }

    pub fn distance_squared(self, other: Position) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        dx * dx + dy * dy
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
