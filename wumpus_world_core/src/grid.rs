//! Bounded 2D environments: placement, collision, movement and observers.

use std::fmt;

use rand::{Rng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{
    Action, Entity, EntityId, EntityKind, Environment, Observer, Position, Registry, Thing, Turn,
    map::Grid,
};

/// Entities near an agent, each paired with a closeness score
/// (`radius² - distance²`, higher is closer).
pub type NearbyPercept = Vec<(Entity, i64)>;

/// Half-open usable region `[x_start, x_end) × [y_start, y_end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub x_start: i32,
    pub y_start: i32,
    pub x_end: i32,
    pub y_end: i32,
}

impl Bounds {
    pub fn contains(&self, p: Position) -> bool {
        p.x >= self.x_start && p.x < self.x_end && p.y >= self.y_start && p.y < self.y_end
    }

    pub fn is_empty(&self) -> bool {
        self.x_start >= self.x_end || self.y_start >= self.y_end
    }

    pub fn cells(&self) -> impl Iterator<Item = Position> {
        let Bounds {
            x_start,
            y_start,
            x_end,
            y_end,
        } = *self;
        (y_start..y_end).flat_map(move |y| (x_start..x_end).map(move |x| Position::new(x, y)))
    }
}

/// A `width × height` world with obstacle collision and movement notifications.
///
/// Generic over the percept type so scenario worlds can reuse the spatial
/// layer while synthesizing their own percepts.
pub struct GridEnvironment<P> {
    registry: Registry<P>,
    width: i32,
    height: i32,
    bounds: Bounds,
    observers: Vec<Box<dyn Observer>>,
    rng: StdRng,
}

impl<P> GridEnvironment<P> {
    pub fn new(width: i32, height: i32, rng: StdRng) -> Self {
        Self {
            registry: Registry::new(),
            width,
            height,
            bounds: Bounds {
                x_start: 0,
                y_start: 0,
                x_end: width,
                y_end: height,
            },
            observers: Vec::new(),
            rng,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn registry(&self) -> &Registry<P> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry<P> {
        &mut self.registry
    }

    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn is_inbounds(&self, location: Position) -> bool {
        self.bounds.contains(location)
    }

    fn within_grid(&self, location: Position) -> bool {
        location.x >= 0 && location.x < self.width && location.y >= 0 && location.y < self.height
    }

    pub fn add_observer(&mut self, observer: impl Observer + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Places `thing` at `location` if it is in bounds.
    ///
    /// With `exclude_duplicates`, refuses to stack a second entity of the
    /// same kind on one cell.
    pub fn place(&mut self, thing: Thing<P>, location: Position, exclude_duplicates: bool) -> bool {
        let kind = thing.entity().kind;
        if !self.is_inbounds(location) {
            tracing::debug!(?kind, %location, "placement outside bounds rejected");
            return false;
        }
        if exclude_duplicates && self.registry.some_things_at(location, Some(kind)) {
            tracing::trace!(?kind, %location, "duplicate kind at location, not placed");
            return false;
        }
        self.registry.insert(thing, Some(location))
    }

    /// Everything within `radius` of `location`, with a closeness score.
    pub fn things_near(&self, location: Position, radius: i64) -> NearbyPercept {
        let radius2 = radius * radius;
        self.registry
            .entities()
            .filter_map(|e| {
                let d2 = location.distance_squared(e.location?);
                (d2 <= radius2).then_some((*e, radius2 - d2))
            })
            .collect()
    }

    /// Moves an entity (and whatever it carries) to `destination`.
    ///
    /// Returns the bump flag: `true` if the destination holds an obstacle or
    /// lies outside the grid, in which case nothing moves.
    pub fn move_to(&mut self, id: EntityId, destination: Position) -> bool {
        if !self.registry.contains(id) {
            tracing::warn!(entity = %id, "move of an entity that is not registered");
            return false;
        }
        let blocked = !self.within_grid(destination)
            || self
                .registry
                .entities()
                .any(|e| e.location == Some(destination) && e.kind.is_obstacle());
        if let Some(agent) = self.registry.agent_mut(id) {
            agent.bump = blocked;
        }
        if blocked {
            return true;
        }

        if let Some(entity) = self.registry.entity_mut(id) {
            entity.location = Some(destination);
            let moved = *entity;
            for observer in &mut self.observers {
                observer.entity_moved(&moved);
            }
        }
        if let Some(agent) = self.registry.agent_mut(id) {
            for carried in &mut agent.inventory {
                carried.location = Some(destination);
            }
        }
        false
    }

    /// Unregisters an entity, deleting whatever it carries first. Observers
    /// are told about every deletion.
    pub fn remove(&mut self, id: EntityId) -> Option<Thing<P>> {
        let mut thing = self.registry.remove(id)?;
        if let Some(agent) = thing.as_agent_mut() {
            for carried in agent.inventory.drain(..) {
                for observer in &mut self.observers {
                    observer.entity_deleted(&carried);
                }
            }
        }
        for observer in &mut self.observers {
            observer.entity_deleted(thing.entity());
        }
        Some(thing)
    }

    /// Walls every border cell, then shrinks the usable bounds to the interior.
    pub fn build_perimeter_walls(&mut self) {
        let (w, h) = (self.width, self.height);
        let border = (0..w)
            .flat_map(|x| [Position::new(x, 0), Position::new(x, h - 1)])
            .chain((0..h).flat_map(|y| [Position::new(0, y), Position::new(w - 1, y)]));
        let border: Vec<Position> = border.collect();
        for location in border {
            self.place(EntityKind::Wall.into(), location, true);
        }
        self.bounds = Bounds {
            x_start: 1,
            y_start: 1,
            x_end: w - 1,
            y_end: h - 1,
        };
    }

    /// A uniformly random in-bounds cell different from `exclude`.
    ///
    /// `None` when no such cell exists.
    pub fn random_inbounds_location(&mut self, exclude: Option<Position>) -> Option<Position> {
        let bounds = self.bounds;
        if bounds.is_empty() || bounds.cells().all(|p| Some(p) == exclude) {
            return None;
        }
        loop {
            let location = Position::new(
                self.rng.random_range(bounds.x_start..bounds.x_end),
                self.rng.random_range(bounds.y_start..bounds.y_end),
            );
            if Some(location) != exclude {
                return Some(location);
            }
        }
    }

    /// Turning, moving forward and releasing: the actions every grid world
    /// understands. Anything else is ignored.
    pub fn apply_action(&mut self, id: EntityId, action: Action) {
        let Some(agent) = self.registry.agent_mut(id) else {
            tracing::warn!(agent = %id, %action, "action for an unknown agent");
            return;
        };
        agent.bump = false;
        match action {
            Action::TurnRight => agent.orientation = agent.orientation.turn(Turn::Right),
            Action::TurnLeft => agent.orientation = agent.orientation.turn(Turn::Left),
            Action::Forward => {
                if let Some(from) = agent.location() {
                    let destination = agent.orientation.forward(from);
                    self.move_to(id, destination);
                }
            }
            Action::Release => {
                let location = agent.location();
                if let Some(mut item) = agent.inventory.pop() {
                    item.location = location;
                    self.registry.insert(item.into(), location);
                }
            }
            other => tracing::debug!(agent = %id, action = %other, "action ignored"),
        }
    }

    /// Snapshot of the entities in a `width × height` rectangle starting at `origin`.
    pub fn cells(&self, origin: Position, width: usize, height: usize) -> Grid<Vec<Entity>> {
        Grid::from_generator(width, height, origin, |x, y| {
            let location = origin.offset(x as i32, y as i32);
            self.registry.things_at(location, None)
        })
    }
}

impl<P> fmt::Debug for GridEnvironment<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridEnvironment")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bounds", &self.bounds)
            .field("entities", &self.registry.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// A plain grid world: agents perceive what is within one cell of them.
impl Environment for GridEnvironment<NearbyPercept> {
    type Percept = NearbyPercept;

    fn registry(&self) -> &Registry<NearbyPercept> {
        &self.registry
    }

    fn registry_mut(&mut self) -> &mut Registry<NearbyPercept> {
        &mut self.registry
    }

    fn percept(&mut self, agent: EntityId) -> NearbyPercept {
        match self.registry.entity(agent).and_then(|e| e.location) {
            Some(location) => self.things_near(location, 1),
            None => Vec::new(),
        }
    }

    fn execute_action(&mut self, agent: EntityId, action: Action) {
        self.apply_action(agent, action);
    }

    fn default_location(&mut self, _entity: &Entity) -> Option<Position> {
        self.random_inbounds_location(None)
    }

    fn add(&mut self, thing: Thing<NearbyPercept>, location: Option<Position>) -> bool {
        let location = match location {
            Some(location) => location,
            None => match self.default_location(thing.entity()) {
                Some(location) => location,
                None => return false,
            },
        };
        self.place(thing, location, false)
    }

    fn delete(&mut self, id: EntityId) -> Option<Thing<NearbyPercept>> {
        self.remove(id)
    }
}
