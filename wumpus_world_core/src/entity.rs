use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{EntityId, Orientation, Position, policy::Policy};

/// Every kind of thing that can exist in a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Wall,
    Pit,
    Breeze,
    Wumpus,
    Stench,
    Gold,
    Glitter,
    Arrow,
    Scream,
    Bump,
    /// The controllable agent of the wumpus cave.
    Explorer,
    /// An agent with no scenario-specific behaviour.
    Agent,
}

/// How an entity shows up in a neighbour's percept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PerceptClass {
    Wall,
    Pit,
    Wumpus,
    Gold,
    Other,
}

impl EntityKind {
    /// Obstacles block movement into their cell.
    pub fn is_obstacle(self) -> bool {
        matches!(self, EntityKind::Wall)
    }

    /// Whether the `alive` flag means anything for this kind.
    pub fn tracks_life(self) -> bool {
        matches!(
            self,
            EntityKind::Wumpus | EntityKind::Explorer | EntityKind::Agent
        )
    }

    pub fn is_agent(self) -> bool {
        matches!(self, EntityKind::Explorer | EntityKind::Agent)
    }

    pub fn percept_class(self) -> PerceptClass {
        match self {
            EntityKind::Wall => PerceptClass::Wall,
            EntityKind::Pit => PerceptClass::Pit,
            EntityKind::Wumpus => PerceptClass::Wumpus,
            EntityKind::Gold => PerceptClass::Gold,
            _ => PerceptClass::Other,
        }
    }

    /// Whether an agent of this kind may pick up an entity of kind `other`.
    pub fn can_grab(self, other: EntityKind) -> bool {
        match self {
            EntityKind::Explorer => other == EntityKind::Gold,
            _ => false,
        }
    }
}

/// Anything placed in an environment.
///
/// Identity is the [`EntityId`]: copies of an entity refer to the same
/// registered thing. Use [`Entity::same_kind`] for value equality such as
/// "is this gold".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    /// Absent until placed.
    pub location: Option<Position>,
    /// Only meaningful for kinds that track life.
    pub alive: Option<bool>,
}

impl Entity {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            id: EntityId::next(),
            kind,
            location: None,
            alive: kind.tracks_life().then_some(true),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive == Some(true)
    }

    pub fn is(&self, kind: EntityKind) -> bool {
        self.kind == kind
    }

    pub fn same_kind(&self, other: &Entity) -> bool {
        self.kind == other.kind
    }
}

/// An entity driven by a policy, with a performance score and an inventory.
pub struct Agent<P> {
    pub body: Entity,
    pub(crate) policy: Box<dyn Policy<P>>,
    /// Mutated only by the owning environment while executing actions.
    pub performance: i64,
    /// Carried entities are owned here and are not in the registry.
    pub inventory: Vec<Entity>,
    /// True iff the most recent forward move was blocked.
    pub bump: bool,
    pub orientation: Orientation,
    pub has_arrow: bool,
    pub killed_by: Option<EntityKind>,
}

impl<P> Agent<P> {
    pub fn new(kind: EntityKind, policy: impl Policy<P> + 'static) -> Self {
        let mut body = Entity::new(kind);
        body.alive = Some(true);
        Self {
            body,
            policy: Box::new(policy),
            performance: 0,
            inventory: Vec::new(),
            bump: false,
            orientation: Orientation::Right,
            has_arrow: true,
            killed_by: None,
        }
    }

    pub fn id(&self) -> EntityId {
        self.body.id
    }

    pub fn location(&self) -> Option<Position> {
        self.body.location
    }

    pub fn is_alive(&self) -> bool {
        self.body.is_alive()
    }

    pub fn can_grab(&self, entity: &Entity) -> bool {
        self.body.kind.can_grab(entity.kind)
    }

    pub fn is_holding(&self, kind: EntityKind) -> bool {
        self.inventory.iter().any(|e| e.is(kind))
    }
}

impl<P> fmt::Debug for Agent<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("body", &self.body)
            .field("performance", &self.performance)
            .field("inventory", &self.inventory)
            .field("bump", &self.bump)
            .field("orientation", &self.orientation)
            .field("has_arrow", &self.has_arrow)
            .field("killed_by", &self.killed_by)
            .finish_non_exhaustive()
    }
}

/// A registrable member of an environment: a plain entity or an agent.
#[derive(Debug)]
pub enum Thing<P> {
    Entity(Entity),
    Agent(Agent<P>),
}

impl<P> Thing<P> {
    pub fn entity(&self) -> &Entity {
        match self {
            Thing::Entity(entity) => entity,
            Thing::Agent(agent) => &agent.body,
        }
    }

    pub fn entity_mut(&mut self) -> &mut Entity {
        match self {
            Thing::Entity(entity) => entity,
            Thing::Agent(agent) => &mut agent.body,
        }
    }

    pub fn as_agent(&self) -> Option<&Agent<P>> {
        match self {
            Thing::Agent(agent) => Some(agent),
            Thing::Entity(_) => None,
        }
    }

    pub fn as_agent_mut(&mut self) -> Option<&mut Agent<P>> {
        match self {
            Thing::Agent(agent) => Some(agent),
            Thing::Entity(_) => None,
        }
    }
}

impl<P> From<Entity> for Thing<P> {
    fn from(entity: Entity) -> Self {
        Thing::Entity(entity)
    }
}

impl<P> From<EntityKind> for Thing<P> {
    fn from(kind: EntityKind) -> Self {
        Thing::Entity(Entity::new(kind))
    }
}

impl<P> From<Agent<P>> for Thing<P> {
    fn from(agent: Agent<P>) -> Self {
        Thing::Agent(agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Action;

    #[test]
    fn only_living_kinds_track_life() {
        assert!(Entity::new(EntityKind::Wumpus).is_alive());
        assert!(!Entity::new(EntityKind::Pit).is_alive());
        assert_eq!(Entity::new(EntityKind::Gold).alive, None);
    }

    #[test]
    fn all_gold_is_gold() {
        let a = Entity::new(EntityKind::Gold);
        let b = Entity::new(EntityKind::Gold);
        assert_ne!(a, b);
        assert!(a.same_kind(&b));
    }

    #[test]
    fn explorers_only_grab_gold() {
        let explorer: Agent<()> = Agent::new(EntityKind::Explorer, |_: &()| Action::NoOp);
        let generic: Agent<()> = Agent::new(EntityKind::Agent, |_: &()| Action::NoOp);
        let gold = Entity::new(EntityKind::Gold);
        let arrow = Entity::new(EntityKind::Arrow);
        assert!(explorer.can_grab(&gold));
        assert!(!explorer.can_grab(&arrow));
        assert!(!generic.can_grab(&gold));
    }

    #[test]
    fn agents_own_separate_inventories() {
        let mut a: Agent<()> = Agent::new(EntityKind::Explorer, |_: &()| Action::NoOp);
        let b: Agent<()> = Agent::new(EntityKind::Explorer, |_: &()| Action::NoOp);
        a.inventory.push(Entity::new(EntityKind::Gold));
        assert!(a.is_holding(EntityKind::Gold));
        assert!(b.inventory.is_empty());
    }

    #[test]
    fn walls_are_the_only_obstacles() {
        assert!(EntityKind::Wall.is_obstacle());
        assert!(!EntityKind::Pit.is_obstacle());
        assert!(!EntityKind::Wumpus.is_obstacle());
    }
}
