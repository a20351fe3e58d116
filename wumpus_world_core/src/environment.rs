use indexmap::IndexMap;

use crate::{Action, Agent, Entity, EntityId, EntityKind, Position, Thing, WorldError};

/// Owns every registered entity, in registration order.
///
/// Agents live in the same map as plain entities, so an agent is always also
/// an entity. Carried entities are owned by their agent's inventory instead.
#[derive(Debug)]
pub struct Registry<P> {
    things: IndexMap<EntityId, Thing<P>>,
}

impl<P> Default for Registry<P> {
    fn default() -> Self {
        Self {
            things: IndexMap::new(),
        }
    }
}

impl<P> Registry<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `thing` at `location`.
    ///
    /// Agents get their performance reset. Returns `false` (and logs) if the
    /// entity is already registered.
    pub fn insert(&mut self, mut thing: Thing<P>, location: Option<Position>) -> bool {
        let id = thing.entity().id;
        if self.things.contains_key(&id) {
            tracing::warn!(
                entity = %id,
                kind = ?thing.entity().kind,
                "can't add the same thing twice"
            );
            return false;
        }
        thing.entity_mut().location = location;
        if let Some(agent) = thing.as_agent_mut() {
            agent.performance = 0;
        }
        self.things.insert(id, thing);
        true
    }

    /// Unregisters and returns the entity. Logs and returns `None` if absent.
    pub fn remove(&mut self, id: EntityId) -> Option<Thing<P>> {
        let removed = self.things.shift_remove(&id);
        if removed.is_none() {
            tracing::warn!(
                entity = %id,
                registered = self.things.len(),
                "delete of an entity that is not registered"
            );
        }
        removed
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.things.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.things.len()
    }

    pub fn is_empty(&self) -> bool {
        self.things.is_empty()
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.things.get(&id).map(Thing::entity)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.things.get_mut(&id).map(Thing::entity_mut)
    }

    pub fn agent(&self, id: EntityId) -> Option<&Agent<P>> {
        self.things.get(&id).and_then(Thing::as_agent)
    }

    pub fn agent_mut(&mut self, id: EntityId) -> Option<&mut Agent<P>> {
        self.things.get_mut(&id).and_then(Thing::as_agent_mut)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.things.values().map(Thing::entity)
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent<P>> {
        self.things.values().filter_map(Thing::as_agent)
    }

    pub fn agent_ids(&self) -> Vec<EntityId> {
        self.agents().map(Agent::id).collect()
    }

    /// Entities at exactly `location`, optionally of one kind.
    pub fn things_at(&self, location: Position, kind: Option<EntityKind>) -> Vec<Entity> {
        self.entities()
            .filter(|e| e.location == Some(location))
            .filter(|e| kind.is_none_or(|k| e.kind == k))
            .copied()
            .collect()
    }

    pub fn some_things_at(&self, location: Position, kind: Option<EntityKind>) -> bool {
        self.entities()
            .any(|e| e.location == Some(location) && kind.is_none_or(|k| e.kind == k))
    }
}

/// A world that agents sense and act in, one tick at a time.
///
/// Implementors supply the registry, percept synthesis and action execution;
/// the tick structure (`step`/`run`) is shared.
pub trait Environment {
    type Percept;

    fn registry(&self) -> &Registry<Self::Percept>;

    fn registry_mut(&mut self) -> &mut Registry<Self::Percept>;

    /// What `agent` perceives. Called before any action of the tick is applied.
    fn percept(&mut self, agent: EntityId) -> Self::Percept;

    /// How the world changes after `agent` performs `action`.
    fn execute_action(&mut self, agent: EntityId, action: Action);

    /// Where to place an entity added without a location.
    fn default_location(&mut self, _entity: &Entity) -> Option<Position> {
        None
    }

    /// World events not caused by any agent.
    fn exogenous_change(&mut self) {}

    /// Done when no registered agent is alive.
    fn is_done(&self) -> bool {
        !self.registry().agents().any(Agent::is_alive)
    }

    fn add(&mut self, thing: Thing<Self::Percept>, location: Option<Position>) -> bool {
        let location = match location {
            Some(location) => Some(location),
            None => self.default_location(thing.entity()),
        };
        self.registry_mut().insert(thing, location)
    }

    fn delete(&mut self, id: EntityId) -> Option<Thing<Self::Percept>> {
        self.registry_mut().remove(id)
    }

    fn things_at(&self, location: Position, kind: Option<EntityKind>) -> Vec<Entity> {
        self.registry().things_at(location, kind)
    }

    /// Runs one tick: every living agent decides from the pre-tick state,
    /// then all actions are applied in registry order.
    fn step(&mut self) -> Result<(), WorldError> {
        if self.is_done() {
            return Ok(());
        }

        let agent_ids = self.registry().agent_ids();
        let mut actions = Vec::with_capacity(agent_ids.len());
        for &id in &agent_ids {
            let alive = self.registry().agent(id).is_some_and(Agent::is_alive);
            if !alive {
                actions.push(Action::NoOp);
                continue;
            }
            let percept = self.percept(id);
            let action = match self.registry_mut().agent_mut(id) {
                Some(agent) => agent
                    .policy
                    .decide(&percept)
                    .map_err(|source| WorldError::Policy { agent: id, source })?,
                None => Action::NoOp,
            };
            actions.push(action);
        }

        for (id, action) in agent_ids.into_iter().zip(actions) {
            tracing::trace!(agent = %id, %action, "executing action");
            self.execute_action(id, action);
        }
        self.exogenous_change();
        Ok(())
    }

    /// Steps until done or `max_steps` ticks have elapsed. Returns the number
    /// of ticks actually run.
    fn run(&mut self, max_steps: usize) -> Result<usize, WorldError> {
        for tick in 0..max_steps {
            if self.is_done() {
                return Ok(tick);
            }
            self.step()?;
        }
        Ok(max_steps)
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::ScriptedPolicy;

    /// Minimal world: percept is the tick counter, `Forward` moves right.
    #[derive(Default)]
    struct Line {
        registry: Registry<u32>,
        ticks: u32,
        exogenous: u32,
    }

    impl Environment for Line {
        type Percept = u32;

        fn registry(&self) -> &Registry<u32> {
            &self.registry
        }

        fn registry_mut(&mut self) -> &mut Registry<u32> {
            &mut self.registry
        }

        fn percept(&mut self, _agent: EntityId) -> u32 {
            self.ticks
        }

        fn execute_action(&mut self, agent: EntityId, action: Action) {
            if action == Action::Forward {
                if let Some(e) = self.registry.entity_mut(agent) {
                    e.location = e.location.map(|p| p.offset(1, 0));
                }
            }
        }

        fn exogenous_change(&mut self) {
            self.ticks += 1;
            self.exogenous += 1;
        }
    }

    #[test]
    fn duplicate_add_is_rejected() {
        let mut world = Line::default();
        let rock = Entity::new(EntityKind::Arrow);
        assert!(world.add(rock.into(), Some(Position::new(0, 0))));
        assert!(!world.add(rock.into(), Some(Position::new(1, 1))));
        assert_eq!(world.registry().len(), 1);
        assert_eq!(
            world.registry().entity(rock.id).unwrap().location,
            Some(Position::new(0, 0))
        );
    }

    #[test]
    fn deleting_an_absent_entity_is_reported_not_fatal() {
        let mut world = Line::default();
        let kept = Entity::new(EntityKind::Pit);
        world.add(kept.into(), Some(Position::new(2, 2)));
        let stranger = Entity::new(EntityKind::Pit);
        assert!(world.delete(stranger.id).is_none());
        assert_eq!(world.registry().len(), 1);
        assert!(world.registry().contains(kept.id));
    }

    #[test]
    fn adding_an_agent_resets_performance() {
        let mut world = Line::default();
        let mut agent = Agent::new(EntityKind::Agent, ScriptedPolicy::new([]));
        agent.performance = 42;
        let id = agent.id();
        world.add(agent.into(), Some(Position::new(0, 0)));
        assert_eq!(world.registry().agent(id).unwrap().performance, 0);
        assert_eq!(world.registry().agent_ids(), vec![id]);
    }

    #[test]
    fn things_at_filters_by_kind() {
        let mut world = Line::default();
        let here = Position::new(3, 3);
        world.add(EntityKind::Pit.into(), Some(here));
        world.add(EntityKind::Breeze.into(), Some(here));
        world.add(EntityKind::Pit.into(), Some(Position::new(0, 3)));
        assert_eq!(world.things_at(here, None).len(), 2);
        let pits = world.things_at(here, Some(EntityKind::Pit));
        assert_eq!(pits.len(), 1);
        assert!(pits[0].is(EntityKind::Pit));
    }

    #[test]
    fn percepts_come_from_the_pre_tick_state() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut world = Line::default();
        for _ in 0..2 {
            let seen = Rc::clone(&seen);
            let agent = Agent::new(EntityKind::Agent, move |p: &u32| {
                seen.borrow_mut().push(*p);
                Action::Forward
            });
            world.add(agent.into(), Some(Position::new(0, 0)));
        }
        world.step().unwrap();
        world.step().unwrap();
        assert_eq!(*seen.borrow(), vec![0, 0, 1, 1]);
        assert_eq!(world.exogenous, 2);
    }

    #[test]
    fn dead_agents_are_not_asked() {
        let mut world = Line::default();
        let alive = Agent::new(EntityKind::Agent, |_: &u32| Action::Forward);
        let mut dead = Agent::new(EntityKind::Agent, |_: &u32| -> Action {
            panic!("dead agents must not decide")
        });
        dead.body.alive = Some(false);
        let alive_id = alive.id();
        world.add(dead.into(), Some(Position::new(0, 0)));
        world.add(alive.into(), Some(Position::new(0, 0)));
        world.step().unwrap();
        assert_eq!(
            world.registry().entity(alive_id).unwrap().location,
            Some(Position::new(1, 0))
        );
    }

    #[test]
    fn run_stops_when_no_agent_is_alive() {
        let mut world = Line::default();
        assert!(world.is_done());
        assert_eq!(world.run(10).unwrap(), 0);
        assert_eq!(world.exogenous, 0);

        world.add(
            Agent::new(EntityKind::Agent, |_: &u32| Action::NoOp).into(),
            Some(Position::new(0, 0)),
        );
        assert_eq!(world.run(5).unwrap(), 5);
        assert_eq!(world.exogenous, 5);
    }

    #[test]
    fn policy_errors_propagate() {
        let mut world = Line::default();
        let agent = Agent::new(EntityKind::Agent, ScriptedPolicy::strict([Action::Forward]));
        let id = agent.id();
        world.add(agent.into(), Some(Position::new(0, 0)));
        let err = world.run(3).unwrap_err();
        assert!(matches!(err, WorldError::Policy { agent, .. } if agent == id));
        assert_eq!(
            world.registry().entity(id).unwrap().location,
            Some(Position::new(1, 0))
        );
    }
}
