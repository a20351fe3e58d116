use std::{cell::RefCell, rc::Rc};

use wumpus_world_core::{
    Action, EntityKind, Environment, EventLog, Outcome, Policy, PolicyError, Position,
    ScriptedPolicy, WorldEvent, WumpusPercept, WumpusWorld,
    wumpus::{GOLD_REWARD, START, WumpusState},
};

/// 6×6 cave, no pits, gold at (4, 1) and the wumpus at (4, 4).
const GOLD_RUN: &str = "
    . . . G
    . . . .
    . . . .
    . . . W
";

/// Plays a script and keeps every percept it was shown.
struct Recorder {
    script: ScriptedPolicy,
    seen: Rc<RefCell<Vec<WumpusPercept>>>,
}

impl Recorder {
    fn new(actions: impl IntoIterator<Item = Action>) -> (Self, Rc<RefCell<Vec<WumpusPercept>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let recorder = Self {
            script: ScriptedPolicy::new(actions),
            seen: Rc::clone(&seen),
        };
        (recorder, seen)
    }
}

impl Policy<WumpusPercept> for Recorder {
    fn decide(&mut self, percept: &WumpusPercept) -> Result<Action, PolicyError> {
        self.seen.borrow_mut().push(percept.clone());
        self.script.decide(percept)
    }
}

fn explorer_location(world: &WumpusWorld) -> Option<Position> {
    world.explorer().and_then(|e| e.location())
}

#[test]
fn fetch_the_gold_and_climb_out() {
    use Action::*;
    let script = [
        Forward, Forward, Forward, Grab, TurnLeft, TurnLeft, Forward, Forward, Forward, Climb,
    ];
    let (policy, seen) = Recorder::new(script);
    let mut world = WumpusWorld::from_layout(GOLD_RUN, policy).unwrap();
    assert_eq!(world.grid().width(), 6);
    assert_eq!(world.grid().height(), 6);

    for _ in 0..3 {
        world.step().unwrap();
    }
    assert_eq!(explorer_location(&world), Some(Position::new(4, 1)));

    world.step().unwrap();
    let explorer = world.explorer().unwrap();
    assert_eq!(explorer.inventory.len(), 1);
    assert!(explorer.is_holding(EntityKind::Gold));
    assert!(world.things_at(Position::new(4, 1), Some(EntityKind::Gold)).is_empty());

    let ticks = world.run(100).unwrap();
    assert_eq!(ticks, 6);
    assert!(world.is_done());
    assert!(world.explorer().is_none());

    // 3 + 1 + 2 + 3 one-point actions, climbing is free.
    let expected = -9 + GOLD_REWARD;
    assert_eq!(
        world.outcome(),
        Some(Outcome::ClimbedOut {
            with_gold: true,
            performance: expected
        })
    );
    assert_eq!(world.performance(), expected);

    let seen = seen.borrow();
    assert_eq!(seen.len(), 10);
    // The gold glitters only once the explorer stands on it.
    assert!(!seen[2].senses(EntityKind::Glitter));
    assert_eq!(seen[3].here, vec![Some(EntityKind::Glitter)]);
    assert!(seen.iter().all(|p| !p.senses(EntityKind::Scream)));
}

#[test]
fn glitter_is_never_seen_from_a_neighbouring_cell() {
    let (policy, seen) = Recorder::new([Action::Forward, Action::Forward, Action::Forward]);
    let mut world = WumpusWorld::from_layout(GOLD_RUN, policy).unwrap();
    world.run(4).unwrap();
    let seen = seen.borrow();
    for (tick, percept) in seen.iter().enumerate() {
        for cell in [&percept.left, &percept.right, &percept.up, &percept.down] {
            assert!(!cell.contains(&Some(EntityKind::Glitter)), "tick {tick}");
        }
    }
    assert!(seen[3].senses_here(EntityKind::Glitter));
}

#[test]
fn shooting_into_an_empty_corridor_wastes_the_arrow() {
    let (policy, seen) = Recorder::new([Action::Shoot, Action::NoOp, Action::NoOp]);
    let mut world = WumpusWorld::from_layout(GOLD_RUN, policy).unwrap();
    world.run(3).unwrap();

    assert!(!world.explorer().unwrap().has_arrow);
    assert_eq!(world.wumpus_state(), Some(WumpusState::Alive));
    assert!(seen.borrow().iter().all(|p| !p.senses(EntityKind::Scream)));
    assert_eq!(world.performance(), 0);
}

#[test]
fn the_scream_is_heard_exactly_once() {
    let layout = "
        . . . W
        . . . .
    ";
    let (policy, seen) = Recorder::new([Action::Shoot, Action::NoOp, Action::NoOp, Action::NoOp]);
    let mut world = WumpusWorld::from_layout(layout, policy).unwrap();
    world.run(4).unwrap();

    let screams: Vec<usize> = seen
        .borrow()
        .iter()
        .enumerate()
        .filter(|(_, p)| p.senses(EntityKind::Scream))
        .map(|(tick, _)| tick)
        .collect();
    assert_eq!(screams, vec![1]);
    assert_eq!(seen.borrow()[1].here, vec![None, Some(EntityKind::Scream)]);
    assert_eq!(world.wumpus_state(), Some(WumpusState::Announced));
}

#[test]
fn death_ends_the_episode() {
    let layout = ". P .";
    let (policy, seen) = Recorder::new([Action::Forward, Action::Forward, Action::Forward]);
    let mut world = WumpusWorld::from_layout(layout, policy).unwrap();
    let ticks = world.run(10).unwrap();

    assert_eq!(ticks, 1);
    assert_eq!(seen.borrow().len(), 1);
    assert!(matches!(
        world.outcome(),
        Some(Outcome::Died {
            cause: EntityKind::Pit,
            ..
        })
    ));
    assert!(world.in_danger());
}

#[test]
fn observers_follow_the_explorer_out() {
    use Action::*;
    let log = EventLog::new(64);
    let layout = "G .";
    let mut world =
        WumpusWorld::from_layout(layout, ScriptedPolicy::new([Grab, Climb])).unwrap();
    world.add_observer(log.clone());
    let id = world.explorer_id();
    world.run(5).unwrap();

    let events = log.snapshot();
    assert_eq!(events.len(), 3);
    // Gold leaves the floor, then is deleted along with its carrier.
    assert!(matches!(events[0], WorldEvent::Deleted(e) if e.kind == EntityKind::Gold));
    assert!(matches!(events[1], WorldEvent::Deleted(e) if e.kind == EntityKind::Gold));
    assert!(matches!(events[2], WorldEvent::Deleted(e) if e.id == id));
    assert_eq!(
        world.outcome(),
        Some(Outcome::ClimbedOut {
            with_gold: true,
            performance: GOLD_REWARD - 1
        })
    );
}

#[test]
fn deleting_a_stranger_leaves_the_world_alone() {
    let mut world = WumpusWorld::from_layout(GOLD_RUN, ScriptedPolicy::new([])).unwrap();
    let before = world.registry().len();
    let stranger = wumpus_world_core::Entity::new(EntityKind::Gold);
    assert!(world.delete(stranger.id).is_none());
    assert_eq!(world.registry().len(), before);
    assert!(world.explorer().is_some());
}

#[test]
fn rendering_without_walls_starts_at_the_entrance() {
    let world = WumpusWorld::from_layout(GOLD_RUN, ScriptedPolicy::new([])).unwrap();
    let view = world.render(false);
    assert_eq!(view.origin(), START);
    assert!(
        view[(0, 0)]
            .iter()
            .any(|e| e.kind == EntityKind::Explorer)
    );
    assert!(
        view.rows()
            .flatten()
            .flatten()
            .all(|e| e.kind != EntityKind::Wall)
    );
}
