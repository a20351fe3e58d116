use proptest::prelude::*;
use rand::{SeedableRng, rngs::StdRng};

use wumpus_world_core::{
    Action, Agent, EntityKind, Environment, GridEnvironment, NearbyPercept, Position,
    ScriptedPolicy,
};

fn arb_move() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => Just(Action::Forward),
        1 => Just(Action::TurnLeft),
        1 => Just(Action::TurnRight),
    ]
}

proptest! {
    #[test]
    fn agents_stay_in_bounds_and_bump_only_on_obstacles(
        width in 4i32..10,
        height in 4i32..10,
        seed in any::<u64>(),
        pillars in prop::collection::vec((1i32..9, 1i32..9), 0..12),
        moves in prop::collection::vec(arb_move(), 1..80),
    ) {
        let mut env: GridEnvironment<NearbyPercept> =
            GridEnvironment::new(width, height, StdRng::seed_from_u64(seed));
        env.build_perimeter_walls();
        let start = Position::new(1, 1);
        for (x, y) in pillars {
            let at = Position::new(x, y);
            if at != start {
                env.place(EntityKind::Wall.into(), at, true);
            }
        }
        let agent = Agent::new(EntityKind::Agent, ScriptedPolicy::new([]));
        let id = agent.id();
        prop_assert!(env.add(agent.into(), Some(start)));

        for action in moves {
            let before = env.registry().agent(id).unwrap();
            let from = before.location().unwrap();
            let destination = before.orientation.forward(from);
            let obstacle = !env.things_at(destination, Some(EntityKind::Wall)).is_empty();

            env.execute_action(id, action);

            let after = env.registry().agent(id).unwrap();
            let location = after.location().unwrap();
            prop_assert!(env.is_inbounds(location));
            if action == Action::Forward {
                prop_assert_eq!(after.bump, obstacle);
                let expected = if obstacle { from } else { destination };
                prop_assert_eq!(location, expected);
            } else {
                prop_assert!(!after.bump);
                prop_assert_eq!(location, from);
            }
        }
    }

    #[test]
    fn random_locations_are_always_usable(
        width in 4i32..12,
        height in 4i32..12,
        seed in any::<u64>(),
    ) {
        let mut env: GridEnvironment<NearbyPercept> =
            GridEnvironment::new(width, height, StdRng::seed_from_u64(seed));
        env.build_perimeter_walls();
        let start = Position::new(1, 1);
        for _ in 0..20 {
            let location = env.random_inbounds_location(Some(start)).unwrap();
            prop_assert!(env.is_inbounds(location));
            prop_assert_ne!(location, start);
        }
    }
}
