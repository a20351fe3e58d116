use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Position, WorldError};

/// Heading of an agent on the grid.
///
/// `Up` decreases `y` and `Down` increases it: row 0 is the top of the cave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    Right,
    Left,
    Up,
    Down,
}

/// A quarter turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Turn {
    Right,
    Left,
}

impl Orientation {
    pub const ALL: [Orientation; 4] = [
        Orientation::Right,
        Orientation::Left,
        Orientation::Up,
        Orientation::Down,
    ];

    /// Heading after a quarter turn.
    pub fn turn(self, turn: Turn) -> Orientation {
        match (self, turn) {
            (Orientation::Right, Turn::Right) => Orientation::Down,
            (Orientation::Left, Turn::Right) => Orientation::Up,
            (Orientation::Up, Turn::Right) => Orientation::Right,
            (Orientation::Down, Turn::Right) => Orientation::Left,
            (Orientation::Right, Turn::Left) => Orientation::Up,
            (Orientation::Left, Turn::Left) => Orientation::Down,
            (Orientation::Up, Turn::Left) => Orientation::Left,
            (Orientation::Down, Turn::Left) => Orientation::Right,
        }
    }

    /// The cell one step ahead of `from`.
    pub fn forward(self, from: Position) -> Position {
        match self {
            Orientation::Right => from.offset(1, 0),
            Orientation::Left => from.offset(-1, 0),
            Orientation::Up => from.offset(0, -1),
            Orientation::Down => from.offset(0, 1),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Right => "right",
            Orientation::Left => "left",
            Orientation::Up => "up",
            Orientation::Down => "down",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Orientation {
    type Err = WorldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "right" => Ok(Orientation::Right),
            "left" => Ok(Orientation::Left),
            "up" => Ok(Orientation::Up),
            "down" => Ok(Orientation::Down),
            _ => Err(WorldError::InvalidOrientation(s.to_string())),
        }
    }
}

impl TryFrom<u8> for Orientation {
    type Error = WorldError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Orientation::ALL
            .get(usize::from(value))
            .copied()
            .ok_or_else(|| WorldError::InvalidOrientation(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn turning_follows_the_table() {
        assert_eq!(Orientation::Right.turn(Turn::Right), Orientation::Down);
        assert_eq!(Orientation::Left.turn(Turn::Right), Orientation::Up);
        assert_eq!(Orientation::Up.turn(Turn::Right), Orientation::Right);
        assert_eq!(Orientation::Down.turn(Turn::Right), Orientation::Left);
        assert_eq!(Orientation::Right.turn(Turn::Left), Orientation::Up);
        assert_eq!(Orientation::Left.turn(Turn::Left), Orientation::Down);
        assert_eq!(Orientation::Up.turn(Turn::Left), Orientation::Left);
        assert_eq!(Orientation::Down.turn(Turn::Left), Orientation::Right);
    }

    #[test]
    fn forward_translates_one_cell() {
        let p = Position::new(2, 2);
        assert_eq!(Orientation::Right.forward(p), Position::new(3, 2));
        assert_eq!(Orientation::Left.forward(p), Position::new(1, 2));
        assert_eq!(Orientation::Up.forward(p), Position::new(2, 1));
        assert_eq!(Orientation::Down.forward(p), Position::new(2, 3));
    }

    #[test]
    fn unknown_headings_are_rejected() {
        assert!(matches!(
            "north".parse::<Orientation>(),
            Err(WorldError::InvalidOrientation(_))
        ));
        assert!(matches!(
            Orientation::try_from(4),
            Err(WorldError::InvalidOrientation(_))
        ));
        assert_eq!(" Up ".parse::<Orientation>().unwrap(), Orientation::Up);
        assert_eq!(Orientation::try_from(3).unwrap(), Orientation::Down);
    }

    fn arb_orientation() -> impl Strategy<Value = Orientation> {
        prop::sample::select(Orientation::ALL.to_vec())
    }

    fn arb_turn() -> impl Strategy<Value = Turn> {
        prop_oneof![Just(Turn::Right), Just(Turn::Left)]
    }

    proptest! {
        #[test]
        fn four_identical_turns_are_identity(o in arb_orientation(), t in arb_turn()) {
            let back = o.turn(t).turn(t).turn(t).turn(t);
            prop_assert_eq!(back, o);
        }

        #[test]
        fn opposite_turns_cancel(o in arb_orientation(), t in arb_turn()) {
            let other = match t {
                Turn::Right => Turn::Left,
                Turn::Left => Turn::Right,
            };
            prop_assert_eq!(o.turn(t).turn(other), o);
        }

        #[test]
        fn forward_moves_exactly_one_cell(
            o in arb_orientation(),
            x in -50i32..50,
            y in -50i32..50,
        ) {
            let from = Position::new(x, y);
            prop_assert_eq!(from.distance_squared(o.forward(from)), 1);
        }
    }
}
