use std::fmt;

use serde::{Deserialize, Serialize};

/// Represents actions an agent can decide to take.
///
/// Environments ignore actions outside their own vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Action {
    /// Chosen on behalf of agents that are no longer alive.
    #[default]
    NoOp,
    TurnRight,
    TurnLeft,
    Forward,
    Grab,
    Release,
    Climb,
    Shoot,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::NoOp,
        Action::TurnRight,
        Action::TurnLeft,
        Action::Forward,
        Action::Grab,
        Action::Release,
        Action::Climb,
        Action::Shoot,
    ];

    /// Parses an action tag such as `"TurnLeft"`.
    ///
    /// Unrecognized tags become [`Action::NoOp`].
    pub fn from_tag(tag: &str) -> Action {
        match tag.trim() {
            "TurnRight" => Action::TurnRight,
            "TurnLeft" => Action::TurnLeft,
            "Forward" => Action::Forward,
            "Grab" => Action::Grab,
            "Release" => Action::Release,
            "Climb" => Action::Climb,
            "Shoot" => Action::Shoot,
            "" => Action::NoOp,
            other => {
                tracing::debug!(tag = other, "unrecognized action tag ignored");
                Action::NoOp
            }
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Action::NoOp => "",
            Action::TurnRight => "TurnRight",
            Action::TurnLeft => "TurnLeft",
            Action::Forward => "Forward",
            Action::Grab => "Grab",
            Action::Release => "Release",
            Action::Climb => "Climb",
            Action::Shoot => "Shoot",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::NoOp => f.write_str("NoOp"),
            other => f.write_str(other.tag()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_parse_back() {
        for action in Action::ALL {
            assert_eq!(Action::from_tag(action.tag()), action);
        }
    }

    #[test]
    fn unknown_tags_are_noop() {
        assert_eq!(Action::from_tag("Dance"), Action::NoOp);
        assert_eq!(Action::from_tag("forward"), Action::NoOp);
    }
}
