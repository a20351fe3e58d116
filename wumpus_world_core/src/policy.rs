//! Decision sources.
//!
//! The engine calls a [`Policy`] synchronously once per tick for every living
//! agent. It does not care how the decision is made.

use std::collections::VecDeque;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::Action;

/// Failure of a decision source. Propagated unchanged out of `step`/`run`.
pub type PolicyError = Box<dyn std::error::Error + Send + Sync>;

/// Maps a percept to the action the agent wants to perform.
pub trait Policy<P> {
    fn decide(&mut self, percept: &P) -> Result<Action, PolicyError>;
}

impl<P, F> Policy<P> for F
where
    F: FnMut(&P) -> Action,
{
    fn decide(&mut self, percept: &P) -> Result<Action, PolicyError> {
        Ok(self(percept))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("scripted policy ran out of actions after {played} steps")]
pub struct ScriptExhausted {
    pub played: usize,
}

/// Plays a fixed list of actions in order.
///
/// Once the script is used up a lenient policy answers [`Action::NoOp`] and
/// a strict one fails with [`ScriptExhausted`].
#[derive(Debug, Clone)]
pub struct ScriptedPolicy {
    actions: VecDeque<Action>,
    played: usize,
    strict: bool,
}

impl ScriptedPolicy {
    pub fn new(actions: impl IntoIterator<Item = Action>) -> Self {
        Self {
            actions: actions.into_iter().collect(),
            played: 0,
            strict: false,
        }
    }

    pub fn strict(actions: impl IntoIterator<Item = Action>) -> Self {
        Self {
            strict: true,
            ..Self::new(actions)
        }
    }

    pub fn remaining(&self) -> usize {
        self.actions.len()
    }
}

impl<P> Policy<P> for ScriptedPolicy {
    fn decide(&mut self, _percept: &P) -> Result<Action, PolicyError> {
        match self.actions.pop_front() {
            Some(action) => {
                self.played += 1;
                Ok(action)
            }
            None if self.strict => Err(Box::new(ScriptExhausted {
                played: self.played,
            })),
            None => Ok(Action::NoOp),
        }
    }
}

/// Picks uniformly among a set of actions, ignoring the percept.
#[derive(Debug)]
pub struct RandomPolicy {
    choices: Vec<Action>,
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(choices: impl IntoIterator<Item = Action>, seed: u64) -> Self {
        Self {
            choices: choices.into_iter().collect(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Like [`RandomPolicy::new`], seeded from OS entropy.
    pub fn from_os_rng(choices: impl IntoIterator<Item = Action>) -> Self {
        Self {
            choices: choices.into_iter().collect(),
            rng: StdRng::from_os_rng(),
        }
    }
}

impl<P> Policy<P> for RandomPolicy {
    fn decide(&mut self, _percept: &P) -> Result<Action, PolicyError> {
        if self.choices.is_empty() {
            return Ok(Action::NoOp);
        }
        let index = self.rng.random_range(0..self.choices.len());
        Ok(self.choices[index])
    }
}
