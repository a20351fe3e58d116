//! The wumpus cave: pits, one wumpus, one pot of gold and a single explorer.
//!
//! The explorer starts at [`START`] facing right with one arrow. Every turn,
//! move and grab costs one point; climbing out at the start with the gold
//! earns [`GOLD_REWARD`]. Walking into a pit or a live wumpus is fatal.

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{
    Action, Agent, Entity, EntityId, EntityKind, Environment, GridEnvironment, Observer, Policy,
    Position, Registry, Thing, WorldError, entity::PerceptClass, map::Grid,
};

/// Where the explorer enters and the only cell it can climb out from.
pub const START: Position = Position::new(1, 1);
pub const GOLD_REWARD: i64 = 1000;
pub const DEATH_PENALTY: i64 = 1000;
const ACTION_COST: i64 = 1;

/// What one cell looks like to the explorer.
///
/// `[None]` means nothing noticeable is there.
pub type CellPercept = Vec<Option<EntityKind>>;

/// The explorer's view: its four neighbours and its own cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WumpusPercept {
    pub left: CellPercept,
    pub right: CellPercept,
    pub up: CellPercept,
    pub down: CellPercept,
    pub here: CellPercept,
}

impl WumpusPercept {
    /// Cells in fixed order: left, right, up, down, here.
    pub fn cells(&self) -> [&CellPercept; 5] {
        [&self.left, &self.right, &self.up, &self.down, &self.here]
    }

    /// Whether `kind` shows up in any of the five cells.
    pub fn senses(&self, kind: EntityKind) -> bool {
        self.cells().iter().any(|cell| cell.contains(&Some(kind)))
    }

    pub fn senses_here(&self, kind: EntityKind) -> bool {
        self.here.contains(&Some(kind))
    }
}

/// Life cycle of the wumpus. The scream is heard exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WumpusState {
    Alive,
    Dead,
    Announced,
}

/// How an episode ended for the explorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    ClimbedOut { with_gold: bool, performance: i64 },
    Died { cause: EntityKind, performance: i64 },
}

impl Outcome {
    pub fn performance(&self) -> i64 {
        match *self {
            Outcome::ClimbedOut { performance, .. } | Outcome::Died { performance, .. } => {
                performance
            }
        }
    }
}

/// Construction parameters for a generated cave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WumpusConfig {
    /// Grid width, perimeter walls included.
    pub width: i32,
    /// Grid height, perimeter walls included.
    pub height: i32,
    /// Chance of a pit in each interior cell other than [`START`].
    pub pit_probability: f64,
    /// Seed for generation; OS entropy when absent.
    pub seed: Option<u64>,
}

impl Default for WumpusConfig {
    fn default() -> Self {
        Self {
            width: 6,
            height: 6,
            pit_probability: 0.2,
            seed: None,
        }
    }
}

impl WumpusConfig {
    pub fn validate(&self) -> Result<(), WorldError> {
        for (field, value) in [("width", self.width), ("height", self.height)] {
            if value < 3 {
                return Err(WorldError::InvalidConfig {
                    field,
                    reason: format!("must be at least 3, got {value}"),
                });
            }
        }
        if (self.width - 2) * (self.height - 2) < 2 {
            return Err(WorldError::InvalidConfig {
                field: "width",
                reason: "the cave needs at least two interior cells".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.pit_probability) {
            return Err(WorldError::InvalidConfig {
                field: "pit_probability",
                reason: format!("must be within [0, 1], got {}", self.pit_probability),
            });
        }
        Ok(())
    }
}

/// The wumpus cave, driven through [`Environment::step`].
pub struct WumpusWorld {
    grid: GridEnvironment<WumpusPercept>,
    explorer: EntityId,
    wumpus: Option<EntityId>,
    screamed: bool,
    outcome: Option<Outcome>,
}

impl WumpusWorld {
    /// Generates a random cave. Seeds from `config.seed` when given.
    pub fn new(
        config: &WumpusConfig,
        policy: impl Policy<WumpusPercept> + 'static,
    ) -> Result<Self, WorldError> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(config, policy, rng)
    }

    /// Generates a random cave drawing from `rng`.
    pub fn with_rng(
        config: &WumpusConfig,
        policy: impl Policy<WumpusPercept> + 'static,
        rng: StdRng,
    ) -> Result<Self, WorldError> {
        config.validate()?;
        let explorer = Agent::new(EntityKind::Explorer, policy);
        let mut world = Self::walled(config.width, config.height, explorer.id(), rng);

        let bounds = world.grid.bounds();
        for x in bounds.x_start..bounds.x_end {
            for y in bounds.y_start..bounds.y_end {
                let at = Position::new(x, y);
                if at == START {
                    continue;
                }
                if world.grid.rng_mut().random::<f64>() < config.pit_probability {
                    world.place_pit(at);
                }
            }
        }

        let wumpus_at = world.interior_location_off_start()?;
        world.place_wumpus(wumpus_at);
        let gold_at = world.interior_location_off_start()?;
        world.place_gold(gold_at);

        world.grid.place(explorer.into(), START, true);
        tracing::debug!(
            width = config.width,
            height = config.height,
            entities = world.grid.registry().len(),
            %wumpus_at,
            %gold_at,
            "generated wumpus cave"
        );
        Ok(world)
    }

    /// Builds a fixed cave from a text layout of its interior.
    ///
    /// One whitespace-separated token per cell, row `y = 1` first. `.` is an
    /// empty cell, otherwise any combination of `P` (pit), `W` (wumpus) and
    /// `G` (gold). Walls, breezes and stenches are added automatically.
    ///
    /// ```text
    /// . . . G
    /// . P . .
    /// . . . .
    /// . . . W
    /// ```
    pub fn from_layout(
        layout: &str,
        policy: impl Policy<WumpusPercept> + 'static,
    ) -> Result<Self, WorldError> {
        let rows: Vec<Vec<&str>> = layout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| line.split_whitespace().collect())
            .collect();
        let Some(first) = rows.first() else {
            return Err(WorldError::InvalidLayout("layout is empty".to_string()));
        };
        let columns = first.len();
        for (y, row) in rows.iter().enumerate() {
            if row.len() != columns {
                return Err(WorldError::InvalidLayout(format!(
                    "inconsistent width at row {}: expected {}, found {}",
                    y,
                    columns,
                    row.len()
                )));
            }
        }

        let explorer = Agent::new(EntityKind::Explorer, policy);
        let width = columns as i32 + 2;
        let height = rows.len() as i32 + 2;
        let mut world = Self::walled(width, height, explorer.id(), StdRng::seed_from_u64(0));

        for (y, row) in rows.iter().enumerate() {
            for (x, token) in row.iter().enumerate() {
                let position = Position::new(x as i32 + 1, y as i32 + 1);
                if *token == "." {
                    continue;
                }
                for code in token.chars() {
                    match code {
                        'P' | 'W' if position == START => {
                            return Err(WorldError::InvalidLayout(format!(
                                "hazard '{code}' on the start cell {START}"
                            )));
                        }
                        'P' => {
                            world.place_pit(position);
                        }
                        'W' => {
                            if !world.place_wumpus(position) {
                                return Err(WorldError::InvalidLayout(format!(
                                    "second wumpus at {position}"
                                )));
                            }
                        }
                        'G' => {
                            world.place_gold(position);
                        }
                        _ => {
                            return Err(WorldError::InvalidLayout(format!(
                                "unknown layout code '{token}' at {position}"
                            )));
                        }
                    }
                }
            }
        }

        world.grid.place(explorer.into(), START, true);
        Ok(world)
    }

    fn walled(width: i32, height: i32, explorer: EntityId, rng: StdRng) -> Self {
        let mut grid = GridEnvironment::new(width, height, rng);
        grid.build_perimeter_walls();
        Self {
            grid,
            explorer,
            wumpus: None,
            screamed: false,
            outcome: None,
        }
    }

    fn interior_location_off_start(&mut self) -> Result<Position, WorldError> {
        self.grid
            .random_inbounds_location(Some(START))
            .ok_or_else(|| WorldError::InvalidConfig {
                field: "width",
                reason: "no interior cell besides the start".to_string(),
            })
    }

    fn place_with_signal(&mut self, kind: EntityKind, signal: EntityKind, at: Position) -> bool {
        if !self.grid.place(kind.into(), at, true) {
            return false;
        }
        for neighbour in at.neighbours() {
            self.grid.place(signal.into(), neighbour, true);
        }
        true
    }

    /// Places a pit with breezes in the four neighbouring cells.
    pub fn place_pit(&mut self, at: Position) -> bool {
        self.place_with_signal(EntityKind::Pit, EntityKind::Breeze, at)
    }

    /// Places the wumpus with stenches around it. There is at most one.
    pub fn place_wumpus(&mut self, at: Position) -> bool {
        if self.wumpus.is_some() {
            tracing::warn!(%at, "the cave already has a wumpus");
            return false;
        }
        let wumpus = Entity::new(EntityKind::Wumpus);
        if !self.grid.place(wumpus.into(), at, true) {
            return false;
        }
        self.wumpus = Some(wumpus.id);
        for neighbour in at.neighbours() {
            self.grid.place(EntityKind::Stench.into(), neighbour, true);
        }
        true
    }

    pub fn place_gold(&mut self, at: Position) -> bool {
        self.grid.place(EntityKind::Gold.into(), at, true)
    }

    pub fn add_observer(&mut self, observer: impl Observer + 'static) {
        self.grid.add_observer(observer);
    }

    pub fn grid(&self) -> &GridEnvironment<WumpusPercept> {
        &self.grid
    }

    pub fn explorer_id(&self) -> EntityId {
        self.explorer
    }

    /// The explorer, while it is still in the cave.
    pub fn explorer(&self) -> Option<&Agent<WumpusPercept>> {
        self.grid.registry().agent(self.explorer)
    }

    pub fn wumpus(&self) -> Option<&Entity> {
        self.wumpus.and_then(|id| self.grid.registry().entity(id))
    }

    pub fn wumpus_state(&self) -> Option<WumpusState> {
        let wumpus = self.wumpus()?;
        Some(match (wumpus.is_alive(), self.screamed) {
            (true, _) => WumpusState::Alive,
            (false, false) => WumpusState::Dead,
            (false, true) => WumpusState::Announced,
        })
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Current score, or the final one once the explorer has left.
    pub fn performance(&self) -> i64 {
        match (self.explorer(), self.outcome) {
            (Some(explorer), _) => explorer.performance,
            (None, Some(outcome)) => outcome.performance(),
            (None, None) => 0,
        }
    }

    /// Entities per cell, for display. Without walls, cell `(0, 0)` is the
    /// interior corner `(1, 1)`.
    pub fn render(&self, show_walls: bool) -> Grid<Vec<Entity>> {
        let (width, height) = (self.grid.width(), self.grid.height());
        let (origin, w, h) = if show_walls {
            (Position::new(0, 0), width, height)
        } else {
            (Position::new(1, 1), width - 2, height - 2)
        };
        self.grid.cells(origin, w.max(0) as usize, h.max(0) as usize)
    }

    /// What an agent of kind `observer` standing at `agent_at` notices in `cell`.
    fn percepts_from(
        &self,
        observer: EntityKind,
        agent_at: Position,
        cell: Position,
    ) -> CellPercept {
        let sensed: CellPercept = self
            .grid
            .registry()
            .entities()
            .filter(|e| e.location == Some(cell) && e.kind != observer)
            .filter_map(|e| match e.kind.percept_class() {
                PerceptClass::Gold => (cell == agent_at).then_some(EntityKind::Glitter),
                PerceptClass::Wall => Some(EntityKind::Bump),
                PerceptClass::Wumpus => Some(EntityKind::Stench),
                PerceptClass::Pit => Some(EntityKind::Breeze),
                PerceptClass::Other => Some(e.kind),
            })
            .map(Some)
            .collect();
        if sensed.is_empty() { vec![None] } else { sensed }
    }

    /// Whether the episode is over for the explorer. Reports why.
    pub fn in_danger(&self) -> bool {
        match self.explorer() {
            Some(explorer) if explorer.is_alive() => false,
            Some(explorer) => {
                tracing::info!(
                    cause = ?explorer.killed_by,
                    performance = explorer.performance,
                    "explorer is dead"
                );
                true
            }
            None => {
                let with_gold = matches!(
                    self.outcome,
                    Some(Outcome::ClimbedOut {
                        with_gold: true,
                        ..
                    })
                );
                tracing::info!(with_gold, "explorer has climbed out");
                true
            }
        }
    }

    fn charge(&mut self, agent: EntityId, cost: i64) {
        if let Some(agent) = self.grid.registry_mut().agent_mut(agent) {
            agent.performance -= cost;
        }
    }

    fn check_hazards(&mut self, id: EntityId) {
        let Some(location) = self.grid.registry().entity(id).and_then(|e| e.location) else {
            return;
        };
        let cause = self
            .grid
            .registry()
            .things_at(location, None)
            .into_iter()
            .find_map(|e| match e.kind {
                EntityKind::Pit => Some(EntityKind::Pit),
                EntityKind::Wumpus if e.is_alive() => Some(EntityKind::Wumpus),
                _ => None,
            });
        let Some(cause) = cause else {
            return;
        };
        if let Some(agent) = self.grid.registry_mut().agent_mut(id) {
            agent.body.alive = Some(false);
            agent.killed_by = Some(cause);
            agent.performance -= DEATH_PENALTY;
            let performance = agent.performance;
            tracing::info!(agent = %id, ?cause, %location, "explorer died");
            if id == self.explorer {
                self.outcome = Some(Outcome::Died { cause, performance });
            }
        }
    }

    fn grab(&mut self, id: EntityId) {
        let Some(agent) = self.grid.registry().agent(id) else {
            return;
        };
        let Some(location) = agent.location() else {
            return;
        };
        let target = self
            .grid
            .registry()
            .things_at(location, None)
            .into_iter()
            .find(|e| agent.can_grab(e));
        if let Some(target) = target {
            if let Some(Thing::Entity(mut item)) = self.grid.remove(target.id) {
                item.location = Some(location);
                tracing::debug!(agent = %id, kind = ?item.kind, "grabbed");
                if let Some(agent) = self.grid.registry_mut().agent_mut(id) {
                    agent.inventory.push(item);
                }
            }
        }
    }

    fn climb(&mut self, id: EntityId) {
        let Some(agent) = self.grid.registry_mut().agent_mut(id) else {
            return;
        };
        if agent.location() != Some(START) {
            tracing::debug!(agent = %id, "climb away from the start does nothing");
            return;
        }
        let with_gold = agent.is_holding(EntityKind::Gold);
        if with_gold {
            agent.performance += GOLD_REWARD;
        }
        let performance = agent.performance;
        if id == self.explorer {
            self.outcome = Some(Outcome::ClimbedOut {
                with_gold,
                performance,
            });
        }
        tracing::info!(agent = %id, with_gold, performance, "climbed out of the cave");
        self.grid.remove(id);
    }

    fn shoot(&mut self, id: EntityId) {
        let Some(agent) = self.grid.registry_mut().agent_mut(id) else {
            return;
        };
        if !agent.has_arrow {
            tracing::debug!(agent = %id, "no arrow left");
            return;
        }
        agent.has_arrow = false;
        let (Some(from), heading) = (agent.location(), agent.orientation) else {
            return;
        };

        let mut cursor = heading.forward(from);
        while self.grid.is_inbounds(cursor) {
            let target = self
                .grid
                .registry()
                .things_at(cursor, Some(EntityKind::Wumpus))
                .into_iter()
                .find(Entity::is_alive);
            if let Some(wumpus) = target {
                if let Some(entity) = self.grid.registry_mut().entity_mut(wumpus.id) {
                    entity.alive = Some(false);
                }
                tracing::info!(agent = %id, at = %cursor, "arrow killed the wumpus");
                return;
            }
            cursor = heading.forward(cursor);
        }
        tracing::debug!(agent = %id, %heading, "arrow missed");
    }
}

impl std::fmt::Debug for WumpusWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WumpusWorld")
            .field("grid", &self.grid)
            .field("explorer", &self.explorer)
            .field("wumpus", &self.wumpus_state())
            .field("outcome", &self.outcome)
            .finish()
    }
}

impl Environment for WumpusWorld {
    type Percept = WumpusPercept;

    fn registry(&self) -> &Registry<WumpusPercept> {
        self.grid.registry()
    }

    fn registry_mut(&mut self) -> &mut Registry<WumpusPercept> {
        self.grid.registry_mut()
    }

    fn percept(&mut self, agent: EntityId) -> WumpusPercept {
        let Some(body) = self.grid.registry().entity(agent).copied() else {
            return WumpusPercept::default();
        };
        let Some(location) = body.location else {
            return WumpusPercept::default();
        };
        let [left, right, up, down] = location.neighbours();
        let mut percept = WumpusPercept {
            left: self.percepts_from(body.kind, location, left),
            right: self.percepts_from(body.kind, location, right),
            up: self.percepts_from(body.kind, location, up),
            down: self.percepts_from(body.kind, location, down),
            here: self.percepts_from(body.kind, location, location),
        };

        if self.wumpus_state() == Some(WumpusState::Dead) {
            percept.here.push(Some(EntityKind::Scream));
            self.screamed = true;
        }
        percept
    }

    fn execute_action(&mut self, agent: EntityId, action: Action) {
        if agent == self.explorer && self.in_danger() {
            return;
        }
        match action {
            Action::TurnRight | Action::TurnLeft => {
                self.grid.apply_action(agent, action);
                self.charge(agent, ACTION_COST);
            }
            Action::Forward => {
                self.grid.apply_action(agent, action);
                self.charge(agent, ACTION_COST);
                let moved = self.grid.registry().agent(agent).is_some_and(|a| !a.bump);
                if moved {
                    self.check_hazards(agent);
                }
            }
            Action::Grab => {
                self.clear_bump(agent);
                self.grab(agent);
                self.charge(agent, ACTION_COST);
            }
            Action::Climb => {
                self.clear_bump(agent);
                self.climb(agent);
            }
            Action::Shoot => {
                self.clear_bump(agent);
                self.shoot(agent);
            }
            Action::NoOp | Action::Release => {
                self.clear_bump(agent);
                tracing::debug!(agent = %agent, %action, "action ignored in the cave");
            }
        }
    }

    fn default_location(&mut self, _entity: &Entity) -> Option<Position> {
        self.grid.random_inbounds_location(None)
    }

    fn add(&mut self, thing: Thing<WumpusPercept>, location: Option<Position>) -> bool {
        let location = match location {
            Some(location) => location,
            None => match self.default_location(thing.entity()) {
                Some(location) => location,
                None => return false,
            },
        };
        self.grid.place(thing, location, false)
    }

    fn delete(&mut self, id: EntityId) -> Option<Thing<WumpusPercept>> {
        self.grid.remove(id)
    }
}

impl WumpusWorld {
    fn clear_bump(&mut self, agent: EntityId) {
        if let Some(agent) = self.grid.registry_mut().agent_mut(agent) {
            agent.bump = false;
        }
    }
}
