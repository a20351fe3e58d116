use anyhow::{Context, Result};
use clap::Parser;
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    cell::{Cell, RefCell},
    fs::File,
    io::{self, Stdout},
    path::PathBuf,
    rc::Rc,
    sync::Mutex,
    time::Duration,
};
use tracing_subscriber::EnvFilter;
use wumpus_world_core::{
    Action, Entity, EntityKind, Environment, EventLog, Orientation, Outcome, Policy, RandomPolicy,
    WorldEvent, WumpusConfig, WumpusPercept, WumpusWorld,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Cave width, walls included
    #[arg(long, default_value_t = 6)]
    width: i32,

    /// Cave height, walls included
    #[arg(long, default_value_t = 6)]
    height: i32,

    /// Chance of a pit in each interior cell
    #[arg(long, default_value_t = 0.2)]
    pit_probability: f64,

    /// Seed for cave generation (and the headless explorer)
    #[arg(long)]
    seed: Option<u64>,

    /// Fixed cave layout to load instead of generating one
    #[arg(short, long, value_name = "LAYOUT_FILE")]
    layout: Option<PathBuf>,

    /// Run a random explorer without a terminal UI and print the outcome
    #[arg(long)]
    headless: bool,

    /// Tick limit for headless runs
    #[arg(long, default_value_t = 200)]
    steps: usize,

    /// Write logs here while the terminal UI is running
    #[arg(long, value_name = "LOG_FILE")]
    log_file: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> WumpusConfig {
        WumpusConfig {
            width: self.width,
            height: self.height,
            pit_probability: self.pit_probability,
            seed: self.seed,
        }
    }

    fn build_world(&self, policy: impl Policy<WumpusPercept> + 'static) -> Result<WumpusWorld> {
        let world = match &self.layout {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read layout file {}", path.display()))?;
                WumpusWorld::from_layout(&text, policy)?
            }
            None => WumpusWorld::new(&self.config(), policy)?,
        };
        Ok(world)
    }
}

fn init_tracing(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if args.headless {
        builder.with_writer(io::stderr).init();
    } else if let Some(path) = &args.log_file {
        let file = File::create(path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;
        builder.with_ansi(false).with_writer(Mutex::new(file)).init();
    } else {
        builder.with_writer(io::sink).init();
    }
    Ok(())
}

struct App {
    /// The cave being explored.
    world: WumpusWorld,
    /// Action the next `step` hands to the explorer.
    pending: Rc<Cell<Option<Action>>>,
    /// What the explorer perceived before its latest action.
    last_percept: Rc<RefCell<Option<WumpusPercept>>>,
    /// Moves and deletions reported by the world.
    events: EventLog,
    /// Show hazards and gold on the map.
    reveal: bool,
    ticks: usize,
    /// Flag to control the main loop.
    should_quit: bool,
}

impl App {
    fn new(args: &Args) -> Result<Self> {
        let pending: Rc<Cell<Option<Action>>> = Rc::new(Cell::new(None));
        let last_percept: Rc<RefCell<Option<WumpusPercept>>> = Rc::new(RefCell::new(None));

        let pilot = {
            let pending = Rc::clone(&pending);
            let last_percept = Rc::clone(&last_percept);
            move |percept: &WumpusPercept| {
                last_percept.replace(Some(percept.clone()));
                pending.take().unwrap_or(Action::NoOp)
            }
        };
        let mut world = args.build_world(pilot)?;
        let events = EventLog::new(12);
        world.add_observer(events.clone());

        Ok(App {
            world,
            pending,
            last_percept,
            events,
            reveal: false,
            ticks: 0,
            should_quit: false,
        })
    }

    /// Runs one tick with `action` as the explorer's decision.
    fn act(&mut self, action: Action) -> Result<()> {
        if self.world.is_done() {
            return Ok(());
        }
        self.pending.set(Some(action));
        self.world.step()?;
        self.ticks += 1;
        Ok(())
    }

    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args)?;

    if args.headless {
        return run_headless(&args);
    }

    // Build the world before touching the terminal so errors print normally.
    let mut app = App::new(&args)?;

    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app);
    restore_terminal(&mut terminal)?;
    result?;

    if let Some(outcome) = app.world.outcome() {
        println!("{}", describe_outcome(outcome));
    }
    Ok(())
}

/// Lets a random explorer loose and reports how it went.
fn run_headless(args: &Args) -> Result<()> {
    let choices = [
        Action::Forward,
        Action::Forward,
        Action::TurnLeft,
        Action::TurnRight,
        Action::Grab,
        Action::Shoot,
        Action::Climb,
    ];
    let explorer = match args.seed {
        Some(seed) => RandomPolicy::new(choices, seed),
        None => RandomPolicy::from_os_rng(choices),
    };
    let mut world = args.build_world(explorer)?;
    let ticks = world.run(args.steps)?;
    tracing::info!(ticks, performance = world.performance(), "headless run finished");

    match world.outcome() {
        Some(outcome) => println!("after {ticks} ticks: {}", describe_outcome(outcome)),
        None => println!(
            "after {ticks} ticks: still exploring, performance {}",
            world.performance()
        ),
    }
    Ok(())
}

fn describe_outcome(outcome: Outcome) -> String {
    match outcome {
        Outcome::ClimbedOut {
            with_gold: true,
            performance,
        } => format!("climbed out with the gold, performance {performance}"),
        Outcome::ClimbedOut {
            with_gold: false,
            performance,
        } => format!("climbed out empty-handed, performance {performance}"),
        Outcome::Died { cause, performance } => {
            format!("killed by a {cause:?}, performance {performance}")
        }
    }
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Redraws and waits for keys. Every action key is exactly one tick.
fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    let poll_rate = Duration::from_millis(250);

    loop {
        terminal.draw(|f| ui(f, app))?;

        if crossterm::event::poll(poll_rate)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                    KeyCode::Char('r') => app.reveal = !app.reveal,
                    KeyCode::Up | KeyCode::Char('w') => app.act(Action::Forward)?,
                    KeyCode::Left | KeyCode::Char('a') => app.act(Action::TurnLeft)?,
                    KeyCode::Right | KeyCode::Char('d') => app.act(Action::TurnRight)?,
                    KeyCode::Char('g') => app.act(Action::Grab)?,
                    KeyCode::Char('s') => app.act(Action::Shoot)?,
                    KeyCode::Char('c') => app.act(Action::Climb)?,
                    _ => {}
                }
            }
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(frame.area());
    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7), // Status
            Constraint::Length(7), // Percept
            Constraint::Min(3), // Event log
            Constraint::Length(2), // Help
        ])
        .split(columns[1]);

    render_map(frame, columns[0], app);
    render_status(frame, side[0], app);
    render_percept(frame, side[1], app);
    render_events(frame, side[2], &app.events);

    let help_text = Paragraph::new(
        "↑/w forward  ←/a →/d turn  g grab  s shoot  c climb  r reveal  q quit",
    )
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, side[3]);
}

/// Map glyph for the most interesting entity in a cell.
fn cell_span(entities: &[Entity], reveal: bool, heading: Option<Orientation>) -> Span<'static> {
    let has = |kind: EntityKind| entities.iter().any(|e| e.kind == kind);
    if has(EntityKind::Explorer) {
        let glyph = match heading {
            Some(Orientation::Right) | None => ">",
            Some(Orientation::Left) => "<",
            Some(Orientation::Up) => "^",
            Some(Orientation::Down) => "v",
        };
        return Span::styled(glyph, Style::default().fg(Color::Cyan).bold());
    }
    if has(EntityKind::Wall) {
        return Span::styled("#", Style::default().fg(Color::DarkGray));
    }
    if reveal {
        if let Some(wumpus) = entities.iter().find(|e| e.kind == EntityKind::Wumpus) {
            let glyph = if wumpus.is_alive() { "W" } else { "x" };
            return Span::styled(glyph, Style::default().fg(Color::Red).bold());
        }
        if has(EntityKind::Pit) {
            return Span::styled("O", Style::default().fg(Color::Magenta));
        }
        if has(EntityKind::Gold) {
            return Span::styled("G", Style::default().fg(Color::Yellow).bold());
        }
    }
    Span::styled(".", Style::default().fg(Color::Gray))
}

/// Renders the cave onto the frame.
fn render_map(frame: &mut Frame, area: Rect, app: &App) {
    let cells = app.world.render(true);
    let heading = app.world.explorer().map(|e| e.orientation);

    let lines: Vec<Line> = cells
        .rows()
        .map(|row| {
            let spans: Vec<Span> = row
                .iter()
                .flat_map(|entities| [cell_span(entities, app.reveal, heading), Span::raw(" ")])
                .collect();
            Line::from(spans)
        })
        .collect();

    let map_paragraph = Paragraph::new(lines)
        .block(Block::default().title("Wumpus Cave").borders(Borders::ALL))
        .alignment(Alignment::Center);

    frame.render_widget(map_paragraph, area);
}

fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let mut lines = vec![Line::from(format!(
        "Tick: {}  Performance: {}",
        app.ticks,
        app.world.performance()
    ))];
    match app.world.explorer() {
        Some(explorer) => {
            let position = explorer
                .location()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());
            lines.push(Line::from(format!(
                "Position: {position}  Facing: {}",
                explorer.orientation
            )));
            lines.push(Line::from(format!(
                "Arrow: {}  Gold: {}  Bump: {}",
                if explorer.has_arrow { "yes" } else { "no" },
                if explorer.is_holding(EntityKind::Gold) { "yes" } else { "no" },
                if explorer.bump { "yes" } else { "no" },
            )));
        }
        None => lines.push(Line::from("The explorer has left the cave.")),
    }
    if let Some(outcome) = app.world.outcome() {
        lines.push(Line::from(Span::styled(
            describe_outcome(outcome),
            Style::default().fg(Color::Yellow).bold(),
        )));
    }

    let status =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Explorer"));
    frame.render_widget(status, area);
}

fn render_percept(frame: &mut Frame, area: Rect, app: &App) {
    let describe = |cell: &[Option<EntityKind>]| -> String {
        cell.iter()
            .map(|sense| match sense {
                Some(kind) => format!("{kind:?}"),
                None => "-".to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    };

    let lines: Vec<Line> = match app.last_percept.borrow().as_ref() {
        Some(percept) => ["left", "right", "up", "down", "here"]
            .iter()
            .zip(percept.cells())
            .map(|(name, cell)| Line::from(format!("{name:>5}: {}", describe(cell.as_slice()))))
            .collect(),
        None => vec![Line::from("Nothing perceived yet.")],
    };

    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Last percept"));
    frame.render_widget(widget, area);
}

fn render_events(frame: &mut Frame, area: Rect, events: &EventLog) {
    let items: Vec<ListItem> = events
        .snapshot()
        .iter()
        .rev()
        .map(|event| {
            let text = match event {
                WorldEvent::Moved(e) => format!(
                    "{:?} {} moved to {}",
                    e.kind,
                    e.id,
                    e.location.map(|p| p.to_string()).unwrap_or_default()
                ),
                WorldEvent::Deleted(e) => format!("{:?} {} removed", e.kind, e.id),
            };
            ListItem::new(text)
        })
        .collect();

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Events"));
    frame.render_widget(list, area);
}
