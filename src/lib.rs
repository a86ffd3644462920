/*!
# Quadfall Engine

`quadfall_engine` is the deterministic simulation core of a falling-block
stacking game. It owns the well, the piece in play, the preview queue, the
hold slot, a seeded randomizer, a rotation system, and a DAS input
interpreter, and advances them one fixed tick at a time.

The engine is a pure function of (options, seed, per-tick key sets): feed two
instances the same three and they agree on every snapshot of every tick. The
replay format banks on this — it stores nothing but options and key edges.

# Examples

```
use quadfall_engine::{Game, GameConfig, VirtualKey, VirtualKeySet};

let mut config = GameConfig::default();
config.seed = Some(42);
let mut game = Game::new(config).unwrap();

// One tick with 'left' held.
let mut keys = VirtualKeySet::EMPTY;
keys.insert(VirtualKey::Left);
game.tick(keys);

// View game state (render the well, etc.).
let snapshot = game.snapshot();
assert_eq!(snapshot.total_ticks, 1);
```

Rendering, key sources and the fixed-timestep outer loop are the host's
business; see [`Frontend`] for the contract the engine expects of them.
*/

#![warn(missing_docs)]

pub mod config;
pub mod fixed_point;
pub mod input;
pub mod piece_generation;
pub mod piece_rotation;
pub mod prng;
pub mod replay;
pub mod support;

pub use config::{ConfigError, GameConfig, InitialActionStyle, LockStyle, RandomizerKind};
pub use fixed_point::Uq8_24;
pub use input::{Actions, Extra, ExtraSet, InputState, VirtualKey, VirtualKeySet};
pub use piece_generation::PieceGenerator;
pub use piece_rotation::RotationSystem;
pub use replay::{Replay, ReplayError, ReplayInput, ReplayRecorder};
pub use support::PieceQueue;

use piece_generation::PieceGenerator as Generator;

/// One of the seven piece shapes.
///
/// The declaration order is the serialization order: indices `0..=6`.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PieceId {
    /// 'I': four cells in a line; `▄▄▄▄`.
    I,
    /// 'J': a line with a nub on its leading end; `█▄▄`.
    J,
    /// 'L': a line with a nub on its trailing end; `▄▄█`.
    L,
    /// 'O': the 2×2 square; `██`.
    O,
    /// 'S': the left-snaking pair of dominoes; `▄█▀`.
    S,
    /// 'T': a line with a centre nub; `▄█▄`.
    T,
    /// 'Z': the right-snaking pair of dominoes; `▀█▄`.
    Z,
}

impl PieceId {
    /// All pieces in serialization order.
    pub const ALL: [PieceId; 7] = [
        PieceId::I,
        PieceId::J,
        PieceId::L,
        PieceId::O,
        PieceId::S,
        PieceId::T,
        PieceId::Z,
    ];

    /// The piece's serialization index, `0..=6`.
    pub const fn index(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for PieceId {
    type Error = ();

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        use PieceId::*;
        Ok(match value {
            0 => I,
            1 => J,
            2 => L,
            3 => O,
            4 => S,
            5 => T,
            6 => Z,
            _ => Err(())?,
        })
    }
}

/// One of the four orientations a piece can be in.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Default, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Theta {
    /// Spawn orientation.
    #[default]
    R0,
    /// One clockwise quarter turn from spawn.
    R90,
    /// Half turn from spawn.
    R180,
    /// One anticlockwise quarter turn from spawn.
    R270,
}

impl Theta {
    /// The orientation after applying `rotation`.
    pub fn rotated(self, rotation: Rotation) -> Self {
        use Theta::*;
        let turns = match rotation {
            Rotation::Clockwise => 1,
            Rotation::Half => 2,
            Rotation::AntiClockwise => 3,
        };
        match (self as u32 + turns) % 4 {
            0 => R0,
            1 => R90,
            2 => R180,
            3 => R270,
            _ => unreachable!(),
        }
    }
}

/// A rotation request, composed onto [`Theta`] modulo four.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Rotation {
    /// `+1` quarter turn.
    Clockwise,
    /// `-1` quarter turn.
    AntiClockwise,
    /// `+2` quarter turns.
    Half,
}

/// A settled cell of the well, remembering which piece placed it.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Block {
    /// The piece this block came from (for rendering).
    pub id: PieceId,
}

/// One horizontal line of the well at full capacity width.
pub type Line = [Option<Block>; Well::MAX_WIDTH];

/// The playing field: a dense grid of settled blocks.
///
/// Row 0 is the top; rows `0..hidden` are the concealed spawn area. Cells
/// outside the configured bounds count as occupied, which is what makes the
/// collision test total.
#[derive(Eq, PartialEq, Clone, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Well {
    lines: Vec<Line>,
    width: i8,
    height: i8,
    hidden: i8,
}

impl Well {
    /// Capacity bound on the configurable width.
    pub const MAX_WIDTH: usize = 20;
    /// Capacity bound on the configurable height.
    pub const MAX_HEIGHT: usize = 25;

    /// An empty well sized by `config` (which must have been verified).
    pub fn new(config: &GameConfig) -> Self {
        Well {
            lines: vec![Line::default(); usize::from(config.well_height)],
            width: config.well_width as i8,
            height: config.well_height as i8,
            hidden: config.well_hidden as i8,
        }
    }

    /// Playable width in cells.
    pub fn width(&self) -> i8 {
        self.width
    }

    /// Total height in cells, hidden rows included.
    pub fn height(&self) -> i8 {
        self.height
    }

    /// Number of concealed top rows.
    pub fn hidden(&self) -> i8 {
        self.hidden
    }

    /// Whether `(x, y)` is outside the well or holds a settled block.
    pub fn is_occupied(&self, x: i8, y: i8) -> bool {
        if x < 0 || x >= self.width || y < 0 || y >= self.height {
            return true;
        }
        self.lines[y as usize][x as usize].is_some()
    }

    /// The settled block at `(x, y)`, if the cell is in bounds and filled.
    pub fn cell(&self, x: i8, y: i8) -> Option<Block> {
        if x < 0 || x >= self.width || y < 0 || y >= self.height {
            return None;
        }
        self.lines[y as usize][x as usize]
    }

    /// Writes a cell. `(x, y)` must be in bounds.
    pub fn set(&mut self, x: i8, y: i8, block: Option<Block>) {
        self.lines[y as usize][x as usize] = block;
    }

    /// The row at `y`, trimmed to the configured width.
    pub fn line(&self, y: i8) -> &[Option<Block>] {
        &self.lines[y as usize][..self.width as usize]
    }

    /// Whether no cell of the well is occupied.
    pub fn is_empty(&self) -> bool {
        self.lines
            .iter()
            .all(|line| line[..self.width as usize].iter().all(|c| c.is_none()))
    }

    /// Removes every full row, shifting the rows above it down, and returns
    /// how many were removed.
    pub fn clear_full_rows(&mut self) -> u32 {
        let mut cleared = 0;
        // Removing row y and reinserting an empty top row leaves every index
        // >= y referring to the same line as before, so a plain forward scan
        // handles adjacent full rows (and row 0) without underflow.
        for y in 0..self.lines.len() {
            if self.lines[y][..self.width as usize]
                .iter()
                .all(|cell| cell.is_some())
            {
                self.lines.remove(y);
                self.lines.insert(0, Line::default());
                cleared += 1;
            }
        }
        cleared
    }
}

/// The piece currently in play.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Piece {
    /// Shape of the piece.
    pub id: PieceId,
    /// Bounding-box left edge, well column.
    pub x: i8,
    /// Bounding-box top edge, well row.
    pub y: i8,
    /// Fractional vertical position; its whole part tracks `y`.
    pub y_actual: Uq8_24,
    /// Deepest `y` the piece can occupy in its current column/orientation.
    pub y_hard_drop: i8,
    /// Current orientation.
    pub theta: Theta,
    /// Ticks spent grounded since the last applicable reset.
    pub lock_timer: u32,
    /// Upward kicks consumed so far; never decreases during a lifetime.
    pub floorkick_count: u32,
}

impl Piece {
    /// Creates a piece at the given pose, deriving its hard-drop row.
    pub fn init(
        well: &Well,
        system: RotationSystem,
        id: PieceId,
        x: i8,
        y: i8,
        theta: Theta,
    ) -> Self {
        let mut piece = Piece {
            id,
            x,
            y,
            y_actual: Uq8_24::from_parts(y.max(0) as u8, 0),
            y_hard_drop: y,
            theta,
            lock_timer: 0,
            floorkick_count: 0,
        };
        piece.update_hard_drop(well, system);
        piece
    }

    /// Creates a piece at the spawn pose: `x = width/2 - 1`, `y = 1`, [`Theta::R0`].
    pub fn spawn(well: &Well, system: RotationSystem, id: PieceId) -> Self {
        Self::init(well, system, id, well.width() / 2 - 1, 1, Theta::R0)
    }

    /// The piece's four absolute cells under `system`'s tables.
    pub fn blocks(&self, system: RotationSystem) -> [(i8, i8); 4] {
        system
            .blocks(self.id, self.theta)
            .map(|(dx, dy)| (self.x + dx as i8, self.y + dy as i8))
    }

    /// Moves the piece to a new pose, preserving the fractional fall
    /// progress and refreshing the hard-drop row.
    pub fn relocate(&mut self, well: &Well, system: RotationSystem, x: i8, y: i8, theta: Theta) {
        self.x = x;
        self.y = y;
        self.theta = theta;
        self.y_actual = Uq8_24::from_parts(y.max(0) as u8, self.y_actual.fraction());
        self.update_hard_drop(well, system);
    }

    /// Recomputes `y_hard_drop` by walking down from the current row.
    pub fn update_hard_drop(&mut self, well: &Well, system: RotationSystem) {
        let mut lowest = self.y;
        while !system.collides(well, self.id, self.x, lowest + 1, self.theta) {
            lowest += 1;
        }
        self.y_hard_drop = lowest;
    }

    /// Accounts for an upward kick: past the configured budget the lock
    /// timer saturates so the piece locks on the spot.
    pub(crate) fn handle_floorkick(&mut self, is_floorkick: bool, config: &GameConfig) {
        if is_floorkick && config.floorkick_limit != 0 {
            self.floorkick_count += 1;
            if self.floorkick_count >= config.floorkick_limit {
                self.lock_timer = config.lock_delay_ticks();
            }
        }
    }
}

/// The states of the game state machine.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    /// Pre-game countdown; holds are allowed.
    Ready,
    /// Second half of the countdown.
    Go,
    /// The piece is airborne.
    Falling,
    /// The piece rests on a surface and the lock timer runs.
    Landed,
    /// Appearance delay between a lock and the next spawn.
    Are,
    /// Spawn the next piece this tick.
    NewPiece,
    /// Sweep full rows this tick.
    ClearLines,
    /// Terminal: the player quit.
    Quit,
    /// Terminal: topped out, or the goal was reached.
    GameOver,
    /// Terminal: the player asked for a fresh game.
    Restart,
}

impl Phase {
    /// Whether the state machine has halted.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Quit | Phase::GameOver | Phase::Restart)
    }
}

/// Running tallies of one round.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Default, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stats {
    /// Total rows cleared.
    pub lines_cleared: u32,
    /// Total pieces locked.
    pub blocks_placed: u32,
}

/// Read-only view of the engine for rendering.
#[derive(Clone, Copy, Debug)]
pub struct GameSnapshot<'g> {
    /// Current state-machine phase.
    pub phase: Phase,
    /// The playing field.
    pub well: &'g Well,
    /// The piece in play, if any.
    pub piece: Option<&'g Piece>,
    /// Hard-drop shadow cells, when `show_ghost` is on and a piece exists.
    pub ghost: Option<[(i8, i8); 4]>,
    /// The stashed piece.
    pub hold_piece: Option<PieceId>,
    /// Whether hold may still be used for the current piece.
    pub hold_available: bool,
    /// Upcoming pieces.
    pub preview: &'g PieceQueue,
    /// Line/piece tallies.
    pub stats: &'g Stats,
    /// The options this round runs under.
    pub config: &'g GameConfig,
    /// The resolved PRNG seed (what a replay of this game must store).
    pub seed: u32,
    /// Ticks elapsed since the game was created.
    pub total_ticks: i64,
}

/// The host-side collaborators: a key source and a renderer.
///
/// The host owns the fixed-timestep loop; per iteration it reads keys, calls
/// [`Game::tick`], renders on draw frames, and exits once [`Game::quit`]
/// reports a terminal phase.
pub trait Frontend {
    /// The virtual keys held right now.
    fn read_keys(&mut self) -> VirtualKeySet;
    /// Presents one frame.
    fn render(&mut self, snapshot: &GameSnapshot<'_>);
}

/// A piece that locks with more input edges than any placement needs (two
/// rotations plus three horizontal inputs under charged DAS) gets flagged
/// when finesse warnings are on.
const FINESSE_EDGE_LIMIT: u32 = 5;

/// Main game struct representing one round of play.
#[derive(Clone, Debug)]
pub struct Game {
    config: GameConfig,
    seed: u32,
    phase: Phase,
    well: Well,
    piece: Option<Piece>,
    hold_piece: Option<PieceId>,
    hold_available: bool,
    preview: PieceQueue,
    generator: Generator,
    input: InputState,
    stats: Stats,
    are_counter: u32,
    generic_counter: u32,
    total_ticks: i64,
    piece_edges: u32,
}

impl Game {
    /// Starts a new round under `config`.
    ///
    /// Draws a fresh seed when the config leaves it unset; the resolved seed
    /// is available through [`Game::seed`] so the round can still be saved as
    /// a replay.
    pub fn new(config: GameConfig) -> Result<Self, ConfigError> {
        config.verify()?;
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut generator = Generator::new(config.randomizer, seed);
        let preview =
            PieceQueue::filled(usize::from(config.preview_piece_count), || generator.next());
        let well = Well::new(&config);
        log::debug!(
            "new game: seed {seed}, {:?} + {:?}, {}x{} well",
            config.randomizer,
            config.rotation_system,
            config.well_width,
            config.well_height,
        );
        Ok(Game {
            config,
            seed,
            phase: Phase::Ready,
            well,
            piece: None,
            hold_piece: None,
            hold_available: true,
            preview,
            generator,
            input: InputState::default(),
            stats: Stats::default(),
            are_counter: 0,
            generic_counter: 0,
            total_ticks: 0,
            piece_edges: 0,
        })
    }

    /// Starts a round that will reproduce `replay` when fed its key stream.
    pub fn from_replay(replay: &Replay) -> Result<Self, ConfigError> {
        Self::new(replay.config.clone())
    }

    /// The options this round runs under.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// The PRNG seed actually in use.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// The configured options with the resolved seed filled in — what a
    /// replay of this round must store.
    pub fn replay_config(&self) -> GameConfig {
        let mut config = self.config.clone();
        config.seed = Some(self.seed);
        config
    }

    /// Current state-machine phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the host loop should stop after the next render.
    pub fn quit(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Whether this tick falls on a draw frame.
    pub fn in_draw_frame(&self) -> bool {
        self.total_ticks % i64::from(self.config.ticks_per_draw_frame) == 0
    }

    /// Read-only view of the whole game for rendering.
    pub fn snapshot(&self) -> GameSnapshot<'_> {
        let ghost = match (&self.piece, self.config.show_ghost) {
            (Some(piece), true) => Some(
                self.config
                    .rotation_system
                    .blocks(piece.id, piece.theta)
                    .map(|(dx, dy)| (piece.x + dx as i8, piece.y_hard_drop + dy as i8)),
            ),
            _ => None,
        };
        GameSnapshot {
            phase: self.phase,
            well: &self.well,
            piece: self.piece.as_ref(),
            ghost,
            hold_piece: self.hold_piece,
            hold_available: self.hold_available,
            preview: &self.preview,
            stats: &self.stats,
            config: &self.config,
            seed: self.seed,
            total_ticks: self.total_ticks,
        }
    }

    /// Advances the game by one tick under the currently held keys.
    ///
    /// This is the engine's single entry point: it updates the DAS counters
    /// and key memory, derives this tick's [`Actions`], and dispatches on the
    /// current phase. Terminal phases ignore everything but keep the key
    /// memory current.
    pub fn tick(&mut self, keys: VirtualKeySet) {
        self.total_ticks += 1;
        // Key memory must advance every tick, even while the state machine
        // short-circuits, or held keys re-fire as edges on phase re-entry.
        let actions = self.input.interpret(keys, &self.config);
        if self.phase.is_terminal() {
            return;
        }
        if actions.extras.contains(Extra::Restart) {
            self.transition(Phase::Restart);
            return;
        }
        if actions.extras.contains(Extra::Quit) {
            self.transition(Phase::Quit);
            return;
        }
        match self.phase {
            Phase::Ready | Phase::Go => self.tick_ready_go(&actions),
            Phase::Are => self.tick_are(&actions),
            Phase::NewPiece => self.tick_new_piece(),
            Phase::Falling | Phase::Landed => self.tick_falling(&actions),
            Phase::ClearLines => self.tick_clear_lines(),
            Phase::Quit | Phase::GameOver | Phase::Restart => {}
        }
    }

    fn transition(&mut self, next: Phase) {
        if next != self.phase {
            log::debug!("tick {}: {:?} -> {next:?}", self.total_ticks, self.phase);
            self.phase = next;
        }
    }

    /// Ready and Go share one handler: one counter runs through both halves
    /// of the countdown, and pre-game holds stage a piece before play.
    fn tick_ready_go(&mut self, actions: &Actions) {
        if actions.extras.contains(Extra::Hold) && self.hold_available {
            match self.hold_piece {
                // No current piece exists yet, so hold consumes the preview.
                None => {
                    let refill = self.generator.next();
                    self.hold_piece = Some(self.preview.take(refill));
                }
                Some(held) => {
                    self.hold_piece = Some(self.preview.swap_head(held));
                }
            }
            if !self.config.infinite_ready_go_hold {
                self.hold_available = false;
            }
        }
        let ready = self.config.ticks(self.config.ready_phase_length_ms);
        let go = self.config.ticks(self.config.go_phase_length_ms);
        if self.generic_counter == ready + go {
            self.generic_counter = 0;
            self.transition(Phase::NewPiece);
            return;
        }
        if self.generic_counter == ready {
            self.transition(Phase::Go);
        }
        self.generic_counter += 1;
    }

    fn tick_are(&mut self, actions: &Actions) {
        if self.config.are_cancellable && !actions.pressed.is_empty() {
            self.are_counter = 0;
            self.transition(Phase::NewPiece);
            return;
        }
        self.are_counter += 1;
        if self.are_counter > self.config.ticks(self.config.are_delay_ms) {
            self.are_counter = 0;
            self.transition(Phase::NewPiece);
        }
    }

    fn tick_new_piece(&mut self) {
        let refill = self.generator.next();
        let id = self.preview.take(refill);
        let mut piece = Piece::spawn(&self.well, self.config.rotation_system, id);
        self.piece_edges = 0;
        let mut blocked = self
            .config
            .rotation_system
            .collides(&self.well, piece.id, piece.x, piece.y, piece.theta);
        if !blocked {
            match self.config.initial_action_style {
                InitialActionStyle::None => {}
                InitialActionStyle::Persistent => {
                    blocked = !self.apply_initial_actions(&mut piece);
                }
                InitialActionStyle::Trigger => {
                    // TODO: buffer keys re-triggered during ARE; until then
                    // this style spawns plainly, like `None`.
                }
            }
        }
        if blocked {
            // Topped out.
            self.piece = None;
            log::debug!("spawn of {id:?} blocked; game over");
            self.transition(Phase::GameOver);
            return;
        }
        self.piece = Some(piece);
        self.transition(Phase::Falling);
    }

    /// Persistent initial actions: hold and rotation keys already held when
    /// the piece appears take effect on the spawn tick. Returns `false` when
    /// an initial hold respawns into the stack.
    fn apply_initial_actions(&mut self, piece: &mut Piece) -> bool {
        let held = self.input.held();
        if held.contains(VirtualKey::Hold) && self.hold_available && !self.swap_with_hold(piece) {
            return false;
        }
        let rotation = if held.contains(VirtualKey::RotateHalf) {
            Some(Rotation::Half)
        } else if held.contains(VirtualKey::RotateRight) {
            Some(Rotation::Clockwise)
        } else if held.contains(VirtualKey::RotateLeft) {
            Some(Rotation::AntiClockwise)
        } else {
            None
        };
        if let Some(rotation) = rotation {
            self.config
                .rotation_system
                .rotate(&self.well, piece, rotation, &self.config);
        }
        true
    }

    /// Swaps the piece in play with the hold slot (or the preview head when
    /// the slot is empty) and respawns it. Returns `false` on a blocked
    /// respawn, which the caller must treat as a top-out.
    fn swap_with_hold(&mut self, piece: &mut Piece) -> bool {
        let incoming = match self.hold_piece {
            Some(held) => held,
            None => {
                let refill = self.generator.next();
                self.preview.take(refill)
            }
        };
        self.hold_piece = Some(piece.id);
        self.hold_available = false;
        self.piece_edges = 0;
        *piece = Piece::spawn(&self.well, self.config.rotation_system, incoming);
        !self
            .config
            .rotation_system
            .collides(&self.well, piece.id, piece.x, piece.y, piece.theta)
    }

    /// The in-play tick: gravity, locking, hold, rotation, movement, timer —
    /// in that order.
    fn tick_falling(&mut self, actions: &Actions) {
        let Some(mut piece) = self.piece else {
            return;
        };
        let system = self.config.rotation_system;
        let lock_ticks = self.config.lock_delay_ticks();
        self.piece_edges += [
            VirtualKey::Left,
            VirtualKey::Right,
            VirtualKey::RotateLeft,
            VirtualKey::RotateRight,
            VirtualKey::RotateHalf,
        ]
        .into_iter()
        .filter(|&key| actions.pressed.contains(key))
        .count() as u32;

        // Gravity.
        let old_y = piece.y;
        piece.y_actual += actions.gravity;
        if piece.y_actual.integer() as i8 >= piece.y_hard_drop {
            piece.y = piece.y_hard_drop;
            piece.y_actual = Uq8_24::from_parts(piece.y.max(0) as u8, piece.y_actual.fraction());
            self.transition(Phase::Landed);
        } else {
            piece.y = piece.y_actual.integer() as i8;
            if piece.y > old_y && matches!(self.config.lock_style, LockStyle::Step | LockStyle::Move)
            {
                piece.lock_timer = 0;
            }
            self.transition(Phase::Falling);
        }

        // Locking.
        if actions.extras.contains(Extra::HardDrop)
            || (self.phase == Phase::Landed && piece.lock_timer >= lock_ticks)
        {
            self.lock_piece(piece);
            return;
        }

        // Hold.
        if actions.extras.contains(Extra::Hold) && self.hold_available {
            if !self.swap_with_hold(&mut piece) {
                self.piece = None;
                log::debug!("hold respawn blocked; game over");
                self.transition(Phase::GameOver);
                return;
            }
            self.transition(Phase::Falling);
        }

        // Rotation.
        if let Some(rotation) = actions.rotation {
            let rotated = system.rotate(&self.well, &mut piece, rotation, &self.config);
            // A floorkick that exhausted the budget saturated the timer to
            // force a lock; the move-reset must not undo that.
            if rotated && self.config.lock_style == LockStyle::Move && piece.lock_timer < lock_ticks
            {
                piece.lock_timer = 0;
            }
        }

        // Movement, one cell at a time; a wall stops the remainder.
        let mut remaining = actions.movement;
        let mut moved = false;
        while remaining != 0 {
            let dx = remaining.signum() as i8;
            if system.collides(&self.well, piece.id, piece.x + dx, piece.y, piece.theta) {
                break;
            }
            piece.x += dx;
            moved = true;
            remaining -= remaining.signum();
        }
        if moved {
            piece.update_hard_drop(&self.well, system);
            if self.config.lock_style == LockStyle::Move && piece.lock_timer < lock_ticks {
                piece.lock_timer = 0;
            }
        }

        // Timer.
        if self.phase == Phase::Landed {
            piece.lock_timer += 1;
        } else if self.config.lock_style != LockStyle::Entry {
            piece.lock_timer = 0;
        }
        self.piece = Some(piece);
    }

    fn lock_piece(&mut self, piece: Piece) {
        let system = self.config.rotation_system;
        for (dx, dy) in system.blocks(piece.id, piece.theta) {
            self.well.set(
                piece.x + dx as i8,
                piece.y_hard_drop + dy as i8,
                Some(Block { id: piece.id }),
            );
        }
        self.stats.blocks_placed += 1;
        if self.config.warn_on_bad_finesse && self.piece_edges > FINESSE_EDGE_LIMIT {
            log::warn!(
                "bad finesse: {:?} locked after {} input edges",
                piece.id,
                self.piece_edges
            );
        }
        self.hold_available = true;
        self.piece = None;
        self.transition(Phase::ClearLines);
    }

    fn tick_clear_lines(&mut self) {
        let cleared = self.well.clear_full_rows();
        self.stats.lines_cleared += cleared;
        if self.stats.lines_cleared >= self.config.goal {
            self.transition(Phase::GameOver);
        } else {
            self.transition(Phase::Are);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn piece_order_matches_serialization_indices() {
        for (index, id) in PieceId::ALL.into_iter().enumerate() {
            assert_eq!(id.index(), index as u32);
            assert_eq!(PieceId::try_from(index as u32), Ok(id));
        }
        assert!(PieceId::try_from(7).is_err());
        let mut sorted = PieceId::ALL;
        sorted.sort_unstable();
        assert_eq!(sorted, PieceId::ALL);
    }

    #[test]
    fn theta_composition_laws() {
        for theta in [Theta::R0, Theta::R90, Theta::R180, Theta::R270] {
            let mut four = theta;
            for _ in 0..4 {
                four = four.rotated(Rotation::Clockwise);
            }
            assert_eq!(four, theta);
            assert_eq!(theta.rotated(Rotation::Half).rotated(Rotation::Half), theta);
            assert_eq!(
                theta.rotated(Rotation::Clockwise).rotated(Rotation::AntiClockwise),
                theta
            );
        }
    }

    fn filled_line(well: &mut Well, y: i8, skip: Option<i8>) {
        for x in 0..well.width() {
            if Some(x) != skip {
                well.set(x, y, Some(Block { id: PieceId::O }));
            }
        }
    }

    #[test]
    fn clear_full_rows_shifts_the_stack_down() {
        let config = GameConfig::default();
        let mut well = Well::new(&config);
        let bottom = well.height() - 1;
        filled_line(&mut well, bottom, None);
        well.set(3, bottom - 1, Some(Block { id: PieceId::T }));
        assert_eq!(well.clear_full_rows(), 1);
        assert_eq!(well.cell(3, bottom), Some(Block { id: PieceId::T }));
        assert_eq!(well.cell(3, bottom - 1), None);
    }

    #[test]
    fn clear_full_rows_handles_adjacent_rows_and_row_zero() {
        let config = GameConfig::default();
        let mut well = Well::new(&config);
        filled_line(&mut well, 0, None);
        filled_line(&mut well, 5, None);
        filled_line(&mut well, 6, None);
        assert_eq!(well.clear_full_rows(), 3);
        assert!(well.is_empty());
    }

    #[test]
    fn hard_drop_row_is_the_resting_row() {
        let config = GameConfig::default();
        let mut well = Well::new(&config);
        let system = RotationSystem::Srs;
        let empty = Piece::spawn(&well, system, PieceId::T);
        // T at R0 has its lowest blocks at box row 1.
        assert_eq!(empty.y_hard_drop, well.height() - 2);
        let last_row = well.height() - 1;
        filled_line(&mut well, last_row, None);
        let on_stack = Piece::spawn(&well, system, PieceId::T);
        assert_eq!(on_stack.y_hard_drop, well.height() - 3);
    }

    #[test]
    fn floorkick_budget_saturates_the_lock_timer() {
        let config = GameConfig::default();
        let well = Well::new(&config);
        let mut piece = Piece::spawn(&well, config.rotation_system, PieceId::T);
        piece.handle_floorkick(false, &config);
        assert_eq!(piece.floorkick_count, 0);
        piece.handle_floorkick(true, &config);
        assert_eq!(piece.floorkick_count, 1);
        assert_eq!(piece.lock_timer, config.lock_delay_ticks());
    }
}
