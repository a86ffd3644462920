/*!
Runtime game options and their text codec.

[`GameConfig`] is the full set of knobs a game round runs under. The text
form is the line-oriented `key = value` dialect embedded in replay files:
`;`/`#` comments, optional `[group]` headers, case-insensitive keys and enum
names, `null` for absent optionals. A replay is only reproducible if every
option round-trips exactly, so the codec lives next to the struct and the
round-trip is under test.
*/

use thiserror::Error;

use crate::{piece_rotation::RotationSystem, support::PieceQueue};

/// When the lock timer of a grounded piece is reset.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LockStyle {
    /// Never after spawn: ground time accumulates for the piece's lifetime.
    Entry,
    /// On every downward step.
    Step,
    /// On every downward step, successful shift or successful rotation.
    Move,
}

/// What happens to rotation/hold keys already held when a piece spawns.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InitialActionStyle {
    /// Held keys do nothing special at spawn.
    None,
    /// Held rotation/hold keys apply on the spawn tick.
    Persistent,
    /// Reserved: keys re-triggered during ARE would buffer for spawn. Parsed
    /// and serialized, but currently behaves like `None`.
    Trigger,
}

/// Which piece sequence randomizer drives the game.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RandomizerKind {
    /// Uniform rolls, no memory.
    Memoryless,
    /// Uniform with the single console-style repeat reroll.
    Nes,
    /// One shuffled bag of all seven pieces.
    Bag7,
    /// [`RandomizerKind::Bag7`] with repeats across bag seams repaired.
    Bag7SeamCheck,
    /// Two copies of each piece per shuffled pool.
    MultiBag2,
    /// Four copies of each piece per shuffled pool.
    MultiBag4,
    /// Nine copies of each piece per shuffled pool.
    MultiBag9,
    /// First-generation arcade 4-history randomizer (4 rerolls).
    Tgm1,
    /// Second-generation arcade 4-history randomizer (6 rerolls).
    Tgm2,
    /// Third-generation arcade randomizer with the 35-slot drought bag.
    Tgm3,
}

/// Errors produced by option verification and the text codec.
#[derive(Eq, PartialEq, Clone, Error, Debug)]
pub enum ConfigError {
    /// An option is outside the bounds the engine was built for.
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    /// A line is neither a comment, a group header nor a `key = value` pair
    /// with a readable value.
    #[error("line {line}: malformed `{text}`")]
    MalformedLine { line: usize, text: String },
    /// A value failed to parse as a boolean.
    #[error("line {line}: unknown boolean `{text}`")]
    UnknownBool { line: usize, text: String },
    /// A value failed to match any name of its enum option.
    #[error("line {line}: unknown name `{text}`")]
    UnknownEnum { line: usize, text: String },
}

/// All user-configurable options of one game round.
#[derive(Eq, PartialEq, Clone, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GameConfig {
    /// PRNG seed; `None` draws a fresh one at game start.
    pub seed: Option<u32>,
    /// Playable columns.
    pub well_width: u8,
    /// Total rows, hidden spawn area included.
    pub well_height: u8,
    /// Rows `0..well_hidden` are the concealed spawn area.
    pub well_hidden: u8,
    /// Milliseconds per engine tick (the fixed timestep).
    pub ms_per_tick: u32,
    /// Render every n-th tick.
    pub ticks_per_draw_frame: u32,
    /// Auto-shift repeat period once charged; `0` means instant to the wall.
    pub das_speed_ms: u32,
    /// Charge time before auto-shift begins.
    pub das_delay_ms: u32,
    /// Appearance delay between a lock and the next spawn.
    pub are_delay_ms: u32,
    /// Log a warning when a piece locks with wasteful inputs.
    pub warn_on_bad_finesse: bool,
    /// Whether any fresh key press skips the remaining appearance delay.
    pub are_cancellable: bool,
    /// When the lock timer of a grounded piece is reset.
    pub lock_style: LockStyle,
    /// Grounded time before a piece locks.
    pub lock_delay_ms: u32,
    /// Upward kicks allowed per piece; `0` disables the budget entirely.
    pub floorkick_limit: u32,
    /// Soft drop applies only on the press edge instead of while held.
    pub one_shot_soft_drop: bool,
    /// The method of piece rotation used.
    pub rotation_system: RotationSystem,
    /// What held rotation/hold keys do on the spawn tick.
    pub initial_action_style: InitialActionStyle,
    /// Fall period of ordinary gravity.
    pub gravity_ms_per_cell: u32,
    /// Fall period while soft drop is engaged (replaces, not adds).
    pub soft_drop_gravity_ms_per_cell: u32,
    /// The method of piece sequence generation used.
    pub randomizer: RandomizerKind,
    /// Length of the "ready" half of the countdown.
    pub ready_phase_length_ms: u32,
    /// Length of the "go" half of the countdown.
    pub go_phase_length_ms: u32,
    /// Whether pre-game holds may be repeated.
    pub infinite_ready_go_hold: bool,
    /// Upcoming pieces exposed to the renderer.
    pub preview_piece_count: u8,
    /// Lines to clear before the round ends.
    pub goal: u32,
    /// Whether the snapshot carries the hard-drop shadow.
    pub show_ghost: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            seed: None,
            well_width: 10,
            well_height: 22,
            well_hidden: 2,
            ms_per_tick: 16,
            ticks_per_draw_frame: 1,
            das_speed_ms: 0,
            das_delay_ms: 150,
            are_delay_ms: 0,
            warn_on_bad_finesse: false,
            are_cancellable: false,
            lock_style: LockStyle::Move,
            lock_delay_ms: 150,
            floorkick_limit: 1,
            one_shot_soft_drop: false,
            rotation_system: RotationSystem::Srs,
            initial_action_style: InitialActionStyle::None,
            gravity_ms_per_cell: 1000,
            soft_drop_gravity_ms_per_cell: 200,
            randomizer: RandomizerKind::Bag7SeamCheck,
            ready_phase_length_ms: 833,
            go_phase_length_ms: 833,
            infinite_ready_go_hold: false,
            preview_piece_count: 4,
            goal: 40,
            show_ghost: true,
        }
    }
}

impl GameConfig {
    /// Largest configurable well width.
    pub const MAX_WELL_WIDTH: u8 = 20;
    /// Largest configurable well height (hidden rows included).
    pub const MAX_WELL_HEIGHT: u8 = 25;

    /// Converts a millisecond duration into whole ticks.
    pub fn ticks(&self, ms: u32) -> u32 {
        ms / self.ms_per_tick
    }

    /// The lock delay in ticks.
    pub fn lock_delay_ticks(&self) -> u32 {
        self.ticks(self.lock_delay_ms)
    }

    /// Checks the construction bounds the engine's fixed buffers rely on.
    pub fn verify(&self) -> Result<(), ConfigError> {
        let fail = |what: &str| Err(ConfigError::InvalidOptions(what.to_string()));
        if !(4..=Self::MAX_WELL_WIDTH).contains(&self.well_width) {
            return fail("well_width must be in 4..=20");
        }
        if !(4..=Self::MAX_WELL_HEIGHT).contains(&self.well_height) {
            return fail("well_height must be in 4..=25");
        }
        if self.well_hidden >= self.well_height {
            return fail("well_hidden must be smaller than well_height");
        }
        if !(1..=PieceQueue::CAPACITY as u8).contains(&self.preview_piece_count) {
            return fail("preview_piece_count must be in 1..=5");
        }
        if self.ms_per_tick == 0 || self.ticks_per_draw_frame == 0 {
            return fail("tick timing must be nonzero");
        }
        if self.gravity_ms_per_cell == 0 || self.soft_drop_gravity_ms_per_cell == 0 {
            return fail("gravity periods must be nonzero");
        }
        Ok(())
    }

    /// Serializes every option as one `[game]` group of `key = value` lines.
    pub fn to_ini(&self) -> String {
        let mut out = String::from("[game]\n");
        let mut line = |key: &str, value: String| {
            out.push_str(key);
            out.push_str(" = ");
            out.push_str(&value);
            out.push('\n');
        };
        line(
            "seed",
            match self.seed {
                Some(seed) => seed.to_string(),
                None => "null".to_string(),
            },
        );
        line("well_width", self.well_width.to_string());
        line("well_height", self.well_height.to_string());
        line("well_hidden", self.well_hidden.to_string());
        line("ms_per_tick", self.ms_per_tick.to_string());
        line(
            "ticks_per_draw_frame",
            self.ticks_per_draw_frame.to_string(),
        );
        line("das_speed_ms", self.das_speed_ms.to_string());
        line("das_delay_ms", self.das_delay_ms.to_string());
        line("are_delay_ms", self.are_delay_ms.to_string());
        line(
            "warn_on_bad_finesse",
            self.warn_on_bad_finesse.to_string(),
        );
        line("are_cancellable", self.are_cancellable.to_string());
        line("lock_style", lock_style_name(self.lock_style).to_string());
        line("lock_delay_ms", self.lock_delay_ms.to_string());
        line("floorkick_limit", self.floorkick_limit.to_string());
        line("one_shot_soft_drop", self.one_shot_soft_drop.to_string());
        line(
            "rotation_system",
            rotation_system_name(self.rotation_system).to_string(),
        );
        line(
            "initial_action_style",
            initial_action_style_name(self.initial_action_style).to_string(),
        );
        line("gravity_ms_per_cell", self.gravity_ms_per_cell.to_string());
        line(
            "soft_drop_gravity_ms_per_cell",
            self.soft_drop_gravity_ms_per_cell.to_string(),
        );
        line(
            "randomizer",
            randomizer_name(self.randomizer).to_string(),
        );
        line(
            "ready_phase_length_ms",
            self.ready_phase_length_ms.to_string(),
        );
        line("go_phase_length_ms", self.go_phase_length_ms.to_string());
        line(
            "infinite_ready_go_hold",
            self.infinite_ready_go_hold.to_string(),
        );
        line(
            "preview_piece_count",
            self.preview_piece_count.to_string(),
        );
        line("goal", self.goal.to_string());
        line("show_ghost", self.show_ghost.to_string());
        out
    }

    /// Applies `key = value` lines from `text` on top of `self`.
    ///
    /// Keys are case-insensitive; unknown keys are malformed (a typo would
    /// otherwise silently play a different game than the file describes).
    pub fn apply_ini(&mut self, text: &str) -> Result<(), ConfigError> {
        for (index, raw) in text.lines().enumerate() {
            let number = index + 1;
            let line = match raw.find([';', '#']) {
                Some(at) => &raw[..at],
                None => raw,
            }
            .trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::MalformedLine {
                    line: number,
                    text: raw.to_string(),
                });
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();
            self.apply_one(&key, value, number)?;
        }
        Ok(())
    }

    fn apply_one(&mut self, key: &str, value: &str, line: usize) -> Result<(), ConfigError> {
        match key {
            "seed" => {
                self.seed = if value.eq_ignore_ascii_case("null") {
                    None
                } else {
                    Some(parse_number(value, line)?)
                }
            }
            "well_width" => self.well_width = parse_number(value, line)?,
            "well_height" => self.well_height = parse_number(value, line)?,
            "well_hidden" => self.well_hidden = parse_number(value, line)?,
            "ms_per_tick" => self.ms_per_tick = parse_number(value, line)?,
            "ticks_per_draw_frame" => self.ticks_per_draw_frame = parse_number(value, line)?,
            "das_speed_ms" => self.das_speed_ms = parse_number(value, line)?,
            "das_delay_ms" => self.das_delay_ms = parse_number(value, line)?,
            "are_delay_ms" => self.are_delay_ms = parse_number(value, line)?,
            "warn_on_bad_finesse" => self.warn_on_bad_finesse = parse_bool(value, line)?,
            "are_cancellable" => self.are_cancellable = parse_bool(value, line)?,
            "lock_style" => self.lock_style = parse_lock_style(value, line)?,
            "lock_delay_ms" => self.lock_delay_ms = parse_number(value, line)?,
            "floorkick_limit" => self.floorkick_limit = parse_number(value, line)?,
            "one_shot_soft_drop" => self.one_shot_soft_drop = parse_bool(value, line)?,
            "rotation_system" => self.rotation_system = parse_rotation_system(value, line)?,
            "initial_action_style" => {
                self.initial_action_style = parse_initial_action_style(value, line)?
            }
            "gravity_ms_per_cell" => self.gravity_ms_per_cell = parse_number(value, line)?,
            "soft_drop_gravity_ms_per_cell" => {
                self.soft_drop_gravity_ms_per_cell = parse_number(value, line)?
            }
            "randomizer" => self.randomizer = parse_randomizer(value, line)?,
            "ready_phase_length_ms" => self.ready_phase_length_ms = parse_number(value, line)?,
            "go_phase_length_ms" => self.go_phase_length_ms = parse_number(value, line)?,
            "infinite_ready_go_hold" => self.infinite_ready_go_hold = parse_bool(value, line)?,
            "preview_piece_count" => self.preview_piece_count = parse_number(value, line)?,
            "goal" => self.goal = parse_number(value, line)?,
            "show_ghost" => self.show_ghost = parse_bool(value, line)?,
            _ => {
                return Err(ConfigError::MalformedLine {
                    line,
                    text: key.to_string(),
                })
            }
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, line: usize) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::MalformedLine {
        line,
        text: value.to_string(),
    })
}

fn parse_bool(value: &str, line: usize) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(ConfigError::UnknownBool {
            line,
            text: value.to_string(),
        }),
    }
}

fn lock_style_name(style: LockStyle) -> &'static str {
    match style {
        LockStyle::Entry => "entry",
        LockStyle::Step => "step",
        LockStyle::Move => "move",
    }
}

fn parse_lock_style(value: &str, line: usize) -> Result<LockStyle, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "entry" => Ok(LockStyle::Entry),
        "step" => Ok(LockStyle::Step),
        "move" => Ok(LockStyle::Move),
        _ => Err(ConfigError::UnknownEnum {
            line,
            text: value.to_string(),
        }),
    }
}

fn initial_action_style_name(style: InitialActionStyle) -> &'static str {
    match style {
        InitialActionStyle::None => "none",
        InitialActionStyle::Persistent => "persistent",
        InitialActionStyle::Trigger => "trigger",
    }
}

fn parse_initial_action_style(
    value: &str,
    line: usize,
) -> Result<InitialActionStyle, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "none" => Ok(InitialActionStyle::None),
        "persistent" => Ok(InitialActionStyle::Persistent),
        "trigger" => Ok(InitialActionStyle::Trigger),
        _ => Err(ConfigError::UnknownEnum {
            line,
            text: value.to_string(),
        }),
    }
}

fn rotation_system_name(system: RotationSystem) -> &'static str {
    match system {
        RotationSystem::Srs => "srs",
        RotationSystem::Sega => "sega",
        RotationSystem::Dtet => "dtet",
        RotationSystem::Nes => "nes",
        RotationSystem::ArikaSrs => "arikasrs",
        RotationSystem::Tgm => "tgm",
        RotationSystem::Tgm3 => "tgm3",
    }
}

fn parse_rotation_system(value: &str, line: usize) -> Result<RotationSystem, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "srs" => Ok(RotationSystem::Srs),
        "sega" => Ok(RotationSystem::Sega),
        "dtet" => Ok(RotationSystem::Dtet),
        "nes" => Ok(RotationSystem::Nes),
        "arikasrs" => Ok(RotationSystem::ArikaSrs),
        "tgm" => Ok(RotationSystem::Tgm),
        "tgm3" => Ok(RotationSystem::Tgm3),
        _ => Err(ConfigError::UnknownEnum {
            line,
            text: value.to_string(),
        }),
    }
}

fn randomizer_name(kind: RandomizerKind) -> &'static str {
    match kind {
        RandomizerKind::Memoryless => "memoryless",
        RandomizerKind::Nes => "nes",
        RandomizerKind::Bag7 => "bag7",
        RandomizerKind::Bag7SeamCheck => "bag7seamcheck",
        RandomizerKind::MultiBag2 => "multibag2",
        RandomizerKind::MultiBag4 => "multibag4",
        RandomizerKind::MultiBag9 => "multibag9",
        RandomizerKind::Tgm1 => "tgm1",
        RandomizerKind::Tgm2 => "tgm2",
        RandomizerKind::Tgm3 => "tgm3",
    }
}

fn parse_randomizer(value: &str, line: usize) -> Result<RandomizerKind, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "memoryless" => Ok(RandomizerKind::Memoryless),
        "nes" => Ok(RandomizerKind::Nes),
        "bag7" => Ok(RandomizerKind::Bag7),
        "bag7seamcheck" => Ok(RandomizerKind::Bag7SeamCheck),
        "multibag2" => Ok(RandomizerKind::MultiBag2),
        "multibag4" => Ok(RandomizerKind::MultiBag4),
        "multibag9" => Ok(RandomizerKind::MultiBag9),
        "tgm1" => Ok(RandomizerKind::Tgm1),
        "tgm2" => Ok(RandomizerKind::Tgm2),
        "tgm3" => Ok(RandomizerKind::Tgm3),
        _ => Err(ConfigError::UnknownEnum {
            line,
            text: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_verify() {
        assert_eq!(GameConfig::default().verify(), Ok(()));
    }

    #[test]
    fn bounds_are_enforced() {
        let mut config = GameConfig::default();
        config.well_width = 21;
        assert!(matches!(
            config.verify(),
            Err(ConfigError::InvalidOptions(_))
        ));
        let mut config = GameConfig::default();
        config.preview_piece_count = 6;
        assert!(config.verify().is_err());
        let mut config = GameConfig::default();
        config.well_hidden = 22;
        assert!(config.verify().is_err());
    }

    #[test]
    fn ini_round_trip_is_exact() {
        let mut config = GameConfig::default();
        config.seed = Some(12345);
        config.goal = 10;
        config.rotation_system = RotationSystem::Dtet;
        config.randomizer = RandomizerKind::Tgm2;
        config.lock_style = LockStyle::Entry;
        config.are_cancellable = true;
        let text = config.to_ini();
        let mut read_back = GameConfig::default();
        read_back.apply_ini(&text).unwrap();
        assert_eq!(read_back, config);
    }

    #[test]
    fn parsing_is_case_insensitive_and_tolerates_noise() {
        let mut config = GameConfig::default();
        config
            .apply_ini(
                "; a comment\n\
                 [Game]\n\
                 Rotation_System = ArikaSRS  # trailing comment\n\
                 WARN_ON_BAD_FINESSE = Yes\n\
                 seed = NULL\n\
                 \n\
                 goal = 15\n",
            )
            .unwrap();
        assert_eq!(config.rotation_system, RotationSystem::ArikaSrs);
        assert!(config.warn_on_bad_finesse);
        assert_eq!(config.seed, None);
        assert_eq!(config.goal, 15);
    }

    #[test]
    fn errors_carry_line_context() {
        let mut config = GameConfig::default();
        assert_eq!(
            config.apply_ini("goal = 5\nnonsense line\n"),
            Err(ConfigError::MalformedLine {
                line: 2,
                text: "nonsense line".to_string(),
            })
        );
        assert_eq!(
            config.apply_ini("show_ghost = perhaps\n"),
            Err(ConfigError::UnknownBool {
                line: 1,
                text: "perhaps".to_string(),
            })
        );
        assert_eq!(
            config.apply_ini("randomizer = bag8\n"),
            Err(ConfigError::UnknownEnum {
                line: 1,
                text: "bag8".to_string(),
            })
        );
    }
}
