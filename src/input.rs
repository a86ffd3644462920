/*!
Input interpretation.

The host hands the engine one [`VirtualKeySet`] per tick — a bitmask of which
virtual keys are currently held. This module turns that, plus the engine's
input memory (previous key set and the DAS charge counter), into one
[`Actions`] record: how far to move, whether to rotate, how much gravity to
apply, and the edge-triggered extras.

The key bit values are the replay wire format and must not be renumbered.
*/

use crate::{
    config::GameConfig,
    fixed_point::Uq8_24,
    support::{BitFlag, EnumSet},
    Rotation,
};

/// A virtual input key. The discriminants are the wire bit values.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum VirtualKey {
    /// Hard drop.
    Up = 0x01,
    /// Soft drop.
    Down = 0x02,
    /// Shift left (tap, then DAS).
    Left = 0x04,
    /// Shift right (tap, then DAS).
    Right = 0x08,
    /// Rotate a quarter turn anticlockwise.
    RotateLeft = 0x10,
    /// Rotate a quarter turn clockwise.
    RotateRight = 0x20,
    /// Rotate a half turn.
    RotateHalf = 0x40,
    /// Stash/unstash the piece in play.
    Hold = 0x80,
    /// Menu/pause key; carried in replays, ignored by the engine.
    Start = 0x100,
    /// Abandon the round and start over.
    Restart = 0x200,
    /// Abandon the round and exit.
    Quit = 0x400,
}

impl BitFlag for VirtualKey {
    fn bit(self) -> u32 {
        self as u32
    }
}

/// The set of virtual keys held during one tick.
pub type VirtualKeySet = EnumSet<VirtualKey>;

/// One-tick side effects that are not plain movement or rotation.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum Extra {
    /// Drop to the hard-drop row and lock now.
    HardDrop = 0x01,
    /// Lock wherever the piece ends up this tick.
    Lock = 0x02,
    /// Swap with the hold slot.
    Hold = 0x04,
    /// Halt the state machine in [`crate::Phase::Quit`].
    Quit = 0x08,
    /// Halt the state machine in [`crate::Phase::Restart`].
    Restart = 0x10,
}

impl BitFlag for Extra {
    fn bit(self) -> u32 {
        self as u32
    }
}

/// Set of [`Extra`] effects for one tick.
pub type ExtraSet = EnumSet<Extra>;

/// What the piece should do this tick, derived from the key set.
#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub struct Actions {
    /// Signed horizontal movement in cells. `-well_width` encodes an
    /// instant charged move to the wall.
    pub movement: i32,
    /// At most one rotation fires per tick.
    pub rotation: Option<Rotation>,
    /// Cells to fall this tick, in 8.24 fixed point.
    pub gravity: Uq8_24,
    /// Edge-triggered side effects.
    pub extras: ExtraSet,
    /// Keys newly pressed this tick (edge set), for ARE cancelling.
    pub pressed: VirtualKeySet,
}

/// The engine's per-tick input memory.
///
/// `das_counter` charges negative while Left is held and positive while
/// Right is held; past the configured delay it fires repeat movement at the
/// configured rate (or straight to the wall at rate zero).
#[derive(Eq, PartialEq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InputState {
    das_counter: i32,
    last_keys: VirtualKeySet,
}

impl InputState {
    /// Keys held on the previous tick (used for persistent initial actions).
    pub fn held(&self) -> VirtualKeySet {
        self.last_keys
    }

    /// Current DAS charge, for debugging frontends.
    pub fn das_counter(&self) -> i32 {
        self.das_counter
    }

    /// Converts this tick's key set into an [`Actions`] record, updating the
    /// DAS counter and key memory.
    ///
    /// This runs every tick regardless of game phase; were the key memory
    /// allowed to stall during line clears, keys still held on phase re-entry
    /// would fire as phantom edges.
    pub fn interpret(&mut self, keys: VirtualKeySet, config: &GameConfig) -> Actions {
        let pressed = keys & !self.last_keys;
        let movement = self.horizontal_movement(keys, config);

        let soft_drop = if config.one_shot_soft_drop {
            pressed.contains(VirtualKey::Down)
        } else {
            keys.contains(VirtualKey::Down)
        };
        let mut gravity = if soft_drop {
            Uq8_24::from_ratio(config.ms_per_tick, config.soft_drop_gravity_ms_per_cell)
        } else {
            Uq8_24::from_ratio(config.ms_per_tick, config.gravity_ms_per_cell)
        };

        let mut rotation = None;
        if pressed.contains(VirtualKey::RotateLeft) {
            rotation = Some(Rotation::AntiClockwise);
        }
        if pressed.contains(VirtualKey::RotateRight) {
            rotation = Some(Rotation::Clockwise);
        }
        if pressed.contains(VirtualKey::RotateHalf) {
            rotation = Some(Rotation::Half);
        }

        let mut extras = ExtraSet::EMPTY;
        if pressed.contains(VirtualKey::Hold) {
            extras.insert(Extra::Hold);
        }
        if pressed.contains(VirtualKey::Up) {
            // A hard drop is "all the gravity at once" plus an immediate lock.
            gravity = Uq8_24::from_parts(config.well_height, 0);
            extras.insert(Extra::HardDrop);
            extras.insert(Extra::Lock);
        }
        if pressed.contains(VirtualKey::Quit) {
            extras.insert(Extra::Quit);
        }
        if pressed.contains(VirtualKey::Restart) {
            extras.insert(Extra::Restart);
        }

        self.last_keys = keys;
        Actions {
            movement,
            rotation,
            gravity,
            extras,
            pressed,
        }
    }

    fn horizontal_movement(&mut self, keys: VirtualKeySet, config: &GameConfig) -> i32 {
        let das_delay = config.ticks(config.das_delay_ms) as i32;
        let das_speed = config.ticks(config.das_speed_ms) as i32;
        let left = keys.contains(VirtualKey::Left);
        let right = keys.contains(VirtualKey::Right);
        if left && !right {
            if self.das_counter >= 0 {
                // Fresh press (or direction flip): one tap, start charging.
                self.das_counter = -1;
                -1
            } else if self.das_counter > -das_delay {
                self.das_counter -= 1;
                0
            } else if das_speed != 0 {
                // Charged: fire, then wind the counter back one repeat period.
                self.das_counter += das_speed - 1;
                -1
            } else {
                // Rate zero: straight to the wall every tick while charged.
                -i32::from(config.well_width)
            }
        } else if right && !left {
            if self.das_counter <= 0 {
                self.das_counter = 1;
                1
            } else if self.das_counter < das_delay {
                self.das_counter += 1;
                0
            } else if das_speed != 0 {
                self.das_counter -= das_speed - 1;
                1
            } else {
                i32::from(config.well_width)
            }
        } else {
            self.das_counter = 0;
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyset(keys: &[VirtualKey]) -> VirtualKeySet {
        let mut set = VirtualKeySet::EMPTY;
        for &key in keys {
            set.insert(key);
        }
        set
    }

    #[test]
    fn tap_moves_once_then_charges() {
        let config = GameConfig::default();
        let mut input = InputState::default();
        let left = keyset(&[VirtualKey::Left]);
        assert_eq!(input.interpret(left, &config).movement, -1);
        let charge_ticks = config.ticks(config.das_delay_ms) - 1;
        for _ in 0..charge_ticks {
            assert_eq!(input.interpret(left, &config).movement, 0);
        }
        // Threshold tick: rate zero sends the piece to the wall.
        assert_eq!(
            input.interpret(left, &config).movement,
            -i32::from(config.well_width)
        );
    }

    #[test]
    fn release_resets_the_charge() {
        let config = GameConfig::default();
        let mut input = InputState::default();
        let left = keyset(&[VirtualKey::Left]);
        for _ in 0..5 {
            input.interpret(left, &config);
        }
        input.interpret(VirtualKeySet::EMPTY, &config);
        assert_eq!(input.das_counter(), 0);
        // Next press is a fresh tap again.
        assert_eq!(input.interpret(left, &config).movement, -1);
    }

    #[test]
    fn nonzero_rate_repeats_at_the_configured_period() {
        let mut config = GameConfig::default();
        config.das_speed_ms = 48; // 3 ticks at 16 ms per tick
        let mut input = InputState::default();
        let right = keyset(&[VirtualKey::Right]);
        let mut total = 0;
        let warmup = config.ticks(config.das_delay_ms) + 1;
        for _ in 0..warmup {
            total += input.interpret(right, &config).movement;
        }
        // Tap plus first charged fire.
        assert_eq!(total, 2);
        let mut fired = 0;
        for _ in 0..9 {
            fired += input.interpret(right, &config).movement;
        }
        assert_eq!(fired, 3, "one move per 3-tick period");
    }

    #[test]
    fn rotation_fires_on_edges_only() {
        let config = GameConfig::default();
        let mut input = InputState::default();
        let rotate = keyset(&[VirtualKey::RotateRight]);
        assert_eq!(
            input.interpret(rotate, &config).rotation,
            Some(Rotation::Clockwise)
        );
        assert_eq!(input.interpret(rotate, &config).rotation, None);
        input.interpret(VirtualKeySet::EMPTY, &config);
        assert_eq!(
            input.interpret(rotate, &config).rotation,
            Some(Rotation::Clockwise)
        );
    }

    #[test]
    fn hard_drop_is_full_well_gravity_plus_lock() {
        let config = GameConfig::default();
        let mut input = InputState::default();
        let actions = input.interpret(keyset(&[VirtualKey::Up]), &config);
        assert_eq!(actions.gravity.integer(), config.well_height);
        assert!(actions.extras.contains(Extra::HardDrop));
        assert!(actions.extras.contains(Extra::Lock));
    }

    #[test]
    fn soft_drop_replaces_gravity() {
        let config = GameConfig::default();
        let mut input = InputState::default();
        let normal = input.interpret(VirtualKeySet::EMPTY, &config).gravity;
        let soft = input.interpret(keyset(&[VirtualKey::Down]), &config).gravity;
        assert_eq!(
            soft,
            Uq8_24::from_ratio(config.ms_per_tick, config.soft_drop_gravity_ms_per_cell)
        );
        assert!(soft > normal);
    }

    #[test]
    fn one_shot_soft_drop_only_fires_on_the_edge() {
        let mut config = GameConfig::default();
        config.one_shot_soft_drop = true;
        let mut input = InputState::default();
        let down = keyset(&[VirtualKey::Down]);
        let edge = input.interpret(down, &config).gravity;
        let held = input.interpret(down, &config).gravity;
        assert!(edge > held);
        assert_eq!(
            held,
            Uq8_24::from_ratio(config.ms_per_tick, config.gravity_ms_per_cell)
        );
    }
}
