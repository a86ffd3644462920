/*!
Replay recording and playback.

A replay is everything needed to reproduce a game bit-exactly: the full
option set (seed included) and the key log, stored as edges only — one
`(tick, keys)` record whenever the held key set changes. Byte layout:

```text
"ZS1\n" || options text || 0xFF ×8 || (tick: u32 LE, keys: u32 LE) ×n
```

The engine being a pure function of (options, seed, key stream) is what makes
this sufficient; nothing else is stored.
*/

use std::io::{self, Write};

use thiserror::Error;

use crate::{config::ConfigError, GameConfig, VirtualKeySet};

/// Leading magic of every replay file.
pub const REPLAY_MAGIC: &[u8; 4] = b"ZS1\n";
/// Separator between the options text and the binary input stream.
const SENTINEL: [u8; 8] = [0xFF; 8];

/// One input edge: the key set `keys` was first held at tick `tick`.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReplayInput {
    /// Tick at which the key set changed.
    pub tick: u32,
    /// The key set held from this tick on.
    pub keys: VirtualKeySet,
}

/// A complete recorded game.
#[derive(Eq, PartialEq, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Replay {
    /// The full option set, seed included.
    pub config: GameConfig,
    /// The key edge log, in tick order.
    pub inputs: Vec<ReplayInput>,
}

/// Why a byte stream is not a usable replay.
#[derive(Error, Debug)]
pub enum ReplayError {
    /// The stream does not start with [`REPLAY_MAGIC`].
    #[error("not a replay: bad header")]
    InvalidHeader,
    /// The options/inputs sentinel never appears.
    #[error("no input stream found")]
    NoInputsFound,
    /// The input stream is not a whole number of 8-byte records.
    #[error("input stream length {0} is not a multiple of 8")]
    InvalidInputLength(usize),
    /// The embedded options text failed to parse.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The underlying reader or writer failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Replay {
    /// Serializes the replay.
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(REPLAY_MAGIC)?;
        writer.write_all(self.config.to_ini().as_bytes())?;
        writer.write_all(&SENTINEL)?;
        for input in &self.inputs {
            writer.write_all(&input.tick.to_le_bytes())?;
            writer.write_all(&input.keys.bits().to_le_bytes())?;
        }
        Ok(())
    }

    /// Serializes the replay into a fresh byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        // SAFETY: writing to a Vec cannot fail.
        self.write(&mut bytes).unwrap();
        bytes
    }

    /// Parses a replay from bytes.
    pub fn read(bytes: &[u8]) -> Result<Replay, ReplayError> {
        let body = bytes
            .strip_prefix(REPLAY_MAGIC)
            .ok_or(ReplayError::InvalidHeader)?;
        let sentinel_at = body
            .windows(SENTINEL.len())
            .position(|window| window == SENTINEL)
            .ok_or_else(|| {
                log::debug!("replay rejected: no sentinel in {} bytes", bytes.len());
                ReplayError::NoInputsFound
            })?;
        let mut config = GameConfig::default();
        config.apply_ini(&String::from_utf8_lossy(&body[..sentinel_at]))?;
        let stream = &body[sentinel_at + SENTINEL.len()..];
        if stream.len() % 8 != 0 {
            return Err(ReplayError::InvalidInputLength(stream.len()));
        }
        let inputs = stream
            .chunks_exact(8)
            .map(|record| ReplayInput {
                // SAFETY: chunks_exact(8) yields 8-byte records.
                tick: u32::from_le_bytes(record[..4].try_into().unwrap()),
                keys: VirtualKeySet::from_bits(u32::from_le_bytes(
                    record[4..].try_into().unwrap(),
                )),
            })
            .collect();
        Ok(Replay { config, inputs })
    }

    /// The key set to feed the engine at `tick`, given the edge log.
    ///
    /// Useful for playback hosts: keys persist between edges.
    pub fn keys_at(&self, tick: u32) -> VirtualKeySet {
        let mut keys = VirtualKeySet::EMPTY;
        for input in &self.inputs {
            if input.tick > tick {
                break;
            }
            keys = input.keys;
        }
        keys
    }
}

/// Captures the edge log of a live game.
///
/// Feed it the same key set handed to [`crate::Game::tick`] every tick; only
/// changes are stored.
#[derive(Eq, PartialEq, Clone, Default, Debug)]
pub struct ReplayRecorder {
    inputs: Vec<ReplayInput>,
    last: VirtualKeySet,
}

impl ReplayRecorder {
    /// An empty recorder (no keys held, nothing logged).
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `keys` at `tick` if they differ from the previous tick.
    pub fn record(&mut self, tick: u32, keys: VirtualKeySet) {
        if keys != self.last {
            self.inputs.push(ReplayInput { tick, keys });
            self.last = keys;
        }
    }

    /// Packages the log with the options of the finished game.
    ///
    /// Pass [`crate::Game::replay_config`] so the resolved seed is stored,
    /// not the possibly-absent configured one.
    pub fn into_replay(self, config: GameConfig) -> Replay {
        Replay {
            config,
            inputs: self.inputs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VirtualKey;

    #[test]
    fn header_is_checked() {
        assert!(matches!(
            Replay::read(b"XS1\nwhatever"),
            Err(ReplayError::InvalidHeader)
        ));
    }

    #[test]
    fn missing_sentinel_is_no_inputs() {
        let mut bytes = REPLAY_MAGIC.to_vec();
        bytes.extend_from_slice(b"goal = 40\n");
        assert!(matches!(
            Replay::read(&bytes),
            Err(ReplayError::NoInputsFound)
        ));
    }

    #[test]
    fn ragged_input_stream_is_rejected() {
        let mut config = GameConfig::default();
        config.seed = Some(1);
        let replay = Replay {
            config,
            inputs: vec![ReplayInput {
                tick: 3,
                keys: VirtualKeySet::from_bits(0x4),
            }],
        };
        let mut bytes = replay.to_bytes();
        bytes.pop();
        assert!(matches!(
            Replay::read(&bytes),
            Err(ReplayError::InvalidInputLength(7))
        ));
    }

    #[test]
    fn recorder_stores_edges_only() {
        let mut recorder = ReplayRecorder::new();
        let mut left = VirtualKeySet::EMPTY;
        left.insert(VirtualKey::Left);
        recorder.record(0, VirtualKeySet::EMPTY);
        recorder.record(1, left);
        recorder.record(2, left);
        recorder.record(3, left);
        recorder.record(4, VirtualKeySet::EMPTY);
        let replay = recorder.into_replay(GameConfig::default());
        assert_eq!(
            replay.inputs,
            vec![
                ReplayInput { tick: 1, keys: left },
                ReplayInput {
                    tick: 4,
                    keys: VirtualKeySet::EMPTY
                },
            ]
        );
    }

    #[test]
    fn keys_persist_between_edges() {
        let left = {
            let mut set = VirtualKeySet::EMPTY;
            set.insert(VirtualKey::Left);
            set
        };
        let replay = Replay {
            config: GameConfig::default(),
            inputs: vec![
                ReplayInput { tick: 2, keys: left },
                ReplayInput {
                    tick: 5,
                    keys: VirtualKeySet::EMPTY,
                },
            ],
        };
        assert_eq!(replay.keys_at(0), VirtualKeySet::EMPTY);
        assert_eq!(replay.keys_at(2), left);
        assert_eq!(replay.keys_at(4), left);
        assert_eq!(replay.keys_at(5), VirtualKeySet::EMPTY);
    }
}
