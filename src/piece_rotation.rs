/*!
This module handles rotation of the piece in play.

Each rotation system is a pair of tables: block offsets per (piece, theta)
inside a 4×4 bounding box (origin top-left, y growing downward), and an
ordered kick list tried until the rotated piece fits. The tables are replay
state: two builds disagreeing on a single kick produce diverging games from
the same key log, so the entries below are data, not code to refactor.
*/

use crate::{config::GameConfig, Piece, PieceId, Rotation, Theta, Well};

/// Handles the logic of how to rotate a piece in play.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RotationSystem {
    /// The modern standard with its full five-deep kick tables.
    Srs,
    /// The arcade ancestor: low block positions, no kicks at all.
    Sega,
    /// Symmetric six-kick system, lenient in both directions.
    Dtet,
    /// The kick-less console classic (right-handed).
    Nes,
    /// Standard offsets with the modified I-piece kick tables.
    ArikaSrs,
    /// Sega offsets plus the right-then-up kick, guarded by the
    /// centre-column exception.
    Tgm,
    /// [`RotationSystem::Tgm`] plus the deeper I floorkick.
    Tgm3,
}

impl RotationSystem {
    /// Returns the four block offsets of `id` oriented by `theta`.
    pub fn blocks(&self, id: PieceId, theta: Theta) -> [(u8, u8); 4] {
        match self {
            Self::Srs | Self::ArikaSrs => srs_blocks(id, theta),
            Self::Sega | Self::Dtet | Self::Tgm | Self::Tgm3 => sega_blocks(id, theta),
            Self::Nes => nes_blocks(id, theta),
        }
    }

    /// Whether `id` at `(x, y, theta)` overlaps the well bounds or stack.
    pub fn collides(&self, well: &Well, id: PieceId, x: i8, y: i8, theta: Theta) -> bool {
        self.blocks(id, theta)
            .iter()
            .any(|&(dx, dy)| well.is_occupied(x + dx as i8, y + dy as i8))
    }

    /// Tries to rotate `piece`, walking the kick list in order.
    ///
    /// On success the piece is moved (its hard-drop row refreshed, its
    /// floorkick accounting updated for upward kicks) and `true` is
    /// returned. On failure the piece is untouched.
    pub fn rotate(
        &self,
        well: &Well,
        piece: &mut Piece,
        rotation: Rotation,
        config: &GameConfig,
    ) -> bool {
        let new_theta = piece.theta.rotated(rotation);
        let kicks: &[(i8, i8)] = match rotation {
            // Half rotations get no help anywhere.
            Rotation::Half => &[(0, 0)],
            _ => self.kicks(piece.id, piece.theta, rotation),
        };
        let suppress_kicks = match self {
            Self::Tgm | Self::Tgm3 => tgm_kick_pinned(well, piece),
            _ => false,
        };
        for &(dx, dy) in kicks {
            if suppress_kicks && (dx, dy) != (0, 0) {
                continue;
            }
            let (x, y) = (piece.x + dx, piece.y + dy);
            if !self.collides(well, piece.id, x, y, new_theta) {
                piece.handle_floorkick(dy < 0, config);
                piece.relocate(well, *self, x, y, new_theta);
                return true;
            }
        }
        false
    }

    #[rustfmt::skip]
    fn kicks(&self, id: PieceId, theta: Theta, rotation: Rotation) -> &'static [(i8, i8)] {
        use Theta::*;
        let clockwise = rotation == Rotation::Clockwise;
        match self {
            Self::Sega | Self::Nes => &[(0, 0)],
            Self::Tgm => &[(0, 0), (1, 0), (0, -1)],
            Self::Tgm3 => match id {
                // Ti lets the flat I climb two cells out of its slot.
                PieceId::I => &[(0, 0), (1, 0), (0, -1), (0, -2)],
                _ => &[(0, 0), (1, 0), (0, -1)],
            },
            Self::Dtet => {
                if clockwise { &[(0, 0), ( 1, 0), (-1, 0), (0, -1), ( 1, -1), (-1, -1)] }
                else         { &[(0, 0), (-1, 0), ( 1, 0), (0, -1), (-1, -1), ( 1, -1)] }
            }
            Self::Srs | Self::ArikaSrs => match id {
                PieceId::O => &[(0, 0)],
                PieceId::I if *self == Self::ArikaSrs => match (theta, clockwise) {
                    (R0,   true)  => &[(0, 0), (-2, 0), ( 1, 0), ( 1, -2), (-2,  1)],
                    (R90,  true)  => &[(0, 0), (-1, 0), ( 2, 0), (-1, -2), ( 2,  1)],
                    (R180, true)  => &[(0, 0), ( 2, 0), (-1, 0), ( 2, -1), (-1,  1)],
                    (R270, true)  => &[(0, 0), (-2, 0), ( 1, 0), (-2, -1), ( 1,  2)],
                    (R0,   false) => &[(0, 0), ( 2, 0), (-1, 0), (-1, -2), ( 2,  1)],
                    (R90,  false) => &[(0, 0), ( 2, 0), (-1, 0), ( 2, -1), (-1,  2)],
                    (R180, false) => &[(0, 0), (-2, 0), ( 1, 0), (-2, -1), ( 1,  1)],
                    (R270, false) => &[(0, 0), ( 1, 0), (-2, 0), ( 1, -2), (-2,  1)],
                },
                PieceId::I => match (theta, clockwise) {
                    (R0,   true)  => &[(0, 0), (-2, 0), ( 1, 0), (-2,  1), ( 1, -2)],
                    (R90,  true)  => &[(0, 0), (-1, 0), ( 2, 0), (-1, -2), ( 2,  1)],
                    (R180, true)  => &[(0, 0), ( 2, 0), (-1, 0), ( 2, -1), (-1,  2)],
                    (R270, true)  => &[(0, 0), ( 1, 0), (-2, 0), ( 1,  2), (-2, -1)],
                    (R0,   false) => &[(0, 0), (-1, 0), ( 2, 0), (-1, -2), ( 2,  1)],
                    (R90,  false) => &[(0, 0), ( 2, 0), (-1, 0), ( 2, -1), (-1,  2)],
                    (R180, false) => &[(0, 0), ( 1, 0), (-2, 0), ( 1,  2), (-2, -1)],
                    (R270, false) => &[(0, 0), (-2, 0), ( 1, 0), (-2,  1), ( 1, -2)],
                },
                _ => match (theta, clockwise) {
                    (R0,   true)  => &[(0, 0), (-1, 0), (-1, -1), (0,  2), (-1,  2)],
                    (R90,  true)  => &[(0, 0), ( 1, 0), ( 1,  1), (0, -2), ( 1, -2)],
                    (R180, true)  => &[(0, 0), ( 1, 0), ( 1, -1), (0,  2), ( 1,  2)],
                    (R270, true)  => &[(0, 0), (-1, 0), (-1,  1), (0, -2), (-1, -2)],
                    (R0,   false) => &[(0, 0), ( 1, 0), ( 1, -1), (0,  2), ( 1,  2)],
                    (R90,  false) => &[(0, 0), ( 1, 0), ( 1,  1), (0, -2), ( 1, -2)],
                    (R180, false) => &[(0, 0), (-1, 0), (-1, -1), (0,  2), (-1,  2)],
                    (R270, false) => &[(0, 0), (-1, 0), (-1,  1), (0, -2), (-1, -2)],
                },
            },
        }
    }
}

/// The arcade pass-through guard: a J, L or T lying flat may not kick while
/// any cell of its centre column is occupied, otherwise a kick would let it
/// squeeze sideways through a one-cell gap.
fn tgm_kick_pinned(well: &Well, piece: &Piece) -> bool {
    match (piece.id, piece.theta) {
        (PieceId::J | PieceId::L | PieceId::T, Theta::R0 | Theta::R180) => {
            let cx = piece.x + 1;
            (0..3).any(|dy| well.is_occupied(cx, piece.y + dy))
        }
        _ => false,
    }
}

#[rustfmt::skip]
fn srs_blocks(id: PieceId, theta: Theta) -> [(u8, u8); 4] {
    use Theta::*;
    match id {
        PieceId::O => [(1, 0), (2, 0), (1, 1), (2, 1)], // ⠶
        PieceId::I => match theta {
            R0   => [(0, 1), (1, 1), (2, 1), (3, 1)], // ▄▄▄▄
            R90  => [(2, 0), (2, 1), (2, 2), (2, 3)], // ⡇
            R180 => [(0, 2), (1, 2), (2, 2), (3, 2)],
            R270 => [(1, 0), (1, 1), (1, 2), (1, 3)],
        },
        PieceId::J => match theta {
            R0   => [(0, 0), (0, 1), (1, 1), (2, 1)], // █▄▄
            R90  => [(1, 0), (2, 0), (1, 1), (1, 2)],
            R180 => [(0, 1), (1, 1), (2, 1), (2, 2)],
            R270 => [(1, 0), (1, 1), (0, 2), (1, 2)],
        },
        PieceId::L => match theta {
            R0   => [(2, 0), (0, 1), (1, 1), (2, 1)], // ▄▄█
            R90  => [(1, 0), (1, 1), (1, 2), (2, 2)],
            R180 => [(0, 1), (1, 1), (2, 1), (0, 2)],
            R270 => [(0, 0), (1, 0), (1, 1), (1, 2)],
        },
        PieceId::S => match theta {
            R0   => [(1, 0), (2, 0), (0, 1), (1, 1)], // ▄█▀
            R90  => [(1, 0), (1, 1), (2, 1), (2, 2)],
            R180 => [(1, 1), (2, 1), (0, 2), (1, 2)],
            R270 => [(0, 0), (0, 1), (1, 1), (1, 2)],
        },
        PieceId::T => match theta {
            R0   => [(1, 0), (0, 1), (1, 1), (2, 1)], // ▄█▄
            R90  => [(1, 0), (1, 1), (2, 1), (1, 2)],
            R180 => [(0, 1), (1, 1), (2, 1), (1, 2)],
            R270 => [(1, 0), (0, 1), (1, 1), (1, 2)],
        },
        PieceId::Z => match theta {
            R0   => [(0, 0), (1, 0), (1, 1), (2, 1)], // ▀█▄
            R90  => [(2, 0), (1, 1), (2, 1), (1, 2)],
            R180 => [(0, 1), (1, 1), (1, 2), (2, 2)],
            R270 => [(1, 0), (0, 1), (1, 1), (0, 2)],
        },
    }
}

#[rustfmt::skip]
fn sega_blocks(id: PieceId, theta: Theta) -> [(u8, u8); 4] {
    use Theta::*;
    match id {
        PieceId::O => [(1, 1), (2, 1), (1, 2), (2, 2)],
        PieceId::I => match theta {
            R0 | R180 => [(0, 2), (1, 2), (2, 2), (3, 2)],
            R90 | R270 => [(2, 0), (2, 1), (2, 2), (2, 3)],
        },
        PieceId::S => match theta {
            R0 | R180 => [(1, 1), (2, 1), (0, 2), (1, 2)],
            R90 | R270 => [(1, 0), (1, 1), (2, 1), (2, 2)],
        },
        PieceId::Z => match theta {
            R0 | R180 => [(0, 1), (1, 1), (1, 2), (2, 2)],
            R90 | R270 => [(2, 0), (1, 1), (2, 1), (1, 2)],
        },
        PieceId::T => match theta {
            R0   => [(0, 1), (1, 1), (2, 1), (1, 2)], // flat on top, nub below
            R90  => [(1, 0), (0, 1), (1, 1), (1, 2)],
            R180 => [(1, 1), (0, 2), (1, 2), (2, 2)],
            R270 => [(1, 0), (1, 1), (2, 1), (1, 2)],
        },
        PieceId::J => match theta {
            R0   => [(0, 1), (1, 1), (2, 1), (2, 2)],
            R90  => [(1, 0), (1, 1), (0, 2), (1, 2)],
            R180 => [(0, 1), (0, 2), (1, 2), (2, 2)],
            R270 => [(1, 0), (2, 0), (1, 1), (1, 2)],
        },
        PieceId::L => match theta {
            R0   => [(0, 1), (1, 1), (2, 1), (0, 2)],
            R90  => [(0, 0), (1, 0), (1, 1), (1, 2)],
            R180 => [(2, 1), (0, 2), (1, 2), (2, 2)],
            R270 => [(1, 0), (1, 1), (1, 2), (2, 2)],
        },
    }
}

/// The console tables are the Sega ones with the rotation sense of the
/// three-state pieces reversed.
fn nes_blocks(id: PieceId, theta: Theta) -> [(u8, u8); 4] {
    use Theta::*;
    let mirrored = match id {
        PieceId::J | PieceId::L | PieceId::T => match theta {
            R0 => R0,
            R90 => R270,
            R180 => R180,
            R270 => R90,
        },
        _ => theta,
    };
    sega_blocks(id, mirrored)
}
