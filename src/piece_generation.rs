/*!
This module handles generation of the infinite piece sequence.

Every variant owns its full state, including its own [`SmallPrng`], so a
generator is a pure function of the seed it was built from. Replays depend on
that: the byte-level roll sequence of each variant is part of the engine's
compatibility contract and must not be "improved".
*/

use crate::{config::RandomizerKind, prng::SmallPrng, PieceId};

/// Pieces a freshly started game must not open with (the classic first-piece
/// policy shared by the bag and history randomizers).
const SNAKE_OR_SQUARE: [PieceId; 3] = [PieceId::S, PieceId::Z, PieceId::O];

/// Handles the logic of which piece comes next.
#[derive(Eq, PartialEq, Clone, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PieceGenerator {
    /// Uniform rolls with no memory at all.
    Memoryless { prng: SmallPrng },
    /// The console classic: one biased reroll away from uniform.
    Nes {
        prng: SmallPrng,
        last: Option<PieceId>,
    },
    /// Shuffled single bag, optionally emitting only the first `cycle_len`
    /// pieces per shuffle, optionally repairing repeats across the seam.
    Bag {
        prng: SmallPrng,
        bag: [PieceId; 7],
        index: usize,
        cycle_len: usize,
        check_seam: bool,
        last: Option<PieceId>,
    },
    /// A pool of `multiplicity` copies of each piece, reshuffled when empty.
    MultiBag {
        prng: SmallPrng,
        pool: [PieceId; 63],
        pool_len: usize,
        index: usize,
    },
    /// The arcade 4-history randomizer (two generations differ only in the
    /// preloaded history and the number of rerolls).
    TgmHistory {
        prng: SmallPrng,
        history: [PieceId; 4],
        head: usize,
        rolls: u32,
        started: bool,
    },
    /// The third-generation arcade randomizer: 4-history plus a 35-slot bag
    /// that a drought queue continually reseeds with the longest-unseen piece.
    Tgm3 {
        prng: SmallPrng,
        history: [PieceId; 4],
        head: usize,
        bag: [PieceId; 35],
        drought: [PieceId; 7],
        seen: u8,
        started: bool,
    },
}

impl PieceGenerator {
    /// Builds the generator the given config kind names.
    pub fn new(kind: RandomizerKind, seed: u32) -> Self {
        match kind {
            RandomizerKind::Memoryless => Self::memoryless(seed),
            RandomizerKind::Nes => Self::nes(seed),
            RandomizerKind::Bag7 => Self::bag(seed, 7, false),
            RandomizerKind::Bag7SeamCheck => Self::bag(seed, 7, true),
            RandomizerKind::MultiBag2 => Self::multi_bag(seed, 2),
            RandomizerKind::MultiBag4 => Self::multi_bag(seed, 4),
            RandomizerKind::MultiBag9 => Self::multi_bag(seed, 9),
            RandomizerKind::Tgm1 => Self::tgm(seed, [PieceId::Z; 4], 4),
            RandomizerKind::Tgm2 => {
                Self::tgm(seed, [PieceId::Z, PieceId::S, PieceId::S, PieceId::Z], 6)
            }
            RandomizerKind::Tgm3 => Self::tgm3(seed),
        }
    }

    /// Uniform rolls with no memory.
    pub fn memoryless(seed: u32) -> Self {
        Self::Memoryless {
            prng: SmallPrng::new(seed),
        }
    }

    /// The console randomizer with its single repeat reroll.
    pub fn nes(seed: u32) -> Self {
        Self::Nes {
            prng: SmallPrng::new(seed),
            last: None,
        }
    }

    /// `cycle_len` pieces are emitted per shuffle, `1..=7`.
    pub fn bag(seed: u32, cycle_len: usize, check_seam: bool) -> Self {
        let mut prng = SmallPrng::new(seed);
        let mut bag = PieceId::ALL;
        shuffle_for_opening(&mut prng, &mut bag);
        Self::Bag {
            prng,
            bag,
            index: 0,
            cycle_len: cycle_len.clamp(1, 7),
            check_seam,
            last: None,
        }
    }

    /// `multiplicity` copies of each piece per pool, `1..=9`.
    pub fn multi_bag(seed: u32, multiplicity: usize) -> Self {
        let mut prng = SmallPrng::new(seed);
        let multiplicity = multiplicity.clamp(1, 9);
        let pool_len = multiplicity * 7;
        let mut pool = [PieceId::I; 63];
        for (i, slot) in pool.iter_mut().take(pool_len).enumerate() {
            // SAFETY: i % 7 <= 6.
            *slot = PieceId::try_from((i % 7) as u32).unwrap();
        }
        shuffle_for_opening(&mut prng, &mut pool[..pool_len]);
        Self::MultiBag {
            prng,
            pool,
            pool_len,
            index: 0,
        }
    }

    /// An arcade history randomizer with the given preload and reroll budget.
    pub fn tgm(seed: u32, history: [PieceId; 4], rolls: u32) -> Self {
        Self::TgmHistory {
            prng: SmallPrng::new(seed),
            history,
            head: 0,
            rolls,
            started: false,
        }
    }

    /// The third-generation arcade randomizer with its drought machinery.
    pub fn tgm3(seed: u32) -> Self {
        let mut bag = [PieceId::I; 35];
        for (i, slot) in bag.iter_mut().enumerate() {
            // SAFETY: i % 7 <= 6.
            *slot = PieceId::try_from((i % 7) as u32).unwrap();
        }
        Self::Tgm3 {
            prng: SmallPrng::new(seed),
            history: [PieceId::S, PieceId::Z, PieceId::S, PieceId::Z],
            head: 0,
            bag,
            drought: [
                PieceId::J,
                PieceId::I,
                PieceId::Z,
                PieceId::L,
                PieceId::O,
                PieceId::T,
                PieceId::S,
            ],
            seen: 0,
            started: false,
        }
    }

    /// Produces the next piece of the sequence.
    pub fn next(&mut self) -> PieceId {
        match self {
            Self::Memoryless { prng } => {
                // SAFETY: roll <= 6.
                PieceId::try_from(prng.next_range(0, 7)).unwrap()
            }
            Self::Nes { prng, last } => {
                let roll = prng.next_range(0, 8);
                let id = match PieceId::try_from(roll) {
                    Ok(id) if Some(id) != *last => id,
                    // 7 is the deliberate dud face; a dud or a repeat rerolls
                    // once, this time over the honest seven.
                    _ => {
                        // SAFETY: reroll <= 6.
                        PieceId::try_from(prng.next_range(0, 7)).unwrap()
                    }
                };
                *last = Some(id);
                id
            }
            Self::Bag {
                prng,
                bag,
                index,
                cycle_len,
                check_seam,
                last,
            } => {
                if *index >= *cycle_len {
                    prng.shuffle(bag);
                    if *check_seam && Some(bag[0]) == *last {
                        let swap = prng.next_range(1, 7) as usize;
                        bag.swap(0, swap);
                    }
                    *index = 0;
                }
                let id = bag[*index];
                *index += 1;
                *last = Some(id);
                id
            }
            Self::MultiBag {
                prng,
                pool,
                pool_len,
                index,
            } => {
                if *index >= *pool_len {
                    prng.shuffle(&mut pool[..*pool_len]);
                    *index = 0;
                }
                let id = pool[*index];
                *index += 1;
                id
            }
            Self::TgmHistory {
                prng,
                history,
                head,
                rolls,
                started,
            } => {
                let id = if !*started {
                    *started = true;
                    opening_roll(prng)
                } else {
                    let mut id = PieceId::I;
                    for _ in 0..*rolls {
                        // SAFETY: roll <= 6.
                        id = PieceId::try_from(prng.next_range(0, 7)).unwrap();
                        if !history.contains(&id) {
                            break;
                        }
                        // Out of rerolls: the repeat is accepted as-is.
                    }
                    id
                };
                push_history(history, head, id);
                id
            }
            Self::Tgm3 {
                prng,
                history,
                head,
                bag,
                drought,
                seen,
                started,
            } => {
                let id;
                if !*started {
                    *started = true;
                    id = opening_roll(prng);
                    // The opening roll bypasses the bag, so there is no slot
                    // to reseed; the drought and seen bookkeeping still run.
                    *seen |= 1 << id.index();
                } else {
                    let (mut slot, mut candidate);
                    let mut roll = 0;
                    loop {
                        slot = prng.next_range(0, 35) as usize;
                        candidate = bag[slot];
                        // The sixth roll is accepted even if it repeats.
                        if !history.contains(&candidate) || roll == 5 {
                            break;
                        }
                        bag[slot] = drought[0];
                        roll += 1;
                    }
                    id = candidate;
                    *seen |= 1 << id.index();
                    // Arcade quirk, kept for sequence compatibility: once
                    // every piece has been seen, a rerolled draw of the
                    // drought head skips the write-back.
                    if !(*seen == 0x7F && roll > 0 && id == drought[0]) {
                        bag[slot] = drought[0];
                    }
                }
                // The drawn piece is now the least drought-starved: rotate it
                // to the tail, keeping the queue a permutation of all seven.
                // SAFETY: the drought queue is a permutation of all seven pieces.
                let pos = drought.iter().position(|&d| d == id).unwrap();
                drought[pos..].rotate_left(1);
                push_history(history, head, id);
                id
            }
        }
    }
}

/// First roll of the arcade randomizers: uniform over the four pieces that
/// give a clean opening.
fn opening_roll(prng: &mut SmallPrng) -> PieceId {
    [PieceId::J, PieceId::I, PieceId::L, PieceId::T][prng.next_range(0, 4) as usize]
}

/// Shuffle for a fresh game, rejecting any arrangement that would open on an
/// S, Z or O piece.
fn shuffle_for_opening(prng: &mut SmallPrng, pieces: &mut [PieceId]) {
    loop {
        prng.shuffle(pieces);
        if !SNAKE_OR_SQUARE.contains(&pieces[0]) {
            return;
        }
    }
}

fn push_history(history: &mut [PieceId; 4], head: &mut usize, id: PieceId) {
    history[*head] = id;
    *head = (*head + 1) % history.len();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn take(generator: &mut PieceGenerator, n: usize) -> Vec<PieceId> {
        (0..n).map(|_| generator.next()).collect()
    }

    fn assert_deterministic(kind: RandomizerKind) {
        let mut a = PieceGenerator::new(kind, 0xC0FFEE);
        let mut b = PieceGenerator::new(kind, 0xC0FFEE);
        assert_eq!(take(&mut a, 200), take(&mut b, 200));
    }

    #[test]
    fn every_kind_is_deterministic() {
        for kind in [
            RandomizerKind::Memoryless,
            RandomizerKind::Nes,
            RandomizerKind::Bag7,
            RandomizerKind::Bag7SeamCheck,
            RandomizerKind::MultiBag2,
            RandomizerKind::MultiBag4,
            RandomizerKind::MultiBag9,
            RandomizerKind::Tgm1,
            RandomizerKind::Tgm2,
            RandomizerKind::Tgm3,
        ] {
            assert_deterministic(kind);
        }
    }

    #[test]
    fn bag7_cycles_are_permutations() {
        let mut generator = PieceGenerator::bag(31337, 7, false);
        for _ in 0..20 {
            let mut cycle = take(&mut generator, 7);
            cycle.sort_unstable();
            cycle.dedup();
            assert_eq!(cycle.len(), 7);
        }
    }

    #[test]
    fn bag7_never_opens_on_snake_or_square() {
        for seed in 0..200 {
            let mut generator = PieceGenerator::bag(seed, 7, false);
            let first = generator.next();
            assert!(
                !SNAKE_OR_SQUARE.contains(&first),
                "seed {seed} opened on {first:?}"
            );
        }
    }

    #[test]
    fn seam_check_prevents_boundary_repeats() {
        for seed in 0..50 {
            let mut generator = PieceGenerator::bag(seed, 7, true);
            let stream = take(&mut generator, 140);
            for pair in stream.windows(2) {
                assert_ne!(pair[0], pair[1], "seed {seed} repeated across a seam");
            }
        }
    }

    #[test]
    fn short_bag_cycles_stay_distinct() {
        let mut generator = PieceGenerator::bag(5, 5, false);
        for _ in 0..20 {
            let mut cycle = take(&mut generator, 5);
            cycle.sort_unstable();
            cycle.dedup();
            assert_eq!(cycle.len(), 5);
        }
    }

    #[test]
    fn multi_bag_deals_exact_copies() {
        let mut generator = PieceGenerator::multi_bag(77, 4);
        let pool = take(&mut generator, 28);
        for id in PieceId::ALL {
            assert_eq!(pool.iter().filter(|&&p| p == id).count(), 4);
        }
    }

    #[test]
    fn nes_reaches_every_piece() {
        let mut generator = PieceGenerator::nes(12);
        let stream = take(&mut generator, 500);
        for id in PieceId::ALL {
            assert!(stream.contains(&id));
        }
    }

    #[test]
    fn arcade_openers_are_gentle() {
        for seed in 0..100 {
            for kind in [
                RandomizerKind::Tgm1,
                RandomizerKind::Tgm2,
                RandomizerKind::Tgm3,
            ] {
                let mut generator = PieceGenerator::new(kind, seed);
                let first = generator.next();
                assert!(
                    [PieceId::J, PieceId::I, PieceId::L, PieceId::T].contains(&first),
                    "{kind:?} seed {seed} opened on {first:?}"
                );
            }
        }
    }

    #[test]
    fn tgm3_drought_queue_stays_a_permutation() {
        let mut generator = PieceGenerator::tgm3(404);
        for _ in 0..300 {
            generator.next();
            if let PieceGenerator::Tgm3 { drought, .. } = &generator {
                let mut check = drought.to_vec();
                check.sort_unstable();
                check.dedup();
                assert_eq!(check.len(), 7);
            }
        }
    }
}
