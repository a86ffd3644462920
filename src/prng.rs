/*!
Seedable small PRNG.

This is Jenkins' small fast 32-bit generator (four words of state). It is not
cryptographic; it is here because every randomizer's output must be a pure,
platform-independent function of the seed, and replays depend on the exact
byte sequence. `shuffle` is likewise pinned to one Fisher–Yates formulation
for the same reason.
*/

/// Jenkins-style small PRNG with 4×32-bit state.
#[derive(Eq, PartialEq, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SmallPrng {
    a: u32,
    b: u32,
    c: u32,
    d: u32,
}

impl SmallPrng {
    /// Creates a generator from a 32-bit seed.
    pub fn new(seed: u32) -> Self {
        let mut prng = SmallPrng {
            a: 0xF1EA_5EED,
            b: seed,
            c: seed,
            d: seed,
        };
        for _ in 0..20 {
            prng.next();
        }
        prng
    }

    /// Advances the state and returns the next 32-bit output.
    pub fn next(&mut self) -> u32 {
        let e = self.a.wrapping_sub(self.b.rotate_left(27));
        self.a = self.b ^ self.c.rotate_left(17);
        self.b = self.c.wrapping_add(self.d);
        self.c = self.d.wrapping_add(e);
        self.d = e.wrapping_add(self.a);
        self.d
    }

    /// Uniform integer in `[lo, hi)` by rejection sampling.
    pub fn next_range(&mut self, lo: u32, hi: u32) -> u32 {
        assert!(lo <= hi, "empty range [{lo}, {hi})");
        if hi - lo <= 1 {
            return lo;
        }
        let span = hi - lo;
        // Reject the tail of the u32 range that would bias the modulus.
        let limit = u32::MAX - u32::MAX % span;
        loop {
            let roll = self.next();
            if roll < limit {
                return lo + roll % span;
            }
        }
    }

    /// Fisher–Yates shuffle drawing `next_range(i, len)` for each index.
    ///
    /// The iteration order is part of the replay contract; do not substitute
    /// another shuffle.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        let len = slice.len() as u32;
        for i in 0..len.saturating_sub(1) {
            let j = self.next_range(i, len);
            slice.swap(i as usize, j as usize);
        }
    }
}
