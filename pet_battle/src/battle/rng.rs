//! Small xorshift generator for cell picks.

/// 32-bit xorshift (13, 17, 5).
///
/// Fast and good enough to defeat casual prediction; not for anything
/// adversarial.
#[derive(Debug, Clone)]
pub struct Xorshift32 {
    state: u32,
}

impl Xorshift32 {
    /// Seeded generator. A zero seed would get stuck at zero, so it is remapped.
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 0x9E37_79B9 } else { seed },
        }
    }

    /// Seed once from the process entropy source
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform index in `0..n`; `n` must be non-zero
    pub fn below(&mut self, n: usize) -> usize {
        debug_assert!(n > 0);
        (self.next_u32() as usize) % n.max(1)
    }

    /// Random element of a slice
    pub fn pick<T: Copy>(&mut self, items: &[T]) -> Option<T> {
        if items.is_empty() {
            None
        } else {
            Some(items[self.below(items.len())])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_seed_does_not_stick() {
        let mut rng = Xorshift32::new(0);
        assert_ne!(rng.next_u32(), 0);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = Xorshift32::new(42);
        let mut b = Xorshift32::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn test_known_first_value() {
        // 1 ^ 1<<13 = 8193; ^ >>17 = 8193; ^ <<5 = 270369
        let mut rng = Xorshift32::new(1);
        assert_eq!(rng.next_u32(), 270_369);
    }

    #[test]
    fn test_below_in_range() {
        let mut rng = Xorshift32::new(7);
        for _ in 0..1_000 {
            assert!(rng.below(6) < 6);
        }
    }

    #[test]
    fn test_pick_empty() {
        let mut rng = Xorshift32::new(7);
        let empty: [i32; 0] = [];
        assert_eq!(rng.pick(&empty), None);
        assert_eq!(rng.pick(&[3]), Some(3));
    }
}
