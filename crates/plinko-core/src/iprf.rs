//! Invertible Pseudorandom Function (iPRF) for Plinko PIR
//!
//! Maps a domain index `x in [0, n)` to a bin `y in [0, m)` by tracing ball `x`
//! through an implicit binary tree over the bins. At every node the number of
//! balls that fall into the left half is drawn from
//! `Binomial(ball_count, left_bins / total_bins)` using the keyed mix, so the
//! assignment is deterministic per key and load-balanced in expectation.
//!
//! Only the forward direction exists. The mapping is not a partition: it is an
//! approximate ball-in-bin assignment and need not be bijective.

use crate::binomial;
use crate::prf::{Fnv1aMix, KeyedMix, PrfKey128};

/// iPRF from `[0, domain)` to `[0, range)`
pub struct Iprf<M: KeyedMix = Fnv1aMix> {
    mix: M,
    domain: u64,
    range: u64,
    tree_depth: u32,
}

impl Iprf {
    /// Create an iPRF with the reference mixing function
    pub fn new(key: PrfKey128, domain: u64, range: u64) -> Self {
        Self::with_mix(Fnv1aMix::new(&key), domain, range)
    }
}

impl<M: KeyedMix> Iprf<M> {
    /// Create an iPRF over an already keyed mixing function
    pub fn with_mix(mix: M, domain: u64, range: u64) -> Self {
        Self {
            mix,
            domain,
            range,
            tree_depth: ceil_log2(range),
        }
    }

    /// Evaluate the iPRF: bin for domain index `x`
    ///
    /// Indices outside the domain map to bin 0.
    pub fn forward(&self, x: u64) -> u64 {
        if x >= self.domain {
            return 0;
        }
        self.trace_ball(x)
    }

    /// Follow ball `x` down the tree until its bin range narrows to one bin
    fn trace_ball(&self, x: u64) -> u64 {
        if self.range <= 1 {
            return 0;
        }

        let n = self.domain;
        let mut low = 0u64;
        let mut high = self.range - 1;
        let mut ball_count = n;
        let mut ball_index = x;

        while low < high {
            let mid = (low + high) / 2;
            let left_bins = mid - low + 1;
            let total_bins = high - low + 1;
            let p = left_bins as f64 / total_bins as f64;

            let node_id = encode_node(low, high, n);
            let left_count = binomial::sample(&self.mix, node_id, ball_count, p);

            if ball_index < left_count {
                high = mid;
                ball_count = left_count;
            } else {
                low = mid + 1;
                ball_index -= left_count;
                ball_count -= left_count;
            }
        }

        low
    }

    /// Expected preimage size of any bin: `ceil(domain / range)`
    pub fn preimage_size(&self) -> u64 {
        if self.range == 0 {
            return 0;
        }
        self.domain.div_ceil(self.range)
    }

    /// `ceil(log2(range))`; informational, the trace loop does not use it
    pub fn tree_depth(&self) -> u32 {
        self.tree_depth
    }

    /// Domain size `n`
    pub fn domain(&self) -> u64 {
        self.domain
    }

    /// Number of bins `m`
    pub fn range(&self) -> u64 {
        self.range
    }
}

/// Node identifier fed to the PRF. Fields overlap for large bin ranges;
/// the layout is fixed so existing hints stay valid.
#[inline]
pub fn encode_node(low: u64, high: u64, n: u64) -> u64 {
    (low << 32) | (high << 16) | (n & 0xFFFF)
}

fn ceil_log2(m: u64) -> u32 {
    if m <= 1 {
        0
    } else {
        u64::BITS - (m - 1).leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prf::Aes128Mix;

    fn test_key() -> PrfKey128 {
        core::array::from_fn(|i| i as u8)
    }

    #[test]
    fn test_forward_in_range_and_deterministic() {
        let iprf = Iprf::new(test_key(), 10_000, 100);
        for x in 0..10_000 {
            let y = iprf.forward(x);
            assert!(y < 100, "bin {} out of range for x={}", y, x);
            assert_eq!(y, iprf.forward(x));
        }
    }

    #[test]
    fn test_forward_random_keys_in_range() {
        let mut key = [0u8; 16];
        for _ in 0..16 {
            rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut key);
            let iprf = Iprf::new(key, 3_000, 37);
            for x in (0..3_000).step_by(7) {
                assert!(iprf.forward(x) < 37);
            }
        }
    }

    #[test]
    fn test_forward_out_of_domain_is_zero() {
        let iprf = Iprf::new(test_key(), 1_000, 64);
        assert_eq!(iprf.forward(1_000), 0);
        assert_eq!(iprf.forward(u64::MAX), 0);
    }

    #[test]
    fn test_single_bin() {
        let iprf = Iprf::new(test_key(), 500, 1);
        for x in 0..500 {
            assert_eq!(iprf.forward(x), 0);
        }
    }

    #[test]
    fn test_same_key_same_mapping() {
        let a = Iprf::new([5u8; 16], 2_000, 32);
        let b = Iprf::new([5u8; 16], 2_000, 32);
        for x in 0..2_000 {
            assert_eq!(a.forward(x), b.forward(x));
        }
    }

    #[test]
    fn test_different_keys_differ() {
        let a = Iprf::new([1u8; 16], 4_096, 64);
        let b = Iprf::new([2u8; 16], 4_096, 64);
        let differing = (0..4_096).filter(|&x| a.forward(x) != b.forward(x)).count();
        assert!(differing > 0);
    }

    #[test]
    fn test_non_power_of_two_range() {
        let iprf = Iprf::new(test_key(), 3_000, 12);
        let mut counts = [0u64; 12];
        for x in 0..3_000 {
            counts[iprf.forward(x) as usize] += 1;
        }
        assert_eq!(counts.iter().sum::<u64>(), 3_000);
    }

    #[test]
    fn test_tree_depth_and_preimage() {
        assert_eq!(Iprf::new(test_key(), 100, 1).tree_depth(), 0);
        assert_eq!(Iprf::new(test_key(), 100, 2).tree_depth(), 1);
        assert_eq!(Iprf::new(test_key(), 100, 5).tree_depth(), 3);
        assert_eq!(Iprf::new(test_key(), 100, 1024).tree_depth(), 10);

        assert_eq!(Iprf::new(test_key(), 100, 8).preimage_size(), 13);
        assert_eq!(Iprf::new(test_key(), 96, 8).preimage_size(), 12);
    }

    #[test]
    fn test_encode_node_layout() {
        assert_eq!(encode_node(0, 0, 0), 0);
        assert_eq!(encode_node(1, 0, 0), 1 << 32);
        assert_eq!(encode_node(0, 1, 0), 1 << 16);
        assert_eq!(encode_node(0, 0, 0x1_2345), 0x2345);
    }

    #[test]
    fn test_pluggable_mix() {
        let iprf = Iprf::with_mix(Aes128Mix::new(&test_key()), 5_000, 40);
        for x in 0..5_000 {
            assert!(iprf.forward(x) < 40);
        }
    }
}
