//! Stickiness hashing for percentage rollouts and variant buckets.

/// Seed used when bucketing variants, distinct from the rollout seed so a
/// user's rollout bucket and variant bucket are independent.
pub const VARIANT_SEED: u32 = 86_028_157;

/// MurmurHash3, x86 32-bit flavour.
pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;

    let mut h = seed;
    let mut blocks = data.chunks_exact(4);
    for block in &mut blocks {
        let mut k = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        k = k.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);
        h ^= k;
        h = h.rotate_left(13).wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        let mut k = 0u32;
        for (i, b) in tail.iter().enumerate() {
            k ^= u32::from(*b) << (8 * i);
        }
        k = k.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);
        h ^= k;
    }

    h ^= data.len() as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// Map `id` within `group_id` onto `1..=normalizer`.
pub fn normalized_value(id: &str, group_id: &str, normalizer: u32, seed: u32) -> u32 {
    let key = format!("{group_id}:{id}");
    murmur3_32(key.as_bytes(), seed) % normalizer + 1
}

/// Rollout bucket in `1..=100`.
pub fn normalized_strategy_value(id: &str, group_id: &str) -> u32 {
    normalized_value(id, group_id, 100, 0)
}

/// Variant bucket in `1..=total_weight`.
pub fn normalized_variant_value(id: &str, group_id: &str, total_weight: u32) -> u32 {
    normalized_value(id, group_id, total_weight, VARIANT_SEED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn murmur_reference_vectors() {
        assert_eq!(murmur3_32(b"", 0), 0);
        assert_eq!(murmur3_32(b"hello", 0), 0x248b_fa47);
        assert_eq!(
            murmur3_32(b"The quick brown fox jumps over the lazy dog", 0),
            0x2e4f_f723
        );
    }

    #[test]
    fn strategy_buckets_match_sdk_values() {
        assert_eq!(normalized_strategy_value("123", "gr1"), 73);
        assert_eq!(normalized_strategy_value("999", "groupX"), 25);
    }

    proptest! {
        #[test]
        fn buckets_stay_in_range(id in ".*", group in ".*", normalizer in 1u32..10_000) {
            let v = normalized_value(&id, &group, normalizer, 0);
            prop_assert!(v >= 1 && v <= normalizer);
        }

        #[test]
        fn buckets_are_deterministic(id in "[a-z0-9]{1,16}", group in "[a-z]{0,8}") {
            prop_assert_eq!(
                normalized_variant_value(&id, &group, 1000),
                normalized_variant_value(&id, &group, 1000)
            );
        }
    }
}
