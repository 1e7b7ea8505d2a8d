//! Minimal perfect hash index over grid keys.
//!
//! [`PerfectHashIndex`] maps each of the `n` keys it was built from to a
//! distinct slot in `0..n` using the "hash and displace" construction:
//!
//! 1. Every key is hashed with SipHash-1-3 (keyed by the seed) into three
//!    32-bit values `g`, `f1` and `f2`.
//! 2. Keys are grouped into `ceil(n / 5)` buckets by `g`.
//! 3. Buckets are placed largest first. For each bucket, displacement pairs
//!    `(d1, d2)` are tried in order until every key of the bucket lands on a
//!    free slot `(d2 + mix(f1 ^ d1 * K) + f2) mod n`, with no two keys of the
//!    bucket sharing one. `d2` runs over `0..n`; `d1` is unbounded.
//!
//! `mix` is a 32-bit avalanche finalizer, so every `d1` gives the keys of a
//! bucket an independent arrangement relative to each other, whatever `n` is.
//!
//! A lookup is one hash and one read of the displacement table.
//!
//! # Failure Policy
//!
//! Each bucket gets a budget of displacement attempts (by default
//! `max(64n, 2^20)`). A bucket that exhausts it aborts the build with
//! [`ShiftError::ConstructionFailed`]; [`PerfectHashIndex::build_with`]
//! then moves on to the next seed of the [`IndexConfig`] sequence.
//!
//! # Binary Layout
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | magic `GSPH` |
//! | 4 | 2 | version |
//! | 6 | 2 | flags (bit 0: checksum present) |
//! | 8 | 8 | seed |
//! | 16 | 4 | bucket count |
//! | 20 | 4 | slot count |
//! | 24 | 4 | CRC-32 of the sorted packed key set |
//! | 28 | 4 | reserved |
//!
//! followed by `bucket count` pairs of `u32` displacements (`d1`, `d2`).

use std::hash::Hasher;
use std::io::Write;

use siphasher::sip128::{Hash128, Hasher128, SipHasher13};

use crate::error::{Result, ShiftError};
use crate::key::GridKey;
use crate::layout::Reader;

/// Seed used when none is configured.
pub const DEFAULT_SEED: u64 = 0x0057_3a1b_9c4d_e2f1;

/// Average number of keys per bucket.
const LAMBDA: usize = 5;

/// Increment between successive seeds of a retry sequence (golden ratio).
const SEED_STEP: u64 = 0x9e37_79b9_7f4a_7c15;

/// Multiplier spreading `d1` across all 32 bits before mixing.
const D1_STEP: u32 = 0x9e37_79b9;

/// Smallest default per-bucket attempt budget.
const MIN_BUCKET_BUDGET: u64 = 1 << 20;

const INDEX_MAGIC: &[u8; 4] = b"GSPH";
const INDEX_VERSION: u16 = 1;
const FLAG_CHECKSUM: u16 = 0x1;

/// Size of the index header in bytes.
pub const INDEX_HEADER_LEN: usize = 32;

/// Construction parameters for [`PerfectHashIndex::build_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexConfig {
    /// First seed to try.
    pub seed: u64,
    /// Number of seeds to try before giving up (at least 1).
    pub seed_attempts: u32,
    /// Displacement attempts per bucket; `None` uses `max(64n, 2^20)`.
    pub max_attempts_per_bucket: Option<u64>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            seed_attempts: 32,
            max_attempts_per_bucket: None,
        }
    }
}

impl IndexConfig {
    /// Default configuration with the seed taken from `GRIDSHIFT_SEED` if set.
    ///
    /// The variable accepts decimal or `0x`-prefixed hexadecimal. An
    /// unparsable value is ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(seed) = std::env::var("GRIDSHIFT_SEED")
            .ok()
            .and_then(|s| parse_seed(&s))
        {
            config.seed = seed;
        }
        config
    }

    /// Set the first seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set how many seeds to try.
    pub fn seed_attempts(mut self, attempts: u32) -> Self {
        self.seed_attempts = attempts;
        self
    }

    /// Set the per-bucket displacement budget.
    pub fn max_attempts_per_bucket(mut self, attempts: u64) -> Self {
        self.max_attempts_per_bucket = Some(attempts);
        self
    }

    /// The `attempt`-th seed of the retry sequence.
    pub fn nth_seed(&self, attempt: u32) -> u64 {
        self.seed
            .wrapping_add((attempt as u64).wrapping_mul(SEED_STEP))
    }
}

/// Parse a seed written in decimal or `0x` hexadecimal.
pub fn parse_seed(value: &str) -> Option<u64> {
    let value = value.trim();
    match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16).ok(),
        None => value.replace('_', "").parse().ok(),
    }
}

/// The three hash values of one key.
#[derive(Debug, Clone, Copy)]
struct Hashes {
    g: u32,
    f1: u32,
    f2: u32,
}

#[inline]
fn hash_key(key: GridKey, seed: u64) -> Hashes {
    let mut hasher = SipHasher13::new_with_keys(0, seed);
    hasher.write(&key.packed().to_le_bytes());
    let Hash128 { h1: lower, h2: upper } = hasher.finish128();
    Hashes {
        g: (lower >> 32) as u32,
        f1: lower as u32,
        f2: upper as u32,
    }
}

/// Murmur3 32-bit finalizer.
#[inline]
fn mix(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^ (h >> 16)
}

#[inline]
fn displace(f1: u32, f2: u32, d1: u32, d2: u32) -> u32 {
    d2.wrapping_add(mix(f1 ^ d1.wrapping_mul(D1_STEP)))
        .wrapping_add(f2)
}

/// CRC-32 of a key set, independent of the order keys are supplied in.
pub fn key_set_checksum<I>(keys: I) -> u32
where
    I: IntoIterator<Item = GridKey>,
{
    let mut packed: Vec<u32> = keys.into_iter().map(GridKey::packed).collect();
    packed.sort_unstable();
    sorted_checksum(&packed)
}

fn sorted_checksum(sorted: &[u32]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    for key in sorted {
        hasher.update(&key.to_le_bytes());
    }
    hasher.finalize()
}

/// A collision-free mapping from a fixed key set to `0..n`.
///
/// The index is immutable after construction and safe to share across
/// threads.
///
/// # Example
///
/// ```
/// use gridshift::{GridKey, IndexConfig, PerfectHashIndex};
///
/// let keys: Vec<GridKey> = (0..10).flat_map(|c| (0..10).map(move |r| GridKey::new(c, r))).collect();
/// let index = PerfectHashIndex::build_with(&keys, &IndexConfig::default())?;
///
/// let mut slots: Vec<usize> = keys.iter().map(|&k| index.lookup(k)).collect();
/// slots.sort();
/// slots.dedup();
/// assert_eq!(slots.len(), keys.len());
/// # Ok::<(), gridshift::ShiftError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerfectHashIndex {
    seed: u64,
    slot_count: u32,
    displacements: Vec<(u32, u32)>,
    checksum: Option<u32>,
}

impl PerfectHashIndex {
    /// Build an index over `keys` with a single seed.
    ///
    /// # Errors
    ///
    /// - [`ShiftError::EmptyDataset`] if `keys` is empty
    /// - [`ShiftError::DuplicateKey`] if a key appears twice
    /// - [`ShiftError::ConstructionFailed`] if a bucket exhausts its budget
    pub fn build(keys: &[GridKey], seed: u64) -> Result<Self> {
        Self::build_with_budget(keys, seed, None)
    }

    /// Build an index, retrying with successive seeds from `config`.
    ///
    /// Returns the first successful build, or the last
    /// [`ShiftError::ConstructionFailed`] once every seed has failed.
    pub fn build_with(keys: &[GridKey], config: &IndexConfig) -> Result<Self> {
        let attempts = config.seed_attempts.max(1);
        let mut last_error = ShiftError::ConstructionFailed { seed: config.seed };

        for attempt in 0..attempts {
            let seed = config.nth_seed(attempt);
            match Self::build_with_budget(keys, seed, config.max_attempts_per_bucket) {
                Ok(index) => return Ok(index),
                Err(e @ ShiftError::ConstructionFailed { .. }) => {
                    tracing::warn!(
                        seed,
                        attempt = attempt + 1,
                        of = attempts,
                        "Perfect hash construction failed, trying next seed"
                    );
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }

    fn build_with_budget(keys: &[GridKey], seed: u64, budget: Option<u64>) -> Result<Self> {
        let n = keys.len();
        if n == 0 {
            return Err(ShiftError::EmptyDataset);
        }
        if n > u32::MAX as usize {
            return Err(ShiftError::ConstructionFailed { seed });
        }

        let mut sorted: Vec<u32> = keys.iter().map(|k| k.packed()).collect();
        sorted.sort_unstable();
        if let Some(pair) = sorted.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(ShiftError::DuplicateKey {
                key: GridKey::from_packed(pair[0]),
            });
        }
        let checksum = sorted_checksum(&sorted);
        drop(sorted);

        let budget = budget.unwrap_or_else(|| (64 * n as u64).max(MIN_BUCKET_BUDGET));
        let bucket_count = n.div_ceil(LAMBDA);
        let hashes: Vec<Hashes> = keys.iter().map(|&k| hash_key(k, seed)).collect();

        let mut buckets: Vec<(usize, Vec<usize>)> =
            (0..bucket_count).map(|i| (i, Vec::new())).collect();
        for (i, h) in hashes.iter().enumerate() {
            buckets[h.g as usize % bucket_count].1.push(i);
        }
        // Largest buckets first; stable sort keeps the order deterministic
        buckets.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

        let table_len = n as u32;
        let mut occupied = vec![false; n];
        // Slots claimed by the attempt currently in progress
        let mut generation_of = vec![0u64; n];
        let mut generation = 0u64;
        let mut claimed: Vec<usize> = Vec::with_capacity(LAMBDA * 4);
        let mut displacements = vec![(0u32, 0u32); bucket_count];

        for (bucket, members) in &buckets {
            if members.is_empty() {
                // Remaining buckets are empty too
                break;
            }

            let mut attempts = 0u64;
            let mut placed = false;

            'search: for d1 in 0..=u32::MAX {
                for d2 in 0..table_len {
                    if attempts == budget {
                        break 'search;
                    }
                    attempts += 1;
                    generation += 1;
                    claimed.clear();

                    let fits = members.iter().all(|&i| {
                        let h = hashes[i];
                        let slot = (displace(h.f1, h.f2, d1, d2) % table_len) as usize;
                        if occupied[slot] || generation_of[slot] == generation {
                            return false;
                        }
                        generation_of[slot] = generation;
                        claimed.push(slot);
                        true
                    });

                    if fits {
                        for &slot in &claimed {
                            occupied[slot] = true;
                        }
                        displacements[*bucket] = (d1, d2);
                        placed = true;
                        break 'search;
                    }
                }
            }

            if !placed {
                tracing::debug!(
                    seed,
                    bucket_size = members.len(),
                    attempts,
                    "Bucket exhausted its displacement budget"
                );
                return Err(ShiftError::ConstructionFailed { seed });
            }
        }

        tracing::debug!(
            keys = n,
            buckets = bucket_count,
            seed,
            "Built perfect hash index"
        );

        Ok(Self {
            seed,
            slot_count: table_len,
            displacements,
            checksum: Some(checksum),
        })
    }

    /// Slot assigned to `key`.
    ///
    /// Distinct for every key the index was built from. For any other key the
    /// result is an arbitrary slot in `0..slot_count()`; callers must check
    /// that the node stored there actually belongs to `key`.
    #[inline]
    pub fn lookup(&self, key: GridKey) -> usize {
        let h = hash_key(key, self.seed);
        let (d1, d2) = self.displacements[(h.g % self.displacements.len() as u32) as usize];
        (displace(h.f1, h.f2, d1, d2) % self.slot_count) as usize
    }

    /// Seed the index was built with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of slots (equal to the number of keys).
    pub fn slot_count(&self) -> usize {
        self.slot_count as usize
    }

    /// Number of displacement buckets.
    pub fn bucket_count(&self) -> usize {
        self.displacements.len()
    }

    /// Displacement pair of each bucket.
    pub fn displacements(&self) -> &[(u32, u32)] {
        &self.displacements
    }

    /// Stored key-set checksum, if any.
    pub fn checksum(&self) -> Option<u32> {
        self.checksum
    }

    /// Drop the stored checksum.
    pub fn without_checksum(mut self) -> Self {
        self.checksum = None;
        self
    }

    /// Check `keys` against the stored checksum.
    ///
    /// Indexes without a checksum accept any key set.
    ///
    /// # Errors
    ///
    /// Returns [`ShiftError::CorruptIndex`] if the checksum does not match.
    pub fn verify<I>(&self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = GridKey>,
    {
        match self.checksum {
            Some(expected) => {
                let actual = key_set_checksum(keys);
                if actual == expected {
                    Ok(())
                } else {
                    Err(ShiftError::corrupt_index(format!(
                        "key set checksum {actual:#010x} does not match stored {expected:#010x}"
                    )))
                }
            }
            None => Ok(()),
        }
    }

    /// Serialized length in bytes.
    pub fn encoded_len(&self) -> usize {
        INDEX_HEADER_LEN + self.displacements.len() * 8
    }

    /// Write the header and displacement table.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let flags = if self.checksum.is_some() {
            FLAG_CHECKSUM
        } else {
            0
        };

        let mut bytes = Vec::with_capacity(self.encoded_len());
        bytes.extend_from_slice(INDEX_MAGIC);
        bytes.extend_from_slice(&INDEX_VERSION.to_le_bytes());
        bytes.extend_from_slice(&flags.to_le_bytes());
        bytes.extend_from_slice(&self.seed.to_le_bytes());
        bytes.extend_from_slice(&(self.displacements.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&self.slot_count.to_le_bytes());
        bytes.extend_from_slice(&self.checksum.unwrap_or(0).to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        for &(d1, d2) in &self.displacements {
            bytes.extend_from_slice(&d1.to_le_bytes());
            bytes.extend_from_slice(&d2.to_le_bytes());
        }

        writer.write_all(&bytes)?;
        Ok(())
    }

    /// Serialize to a new buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_len());
        // Writing into a Vec cannot fail
        let _ = self.write_to(&mut bytes);
        bytes
    }

    /// Load an index blob.
    ///
    /// The blob must be exactly [`PerfectHashIndex::encoded_len`] bytes long.
    ///
    /// # Errors
    ///
    /// Returns [`ShiftError::CorruptIndex`] if the magic or version is wrong,
    /// the counts are zero or inconsistent, or the length disagrees with the
    /// bucket count.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let truncated = || ShiftError::corrupt_index("truncated header");
        let mut reader = Reader::new(bytes);

        if reader.take(4).ok_or_else(truncated)? != INDEX_MAGIC {
            return Err(ShiftError::corrupt_index("bad magic"));
        }
        let version = reader.u16().ok_or_else(truncated)?;
        if version != INDEX_VERSION {
            return Err(ShiftError::corrupt_index(format!(
                "unsupported version {version}"
            )));
        }
        let flags = reader.u16().ok_or_else(truncated)?;
        let seed = reader.u64().ok_or_else(truncated)?;
        let bucket_count = reader.u32().ok_or_else(truncated)? as usize;
        let slot_count = reader.u32().ok_or_else(truncated)?;
        let checksum = reader.u32().ok_or_else(truncated)?;
        let _reserved = reader.u32().ok_or_else(truncated)?;

        if slot_count == 0 || bucket_count == 0 {
            return Err(ShiftError::corrupt_index("zero slot or bucket count"));
        }
        if bucket_count > slot_count as usize {
            return Err(ShiftError::corrupt_index(format!(
                "{bucket_count} buckets for {slot_count} slots"
            )));
        }

        let expected = INDEX_HEADER_LEN + bucket_count * 8;
        if bytes.len() != expected {
            return Err(ShiftError::corrupt_index(format!(
                "expected {expected} bytes for {bucket_count} buckets, found {}",
                bytes.len()
            )));
        }

        let mut displacements = Vec::with_capacity(bucket_count);
        for _ in 0..bucket_count {
            let d1 = reader.u32().ok_or_else(truncated)?;
            let d2 = reader.u32().ok_or_else(truncated)?;
            displacements.push((d1, d2));
        }

        Ok(Self {
            seed,
            slot_count,
            displacements,
            checksum: ((flags & FLAG_CHECKSUM) != 0).then_some(checksum),
        })
    }

    /// Length of the index blob at the start of `bytes`, read from its header.
    pub(crate) fn blob_len(bytes: &[u8]) -> Result<usize> {
        let header = bytes
            .get(..INDEX_HEADER_LEN)
            .ok_or_else(|| ShiftError::corrupt_index("truncated header"))?;
        let mut reader = Reader::new(&header[16..]);
        let bucket_count = reader
            .u32()
            .ok_or_else(|| ShiftError::corrupt_index("truncated header"))?;
        Ok(INDEX_HEADER_LEN + bucket_count as usize * 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn rect_keys(columns: u16, rows: u16) -> Vec<GridKey> {
        (0..rows)
            .flat_map(|r| (0..columns).map(move |c| GridKey::new(c, r)))
            .collect()
    }

    fn build_default(keys: &[GridKey]) -> PerfectHashIndex {
        PerfectHashIndex::build_with(keys, &IndexConfig::default()).unwrap()
    }

    fn assert_collision_free(index: &PerfectHashIndex, keys: &[GridKey]) {
        let slots: HashSet<usize> = keys.iter().map(|&k| index.lookup(k)).collect();
        assert_eq!(slots.len(), keys.len());
        assert!(slots.iter().all(|&s| s < index.slot_count()));
    }

    #[test]
    fn test_single_key() {
        let keys = [GridKey::new(651, 313)];
        let index = PerfectHashIndex::build(&keys, DEFAULT_SEED).unwrap();
        assert_eq!(index.slot_count(), 1);
        assert_eq!(index.bucket_count(), 1);
        assert_eq!(index.lookup(keys[0]), 0);
    }

    #[test]
    fn test_collision_free_dense_grid() {
        let keys = rect_keys(120, 90);
        let index = build_default(&keys);

        assert_eq!(index.slot_count(), keys.len());
        assert_eq!(index.bucket_count(), keys.len().div_ceil(LAMBDA));
        assert_collision_free(&index, &keys);
    }

    #[test]
    fn test_collision_free_sparse_keys() {
        // Scattered keys across the full u16 range
        let keys: Vec<GridKey> = (0..2000u32)
            .map(|i| GridKey::new((i * 7919 % 65521) as u16, (i * 104729 % 65519) as u16))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let index = build_default(&keys);
        assert_collision_free(&index, &keys);
    }

    #[test]
    fn test_every_small_size_builds() {
        let all = rect_keys(8, 8);
        for n in 1..=all.len() {
            let keys = &all[..n];
            let index = build_default(keys);
            assert_eq!(index.slot_count(), n);
            assert_eq!(index.seed(), DEFAULT_SEED, "default seed failed for {n} keys");
            assert_collision_free(&index, keys);
        }
    }

    #[test]
    fn test_small_sets_build_on_every_seed() {
        // Tiny tables leave few free slots for the last buckets
        for n in [2usize, 3, 4, 5, 8, 9, 16] {
            let keys: Vec<GridKey> = rect_keys(16, 1).into_iter().take(n).collect();
            for seed in 0..200u64 {
                match PerfectHashIndex::build(&keys, seed) {
                    Ok(index) => assert_collision_free(&index, &keys),
                    Err(e) => panic!("{n} keys failed with seed {seed}: {e}"),
                }
            }
        }
    }

    #[test]
    fn test_larger_sets_build_on_every_seed() {
        for (columns, rows, seeds) in [(40u16, 25u16, 20u64), (100, 100, 5)] {
            let keys = rect_keys(columns, rows);
            for seed in 0..seeds {
                let index = PerfectHashIndex::build(&keys, seed)
                    .unwrap_or_else(|e| panic!("{} keys failed with seed {seed}: {e}", keys.len()));
                assert_collision_free(&index, &keys);
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let keys = rect_keys(50, 40);
        let a = build_default(&keys);
        let b = build_default(&keys);

        assert_eq!(a, b);
        for &key in &keys {
            assert_eq!(a.lookup(key), b.lookup(key));
        }
    }

    #[test]
    fn test_key_order_does_not_change_checksum() {
        let keys = rect_keys(30, 30);
        let mut reversed = keys.clone();
        reversed.reverse();

        assert_eq!(
            key_set_checksum(keys.iter().copied()),
            key_set_checksum(reversed.iter().copied())
        );
        let index = build_default(&keys);
        assert!(index.verify(reversed).is_ok());
    }

    #[test]
    fn test_empty_and_duplicate_keys() {
        assert!(matches!(
            PerfectHashIndex::build(&[], DEFAULT_SEED),
            Err(ShiftError::EmptyDataset)
        ));

        let keys = [GridKey::new(1, 2), GridKey::new(3, 4), GridKey::new(1, 2)];
        match PerfectHashIndex::build(&keys, DEFAULT_SEED) {
            Err(ShiftError::DuplicateKey { key }) => assert_eq!(key, GridKey::new(1, 2)),
            other => panic!("Expected DuplicateKey error, got {other:?}"),
        }
    }

    #[test]
    fn test_exhausted_budget_fails() {
        // A budget of one attempt cannot place 400 keys on the first try
        let keys = rect_keys(20, 20);
        let config = IndexConfig::default()
            .seed(42)
            .seed_attempts(3)
            .max_attempts_per_bucket(1);

        match PerfectHashIndex::build_with(&keys, &config) {
            Err(ShiftError::ConstructionFailed { seed }) => assert_eq!(seed, config.nth_seed(2)),
            other => panic!("Expected ConstructionFailed error, got {other:?}"),
        }
    }

    #[test]
    fn test_build_with_default_config() {
        let keys = rect_keys(64, 64);
        let config = IndexConfig::default();
        let index = PerfectHashIndex::build_with(&keys, &config).unwrap();
        assert_eq!(index.seed(), config.seed);
        assert_collision_free(&index, &keys);
    }

    #[test]
    fn test_unknown_key_lookup_in_range() {
        let keys = rect_keys(10, 10);
        let index = build_default(&keys);
        for key in [GridKey::new(500, 500), GridKey::new(u16::MAX, u16::MAX)] {
            let slot = index.lookup(key);
            assert!(slot < index.slot_count());
            assert_eq!(slot, index.lookup(key));
        }
    }

    #[test]
    fn test_blob_roundtrip() {
        let keys = rect_keys(40, 25);
        let index = build_default(&keys);
        let bytes = index.to_bytes();

        assert_eq!(bytes.len(), index.encoded_len());
        assert_eq!(PerfectHashIndex::blob_len(&bytes).unwrap(), bytes.len());

        let loaded = PerfectHashIndex::from_bytes(&bytes).unwrap();
        assert_eq!(loaded, index);
        assert!(loaded.verify(keys.iter().copied()).is_ok());
        for &key in &keys {
            assert_eq!(loaded.lookup(key), index.lookup(key));
        }
    }

    #[test]
    fn test_blob_without_checksum() {
        let keys = rect_keys(8, 8);
        let index = build_default(&keys).without_checksum();
        let loaded = PerfectHashIndex::from_bytes(&index.to_bytes()).unwrap();
        assert_eq!(loaded.checksum(), None);
        assert!(loaded.verify([GridKey::new(0, 0)]).is_ok());
    }

    #[test]
    fn test_checksum_mismatch() {
        let keys = rect_keys(8, 8);
        let index = build_default(&keys);
        let other = rect_keys(8, 9);
        assert!(matches!(
            index.verify(other),
            Err(ShiftError::CorruptIndex { .. })
        ));
    }

    #[test]
    fn test_corrupt_blobs() {
        let keys = rect_keys(16, 16);
        let bytes = build_default(&keys).to_bytes();

        let corrupt = |bytes: &[u8]| {
            matches!(
                PerfectHashIndex::from_bytes(bytes),
                Err(ShiftError::CorruptIndex { .. })
            )
        };

        assert!(corrupt(&bytes[..bytes.len() - 8]));
        assert!(corrupt(&bytes[..10]));

        let mut bad = bytes.clone();
        bad[0..4].copy_from_slice(b"NOPE");
        assert!(corrupt(&bad));

        let mut bad = bytes.clone();
        bad[4..6].copy_from_slice(&9u16.to_le_bytes());
        assert!(corrupt(&bad));

        // Bucket count inconsistent with blob size
        let mut bad = bytes.clone();
        bad[16..20].copy_from_slice(&1u32.to_le_bytes());
        assert!(corrupt(&bad));

        // Zero slots
        let mut bad = bytes.clone();
        bad[20..24].copy_from_slice(&0u32.to_le_bytes());
        assert!(corrupt(&bad));
    }

    #[test]
    fn test_parse_seed() {
        assert_eq!(parse_seed("42"), Some(42));
        assert_eq!(parse_seed(" 0x2a "), Some(42));
        assert_eq!(parse_seed("0X2A"), Some(42));
        assert_eq!(parse_seed("1_000"), Some(1000));
        assert_eq!(parse_seed("seed"), None);
    }

    #[test]
    fn test_nth_seed() {
        let config = IndexConfig::default().seed(10);
        assert_eq!(config.nth_seed(0), 10);
        assert_eq!(config.nth_seed(1), 10u64.wrapping_add(SEED_STEP));
    }
}
