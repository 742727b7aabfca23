//! Categorical feature encoding.
//!
//! Raw tokens are hashed to 32 bits with a per-feature salt and looked up in a
//! [`HashBucketTable`] built from the model's embedded dictionary. The bucket of
//! a known token is its position in that dictionary; anything else maps to
//! [`UNKNOWN_BUCKET`].
//!
//! # Hashing
//!
//! `hash = CRC32(token UTF-8 bytes)` with the CRC register seeded by the
//! feature's salt (`crc32fast::Hasher::new_with_initial`). The open-addressing
//! table has `max(8, next_pow2(2 * n_known))` slots; a hash starts probing at
//! `hash mod slots` and walks forward one slot at a time. Lookups compare the
//! full 32-bit hash, never the slot.

use thiserror::Error;

use crate::error::FeatureShapeError;
use crate::repr::{BucketId, UNKNOWN_BUCKET};

/// Smallest slot count of a bucket table.
const MIN_SLOTS: usize = 8;

/// Salted 32-bit hash of a categorical token.
#[inline]
pub fn token_hash(token: &str, salt: u32) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(salt);
    hasher.update(token.as_bytes());
    hasher.finalize()
}

/// Invalid embedded category dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DictionaryError {
    /// Two dictionary entries share a hash, so the token-to-bucket map would not be injective.
    #[error("duplicate token hash {hash:#010x} at dictionary positions {first} and {second}")]
    DuplicateHash { hash: u32, first: usize, second: usize },
    /// Dictionary is larger than the bucket id space.
    #[error("dictionary of {0} tokens exceeds the bucket id space")]
    TooLarge(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    hash: u32,
    bucket: BucketId,
}

const EMPTY_SLOT: Slot = Slot {
    hash: 0,
    bucket: UNKNOWN_BUCKET,
};

// =============================================================================
// HashBucketTable
// =============================================================================

/// Token-hash to bucket map for one categorical feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashBucketTable {
    salt: u32,
    /// Known hashes in bucket order (the serialized dictionary).
    hashes: Box<[u32]>,
    slots: Box<[Slot]>,
}

impl HashBucketTable {
    /// Build a table from dictionary hashes; bucket `i` is `hashes[i]`.
    pub fn new(salt: u32, hashes: Vec<u32>) -> Result<Self, DictionaryError> {
        if hashes.len() >= UNKNOWN_BUCKET as usize {
            return Err(DictionaryError::TooLarge(hashes.len()));
        }

        let n_slots = (hashes.len() * 2).next_power_of_two().max(MIN_SLOTS);
        let mask = n_slots - 1;
        let mut slots = vec![EMPTY_SLOT; n_slots];

        for (bucket, &hash) in hashes.iter().enumerate() {
            let mut pos = hash as usize & mask;
            loop {
                let slot = &mut slots[pos];
                if slot.bucket == UNKNOWN_BUCKET {
                    *slot = Slot {
                        hash,
                        bucket: bucket as BucketId,
                    };
                    break;
                }
                if slot.hash == hash {
                    return Err(DictionaryError::DuplicateHash {
                        hash,
                        first: slot.bucket as usize,
                        second: bucket,
                    });
                }
                pos = (pos + 1) & mask;
            }
        }

        Ok(Self {
            salt,
            hashes: hashes.into_boxed_slice(),
            slots: slots.into_boxed_slice(),
        })
    }

    /// Build a table by hashing training-time tokens in bucket order.
    pub fn from_tokens<I, S>(salt: u32, tokens: I) -> Result<Self, DictionaryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hashes = tokens
            .into_iter()
            .map(|t| token_hash(t.as_ref(), salt))
            .collect();
        Self::new(salt, hashes)
    }

    /// Number of known tokens (valid buckets are `0..len`).
    #[inline]
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    #[inline]
    pub fn salt(&self) -> u32 {
        self.salt
    }

    /// Dictionary hashes in bucket order.
    #[inline]
    pub fn hashes(&self) -> &[u32] {
        &self.hashes
    }

    /// Bucket of an already-hashed token.
    #[inline]
    pub fn lookup_hash(&self, hash: u32) -> BucketId {
        let mask = self.slots.len() - 1;
        let mut pos = hash as usize & mask;
        loop {
            let slot = self.slots[pos];
            if slot.bucket == UNKNOWN_BUCKET {
                return UNKNOWN_BUCKET;
            }
            if slot.hash == hash {
                return slot.bucket;
            }
            pos = (pos + 1) & mask;
        }
    }

    /// Bucket of a raw token.
    #[inline]
    pub fn encode(&self, token: &str) -> BucketId {
        self.lookup_hash(token_hash(token, self.salt))
    }
}

// =============================================================================
// CategoricalEncoder
// =============================================================================

/// Per-feature bucket tables of a model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoricalEncoder {
    tables: Vec<HashBucketTable>,
}

impl CategoricalEncoder {
    pub fn new(tables: Vec<HashBucketTable>) -> Self {
        Self { tables }
    }

    /// Encoder for a model without categorical features.
    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.tables.len()
    }

    #[inline]
    pub fn tables(&self) -> &[HashBucketTable] {
        &self.tables
    }

    /// Dictionary size of every feature.
    pub fn bucket_counts(&self) -> Vec<usize> {
        self.tables.iter().map(HashBucketTable::len).collect()
    }

    /// Encode one token of categorical feature `feature`.
    ///
    /// Unknown tokens map to [`UNKNOWN_BUCKET`]; only an out-of-range feature fails.
    pub fn encode(&self, token: &str, feature: usize) -> Result<BucketId, FeatureShapeError> {
        self.tables
            .get(feature)
            .map(|table| table.encode(token))
            .ok_or(FeatureShapeError::CategoricalFeatureOutOfRange {
                index: feature,
                count: self.tables.len(),
            })
    }

    /// Encode a full categorical row into `out`.
    ///
    /// `tokens` must yield exactly one token per feature, in feature order.
    #[inline]
    pub fn encode_row_into<'a, I, S>(&self, tokens: I, out: &mut [BucketId])
    where
        I: IntoIterator<Item = &'a S>,
        S: AsRef<str> + 'a + ?Sized,
    {
        debug_assert_eq!(out.len(), self.tables.len());
        for ((slot, table), token) in out.iter_mut().zip(&self.tables).zip(tokens) {
            *slot = table.encode(token.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_salted_and_deterministic() {
        assert_eq!(token_hash("red", 0), token_hash("red", 0));
        assert_ne!(token_hash("red", 0), token_hash("red", 1));
        assert_ne!(token_hash("red", 7), token_hash("blue", 7));
        // Unsalted CRC32 of the token.
        assert_eq!(token_hash("123456789", 0), 0xCBF4_3926);
    }

    #[test]
    fn known_tokens_map_to_dictionary_positions() {
        let table = HashBucketTable::from_tokens(17, ["x", "y", "z"]).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.encode("x"), 0);
        assert_eq!(table.encode("y"), 1);
        assert_eq!(table.encode("z"), 2);
    }

    #[test]
    fn unknown_tokens_map_to_reserved_bucket() {
        let table = HashBucketTable::from_tokens(0, ["e", "p"]).unwrap();
        assert_eq!(table.encode("never-seen"), UNKNOWN_BUCKET);
        assert_eq!(table.encode(""), UNKNOWN_BUCKET);

        let empty = HashBucketTable::new(0, vec![]).unwrap();
        assert_eq!(empty.encode("anything"), UNKNOWN_BUCKET);
    }

    #[test]
    fn colliding_slots_resolve_by_probing() {
        // 8 slots: hashes 1, 9 and 17 all start at slot 1.
        let table = HashBucketTable::new(0, vec![1, 9, 17]).unwrap();
        assert_eq!(table.lookup_hash(1), 0);
        assert_eq!(table.lookup_hash(9), 1);
        assert_eq!(table.lookup_hash(17), 2);
        assert_eq!(table.lookup_hash(25), UNKNOWN_BUCKET);
    }

    #[test]
    fn duplicate_hash_rejected() {
        let err = HashBucketTable::new(0, vec![5, 6, 5]).unwrap_err();
        assert_eq!(
            err,
            DictionaryError::DuplicateHash {
                hash: 5,
                first: 0,
                second: 2
            }
        );
    }

    #[test]
    fn large_dictionary_every_token_known() {
        let tokens: Vec<String> = (0..1000).map(|i| format!("tok-{i}")).collect();
        let table = HashBucketTable::from_tokens(3, &tokens).unwrap();
        for (i, token) in tokens.iter().enumerate() {
            assert_eq!(table.encode(token), i as u32);
        }
    }

    #[test]
    fn encoder_feature_range() {
        let encoder = CategoricalEncoder::new(vec![
            HashBucketTable::from_tokens(0, ["a", "b"]).unwrap(),
            HashBucketTable::from_tokens(1, ["a", "c"]).unwrap(),
        ]);
        assert_eq!(encoder.encode("b", 0), Ok(1));
        assert_eq!(encoder.encode("c", 1), Ok(1));
        assert_eq!(encoder.encode("c", 0), Ok(UNKNOWN_BUCKET));
        assert_eq!(
            encoder.encode("a", 2),
            Err(FeatureShapeError::CategoricalFeatureOutOfRange { index: 2, count: 2 })
        );
        assert_eq!(encoder.bucket_counts(), vec![2, 2]);
    }

    #[test]
    fn encode_row() {
        let encoder = CategoricalEncoder::new(vec![
            HashBucketTable::from_tokens(0, ["a", "b"]).unwrap(),
            HashBucketTable::from_tokens(1, ["c"]).unwrap(),
        ]);
        let mut out = [0u32; 2];
        encoder.encode_row_into(["b", "zzz"].iter(), &mut out);
        assert_eq!(out, [1, UNKNOWN_BUCKET]);
    }
}
