//! Split conditions shared by every node at one depth of an oblivious tree.

/// Bucket identifier produced by the categorical encoder.
pub type BucketId = u32;

/// Bucket assigned to tokens that were never seen at training time.
///
/// It is never a member of any [`BucketSet`], so unknown tokens always take the
/// right branch of a categorical split.
pub const UNKNOWN_BUCKET: BucketId = u32::MAX;

// =============================================================================
// BucketSet
// =============================================================================

/// Set of bucket ids routed left by a categorical split.
///
/// Stored as packed u32 bitset words, bit `b` of the set living in word
/// `b / 32`. Buckets past the last stored word are not members.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketSet {
    words: Box<[u32]>,
}

impl BucketSet {
    /// Build a set from bucket ids. [`UNKNOWN_BUCKET`] is never a member and is skipped.
    pub fn from_buckets<I: IntoIterator<Item = BucketId>>(buckets: I) -> Self {
        let mut words: Vec<u32> = Vec::new();
        for bucket in buckets.into_iter().filter(|&b| b != UNKNOWN_BUCKET) {
            let word = (bucket >> 5) as usize;
            if word >= words.len() {
                words.resize(word + 1, 0);
            }
            words[word] |= 1 << (bucket & 31);
        }
        // Trailing zero words carry no information.
        while words.last() == Some(&0) {
            words.pop();
        }
        Self {
            words: words.into_boxed_slice(),
        }
    }

    /// Rebuild a set from its packed words.
    pub fn from_words(words: Vec<u32>) -> Self {
        Self {
            words: words.into_boxed_slice(),
        }
    }

    #[inline]
    pub fn contains(&self, bucket: BucketId) -> bool {
        let word = (bucket >> 5) as usize;
        match self.words.get(word) {
            Some(&w) => (w >> (bucket & 31)) & 1 != 0,
            None => false,
        }
    }

    /// Packed bitset words.
    #[inline]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Member bucket ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = BucketId> + '_ {
        self.words.iter().enumerate().flat_map(|(word_idx, &word)| {
            (0..32u32)
                .filter(move |bit| (word >> bit) & 1 != 0)
                .map(move |bit| ((word_idx as u32) << 5) | bit)
        })
    }

    /// Largest member, if any.
    pub fn max_bucket(&self) -> Option<BucketId> {
        self.words
            .iter()
            .enumerate()
            .rev()
            .find(|(_, &w)| w != 0)
            .map(|(idx, &w)| ((idx as u32) << 5) | (31 - w.leading_zeros()))
    }
}

// =============================================================================
// Split
// =============================================================================

/// How NaN numeric values compare against split thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NanMode {
    /// NaN is treated as smaller than every threshold.
    #[default]
    Min,
    /// NaN is treated as larger than every threshold.
    Max,
}

impl NanMode {
    /// Replace NaN with the infinity matching this mode; other values pass through.
    #[inline]
    pub fn sanitize(self, value: f32) -> f32 {
        if value.is_nan() {
            match self {
                NanMode::Min => f32::NEG_INFINITY,
                NanMode::Max => f32::INFINITY,
            }
        } else {
            value
        }
    }
}

/// A split condition of an oblivious tree level.
///
/// The outcome is one bit of the leaf index: `true` means bit 1 ("right").
#[derive(Debug, Clone, PartialEq)]
pub enum Split {
    /// `numeric[feature] >= threshold` goes right.
    Numeric { feature: u32, threshold: f32 },
    /// `bucket(categorical[feature])` in `left` goes left; everything else goes right.
    Categorical { feature: u32, left: BucketSet },
}

impl Split {
    pub fn numeric(feature: u32, threshold: f32) -> Self {
        Self::Numeric { feature, threshold }
    }

    pub fn categorical<I: IntoIterator<Item = BucketId>>(feature: u32, left: I) -> Self {
        Self::Categorical {
            feature,
            left: BucketSet::from_buckets(left),
        }
    }

    /// Feature index within the split's own feature kind.
    #[inline]
    pub fn feature(&self) -> u32 {
        match self {
            Self::Numeric { feature, .. } | Self::Categorical { feature, .. } => *feature,
        }
    }

    #[inline]
    pub fn is_categorical(&self) -> bool {
        matches!(self, Self::Categorical { .. })
    }

    /// Evaluate the split for one row.
    ///
    /// `numeric` holds the row's numeric values (NaN compares as `Min`),
    /// `buckets` the already-encoded categorical buckets.
    #[inline]
    pub fn goes_right(&self, numeric: &[f32], buckets: &[BucketId]) -> bool {
        match self {
            Self::Numeric { feature, threshold } => numeric[*feature as usize] >= *threshold,
            Self::Categorical { feature, left } => !left.contains(buckets[*feature as usize]),
        }
    }
}
