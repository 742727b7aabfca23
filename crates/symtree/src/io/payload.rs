//! Payload structures for the native storage format.
//!
//! These structs are designed for serialization with Postcard. They mirror the
//! runtime types but stay independent of them, so the wire layout only changes
//! when a new payload version is added.

use serde::{Deserialize, Serialize};

// ============================================================================
// Top-Level Payload
// ============================================================================

/// Version-tagged payload enum for forward compatibility.
///
/// New format versions add variants rather than modifying existing ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    V1(PayloadV1),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadV1 {
    pub metadata: MetadataPayload,
    pub features: FeaturesPayload,
    pub ensemble: EnsemblePayload,
}

// ============================================================================
// Metadata
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskPayload {
    Regression,
    BinaryClassification,
    MulticlassClassification { n_classes: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataPayload {
    pub task: TaskPayload,
    pub objective: Option<String>,
    pub class_names: Option<Vec<String>>,
    pub attributes: Vec<(String, String)>,
}

// ============================================================================
// Features
// ============================================================================

/// NaN treatment code: 0 = min, 1 = max.
pub type NanModeCode = u8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturesPayload {
    /// One NaN mode per numeric feature; its length is the numeric feature count.
    pub nan_modes: Vec<NanModeCode>,
    /// One dictionary per categorical feature.
    pub categorical: Vec<DictionaryPayload>,
}

/// Embedded category dictionary of one categorical feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryPayload {
    /// Per-feature hash salt.
    pub salt: u32,
    /// Known token hashes; bucket `i` is `hashes[i]`.
    pub hashes: Vec<u32>,
}

// ============================================================================
// Ensemble
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsemblePayload {
    pub num_outputs: u32,
    pub scale: f64,
    /// One bias per output.
    pub bias: Vec<f64>,
    /// Output lane of each tree (0 for vector-leaf trees).
    pub tree_groups: Vec<u32>,
    pub trees: Vec<TreePayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreePayload {
    /// Values per leaf.
    pub leaf_dim: u32,
    /// One split per depth level, root level first.
    pub splits: Vec<SplitPayload>,
    /// `2^depth * leaf_dim` values, leaf-major.
    pub leaf_values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SplitPayload {
    Numeric { feature: u32, threshold: f32 },
    /// `left_words` is the packed bitset of buckets routed left.
    Categorical { feature: u32, left_words: Vec<u32> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_serializes() {
        let payload = Payload::V1(PayloadV1 {
            metadata: MetadataPayload {
                task: TaskPayload::MulticlassClassification { n_classes: 3 },
                objective: Some("MultiClass".into()),
                class_names: None,
                attributes: vec![],
            },
            features: FeaturesPayload {
                nan_modes: vec![0, 0, 0, 0],
                categorical: vec![],
            },
            ensemble: EnsemblePayload {
                num_outputs: 3,
                scale: 1.0,
                bias: vec![0.0; 3],
                tree_groups: vec![0],
                trees: vec![TreePayload {
                    leaf_dim: 3,
                    splits: vec![SplitPayload::Numeric {
                        feature: 2,
                        threshold: 2.45,
                    }],
                    leaf_values: vec![0.5, -0.2, -0.3, -0.4, 0.2, 0.2],
                }],
            },
        });

        let bytes = postcard::to_allocvec(&payload).unwrap();
        assert!(!bytes.is_empty());

        let decoded: Payload = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn categorical_split_payload() {
        let split = SplitPayload::Categorical {
            feature: 4,
            left_words: vec![0b1010],
        };
        let bytes = postcard::to_allocvec(&split).unwrap();
        let decoded: SplitPayload = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, split);
    }

    #[test]
    fn unknown_version_tag_fails_to_decode() {
        // Variant index 1 does not exist yet.
        let bytes = [1u8, 0, 0, 0];
        assert!(postcard::from_bytes::<Payload>(&bytes).is_err());
    }
}
