//! Damaged, foreign and future-version files must never load.

use symtree::io::native::compute_checksum;
use symtree::io::{
    EnsemblePayload, FeaturesPayload, FormatHeader, MetadataPayload, ModelKind, NativeCodec,
    Payload, PayloadV1, TaskPayload, TreePayload, HEADER_SIZE,
};
use symtree::testing;
use symtree::{Error, Model, ModelRegistry};

fn valid_bytes() -> Vec<u8> {
    testing::mixed_binary_model().to_bytes().unwrap()
}

fn load_err(bytes: &[u8]) -> Error {
    Model::from_bytes(bytes).expect_err("expected load failure")
}

/// Rewrite the stored checksum so only the targeted field is wrong.
fn reseal(bytes: &mut [u8]) {
    let crc = compute_checksum(&bytes[HEADER_SIZE..]);
    bytes[16..20].copy_from_slice(&crc.to_le_bytes());
}

/// Single depth-0 regression tree over one numeric feature.
fn stump_payload() -> PayloadV1 {
    PayloadV1 {
        metadata: MetadataPayload {
            task: TaskPayload::Regression,
            objective: None,
            class_names: None,
            attributes: vec![],
        },
        features: FeaturesPayload {
            nan_modes: vec![0],
            categorical: vec![],
        },
        ensemble: EnsemblePayload {
            num_outputs: 1,
            scale: 1.0,
            bias: vec![0.0],
            tree_groups: vec![0],
            trees: vec![TreePayload {
                leaf_dim: 1,
                splits: vec![],
                leaf_values: vec![0.5],
            }],
        },
    }
}

/// Frame a payload with a correct checksum.
fn sealed(payload: PayloadV1) -> Vec<u8> {
    let header = FormatHeader::new(ModelKind::Oblivious, 1, 0, 1);
    NativeCodec::new()
        .serialize(header, &Payload::V1(payload))
        .unwrap()
}

#[test]
fn empty_input() {
    assert!(matches!(load_err(&[]), Error::CorruptModel(_)));
}

#[test]
fn wrong_magic() {
    let mut bytes = valid_bytes();
    bytes[0..4].copy_from_slice(b"CBM1");
    assert!(matches!(load_err(&bytes), Error::CorruptModel(_)));
}

#[test]
fn every_truncation_fails() {
    let bytes = valid_bytes();
    for len in 0..bytes.len() {
        let err = load_err(&bytes[..len]);
        assert!(matches!(err, Error::CorruptModel(_)), "len {len}: {err:?}");
    }
}

#[test]
fn extra_payload_bytes_fail() {
    let mut bytes = valid_bytes();
    // bytes past the declared payload are ignored by the framing
    bytes.extend_from_slice(&[0xAB; 7]);
    assert!(Model::from_bytes(&bytes).is_ok());

    // extra bytes inside the checksummed payload are not
    let mut bytes = valid_bytes();
    bytes.push(0);
    let size = (bytes.len() - HEADER_SIZE) as u32;
    bytes[12..16].copy_from_slice(&size.to_le_bytes());
    reseal(&mut bytes);
    assert!(matches!(load_err(&bytes), Error::CorruptModel(_)));
}

#[test]
fn payload_bit_flip_fails_checksum() {
    let clean = valid_bytes();
    for offset in [HEADER_SIZE, HEADER_SIZE + 5, clean.len() - 1] {
        let mut bytes = clean.clone();
        bytes[offset] ^= 0x10;
        let err = load_err(&bytes);
        assert!(err.to_string().contains("checksum"), "offset {offset}: {err}");
    }
}

#[test]
fn newer_major_version_is_unsupported() {
    let mut bytes = valid_bytes();
    bytes[4] = 2;
    bytes[5] = 3;
    assert!(matches!(
        load_err(&bytes),
        Error::UnsupportedVersion { major: 2, minor: 3 }
    ));
}

#[test]
fn newer_minor_version_loads() {
    let mut bytes = valid_bytes();
    bytes[5] = 7;
    assert_eq!(Model::from_bytes(&bytes).unwrap(), testing::mixed_binary_model());
}

#[test]
fn unknown_model_kind() {
    let mut bytes = valid_bytes();
    bytes[6] = 9;
    assert!(matches!(load_err(&bytes), Error::CorruptModel(_)));
}

#[test]
fn header_counts_must_match_payload() {
    // numeric, categorical, outputs
    for offset in [20, 24, 28] {
        let mut bytes = valid_bytes();
        bytes[offset] += 1;
        let err = load_err(&bytes);
        assert!(matches!(err, Error::CorruptModel(_)), "offset {offset}: {err:?}");
    }
}

#[test]
fn resealed_payload_corruption_fails_validation() {
    let clean = valid_bytes();
    let mut rejected = 0;
    for offset in HEADER_SIZE..clean.len() {
        let mut bytes = clean.clone();
        bytes[offset] = bytes[offset].wrapping_add(0x41);
        reseal(&mut bytes);
        // the change may still decode into another valid model, but never panics
        match Model::from_bytes(&bytes) {
            Ok(model) => assert_eq!(model.n_features(), 4),
            Err(Error::CorruptModel(_)) => rejected += 1,
            Err(other) => panic!("offset {offset}: unexpected {other:?}"),
        }
    }
    assert!(rejected > 0);
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Model::load(dir.path().join("absent.symt")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn failed_registry_load_keeps_previous_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.symt");
    let mut bytes = valid_bytes();
    bytes.truncate(HEADER_SIZE + 3);
    std::fs::write(&path, bytes).unwrap();

    let mut registry = ModelRegistry::new();
    registry.insert("scorer", testing::log_price_model());
    assert!(matches!(registry.load("scorer", &path), Err(Error::CorruptModel(_))));
    assert_eq!(registry.get("scorer").unwrap().n_trees(), 2);
}

#[test]
fn stump_payload_loads() {
    let model = Model::from_bytes(&sealed(stump_payload())).unwrap();
    assert_eq!(model.n_outputs(), 1);
}

#[test]
fn huge_output_count_is_rejected_without_allocating() {
    let mut payload = stump_payload();
    payload.ensemble.num_outputs = u32::MAX;
    let bytes = sealed(payload);
    assert!(bytes.len() < 128);
    assert!(matches!(load_err(&bytes), Error::CorruptModel(_)));
}

#[test]
fn non_finite_leaf_is_rejected() {
    for value in [f64::NAN, f64::INFINITY] {
        let mut payload = stump_payload();
        payload.ensemble.trees[0].leaf_values = vec![value];
        assert!(matches!(load_err(&sealed(payload)), Error::CorruptModel(_)));
    }
}
