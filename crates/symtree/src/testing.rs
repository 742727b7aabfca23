//! Deterministic fixture models and inputs for tests and benchmarks.
//!
//! The hand-built models are small enough to score by hand; the random ones
//! are seeded so every run sees the same trees and rows.

use ndarray::Array2;
use rand::prelude::*;

use crate::categories::{CategoricalEncoder, HashBucketTable};
use crate::model::{Model, ModelMeta};
use crate::repr::{Ensemble, NanMode, ObliviousTree, Split};

fn tree(splits: Vec<Split>, leaves: Vec<f64>, leaf_dim: usize) -> ObliviousTree {
    ObliviousTree::new(splits, leaves, leaf_dim).expect("fixture tree must be valid")
}

fn table<const N: usize>(salt: u32, tokens: [&str; N]) -> HashBucketTable {
    HashBucketTable::from_tokens(salt, tokens).expect("fixture dictionary must be collision-free")
}

// =============================================================================
// Hand-built models
// =============================================================================

/// Dictionary of categorical feature 0 of [`mixed_binary_model`].
pub const COLORS: [&str; 3] = ["red", "green", "blue"];
/// Dictionary of categorical feature 1 of [`mixed_binary_model`].
pub const SIZES: [&str; 2] = ["small", "big"];

/// Binary classifier over 2 numeric and 2 categorical features.
///
/// Numeric feature 1 treats NaN as `+inf`. Bias is `-0.25`, scale is 1.
pub fn mixed_binary_model() -> Model {
    let mut ensemble = Ensemble::single_output().with_bias(vec![-0.25]);
    ensemble.push_tree(
        tree(
            vec![Split::numeric(0, 0.5), Split::categorical(0, [0])],
            vec![0.4, -0.1, 0.2, -0.3],
            1,
        ),
        0,
    );
    ensemble.push_tree(
        tree(
            vec![
                Split::categorical(1, [1]),
                Split::numeric(1, 2.0),
                Split::numeric(0, -1.0),
            ],
            vec![0.1, -0.2, 0.3, -0.4, 0.5, -0.6, 0.7, -0.8],
            1,
        ),
        0,
    );
    ensemble.push_tree(ObliviousTree::constant(0.05), 0);

    Model::builder()
        .ensemble(ensemble)
        .n_numeric_features(2)
        .encoder(CategoricalEncoder::new(vec![
            table(11, COLORS),
            table(12, SIZES),
        ]))
        .nan_modes(vec![NanMode::Min, NanMode::Max])
        .meta(ModelMeta::for_binary_classification().with_class_names(["no", "yes"]))
        .build()
        .expect("fixture model must be valid")
}

/// Price model trained in log space: `exp(score)` is the predicted price.
///
/// Features: `rooms`, `crime_rate`. Bias is `ln(20)`.
pub fn log_price_model() -> Model {
    let mut ensemble = Ensemble::single_output().with_bias(vec![20f64.ln()]);
    ensemble.push_tree(tree(vec![Split::numeric(0, 6.0)], vec![-0.2, 0.3], 1), 0);
    ensemble.push_tree(
        tree(
            vec![Split::numeric(1, 0.5), Split::numeric(0, 7.5)],
            vec![0.1, -0.15, 0.25, 0.0],
            1,
        ),
        0,
    );

    Model::builder()
        .ensemble(ensemble)
        .n_numeric_features(2)
        .meta(ModelMeta::for_regression().with_objective("RMSE"))
        .build()
        .expect("fixture model must be valid")
}

/// Iris-style 3-class model with vector leaves.
///
/// Features: sepal length, sepal width, petal length, petal width.
pub fn iris_model() -> Model {
    let mut ensemble = Ensemble::new(3);
    ensemble.push_tree(
        tree(
            vec![Split::numeric(2, 2.45)],
            vec![1.0, -0.5, -0.5, -0.5, 0.5, 0.5],
            3,
        ),
        0,
    );
    ensemble.push_tree(
        tree(
            vec![Split::numeric(3, 1.75), Split::numeric(2, 4.95)],
            vec![
                0.0, 0.8, -0.4, // narrow, short
                0.0, -0.2, 0.6, // wide, short
                0.0, -0.1, 0.4, // narrow, long
                0.0, -0.6, 0.9, // wide, long
            ],
            3,
        ),
        0,
    );

    Model::builder()
        .ensemble(ensemble)
        .n_numeric_features(4)
        .meta(
            ModelMeta::for_multiclass(3)
                .with_objective("MultiClass")
                .with_class_names(["setosa", "versicolor", "virginica"]),
        )
        .build()
        .expect("fixture model must be valid")
}

/// Odor values known to [`mushroom_model`].
pub const ODORS: [&str; 9] = ["a", "l", "n", "f", "c", "y", "s", "p", "m"];
/// Spore print colors known to [`mushroom_model`].
pub const SPORE_COLORS: [&str; 9] = ["k", "n", "u", "h", "w", "r", "o", "y", "b"];
/// Gill sizes known to [`mushroom_model`].
pub const GILL_SIZES: [&str; 2] = ["b", "n"];

/// All-categorical edible (`e`) / poisonous (`p`) classifier.
///
/// Features: odor, spore print color, gill size. Positive scores mean poisonous.
pub fn mushroom_model() -> Model {
    let mut ensemble = Ensemble::single_output();
    // almond, anise, none smell edible
    ensemble.push_tree(tree(vec![Split::categorical(0, [0, 1, 2])], vec![-2.0, 2.5], 1), 0);
    // white and green spores plus narrow gills lean poisonous
    ensemble.push_tree(
        tree(
            vec![
                Split::categorical(1, [0, 1, 2, 3, 6, 7, 8]),
                Split::categorical(2, [0]),
            ],
            vec![-0.5, 1.0, 0.2, 1.5],
            1,
        ),
        0,
    );

    Model::builder()
        .ensemble(ensemble)
        .n_numeric_features(0)
        .encoder(CategoricalEncoder::new(vec![
            table(101, ODORS),
            table(102, SPORE_COLORS),
            table(103, GILL_SIZES),
        ]))
        .meta(ModelMeta::for_binary_classification().with_class_names(["e", "p"]))
        .build()
        .expect("fixture model must be valid")
}

// =============================================================================
// Random models
// =============================================================================

/// Shape of a model produced by [`random_model`].
#[derive(Debug, Clone, Copy)]
pub struct RandomModelSpec {
    pub n_trees: usize,
    pub depth: usize,
    pub n_numeric: usize,
    pub n_categorical: usize,
    pub n_outputs: usize,
    /// Known tokens per categorical feature.
    pub dictionary_size: usize,
}

impl Default for RandomModelSpec {
    fn default() -> Self {
        Self {
            n_trees: 50,
            depth: 6,
            n_numeric: 8,
            n_categorical: 2,
            n_outputs: 1,
            dictionary_size: 16,
        }
    }
}

/// Token `i` of a random model's dictionaries. Indices at or past the
/// dictionary size are unknown to the model.
pub fn random_token(i: usize) -> String {
    format!("tok{i}")
}

/// Seeded random model.
///
/// Thresholds and inputs share the range `[-1, 1]`. With several outputs,
/// every third tree has vector leaves and the others are assigned round-robin.
pub fn random_model(spec: RandomModelSpec, seed: u64) -> Model {
    let mut rng = StdRng::seed_from_u64(seed);
    let n_features = spec.n_numeric + spec.n_categorical;
    assert!(
        spec.depth == 0 || n_features > 0,
        "splits need at least one feature"
    );

    let mut ensemble = Ensemble::new(spec.n_outputs)
        .with_scale(rng.gen_range(0.5..1.5))
        .with_bias((0..spec.n_outputs).map(|_| rng.gen_range(-1.0..1.0)).collect());

    for t in 0..spec.n_trees {
        let splits = (0..spec.depth)
            .map(|_| {
                let feature = rng.gen_range(0..n_features);
                if feature < spec.n_numeric {
                    Split::numeric(feature as u32, rng.gen_range(-1.0..1.0))
                } else {
                    let left: Vec<u32> = (0..spec.dictionary_size as u32)
                        .filter(|_| rng.gen_bool(0.5))
                        .collect();
                    Split::categorical((feature - spec.n_numeric) as u32, left)
                }
            })
            .collect();

        let vector = spec.n_outputs > 1 && t % 3 == 2;
        let leaf_dim = if vector { spec.n_outputs } else { 1 };
        let leaves = (0..(leaf_dim << spec.depth))
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();
        let group = if vector { 0 } else { (t % spec.n_outputs) as u32 };
        ensemble.push_tree(tree(splits, leaves, leaf_dim), group);
    }

    let tables = (0..spec.n_categorical)
        .map(|f| {
            HashBucketTable::from_tokens(
                f as u32,
                (0..spec.dictionary_size).map(random_token),
            )
            .expect("fixture dictionary must be collision-free")
        })
        .collect();

    let meta = if spec.n_outputs == 1 {
        ModelMeta::for_regression()
    } else {
        ModelMeta::for_multiclass(spec.n_outputs)
    };

    Model::builder()
        .ensemble(ensemble)
        .n_numeric_features(spec.n_numeric)
        .encoder(CategoricalEncoder::new(tables))
        .meta(meta)
        .build()
        .expect("random model must be valid")
}

/// Seeded rows for `model`: about 5% NaN numerics and about 10% unknown tokens.
pub fn random_rows(model: &Model, n_rows: usize, seed: u64) -> (Array2<f32>, Array2<String>) {
    let mut rng = StdRng::seed_from_u64(seed);

    let numeric = Array2::from_shape_fn((n_rows, model.n_numeric_features()), |_| {
        if rng.gen_bool(0.05) {
            f32::NAN
        } else {
            rng.gen_range(-1.0..1.0)
        }
    });

    let sizes = model.encoder().bucket_counts();
    let tokens = Array2::from_shape_fn((n_rows, sizes.len()), |(_, f)| {
        let known = sizes[f];
        let unknown = known.div_ceil(9).max(1);
        random_token(rng.gen_range(0..known + unknown))
    });

    (numeric, tokens)
}
