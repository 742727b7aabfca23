//! End-to-end scoring of the fixture models.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use ndarray::{array, Array2};
use rstest::rstest;

use symtree::repr::{Ensemble, ObliviousTree};
use symtree::testing::{self, RandomModelSpec};
use symtree::{
    evaluate_batch, evaluate_batch_range, evaluate_row, Error, Evaluator, EvaluatorConfig,
    FeatureRow, FeatureShapeError, FeatureValue, Model, ModelMeta,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn no_tokens(n_rows: usize) -> Array2<&'static str> {
    Array2::from_shape_vec((n_rows, 0), vec![]).unwrap()
}

// =============================================================================
// Regression in log space
// =============================================================================

#[test]
fn log_price_regression() {
    init_logging();
    let model = testing::log_price_model();

    // rooms, crime rate
    let numeric = array![[5.0f32, 0.1], [6.5, 0.8], [8.0, 0.2], [8.0, 1.0]];
    let scores = evaluate_batch(&model, numeric.view(), no_tokens(4).view()).unwrap();
    assert_eq!(scores.n_outputs(), 1);

    let expected_log = [-0.1, 0.15, 0.55, 0.3];
    for (row, &delta) in expected_log.iter().enumerate() {
        let price = scores.get(row, 0).exp();
        assert_relative_eq!(price, 20.0 * f64::exp(delta), max_relative = 1e-12);
    }

    // predicted prices stay within a log delta of 0.4 of the observed ones
    let observed = [18.2, 24.0, 36.2, 21.7];
    let misses = observed
        .iter()
        .enumerate()
        .filter(|&(row, &price)| (scores.get(row, 0) - f64::ln(price)).abs() >= 0.4)
        .count();
    assert_eq!(misses, 0);
}

// =============================================================================
// Multiclass argmax
// =============================================================================

#[rstest]
#[case::setosa([5.1, 3.5, 1.4, 0.2], 0)]
#[case::versicolor([6.4, 3.2, 4.5, 1.5], 1)]
#[case::virginica_wide([6.3, 3.3, 6.0, 2.5], 2)]
#[case::virginica_long([7.2, 3.0, 5.8, 1.6], 2)]
fn iris_argmax(#[case] flower: [f32; 4], #[case] class: usize) {
    let model = testing::iris_model();
    let numeric = Array2::from_shape_vec((1, 4), flower.to_vec()).unwrap();
    let scores = evaluate_batch(&model, numeric.view(), no_tokens(1).view()).unwrap();

    assert_eq!(scores.n_outputs(), 3);
    assert_eq!(scores.argmax(), vec![class]);
    let names = model.meta().class_names.as_ref().unwrap();
    assert!(!names[class].is_empty());
}

#[test]
fn iris_scores_sum_vector_leaves() {
    let model = testing::iris_model();
    let numeric = array![[6.4f32, 3.2, 4.5, 1.5]];
    let scores = evaluate_batch(&model, numeric.view(), no_tokens(1).view()).unwrap();
    let row = scores.row(0);
    assert_abs_diff_eq!(row[0], -0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(row[1], 1.3, epsilon = 1e-12);
    assert_abs_diff_eq!(row[2], 0.1, epsilon = 1e-12);

    let probs = scores.softmax();
    assert_abs_diff_eq!(probs.row(0).sum(), 1.0, epsilon = 1e-12);
}

// =============================================================================
// Categorical features
// =============================================================================

#[rstest]
#[case::no_odor_black_spores(["n", "k", "b"], -2.5)]
#[case::foul_white_narrow(["f", "w", "n"], 4.0)]
#[case::almond_white_broad(["a", "w", "b"], -1.0)]
#[case::unknown_odor(["smoky", "k", "n"], 2.7)]
fn mushroom_scores(#[case] tokens: [&str; 3], #[case] expected: f64) {
    let model = testing::mushroom_model();
    let numeric = Array2::<f32>::zeros((1, 0));
    let tokens = Array2::from_shape_vec((1, 3), tokens.to_vec()).unwrap();
    let scores = evaluate_batch(&model, numeric.view(), tokens.view()).unwrap();
    assert_abs_diff_eq!(scores.get(0, 0), expected, epsilon = 1e-12);
    assert_eq!(scores.predicted_classes(), vec![usize::from(expected > 0.0)]);
}

#[test]
fn nan_and_unknown_routing() {
    let model = testing::mixed_binary_model();
    let numeric = array![[0.7f32, 3.0], [f32::NAN, f32::NAN]];
    let tokens = array![["red", "big"], ["purple", "small"]];
    let scores = evaluate_batch(&model, numeric.view(), tokens.view()).unwrap();

    assert_abs_diff_eq!(scores.get(0, 0), 0.4, epsilon = 1e-12);
    assert_abs_diff_eq!(scores.get(1, 0), -0.4, epsilon = 1e-12);
}

#[test]
fn single_row_agrees_with_batch() {
    let model = testing::mixed_binary_model();
    let row = evaluate_row(&model, FeatureRow::new(&[f32::NAN, f32::NAN], &["purple", "small"]))
        .unwrap();
    assert_eq!(row.len(), 1);
    assert_abs_diff_eq!(row[0], -0.4, epsilon = 1e-12);
}

// =============================================================================
// Tree ranges and shapes
// =============================================================================

#[test]
fn tree_range_prefixes() {
    let model = testing::log_price_model();
    let numeric = array![[8.0f32, 0.2]];
    let tokens = no_tokens(1);

    let none = evaluate_batch_range(&model, numeric.view(), tokens.view(), 0).unwrap();
    assert_abs_diff_eq!(none.get(0, 0), 20f64.ln(), epsilon = 1e-12);

    let first = evaluate_batch_range(&model, numeric.view(), tokens.view(), 1).unwrap();
    assert_abs_diff_eq!(first.get(0, 0), 20f64.ln() + 0.3, epsilon = 1e-12);

    let all = evaluate_batch(&model, numeric.view(), tokens.view()).unwrap();
    let clamped = evaluate_batch_range(&model, numeric.view(), tokens.view(), 99).unwrap();
    assert_eq!(all, clamped);
}

#[test]
fn shape_errors() {
    let model = testing::mixed_binary_model();
    let tokens = array![["red", "big"]];

    let err = evaluate_batch(&model, array![[1.0f32]].view(), tokens.view()).unwrap_err();
    assert!(matches!(
        err,
        Error::FeatureShape(FeatureShapeError::NumericColumns { expected: 2, actual: 1 })
    ));

    let err = evaluate_batch(&model, array![[1.0f32, 2.0], [3.0, 4.0]].view(), tokens.view())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::FeatureShape(FeatureShapeError::RowCountMismatch { numeric: 2, categorical: 1 })
    ));
}

#[test]
fn featureless_model_scores_constants() {
    let mut ensemble = Ensemble::new(2).with_bias(vec![0.5, -0.5]).with_scale(2.0);
    ensemble.push_tree(ObliviousTree::constant(0.25), 1);
    ensemble.push_tree(ObliviousTree::new(vec![], vec![1.0, 3.0], 2).unwrap(), 0);
    let model = Model::builder()
        .ensemble(ensemble)
        .n_numeric_features(0)
        .meta(ModelMeta::for_multiclass(2))
        .build()
        .unwrap();
    assert_eq!(model.n_numeric_features(), 0);
    assert_eq!(model.n_categorical_features(), 0);

    let numeric = Array2::<f32>::zeros((3, 0));
    let scores = evaluate_batch(&model, numeric.view(), no_tokens(3).view()).unwrap();
    assert_eq!(scores.view().dim(), (3, 2));
    for row in 0..3 {
        assert_abs_diff_eq!(scores.get(row, 0), 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(scores.get(row, 1), 6.0, epsilon = 1e-12);
    }

    let no_strings: [&str; 0] = [];
    let single = evaluate_row(&model, FeatureRow::new(&[], &no_strings)).unwrap();
    assert_eq!(single, scores.row(0).to_vec());
}

#[test]
fn empty_batch() {
    let model = testing::iris_model();
    let numeric = Array2::<f32>::zeros((0, 4));
    let scores = evaluate_batch(&model, numeric.view(), no_tokens(0).view()).unwrap();
    assert_eq!(scores.view().dim(), (0, 3));
}

// =============================================================================
// Evaluator
// =============================================================================

#[rstest]
#[case(1, 64)]
#[case(4, 64)]
#[case(0, 7)]
#[case(3, 1)]
fn evaluator_matches_free_functions(#[case] n_threads: usize, #[case] block_size: usize) {
    init_logging();
    let spec = RandomModelSpec {
        n_outputs: 3,
        ..Default::default()
    };
    let model = testing::random_model(spec, 11);
    let (numeric, tokens) = testing::random_rows(&model, 500, 5);
    let expected = evaluate_batch(&model, numeric.view(), tokens.view()).unwrap();

    let config = EvaluatorConfig::builder()
        .cat_feature_indices(vec![8, 9])
        .n_threads(n_threads)
        .block_size(block_size)
        .build()
        .unwrap();
    let evaluator = Evaluator::new(model).with_config(config).unwrap();
    let scores = evaluator.evaluate_batch(numeric.view(), tokens.view()).unwrap();

    // per-row accumulation order does not depend on threads or blocks
    assert_eq!(scores, expected);
}

#[test]
fn evaluator_is_shared_across_threads() {
    let evaluator = Evaluator::new(testing::mushroom_model());
    let rows = array![[
        FeatureValue::from("f"),
        FeatureValue::from("w"),
        FeatureValue::from("n")
    ]];

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let evaluator = evaluator.clone();
                let rows = rows.view();
                scope.spawn(move || evaluator.evaluate_mixed(rows).unwrap())
            })
            .collect();
        for handle in handles {
            let scores = handle.join().unwrap();
            assert_abs_diff_eq!(scores.get(0, 0), 4.0, epsilon = 1e-12);
        }
    });
}

#[test]
fn evaluator_loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("price.symt");
    testing::log_price_model().save(&path).unwrap();

    let evaluator = Evaluator::load(&path).unwrap();
    assert_eq!(**evaluator.model(), testing::log_price_model());
    let model: &Model = evaluator.model();
    assert_eq!(model.n_trees(), 2);
}
