use disruption_classifiers::config::{ModelType, ParameterSetting};
use disruption_classifiers::models::factory;
use ndarray::Array2;

#[test]
fn test_factory_builds_and_predicts() {
    // tiny dataset
    let x = Array2::from_shape_vec(
        (6, 2),
        vec![
            1.0, 0.0, // disruption
            0.0, 1.0, // no disruption
            1.0, 0.1, // disruption
            0.0, 0.9, // no disruption
            1.1, 0.0, // disruption
            0.0, 1.2, // no disruption
        ],
    )
    .expect("failed to create feature matrix");
    let y = vec![1u8, 0, 1, 0, 1, 0];

    let setting = ParameterSetting {
        learning_rate: 0.1,
        max_depth: 3,
        n_estimators: 3,
        subsample: 1.0,
    };

    for model_type in [ModelType::default(), "gbdt".parse().unwrap()] {
        let mut model = factory::build_model(&model_type, setting, 0);
        assert_eq!(model.name(), model_type.name());
        model.fit(&x, &y).unwrap();
        let probs = model.predict_proba(&x).unwrap();
        assert_eq!(probs.len(), x.nrows());
    }
}

#[test]
fn native_model_exposes_its_trees() {
    let x = Array2::from_shape_fn((20, 2), |(r, c)| (r * (c + 1)) as f64);
    let y: Vec<u8> = (0..20).map(|r| u8::from(r >= 14)).collect();
    let setting = ParameterSetting {
        n_estimators: 4,
        ..ParameterSetting::default()
    };

    let mut model = factory::build_model(&ModelType::default(), setting, 1);
    model.fit(&x, &y).unwrap();
    let ensemble = model.tree_ensemble().expect("boosted trees expose an ensemble");
    assert_eq!(ensemble.trees.len(), 4);
    assert_eq!(ensemble.n_features, 2);
    assert!((ensemble.base_score - (6.0f64 / 14.0).ln()).abs() < 1e-12);
}
