mod common;

use std::fs;

use clarity_topics::{
    ArtifactError, ArtifactPaths, ClassifierError, HashingEmbedder, TopicPredictor, TrainConfig, Trainer,
};
use std::sync::Arc;

fn trained_predictor(dir: &std::path::Path) -> Result<TopicPredictor, Box<dyn std::error::Error>> {
    let paths = ArtifactPaths::new(dir);
    let trainer = Trainer::new(common::embedder(), TrainConfig::default().with_test_size(0.0));
    trainer.run(&common::counseling_corpus(), &paths)?;
    Ok(TopicPredictor::from_artifacts(common::embedder(), &paths)?)
}

#[test]
fn test_end_to_end_ranks_anxiety_first() -> Result<(), Box<dyn std::error::Error>> {
    common::init();
    let dir = tempfile::tempdir()?;
    let predictor = trained_predictor(dir.path())?;

    let predictions = predictor.predict("I am worried about my job interview", 5)?;
    assert_eq!(predictions.len(), 3);
    assert_eq!(predictions[0].topic, "anxiety");
    assert_eq!(predictor.predict_topic("I am worried about my job interview")?, "anxiety");
    Ok(())
}

#[test]
fn test_training_with_validation_split() -> Result<(), Box<dyn std::error::Error>> {
    common::init();
    let dir = tempfile::tempdir()?;
    let paths = ArtifactPaths::new(dir.path().join("weights"));
    let report = Trainer::new(common::embedder(), TrainConfig::default()).run(&common::counseling_corpus(), &paths)?;

    assert_eq!(report.num_train + report.num_validation, 18);
    assert_eq!(report.num_validation, 4);
    let evaluation = report.evaluation.expect("validation split is not empty");
    assert_eq!(evaluation.classes.len(), 3);
    assert_eq!(evaluation.classes.iter().map(|c| c.support).sum::<usize>(), 4);
    assert!(paths.classifier.exists());
    assert!(paths.label_encoder.exists());
    Ok(())
}

#[test]
fn test_predictions_are_deterministic() -> Result<(), Box<dyn std::error::Error>> {
    common::init();
    let dir = tempfile::tempdir()?;
    let predictor = trained_predictor(dir.path())?;

    let first = predictor.predict("I keep waking up in the night", 3)?;
    let second = predictor.predict("I keep waking up in the night", 3)?;
    assert_eq!(first, second);

    // A second training run on the same corpus produces the same weights
    let other_dir = tempfile::tempdir()?;
    let retrained = trained_predictor(other_dir.path())?;
    assert_eq!(first, retrained.predict("I keep waking up in the night", 3)?);
    Ok(())
}

#[test]
fn test_confidence_properties() -> Result<(), Box<dyn std::error::Error>> {
    common::init();
    let dir = tempfile::tempdir()?;
    let predictor = trained_predictor(dir.path())?;

    for text in ["my partner ignores me", "sleep", "I feel nervous all day", "what should I do?"] {
        let predictions = predictor.predict(text, 10)?;
        assert_eq!(predictions.len(), predictor.labels().len());
        for pair in predictions.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
        for prediction in &predictions {
            assert!((0.0..=1.0).contains(&prediction.confidence));
        }
        let total: f32 = predictions.iter().map(|p| p.confidence).sum();
        assert!((total - 1.0).abs() < 1e-4, "confidences sum to {}", total);
    }
    Ok(())
}

#[test]
fn test_empty_text_is_a_validation_error() -> Result<(), Box<dyn std::error::Error>> {
    common::init();
    let dir = tempfile::tempdir()?;
    let predictor = trained_predictor(dir.path())?;

    assert!(matches!(predictor.predict("", 5), Err(ClassifierError::ValidationError(_))));
    assert!(matches!(predictor.predict(" \n\t", 5), Err(ClassifierError::ValidationError(_))));
    Ok(())
}

#[test]
fn test_labels_are_exported_on_load() -> Result<(), Box<dyn std::error::Error>> {
    common::init();
    let dir = tempfile::tempdir()?;
    trained_predictor(dir.path())?;

    let exported: serde_json::Value = serde_json::from_str(&fs::read_to_string(dir.path().join("label_encoder.json"))?)?;
    assert_eq!(exported, serde_json::json!({"classes": ["anxiety", "relationships", "sleep"]}));
    Ok(())
}

#[test]
fn test_loading_with_a_different_embedder_fails() -> Result<(), Box<dyn std::error::Error>> {
    common::init();
    let dir = tempfile::tempdir()?;
    trained_predictor(dir.path())?;

    let wider = Arc::new(HashingEmbedder::new(512)?);
    let result = TopicPredictor::from_artifacts(wider, &ArtifactPaths::new(dir.path()));
    assert!(matches!(result, Err(ArtifactError::EmbeddingMismatch { .. })));
    Ok(())
}

#[test]
fn test_missing_artifacts_fail_to_load() {
    common::init();
    let dir = tempfile::tempdir().unwrap();
    let result = TopicPredictor::from_artifacts(common::embedder(), &ArtifactPaths::new(dir.path()));
    assert!(matches!(result, Err(ArtifactError::Io { .. })));
}
