use music_advisor::{
    AdvisoryPipeline, AdvisoryRequest, CohortNormsSnapshot, IndexConfig, Metric,
    PolicyCommentary, ScoringPolicy, SimilarityIndex, SourceKind, TrackFeatures, compute_advisory,
    query_neighbors,
};
use std::sync::Arc;

const SNAPSHOT: &str = r#"{
    "region": "US",
    "tier": "Hot100",
    "version": "2024-YE",
    "lanes": {
        "tier1:2015_2024": {
            "features": {
                "tempo_bpm": {"p10": 80, "p25": 90, "p50": 102, "p75": 120, "p90": 130, "mean": 105, "std": 15}
            },
            "axes": {
                "Energy": {"mean": 0.6, "std": 0.1},
                "Valence": {"mean": 0.5, "std": 0.1}
            },
            "composite": {"mean": 0.5, "std": 0.05}
        }
    }
}"#;

fn worded_policy() -> ScoringPolicy {
    ScoringPolicy::default().with_commentary(PolicyCommentary {
        structural_priors: vec![
            "Hook inside the first 30 seconds.".into(),
            "Chorus returns at least three times.".into(),
        ],
        caps_note: Some("Scores above the cap are clipped for advisory use.".into()),
    })
}

#[test]
fn commentary_wording_never_changes_the_score() {
    let axes = [0.71, 0.42, 0.66, 0.58, 0.93, 0.12];
    let plain = compute_advisory(&axes, None, &ScoringPolicy::default(), None).expect("plain");
    let worded = compute_advisory(&axes, None, &worded_policy(), None).expect("worded");

    let a = plain.canonical_score.expect("score");
    let b = worded.canonical_score.expect("score");
    assert_eq!(a.to_bits(), b.to_bits());
    assert_eq!(plain.provenance.policy_fingerprint, worded.provenance.policy_fingerprint);
}

#[test]
fn framing_observation_never_changes_the_score() {
    let snapshot = CohortNormsSnapshot::from_json_str(SNAPSHOT).expect("snapshot");
    let pipeline = AdvisoryPipeline::new(ScoringPolicy::default()).expect("pipeline");
    let axes = [0.55, 0.61, 0.47, 0.72, 0.38, 0.64];
    let base = AdvisoryRequest::new(&axes).with_lane_inputs(Some(2018), Some(7), SourceKind::Reference);

    let neutral = pipeline
        .compute_advisory(&base, Some(&snapshot))
        .expect("neutral");
    let framed = pipeline
        .compute_advisory(&base.clone().with_framing(0.9, 0.2), Some(&snapshot))
        .expect("framed");

    let a = neutral.canonical_score.expect("score");
    let b = framed.canonical_score.expect("score");
    assert_eq!(a.to_bits(), b.to_bits());
    assert_eq!(neutral.composite_z, framed.composite_z);
    assert_eq!(neutral.axes, framed.axes);
    assert_ne!(neutral.goldilocks, framed.goldilocks);
    assert!((framed.goldilocks.delta_emotional - 0.3).abs() < 1e-12);
    assert!(framed.goldilocks.safety_note.contains("unchanged"));
}

#[test]
fn identical_requests_serialize_identically() {
    let snapshot = CohortNormsSnapshot::from_json_str(SNAPSHOT).expect("snapshot");
    let index = SimilarityIndex::build(
        vec![
            ("ref-1", vec![0.2, 0.9, 0.1]),
            ("ref-2", vec![0.8, 0.1, 0.3]),
            ("ref-3", vec![0.5, 0.5, 0.5]),
        ],
        IndexConfig::default(),
    )
    .expect("index");
    let pipeline = AdvisoryPipeline::new(ScoringPolicy::default())
        .expect("pipeline")
        .with_index(Arc::new(index));

    let axes = [0.55, 0.61, 0.47, 0.72, 0.38, 0.64];
    let echo = [0.6f32, 0.4, 0.35];
    let features = TrackFeatures {
        tempo_bpm: Some(128.0),
        ..Default::default()
    };
    let request = AdvisoryRequest::new(&axes)
        .with_features(features)
        .with_lane_inputs(Some(2018), Some(7), SourceKind::Reference)
        .with_echo_vector(&echo);

    let first = pipeline
        .compute_advisory(&request, Some(&snapshot))
        .expect("first");
    let second = pipeline
        .compute_advisory(&request, Some(&snapshot))
        .expect("second");

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).expect("json"),
        serde_json::to_string(&second).expect("json")
    );
}

#[test]
fn equal_similarity_keeps_insertion_order() {
    let index = SimilarityIndex::build(
        vec![
            ("first", vec![1.0, 0.0]),
            ("second", vec![1.0, 0.0]),
            ("third", vec![1.0, 0.0]),
            ("far", vec![0.0, 1.0]),
        ],
        IndexConfig::default(),
    )
    .expect("index");

    for metric in [Metric::Cosine, Metric::Euclidean, Metric::Manhattan] {
        let ids: Vec<String> = query_neighbors(&index, &[2.0, 0.0], Some(3), Some(metric))
            .expect("query")
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, ["first", "second", "third"], "{metric}");
    }
}

#[test]
fn suggestion_order_is_stable_across_runs() {
    let policy = ScoringPolicy::default();
    let axes = [0.1, 0.9, 0.1, 0.9, 0.1, 0.9];
    let runs: Vec<Vec<String>> = (0..5)
        .map(|_| {
            compute_advisory(&axes, None, &policy, None)
                .expect("advisory")
                .optimization
                .into_iter()
                .map(|s| s.comment)
                .collect()
        })
        .collect();
    assert!(!runs[0].is_empty());
    assert!(runs.windows(2).all(|w| w[0] == w[1]));
}
