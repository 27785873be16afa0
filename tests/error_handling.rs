use music_advisor::{
    AdvisorConfig, AdvisoryPipeline, AdvisoryRequest, CacheError, CohortNormsSnapshot,
    ConfigLoadError, IndexConfig, IndexError, NormsError, PipelineError, PolicyError,
    ScoringError, ScoringPolicy, SegmentationResult, SimilarityIndex, Span, TimingInfo,
    compute_advisory, query_neighbors,
};
use std::error::Error;
use std::sync::Arc;

fn two_refs() -> SimilarityIndex {
    SimilarityIndex::build(
        vec![("a", vec![1.0, 0.0]), ("b", vec![0.0, 1.0])],
        IndexConfig::default(),
    )
    .expect("index")
}

#[test]
fn short_axis_vector_is_rejected() {
    let result = compute_advisory(&[0.5; 5], None, &ScoringPolicy::default(), None);
    assert!(matches!(
        result,
        Err(PipelineError::Scoring(ScoringError::InvalidInput(_)))
    ));
}

#[test]
fn non_finite_axis_is_rejected() {
    let axes = [0.5, 0.5, f64::NAN, 0.5, 0.5, 0.5];
    let result = compute_advisory(&axes, None, &ScoringPolicy::default(), None);
    assert!(matches!(result, Err(PipelineError::Scoring(_))));
}

#[test]
fn out_of_range_policy_is_rejected() {
    for policy in [
        ScoringPolicy::default().with_score_cap(1.5),
        ScoringPolicy::default().with_timing_confidence_gate(-0.1),
        ScoringPolicy::default().with_lift_window_duration(0.0),
    ] {
        let result = AdvisoryPipeline::new(policy);
        assert!(
            matches!(result, Err(PipelineError::Policy(PolicyError::InvalidConfig(_)))),
            "{result:?}"
        );
    }
}

#[test]
fn zero_sample_rate_fails_the_timing_stage() {
    let seg = SegmentationResult::new(
        None,
        0.9,
        Span::new(0.0, 10.0).expect("verse"),
        Span::new(20.0, 30.0).expect("chorus"),
    )
    .expect("segmentation");
    let signal = vec![0.0f32; 100];
    let result = compute_advisory(
        &[0.5; 6],
        Some(TimingInfo::new(&signal, 0, &seg)),
        &ScoringPolicy::default(),
        None,
    );
    assert!(matches!(result, Err(PipelineError::Scoring(_))));
}

#[test]
fn inverted_span_is_invalid_input() {
    assert!(matches!(
        Span::new(10.0, 5.0),
        Err(ScoringError::InvalidInput(_))
    ));
}

#[test]
fn query_dimension_mismatch_is_invalid_input() {
    let index = two_refs();
    assert!(matches!(
        query_neighbors(&index, &[1.0, 0.0, 0.0], None, None),
        Err(IndexError::InvalidInput(_))
    ));
    assert!(matches!(
        query_neighbors(&index, &[1.0, 0.0], Some(0), None),
        Err(IndexError::InvalidInput(_))
    ));
}

#[test]
fn bad_echo_vector_fails_the_whole_advisory() {
    let pipeline = AdvisoryPipeline::new(ScoringPolicy::default())
        .expect("pipeline")
        .with_index(Arc::new(two_refs()));
    let axes = [0.5; 6];
    let echo = [1.0f32, f32::INFINITY];
    let request = AdvisoryRequest::new(&axes).with_echo_vector(&echo);
    assert!(matches!(
        pipeline.compute_advisory(&request, None),
        Err(PipelineError::Index(IndexError::InvalidInput(_)))
    ));
}

#[test]
fn empty_cohort_cannot_be_indexed() {
    let empty: Vec<(String, Vec<f32>)> = Vec::new();
    assert!(matches!(
        SimilarityIndex::build(empty, IndexConfig::default()),
        Err(IndexError::InvalidInput(_))
    ));
}

#[test]
fn snapshot_without_identity_is_a_configuration_error() {
    let result = CohortNormsSnapshot::from_json_str(r#"{"region": "US", "lanes": {}}"#);
    assert!(matches!(result, Err(NormsError::Configuration(_))));

    let result = CohortNormsSnapshot::from_json_str("not json");
    assert!(matches!(result, Err(NormsError::Parse(_))));
}

#[test]
fn unsupported_config_version_is_reported() {
    let result = AdvisorConfig::from_yaml("version: \"9\"\n");
    assert!(matches!(result, Err(ConfigLoadError::UnsupportedVersion(_))));
}

#[test]
fn unknown_cache_backend_is_a_validation_error() {
    let result = AdvisorConfig::from_yaml("version: \"1.0\"\ncache:\n  backend: \"postgres\"\n");
    assert!(matches!(result, Err(ConfigLoadError::Validation(_))));
}

#[test]
fn missing_norms_section_is_a_missing_field() {
    let config = AdvisorConfig::default();
    assert!(matches!(config.norms(), Err(ConfigLoadError::MissingField(_))));
}

#[test]
fn pipeline_error_display_and_source() {
    let err = PipelineError::from(ScoringError::InvalidInput("axis vector too short".into()));
    assert_eq!(
        err.to_string(),
        "scoring failure: invalid input: axis vector too short"
    );
    assert!(err.source().is_some());

    let err = PipelineError::from(CacheError::Decode("truncated".into()));
    assert!(err.to_string().starts_with("feature cache failure"));

    let err = PipelineError::from(NormsError::MissingNorms("lane".into()));
    assert!(matches!(err, PipelineError::Norms(NormsError::MissingNorms(_))));
}
