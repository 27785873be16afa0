use std::error::Error;
use std::sync::Arc;

use music_advisor::{
    AdvisorConfig, AdvisoryPipeline, AdvisoryRequest, CohortNormsSnapshot, IndexConfig,
    ScoringPolicy, SourceKind, TrackFeatures,
};
use tracing_subscriber::EnvFilter;

const DEMO_SNAPSHOT: &str = r#"{
    "region": "US",
    "tier": "Hot100",
    "version": "2024-YE",
    "last_refreshed_at": "2025-01-15T00:00:00Z",
    "lanes": {
        "tier1:2015_2024": {
            "features": {
                "tempo_bpm": {"p10": 84, "p25": 95, "p50": 110, "p75": 124, "p90": 136, "mean": 110, "std": 17},
                "duration_sec": {"p10": 150, "p25": 165, "p50": 190, "p75": 210, "p90": 230, "mean": 188, "std": 28},
                "loudness_lufs": {"p10": -11, "p25": -9.5, "p50": -8, "p75": -7, "p90": -6, "mean": -8.2, "std": 1.7}
            },
            "axes": {
                "TempoFit": {"mean": 0.55, "std": 0.12},
                "RuntimeFit": {"mean": 0.6, "std": 0.1},
                "LoudnessFit": {"mean": 0.58, "std": 0.1},
                "Energy": {"mean": 0.62, "std": 0.11},
                "Danceability": {"mean": 0.64, "std": 0.1},
                "Valence": {"mean": 0.48, "std": 0.15}
            },
            "composite": {"mean": 0.56, "std": 0.06}
        }
    }
}"#;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("ADVISOR_LOG_JSON").is_ok_and(|v| v == "1");
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    // Optional config path as the first argument; defaults otherwise.
    let pipeline = match std::env::args().nth(1) {
        Some(path) => AdvisoryPipeline::from_config(&AdvisorConfig::from_file(path)?)?,
        None => AdvisoryPipeline::new(ScoringPolicy::default())?
            .with_index_config(IndexConfig::new().with_default_k(2)),
    };

    let pipeline = pipeline.with_reference_cohort(vec![
        ("ref-2019-a", vec![0.61, 0.58, 0.66, 0.72, 0.69, 0.41]),
        ("ref-2021-b", vec![0.44, 0.52, 0.57, 0.49, 0.55, 0.63]),
        ("ref-2023-c", vec![0.70, 0.65, 0.61, 0.81, 0.77, 0.52]),
    ])?;
    // A configured norms directory wins over the built-in demo snapshot.
    let snapshot = match pipeline.load_norms()? {
        Some(snapshot) => snapshot,
        None => Arc::new(CohortNormsSnapshot::from_json_str(DEMO_SNAPSHOT)?),
    };

    let axes = [0.64, 0.57, 0.62, 0.74, 0.70, 0.44];
    let echo: Vec<f32> = axes.iter().map(|v| *v as f32).collect();
    let features = TrackFeatures {
        tempo_bpm: Some(122.0),
        duration_sec: Some(201.0),
        loudness_lufs: Some(-7.4),
        energy: Some(0.74),
        danceability: Some(0.70),
        valence: Some(0.44),
    };
    let request = AdvisoryRequest::new(&axes)
        .with_features(features)
        .with_lane_inputs(Some(2022), Some(18), SourceKind::Reference)
        .with_echo_vector(&echo);

    let advisory = pipeline.compute_advisory(&request, Some(snapshot.as_ref()))?;
    println!("{}", serde_json::to_string_pretty(&advisory)?);

    Ok(())
}
