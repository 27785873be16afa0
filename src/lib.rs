//! Workspace umbrella crate for the music advisory pipeline.
//!
//! This crate wires the stage crates together so callers can turn one set of
//! already-extracted measurements into an [`Advisory`] with a single call:
//!
//! ```text
//! axes ─► composite score ─► timing gate ─► lane ─► norms ─► neighbours ─► synthesis
//! ```
//!
//! Every stage reads the same borrowed [`ScoringPolicy`]. Nothing here holds
//! global state: the policy, lane tables, reference index, feature cache and
//! metrics observer are all fields of an [`AdvisoryPipeline`].

pub mod config;

pub use cache::{
    CacheBackend, CacheBackendConfig, CacheConfig, CacheEntry, CacheError, CacheLookup,
    CompressionCodec, CompressionConfig, FeatureCache, content_hash, file_content_hash,
    source_mtime,
};
pub use config::{AdvisorConfig, ConfigLoadError};
pub use index::{AnnConfig, IndexConfig, IndexError, Metric, Neighbor, SimilarityIndex};
pub use norms::{
    CohortNormsSnapshot, Lane, LaneClassifier, NormsError, PercentileBin, ResolvedNorms,
    SnapshotLoader, SourceKind,
};
pub use policy::{PolicyCommentary, PolicyError, ScoringPolicy};
pub use recommend::{
    Advisory, AxisLevel, DroppedFeature, FramingObservation, Goldilocks, MarketComparison,
    ScoreBand, StructuralGates, Suggestion, SuggestionKind, TrackFeatures,
};
pub use scoring::{
    AxisVector, CompositeScore, GateDecision, ScoringError, SegmentationResult, Span,
    TimingEvidence, TimingOutcome, TimingSource,
};

use recommend::{NormsAvailability, SynthesisInput, synthesize};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Level, info, warn};

/// Errors that can occur while computing an advisory.
#[derive(Debug)]
pub enum PipelineError {
    Policy(PolicyError),
    Scoring(ScoringError),
    Norms(NormsError),
    Index(IndexError),
    Cache(CacheError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Policy(err) => write!(f, "policy rejected: {err}"),
            PipelineError::Scoring(err) => write!(f, "scoring failure: {err}"),
            PipelineError::Norms(err) => write!(f, "norms failure: {err}"),
            PipelineError::Index(err) => write!(f, "neighbour query failed: {err}"),
            PipelineError::Cache(err) => write!(f, "feature cache failure: {err}"),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PipelineError::Policy(err) => Some(err),
            PipelineError::Scoring(err) => Some(err),
            PipelineError::Norms(err) => Some(err),
            PipelineError::Index(err) => Some(err),
            PipelineError::Cache(err) => Some(err),
        }
    }
}

impl From<PolicyError> for PipelineError {
    fn from(value: PolicyError) -> Self {
        PipelineError::Policy(value)
    }
}

impl From<ScoringError> for PipelineError {
    fn from(value: ScoringError) -> Self {
        PipelineError::Scoring(value)
    }
}

impl From<NormsError> for PipelineError {
    fn from(value: NormsError) -> Self {
        PipelineError::Norms(value)
    }
}

impl From<IndexError> for PipelineError {
    fn from(value: IndexError) -> Self {
        PipelineError::Index(value)
    }
}

impl From<CacheError> for PipelineError {
    fn from(value: CacheError) -> Self {
        PipelineError::Cache(value)
    }
}

/// How a [`AdvisoryPipeline::cached_features`] call was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    /// Miss or stale entry; the value was computed and stored.
    Computed,
    /// No cache configured.
    Bypassed,
}

/// Metrics observer for pipeline stages.
pub trait PipelineMetrics: Send + Sync {
    fn record_scoring(&self, latency: Duration, result: Result<(), ScoringError>);
    fn record_timing(&self, latency: Duration, result: Result<GateDecision, ScoringError>);
    /// `available` is false when norms were absent or the lane missed.
    fn record_overlay(&self, latency: Duration, available: bool);
    fn record_neighbors(&self, latency: Duration, result: Result<usize, IndexError>);
    fn record_cache(&self, latency: Duration, result: Result<CacheOutcome, CacheError>);
}

struct MetricsSpan {
    recorder: Arc<dyn PipelineMetrics>,
    start: Instant,
}

impl MetricsSpan {
    fn start(recorder: Option<&Arc<dyn PipelineMetrics>>) -> Option<Self> {
        recorder.map(|recorder| Self {
            recorder: Arc::clone(recorder),
            start: Instant::now(),
        })
    }

    fn record_scoring(self, result: Result<(), ScoringError>) {
        self.recorder.record_scoring(self.start.elapsed(), result);
    }

    fn record_timing(self, result: Result<GateDecision, ScoringError>) {
        self.recorder.record_timing(self.start.elapsed(), result);
    }

    fn record_overlay(self, available: bool) {
        self.recorder.record_overlay(self.start.elapsed(), available);
    }

    fn record_neighbors(self, result: Result<usize, IndexError>) {
        self.recorder.record_neighbors(self.start.elapsed(), result);
    }

    fn record_cache(self, result: Result<CacheOutcome, CacheError>) {
        self.recorder.record_cache(self.start.elapsed(), result);
    }
}

/// Raw signal plus segmentation for the timing gate.
#[derive(Debug, Clone, Copy)]
pub struct TimingInfo<'a> {
    pub signal: &'a [f32],
    pub sample_rate: u32,
    pub segmentation: &'a SegmentationResult,
}

impl<'a> TimingInfo<'a> {
    pub fn new(signal: &'a [f32], sample_rate: u32, segmentation: &'a SegmentationResult) -> Self {
        Self {
            signal,
            sample_rate,
            segmentation,
        }
    }
}

/// One track's worth of inputs.
#[derive(Debug, Clone)]
pub struct AdvisoryRequest<'a> {
    pub axes: &'a [f64],
    pub features: TrackFeatures,
    pub timing: Option<TimingInfo<'a>>,
    pub release_year: Option<i32>,
    pub chart_rank: Option<u32>,
    pub source_kind: SourceKind,
    /// Query vector for the reference index.
    pub echo_vector: Option<&'a [f32]>,
    /// Reference id of this track, skipped in neighbour results.
    pub exclude_id: Option<&'a str>,
    /// Observed market/emotional framing for the Goldilocks block.
    pub framing: FramingObservation,
}

impl<'a> AdvisoryRequest<'a> {
    pub fn new(axes: &'a [f64]) -> Self {
        Self {
            axes,
            features: TrackFeatures::default(),
            timing: None,
            release_year: None,
            chart_rank: None,
            source_kind: SourceKind::default(),
            echo_vector: None,
            exclude_id: None,
            framing: FramingObservation::default(),
        }
    }

    pub fn with_features(mut self, features: TrackFeatures) -> Self {
        self.features = features;
        self
    }

    pub fn with_timing(mut self, timing: TimingInfo<'a>) -> Self {
        self.timing = Some(timing);
        self
    }

    pub fn with_lane_inputs(
        mut self,
        release_year: Option<i32>,
        chart_rank: Option<u32>,
        source_kind: SourceKind,
    ) -> Self {
        self.release_year = release_year;
        self.chart_rank = chart_rank;
        self.source_kind = source_kind;
        self
    }

    pub fn with_echo_vector(mut self, vector: &'a [f32]) -> Self {
        self.echo_vector = Some(vector);
        self
    }

    pub fn excluding(mut self, id: &'a str) -> Self {
        self.exclude_id = Some(id);
        self
    }

    /// Both values in `[0, 1]`; see [`FramingObservation::new`].
    pub fn with_framing(mut self, market: f64, emotional: f64) -> Self {
        self.framing = FramingObservation::new(market, emotional);
        self
    }
}

/// A snapshot directory plus the `(region, tier, version)` to read from it.
pub struct NormsSource {
    loader: SnapshotLoader,
    region: String,
    tier: String,
    version: String,
}

impl NormsSource {
    pub fn new(
        loader: SnapshotLoader,
        region: impl Into<String>,
        tier: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            loader,
            region: region.into(),
            tier: tier.into(),
            version: version.into(),
        }
    }

    /// Load (or reuse) the configured snapshot; `"latest"` is resolved on
    /// every call.
    pub fn load(&self) -> Result<Arc<CohortNormsSnapshot>, NormsError> {
        self.loader.load(&self.region, &self.tier, &self.version)
    }
}

impl fmt::Debug for NormsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormsSource")
            .field("root", &self.loader.root())
            .field("region", &self.region)
            .field("tier", &self.tier)
            .field("version", &self.version)
            .finish()
    }
}

/// Long-lived pipeline. Cheap to share behind an `Arc`; every method takes `&self`.
pub struct AdvisoryPipeline {
    policy: ScoringPolicy,
    classifier: LaneClassifier,
    index_config: IndexConfig,
    index: Option<Arc<SimilarityIndex>>,
    neighbor_k: Option<usize>,
    norms: Option<NormsSource>,
    cache: Option<FeatureCache>,
    metrics: Option<Arc<dyn PipelineMetrics>>,
}

impl fmt::Debug for AdvisoryPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdvisoryPipeline")
            .field("policy", &self.policy)
            .field("classifier", &self.classifier)
            .field("index_config", &self.index_config)
            .field("index", &self.index.as_ref().map(|i| i.len()))
            .field("neighbor_k", &self.neighbor_k)
            .field("norms", &self.norms)
            .field("cache", &self.cache.as_ref().map(|c| c.backend_name()))
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl AdvisoryPipeline {
    /// Validate `policy` and build a pipeline with default lane tables.
    pub fn new(policy: ScoringPolicy) -> Result<Self, PipelineError> {
        policy.validate()?;
        Ok(Self {
            policy,
            classifier: LaneClassifier::default(),
            index_config: IndexConfig::default(),
            index: None,
            neighbor_k: None,
            norms: None,
            cache: None,
            metrics: None,
        })
    }

    /// Build policy, lane tables, index settings, norms source and cache
    /// from a loaded config.
    ///
    /// The reference cohort itself is not part of the config; hand it to
    /// [`AdvisoryPipeline::with_reference_cohort`] afterwards.
    pub fn from_config(config: &AdvisorConfig) -> Result<Self, ConfigLoadError> {
        let policy = config.to_policy()?;
        let classifier = config.to_lane_classifier()?;
        let index_config = config.to_index_config()?;
        let cache = FeatureCache::new(config.to_cache_config()?)
            .map_err(|e| ConfigLoadError::Validation(format!("cache: {e}")))?;
        let mut pipeline = Self::new(policy)
            .map_err(|e| ConfigLoadError::Validation(e.to_string()))?
            .with_classifier(classifier)
            .with_index_config(index_config)
            .with_cache(cache);
        if let Some(norms) = &config.norms {
            pipeline = pipeline.with_norms_source(norms.to_norms_source());
        }
        Ok(pipeline)
    }

    pub fn with_classifier(mut self, classifier: LaneClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Settings used by [`AdvisoryPipeline::with_reference_cohort`].
    pub fn with_index_config(mut self, config: IndexConfig) -> Self {
        self.index_config = config;
        self
    }

    pub fn with_index(mut self, index: Arc<SimilarityIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Build the reference index from `(id, vector)` pairs with this
    /// pipeline's index settings.
    pub fn with_reference_cohort<I, S>(self, entries: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = (S, Vec<f32>)>,
        S: Into<String>,
    {
        let index = SimilarityIndex::build(entries, self.index_config.clone())?;
        info!(
            cohort = index.len(),
            dimension = index.dimension(),
            metric = %index.config().metric,
            "reference_index_built"
        );
        Ok(self.with_index(Arc::new(index)))
    }

    pub fn with_norms_source(mut self, source: NormsSource) -> Self {
        self.norms = Some(source);
        self
    }

    /// Neighbour count per request; the index default applies otherwise.
    pub fn with_neighbor_k(mut self, k: usize) -> Self {
        self.neighbor_k = Some(k);
        self
    }

    pub fn with_cache(mut self, cache: FeatureCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    pub fn classifier(&self) -> &LaneClassifier {
        &self.classifier
    }

    pub fn index_config(&self) -> &IndexConfig {
        &self.index_config
    }

    /// Snapshot from the configured norms source, or `None` when the
    /// pipeline has no source.
    pub fn load_norms(&self) -> Result<Option<Arc<CohortNormsSnapshot>>, PipelineError> {
        match &self.norms {
            Some(source) => Ok(Some(source.load()?)),
            None => Ok(None),
        }
    }

    /// Lane key for a request; `None` when tier or era is missing.
    pub fn lane_for(&self, request: &AdvisoryRequest<'_>) -> Option<String> {
        self.classifier
            .assign_lane(request.release_year, request.chart_rank, request.source_kind)
            .key()
    }

    /// Score, gate, overlay and synthesize one request.
    ///
    /// A missing snapshot, an unassigned lane or a lane absent from the
    /// snapshot degrades to an advisory marked `unavailable`; only contract
    /// violations are errors.
    pub fn compute_advisory(
        &self,
        request: &AdvisoryRequest<'_>,
        norms: Option<&CohortNormsSnapshot>,
    ) -> Result<Advisory, PipelineError> {
        let span = tracing::span!(Level::INFO, "advisor.compute_advisory");
        let _guard = span.enter();
        let started = Instant::now();
        let metrics = self.metrics.as_ref();

        let scoring_span = MetricsSpan::start(metrics);
        let scored = AxisVector::from_slice(request.axes)
            .map(|axes| (axes, CompositeScore::compute(&axes, &self.policy)));
        if let Some(span) = scoring_span {
            span.record_scoring(scored.as_ref().map(|_| ()).map_err(Clone::clone));
        }
        let (axes, score) = scored?;

        let timing = match request.timing {
            Some(info) => {
                let timing_span = MetricsSpan::start(metrics);
                let outcome = scoring::gate_timing(
                    info.signal,
                    info.sample_rate,
                    info.segmentation,
                    &self.policy,
                );
                if let Some(span) = timing_span {
                    span.record_timing(outcome.as_ref().map(|o| o.decision).map_err(Clone::clone));
                }
                Some(outcome?)
            }
            None => None,
        };

        let lane = self.lane_for(request);

        let overlay_span = MetricsSpan::start(metrics);
        let resolved = match (norms, lane.as_deref()) {
            (None, _) => Err("no norms snapshot supplied".to_string()),
            (Some(_), None) => Err("no lane assigned (missing tier or era)".to_string()),
            (Some(snapshot), Some(key)) => match snapshot.resolve(key) {
                Ok(resolved) => Ok(resolved),
                Err(NormsError::MissingNorms(reason)) => Err(reason),
                Err(other) => return Err(other.into()),
            },
        };
        let lane_label = lane.as_deref().unwrap_or("none");
        if let Err(reason) = &resolved {
            warn!(lane = %lane_label, reason = %reason, "norms_unavailable");
        }
        if let Some(span) = overlay_span {
            span.record_overlay(resolved.is_ok());
        }
        let availability = match &resolved {
            Ok(resolved) => NormsAvailability::Available(resolved),
            Err(reason) => NormsAvailability::Unavailable { reason },
        };

        let neighbors = match (&self.index, request.echo_vector) {
            (Some(index), Some(vector)) => {
                let neighbor_span = MetricsSpan::start(metrics);
                let found = match request.exclude_id {
                    Some(id) => index.query_excluding(vector, self.neighbor_k, None, id),
                    None => index.query(vector, self.neighbor_k, None),
                };
                if let Some(span) = neighbor_span {
                    span.record_neighbors(found.as_ref().map(Vec::len).map_err(Clone::clone));
                }
                found?
            }
            _ => Vec::new(),
        };

        let advisory = synthesize(
            &SynthesisInput {
                axes: &axes,
                score: Some(score),
                features: &request.features,
                timing: timing.as_ref(),
                neighbors: &neighbors,
                norms: availability,
                framing: request.framing,
            },
            &self.policy,
        );

        info!(
            lane = %lane_label,
            score = score.score,
            band = advisory.score_band.as_str(),
            norms = advisory.market_comparison.is_available(),
            neighbors = advisory.neighbors.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "advisory_computed"
        );
        Ok(advisory)
    }

    /// Neighbours of `vector` in the configured index.
    pub fn query_neighbors(
        &self,
        vector: &[f32],
        k: Option<usize>,
        metric: Option<Metric>,
    ) -> Result<Vec<Neighbor>, PipelineError> {
        let Some(index) = &self.index else {
            return Err(IndexError::InvalidInput("no reference index configured".to_string()).into());
        };
        let neighbor_span = MetricsSpan::start(self.metrics.as_ref());
        let found = query_neighbors(index, vector, k.or(self.neighbor_k), metric);
        if let Some(span) = neighbor_span {
            span.record_neighbors(found.as_ref().map(Vec::len).map_err(Clone::clone));
        }
        Ok(found?)
    }

    /// Load-or-compute an upstream extraction keyed by `content_hash` and
    /// this pipeline's policy fingerprint.
    ///
    /// Without a configured cache `compute` always runs.
    pub fn cached_features<T, F>(
        &self,
        content_hash: &str,
        source_mtime: Option<f64>,
        compute: F,
    ) -> Result<T, PipelineError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, PipelineError>,
    {
        let cache_span = MetricsSpan::start(self.metrics.as_ref());
        let Some(cache) = &self.cache else {
            let value = compute();
            if let Some(span) = cache_span {
                span.record_cache(Ok(CacheOutcome::Bypassed));
            }
            return value;
        };

        let fingerprint = self.policy.scoring_fingerprint();
        let mut computed = false;
        let result = cache.load_or_compute(content_hash, &fingerprint, source_mtime, || {
            computed = true;
            compute()
        });

        if let Some(span) = cache_span {
            let outcome = match &result {
                Ok(_) if computed => Ok(CacheOutcome::Computed),
                Ok(_) => Ok(CacheOutcome::Hit),
                Err(PipelineError::Cache(err)) => Err(err.clone()),
                // compute() itself failed; the cache did its part
                Err(_) => Ok(CacheOutcome::Computed),
            };
            span.record_cache(outcome);
        }
        result
    }
}

/// One-shot advisory with default lane tables and no index or cache.
///
/// No lane inputs are supplied, so any `norms` snapshot reports
/// `unavailable`; use [`AdvisoryPipeline`] with
/// [`AdvisoryRequest::with_lane_inputs`] for a market comparison.
pub fn compute_advisory(
    axes: &[f64],
    timing_info: Option<TimingInfo<'_>>,
    policy: &ScoringPolicy,
    norms: Option<&CohortNormsSnapshot>,
) -> Result<Advisory, PipelineError> {
    let pipeline = AdvisoryPipeline::new(policy.clone())?;
    let mut request = AdvisoryRequest::new(axes);
    request.timing = timing_info;
    pipeline.compute_advisory(&request, norms)
}

/// Ranked neighbours of `vector`, best first.
pub fn query_neighbors(
    index: &SimilarityIndex,
    vector: &[f32],
    k: Option<usize>,
    metric: Option<Metric>,
) -> Result<Vec<Neighbor>, IndexError> {
    let span = tracing::span!(
        Level::INFO,
        "advisor.query_neighbors",
        cohort = index.len(),
        k = ?k
    );
    let _guard = span.enter();
    let started = Instant::now();
    let neighbors = index.query(vector, k, metric)?;
    tracing::debug!(
        returned = neighbors.len(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "neighbors_queried"
    );
    Ok(neighbors)
}
