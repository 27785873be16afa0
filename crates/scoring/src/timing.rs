//! Time-to-chorus gating and chorus-lift estimation.
//!
//! One decision per call: `Pass` or `Gate`.
//!
//! | confidence vs gate | timing_seconds | chorus lift | dropped set |
//! |---|---|---|---|
//! | below | `None` | absent | `{chorus_lift}` |
//! | at/above, spans ≥ window | passed through | present | empty |
//! | at/above, a span < window | passed through | absent | empty |
//!
//! Loudness is an RMS proxy, `20·log10(rms + 1e-12)`, over a window of
//! `lift_window_duration` seconds centred on each span's midpoint.

use policy::ScoringPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::ScoringError;

/// Confidence assigned to timing derived from audio analysis.
pub const AUDIO_TIMING_CONFIDENCE: f64 = 0.80;
/// Confidence assigned to timing derived from lyric alignment.
pub const LYRIC_TIMING_CONFIDENCE: f64 = 0.50;

const LOUDNESS_EPS: f64 = 1e-12;

/// Closed time interval in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub start: f64,
    pub end: f64,
}

impl Span {
    pub fn new(start: f64, end: f64) -> Result<Self, ScoringError> {
        let span = Self { start, end };
        span.validate()?;
        Ok(span)
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn midpoint(&self) -> f64 {
        self.start + self.duration() / 2.0
    }

    fn validate(&self) -> Result<(), ScoringError> {
        if !self.start.is_finite() || !self.end.is_finite() {
            return Err(ScoringError::invalid("span bounds must be finite"));
        }
        if self.end <= self.start {
            return Err(ScoringError::invalid(format!(
                "span end ({}) must be greater than start ({})",
                self.end, self.start
            )));
        }
        Ok(())
    }
}

/// Where a timing confidence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingSource {
    /// Measured by the upstream segmenter.
    #[default]
    Upstream,
    Audio,
    Lyrics,
    Absent,
}

/// Output of the upstream segmenter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationResult {
    pub timing_seconds: Option<f64>,
    pub timing_confidence: f64,
    pub verse_span: Span,
    pub chorus_span: Span,
    #[serde(default)]
    pub confidence_source: TimingSource,
}

impl SegmentationResult {
    pub fn new(
        timing_seconds: Option<f64>,
        timing_confidence: f64,
        verse_span: Span,
        chorus_span: Span,
    ) -> Result<Self, ScoringError> {
        let seg = Self {
            timing_seconds,
            timing_confidence,
            verse_span,
            chorus_span,
            confidence_source: TimingSource::Upstream,
        };
        seg.validate()?;
        Ok(seg)
    }

    /// Build a segmentation whose confidence comes from the evidence tiers.
    pub fn from_evidence(
        evidence: &TimingEvidence,
        verse_span: Span,
        chorus_span: Span,
    ) -> Result<Self, ScoringError> {
        let resolved = resolve_timing_confidence(evidence);
        let seg = Self {
            timing_seconds: resolved.timing_seconds,
            timing_confidence: resolved.confidence,
            verse_span,
            chorus_span,
            confidence_source: resolved.source,
        };
        seg.validate()?;
        Ok(seg)
    }

    pub fn validate(&self) -> Result<(), ScoringError> {
        if !self.timing_confidence.is_finite() || !(0.0..=1.0).contains(&self.timing_confidence) {
            return Err(ScoringError::invalid(format!(
                "timing_confidence must be in [0, 1], got {}",
                self.timing_confidence
            )));
        }
        if let Some(t) = self.timing_seconds {
            if !t.is_finite() {
                return Err(ScoringError::invalid("timing_seconds must be finite"));
            }
        }
        self.verse_span.validate()?;
        self.chorus_span.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    Pass,
    Gate,
}

/// Features withheld because timing confidence failed the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DroppedFeature {
    ChorusLift,
}

/// Result of [`gate_timing`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingOutcome {
    pub decision: GateDecision,
    pub timing_seconds: Option<f64>,
    pub timing_confidence: f64,
    pub confidence_source: TimingSource,
    /// Chorus minus verse loudness; positive means the chorus is louder.
    pub chorus_lift_db: Option<f64>,
    pub dropped_features: BTreeSet<DroppedFeature>,
}

/// Apply the confidence gate and, when it passes, estimate chorus lift.
pub fn gate_timing(
    signal: &[f32],
    sample_rate: u32,
    seg: &SegmentationResult,
    policy: &ScoringPolicy,
) -> Result<TimingOutcome, ScoringError> {
    if sample_rate == 0 {
        return Err(ScoringError::invalid("sample_rate must be greater than zero"));
    }
    seg.validate()?;

    if seg.timing_confidence < policy.timing_confidence_gate {
        debug!(
            confidence = seg.timing_confidence,
            gate = policy.timing_confidence_gate,
            "timing_gated"
        );
        return Ok(TimingOutcome {
            decision: GateDecision::Gate,
            timing_seconds: None,
            timing_confidence: seg.timing_confidence,
            confidence_source: seg.confidence_source,
            chorus_lift_db: None,
            dropped_features: BTreeSet::from([DroppedFeature::ChorusLift]),
        });
    }

    let window = policy.lift_window_duration;
    let chorus_lift_db = if seg.verse_span.duration() < window || seg.chorus_span.duration() < window
    {
        None
    } else {
        let verse = window_loudness(signal, sample_rate, seg.verse_span.midpoint(), window);
        let chorus = window_loudness(signal, sample_rate, seg.chorus_span.midpoint(), window);
        match (verse, chorus) {
            (Some(v), Some(c)) => Some(c - v),
            _ => None,
        }
    };

    debug!(
        confidence = seg.timing_confidence,
        lift = ?chorus_lift_db,
        "timing_passed"
    );

    Ok(TimingOutcome {
        decision: GateDecision::Pass,
        timing_seconds: seg.timing_seconds,
        timing_confidence: seg.timing_confidence,
        confidence_source: seg.confidence_source,
        chorus_lift_db,
        dropped_features: BTreeSet::new(),
    })
}

/// Sample range for `window` seconds centred on `center`, clipped to
/// `0..len`, plus the unclipped sample count.
fn window_bounds(len: usize, sample_rate: u32, center: f64, window: f64) -> (usize, usize, usize) {
    let sr = f64::from(sample_rate);
    let half = window / 2.0;
    let lo = ((center - half) * sr).floor();
    let hi = ((center + half) * sr).ceil();
    let requested = (hi - lo).max(0.0) as usize;
    let start = lo.max(0.0) as usize;
    let end = (hi.max(0.0) as usize).min(len);
    (start, end, requested)
}

/// RMS loudness proxy over `window` seconds centred on `center`.
///
/// A window that runs past either edge of the signal is measured over the
/// samples that exist and logged as `lift_window_truncated`. `None` when the
/// clipped window holds no samples.
fn window_loudness(signal: &[f32], sample_rate: u32, center: f64, window: f64) -> Option<f64> {
    let (start, end, requested) = window_bounds(signal.len(), sample_rate, center, window);
    if start >= end {
        return None;
    }
    if end - start < requested {
        debug!(
            center,
            requested,
            available = end - start,
            "lift_window_truncated"
        );
    }

    let frame = &signal[start..end];
    let mean_square = frame
        .iter()
        .map(|&s| {
            let s = f64::from(s);
            s * s
        })
        .sum::<f64>()
        / frame.len() as f64;
    Some(20.0 * (mean_square.sqrt() + LOUDNESS_EPS).log10())
}

/// Evidence available before a measured confidence exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingEvidence {
    pub measured_confidence: Option<f64>,
    pub audio_timing_seconds: Option<f64>,
    pub lyric_timing_seconds: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConfidence {
    pub timing_seconds: Option<f64>,
    pub confidence: f64,
    pub source: TimingSource,
}

/// Pick exactly one confidence tier: measured, then audio, then lyrics.
pub fn resolve_timing_confidence(evidence: &TimingEvidence) -> ResolvedConfidence {
    let timing = evidence
        .audio_timing_seconds
        .or(evidence.lyric_timing_seconds);

    if let Some(measured) = evidence.measured_confidence.filter(|c| c.is_finite()) {
        return ResolvedConfidence {
            timing_seconds: timing,
            confidence: measured.clamp(0.0, 1.0),
            source: TimingSource::Upstream,
        };
    }
    if let Some(seconds) = evidence.audio_timing_seconds {
        return ResolvedConfidence {
            timing_seconds: Some(seconds),
            confidence: AUDIO_TIMING_CONFIDENCE,
            source: TimingSource::Audio,
        };
    }
    if let Some(seconds) = evidence.lyric_timing_seconds {
        return ResolvedConfidence {
            timing_seconds: Some(seconds),
            confidence: LYRIC_TIMING_CONFIDENCE,
            source: TimingSource::Lyrics,
        };
    }
    ResolvedConfidence {
        timing_seconds: None,
        confidence: 0.0,
        source: TimingSource::Absent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 100;

    /// 60 s signal: quiet verse region, loud chorus region.
    fn two_level_signal() -> Vec<f32> {
        let mut signal = vec![0.1f32; 30 * SR as usize];
        signal.extend(std::iter::repeat(0.4f32).take(30 * SR as usize));
        signal
    }

    fn segmentation(confidence: f64, verse: (f64, f64), chorus: (f64, f64)) -> SegmentationResult {
        SegmentationResult::new(
            Some(31.5),
            confidence,
            Span::new(verse.0, verse.1).expect("verse"),
            Span::new(chorus.0, chorus.1).expect("chorus"),
        )
        .expect("segmentation")
    }

    #[test]
    fn low_confidence_is_gated() {
        let policy = ScoringPolicy::default().with_timing_confidence_gate(0.6);
        let seg = segmentation(0.59, (5.0, 25.0), (35.0, 55.0));
        let out = gate_timing(&two_level_signal(), SR, &seg, &policy).expect("gate");
        assert_eq!(out.decision, GateDecision::Gate);
        assert_eq!(out.timing_seconds, None);
        assert_eq!(out.chorus_lift_db, None);
        assert!(out.dropped_features.contains(&DroppedFeature::ChorusLift));
    }

    #[test]
    fn confidence_at_gate_passes_timing_through() {
        let policy = ScoringPolicy::default().with_timing_confidence_gate(0.6);
        let seg = segmentation(0.6, (5.0, 25.0), (35.0, 55.0));
        let out = gate_timing(&two_level_signal(), SR, &seg, &policy).expect("pass");
        assert_eq!(out.decision, GateDecision::Pass);
        assert_eq!(out.timing_seconds, Some(31.5));
        assert!(out.dropped_features.is_empty());
    }

    #[test]
    fn lift_is_chorus_minus_verse() {
        let policy = ScoringPolicy::default().with_lift_window_duration(6.0);
        let seg = segmentation(0.9, (5.0, 25.0), (35.0, 55.0));
        let out = gate_timing(&two_level_signal(), SR, &seg, &policy).expect("pass");
        let lift = out.chorus_lift_db.expect("lift present");
        let expected = 20.0 * (0.4f64 / 0.1).log10();
        assert!((lift - expected).abs() < 1e-4, "lift {lift} vs {expected}");
        assert!(lift > 0.0);
    }

    #[test]
    fn short_span_leaves_lift_absent_without_dropping() {
        let policy = ScoringPolicy::default().with_lift_window_duration(6.0);
        let seg = segmentation(0.9, (10.0, 14.0), (35.0, 55.0));
        let out = gate_timing(&two_level_signal(), SR, &seg, &policy).expect("pass");
        assert_eq!(out.decision, GateDecision::Pass);
        assert_eq!(out.chorus_lift_db, None);
        assert!(out.dropped_features.is_empty());
    }

    #[test]
    fn window_past_signal_end_leaves_lift_absent() {
        let policy = ScoringPolicy::default();
        let seg = segmentation(0.9, (5.0, 25.0), (120.0, 140.0));
        let out = gate_timing(&two_level_signal(), SR, &seg, &policy).expect("pass");
        assert_eq!(out.chorus_lift_db, None);
    }

    #[test]
    fn window_over_signal_edge_is_clipped_not_dropped() {
        // 6 s window centred 1 s before the end of a 60 s signal
        let (start, end, requested) = window_bounds(60 * SR as usize, SR, 59.0, 6.0);
        assert_eq!(requested, 600);
        assert_eq!((start, end), (5_600, 6_000));

        let (start, _, requested) = window_bounds(60 * SR as usize, SR, 1.0, 6.0);
        assert_eq!(start, 0);
        assert_eq!(requested, 600);

        // chorus window half off the end still yields a lift over the samples present
        let policy = ScoringPolicy::default().with_lift_window_duration(6.0);
        let seg = segmentation(0.9, (5.0, 25.0), (46.0, 72.0));
        let out = gate_timing(&two_level_signal(), SR, &seg, &policy).expect("pass");
        let lift = out.chorus_lift_db.expect("truncated window still measured");
        assert!((lift - 20.0 * (0.4f64 / 0.1).log10()).abs() < 1e-4);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert!(Span::new(10.0, 10.0).is_err());
        assert!(Span::new(f64::NAN, 1.0).is_err());
        let verse = Span::new(0.0, 10.0).expect("verse");
        let chorus = Span::new(20.0, 30.0).expect("chorus");
        assert!(SegmentationResult::new(None, 1.5, verse, chorus).is_err());

        let seg = segmentation(0.9, (0.0, 10.0), (20.0, 30.0));
        let err = gate_timing(&[], 0, &seg, &ScoringPolicy::default()).unwrap_err();
        assert!(matches!(err, ScoringError::InvalidInput(_)));
    }

    #[test]
    fn evidence_tiers_prefer_audio_over_lyrics() {
        let both = resolve_timing_confidence(&TimingEvidence {
            measured_confidence: None,
            audio_timing_seconds: Some(42.0),
            lyric_timing_seconds: Some(40.0),
        });
        assert_eq!(both.source, TimingSource::Audio);
        assert_eq!(both.confidence, AUDIO_TIMING_CONFIDENCE);
        assert_eq!(both.timing_seconds, Some(42.0));

        let lyrics = resolve_timing_confidence(&TimingEvidence {
            lyric_timing_seconds: Some(40.0),
            ..Default::default()
        });
        assert_eq!(lyrics.source, TimingSource::Lyrics);
        assert_eq!(lyrics.confidence, LYRIC_TIMING_CONFIDENCE);

        let none = resolve_timing_confidence(&TimingEvidence::default());
        assert_eq!(none.source, TimingSource::Absent);
        assert_eq!(none.timing_seconds, None);
    }

    #[test]
    fn measured_confidence_wins() {
        let resolved = resolve_timing_confidence(&TimingEvidence {
            measured_confidence: Some(0.72),
            audio_timing_seconds: Some(30.0),
            lyric_timing_seconds: None,
        });
        assert_eq!(resolved.source, TimingSource::Upstream);
        assert_eq!(resolved.confidence, 0.72);
    }

    #[test]
    fn lyric_tier_is_gated_by_default_policy() {
        let seg = SegmentationResult::from_evidence(
            &TimingEvidence {
                lyric_timing_seconds: Some(28.0),
                ..Default::default()
            },
            Span::new(5.0, 25.0).expect("verse"),
            Span::new(35.0, 55.0).expect("chorus"),
        )
        .expect("segmentation");
        let out = gate_timing(&two_level_signal(), SR, &seg, &ScoringPolicy::default())
            .expect("gate");
        assert_eq!(out.decision, GateDecision::Gate);
        assert_eq!(out.confidence_source, TimingSource::Lyrics);
    }
}
