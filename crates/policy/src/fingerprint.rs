//! Policy fingerprinting.
//!
//! ```text
//! SHA-256(FINGERPRINT_VERSION.to_be_bytes() || 0x00 ||
//!         f64 fields as big-endian IEEE-754 bits ||
//!         len(lane_id) as u32 BE || lane_id ||
//!         len(seeds) as u32 BE || seeds as i64 BE)
//! ```
//!
//! Floats are hashed by bit pattern so `0.1 + 0.2` and `0.3` stay distinct.
//! Commentary and `emit_diagnostics` are not part of the digest.

use sha2::{Digest, Sha256};

use crate::ScoringPolicy;

/// Bump whenever the byte layout above changes.
pub const FINGERPRINT_VERSION: u32 = 1;

/// Hex-encoded SHA-256 of the numeric identity of `policy`.
pub fn fingerprint_policy(policy: &ScoringPolicy) -> String {
    let mut hasher = Sha256::new();
    hasher.update(FINGERPRINT_VERSION.to_be_bytes());
    hasher.update([0u8]);

    for value in [
        policy.weight,
        policy.score_cap,
        policy.timing_confidence_gate,
        policy.lift_window_duration,
        policy.axis_level_threshold,
        policy.raw_axis_thresholds.low_max,
        policy.raw_axis_thresholds.mid_max,
    ] {
        hasher.update(value.to_bits().to_be_bytes());
    }

    let lane = policy.lane_id.as_bytes();
    hasher.update((lane.len() as u32).to_be_bytes());
    hasher.update(lane);

    hasher.update((policy.reproducibility_seeds.len() as u32).to_be_bytes());
    for seed in &policy.reproducibility_seeds {
        hasher.update(seed.to_be_bytes());
    }

    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PolicyCommentary;

    #[test]
    fn commentary_does_not_change_fingerprint() {
        let plain = ScoringPolicy::default();
        let worded = ScoringPolicy::default()
            .with_commentary(PolicyCommentary {
                structural_priors: vec!["chorus by 0:45".into()],
                caps_note: Some("cap reflects audio-only evidence".into()),
            })
            .with_emit_diagnostics(true);
        assert_eq!(plain.scoring_fingerprint(), worded.scoring_fingerprint());
    }

    #[test]
    fn numeric_fields_change_fingerprint() {
        let base = ScoringPolicy::default();
        assert_ne!(
            base.scoring_fingerprint(),
            base.clone().with_score_cap(0.6).scoring_fingerprint()
        );
        assert_ne!(
            base.scoring_fingerprint(),
            base.clone()
                .with_reproducibility_seeds(vec![7])
                .scoring_fingerprint()
        );
        assert_ne!(
            base.scoring_fingerprint(),
            base.clone().with_lane_id("tier2:1995_2004").scoring_fingerprint()
        );
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let digest = ScoringPolicy::default().scoring_fingerprint();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
