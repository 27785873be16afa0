use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Distance metric used to rank reference tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// `1 - cos(a, b)`; similarity is `1 - distance`.
    #[default]
    Cosine,
    /// L2 distance; similarity is `1 / (1 + distance)`.
    Euclidean,
    /// L1 distance; similarity is `1 / (1 + distance)`.
    Manhattan,
}

impl Metric {
    /// Distance between two equal-length vectors, accumulated in f64.
    pub fn distance(self, a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f64 {
        match self {
            Metric::Cosine => cosine_distance(a, b),
            Metric::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(&x, &y)| {
                    let d = f64::from(x) - f64::from(y);
                    d * d
                })
                .sum::<f64>()
                .sqrt(),
            Metric::Manhattan => a
                .iter()
                .zip(b.iter())
                .map(|(&x, &y)| (f64::from(x) - f64::from(y)).abs())
                .sum(),
        }
    }

    /// Map a distance to a similarity where larger means closer.
    pub fn similarity(self, distance: f64) -> f64 {
        match self {
            Metric::Cosine => 1.0 - distance,
            Metric::Euclidean | Metric::Manhattan => 1.0 / (1.0 + distance),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::Euclidean => "euclidean",
            Metric::Manhattan => "manhattan",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(Metric::Cosine),
            "euclidean" | "l2" => Ok(Metric::Euclidean),
            "manhattan" | "l1" => Ok(Metric::Manhattan),
            other => Err(format!("unknown metric '{other}'")),
        }
    }
}

/// Zero-norm vectors are maximally distant from everything.
fn cosine_distance(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f64 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    let cos = (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0);
    1.0 - cos
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn cosine_distance_basics() {
        let a = arr1(&[1.0f32, 0.0, 0.0]);
        let b = arr1(&[0.0f32, 1.0, 0.0]);
        let c = arr1(&[2.0f32, 0.0, 0.0]);
        assert!(Metric::Cosine.distance(a.view(), c.view()).abs() < 1e-12);
        assert!((Metric::Cosine.distance(a.view(), b.view()) - 1.0).abs() < 1e-12);
        assert!((Metric::Cosine.similarity(0.25) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn zero_vector_is_maximally_distant() {
        let zero = arr1(&[0.0f32, 0.0]);
        let v = arr1(&[1.0f32, 1.0]);
        assert_eq!(Metric::Cosine.distance(zero.view(), v.view()), 1.0);
    }

    #[test]
    fn distance_metrics_use_inverse_similarity() {
        let a = arr1(&[0.0f32, 0.0]);
        let b = arr1(&[3.0f32, 4.0]);
        assert!((Metric::Euclidean.distance(a.view(), b.view()) - 5.0).abs() < 1e-12);
        assert!((Metric::Manhattan.distance(a.view(), b.view()) - 7.0).abs() < 1e-12);
        assert!((Metric::Euclidean.similarity(5.0) - 1.0 / 6.0).abs() < 1e-12);
        assert_eq!(Metric::Manhattan.similarity(0.0), 1.0);
    }

    #[test]
    fn parses_names() {
        assert_eq!("Cosine".parse::<Metric>(), Ok(Metric::Cosine));
        assert_eq!("l2".parse::<Metric>(), Ok(Metric::Euclidean));
        assert!("hamming".parse::<Metric>().is_err());
    }
}
