use serde::{Deserialize, Serialize};

/// How closely a retrieved chunk matches the question, bucketed from its L2 distance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upper distance bounds (exclusive) for the `High` and `Medium` buckets.
///
/// The defaults are calibrated for normalized embeddings, where distances fall in `0.0..=2.0`
/// for unrelated text and lower is closer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceThresholds {
    pub high: f32,
    pub medium: f32,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            high: 0.8,
            medium: 1.5,
        }
    }
}

impl ConfidenceThresholds {
    #[must_use]
    pub fn classify(&self, distance: f32) -> Confidence {
        if distance < self.high {
            Confidence::High
        } else if distance < self.medium {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.high.is_finite() && self.medium.is_finite()) {
            return Err("confidence thresholds must be finite".to_string());
        }
        if self.high > self.medium {
            return Err(format!(
                "high threshold ({}) must not exceed medium threshold ({})",
                self.high, self.medium
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_boundaries() {
        let t = ConfidenceThresholds::default();
        assert_eq!(t.classify(0.0), Confidence::High);
        assert_eq!(t.classify(0.79), Confidence::High);
        assert_eq!(t.classify(0.8), Confidence::Medium);
        assert_eq!(t.classify(1.49), Confidence::Medium);
        assert_eq!(t.classify(1.5), Confidence::Low);
        assert_eq!(t.classify(f32::NAN), Confidence::Low);
    }

    #[test]
    fn test_validate() {
        assert!(ConfidenceThresholds::default().validate().is_ok());
        let inverted = ConfidenceThresholds {
            high: 2.0,
            medium: 1.0,
        };
        assert!(inverted.validate().is_err());
    }
}
