use serde::{Deserialize, Serialize};

/// Software-enforced travel band, checked before any write is issued.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoftLimits {
    pub low: f64,
    pub high: f64,
}

impl SoftLimits {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn unbounded() -> Self {
        Self {
            low: f64::NEG_INFINITY,
            high: f64::INFINITY,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.low <= self.high
    }

    pub fn contains(&self, target: f64) -> bool {
        target >= self.low && target <= self.high
    }

    pub fn is_below(&self, target: f64) -> bool {
        target < self.low
    }

    pub fn is_above(&self, target: f64) -> bool {
        target > self.high
    }
}

impl Default for SoftLimits {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_is_inclusive() {
        let limits = SoftLimits::new(-115.0, 0.0);
        assert!(limits.contains(-115.0));
        assert!(limits.contains(0.0));
        assert!(!limits.contains(10.0));
        assert!(limits.is_above(10.0));
        assert!(limits.is_below(-115.5));
    }

    #[test]
    fn test_inverted_band_is_invalid() {
        assert!(!SoftLimits::new(1.0, -1.0).is_valid());
        assert!(SoftLimits::unbounded().contains(1e12));
    }
}
