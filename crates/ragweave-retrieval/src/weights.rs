//! Fusion weights for the hybrid retrieval scorer.

use serde::{Deserialize, Serialize};

/// Weights combining semantic and lexical scores into one fused score.
/// Both components are normalized to `[0, 1]` before fusion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FusionWeights {
    pub semantic: f64,
    pub lexical: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self { semantic: 0.8, lexical: 0.2 }
    }
}

impl FusionWeights {
    pub fn validate(&self) -> bool {
        (self.semantic + self.lexical - 1.0).abs() < 1e-6
    }

    pub fn normalise(&mut self) {
        let sum = self.semantic + self.lexical;
        if sum > 0.0 {
            self.semantic /= sum;
            self.lexical /= sum;
        }
    }

    pub fn fuse(&self, semantic: f64, lexical: f64) -> f64 {
        self.semantic * semantic + self.lexical * lexical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        assert!(FusionWeights::default().validate());
    }

    #[test]
    fn normalise_restores_sum() {
        let mut w = FusionWeights { semantic: 0.9, lexical: 0.3 };
        assert!(!w.validate());
        w.normalise();
        assert!(w.validate());
    }

    #[test]
    fn fuse_weights_components_by_configured_ratio() {
        let w = FusionWeights::default();
        assert!((w.fuse(1.0, 0.0) - 0.8).abs() < 1e-9);
        assert!((w.fuse(0.0, 1.0) - 0.2).abs() < 1e-9);
    }
}
