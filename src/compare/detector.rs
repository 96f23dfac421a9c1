//! Edge detection on the similarity stream

use crate::splits::SplitImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    /// Waiting for similarity to reach the threshold
    Arming,
    /// Threshold reached on a below-flagged image; waiting for it to drop
    Armed,
}

/// Decides when a split image has matched.
///
/// Plain images match on the first sample at or above the threshold.
/// Below-flagged images match on the first sample under the threshold after
/// having been at or above it.
#[derive(Debug, Clone)]
pub struct MatchDetector {
    threshold: f64,
    below: bool,
    state: MatchState,
    /// Ignore samples until one falls under the threshold
    needs_rearm: bool,
}

impl MatchDetector {
    pub fn new(threshold: f64, below: bool) -> Self {
        Self {
            threshold,
            below,
            state: MatchState::Arming,
            needs_rearm: false,
        }
    }

    pub fn for_image(image: &SplitImage) -> Self {
        Self::new(image.threshold(), image.flags().below)
    }

    /// Require the similarity to leave the threshold before the next match.
    ///
    /// Used when the cursor lands on the same image again (loops, single
    /// image lists) so one crossing does not fire several splits.
    pub fn require_rearm(mut self) -> Self {
        self.needs_rearm = true;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Move the threshold without losing the edge state
    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    /// Feed one sample. Returns `true` when the image has matched.
    pub fn observe(&mut self, similarity: f64) -> bool {
        if self.needs_rearm {
            if similarity < self.threshold {
                self.needs_rearm = false;
            }
            return false;
        }

        match self.state {
            MatchState::Arming if similarity >= self.threshold => {
                if self.below {
                    self.state = MatchState::Armed;
                    false
                } else {
                    true
                }
            }
            MatchState::Arming => false,
            MatchState::Armed => similarity < self.threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rising_edge() {
        let mut detector = MatchDetector::new(0.8, false);
        assert!(!detector.observe(0.1));
        assert!(!detector.observe(0.79));
        assert!(detector.observe(0.8));
    }

    #[test]
    fn test_falling_edge() {
        let mut detector = MatchDetector::new(0.8, true);
        assert!(!detector.observe(0.5));
        assert!(!detector.observe(0.95));
        assert_eq!(detector.state(), MatchState::Armed);
        assert!(!detector.observe(0.9));
        assert!(detector.observe(0.2));
    }

    #[test]
    fn test_falling_edge_needs_arming_first() {
        let mut detector = MatchDetector::new(0.8, true);
        for s in [0.1, 0.2, 0.0] {
            assert!(!detector.observe(s));
        }
        assert_eq!(detector.state(), MatchState::Arming);
    }

    #[test]
    fn test_lowered_threshold_matches_held_score() {
        let mut detector = MatchDetector::new(0.9, false);
        assert!(!detector.observe(0.85));
        detector.set_threshold(0.8);
        assert!(detector.observe(0.85));
    }

    #[test]
    fn test_threshold_change_keeps_armed_state() {
        let mut detector = MatchDetector::new(0.8, true);
        assert!(!detector.observe(0.95));
        detector.set_threshold(0.9);
        assert_eq!(detector.state(), MatchState::Armed);
        assert!(detector.observe(0.85));
    }

    #[test]
    fn test_rearm_ignores_held_match() {
        let mut detector = MatchDetector::new(0.8, false).require_rearm();
        assert!(!detector.observe(0.95));
        assert!(!detector.observe(0.95));
        assert!(!detector.observe(0.3));
        assert!(detector.observe(0.9));
    }
}
