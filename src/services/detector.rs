//! Debounced occupancy detection for a single parking spot
//!
//! Converts raw distance samples into a stable FREE/OCCUPIED status. A change
//! is accepted only after `debounce_n` consecutive identical detections; both
//! streaks reset whenever the stable status flips.

use crate::domain::types::{SpotId, SpotStatus};

/// Hysteresis state for one spot
///
/// Invariant: at most one of the two streaks is nonzero.
#[derive(Debug, Clone)]
pub struct OccupancyDetector {
    occupied_streak: u32,
    free_streak: u32,
    stable_status: SpotStatus,
}

impl Default for OccupancyDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl OccupancyDetector {
    /// Spots start FREE with no history
    pub fn new() -> Self {
        Self { occupied_streak: 0, free_streak: 0, stable_status: SpotStatus::Free }
    }

    /// Feed one sample and return the (possibly unchanged) stable status
    ///
    /// A `debounce_n` of 0 behaves as 1.
    pub fn observe(&mut self, distance_cm: f64, threshold_cm: f64, debounce_n: u32) -> SpotStatus {
        let debounce_n = debounce_n.max(1);
        let detected_occupied = distance_cm < threshold_cm;

        if detected_occupied {
            self.occupied_streak = self.occupied_streak.saturating_add(1);
            self.free_streak = 0;
        } else {
            self.free_streak = self.free_streak.saturating_add(1);
            self.occupied_streak = 0;
        }

        if self.stable_status != SpotStatus::Occupied && self.occupied_streak >= debounce_n {
            self.flip(SpotStatus::Occupied);
        } else if self.stable_status != SpotStatus::Free && self.free_streak >= debounce_n {
            self.flip(SpotStatus::Free);
        }

        self.stable_status
    }

    fn flip(&mut self, status: SpotStatus) {
        self.stable_status = status;
        self.occupied_streak = 0;
        self.free_streak = 0;
    }

    pub fn stable_status(&self) -> SpotStatus {
        self.stable_status
    }

    pub fn occupied_streak(&self) -> u32 {
        self.occupied_streak
    }

    pub fn free_streak(&self) -> u32 {
        self.free_streak
    }
}

/// A parking spot: stable id, last raw sample, and its detector
#[derive(Debug, Clone)]
pub struct Spot {
    id: SpotId,
    raw_distance_cm: f64,
    detector: OccupancyDetector,
}

impl Spot {
    pub fn new(id: SpotId) -> Self {
        Self { id, raw_distance_cm: f64::NAN, detector: OccupancyDetector::new() }
    }

    pub fn observe(&mut self, distance_cm: f64, threshold_cm: f64, debounce_n: u32) -> SpotStatus {
        self.raw_distance_cm = distance_cm;
        self.detector.observe(distance_cm, threshold_cm, debounce_n)
    }

    pub fn id(&self) -> &SpotId {
        &self.id
    }

    /// Last sample; NaN before the first observation
    pub fn raw_distance_cm(&self) -> f64 {
        self.raw_distance_cm
    }

    pub fn stable_status(&self) -> SpotStatus {
        self.detector.stable_status()
    }

    pub fn detector(&self) -> &OccupancyDetector {
        &self.detector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(samples: &[f64], threshold: f64, n: u32) -> Vec<SpotStatus> {
        let mut detector = OccupancyDetector::new();
        samples.iter().map(|&s| detector.observe(s, threshold, n)).collect()
    }

    #[test]
    fn test_flips_on_fourth_consecutive_reading() {
        use SpotStatus::{Free, Occupied};
        let out = run(&[60.0, 55.0, 40.0, 38.0, 36.0, 34.0], 50.0, 4);
        assert_eq!(out, vec![Free, Free, Free, Free, Free, Occupied]);
    }

    #[test]
    fn test_transient_noise_is_ignored() {
        // Three low readings, interrupted, never reach the threshold of 4
        let out = run(&[30.0, 30.0, 30.0, 200.0, 30.0, 30.0, 30.0, 200.0], 50.0, 4);
        assert!(out.iter().all(|s| *s == SpotStatus::Free));
    }

    #[test]
    fn test_free_transition_needs_same_debounce() {
        let mut detector = OccupancyDetector::new();
        for _ in 0..4 {
            detector.observe(20.0, 50.0, 4);
        }
        assert_eq!(detector.stable_status(), SpotStatus::Occupied);

        for _ in 0..3 {
            assert_eq!(detector.observe(200.0, 50.0, 4), SpotStatus::Occupied);
        }
        assert_eq!(detector.observe(200.0, 50.0, 4), SpotStatus::Free);
    }

    #[test]
    fn test_streaks_reset_on_flip() {
        let mut detector = OccupancyDetector::new();
        for _ in 0..4 {
            detector.observe(10.0, 50.0, 4);
        }
        assert_eq!(detector.occupied_streak(), 0);
        assert_eq!(detector.free_streak(), 0);

        // Continued occupancy counts up again but cannot re-fire
        detector.observe(10.0, 50.0, 4);
        assert_eq!(detector.occupied_streak(), 1);
        assert_eq!(detector.stable_status(), SpotStatus::Occupied);
    }

    #[test]
    fn test_streaks_mutually_exclusive() {
        let mut detector = OccupancyDetector::new();
        let samples = [10.0, 10.0, 90.0, 10.0, 90.0, 90.0, 90.0, 10.0, 10.0, 10.0, 10.0, 10.0];
        for s in samples {
            detector.observe(s, 50.0, 3);
            assert!(detector.occupied_streak() == 0 || detector.free_streak() == 0);
        }
    }

    #[test]
    fn test_threshold_is_strict() {
        // A reading exactly at the threshold counts as FREE
        let out = run(&[50.0, 50.0], 50.0, 1);
        assert_eq!(out, vec![SpotStatus::Free, SpotStatus::Free]);
        let out = run(&[49.9], 50.0, 1);
        assert_eq!(out, vec![SpotStatus::Occupied]);
    }

    #[test]
    fn test_zero_debounce_acts_as_one() {
        use SpotStatus::{Free, Occupied};
        assert_eq!(run(&[200.0; 4], 50.0, 0), vec![Free; 4]);
        assert_eq!(run(&[20.0, 20.0, 80.0, 80.0], 50.0, 0), run(&[20.0, 20.0, 80.0, 80.0], 50.0, 1));
        assert_eq!(run(&[20.0, 20.0], 50.0, 0), vec![Occupied, Occupied]);
    }

    #[test]
    fn test_deterministic_for_identical_input() {
        let samples = [80.0, 20.0, 20.0, 20.0, 80.0, 20.0, 20.0, 20.0, 20.0, 90.0];
        assert_eq!(run(&samples, 50.0, 3), run(&samples, 50.0, 3));
    }

    #[test]
    fn test_spot_records_raw_distance() {
        let mut spot = Spot::new(SpotId("A01".to_string()));
        assert!(spot.raw_distance_cm().is_nan());
        spot.observe(42.5, 50.0, 4);
        assert_eq!(spot.raw_distance_cm(), 42.5);
        assert_eq!(spot.stable_status(), SpotStatus::Free);
    }
}
