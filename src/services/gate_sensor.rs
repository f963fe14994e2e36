//! Timer-driven gate sensor (entry/exit crossing point)
//!
//! Usually FREE; turns OCCUPIED for a short dwell while a car passes, then
//! returns to FREE and waits an idle interval before the next car. Interval
//! lengths come from a `ToggleSchedule`, so the state machine itself is
//! deterministic.

use crate::domain::types::SpotStatus;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};

/// Source of interval lengths for a gate sensor
pub trait ToggleSchedule: Send {
    /// How long the gate stays OCCUPIED once a car arrives
    fn occupied_dwell(&mut self) -> Duration;
    /// How long the gate stays FREE before the next car
    fn idle(&mut self) -> Duration;
}

/// Constant intervals
#[derive(Debug, Clone, Copy)]
pub struct FixedSchedule {
    pub occupied: Duration,
    pub idle: Duration,
}

impl ToggleSchedule for FixedSchedule {
    fn occupied_dwell(&mut self) -> Duration {
        self.occupied
    }

    fn idle(&mut self) -> Duration {
        self.idle
    }
}

/// Uniformly random intervals within inclusive bounds
pub struct RandomSchedule {
    occupied: (Duration, Duration),
    idle: (Duration, Duration),
    rng: StdRng,
}

impl RandomSchedule {
    pub fn new(occupied: (Duration, Duration), idle: (Duration, Duration)) -> Self {
        Self::with_rng(occupied, idle, StdRng::from_entropy())
    }

    pub fn with_rng(occupied: (Duration, Duration), idle: (Duration, Duration), rng: StdRng) -> Self {
        Self { occupied: ordered(occupied), idle: ordered(idle), rng }
    }
}

fn ordered((a, b): (Duration, Duration)) -> (Duration, Duration) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl ToggleSchedule for RandomSchedule {
    fn occupied_dwell(&mut self) -> Duration {
        self.rng.gen_range(self.occupied.0..=self.occupied.1)
    }

    fn idle(&mut self) -> Duration {
        self.rng.gen_range(self.idle.0..=self.idle.1)
    }
}

pub struct GateSensor<S: ToggleSchedule> {
    name: String,
    topic: String,
    state: SpotStatus,
    next_toggle_at: Instant,
    schedule: S,
}

impl<S: ToggleSchedule> GateSensor<S> {
    /// Starts FREE; the first car arrives after one idle interval
    pub fn new(name: impl Into<String>, topic: impl Into<String>, now: Instant, mut schedule: S) -> Self {
        let next_toggle_at = now + schedule.idle();
        Self { name: name.into(), topic: topic.into(), state: SpotStatus::Free, next_toggle_at, schedule }
    }

    /// Advance the state machine to `now` and return the current state
    ///
    /// At most one toggle happens per call.
    pub fn step(&mut self, now: Instant) -> SpotStatus {
        if now >= self.next_toggle_at {
            match self.state {
                SpotStatus::Free => {
                    self.state = SpotStatus::Occupied;
                    self.next_toggle_at = now + self.schedule.occupied_dwell();
                }
                SpotStatus::Occupied => {
                    self.state = SpotStatus::Free;
                    self.next_toggle_at = now + self.schedule.idle();
                }
            }
        }
        self.state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn state(&self) -> SpotStatus {
        self.state
    }

    pub fn next_toggle_at(&self) -> Instant {
        self.next_toggle_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed() -> FixedSchedule {
        FixedSchedule { occupied: Duration::from_secs(2), idle: Duration::from_secs(5) }
    }

    #[test]
    fn test_gate_cycle() {
        let t0 = Instant::now();
        let mut gate = GateSensor::new("ENTRY", "p/parking/entry_sensor/status", t0, fixed());

        assert_eq!(gate.step(t0), SpotStatus::Free);
        assert_eq!(gate.step(t0 + Duration::from_millis(4999)), SpotStatus::Free);

        let arrive = t0 + Duration::from_secs(5);
        assert_eq!(gate.step(arrive), SpotStatus::Occupied);
        assert_eq!(gate.next_toggle_at(), arrive + Duration::from_secs(2));

        assert_eq!(gate.step(arrive + Duration::from_secs(1)), SpotStatus::Occupied);
        let leave = arrive + Duration::from_secs(2);
        assert_eq!(gate.step(leave), SpotStatus::Free);
        assert_eq!(gate.next_toggle_at(), leave + Duration::from_secs(5));
    }

    #[test]
    fn test_single_toggle_per_step() {
        let t0 = Instant::now();
        let mut gate = GateSensor::new("EXIT", "t", t0, fixed());
        // Far past several toggle deadlines: still only one flip
        assert_eq!(gate.step(t0 + Duration::from_secs(60)), SpotStatus::Occupied);
        assert_eq!(gate.step(t0 + Duration::from_secs(60)), SpotStatus::Occupied);
        assert_eq!(gate.step(t0 + Duration::from_secs(62)), SpotStatus::Free);
    }

    #[test]
    fn test_random_schedule_within_bounds() {
        let mut schedule = RandomSchedule::with_rng(
            (Duration::from_millis(3000), Duration::from_millis(1500)),
            (Duration::from_secs(4), Duration::from_secs(12)),
            StdRng::seed_from_u64(7),
        );
        for _ in 0..100 {
            let dwell = schedule.occupied_dwell();
            assert!(dwell >= Duration::from_millis(1500) && dwell <= Duration::from_millis(3000));
            let idle = schedule.idle();
            assert!(idle >= Duration::from_secs(4) && idle <= Duration::from_secs(12));
        }
    }
}
