//! Difficulty tuning.

use protocol::Difficulty;
use std::time::Duration;

/// Parameters derived from a difficulty tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyProfile {
    /// Minimum time between strategic re-evaluations.
    pub decision_interval: Duration,
    /// Probability a correctly aimed shot is actually taken.
    pub accuracy: f64,
    /// Probability of engaging nearby enemies when not forced to.
    pub aggression: f64,
    /// Health ratio below which the agent heads home.
    pub retreat_health: f32,
    /// Energy ratio below which the agent refuels.
    pub energy_threshold: f32,
    /// Probability of pulling the trigger on a given tick.
    pub fire_chance: f64,
    /// Minimum ticks between shots.
    pub fire_cooldown_ticks: u32,
}

impl DifficultyProfile {
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Easy => Self {
                decision_interval: Duration::from_millis(1000),
                accuracy: 0.4,
                aggression: 0.3,
                retreat_health: 0.2,
                energy_threshold: 0.25,
                fire_chance: 0.3,
                fire_cooldown_ticks: 6,
            },
            Difficulty::Normal => Self {
                decision_interval: Duration::from_millis(500),
                accuracy: 0.65,
                aggression: 0.5,
                retreat_health: 0.3,
                energy_threshold: 0.3,
                fire_chance: 0.5,
                fire_cooldown_ticks: 4,
            },
            Difficulty::Hard => Self {
                decision_interval: Duration::from_millis(200),
                accuracy: 0.9,
                aggression: 0.8,
                retreat_health: 0.4,
                energy_threshold: 0.35,
                fire_chance: 0.8,
                fire_cooldown_ticks: 2,
            },
        }
    }
}
