//! Table configuration models.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::game::entities::Chips;
use crate::game::pot::RakeConfig;

/// Pacing, turn budgets and time-bank policy for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableTiming {
    /// Turn budget before the flop.
    pub preflop_action: Duration,
    /// Turn budget from the flop on.
    pub postflop_action: Duration,
    /// UI pacing between one action and the next seat's prompt.
    pub action_delay: Duration,
    /// Pause between betting rounds.
    pub phase_delay: Duration,
    /// Pause between a decided hand and the next one.
    pub end_round_delay: Duration,
    /// How often seated players earn time bank back.
    pub time_bank_replenish_every: Duration,
    /// Seconds added per replenish tick.
    pub time_bank_replenish_amount: u32,
    /// Ceiling on accumulated time bank, in seconds.
    pub time_bank_max: u32,
}

impl Default for TableTiming {
    fn default() -> Self {
        Self {
            preflop_action: Duration::from_secs(15),
            postflop_action: Duration::from_secs(30),
            action_delay: Duration::from_millis(750),
            phase_delay: Duration::from_millis(1200),
            end_round_delay: Duration::from_secs(5),
            time_bank_replenish_every: Duration::from_secs(3600),
            time_bank_replenish_amount: 30,
            time_bank_max: 240,
        }
    }
}

/// Optional blind escalation schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindIncrease {
    pub every: Duration,
    /// Added to the small blind each step; the big blind tracks at
    /// twice the small blind.
    pub small_blind_step: Chips,
}

/// Table configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Table name
    pub name: String,

    /// Number of seats (default: 10)
    pub seats_count: usize,

    /// Players required before a game starts (default: 2)
    pub min_players: usize,

    /// Small blind amount
    pub small_blind: Chips,

    /// Big blind amount
    pub big_blind: Chips,

    /// Minimum buy-in in chips
    pub min_buy_in: Chips,

    /// Maximum chips a player may have in play
    pub max_buy_in: Chips,

    /// House-fee parameters
    pub rake: RakeConfig,

    /// Time bank granted to a player on sitting down, in seconds
    pub time_bank_initial: u32,

    /// Blind escalation, if this table raises blinds on a schedule
    pub blind_increase: Option<BlindIncrease>,

    /// Timers and pacing
    pub timing: TableTiming,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            name: "Default Table".to_string(),
            seats_count: 10,
            min_players: 2,
            small_blind: 10,
            big_blind: 20,
            min_buy_in: 400,
            max_buy_in: 2000,
            rake: RakeConfig::default(),
            time_bank_initial: 60,
            blind_increase: None,
            timing: TableTiming::default(),
        }
    }
}

impl TableConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.big_blind <= self.small_blind {
            return Err("Big blind must be greater than small blind".to_string());
        }

        if self.max_buy_in <= self.min_buy_in {
            return Err("Max buy-in must be greater than min buy-in".to_string());
        }

        if self.min_buy_in < self.big_blind {
            return Err("Min buy-in must cover at least the big blind".to_string());
        }

        if self.seats_count < 2 || self.seats_count > 23 {
            return Err("Seat count must be between 2 and 23".to_string());
        }

        if self.min_players < 2 || self.min_players > self.seats_count {
            return Err("Min players must be between 2 and the seat count".to_string());
        }

        if !(0.0..=100.0).contains(&self.rake.postflop_percent) {
            return Err("Postflop rake percent must be between 0 and 100".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(TableConfig::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_blinds_rejected() {
        let config = TableConfig {
            small_blind: 20,
            big_blind: 20,
            ..TableConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_buy_in_must_cover_big_blind() {
        let config = TableConfig {
            min_buy_in: 10,
            big_blind: 20,
            ..TableConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_seat_count_bounds() {
        let config = TableConfig {
            seats_count: 1,
            ..TableConfig::default()
        };
        assert!(config.validate().is_err());
        let config = TableConfig {
            seats_count: 24,
            ..TableConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
