//! Behavior mode presets
//!
//! A mode scales the controller's timing and speed without adding states:
//! quiet pets idle longer and move slower, clingy pets follow the cursor and
//! barely rest. The selected mode persists in the config and the parameters
//! are derived fresh each tick.

use serde::{Deserialize, Serialize};

use crate::constants::behavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BehaviorMode {
    Quiet,
    #[default]
    Active,
    Clingy,
}

impl BehaviorMode {
    pub fn label(&self) -> &'static str {
        match self {
            BehaviorMode::Quiet => "Quiet",
            BehaviorMode::Active => "Lively",
            BehaviorMode::Clingy => "Clingy",
        }
    }

    pub const ALL: [BehaviorMode; 3] =
        [BehaviorMode::Quiet, BehaviorMode::Active, BehaviorMode::Clingy];
}

/// Tuning knobs a mode applies on top of the base constants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BehaviorParams {
    /// Forces the follow-cursor flag on or off regardless of config
    pub follow_override: Option<bool>,

    /// Per-tick chance of stopping mid-wander
    pub stop_chance: f64,

    /// Multiplier on the randomized idle duration
    pub idle_duration_mul: f32,

    /// Multiplier on the randomized wander budget
    pub wander_budget_mul: f32,

    /// Multiplier on movement speed
    pub speed_mul: f32,

    /// Ticks a wander must run before a random stop may trigger
    pub min_move_ticks: u32,
}

impl BehaviorParams {
    pub fn for_mode(mode: BehaviorMode) -> Self {
        match mode {
            BehaviorMode::Quiet => Self {
                follow_override: Some(false),
                stop_chance: (behavior::STOP_CHANCE * 2.0).min(0.9),
                idle_duration_mul: 1.6,
                wander_budget_mul: 0.7,
                speed_mul: 0.7,
                min_move_ticks: 0,
            },
            BehaviorMode::Clingy => Self {
                follow_override: Some(true),
                stop_chance: behavior::STOP_CHANCE * 0.3,
                idle_duration_mul: 0.5,
                wander_budget_mul: 1.0,
                speed_mul: 1.1,
                min_move_ticks: 10,
            },
            BehaviorMode::Active => Self {
                follow_override: None,
                stop_chance: behavior::STOP_CHANCE,
                idle_duration_mul: 1.0,
                wander_budget_mul: 1.0,
                speed_mul: 1.0,
                min_move_ticks: behavior::MIN_MOVE_TICKS,
            },
        }
    }
}
