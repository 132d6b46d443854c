//! YAML scenario files driving a headless game.

use anyhow::{Context, Result};
use evm_cards::{CardId, PlayerOptions};
use evm_core::parse_money;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Planned amount as written in the file: a YAML number or free text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(serde_yaml::Number),
    Text(String),
}

impl AmountInput {
    /// Coerced amount; text that does not read as a number stays unset.
    pub fn amount(&self) -> Option<Decimal> {
        match self {
            AmountInput::Number(n) => parse_money(&n.to_string()),
            AmountInput::Text(s) => parse_money(s),
        }
    }
}

/// Optional overrides of the starting schedule.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleInput {
    pub week_count: Option<usize>,
    pub pv_per_week: Option<AmountInput>,
    pub bac: Option<AmountInput>,
}

/// One week of the script.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WeekInput {
    pub plan_ev: Option<AmountInput>,
    pub plan_ac: Option<AmountInput>,
    /// Card to play; drawn from the deck when omitted.
    pub card: Option<CardId>,
    #[serde(default)]
    pub options: PlayerOptions,
    pub note: Option<String>,
    /// Schedule edit applied before this week resolves.
    pub set_schedule: Option<ScheduleInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub schedule: ScheduleInput,
    #[serde(default)]
    pub weeks: Vec<WeekInput>,
}

pub fn load(path: &Path) -> Result<Scenario> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading scenario {}", path.display()))?;
    parse(&text).with_context(|| format!("parsing scenario {}", path.display()))
}

pub fn parse(text: &str) -> Result<Scenario> {
    Ok(serde_yaml::from_str(text)?)
}
