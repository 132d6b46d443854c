#![deny(warnings)]

//! Core domain model for the earned value simulator.
//!
//! This crate defines the schedule configuration, the append-only weekly
//! ledger and the pure derivation of cumulative EVM metrics from them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Default schedule length in weeks.
pub const DEFAULT_WEEKS: usize = 10;
/// Default planned value per week (whole currency units).
pub const DEFAULT_PV_PER_WEEK: i64 = 100_000;
/// Default budget at completion.
pub const DEFAULT_BAC: i64 = 1_000_000;
/// Largest magnitude an amount may take. Coerced text saturates here and
/// typed input beyond it is rejected, which keeps card and metric arithmetic
/// far from `Decimal`'s overflow point.
pub const MAX_MONEY: i64 = 1_000_000_000_000_000;
/// Placed between a week's existing note and the resolver's outcome note.
pub const NOTE_SEPARATOR: &str = " | ";

/// Round to a whole currency unit, halves toward positive infinity.
///
/// Example:
/// assert_eq!(round_money(Decimal::new(25, 1)), Decimal::new(3, 0));
/// assert_eq!(round_money(Decimal::new(-25, 1)), Decimal::new(-2, 0));
pub fn round_money(value: Decimal) -> Decimal {
    (value + Decimal::new(5, 1)).floor()
}

/// Coerce free-form text into an amount.
///
/// Every character other than digits, `.` and `-` is dropped first, so
/// "$1,250,000" reads as 1250000. Text that leaves nothing parsable behind
/// yields `None` (the unset state) instead of an error. Magnitudes past
/// [`MAX_MONEY`] saturate, including digit runs too long for `Decimal`.
pub fn parse_money(text: &str) -> Option<Decimal> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    match cleaned.parse::<Decimal>() {
        Ok(v) => Some(clamp_money(v)),
        Err(_) if is_plain_number(&cleaned) => Some(if cleaned.starts_with('-') {
            -Decimal::from(MAX_MONEY)
        } else {
            Decimal::from(MAX_MONEY)
        }),
        Err(_) => None,
    }
}

/// Optional leading minus, digits, at most one dot.
fn is_plain_number(text: &str) -> bool {
    let body = text.strip_prefix('-').unwrap_or(text);
    body.chars().any(|c| c.is_ascii_digit())
        && !body.contains('-')
        && body.matches('.').count() <= 1
}

/// Saturate `value` into `[-MAX_MONEY, MAX_MONEY]`.
pub fn clamp_money(value: Decimal) -> Decimal {
    let max = Decimal::from(MAX_MONEY);
    value.clamp(-max, max)
}

/// Reject amounts whose magnitude exceeds [`MAX_MONEY`].
pub fn validate_money(value: Decimal) -> Result<(), ValidationError> {
    if value.abs() > Decimal::from(MAX_MONEY) {
        return Err(ValidationError::MoneyOutOfRange(value));
    }
    Ok(())
}

/// Group thousands with commas, e.g. `-1234567.5` -> `-1,234,567.5`.
pub fn format_money(value: Decimal) -> String {
    let text = value.round_dp(2).normalize().abs().to_string();
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (text, None),
    };
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if value.is_sign_negative() && !value.is_zero() {
        "-"
    } else {
        ""
    };
    match frac_part {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Render a performance index with two decimals; `None` renders blank.
pub fn format_index(index: Option<Decimal>) -> String {
    match index {
        Some(v) => format!("{:.2}", v.round_dp(2)),
        None => String::new(),
    }
}

/// Validation errors for schedule invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// A schedule needs at least one week.
    #[error("week count must be >= 1")]
    ZeroWeeks,
    /// PV per week and BAC cannot go below zero.
    #[error("negative monetary value is invalid: {0}")]
    NegativeMoney(Decimal),
    /// Amount beyond [`MAX_MONEY`] in magnitude.
    #[error("monetary value out of range: {0}")]
    MoneyOutOfRange(Decimal),
}

/// Errors raised by ledger operations.
#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    /// Week index outside `[0, week_count)`.
    #[error("week {index} is out of range (schedule has {week_count} weeks)")]
    OutOfRange { index: usize, week_count: usize },
    /// The week already carries applied values.
    #[error("week {0} is already resolved")]
    AlreadyResolved(usize),
}

/// Linear planned-value schedule shared by every week.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Planned value added per elapsed week (>= 0).
    pub pv_per_week: Decimal,
    /// Budget at completion.
    pub bac: Decimal,
    /// Number of weeks in the schedule (>= 1).
    pub week_count: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            pv_per_week: Decimal::from(DEFAULT_PV_PER_WEEK),
            bac: Decimal::from(DEFAULT_BAC),
            week_count: DEFAULT_WEEKS,
        }
    }
}

impl ScheduleConfig {
    /// Weeks left counting `current` itself, never less than one.
    pub fn remaining_weeks(&self, current: usize) -> usize {
        self.week_count.saturating_sub(current).max(1)
    }
}

/// Validate a schedule configuration.
pub fn validate_schedule(s: &ScheduleConfig) -> Result<(), ValidationError> {
    if s.week_count == 0 {
        return Err(ValidationError::ZeroWeeks);
    }
    if s.pv_per_week < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney(s.pv_per_week));
    }
    if s.bac < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney(s.bac));
    }
    validate_money(s.pv_per_week)?;
    validate_money(s.bac)
}

/// Planned and applied figures for one week.
///
/// Applied values are unset until the week is resolved and never change
/// afterwards.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WeekRecord {
    planned_ev: Option<Decimal>,
    planned_ac: Option<Decimal>,
    applied_ev: Option<Decimal>,
    applied_ac: Option<Decimal>,
    note: String,
}

impl WeekRecord {
    pub fn planned_ev(&self) -> Option<Decimal> {
        self.planned_ev
    }

    pub fn planned_ac(&self) -> Option<Decimal> {
        self.planned_ac
    }

    pub fn applied_ev(&self) -> Option<Decimal> {
        self.applied_ev
    }

    pub fn applied_ac(&self) -> Option<Decimal> {
        self.applied_ac
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn is_resolved(&self) -> bool {
        self.applied_ev.is_some()
    }
}

/// Ordered weekly records, created up front for the whole schedule.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    weeks: Vec<WeekRecord>,
}

impl Ledger {
    pub fn new(week_count: usize) -> Self {
        Self {
            weeks: vec![WeekRecord::default(); week_count],
        }
    }

    pub fn len(&self) -> usize {
        self.weeks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weeks.is_empty()
    }

    pub fn weeks(&self) -> &[WeekRecord] {
        &self.weeks
    }

    pub fn week(&self, index: usize) -> Result<&WeekRecord, LedgerError> {
        self.weeks.get(index).ok_or(LedgerError::OutOfRange {
            index,
            week_count: self.weeks.len(),
        })
    }

    fn unresolved_mut(&mut self, index: usize) -> Result<&mut WeekRecord, LedgerError> {
        let week_count = self.weeks.len();
        let week = self
            .weeks
            .get_mut(index)
            .ok_or(LedgerError::OutOfRange { index, week_count })?;
        if week.is_resolved() {
            return Err(LedgerError::AlreadyResolved(index));
        }
        Ok(week)
    }

    /// Set planned EV/AC of an unresolved week.
    pub fn set_planned(
        &mut self,
        index: usize,
        ev: Option<Decimal>,
        ac: Option<Decimal>,
    ) -> Result<(), LedgerError> {
        let week = self.unresolved_mut(index)?;
        week.planned_ev = ev;
        week.planned_ac = ac;
        Ok(())
    }

    /// Replace the free-text note of an unresolved week.
    pub fn annotate(&mut self, index: usize, text: &str) -> Result<(), LedgerError> {
        let week = self.unresolved_mut(index)?;
        week.note = text.to_string();
        Ok(())
    }

    /// Write applied values once and append `note` to the existing note.
    pub fn commit_applied(
        &mut self,
        index: usize,
        ev: Decimal,
        ac: Decimal,
        note: &str,
    ) -> Result<(), LedgerError> {
        let week = self.unresolved_mut(index)?;
        week.applied_ev = Some(ev);
        week.applied_ac = Some(ac);
        week.note = [week.note.as_str(), note]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(NOTE_SEPARATOR);
        debug!(week = index, %ev, %ac, "ledger commit");
        Ok(())
    }

    /// Number of resolved weeks; weeks resolve in order so they form a prefix.
    pub fn resolved_count(&self) -> usize {
        self.weeks.iter().take_while(|w| w.is_resolved()).count()
    }

    /// Drop every record and start over with `week_count` empty weeks.
    pub fn reset(&mut self, week_count: usize) {
        self.weeks = vec![WeekRecord::default(); week_count];
    }
}

/// Inputs and outcome of one week as shown in the tracker table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeekRow {
    /// 1-based week number.
    pub week: usize,
    pub planned_ev: Option<Decimal>,
    pub planned_ac: Option<Decimal>,
    pub applied_ev: Option<Decimal>,
    pub applied_ac: Option<Decimal>,
    pub note: String,
}

/// Cumulative EVM figures through one week.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CumulativeRow {
    /// 1-based week number.
    pub week: usize,
    pub pv: Decimal,
    pub ev: Decimal,
    pub ac: Decimal,
    /// EV - AC.
    pub cv: Decimal,
    /// EV - PV.
    pub sv: Decimal,
    /// EV / AC, undefined while AC is zero.
    pub cpi: Option<Decimal>,
    /// EV / PV, undefined while PV is zero.
    pub spi: Option<Decimal>,
}

/// Per-week and cumulative series derived from a ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub per_week: Vec<WeekRow>,
    pub cumulative: Vec<CumulativeRow>,
    pub bac: Decimal,
}

impl Metrics {
    /// Cumulative row of the last resolved week.
    pub fn latest(&self) -> Option<&CumulativeRow> {
        let resolved = self
            .per_week
            .iter()
            .take_while(|w| w.applied_ev.is_some())
            .count();
        resolved
            .checked_sub(1)
            .and_then(|i| self.cumulative.get(i))
    }

    /// Earned value to date as a fraction of BAC.
    pub fn percent_complete(&self) -> Option<Decimal> {
        if self.bac.is_zero() {
            return None;
        }
        let ev = self.latest().map(|r| r.ev).unwrap_or(Decimal::ZERO);
        Some(ev / self.bac)
    }
}

fn ratio(num: Decimal, den: Decimal) -> Option<Decimal> {
    if den.is_zero() {
        None
    } else {
        num.checked_div(den)
    }
}

/// Derive the PV/EV/AC series and the variance and performance indices.
///
/// PV is linear in the current `pv_per_week`, so a change of that scalar
/// moves PV for every week, elapsed ones included. Unresolved weeks add
/// nothing to EV or AC.
pub fn compute_metrics(ledger: &Ledger, schedule: &ScheduleConfig) -> Metrics {
    let mut per_week = Vec::with_capacity(ledger.len());
    let mut cumulative = Vec::with_capacity(ledger.len());
    let mut ev_cum = Decimal::ZERO;
    let mut ac_cum = Decimal::ZERO;
    for (i, w) in ledger.weeks().iter().enumerate() {
        ev_cum += w.applied_ev.unwrap_or(Decimal::ZERO);
        ac_cum += w.applied_ac.unwrap_or(Decimal::ZERO);
        let pv_cum = schedule.pv_per_week * Decimal::from(i + 1);
        per_week.push(WeekRow {
            week: i + 1,
            planned_ev: w.planned_ev,
            planned_ac: w.planned_ac,
            applied_ev: w.applied_ev,
            applied_ac: w.applied_ac,
            note: w.note.clone(),
        });
        cumulative.push(CumulativeRow {
            week: i + 1,
            pv: pv_cum,
            ev: ev_cum,
            ac: ac_cum,
            cv: ev_cum - ac_cum,
            sv: ev_cum - pv_cum,
            cpi: ratio(ev_cum, ac_cum),
            spi: ratio(ev_cum, pv_cum),
        });
    }
    Metrics {
        per_week,
        cumulative,
        bac: schedule.bac,
    }
}
