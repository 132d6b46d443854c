#![deny(warnings)]

//! Week resolution engine for the earned value simulator.
//!
//! `Engine` owns the schedule, the ledger and the next-week modifier slot.
//! Each call to [`Engine::resolve_current_week`] runs a fixed pipeline on
//! the current week's planned figures:
//! 1. consume pending modifiers (EV bonus, then EV cap)
//! 2. run the selected card's main effect
//! 3. run the card's correction keyed on the week's final AC
//! 4. round and clamp at zero, commit to the ledger, advance the cursor
//!
//! Weeks resolve strictly in order and a resolved week is never touched
//! again.

use evm_cards::{
    apply_card, apply_correction, CardError, CardId, EffectContext, Figures, PendingModifier,
    PlayerOptions,
};
use evm_core::{
    compute_metrics, parse_money, round_money, validate_money, validate_schedule, Ledger,
    LedgerError, Metrics, ScheduleConfig, ValidationError,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors surfaced by engine operations.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    /// Week index outside the schedule.
    #[error("week {index} is out of range (schedule has {week_count} weeks)")]
    OutOfRange { index: usize, week_count: usize },
    /// Planned values can only change on the active, unresolved week.
    #[error("week {index} is not the current week (current: {current:?})")]
    NotCurrentWeek {
        index: usize,
        current: Option<usize>,
    },
    /// Card identifier outside the catalog.
    #[error("unknown card: {0}")]
    UnknownCard(String),
    /// A resolved week was written again.
    #[error("week {0} is already resolved")]
    AlreadyResolved(usize),
    /// Schedule values rejected by validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl From<LedgerError> for EngineError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::OutOfRange { index, week_count } => {
                EngineError::OutOfRange { index, week_count }
            }
            LedgerError::AlreadyResolved(i) => EngineError::AlreadyResolved(i),
        }
    }
}

impl From<CardError> for EngineError {
    fn from(e: CardError) -> Self {
        match e {
            CardError::UnknownCard(id) => EngineError::UnknownCard(id),
        }
    }
}

/// Position of the resolution cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeekCursor {
    /// Week `i` is next to resolve.
    Unresolved(usize),
    /// Every week has been resolved.
    AllResolved,
}

/// Card chosen for the coming resolution plus the player's options.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSelection {
    pub card: CardId,
    #[serde(default)]
    pub options: PlayerOptions,
}

/// What one resolution applied, for display.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    /// 0-based index of the resolved week.
    pub week: usize,
    pub card: CardId,
    pub applied_ev: Decimal,
    pub applied_ac: Decimal,
    pub note: String,
}

/// Simulation state for one session.
#[derive(Clone, Debug, Serialize)]
pub struct Engine {
    schedule: ScheduleConfig,
    ledger: Ledger,
    pending: PendingModifier,
    cursor: WeekCursor,
    selection: CardSelection,
    last_outcome: Option<ResolutionOutcome>,
}

impl Engine {
    /// Start a session with `week_count` empty weeks.
    pub fn initialize(
        week_count: usize,
        pv_per_week: Decimal,
        bac: Decimal,
    ) -> Result<Self, EngineError> {
        Self::new(ScheduleConfig {
            pv_per_week,
            bac,
            week_count,
        })
    }

    pub fn new(schedule: ScheduleConfig) -> Result<Self, EngineError> {
        validate_schedule(&schedule)?;
        info!(
            weeks = schedule.week_count,
            pv_per_week = %schedule.pv_per_week,
            bac = %schedule.bac,
            "engine initialized"
        );
        Ok(Self {
            ledger: Ledger::new(schedule.week_count),
            schedule,
            pending: PendingModifier::default(),
            cursor: WeekCursor::Unresolved(0),
            selection: CardSelection::default(),
            last_outcome: None,
        })
    }

    pub fn schedule(&self) -> &ScheduleConfig {
        &self.schedule
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn pending(&self) -> &PendingModifier {
        self.pending.peek()
    }

    pub fn cursor(&self) -> WeekCursor {
        self.cursor
    }

    /// Index of the week awaiting resolution; `None` once all are resolved.
    pub fn current_week(&self) -> Option<usize> {
        match self.cursor {
            WeekCursor::Unresolved(i) => Some(i),
            WeekCursor::AllResolved => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.cursor == WeekCursor::AllResolved
    }

    pub fn selection(&self) -> &CardSelection {
        &self.selection
    }

    pub fn last_outcome(&self) -> Option<&ResolutionOutcome> {
        self.last_outcome.as_ref()
    }

    fn check_current(&self, index: usize) -> Result<(), EngineError> {
        let week_count = self.ledger.len();
        if index >= week_count {
            return Err(EngineError::OutOfRange { index, week_count });
        }
        if self.cursor != WeekCursor::Unresolved(index) {
            return Err(EngineError::NotCurrentWeek {
                index,
                current: self.current_week(),
            });
        }
        Ok(())
    }

    /// Set planned EV/AC for the current week. `None` is the unset state.
    ///
    /// Amounts beyond [`evm_core::MAX_MONEY`] in magnitude are rejected.
    pub fn set_planned_values(
        &mut self,
        index: usize,
        ev: Option<Decimal>,
        ac: Option<Decimal>,
    ) -> Result<(), EngineError> {
        self.check_current(index)?;
        for v in ev.iter().chain(ac.iter()) {
            validate_money(*v)?;
        }
        self.ledger.set_planned(index, ev, ac)?;
        debug!(week = index, ?ev, ?ac, "planned values set");
        Ok(())
    }

    /// Like [`Engine::set_planned_values`] but from free-form text. Text
    /// never fails to coerce; oversized amounts saturate at the limit.
    pub fn set_planned_text(
        &mut self,
        index: usize,
        ev: &str,
        ac: &str,
    ) -> Result<(), EngineError> {
        self.set_planned_values(index, parse_money(ev), parse_money(ac))
    }

    /// Replace the note of any unresolved week.
    pub fn annotate_week(&mut self, index: usize, text: &str) -> Result<(), EngineError> {
        self.ledger.annotate(index, text)?;
        Ok(())
    }

    /// Select a card by its snake-case identifier.
    pub fn select_card(&mut self, id: &str, options: PlayerOptions) -> Result<(), EngineError> {
        let card: CardId = id.parse()?;
        self.select(card, options);
        Ok(())
    }

    pub fn select(&mut self, card: CardId, options: PlayerOptions) {
        debug!(%card, ?options, "card selected");
        self.selection = CardSelection { card, options };
    }

    /// Adjust PV/week and/or BAC between resolutions.
    pub fn set_schedule(
        &mut self,
        pv_per_week: Option<Decimal>,
        bac: Option<Decimal>,
    ) -> Result<(), EngineError> {
        let next = ScheduleConfig {
            pv_per_week: pv_per_week.unwrap_or(self.schedule.pv_per_week),
            bac: bac.unwrap_or(self.schedule.bac),
            week_count: self.schedule.week_count,
        };
        validate_schedule(&next)?;
        info!(pv_per_week = %next.pv_per_week, bac = %next.bac, "schedule updated");
        self.schedule = next;
        Ok(())
    }

    /// Resolve the current week with the selected card.
    ///
    /// The week note lists the fragments of consumed pending modifiers
    /// before the card note, joined with `; `. Earlier releases kept only
    /// the card note and dropped the modifier fragments.
    ///
    /// Returns `Ok(None)` without touching any state once every week has
    /// been resolved.
    pub fn resolve_current_week(&mut self) -> Result<Option<ResolutionOutcome>, EngineError> {
        let index = match self.cursor {
            WeekCursor::Unresolved(i) => i,
            WeekCursor::AllResolved => {
                warn!("all weeks resolved; ignoring resolve request");
                return Ok(None);
            }
        };
        let row = self.ledger.week(index)?;
        let planned = Figures::new(
            row.planned_ev().unwrap_or(Decimal::ZERO),
            row.planned_ac().unwrap_or(Decimal::ZERO),
        );
        let card = self.selection.card;

        let pending = self.pending.consume();
        let (ev, mut notes) = pending.apply(planned.ev);
        if !pending.is_empty() {
            debug!(week = index, ?pending, %ev, "pending modifiers applied");
        }

        let ctx = EffectContext {
            planned,
            week: index,
            schedule: &self.schedule,
            options: &self.selection.options,
        };
        let outcome = apply_card(card, &ctx, Figures::new(ev, planned.ac));
        let mut figures = outcome.figures;
        let mut card_note = outcome.note.clone();
        if let Some((corrected, fragment)) = apply_correction(card, &ctx, figures) {
            figures = corrected;
            card_note = format!("{card_note} {fragment}");
        }
        notes.push(card_note);

        if let Some(change) = outcome.schedule_change {
            change.apply_to(&mut self.schedule);
            info!(
                bac = %self.schedule.bac,
                pv_per_week = %self.schedule.pv_per_week,
                "schedule changed by card"
            );
        }
        self.pending.merge(&outcome.next_week);

        let applied_ev = round_money(figures.ev).max(Decimal::ZERO);
        let applied_ac = round_money(figures.ac).max(Decimal::ZERO);
        let note = notes.join("; ");
        self.ledger
            .commit_applied(index, applied_ev, applied_ac, &note)?;

        self.cursor = if index + 1 < self.ledger.len() {
            WeekCursor::Unresolved(index + 1)
        } else {
            WeekCursor::AllResolved
        };
        info!(week = index + 1, %card, %applied_ev, %applied_ac, "week resolved");

        let resolved = ResolutionOutcome {
            week: index,
            card,
            applied_ev,
            applied_ac,
            note,
        };
        self.last_outcome = Some(resolved.clone());
        Ok(Some(resolved))
    }

    /// Per-week rows and cumulative EVM series for the current state.
    pub fn metrics(&self) -> Metrics {
        compute_metrics(&self.ledger, &self.schedule)
    }

    /// Start over; omitted values fall back to the defaults.
    pub fn reset(
        &mut self,
        week_count: Option<usize>,
        pv_per_week: Option<Decimal>,
        bac: Option<Decimal>,
    ) -> Result<(), EngineError> {
        let defaults = ScheduleConfig::default();
        *self = Self::new(ScheduleConfig {
            pv_per_week: pv_per_week.unwrap_or(defaults.pv_per_week),
            bac: bac.unwrap_or(defaults.bac),
            week_count: week_count.unwrap_or(defaults.week_count),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    fn engine(weeks: usize) -> Engine {
        Engine::initialize(weeks, d(100_000), d(100_000 * weeks as i64)).unwrap()
    }

    fn play(e: &mut Engine, card: CardId, ev: i64, ac: i64) -> ResolutionOutcome {
        let i = e.current_week().unwrap();
        e.set_planned_values(i, Some(d(ev)), Some(d(ac))).unwrap();
        e.select(card, PlayerOptions::default());
        e.resolve_current_week().unwrap().unwrap()
    }

    #[test]
    fn scenario_normal_week() {
        let mut e = engine(3);
        let out = play(&mut e, CardId::None, 90_000, 90_000);
        assert_eq!(out.applied_ev, d(90_000));
        assert_eq!(out.applied_ac, d(90_000));
        assert_eq!(out.note, "Normal week.");
        let m = e.metrics();
        assert_eq!(m.cumulative[0].cpi, Some(Decimal::ONE));
        assert_eq!(m.cumulative[0].spi, Some(Decimal::new(9, 1)));
        assert_eq!(e.current_week(), Some(1));
    }

    #[test]
    fn scenario_weather_shutdown() {
        let mut e = engine(3);
        let out = play(&mut e, CardId::WeatherShutdown, 70_000, 80_000);
        assert_eq!(out.applied_ev, Decimal::ZERO);
        assert_eq!(out.applied_ac, d(130_000));
    }

    #[test]
    fn scenario_engagement_bonus_next_week() {
        let mut e = engine(3);
        let w0 = play(&mut e, CardId::EngagementBoost, 0, 0);
        assert_eq!(w0.applied_ev, Decimal::ZERO);
        assert_eq!(e.pending().ev_bonus, d(20_000));
        let w1 = play(&mut e, CardId::None, 50_000, 0);
        assert_eq!(w1.applied_ev, d(70_000));
        assert_eq!(w1.note, "Next-week EV bonus +$20,000; Normal week.");
        assert!(e.pending().is_empty());
    }

    #[test]
    fn scenario_supply_discount() {
        let mut e = engine(3);
        let out = play(&mut e, CardId::SupplyDiscount, 60_000, 125_000);
        assert_eq!(out.applied_ev, d(80_000));
        assert!(out.note.ends_with("+$20k EV (bulk discount)"));
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["card"], "supply_discount");
        assert_eq!(json["week"], 0);
    }

    #[test]
    fn scenario_scope_change_is_retroactive() {
        let mut e = Engine::initialize(10, d(100_000), d(1_000_000)).unwrap();
        play(&mut e, CardId::None, 100_000, 100_000);
        let before = e.metrics().cumulative[0].pv;
        assert_eq!(before, d(100_000));
        let out = play(&mut e, CardId::ScopeChange, 50_000, 40_000);
        assert_eq!(out.applied_ev, d(50_000));
        assert_eq!(out.applied_ac, d(40_000));
        assert_eq!(e.schedule().bac, d(1_100_000));
        assert_eq!(e.schedule().pv_per_week, d(111_111));
        let m = e.metrics();
        assert_eq!(m.cumulative[0].pv, d(111_111));
        assert_eq!(m.cumulative[9].pv, d(1_111_110));
        assert_eq!(m.bac, d(1_100_000));
    }

    #[test]
    fn pending_modifier_lives_one_week() {
        let mut e = engine(4);
        let mut opts = PlayerOptions::default();
        opts.pay_vendor_substitution = false;
        e.set_planned_values(0, Some(d(100_000)), Some(d(0)))
            .unwrap();
        e.select(CardId::VendorSubstitution, opts);
        e.resolve_current_week().unwrap();
        assert_eq!(e.pending().ev_cap, Some(d(40_000)));

        let w1 = play(&mut e, CardId::None, 100_000, 0);
        assert_eq!(w1.applied_ev, d(40_000));
        let w2 = play(&mut e, CardId::None, 100_000, 0);
        assert_eq!(w2.applied_ev, d(100_000));
    }

    #[test]
    fn scope_clarification_expires_after_one_week() {
        let mut e = engine(3);
        play(&mut e, CardId::ScopeClarification, 90_000, 0);
        assert!(e.pending().ignore_ev_cap);
        let w1 = play(&mut e, CardId::None, 90_000, 0);
        assert_eq!(w1.applied_ev, d(90_000));
        assert_eq!(w1.note, "Normal week.");
        assert!(e.pending().is_empty());
    }

    #[test]
    fn bonuses_from_consecutive_weeks_do_not_stack() {
        let mut e = engine(4);
        play(&mut e, CardId::TrainingInvestment, 0, 0);
        let w1 = play(&mut e, CardId::EngagementBoost, 10_000, 0);
        assert_eq!(w1.applied_ev, d(40_000));
        let w2 = play(&mut e, CardId::None, 10_000, 0);
        assert_eq!(w2.applied_ev, d(30_000));
    }

    #[test]
    fn replacing_cards_drop_pending_bonus() {
        let mut e = engine(3);
        play(&mut e, CardId::EngagementBoost, 0, 0);
        let w1 = play(&mut e, CardId::LuckyBreak, 10_000, 0);
        assert_eq!(w1.applied_ev, d(50_000));
        assert!(w1.note.starts_with("Next-week EV bonus +$20,000; "));
    }

    #[test]
    fn applied_values_are_clamped() {
        let mut e = engine(2);
        let out = play(&mut e, CardId::ReworkRequired, 10_000, 5);
        assert_eq!(out.applied_ev, Decimal::ZERO);
        let out = play(&mut e, CardId::None, -5, 0);
        assert_eq!(out.applied_ev, Decimal::ZERO);
    }

    #[test]
    fn oversized_amounts_never_panic() {
        let mut e = engine(3);
        e.set_planned_text(0, "79228162514264337593543950335", "0").unwrap();
        e.select(CardId::LuckyBreak, PlayerOptions::default());
        let out = e.resolve_current_week().unwrap().unwrap();
        assert_eq!(out.applied_ev, d(evm_core::MAX_MONEY) + d(40_000));
        e.set_planned_text(1, "-99999999999999999999999999999999", "99999999999999999999999999999999")
            .unwrap();
        e.select(CardId::ProductivitySurge, PlayerOptions::default());
        e.resolve_current_week().unwrap().unwrap();
        let m = e.metrics();
        assert_eq!(m.cumulative[1].ev, d(evm_core::MAX_MONEY) + d(40_000));
        assert_eq!(m.cumulative[1].ac, d(evm_core::MAX_MONEY));

        let mut e = engine(3);
        let too_big = d(evm_core::MAX_MONEY) + Decimal::ONE;
        assert_eq!(
            e.set_planned_values(0, Some(too_big), None),
            Err(EngineError::Invalid(ValidationError::MoneyOutOfRange(too_big)))
        );
        assert_eq!(e.ledger().week(0).unwrap().planned_ev(), None);
        assert!(matches!(
            e.set_schedule(Some(Decimal::MAX), None),
            Err(EngineError::Invalid(ValidationError::MoneyOutOfRange(_)))
        ));
    }

    #[test]
    fn fractional_plans_are_rounded() {
        let mut e = engine(1);
        e.set_planned_text(0, "1,000.5", "abc").unwrap();
        let out = e.resolve_current_week().unwrap().unwrap();
        assert_eq!(out.applied_ev, d(1_001));
        assert_eq!(out.applied_ac, Decimal::ZERO);
        assert_eq!(e.ledger().week(0).unwrap().planned_ac(), None);
    }

    #[test]
    fn cursor_gates_planned_edits() {
        let mut e = engine(3);
        assert_eq!(
            e.set_planned_values(1, Some(d(1)), None),
            Err(EngineError::NotCurrentWeek {
                index: 1,
                current: Some(0)
            })
        );
        assert_eq!(
            e.set_planned_values(3, Some(d(1)), None),
            Err(EngineError::OutOfRange {
                index: 3,
                week_count: 3
            })
        );
        play(&mut e, CardId::None, 1, 1);
        assert!(matches!(
            e.set_planned_values(0, Some(d(1)), None),
            Err(EngineError::NotCurrentWeek { index: 0, .. })
        ));
    }

    #[test]
    fn resolve_past_final_week_is_noop() {
        let mut e = engine(2);
        play(&mut e, CardId::None, 1, 1);
        play(&mut e, CardId::EngagementBoost, 1, 1);
        assert!(e.is_finished());
        assert_eq!(e.current_week(), None);
        let before = e.metrics();
        let pending = e.pending().clone();
        assert_eq!(e.resolve_current_week(), Ok(None));
        assert_eq!(e.metrics(), before);
        assert_eq!(e.pending(), &pending);
        assert_eq!(e.last_outcome().map(|o| o.week), Some(1));
        assert!(matches!(
            e.set_planned_values(1, None, None),
            Err(EngineError::NotCurrentWeek { current: None, .. })
        ));
    }

    #[test]
    fn unknown_card_is_rejected() {
        let mut e = engine(1);
        assert_eq!(
            e.select_card("alien_invasion", PlayerOptions::default()),
            Err(EngineError::UnknownCard("alien_invasion".to_string()))
        );
        e.select_card("funding_hold", PlayerOptions::default())
            .unwrap();
        assert_eq!(e.selection().card, CardId::FundingHold);
    }

    #[test]
    fn annotations_survive_resolution() {
        let mut e = engine(2);
        e.annotate_week(1, "crane rental").unwrap();
        play(&mut e, CardId::None, 1, 1);
        play(&mut e, CardId::PermitFeeIncrease, 1, 1);
        assert_eq!(
            e.ledger().week(1).unwrap().note(),
            "crane rental | Permit fee increase: AC +$20k."
        );
        assert_eq!(
            e.annotate_week(1, "late"),
            Err(EngineError::AlreadyResolved(1))
        );
    }

    #[test]
    fn schedule_edits_are_validated() {
        let mut e = engine(2);
        e.set_schedule(Some(d(120_000)), None).unwrap();
        assert_eq!(e.schedule().pv_per_week, d(120_000));
        assert_eq!(e.schedule().bac, d(200_000));
        assert_eq!(
            e.set_schedule(None, Some(d(-1))),
            Err(EngineError::Invalid(ValidationError::NegativeMoney(d(-1))))
        );
        assert!(Engine::initialize(0, d(1), d(1)).is_err());
    }

    #[test]
    fn reset_restores_defaults() {
        let mut e = engine(3);
        play(&mut e, CardId::TrainingInvestment, 10, 10);
        e.reset(None, None, None).unwrap();
        assert_eq!(e.schedule(), &ScheduleConfig::default());
        assert_eq!(e.ledger().len(), 10);
        assert!(e.pending().is_empty());
        assert_eq!(e.current_week(), Some(0));
        assert!(e.last_outcome().is_none());
        e.reset(Some(4), Some(d(5)), None).unwrap();
        assert_eq!(e.ledger().len(), 4);
        assert_eq!(e.schedule().pv_per_week, d(5));
    }

    proptest! {
        #[test]
        fn random_games_keep_invariants(plays in proptest::collection::vec((0usize..31, 0i64..200_000, 0i64..200_000), 1..12)) {
            let mut e = engine(plays.len());
            let mut last_cursor = 0usize;
            for (card_ix, ev, ac) in &plays {
                let out = play(&mut e, CardId::ALL[*card_ix], *ev, *ac);
                prop_assert!(out.applied_ev >= Decimal::ZERO);
                prop_assert!(out.applied_ac >= Decimal::ZERO);
                prop_assert_eq!(out.week, last_cursor);
                last_cursor += 1;
                let m1 = e.metrics();
                let m2 = e.metrics();
                prop_assert_eq!(&m1, &m2);
            }
            prop_assert!(e.is_finished());
            let m = e.metrics();
            let mut ev_prev = Decimal::ZERO;
            for (i, row) in m.cumulative.iter().enumerate() {
                let applied = e.ledger().week(i).unwrap().applied_ev().unwrap();
                prop_assert_eq!(row.ev, ev_prev + applied);
                prop_assert_eq!(row.pv, e.schedule().pv_per_week * Decimal::from(i + 1));
                ev_prev = row.ev;
            }
        }
    }
}
