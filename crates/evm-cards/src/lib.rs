#![deny(warnings)]

//! Event cards for the earned value simulator.
//!
//! This crate provides:
//! - The closed card enumeration with a declarative catalog (label, player
//!   option, effect function, AC-conditional correction)
//! - The single-slot store of modifiers a card schedules for the next week
//! - A seeded deck that draws a random card each week

use evm_core::{clamp_money, format_money, round_money, ScheduleConfig};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Errors produced by card lookups.
#[derive(Debug, Error, PartialEq)]
pub enum CardError {
    /// Identifier outside the closed card enumeration.
    #[error("unknown card: {0}")]
    UnknownCard(String),
}

/// Identifier of an event card. `None` is a normal week.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardId {
    #[default]
    None,
    SupplierDelay,
    WeatherShutdown,
    StaffOvertime,
    ScopeChange,
    LuckyBreak,
    PermitSlip,
    EquipmentFailure,
    SkilledCrew,
    SupplyDiscount,
    EngagementBoost,
    GridStudyDelay,
    DesignOptimization,
    SafetyStanddown,
    VendorSubstitution,
    InspectionPass,
    ReworkRequired,
    WeatherWindow,
    PriceInflation,
    PermitFeeIncrease,
    SiteAccessConstraint,
    TrainingInvestment,
    SubNoShow,
    FxFavorable,
    DonationMaterials,
    StormDamage,
    ProductivitySurge,
    ScopeClarification,
    FundingHold,
    LogisticsOptimization,
    ExtraQaCycle,
}

impl CardId {
    /// Every card in catalog order; index 0 is `None`.
    pub const ALL: [CardId; 31] = [
        CardId::None,
        CardId::SupplierDelay,
        CardId::WeatherShutdown,
        CardId::StaffOvertime,
        CardId::ScopeChange,
        CardId::LuckyBreak,
        CardId::PermitSlip,
        CardId::EquipmentFailure,
        CardId::SkilledCrew,
        CardId::SupplyDiscount,
        CardId::EngagementBoost,
        CardId::GridStudyDelay,
        CardId::DesignOptimization,
        CardId::SafetyStanddown,
        CardId::VendorSubstitution,
        CardId::InspectionPass,
        CardId::ReworkRequired,
        CardId::WeatherWindow,
        CardId::PriceInflation,
        CardId::PermitFeeIncrease,
        CardId::SiteAccessConstraint,
        CardId::TrainingInvestment,
        CardId::SubNoShow,
        CardId::FxFavorable,
        CardId::DonationMaterials,
        CardId::StormDamage,
        CardId::ProductivitySurge,
        CardId::ScopeClarification,
        CardId::FundingHold,
        CardId::LogisticsOptimization,
        CardId::ExtraQaCycle,
    ];

    /// Catalog entry for this card.
    pub fn meta(self) -> &'static CardMeta {
        &CATALOG[self as usize]
    }

    /// Snake-case identifier, e.g. "supplier_delay".
    pub fn as_str(self) -> &'static str {
        self.meta().key
    }

    /// Caption shown in a card selector.
    pub fn label(self) -> &'static str {
        self.meta().label
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardId {
    type Err = CardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        CATALOG
            .iter()
            .find(|m| m.key == key)
            .map(|m| m.id)
            .ok_or_else(|| CardError::UnknownCard(key.to_string()))
    }
}

/// Player decision that alters a card's effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    /// Skilled crew: hire the contractor.
    HireSkilledCrew,
    /// Vendor substitution: pay to avoid next week's EV cap.
    PayVendorSubstitution,
    /// Subcontractor no-show: pay to expedite.
    ExpediteNoShow,
}

/// Player choices, read only by the cards that declare an option.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerOptions {
    pub hire_skilled_crew: bool,
    pub pay_vendor_substitution: bool,
    pub expedite_no_show: bool,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            hire_skilled_crew: true,
            pay_vendor_substitution: true,
            expedite_no_show: false,
        }
    }
}

impl PlayerOptions {
    pub fn get(&self, kind: OptionKind) -> bool {
        match kind {
            OptionKind::HireSkilledCrew => self.hire_skilled_crew,
            OptionKind::PayVendorSubstitution => self.pay_vendor_substitution,
            OptionKind::ExpediteNoShow => self.expedite_no_show,
        }
    }
}

/// Modifiers scheduled for the next resolution.
///
/// `ev_bonus` adds up across cards, `ev_cap` is last-writer-wins and
/// `ignore_ev_cap` stays set once raised. The slot lives for exactly one
/// resolution: `consume` hands out the snapshot and resets it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingModifier {
    pub ev_bonus: Decimal,
    pub ev_cap: Option<Decimal>,
    pub ignore_ev_cap: bool,
}

impl PendingModifier {
    pub fn is_empty(&self) -> bool {
        self.ev_bonus.is_zero() && self.ev_cap.is_none() && !self.ignore_ev_cap
    }

    pub fn peek(&self) -> &Self {
        self
    }

    /// Take the current snapshot and leave the defaults behind.
    pub fn consume(&mut self) -> Self {
        std::mem::take(self)
    }

    pub fn accumulate(&mut self, bonus: Option<Decimal>, cap: Option<Decimal>, ignore_cap: bool) {
        if let Some(b) = bonus {
            self.ev_bonus += b;
        }
        if cap.is_some() {
            self.ev_cap = cap;
        }
        self.ignore_ev_cap |= ignore_cap;
    }

    /// Fold a card's scheduled writes into this slot.
    pub fn merge(&mut self, writes: &PendingModifier) {
        let bonus = (!writes.ev_bonus.is_zero()).then_some(writes.ev_bonus);
        self.accumulate(bonus, writes.ev_cap, writes.ignore_ev_cap);
    }

    /// Apply bonus then cap to `ev`, returning the new EV and note fragments.
    pub fn apply(&self, ev: Decimal) -> (Decimal, Vec<String>) {
        let mut ev = ev;
        let mut notes = Vec::new();
        if !self.ev_bonus.is_zero() {
            ev += self.ev_bonus;
            notes.push(format!(
                "Next-week EV bonus +${}",
                format_money(self.ev_bonus)
            ));
        }
        if let Some(cap) = self.ev_cap {
            if !self.ignore_ev_cap {
                ev = ev.min(cap);
                notes.push(format!("Next-week EV cap ${}", format_money(cap)));
            }
        }
        (ev, notes)
    }
}

/// Working EV/AC pair for the week being resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Figures {
    pub ev: Decimal,
    pub ac: Decimal,
}

impl Figures {
    pub fn new(ev: Decimal, ac: Decimal) -> Self {
        Self { ev, ac }
    }
}

/// Read-only inputs available to a card effect.
#[derive(Clone, Copy, Debug)]
pub struct EffectContext<'a> {
    /// Planned figures as entered, unset treated as zero.
    pub planned: Figures,
    /// 0-based index of the week being resolved.
    pub week: usize,
    pub schedule: &'a ScheduleConfig,
    pub options: &'a PlayerOptions,
}

/// Budget change requested by a card.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleChange {
    pub bac_delta: Decimal,
    pub pv_per_week_delta: Decimal,
}

impl ScheduleChange {
    pub fn apply_to(&self, schedule: &mut ScheduleConfig) {
        schedule.bac = clamp_money(schedule.bac + self.bac_delta);
        schedule.pv_per_week = clamp_money(schedule.pv_per_week + self.pv_per_week_delta);
    }
}

/// Result of a card's main effect.
#[derive(Clone, Debug, PartialEq)]
pub struct CardOutcome {
    pub figures: Figures,
    pub note: String,
    pub schedule_change: Option<ScheduleChange>,
    /// Writes for the next week's modifier slot; empty when none.
    pub next_week: PendingModifier,
}

impl CardOutcome {
    fn new(figures: Figures, note: impl Into<String>) -> Self {
        Self {
            figures,
            note: note.into(),
            schedule_change: None,
            next_week: PendingModifier::default(),
        }
    }

    fn with_next_week(mut self, writes: PendingModifier) -> Self {
        self.next_week = writes;
        self
    }
}

type EffectFn = fn(&EffectContext<'_>, Figures) -> CardOutcome;
type CorrectionFn = fn(&EffectContext<'_>, Figures) -> Option<(Figures, &'static str)>;

/// Declarative catalog record for one card.
pub struct CardMeta {
    pub id: CardId,
    pub key: &'static str,
    pub label: &'static str,
    /// Player option this card reads, if any.
    pub option: Option<OptionKind>,
    effect: EffectFn,
    correction: Option<CorrectionFn>,
}

impl CardMeta {
    /// Default value of this card's option, when it has one.
    pub fn option_default(&self) -> Option<bool> {
        self.option.map(|k| PlayerOptions::default().get(k))
    }

    /// Whether the card carries an AC-conditional correction.
    pub fn is_conditional(&self) -> bool {
        self.correction.is_some()
    }
}

impl fmt::Debug for CardMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardMeta")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("option", &self.option)
            .finish()
    }
}

fn k(v: i64) -> Decimal {
    Decimal::from(v * 1_000)
}

fn bonus(v: Decimal) -> PendingModifier {
    PendingModifier {
        ev_bonus: v,
        ..PendingModifier::default()
    }
}

fn normal_week(_: &EffectContext<'_>, f: Figures) -> CardOutcome {
    CardOutcome::new(f, "Normal week.")
}

fn supplier_delay(c: &EffectContext<'_>, f: Figures) -> CardOutcome {
    let ev = c.planned.ev.min(round_money(c.planned.ev * Decimal::new(5, 1)));
    CardOutcome::new(
        Figures::new(ev, f.ac),
        "Supplier delay: EV capped at 50% of plan.",
    )
}

fn weather_shutdown(c: &EffectContext<'_>, _: Figures) -> CardOutcome {
    CardOutcome::new(
        Figures::new(Decimal::ZERO, c.planned.ac + k(50)),
        "Weather shutdown: EV=0, AC +$50k overhead.",
    )
}

fn staff_overtime(c: &EffectContext<'_>, _: Figures) -> CardOutcome {
    CardOutcome::new(
        Figures::new(c.planned.ev + k(50), c.planned.ac + k(30)),
        "Staff overtime: +$50k EV, +$30k AC.",
    )
}

fn scope_change(c: &EffectContext<'_>, f: Figures) -> CardOutcome {
    let delta = k(100);
    let remaining = Decimal::from(c.schedule.remaining_weeks(c.week));
    let per_week = round_money(delta / remaining);
    let mut out = CardOutcome::new(
        f,
        format!(
            "Scope change: BAC +${}; PV/week +${} for remaining weeks.",
            format_money(delta),
            format_money(per_week)
        ),
    );
    out.schedule_change = Some(ScheduleChange {
        bac_delta: delta,
        pv_per_week_delta: per_week,
    });
    out
}

fn lucky_break(c: &EffectContext<'_>, f: Figures) -> CardOutcome {
    CardOutcome::new(
        Figures::new(c.planned.ev + k(40), f.ac),
        "Lucky break: +$40k EV at no cost.",
    )
}

fn permit_slip(c: &EffectContext<'_>, f: Figures) -> CardOutcome {
    CardOutcome::new(
        Figures::new(c.planned.ev.min(k(30)), f.ac),
        "Permit slippage: EV limited to $30k this week.",
    )
}

fn equipment_failure(c: &EffectContext<'_>, _: Figures) -> CardOutcome {
    CardOutcome::new(
        Figures::new(
            (c.planned.ev - k(40)).max(Decimal::ZERO),
            c.planned.ac + k(25),
        ),
        "Equipment failure: EV -$40k, AC +$25k.",
    )
}

fn skilled_crew(c: &EffectContext<'_>, f: Figures) -> CardOutcome {
    if c.options.hire_skilled_crew {
        CardOutcome::new(
            Figures::new(c.planned.ev + k(90), c.planned.ac + k(60)),
            "Skilled crew hired: +$90k EV for +$60k AC.",
        )
    } else {
        CardOutcome::new(f, "Skilled crew available (declined): no change.")
    }
}

fn supply_discount(_: &EffectContext<'_>, f: Figures) -> CardOutcome {
    CardOutcome::new(
        f,
        "Supply bulk discount: If AC >= $120k this week, EV +$20k.",
    )
}

fn supply_discount_check(_: &EffectContext<'_>, f: Figures) -> Option<(Figures, &'static str)> {
    (f.ac >= k(120)).then(|| (Figures::new(f.ev + k(20), f.ac), "+$20k EV (bulk discount)"))
}

fn engagement_boost(_: &EffectContext<'_>, f: Figures) -> CardOutcome {
    CardOutcome::new(f, "Community engagement boost: Next week EV +$20k.")
        .with_next_week(bonus(k(20)))
}

fn grid_study_delay(_: &EffectContext<'_>, f: Figures) -> CardOutcome {
    CardOutcome::new(
        Figures::new(f.ev.min(k(20)), f.ac),
        "Grid study delay: EV capped at $20k this week.",
    )
}

fn design_optimization(_: &EffectContext<'_>, f: Figures) -> CardOutcome {
    CardOutcome::new(
        Figures::new(f.ev, (f.ac - k(20)).max(Decimal::ZERO)),
        "Design optimization: AC -$20k (same EV).",
    )
}

fn safety_standdown(_: &EffectContext<'_>, f: Figures) -> CardOutcome {
    CardOutcome::new(
        Figures::new(Decimal::ZERO, f.ac + k(30)),
        "Safety stand-down: EV=0; AC +$30k fixed cost.",
    )
}

fn vendor_substitution(c: &EffectContext<'_>, f: Figures) -> CardOutcome {
    if c.options.pay_vendor_substitution {
        CardOutcome::new(
            Figures::new(f.ev, f.ac + k(15)),
            "Vendor substitution paid: Avoided two-week slip; no EV cap.",
        )
    } else {
        CardOutcome::new(f, "Vendor substitution declined: Next week EV cap $40k.")
            .with_next_week(PendingModifier {
                ev_cap: Some(k(40)),
                ..PendingModifier::default()
            })
    }
}

fn inspection_pass(_: &EffectContext<'_>, f: Figures) -> CardOutcome {
    CardOutcome::new(
        Figures::new(f.ev + k(30), f.ac),
        "Inspection pass: +$30k EV at no cost.",
    )
}

fn rework_required(_: &EffectContext<'_>, f: Figures) -> CardOutcome {
    CardOutcome::new(
        Figures::new(f.ev - k(35), f.ac),
        "Rework required: EV -$35k cumulatively.",
    )
}

fn weather_window(_: &EffectContext<'_>, f: Figures) -> CardOutcome {
    CardOutcome::new(f, "Weather window: If AC >= planned AC, +$25k EV.")
}

fn weather_window_check(c: &EffectContext<'_>, f: Figures) -> Option<(Figures, &'static str)> {
    (f.ac >= c.planned.ac)
        .then(|| (Figures::new(f.ev + k(25), f.ac), "+$25k EV (weather window)"))
}

fn price_inflation(_: &EffectContext<'_>, f: Figures) -> CardOutcome {
    CardOutcome::new(
        Figures::new(f.ev, round_money(f.ac * Decimal::new(115, 2))),
        "Price inflation: AC x1.15 this week.",
    )
}

fn permit_fee_increase(_: &EffectContext<'_>, f: Figures) -> CardOutcome {
    CardOutcome::new(
        Figures::new(f.ev, f.ac + k(20)),
        "Permit fee increase: AC +$20k.",
    )
}

fn site_access_constraint(_: &EffectContext<'_>, f: Figures) -> CardOutcome {
    CardOutcome::new(
        Figures::new(f.ev.min(k(60)), f.ac),
        "Site access constraint: EV capped at $60k this week.",
    )
}

fn training_investment(_: &EffectContext<'_>, f: Figures) -> CardOutcome {
    CardOutcome::new(
        Figures::new(f.ev, f.ac + k(20)),
        "Training investment: AC +$20k; next week EV +$30k.",
    )
    .with_next_week(bonus(k(30)))
}

fn sub_no_show(c: &EffectContext<'_>, f: Figures) -> CardOutcome {
    if c.options.expedite_no_show {
        CardOutcome::new(
            Figures::new(f.ev, f.ac + k(40)),
            "Subcontractor no-show: Expedited +$40k; EV normal.",
        )
    } else {
        CardOutcome::new(
            Figures::new(Decimal::ZERO, f.ac),
            "Subcontractor no-show: EV=0 (no expedite).",
        )
    }
}

fn fx_favorable(_: &EffectContext<'_>, f: Figures) -> CardOutcome {
    CardOutcome::new(
        Figures::new(f.ev, (f.ac - k(15)).max(Decimal::ZERO)),
        "Favorable exchange rate: AC -$15k.",
    )
}

fn donation_materials(_: &EffectContext<'_>, f: Figures) -> CardOutcome {
    CardOutcome::new(
        Figures::new(f.ev + k(25), f.ac),
        "Donation of materials: +$25k EV at no cost.",
    )
}

fn storm_damage(_: &EffectContext<'_>, f: Figures) -> CardOutcome {
    CardOutcome::new(
        Figures::new(f.ev - k(20), f.ac + k(10)),
        "Storm damage: EV -$20k; AC +$10k cleanup.",
    )
}

fn productivity_surge(_: &EffectContext<'_>, f: Figures) -> CardOutcome {
    CardOutcome::new(
        Figures::new(round_money(f.ev * Decimal::new(15, 1)), f.ac),
        "Productivity surge: EV +50% this week.",
    )
}

fn scope_clarification(_: &EffectContext<'_>, f: Figures) -> CardOutcome {
    CardOutcome::new(f, "Scope clarification: Next week ignore any EV cap.").with_next_week(
        PendingModifier {
            ignore_ev_cap: true,
            ..PendingModifier::default()
        },
    )
}

fn funding_hold(_: &EffectContext<'_>, f: Figures) -> CardOutcome {
    CardOutcome::new(
        Figures::new(f.ev, f.ac.min(k(50))),
        "Funding hold: AC capped at $50k this week.",
    )
}

fn logistics_optimization(_: &EffectContext<'_>, f: Figures) -> CardOutcome {
    CardOutcome::new(
        f,
        "Logistics optimization: If AC >= $80k, AC -$10k and EV +$10k.",
    )
}

fn logistics_optimization_check(
    _: &EffectContext<'_>,
    f: Figures,
) -> Option<(Figures, &'static str)> {
    (f.ac >= k(80)).then(|| {
        (
            Figures::new(f.ev + k(10), (f.ac - k(10)).max(Decimal::ZERO)),
            "Rebate -$10k AC and +$10k EV (logistics)",
        )
    })
}

fn extra_qa_cycle(_: &EffectContext<'_>, f: Figures) -> CardOutcome {
    CardOutcome::new(
        Figures::new(f.ev.min(k(40)), f.ac + k(10)),
        "Extra QA cycle: EV cap $40k; AC +$10k.",
    )
}

macro_rules! card {
    ($id:ident, $key:literal, $label:literal, $effect:ident) => {
        card!($id, $key, $label, None, $effect, None)
    };
    ($id:ident, $key:literal, $label:literal, $option:expr, $effect:ident, $correction:expr) => {
        CardMeta {
            id: CardId::$id,
            key: $key,
            label: $label,
            option: $option,
            effect: $effect,
            correction: $correction,
        }
    };
}

static CATALOG: [CardMeta; 31] = [
    card!(None, "none", "None (Normal week)", normal_week),
    card!(
        SupplierDelay,
        "supplier_delay",
        "Supplier delay (EV capped at 50% of plan)",
        supplier_delay
    ),
    card!(
        WeatherShutdown,
        "weather_shutdown",
        "Weather shutdown (EV=0, AC +$50k)",
        weather_shutdown
    ),
    card!(
        StaffOvertime,
        "staff_overtime",
        "Staff overtime (EV +$50k, AC +$30k)",
        staff_overtime
    ),
    card!(
        ScopeChange,
        "scope_change",
        "Scope change (BAC +$100k; adjust PV/week for remaining)",
        scope_change
    ),
    card!(LuckyBreak, "lucky_break", "Lucky break (EV +$40k)", lucky_break),
    card!(
        PermitSlip,
        "permit_slip",
        "Permit review slippage (EV capped at $30k)",
        permit_slip
    ),
    card!(
        EquipmentFailure,
        "equipment_failure",
        "Equipment failure (EV -$40k, AC +$25k)",
        equipment_failure
    ),
    card!(
        SkilledCrew,
        "skilled_crew",
        "Skilled crew available (option: +$90k EV for +$60k AC)",
        Some(OptionKind::HireSkilledCrew),
        skilled_crew,
        None
    ),
    card!(
        SupplyDiscount,
        "supply_discount",
        "Supply bulk discount (if AC >= $120k, +$20k EV)",
        None,
        supply_discount,
        Some(supply_discount_check)
    ),
    card!(
        EngagementBoost,
        "engagement_boost",
        "Community engagement boost (next week EV +$20k)",
        engagement_boost
    ),
    card!(
        GridStudyDelay,
        "grid_study_delay",
        "Grid interconnection study delay (EV cap $20k)",
        grid_study_delay
    ),
    card!(
        DesignOptimization,
        "design_optimization",
        "Design optimization (AC -$20k for same EV)",
        design_optimization
    ),
    card!(
        SafetyStanddown,
        "safety_standdown",
        "Safety stand-down (EV=0; AC +$30k)",
        safety_standdown
    ),
    card!(
        VendorSubstitution,
        "vendor_substitution",
        "Vendor substitution (pay +$15k to avoid next-week cap)",
        Some(OptionKind::PayVendorSubstitution),
        vendor_substitution,
        None
    ),
    card!(
        InspectionPass,
        "inspection_pass",
        "Inspection pass (EV +$30k at no cost)",
        inspection_pass
    ),
    card!(
        ReworkRequired,
        "rework_required",
        "Rework required (EV -$35k cumulatively)",
        rework_required
    ),
    card!(
        WeatherWindow,
        "weather_window",
        "Weather window (if AC >= plan AC, +$25k EV)",
        None,
        weather_window,
        Some(weather_window_check)
    ),
    card!(
        PriceInflation,
        "price_inflation",
        "Price inflation (AC x1.15)",
        price_inflation
    ),
    card!(
        PermitFeeIncrease,
        "permit_fee_increase",
        "Permit fee increase (AC +$20k)",
        permit_fee_increase
    ),
    card!(
        SiteAccessConstraint,
        "site_access_constraint",
        "Site access constraint (EV cap $60k)",
        site_access_constraint
    ),
    card!(
        TrainingInvestment,
        "training_investment",
        "Training investment (AC +$20k; next week EV +$30k)",
        training_investment
    ),
    card!(
        SubNoShow,
        "sub_no_show",
        "Subcontractor no-show (option: pay +$40k to proceed)",
        Some(OptionKind::ExpediteNoShow),
        sub_no_show,
        None
    ),
    card!(
        FxFavorable,
        "fx_favorable",
        "Favorable exchange rate (AC -$15k)",
        fx_favorable
    ),
    card!(
        DonationMaterials,
        "donation_materials",
        "Donation of materials (EV +$25k)",
        donation_materials
    ),
    card!(
        StormDamage,
        "storm_damage",
        "Storm damage (EV -$20k; AC +$10k)",
        storm_damage
    ),
    card!(
        ProductivitySurge,
        "productivity_surge",
        "Productivity surge (EV +50%)",
        productivity_surge
    ),
    card!(
        ScopeClarification,
        "scope_clarification",
        "Scope clarification (next week ignore EV cap)",
        scope_clarification
    ),
    card!(
        FundingHold,
        "funding_hold",
        "Funding hold (AC cap $50k this week)",
        funding_hold
    ),
    card!(
        LogisticsOptimization,
        "logistics_optimization",
        "Logistics optimization (if AC >= $80k, -$10k AC and +$10k EV)",
        None,
        logistics_optimization,
        Some(logistics_optimization_check)
    ),
    card!(
        ExtraQaCycle,
        "extra_qa_cycle",
        "Extra QA cycle (EV cap $40k; AC +$10k)",
        extra_qa_cycle
    ),
];

/// Run a card's main effect on the working figures.
pub fn apply_card(card: CardId, ctx: &EffectContext<'_>, current: Figures) -> CardOutcome {
    let out = (card.meta().effect)(ctx, current);
    debug!(%card, ev = %out.figures.ev, ac = %out.figures.ac, "card effect");
    out
}

/// Run a card's AC-conditional correction, if it has one and it fires.
pub fn apply_correction(
    card: CardId,
    ctx: &EffectContext<'_>,
    current: Figures,
) -> Option<(Figures, &'static str)> {
    let check = card.meta().correction?;
    let fired = check(ctx, current);
    if fired.is_some() {
        debug!(%card, ac = %current.ac, "conditional correction fired");
    }
    fired
}

/// Seeded source of random event cards.
///
/// Draws uniformly over the named cards; `None` is never drawn. The same
/// seed replays the same sequence.
#[derive(Clone, Debug)]
pub struct CardDeck {
    rng: ChaCha8Rng,
}

impl CardDeck {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn draw(&mut self) -> CardId {
        let i = self.rng.gen_range(1..CardId::ALL.len());
        CardId::ALL[i]
    }
}
