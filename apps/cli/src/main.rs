#![deny(warnings)]

//! Headless earned value game: plays a scenario week by week and prints
//! the tracker table.

mod scenario;

use anyhow::Result;
use evm_cards::{CardDeck, CardId};
use evm_core::{format_index, format_money, ScheduleConfig};
use evm_engine::{Engine, ResolutionOutcome};
use rust_decimal::Decimal;
use scenario::{AmountInput, Scenario};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    scenario: Option<PathBuf>,
    seed: Option<u64>,
    weeks: Option<usize>,
    json: bool,
    version: bool,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--scenario" => args.scenario = it.next().map(PathBuf::from),
            "--seed" => args.seed = it.next().and_then(|s| s.parse().ok()),
            "--weeks" => args.weeks = it.next().and_then(|s| s.parse().ok()),
            "--json" => args.json = true,
            "--version" => args.version = true,
            _ => {}
        }
    }
    args
}

fn amount(input: &Option<AmountInput>) -> Option<Decimal> {
    input.as_ref().and_then(AmountInput::amount)
}

fn starting_schedule(scenario: &Scenario, weeks: Option<usize>) -> ScheduleConfig {
    let defaults = ScheduleConfig::default();
    ScheduleConfig {
        pv_per_week: amount(&scenario.schedule.pv_per_week).unwrap_or(defaults.pv_per_week),
        bac: amount(&scenario.schedule.bac).unwrap_or(defaults.bac),
        week_count: weeks
            .or(scenario.schedule.week_count)
            .unwrap_or(defaults.week_count),
    }
}

/// Play every week: scripted weeks use their plan and card, the rest plan
/// PV/week for both EV and AC and draw a card.
fn play(scenario: &Scenario, schedule: ScheduleConfig, seed: u64) -> Result<(Engine, Vec<CardId>)> {
    let mut engine = Engine::new(schedule)?;
    let mut deck = CardDeck::new(seed);
    let mut played = Vec::new();
    while let Some(week) = engine.current_week() {
        let script = scenario.weeks.get(week).cloned().unwrap_or_default();
        if let Some(edit) = &script.set_schedule {
            engine.set_schedule(amount(&edit.pv_per_week), amount(&edit.bac))?;
        }
        if let Some(note) = &script.note {
            engine.annotate_week(week, note)?;
        }
        let default_plan = Some(engine.schedule().pv_per_week);
        let plan_ev = if script.plan_ev.is_some() {
            amount(&script.plan_ev)
        } else {
            default_plan
        };
        let plan_ac = if script.plan_ac.is_some() {
            amount(&script.plan_ac)
        } else {
            default_plan
        };
        engine.set_planned_values(week, plan_ev, plan_ac)?;
        let card = script.card.unwrap_or_else(|| deck.draw());
        engine.select(card, script.options.clone());
        if let Some(outcome) = engine.resolve_current_week()? {
            report(&outcome);
            played.push(outcome.card);
        }
    }
    Ok((engine, played))
}

fn report(outcome: &ResolutionOutcome) {
    info!(
        week = outcome.week + 1,
        card = %outcome.card,
        ev = %outcome.applied_ev,
        ac = %outcome.applied_ac,
        "resolved"
    );
}

fn money_cell(v: Option<Decimal>) -> String {
    v.map(format_money).unwrap_or_default()
}

fn print_table(engine: &Engine, cards: &[CardId]) {
    let m = engine.metrics();
    println!(
        "{:>4}  {:<24} {:>10} {:>10} {:>11} {:>10} {:>11} {:>10} {:>11} {:>10} {:>10} {:>5} {:>5}",
        "Week", "Card", "Plan EV", "Plan AC", "PV cum", "EV wk", "EV cum", "AC wk", "AC cum",
        "CV", "SV", "CPI", "SPI"
    );
    for (row, cum) in m.per_week.iter().zip(&m.cumulative) {
        let card = cards
            .get(row.week - 1)
            .map(|c| c.as_str())
            .unwrap_or("");
        println!(
            "{:>4}  {:<24} {:>10} {:>10} {:>11} {:>10} {:>11} {:>10} {:>11} {:>10} {:>10} {:>5} {:>5}",
            row.week,
            card,
            money_cell(row.planned_ev),
            money_cell(row.planned_ac),
            format_money(cum.pv),
            money_cell(row.applied_ev),
            format_money(cum.ev),
            money_cell(row.applied_ac),
            format_money(cum.ac),
            format_money(cum.cv),
            format_money(cum.sv),
            format_index(cum.cpi),
            format_index(cum.spi),
        );
    }
    println!();
    for row in &m.per_week {
        if !row.note.is_empty() {
            println!("Week {}: {}", row.week, row.note);
        }
    }
    println!();
    let pct = m
        .percent_complete()
        .map(|p| format!("{:.1}%", p * Decimal::from(100)))
        .unwrap_or_default();
    println!(
        "BAC ${} | PV/week ${} | complete {} | CPI {} | SPI {}",
        format_money(m.bac),
        format_money(engine.schedule().pv_per_week),
        pct,
        format_index(m.latest().and_then(|r| r.cpi)),
        format_index(m.latest().and_then(|r| r.spi)),
    );
}

/// `RUST_LOG` directives when they parse, `info` otherwise.
fn log_filter(directives: Option<String>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok()))
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args();
    if args.version {
        println!("evm-cli {} ({})", env!("CARGO_PKG_VERSION"), env!("EVM_BUILD_REV"));
        return Ok(());
    }
    info!(scenario = ?args.scenario, seed = ?args.seed, weeks = ?args.weeks, "starting CLI");

    let scenario = match &args.scenario {
        Some(path) => scenario::load(path)?,
        None => Scenario::default(),
    };
    let schedule = starting_schedule(&scenario, args.weeks);
    let (engine, cards) = play(&scenario, schedule, args.seed.unwrap_or(42))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&engine.metrics())?);
        return Ok(());
    }
    print_table(&engine, &cards);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    #[test]
    fn log_filter_defaults_to_info() {
        assert_eq!(log_filter(None).to_string(), "info");
        assert_eq!(log_filter(Some("warn".into())).to_string(), "warn");
        assert_eq!(
            log_filter(Some("evm_engine=debug".into())).to_string(),
            "evm_engine=debug"
        );
    }

    #[test]
    fn empty_scenario_plays_default_schedule() {
        let scenario = Scenario::default();
        let schedule = starting_schedule(&scenario, Some(3));
        assert_eq!(schedule.week_count, 3);
        let (engine, cards) = play(&scenario, schedule, 7).unwrap();
        assert!(engine.is_finished());
        assert_eq!(cards.len(), 3);
        assert!(cards.iter().all(|c| *c != CardId::None));
        assert_eq!(engine.ledger().week(0).unwrap().planned_ev(), Some(d(100_000)));
    }

    #[test]
    fn same_seed_same_game() {
        let scenario = Scenario::default();
        let (a, _) = play(&scenario, starting_schedule(&scenario, None), 9).unwrap();
        let (b, _) = play(&scenario, starting_schedule(&scenario, None), 9).unwrap();
        assert_eq!(a.metrics(), b.metrics());
    }

    #[test]
    fn bundled_scenario_opening_weeks() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../assets/scenarios/classroom.yaml");
        let scenario = scenario::load(&path).unwrap();
        let (engine, cards) = play(&scenario, starting_schedule(&scenario, None), 42).unwrap();
        assert_eq!(&cards[..3], &[CardId::None, CardId::EngagementBoost, CardId::SupplyDiscount]);
        let weeks = engine.ledger().weeks();
        assert_eq!(weeks[0].applied_ev(), Some(d(90_000)));
        assert_eq!(weeks[0].note(), "kickoff | Normal week.");
        assert_eq!(weeks[1].applied_ac(), Some(d(95_000)));
        assert_eq!(weeks[2].applied_ev(), Some(d(120_000)));
        assert_eq!(weeks[2].applied_ac(), Some(d(125_000)));
        assert_eq!(weeks[3].applied_ac(), Some(d(100_000)));
        assert_eq!(weeks[4].applied_ev(), Some(d(40_000)));
        assert_eq!(engine.schedule().bac, d(1_100_000));
    }
}
