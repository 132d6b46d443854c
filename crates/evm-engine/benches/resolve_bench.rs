use criterion::{black_box, criterion_group, criterion_main, Criterion};
use evm_cards::{CardDeck, PlayerOptions};
use evm_engine::Engine;
use evm_core::ScheduleConfig;
use rust_decimal::Decimal;

fn play_game(seed: u64) -> Engine {
    let mut engine = Engine::new(ScheduleConfig::default()).unwrap();
    let mut deck = CardDeck::new(seed);
    while let Some(week) = engine.current_week() {
        let plan = Some(Decimal::new(100_000, 0));
        engine.set_planned_values(week, plan, plan).unwrap();
        engine.select(deck.draw(), PlayerOptions::default());
        engine.resolve_current_week().unwrap();
    }
    engine
}

fn bench_full_game(c: &mut Criterion) {
    c.bench_function("resolve 10 weeks", |b| {
        b.iter(|| {
            let engine = play_game(black_box(42));
            black_box(engine.metrics())
        })
    });
}

criterion_group!(benches, bench_full_game);
criterion_main!(benches);
