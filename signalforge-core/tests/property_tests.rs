//! Property tests for indicator and trailing-stop invariants.
//!
//! Uses proptest to verify:
//! 1. RSI stays within [0, 100]
//! 2. No indicator is defined before its lookback
//! 3. No look-ahead: truncating the series never changes earlier values
//! 4. The stop of an open trade only ever tightens

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use signalforge_core::components::{Indicator, ScoringEngine, Skip};
use signalforge_core::domain::{Bar, Direction, Signal, SignalContext, Trade, TradeId};
use signalforge_core::indicators::{IndicatorSet, Rsi};
use signalforge_core::params::ParameterSet;
use signalforge_core::position_management::{advance_trade, IntrabarPolicy, TrailingRule};
use signalforge_core::sizers::RiskModel;

// ── Strategies ───────────────────────────────────────────────────────

/// Random walk of hourly bars built from per-bar returns and wick sizes.
fn bars_from(steps: &[(f64, f64, f64)]) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut close = 100.0;
    steps
        .iter()
        .enumerate()
        .map(|(i, &(ret, up, down))| {
            let open = close;
            close = (close * (1.0 + ret)).max(1.0);
            let high = open.max(close) + up;
            let low = (open.min(close) - down).max(0.5);
            Bar::new(start + Duration::hours(i as i64), open, high, low, close)
        })
        .collect()
}

fn arb_steps(min: usize, max: usize) -> impl Strategy<Value = Vec<(f64, f64, f64)>> {
    prop::collection::vec((-0.02..0.02_f64, 0.0..1.0_f64, 0.0..1.0_f64), min..max)
}

// ── 1. RSI bounds ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn rsi_is_bounded(steps in arb_steps(20, 200)) {
        let bars = bars_from(&steps);
        for value in Rsi::new(14).compute(&bars).into_iter().flatten() {
            prop_assert!((0.0..=100.0).contains(&value), "rsi {value}");
        }
    }
}

// ── 2. Warm-up ───────────────────────────────────────────────────────

fn standard_indicators() -> Vec<Box<dyn Indicator>> {
    use signalforge_core::indicators::{
        Adx, Atr, BollingerPosition, Ema, MacdHistogram, Stochastic,
    };
    vec![
        Box::new(Ema::new(20)),
        Box::new(Ema::new(50)),
        Box::new(Rsi::new(14)),
        Box::new(Atr::new(14)),
        Box::new(Adx::new(14)),
        Box::new(MacdHistogram::new(12, 26, 9)),
        Box::new(BollingerPosition::new(20, 2.0)),
        Box::new(Stochastic::k(14, 3, 3)),
        Box::new(Stochastic::d(14, 3, 3)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Undefined strictly before `lookback`, defined from it onward.
    #[test]
    fn defined_exactly_from_lookback(steps in arb_steps(1, 80)) {
        let bars = bars_from(&steps);
        for indicator in standard_indicators() {
            let series = indicator.compute(&bars);
            prop_assert_eq!(series.len(), bars.len());
            for (i, value) in series.iter().enumerate() {
                prop_assert_eq!(
                    value.is_some(),
                    i >= indicator.lookback(),
                    "{} at {}", indicator.name(), i
                );
            }
        }
    }
}

// ── 3. No look-ahead ─────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn truncation_leaves_history_unchanged(
        steps in arb_steps(40, 120),
        cut in 0.2..0.9_f64,
    ) {
        let bars = bars_from(&steps);
        let keep = ((bars.len() as f64) * cut) as usize;
        for indicator in standard_indicators() {
            let full = indicator.compute(&bars);
            let head = indicator.compute(&bars[..keep]);
            prop_assert_eq!(&full[..keep], &head[..], "{}", indicator.name());
        }
    }
}

#[test]
fn scoring_before_warmup_is_always_skipped() {
    let steps: Vec<(f64, f64, f64)> = (0..260)
        .map(|i| ((i as f64 * 0.3).sin() * 0.01, 0.4, 0.4))
        .collect();
    let bars = bars_from(&steps);
    let set = IndicatorSet::standard();
    let values = set.compute(&bars);
    let engine = ScoringEngine::new("TEST", ParameterSet::default(), RiskModel::default());

    assert_eq!(set.warmup(), 199);
    assert_eq!(engine.assess(&bars, 0, &values), Err(Skip::NoHistory));
    for i in 1..set.warmup() {
        assert_eq!(engine.assess(&bars, i, &values), Err(Skip::WarmingUp), "bar {i}");
    }
    for i in set.warmup()..bars.len() {
        assert!(!matches!(engine.assess(&bars, i, &values), Err(Skip::WarmingUp)));
    }
}

// ── 4. Stop ratchet ──────────────────────────────────────────────────

fn open_trade(direction: Direction, entry: f64) -> Trade {
    let risk = RiskModel::default();
    let plan = risk.plan(direction, entry, 1.0).unwrap();
    let signal = Signal {
        symbol: "TEST".into(),
        direction,
        bar_index: 0,
        timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        entry: plan.entry,
        stop: plan.stop,
        target: plan.target,
        entry_min: plan.entry_min,
        entry_max: plan.entry_max,
        size: plan.size,
        score: 5.0,
        context: SignalContext {
            rsi: 40.0,
            adx: 30.0,
            atr: 1.0,
            ema_200: entry,
        },
    };
    Trade::open(TradeId::new("TEST#0"), &signal)
}

proptest! {
    #[test]
    fn stop_never_loosens(
        long in any::<bool>(),
        steps in arb_steps(1, 60),
        target_first in any::<bool>(),
    ) {
        let direction = if long { Direction::Long } else { Direction::Short };
        let bars = bars_from(&steps);
        let policy = if target_first { IntrabarPolicy::TargetFirst } else { IntrabarPolicy::StopFirst };
        let rule = TrailingRule::default();

        let mut trade = open_trade(direction, bars[0].open);
        let initial = trade.current_stop;
        for (i, bar) in bars.iter().enumerate() {
            let before = trade.current_stop;
            let phase_before = trade.phase;
            let update = advance_trade(&trade, bar, i + 1, &rule, policy);
            trade = update.trade;
            prop_assert!(!direction.is_tighter(before, trade.current_stop));
            prop_assert!(!direction.is_tighter(initial, trade.current_stop));
            prop_assert!(trade.phase >= phase_before);
            if !trade.is_open() {
                break;
            }
        }
    }
}
