//! End-to-end scoring scenarios over hand-built indicator series.

use chrono::{Duration, TimeZone, Utc};
use signalforge_core::components::{IndicatorValues, ScoringEngine, Skip};
use signalforge_core::domain::{Bar, Direction};
use signalforge_core::indicators::names;
use signalforge_core::params::{ParameterSet, ParameterSpec};
use signalforge_core::sizers::RiskModel;

const BARS: usize = 12;
const RECOVERY_BAR: usize = 8;

/// Hourly bars starting 17:00 UTC so that the recovery bar lands at 01:00.
fn rising_bars() -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 17, 0, 0).unwrap();
    (0..BARS)
        .map(|i| {
            let close = 99.0 + 0.5 * i as f64;
            let open = close - 0.5;
            Bar::new(start + Duration::hours(i as i64), open, close + 0.2, open - 0.2, close)
        })
        .collect()
}

/// Price crosses a flat EMA200 at 100 from below; RSI dips under 30 and
/// recovers at bar 8 while Bollinger position turns up from the low zone.
fn scenario_indicators() -> IndicatorValues {
    let constant = |v: f64| vec![Some(v); BARS];
    let rsi = [48.0, 45.0, 42.0, 38.0, 34.0, 29.0, 27.0, 26.0, 32.0, 36.0, 40.0, 45.0];
    let mut bb = vec![Some(0.5); BARS];
    bb[RECOVERY_BAR - 1] = Some(0.2);
    bb[RECOVERY_BAR] = Some(0.25);

    let mut iv = IndicatorValues::new();
    iv.insert(names::EMA_FAST, constant(101.0));
    iv.insert(names::EMA_MID, constant(100.5));
    iv.insert(names::EMA_SLOW, constant(100.0));
    iv.insert(names::RSI, rsi.iter().copied().map(Some).collect());
    iv.insert(names::ATR, constant(0.5));
    iv.insert(names::ADX, constant(28.0));
    iv.insert(
        names::MACD_HIST,
        (0..BARS).map(|i| Some(0.01 * (i + 1) as f64)).collect(),
    );
    iv.insert(names::BB_POSITION, bb);
    iv.insert(names::STOCH_K, constant(50.0));
    iv.insert(names::STOCH_D, constant(50.0));
    iv
}

fn engine(params: ParameterSet) -> ScoringEngine {
    let risk = RiskModel::new(50.0, 0.0, &params).unwrap();
    ScoringEngine::new("EURUSD=X", params, risk)
}

#[test]
fn rsi_recovery_in_uptrend_emits_exactly_one_long() {
    let bars = rising_bars();
    let iv = scenario_indicators();
    let params = ParameterSet::default();
    let engine = engine(params.clone());

    let signals: Vec<_> = (0..BARS)
        .filter_map(|i| engine.evaluate(&bars, i, &iv))
        .collect();

    assert_eq!(signals.len(), 1, "signals: {signals:?}");
    let signal = &signals[0];
    assert_eq!(signal.bar_index, RECOVERY_BAR);
    assert_eq!(signal.direction, Direction::Long);
    assert!(signal.score >= params.min_score());
    assert!((signal.score - 5.5).abs() < 1e-9);
    assert!((signal.entry - 103.0).abs() < 1e-9);
    assert!((signal.stop - 102.0).abs() < 1e-9);
    assert!((signal.target - 105.5).abs() < 1e-9);
}

#[test]
fn bars_after_recovery_fall_short_of_min_score() {
    let bars = rising_bars();
    let iv = scenario_indicators();
    let engine = engine(ParameterSet::default());

    for i in RECOVERY_BAR + 1..BARS {
        let card = engine.assess(&bars, i, &iv).unwrap();
        assert!((card.buy - 4.5).abs() < 1e-9, "bar {i}: {}", card.buy);
        assert_eq!(card.sell, 0.0);
    }
}

#[test]
fn blocked_hour_never_signals() {
    let bars = rising_bars();
    assert_eq!(bars[RECOVERY_BAR].utc_hour(), 1);
    let iv = scenario_indicators();
    let params = ParameterSet::try_from(ParameterSpec {
        blocked_hours: vec![1],
        ..Default::default()
    })
    .unwrap();
    let engine = engine(params);

    assert_eq!(
        engine.assess(&bars, RECOVERY_BAR, &iv),
        Err(Skip::BlockedHour(1))
    );
    assert!((0..BARS).all(|i| engine.evaluate(&bars, i, &iv).is_none()));
}

#[test]
fn weak_adx_blocks_the_same_setup() {
    let bars = rising_bars();
    let mut iv = scenario_indicators();
    iv.insert(names::ADX, vec![Some(20.0); BARS]);
    let engine = engine(ParameterSet::default());

    assert_eq!(
        engine.assess(&bars, RECOVERY_BAR, &iv),
        Err(Skip::WeakTrend { adx: 20.0 })
    );
}

#[test]
fn trend_filter_rejects_longs_below_the_major_trend() {
    let bars = rising_bars();
    let mut iv = scenario_indicators();
    // EMA50 under EMA200: partial and full alignment both vanish, and the
    // trend reads down.
    iv.insert(names::EMA_MID, vec![Some(99.5); BARS]);
    let params = ParameterSet::try_from(ParameterSpec {
        trend_filter: true,
        min_score: 3.0,
        ..Default::default()
    })
    .unwrap();
    let engine = engine(params.clone());

    let card = engine.assess(&bars, RECOVERY_BAR, &iv).unwrap();
    assert!((card.buy - 3.5).abs() < 1e-9);
    assert_eq!(card.leading_side(&params), None);
    assert!(engine.evaluate(&bars, RECOVERY_BAR, &iv).is_none());
}
