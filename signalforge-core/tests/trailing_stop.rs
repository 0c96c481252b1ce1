//! Trailing-stop lifecycle through the trade monitor.

use chrono::{DateTime, Duration, TimeZone, Utc};
use signalforge_core::domain::{
    Bar, Direction, ExitReason, Signal, SignalContext, TradeStatus, TrailingPhase,
};
use signalforge_core::engine::{JsonFileStore, MemoryStore, TradeMonitor, TradeStore};
use signalforge_core::params::ParameterSet;
use signalforge_core::position_management::{IntrabarPolicy, TradeEvent, TrailingRule};
use signalforge_core::sizers::RiskModel;

const EPS: f64 = 1e-9;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap()
}

fn bar(hour: i64, high: f64, low: f64) -> Bar {
    let open = (high + low) / 2.0;
    Bar::new(t0() + Duration::hours(hour), open, high, low, open)
}

/// 50-pip stop from ATR 0.0025 x 2, reward ratio 2.5.
fn eurusd_signal(direction: Direction) -> Signal {
    let risk = RiskModel::new(50.0, 0.0, &ParameterSet::default()).unwrap();
    let plan = risk.plan(direction, 1.1000, 0.0025).unwrap();
    Signal {
        symbol: "EURUSD=X".into(),
        direction,
        bar_index: 0,
        timestamp: t0(),
        entry: plan.entry,
        stop: plan.stop,
        target: plan.target,
        entry_min: plan.entry_min,
        entry_max: plan.entry_max,
        size: plan.size,
        score: 5.5,
        context: SignalContext {
            rsi: 32.0,
            adx: 28.0,
            atr: 0.0025,
            ema_200: 1.0950,
        },
    }
}

fn monitor<S: TradeStore>(store: S) -> TradeMonitor<S> {
    TradeMonitor::load(store, TrailingRule::default(), IntrabarPolicy::StopFirst).unwrap()
}

#[test]
fn breakeven_lock_at_one_and_a_half_r() {
    let signal = eurusd_signal(Direction::Long);
    assert!((signal.stop - 1.0950).abs() < EPS);
    assert!((signal.target - 1.1125).abs() < EPS);

    let mut m = monitor(MemoryStore::new());
    let id = m.open_trade(&signal, t0()).unwrap();

    // 1R: armed, stop untouched
    let events = m.on_bar("EURUSD=X", &bar(1, 1.1050, 1.0990), 1);
    assert!(events
        .iter()
        .all(|e| !matches!(e, TradeEvent::StopMoved { .. })));
    let trade = m.get(&id).unwrap();
    assert_eq!(trade.phase, TrailingPhase::Armed);
    assert!((trade.current_stop - 1.0950).abs() < EPS);

    // 1.5R: stop locked at entry + 0.2R
    let events = m.on_bar("EURUSD=X", &bar(2, 1.1075, 1.1040), 2);
    assert!(events
        .iter()
        .any(|e| matches!(e, TradeEvent::StopMoved { .. })));
    let trade = m.get(&id).unwrap();
    assert_eq!(trade.phase, TrailingPhase::LockedBreakeven);
    assert!((trade.current_stop - 1.1010).abs() < EPS);

    // pullbacks and new highs below target never move it back
    for (i, (high, low)) in [(1.1040, 1.1015), (1.1090, 1.1030), (1.1060, 1.1012)]
        .into_iter()
        .enumerate()
    {
        let index = 3 + i;
        m.on_bar("EURUSD=X", &bar(index as i64, high, low), index);
        let trade = m.get(&id).unwrap();
        assert!((trade.current_stop - 1.1010).abs() < EPS);
    }

    // pullback through the locked stop closes a small winner
    let events = m.on_bar("EURUSD=X", &bar(6, 1.1030, 1.1000), 6);
    assert!(matches!(
        events.last(),
        Some(TradeEvent::Closed {
            reason: ExitReason::StopHit,
            status: TradeStatus::ClosedWin,
            ..
        })
    ));
    assert!(!m.has_open("EURUSD=X"));
    let closed = &m.history()[0];
    assert!((closed.exit_price.unwrap() - 1.1010).abs() < EPS);
    assert!((closed.realized_pnl - 10.0).abs() < 1e-6);

    let stats = m.stats();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.activations, 1);
    assert_eq!(stats.saved, 1);
}

#[test]
fn short_trade_locks_below_entry() {
    let signal = eurusd_signal(Direction::Short);
    assert!((signal.stop - 1.1050).abs() < EPS);
    assert!((signal.target - 1.0875).abs() < EPS);

    let mut m = monitor(MemoryStore::new());
    let id = m.open_trade(&signal, t0()).unwrap();
    m.on_bar("EURUSD=X", &bar(1, 1.0990, 1.0925), 1);

    let trade = m.get(&id).unwrap();
    assert_eq!(trade.phase, TrailingPhase::LockedBreakeven);
    assert!((trade.current_stop - 1.0990).abs() < EPS);
}

#[test]
fn untouched_stop_loses_full_risk() {
    let signal = eurusd_signal(Direction::Long);
    let mut m = monitor(MemoryStore::new());
    m.open_trade(&signal, t0()).unwrap();

    m.on_bar("EURUSD=X", &bar(1, 1.1010, 1.0940), 1);
    let closed = &m.history()[0];
    assert_eq!(closed.status, TradeStatus::ClosedLoss);
    assert!((closed.realized_pnl + 50.0).abs() < 1e-6);
    assert!((closed.r_multiple() + 1.0).abs() < 1e-6);
}

#[test]
fn target_hit_is_a_full_win() {
    let signal = eurusd_signal(Direction::Long);
    let mut m = monitor(MemoryStore::new());
    m.open_trade(&signal, t0()).unwrap();

    m.on_bar("EURUSD=X", &bar(1, 1.1130, 1.0990), 1);
    let closed = &m.history()[0];
    assert_eq!(closed.exit_reason, Some(ExitReason::TargetHit));
    assert!((closed.realized_pnl - 125.0).abs() < 1e-6);
}

#[test]
fn locked_stop_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trades.json");
    let signal = eurusd_signal(Direction::Long);

    let id = {
        let mut m = monitor(JsonFileStore::new(&path));
        let id = m.open_trade(&signal, t0()).unwrap();
        m.on_bar("EURUSD=X", &bar(1, 1.1080, 1.1020), 1);
        id
    };

    let mut reloaded = monitor(JsonFileStore::new(&path));
    let trade = reloaded.get(&id).unwrap();
    assert_eq!(trade.phase, TrailingPhase::LockedBreakeven);
    assert!((trade.current_stop - 1.1010).abs() < EPS);
    assert_eq!(trade.stop_adjustments.len(), 1);

    reloaded.on_bar("EURUSD=X", &bar(2, 1.1030, 1.1005), 2);
    assert!(!reloaded.has_open("EURUSD=X"));

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(raw["open"].as_object().unwrap().is_empty());
    assert_eq!(raw["history"].as_array().unwrap().len(), 1);
}
