//! Signal pipeline: one polling pass for one symbol, without the loop.
//!
//! Order of gates: market hours → per-symbol cooldown → scoring and the
//! external veto (in the configured `VetoOrdering`) → trade monitor →
//! alert sink. The fetch adapter, the veto service and the messaging
//! transport live behind traits; this module owns only the decision flow.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::components::{IndicatorValues, MarketHours, MarketStatus, ScoreCard, ScoringEngine, Skip};
use crate::domain::{Bar, Direction, ExitReason, Instrument, Signal, TradeId, TradeStatus};
use crate::engine::{MonitorError, TradeMonitor, TradeStore};
use crate::params::ParameterSet;
use crate::position_management::TradeEvent;
use crate::sizers::RiskModel;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("veto service failed: {0}")]
    Veto(String),

    #[error("alert dispatch failed: {0}")]
    Alert(String),

    #[error(transparent)]
    Monitor(#[from] MonitorError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VetoVerdict {
    Approve,
    Reject { reason: String },
}

/// External second opinion on a candidate signal (news/sentiment check).
pub trait SignalVeto: Send + Sync {
    fn name(&self) -> &str;

    fn review(&self, signal: &Signal) -> Result<VetoVerdict, PipelineError>;
}

/// Outbound notification channel.
pub trait AlertSink: Send + Sync {
    fn send(&self, alert: &Alert) -> Result<(), PipelineError>;
}

/// Where the veto sits relative to the minimum-score threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VetoOrdering {
    /// Veto only sees signals that already cleared `min_score`.
    #[default]
    AfterThreshold,
    /// Veto sees the leading-side candidate; `min_score` is applied after.
    BeforeThreshold,
}

/// Largest cooldown `chrono` can represent as a millisecond duration.
pub const MAX_COOLDOWN_MINUTES: i64 = i64::MAX / 60_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub cooldown_minutes: i64,
    pub veto_ordering: VetoOrdering,
    pub market_hours: MarketHours,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cooldown_minutes: 60,
            veto_ordering: VetoOrdering::AfterThreshold,
            market_hours: MarketHours::ForexWeek,
        }
    }
}

/// Message handed to the `AlertSink`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alert {
    NewSignal {
        signal: Signal,
        instrument: Instrument,
        lots: f64,
        trade_id: TradeId,
    },
    StopMoved {
        trade_id: TradeId,
        old_stop: f64,
        new_stop: f64,
    },
    TradeClosed {
        trade_id: TradeId,
        reason: ExitReason,
        exit_price: f64,
        status: TradeStatus,
        pnl: f64,
    },
}

impl Alert {
    /// Alert for a monitor event; phase changes without a stop move are silent.
    pub fn from_event(event: &TradeEvent) -> Option<Alert> {
        match event {
            TradeEvent::StopMoved {
                id,
                old_stop,
                new_stop,
                ..
            } => Some(Alert::StopMoved {
                trade_id: id.clone(),
                old_stop: *old_stop,
                new_stop: *new_stop,
            }),
            TradeEvent::Closed {
                id,
                reason,
                exit_price,
                status,
                pnl,
                ..
            } => Some(Alert::TradeClosed {
                trade_id: id.clone(),
                reason: *reason,
                exit_price: *exit_price,
                status: *status,
                pnl: *pnl,
            }),
            TradeEvent::PhaseChanged { .. } => None,
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alert::NewSignal {
                signal,
                instrument,
                lots,
                ..
            } => {
                let risk = signal.risk_distance() * signal.size;
                let reward = signal.reward_distance() * signal.size;
                writeln!(f, "{} {}", signal.direction.label(), instrument.name)?;
                writeln!(
                    f,
                    "Entry: {:.5} (zone {:.5} - {:.5})",
                    signal.entry, signal.entry_min, signal.entry_max
                )?;
                writeln!(f, "SL: {:.5}", signal.stop)?;
                writeln!(f, "TP: {:.5}", signal.target)?;
                writeln!(f, "Lot: {lots:.2}")?;
                writeln!(f, "Risk: ${risk:.0} | Reward: ${reward:.0}")?;
                write!(
                    f,
                    "Score: {:.1} | ADX: {:.0} | RSI: {:.0}",
                    signal.score, signal.context.adx, signal.context.rsi
                )
            }
            Alert::StopMoved {
                trade_id,
                old_stop,
                new_stop,
            } => write!(
                f,
                "Stop moved on {trade_id}: {old_stop:.5} -> {new_stop:.5} (profit locked)"
            ),
            Alert::TradeClosed {
                trade_id,
                reason,
                exit_price,
                status,
                pnl,
            } => {
                let result = match status {
                    TradeStatus::ClosedWin => "WIN",
                    TradeStatus::ClosedLoss => "LOSS",
                    TradeStatus::ClosedBreakeven => "BREAKEVEN",
                    TradeStatus::Open => "OPEN",
                };
                write!(
                    f,
                    "Trade closed {trade_id}: {result} at {exit_price:.5} ({reason:?}), P/L ${pnl:+.2}"
                )
            }
        }
    }
}

/// Outcome of one `process` call.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    MarketClosed(MarketStatus),
    CoolingDown { remaining_minutes: i64 },
    Skipped(Skip),
    /// Scored, but neither side qualified.
    NoSignal(ScoreCard),
    Vetoed { signal: Signal, reason: String },
    /// The monitor would not record the trade.
    Refused { signal: Signal, error: String },
    Accepted {
        signal: Signal,
        trade_id: TradeId,
        /// Set when the alert could not be delivered; the trade stands.
        alert_error: Option<String>,
    },
}

impl Decision {
    pub fn accepted_signal(&self) -> Option<&Signal> {
        match self {
            Decision::Accepted { signal, .. } => Some(signal),
            _ => None,
        }
    }
}

pub struct SignalPipeline<S: TradeStore> {
    config: PipelineConfig,
    params: ParameterSet,
    risk: RiskModel,
    instruments: Vec<Instrument>,
    monitor: TradeMonitor<S>,
    veto: Option<Box<dyn SignalVeto>>,
    sink: Box<dyn AlertSink>,
    last_alert: HashMap<String, DateTime<Utc>>,
}

impl<S: TradeStore> SignalPipeline<S> {
    pub fn new(
        config: PipelineConfig,
        params: ParameterSet,
        risk: RiskModel,
        monitor: TradeMonitor<S>,
        sink: Box<dyn AlertSink>,
    ) -> Self {
        Self {
            config,
            params,
            risk,
            instruments: Instrument::defaults(),
            monitor,
            veto: None,
            sink,
            last_alert: HashMap::new(),
        }
    }

    pub fn with_veto(mut self, veto: Box<dyn SignalVeto>) -> Self {
        self.veto = Some(veto);
        self
    }

    pub fn with_instruments(mut self, instruments: Vec<Instrument>) -> Self {
        self.instruments = instruments;
        self
    }

    pub fn monitor(&self) -> &TradeMonitor<S> {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut TradeMonitor<S> {
        &mut self.monitor
    }

    fn instrument(&self, symbol: &str) -> Instrument {
        self.instruments
            .iter()
            .find(|i| i.symbol == symbol)
            .cloned()
            .or_else(|| Instrument::lookup(symbol))
            .unwrap_or_else(|| Instrument::new(symbol, symbol, 1.0))
    }

    /// Run the veto; a failing veto counts as a rejection.
    fn veto_verdict(&self, signal: &Signal) -> VetoVerdict {
        let Some(veto) = &self.veto else {
            return VetoVerdict::Approve;
        };
        match veto.review(signal) {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(veto = veto.name(), symbol = %signal.symbol, error = %e, "veto failed, rejecting signal");
                VetoVerdict::Reject {
                    reason: format!("veto unavailable: {e}"),
                }
            }
        }
    }

    /// Evaluate the latest bar of `bars` for `symbol` and act on the result.
    pub fn process(
        &mut self,
        symbol: &str,
        bars: &[Bar],
        indicators: &IndicatorValues,
        now: DateTime<Utc>,
    ) -> Decision {
        let status = self.config.market_hours.status(now);
        if !status.is_open() {
            debug!(symbol, %status, "market closed");
            return Decision::MarketClosed(status);
        }

        if let Some(last) = self.last_alert.get(symbol) {
            let elapsed = now.signed_duration_since(*last);
            let minutes = self.config.cooldown_minutes.clamp(0, MAX_COOLDOWN_MINUTES);
            let cooldown = Duration::try_minutes(minutes).unwrap_or(Duration::MAX);
            if elapsed < cooldown {
                let remaining_minutes = cooldown
                    .checked_sub(&elapsed)
                    .map_or(minutes, |left| left.num_minutes());
                debug!(symbol, remaining_minutes, "cooling down");
                return Decision::CoolingDown { remaining_minutes };
            }
        }

        let Some(index) = bars.len().checked_sub(1) else {
            return Decision::Skipped(Skip::NoHistory);
        };
        let engine = ScoringEngine::new(symbol, self.params.clone(), self.risk.clone());
        let card = match engine.assess(bars, index, indicators) {
            Ok(card) => card,
            Err(skip) => {
                debug!(symbol, ?skip, "bar not scored");
                return Decision::Skipped(skip);
            }
        };

        let direction = match self.config.veto_ordering {
            VetoOrdering::AfterThreshold => card.decision(&self.params),
            VetoOrdering::BeforeThreshold => card.leading_side(&self.params),
        };
        let Some(direction) = direction else {
            return Decision::NoSignal(card);
        };
        let Some(signal) = engine.signal_for(&card, direction, bars) else {
            return Decision::NoSignal(card);
        };

        if let VetoVerdict::Reject { reason } = self.veto_verdict(&signal) {
            info!(symbol, %direction, reason = %reason, "signal vetoed");
            return Decision::Vetoed { signal, reason };
        }

        if !card.meets_min_score(direction, &self.params) {
            return Decision::NoSignal(card);
        }

        self.dispatch(signal, direction, now)
    }

    fn dispatch(&mut self, signal: Signal, direction: Direction, now: DateTime<Utc>) -> Decision {
        let trade_id = match self.monitor.open_trade(&signal, now) {
            Ok(id) => id,
            Err(e) => {
                warn!(symbol = %signal.symbol, error = %e, "trade not recorded");
                return Decision::Refused {
                    signal,
                    error: e.to_string(),
                };
            }
        };
        self.last_alert.insert(signal.symbol.clone(), now);

        let instrument = self.instrument(&signal.symbol);
        let alert = Alert::NewSignal {
            lots: instrument.lots(signal.size),
            instrument,
            signal: signal.clone(),
            trade_id: trade_id.clone(),
        };
        let alert_error = match self.sink.send(&alert) {
            Ok(()) => None,
            Err(e) => {
                warn!(trade = %trade_id, error = %e, "alert not delivered");
                Some(e.to_string())
            }
        };
        info!(trade = %trade_id, %direction, score = signal.score, "signal dispatched");
        Decision::Accepted {
            signal,
            trade_id,
            alert_error,
        }
    }

    /// Feed the latest bar to the monitor and forward its events as alerts.
    pub fn track(&mut self, symbol: &str, bar: &Bar, bar_index: usize) -> Vec<TradeEvent> {
        let events = self.monitor.on_bar(symbol, bar, bar_index);
        for alert in events.iter().filter_map(Alert::from_event) {
            if let Err(e) = self.sink.send(&alert) {
                warn!(symbol, error = %e, "event alert not delivered");
            }
        }
        events
    }
}
