//! Scoring engine: weighted confluence scores for each side and the
//! accept/reject decision.
//!
//! Buy and sell scores are computed independently from the same indicator
//! snapshot. Weights:
//!
//! | rule | weight |
//! |---|---|
//! | full EMA alignment (close > EMA20 > EMA50 > EMA200) | 2.0 |
//! | partial alignment (EMA50 > EMA200, close > EMA200) | 1.0 |
//! | RSI between oversold and 50, rising | 1.5 |
//! | RSI below oversold, rising | 1.0 |
//! | MACD histogram positive | 0.5 |
//! | ... plus fresh zero cross / still rising | 1.0 / 0.5 |
//! | Stochastic %K crosses %D below 30 / below 50 | 1.5 / 0.5 |
//! | Bollinger position below 0.3 and rising | 1.0 |
//! | ADX above 30, side of the major trend | 0.5 |
//!
//! Sell rules are the mirror image (overbought, 70, 0.7, falling).
//!
//! The engine is portfolio-agnostic: it reads bars and indicator values,
//! never open-trade state.

use crate::components::indicator::IndicatorValues;
use crate::domain::{Bar, Direction, Signal, SignalContext};
use crate::indicators::names;
use crate::params::ParameterSet;
use crate::sizers::RiskModel;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const ADX_STRONG_TREND: f64 = 30.0;
const RSI_MIDLINE: f64 = 50.0;
const STOCH_DEEP_BUY: f64 = 30.0;
const STOCH_DEEP_SELL: f64 = 70.0;
const STOCH_MIDLINE: f64 = 50.0;
const BB_LOW_ZONE: f64 = 0.3;
const BB_HIGH_ZONE: f64 = 0.7;

/// Major trend, from EMA50 vs EMA200.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
}

/// Why a bar produced no score at all.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Skip {
    /// Bar index is 0 or past the end of the series.
    NoHistory,
    BlockedHour(u32),
    /// A required indicator is undefined at this bar or the one before.
    WarmingUp,
    WeakTrend { adx: f64 },
}

/// Raw scores for one bar, before the minimum-score threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub bar_index: usize,
    pub close: f64,
    pub buy: f64,
    pub sell: f64,
    pub trend: Trend,
    pub rsi: f64,
    pub adx: f64,
    pub atr: f64,
    pub ema_200: f64,
}

impl ScoreCard {
    pub fn score_for(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Long => self.buy,
            Direction::Short => self.sell,
        }
    }

    /// The side that dominates the other by the configured margin and passes
    /// the RSI and trend guards. The minimum score is not applied.
    pub fn leading_side(&self, params: &ParameterSet) -> Option<Direction> {
        let margin = params.dominance_margin();
        let trend_ok = |want: Trend| !params.trend_filter() || self.trend == want;

        if self.buy > self.sell + margin && self.rsi < params.rsi_overbought() && trend_ok(Trend::Up)
        {
            Some(Direction::Long)
        } else if self.sell > self.buy + margin
            && self.rsi > params.rsi_oversold()
            && trend_ok(Trend::Down)
        {
            Some(Direction::Short)
        } else {
            None
        }
    }

    pub fn meets_min_score(&self, direction: Direction, params: &ParameterSet) -> bool {
        self.score_for(direction) >= params.min_score()
    }

    /// Full accept decision: leading side with a score at or above the minimum.
    pub fn decision(&self, params: &ParameterSet) -> Option<Direction> {
        self.leading_side(params)
            .filter(|&d| self.meets_min_score(d, params))
    }
}

/// Reads one bar's worth of indicators.
struct Snapshot {
    close: f64,
    ema_fast: f64,
    ema_mid: f64,
    ema_slow: f64,
    rsi: (f64, f64),
    atr: f64,
    adx: f64,
    macd: (f64, f64),
    bb: (f64, f64),
    stoch_k: (f64, f64),
    stoch_d: (f64, f64),
}

impl Snapshot {
    fn read(close: f64, index: usize, iv: &IndicatorValues) -> Option<Self> {
        Some(Self {
            close,
            ema_fast: iv.get(names::EMA_FAST, index)?,
            ema_mid: iv.get(names::EMA_MID, index)?,
            ema_slow: iv.get(names::EMA_SLOW, index)?,
            rsi: iv.pair(names::RSI, index)?,
            atr: iv.get(names::ATR, index)?,
            adx: iv.get(names::ADX, index)?,
            macd: iv.pair(names::MACD_HIST, index)?,
            bb: iv.pair(names::BB_POSITION, index)?,
            stoch_k: iv.pair(names::STOCH_K, index)?,
            stoch_d: iv.pair(names::STOCH_D, index)?,
        })
    }

    fn trend(&self) -> Trend {
        if self.ema_mid > self.ema_slow {
            Trend::Up
        } else {
            Trend::Down
        }
    }

    fn buy_score(&self, params: &ParameterSet) -> f64 {
        let mut score = 0.0;
        let (rsi, rsi_prev) = self.rsi;
        let (hist, hist_prev) = self.macd;
        let (k, k_prev) = self.stoch_k;
        let (d, d_prev) = self.stoch_d;
        let (bb, bb_prev) = self.bb;

        if self.close > self.ema_fast && self.ema_fast > self.ema_mid && self.ema_mid > self.ema_slow
        {
            score += 2.0;
        } else if self.ema_mid > self.ema_slow && self.close > self.ema_slow {
            score += 1.0;
        }

        if rsi > rsi_prev {
            if params.rsi_oversold() < rsi && rsi < RSI_MIDLINE {
                score += 1.5;
            } else if rsi < params.rsi_oversold() {
                score += 1.0;
            }
        }

        if hist > 0.0 {
            score += 0.5;
            if hist_prev <= 0.0 {
                score += 1.0;
            } else if hist > hist_prev {
                score += 0.5;
            }
        }

        if k > d && k_prev <= d_prev {
            if k < STOCH_DEEP_BUY {
                score += 1.5;
            } else if k < STOCH_MIDLINE {
                score += 0.5;
            }
        }

        if bb < BB_LOW_ZONE && bb > bb_prev {
            score += 1.0;
        }

        if self.adx > ADX_STRONG_TREND && self.trend() == Trend::Up {
            score += 0.5;
        }

        score
    }

    fn sell_score(&self, params: &ParameterSet) -> f64 {
        let mut score = 0.0;
        let (rsi, rsi_prev) = self.rsi;
        let (hist, hist_prev) = self.macd;
        let (k, k_prev) = self.stoch_k;
        let (d, d_prev) = self.stoch_d;
        let (bb, bb_prev) = self.bb;

        if self.close < self.ema_fast && self.ema_fast < self.ema_mid && self.ema_mid < self.ema_slow
        {
            score += 2.0;
        } else if self.ema_mid < self.ema_slow && self.close < self.ema_slow {
            score += 1.0;
        }

        if rsi < rsi_prev {
            if RSI_MIDLINE < rsi && rsi < params.rsi_overbought() {
                score += 1.5;
            } else if rsi > params.rsi_overbought() {
                score += 1.0;
            }
        }

        if hist < 0.0 {
            score += 0.5;
            if hist_prev >= 0.0 {
                score += 1.0;
            } else if hist < hist_prev {
                score += 0.5;
            }
        }

        if k < d && k_prev >= d_prev {
            if k > STOCH_DEEP_SELL {
                score += 1.5;
            } else if k > STOCH_MIDLINE {
                score += 0.5;
            }
        }

        if bb > BB_HIGH_ZONE && bb < bb_prev {
            score += 1.0;
        }

        if self.adx > ADX_STRONG_TREND && self.trend() == Trend::Down {
            score += 0.5;
        }

        score
    }
}

/// Scores bars for one symbol under one parameter set.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    symbol: String,
    params: ParameterSet,
    risk: RiskModel,
}

impl ScoringEngine {
    pub fn new(symbol: impl Into<String>, params: ParameterSet, risk: RiskModel) -> Self {
        Self {
            symbol: symbol.into(),
            params,
            risk,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn risk(&self) -> &RiskModel {
        &self.risk
    }

    /// Score the bar at `index`, or say why it cannot be scored.
    ///
    /// Gates, in order: session blocklist, indicator warm-up, ADX threshold.
    /// Only `bars[..=index]` and indicator values up to `index` are read.
    pub fn assess(
        &self,
        bars: &[Bar],
        index: usize,
        indicators: &IndicatorValues,
    ) -> Result<ScoreCard, Skip> {
        let bar = bars.get(index).ok_or(Skip::NoHistory)?;
        if index == 0 {
            return Err(Skip::NoHistory);
        }

        let hour = bar.utc_hour();
        if self.params.is_blocked_hour(hour) {
            return Err(Skip::BlockedHour(hour));
        }

        let snap = Snapshot::read(bar.close, index, indicators).ok_or(Skip::WarmingUp)?;
        if snap.adx < self.params.adx_threshold() {
            return Err(Skip::WeakTrend { adx: snap.adx });
        }

        Ok(ScoreCard {
            bar_index: index,
            close: snap.close,
            buy: snap.buy_score(&self.params),
            sell: snap.sell_score(&self.params),
            trend: snap.trend(),
            rsi: snap.rsi.0,
            adx: snap.adx,
            atr: snap.atr,
            ema_200: snap.ema_slow,
        })
    }

    /// Raw scores, or `None` when the bar is gated out.
    pub fn score(
        &self,
        bars: &[Bar],
        index: usize,
        indicators: &IndicatorValues,
    ) -> Option<ScoreCard> {
        self.assess(bars, index, indicators).ok()
    }

    /// Full evaluation: score, decide, and attach the risk plan.
    pub fn evaluate(
        &self,
        bars: &[Bar],
        index: usize,
        indicators: &IndicatorValues,
    ) -> Option<Signal> {
        let card = self.score(bars, index, indicators)?;
        let direction = card.decision(&self.params)?;
        self.signal_for(&card, direction, bars)
    }

    /// Build the signal for `direction` at the card's bar. Entry is the
    /// bar close; `None` if the ATR yields no usable stop distance.
    pub fn signal_for(&self, card: &ScoreCard, direction: Direction, bars: &[Bar]) -> Option<Signal> {
        let bar = bars.get(card.bar_index)?;
        let plan = self.risk.plan(direction, card.close, card.atr)?;
        let score = card.score_for(direction);
        debug!(
            symbol = %self.symbol,
            bar = card.bar_index,
            %direction,
            score,
            "signal accepted"
        );
        Some(Signal {
            symbol: self.symbol.clone(),
            direction,
            bar_index: card.bar_index,
            timestamp: bar.timestamp,
            entry: plan.entry,
            stop: plan.stop,
            target: plan.target,
            entry_min: plan.entry_min,
            entry_max: plan.entry_max,
            size: plan.size,
            score,
            context: SignalContext {
                rsi: card.rsi,
                adx: card.adx,
                atr: card.atr,
                ema_200: card.ema_200,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;
    use crate::params::ParameterSpec;

    /// Two-bar indicator snapshot with every series defined.
    struct Fixture {
        values: Vec<(&'static str, [f64; 2])>,
    }

    impl Fixture {
        fn neutral() -> Self {
            Self {
                values: vec![
                    (names::EMA_FAST, [100.0, 100.0]),
                    (names::EMA_MID, [100.0, 100.0]),
                    (names::EMA_SLOW, [100.0, 100.0]),
                    (names::RSI, [50.0, 50.0]),
                    (names::ATR, [1.0, 1.0]),
                    (names::ADX, [26.0, 26.0]),
                    (names::MACD_HIST, [0.0, 0.0]),
                    (names::BB_POSITION, [0.5, 0.5]),
                    (names::STOCH_K, [50.0, 50.0]),
                    (names::STOCH_D, [50.0, 50.0]),
                ],
            }
        }

        fn set(mut self, name: &'static str, prev: f64, cur: f64) -> Self {
            if let Some(entry) = self.values.iter_mut().find(|(n, _)| *n == name) {
                entry.1 = [prev, cur];
            }
            self
        }

        fn build(&self) -> IndicatorValues {
            let mut iv = IndicatorValues::new();
            for (name, [prev, cur]) in &self.values {
                iv.insert(*name, vec![Some(*prev), Some(*cur)]);
            }
            iv
        }
    }

    fn engine(spec: ParameterSpec) -> ScoringEngine {
        ScoringEngine::new(
            "TEST",
            ParameterSet::try_from(spec).unwrap(),
            RiskModel::default(),
        )
    }

    fn bars_closing_at(close: f64) -> Vec<Bar> {
        make_bars(&[close, close])
    }

    #[test]
    fn neutral_snapshot_scores_zero() {
        let card = engine(ParameterSpec::default())
            .score(&bars_closing_at(100.0), 1, &Fixture::neutral().build())
            .unwrap();
        assert_eq!(card.buy, 0.0);
        assert_eq!(card.sell, 0.0);
        assert_eq!(card.decision(&ParameterSet::default()), None);
    }

    #[test]
    fn full_bullish_confluence() {
        let iv = Fixture::neutral()
            .set(names::EMA_FAST, 104.0, 104.0)
            .set(names::EMA_MID, 102.0, 102.0)
            .set(names::EMA_SLOW, 100.0, 100.0)
            .set(names::RSI, 35.0, 40.0)
            .set(names::MACD_HIST, -0.1, 0.2)
            .set(names::STOCH_K, 20.0, 25.0)
            .set(names::STOCH_D, 22.0, 23.0)
            .set(names::BB_POSITION, 0.1, 0.2)
            .set(names::ADX, 32.0, 32.0)
            .build();
        let card = engine(ParameterSpec::default())
            .score(&bars_closing_at(105.0), 1, &iv)
            .unwrap();
        // 2 + 1.5 + (0.5 + 1) + 1.5 + 1 + 0.5
        assert_eq!(card.buy, 8.0);
        assert_eq!(card.sell, 0.0);
        assert_eq!(card.trend, Trend::Up);
        assert_eq!(card.decision(&ParameterSet::default()), Some(Direction::Long));
    }

    #[test]
    fn full_bearish_confluence() {
        let iv = Fixture::neutral()
            .set(names::EMA_FAST, 96.0, 96.0)
            .set(names::EMA_MID, 98.0, 98.0)
            .set(names::EMA_SLOW, 100.0, 100.0)
            .set(names::RSI, 65.0, 60.0)
            .set(names::MACD_HIST, 0.1, -0.2)
            .set(names::STOCH_K, 80.0, 75.0)
            .set(names::STOCH_D, 78.0, 77.0)
            .set(names::BB_POSITION, 0.9, 0.8)
            .set(names::ADX, 32.0, 32.0)
            .build();
        let card = engine(ParameterSpec::default())
            .score(&bars_closing_at(95.0), 1, &iv)
            .unwrap();
        assert_eq!(card.sell, 8.0);
        assert_eq!(card.buy, 0.0);
        assert_eq!(card.decision(&ParameterSet::default()), Some(Direction::Short));
    }

    #[test]
    fn rising_macd_without_cross_scores_one() {
        let iv = Fixture::neutral().set(names::MACD_HIST, 0.1, 0.3).build();
        let card = engine(ParameterSpec::default())
            .score(&bars_closing_at(100.0), 1, &iv)
            .unwrap();
        assert_eq!(card.buy, 1.0);
    }

    #[test]
    fn partial_alignment_scores_one() {
        let iv = Fixture::neutral()
            .set(names::EMA_FAST, 106.0, 106.0)
            .set(names::EMA_MID, 102.0, 102.0)
            .build();
        let card = engine(ParameterSpec::default())
            .score(&bars_closing_at(103.0), 1, &iv)
            .unwrap();
        assert_eq!(card.buy, 1.0);
    }

    #[test]
    fn below_min_score_is_not_a_signal() {
        let iv = Fixture::neutral()
            .set(names::EMA_FAST, 104.0, 104.0)
            .set(names::EMA_MID, 102.0, 102.0)
            .set(names::RSI, 35.0, 40.0)
            .build();
        let e = engine(ParameterSpec::default());
        let bars = bars_closing_at(105.0);
        let card = e.score(&bars, 1, &iv).unwrap();
        assert_eq!(card.buy, 3.5);
        assert_eq!(card.leading_side(e.params()), Some(Direction::Long));
        assert_eq!(card.decision(e.params()), None);
        assert!(e.evaluate(&bars, 1, &iv).is_none());
    }

    #[test]
    fn overbought_rsi_blocks_buy() {
        let iv = Fixture::neutral()
            .set(names::EMA_FAST, 104.0, 104.0)
            .set(names::EMA_MID, 102.0, 102.0)
            .set(names::RSI, 71.0, 72.0)
            .set(names::MACD_HIST, -0.1, 0.2)
            .set(names::STOCH_K, 20.0, 25.0)
            .set(names::STOCH_D, 22.0, 23.0)
            .set(names::ADX, 32.0, 32.0)
            .build();
        let card = engine(ParameterSpec::default())
            .score(&bars_closing_at(105.0), 1, &iv)
            .unwrap();
        assert!(card.buy >= 5.0);
        assert_eq!(card.decision(&ParameterSet::default()), None);
    }

    #[test]
    fn dominance_margin_is_strict() {
        let card = ScoreCard {
            bar_index: 1,
            close: 100.0,
            buy: 6.0,
            sell: 5.0,
            trend: Trend::Up,
            rsi: 50.0,
            adx: 30.0,
            atr: 1.0,
            ema_200: 99.0,
        };
        assert_eq!(card.decision(&ParameterSet::default()), None);
        let loose = ParameterSet::try_from(ParameterSpec {
            dominance_margin: 0.5,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(card.decision(&loose), Some(Direction::Long));
    }

    #[test]
    fn trend_filter_requires_major_trend() {
        let card = ScoreCard {
            bar_index: 1,
            close: 100.0,
            buy: 6.0,
            sell: 0.0,
            trend: Trend::Down,
            rsi: 45.0,
            adx: 30.0,
            atr: 1.0,
            ema_200: 101.0,
        };
        let filtered = ParameterSet::try_from(ParameterSpec {
            trend_filter: true,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(card.decision(&ParameterSet::default()), Some(Direction::Long));
        assert_eq!(card.decision(&filtered), None);
    }

    #[test]
    fn weak_adx_is_skipped() {
        let iv = Fixture::neutral().set(names::ADX, 20.0, 20.0).build();
        let result = engine(ParameterSpec::default()).assess(&bars_closing_at(100.0), 1, &iv);
        assert_eq!(result, Err(Skip::WeakTrend { adx: 20.0 }));
    }

    #[test]
    fn undefined_indicator_is_warmup_not_zero() {
        let mut iv = Fixture::neutral().build();
        iv.insert(names::RSI, vec![None, Some(40.0)]);
        let result = engine(ParameterSpec::default()).assess(&bars_closing_at(100.0), 1, &iv);
        assert_eq!(result, Err(Skip::WarmingUp));
    }

    #[test]
    fn blocked_hour_is_skipped() {
        // make_bars starts at 00:00, so bar 1 is at 01:00 UTC
        let e = engine(ParameterSpec {
            blocked_hours: vec![1],
            ..Default::default()
        });
        let result = e.assess(&bars_closing_at(100.0), 1, &Fixture::neutral().build());
        assert_eq!(result, Err(Skip::BlockedHour(1)));
    }

    #[test]
    fn first_bar_has_no_history() {
        let e = engine(ParameterSpec::default());
        let iv = Fixture::neutral().build();
        assert_eq!(e.assess(&bars_closing_at(100.0), 0, &iv), Err(Skip::NoHistory));
        assert_eq!(e.assess(&bars_closing_at(100.0), 5, &iv), Err(Skip::NoHistory));
    }

    #[test]
    fn evaluate_attaches_risk_plan() {
        let iv = Fixture::neutral()
            .set(names::EMA_FAST, 104.0, 104.0)
            .set(names::EMA_MID, 102.0, 102.0)
            .set(names::RSI, 35.0, 40.0)
            .set(names::MACD_HIST, -0.1, 0.2)
            .set(names::ATR, 2.0, 2.0)
            .build();
        let bars = bars_closing_at(105.0);
        let signal = engine(ParameterSpec::default())
            .evaluate(&bars, 1, &iv)
            .unwrap();
        assert_eq!(signal.direction, Direction::Long);
        assert_eq!(signal.score, 5.0);
        assert_eq!(signal.entry, 105.0);
        assert_eq!(signal.stop, 101.0);
        assert_eq!(signal.target, 115.0);
        assert_eq!(signal.timestamp, bars[1].timestamp);
        assert_eq!(signal.context.atr, 2.0);
    }
}
