use crate::{
    dsl::def::{ExprDef, OperandDef},
    error::ConfigError,
    intent::IntentAction,
};
use playbook_execution::{
    config::MarkPriceSource,
    order::{OrderKind, TimeInForce, TriggerDirection},
};
use playbook_instrument::{
    spec::InstrumentSpec,
    timeframe::{Timeframe, TimeframeRole},
};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Declared timeframes: execution is mandatory, medium/high optional.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct TimeframeSet {
    pub exec: Timeframe,
    #[serde(default)]
    pub med: Option<Timeframe>,
    #[serde(default)]
    pub high: Option<Timeframe>,
}

impl TimeframeSet {
    pub fn get(&self, role: TimeframeRole) -> Option<Timeframe> {
        match role {
            TimeframeRole::Exec => Some(self.exec),
            TimeframeRole::Med => self.med,
            TimeframeRole::High => self.high,
        }
    }
}

/// Warmup bar counts per declared role; trading stays disabled until they elapse.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Deserialize, Serialize)]
pub struct WarmupBars {
    #[serde(default)]
    pub exec: usize,
    #[serde(default)]
    pub med: usize,
    #[serde(default)]
    pub high: usize,
}

impl WarmupBars {
    pub fn get(&self, role: TimeframeRole) -> usize {
        match role {
            TimeframeRole::Exec => self.exec,
            TimeframeRole::Med => self.med,
            TimeframeRole::High => self.high,
        }
    }
}

/// A named feature: binds an id the rules reference to a snapshot path
/// (eg/ `ema_fast` -> `indicator.exec.ema_21`).
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct FeatureDef {
    pub id: SmolStr,
    pub path: SmolStr,
}

/// Position sizing policy; the Play default can be overridden per intent.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "mode")]
pub enum Sizing {
    #[serde(rename = "fixed_usdt")]
    FixedUsdt { usdt: f64 },
    #[serde(rename = "percent_equity")]
    PercentEquity { percent: f64 },
    /// Risk a fixed percent of equity between entry and stop-loss.
    #[serde(rename = "risk_pct")]
    RiskPct { percent: f64 },
}

impl Sizing {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Sizing::FixedUsdt { usdt } => {
                if usdt <= 0.0 {
                    return Err(ConfigError::NonPositiveSizing { value: usdt });
                }
            }
            Sizing::PercentEquity { percent } | Sizing::RiskPct { percent } => {
                if !(percent > 0.0 && percent <= 100.0) {
                    return Err(ConfigError::InvalidPercent { value: percent });
                }
            }
        }
        Ok(())
    }
}

/// Risk parameters of the Play, mapped onto the exchange configuration and the
/// engine's terminal stops.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RiskConfig {
    pub starting_equity_usdt: f64,
    pub max_leverage: f64,
    pub fee_taker_bps: f64,
    pub fee_maker_bps: f64,
    #[serde(default)]
    pub slippage_bps: f64,
    pub mark_price_source: MarkPriceSource,
    #[serde(default)]
    pub funding_enabled: bool,
    #[serde(default)]
    pub max_drawdown_pct: Option<f64>,
    #[serde(default)]
    pub equity_floor_usdt: Option<f64>,
}

/// One rule group: cases are tried in order and the first whose `when` holds emits
/// its intents; later cases are skipped for the bar.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ActionGroup {
    pub id: SmolStr,
    pub cases: Vec<Case>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Case {
    pub when: ExprDef,
    pub emit: Vec<IntentDef>,
}

/// Declarative intent template; price expressions are evaluated against the snapshot
/// at emit time.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IntentDef {
    pub action: IntentAction,
    #[serde(default)]
    pub order_kind: Option<OrderKind>,
    #[serde(default)]
    pub limit_price: Option<OperandDef>,
    #[serde(default)]
    pub trigger_price: Option<OperandDef>,
    #[serde(default)]
    pub trigger_direction: Option<TriggerDirection>,
    #[serde(default)]
    pub time_in_force: Option<TimeInForce>,
    #[serde(default)]
    pub sizing: Option<Sizing>,
    #[serde(default)]
    pub sl: Option<OperandDef>,
    #[serde(default)]
    pub tp: Option<OperandDef>,
    #[serde(default)]
    pub percent: Option<f64>,
}

/// The validated, resolved strategy definition consumed by the engine.
///
/// Loading and schema normalisation (YAML, defaults, aliases) happen upstream; a
/// `Play` arriving here is structurally complete but not yet compiled.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Play {
    pub name: SmolStr,
    pub instrument: InstrumentSpec,
    pub timeframes: TimeframeSet,
    #[serde(default)]
    pub warmup_bars: WarmupBars,
    #[serde(default)]
    pub features: Vec<FeatureDef>,
    pub actions: Vec<ActionGroup>,
    pub risk: RiskConfig,
    pub sizing: Sizing,
    /// Window sizes the Play uses through `bars_high_<n>` / `bars_low_<n>` paths;
    /// the bar feed precomputes rolling extremes for exactly these.
    #[serde(default)]
    pub rolling_windows: Vec<usize>,
}

impl Play {
    /// Structural validation independent of market data.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.actions.is_empty() {
            return Err(ConfigError::NoActions);
        }
        self.sizing.validate()?;
        for group in &self.actions {
            for case in &group.cases {
                for intent in &case.emit {
                    if let Some(sizing) = &intent.sizing {
                        sizing.validate()?;
                    }
                    if let Some(percent) = intent.percent
                        && !(percent > 0.0 && percent <= 100.0)
                    {
                        return Err(ConfigError::InvalidPercent { value: percent });
                    }
                }
            }
        }
        Ok(())
    }

    /// Look up a declared feature path by id, naming the declared alternatives on
    /// a miss.
    pub fn feature(&self, id: &str) -> Result<&FeatureDef, ConfigError> {
        self.features
            .iter()
            .find(|feature| feature.id == id)
            .ok_or_else(|| ConfigError::UnknownFeature {
                id: SmolStr::new(id),
                available: SmolStr::new(
                    itertools::Itertools::join(&mut self.features.iter().map(|f| f.id.as_str()), ", "),
                ),
            })
    }
}
