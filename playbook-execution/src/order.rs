use crate::error::ExecutionError;
use playbook_instrument::Side;
use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, format_smolstr};
use std::fmt::{Display, Formatter};

/// Sequential, zero-padded order identifier (`order_0001`, `order_0002`, ...).
///
/// Never UUIDs: reproducibility requires strict ordering.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct OrderId(pub SmolStr);

impl OrderId {
    pub fn from_seq(seq: u64) -> Self {
        Self(format_smolstr!("order_{seq:04}"))
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Supported order kinds.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum OrderKind {
    #[serde(rename = "market")]
    Market,
    #[serde(rename = "limit")]
    Limit,
    #[serde(rename = "stop_market")]
    StopMarket,
    #[serde(rename = "stop_limit")]
    StopLimit,
}

impl OrderKind {
    pub fn is_stop(&self) -> bool {
        matches!(self, Self::StopMarket | Self::StopLimit)
    }
}

/// Time-in-force policy for limit orders.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum TimeInForce {
    #[serde(rename = "gtc")]
    Gtc,
    #[serde(rename = "ioc")]
    Ioc,
    #[serde(rename = "fok")]
    Fok,
    #[serde(rename = "post_only")]
    PostOnly,
}

/// Direction the market must move through `trigger_price` to arm a stop order.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum TriggerDirection {
    #[serde(rename = "rise")]
    Rise,
    #[serde(rename = "fall")]
    Fall,
}

/// An order request as lowered from an Intent, before the exchange assigns an id.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrderRequest {
    pub side: Side,
    pub kind: OrderKind,
    /// Notional in quote currency; must be > 0.
    pub size_usdt: f64,
    pub limit_price: Option<f64>,
    pub trigger_price: Option<f64>,
    pub trigger_direction: Option<TriggerDirection>,
    pub time_in_force: TimeInForce,
    pub attached_sl: Option<f64>,
    pub attached_tp: Option<f64>,
    pub reduce_only: bool,
}

impl OrderRequest {
    /// Plain market order.
    pub fn market(side: Side, size_usdt: f64) -> Self {
        Self {
            side,
            kind: OrderKind::Market,
            size_usdt,
            limit_price: None,
            trigger_price: None,
            trigger_direction: None,
            time_in_force: TimeInForce::Gtc,
            attached_sl: None,
            attached_tp: None,
            reduce_only: false,
        }
    }

    /// Validate the structural invariants of this request.
    pub fn validate(&self) -> Result<(), ExecutionError> {
        let fail = |detail: &str| ExecutionError::MalformedOrder {
            kind: self.kind,
            detail: SmolStr::new(detail),
        };

        if !(self.size_usdt > 0.0) {
            return Err(fail("size_usdt must be > 0"));
        }
        match self.kind {
            OrderKind::Limit | OrderKind::StopLimit if self.limit_price.is_none() => {
                return Err(fail("limit kinds require limit_price"));
            }
            OrderKind::StopMarket | OrderKind::StopLimit => {
                if self.trigger_price.is_none() || self.trigger_direction.is_none() {
                    return Err(fail("stop kinds require trigger_price and trigger_direction"));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// A pending order resting in the book.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub side: Side,
    pub kind: OrderKind,
    pub size_usdt: f64,
    pub limit_price: Option<f64>,
    pub trigger_price: Option<f64>,
    pub trigger_direction: Option<TriggerDirection>,
    pub time_in_force: TimeInForce,
    pub attached_sl: Option<f64>,
    pub attached_tp: Option<f64>,
    pub reduce_only: bool,
    /// Execution-bar `ts_close` at which the order was submitted. Orders become
    /// fill-eligible on the following bar.
    pub ts_submit: i64,
}

impl Order {
    pub fn from_request(request: OrderRequest, id: OrderId, ts_submit: i64) -> Self {
        Self {
            id,
            side: request.side,
            kind: request.kind,
            size_usdt: request.size_usdt,
            limit_price: request.limit_price,
            trigger_price: request.trigger_price,
            trigger_direction: request.trigger_direction,
            time_in_force: request.time_in_force,
            attached_sl: request.attached_sl,
            attached_tp: request.attached_tp,
            reduce_only: request.reduce_only,
            ts_submit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_id_is_zero_padded_sequential() {
        assert_eq!(OrderId::from_seq(1).to_string(), "order_0001");
        assert_eq!(OrderId::from_seq(42).to_string(), "order_0042");
        assert_eq!(OrderId::from_seq(10_000).to_string(), "order_10000");
    }

    #[test]
    fn test_request_validation() {
        struct TestCase {
            request: OrderRequest,
            expected_ok: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: market order
                request: OrderRequest::market(Side::Buy, 1_000.0),
                expected_ok: true,
            },
            TestCase {
                // TC1: zero size
                request: OrderRequest::market(Side::Buy, 0.0),
                expected_ok: false,
            },
            TestCase {
                // TC2: limit without limit_price
                request: OrderRequest {
                    kind: OrderKind::Limit,
                    ..OrderRequest::market(Side::Sell, 500.0)
                },
                expected_ok: false,
            },
            TestCase {
                // TC3: stop-market without trigger
                request: OrderRequest {
                    kind: OrderKind::StopMarket,
                    ..OrderRequest::market(Side::Buy, 500.0)
                },
                expected_ok: false,
            },
            TestCase {
                // TC4: complete stop-limit
                request: OrderRequest {
                    kind: OrderKind::StopLimit,
                    limit_price: Some(101.0),
                    trigger_price: Some(100.0),
                    trigger_direction: Some(TriggerDirection::Rise),
                    ..OrderRequest::market(Side::Buy, 500.0)
                },
                expected_ok: true,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(
                test.request.validate().is_ok(),
                test.expected_ok,
                "TC{index} failed"
            );
        }
    }
}
