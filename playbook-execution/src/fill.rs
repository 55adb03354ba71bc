use crate::order::TriggerDirection;
use playbook_instrument::Side;

/// Apply adverse slippage to a market-style fill price.
pub fn apply_slippage(side: Side, price: f64, slippage_rate: f64) -> f64 {
    match side {
        Side::Buy => price * (1.0 + slippage_rate),
        Side::Sell => price * (1.0 - slippage_rate),
    }
}

/// Fill price for a resting limit order against one bar's range, `None` if untouched.
///
/// A bar opening through the limit fills at the open (the order was resting); an
/// intra-bar touch fills at the limit itself.
pub fn limit_fill_price(side: Side, limit: f64, open: f64, low: f64, high: f64) -> Option<f64> {
    match side {
        Side::Buy => {
            if open <= limit {
                Some(open)
            } else if low <= limit {
                Some(limit)
            } else {
                None
            }
        }
        Side::Sell => {
            if open >= limit {
                Some(open)
            } else if high >= limit {
                Some(limit)
            } else {
                None
            }
        }
    }
}

/// Whether a limit order would fill immediately at the bar open (IOC/FOK/PostOnly
/// immediacy test).
pub fn fills_at_open(side: Side, limit: f64, open: f64) -> bool {
    match side {
        Side::Buy => open <= limit,
        Side::Sell => open >= limit,
    }
}

/// Trigger-crossing price for a stop order against one bar, `None` if not crossed.
///
/// A bar opening beyond the trigger yields the open (gap), otherwise the trigger
/// price itself.
pub fn stop_trigger_price(
    direction: TriggerDirection,
    trigger: f64,
    open: f64,
    low: f64,
    high: f64,
) -> Option<f64> {
    match direction {
        TriggerDirection::Rise => {
            if open >= trigger {
                Some(open)
            } else if high >= trigger {
                Some(trigger)
            } else {
                None
            }
        }
        TriggerDirection::Fall => {
            if open <= trigger {
                Some(open)
            } else if low <= trigger {
                Some(trigger)
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_fill_price() {
        struct TestCase {
            side: Side,
            limit: f64,
            bar: (f64, f64, f64), // open, low, high
            expected: Option<f64>,
        }

        let tests = vec![
            TestCase {
                // TC0: buy limit untouched above range
                side: Side::Buy,
                limit: 90.0,
                bar: (100.0, 95.0, 105.0),
                expected: None,
            },
            TestCase {
                // TC1: buy limit touched intra-bar
                side: Side::Buy,
                limit: 97.0,
                bar: (100.0, 95.0, 105.0),
                expected: Some(97.0),
            },
            TestCase {
                // TC2: bar opens through buy limit - fill at open
                side: Side::Buy,
                limit: 102.0,
                bar: (100.0, 95.0, 105.0),
                expected: Some(100.0),
            },
            TestCase {
                // TC3: sell limit touched intra-bar
                side: Side::Sell,
                limit: 104.0,
                bar: (100.0, 95.0, 105.0),
                expected: Some(104.0),
            },
            TestCase {
                // TC4: bar opens through sell limit
                side: Side::Sell,
                limit: 98.0,
                bar: (100.0, 95.0, 105.0),
                expected: Some(100.0),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let (open, low, high) = test.bar;
            let actual = limit_fill_price(test.side, test.limit, open, low, high);
            assert_eq!(actual, test.expected, "TC{index} failed");
        }
    }

    #[test]
    fn test_stop_trigger_price() {
        struct TestCase {
            direction: TriggerDirection,
            trigger: f64,
            bar: (f64, f64, f64),
            expected: Option<f64>,
        }

        let tests = vec![
            TestCase {
                // TC0: rise trigger crossed intra-bar
                direction: TriggerDirection::Rise,
                trigger: 103.0,
                bar: (100.0, 95.0, 105.0),
                expected: Some(103.0),
            },
            TestCase {
                // TC1: rise trigger gapped through at open
                direction: TriggerDirection::Rise,
                trigger: 99.0,
                bar: (100.0, 95.0, 105.0),
                expected: Some(100.0),
            },
            TestCase {
                // TC2: fall trigger untouched
                direction: TriggerDirection::Fall,
                trigger: 90.0,
                bar: (100.0, 95.0, 105.0),
                expected: None,
            },
            TestCase {
                // TC3: fall trigger crossed intra-bar
                direction: TriggerDirection::Fall,
                trigger: 96.0,
                bar: (100.0, 95.0, 105.0),
                expected: Some(96.0),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let (open, low, high) = test.bar;
            let actual = stop_trigger_price(test.direction, test.trigger, open, low, high);
            assert_eq!(actual, test.expected, "TC{index} failed");
        }
    }

    #[test]
    fn test_slippage_is_adverse() {
        assert_eq!(apply_slippage(Side::Buy, 100.0, 0.001), 100.1);
        assert_eq!(apply_slippage(Side::Sell, 100.0, 0.001), 99.9);
    }
}
