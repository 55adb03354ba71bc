use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Bounded boolean window for one duration operator.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BoolWindow {
    window: VecDeque<bool>,
    cap: usize,
}

impl BoolWindow {
    fn new(cap: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(cap),
            cap,
        }
    }

    fn push(&mut self, value: bool) {
        if self.cap == 0 {
            return;
        }
        if self.window.len() == self.cap {
            self.window.pop_front();
        }
        self.window.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Number of `true` entries among the most recent `n`.
    pub fn count_true_last(&self, n: usize) -> usize {
        self.window
            .iter()
            .rev()
            .take(n)
            .filter(|&&value| value)
            .count()
    }

    /// Whether all of the most recent `n` entries exist and are `true`.
    pub fn all_true_last(&self, n: usize) -> bool {
        self.window.len() >= n && self.window.iter().rev().take(n).all(|&value| value)
    }

    /// Whether any of the most recent `n` entries is `true`.
    pub fn any_true_last(&self, n: usize) -> bool {
        self.window.iter().rev().take(n).any(|&value| value)
    }
}

/// Per-Play evaluation history: one single-bar value slot per crossover operand and
/// one boolean window per duration operator.
///
/// The hard contract (engine loop step 8): [`History::push`] runs AFTER rule
/// evaluation, so during evaluation a slot's stored value belongs to the previous
/// bar.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct History {
    values: Vec<Option<f64>>,
    bools: Vec<BoolWindow>,
}

impl History {
    pub fn new(value_slots: usize, bool_caps: &[usize]) -> Self {
        Self {
            values: vec![None; value_slots],
            bools: bool_caps.iter().map(|&cap| BoolWindow::new(cap)).collect(),
        }
    }

    /// Previous-bar value of a crossover operand, `None` while MISSING or before the
    /// first push.
    pub fn prev_value(&self, slot: usize) -> Option<f64> {
        self.values[slot]
    }

    pub fn bools(&self, slot: usize) -> &BoolWindow {
        &self.bools[slot]
    }

    /// Append this bar's tracked values and booleans. Call after evaluation only.
    pub fn push(&mut self, values: Vec<Option<f64>>, bools: Vec<bool>) {
        debug_assert_eq!(values.len(), self.values.len());
        debug_assert_eq!(bools.len(), self.bools.len());
        self.values = values;
        for (window, value) in self.bools.iter_mut().zip(bools) {
            window.push(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_window_rolls() {
        let mut window = BoolWindow::new(3);
        for value in [true, false, true, true] {
            window.push(value);
        }
        // retained: [false, true, true]
        assert_eq!(window.len(), 3);
        assert_eq!(window.count_true_last(3), 2);
        assert!(window.all_true_last(2));
        assert!(!window.all_true_last(3));
        assert!(window.any_true_last(1));
    }

    #[test]
    fn test_all_true_requires_full_history() {
        let mut window = BoolWindow::new(5);
        window.push(true);
        assert!(!window.all_true_last(2));
        window.push(true);
        assert!(window.all_true_last(2));
    }

    #[test]
    fn test_history_prev_value_semantics() {
        let mut history = History::new(1, &[]);
        assert_eq!(history.prev_value(0), None);
        history.push(vec![Some(10.0)], vec![]);
        assert_eq!(history.prev_value(0), Some(10.0));
        history.push(vec![None], vec![]);
        assert_eq!(history.prev_value(0), None);
    }
}
