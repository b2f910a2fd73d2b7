use std::collections::HashMap;

/// Occurrences of elements, behaviors and line labels within one phase
/// visit of one subject.
///
/// `count` runs from phase entry; `count_line` restarts whenever the
/// current line label changes.
#[derive(Debug, Clone, Default)]
pub struct EventCounter {
    count: HashMap<String, i64>,
    count_line: HashMap<String, i64>,
    line_label: Option<String>,
}

impl EventCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, event: &str) {
        *self.count.entry(event.to_string()).or_default() += 1;
        *self.count_line.entry(event.to_string()).or_default() += 1;
    }

    /// Moves to `label`, restarting the per-line counts when it differs
    /// from the previous line.
    pub fn enter_line(&mut self, label: &str) {
        if self.line_label.as_deref() != Some(label) {
            self.count_line.clear();
            self.line_label = Some(label.to_string());
        }
    }

    pub fn reset(&mut self, event: &str) {
        self.count.remove(event);
        self.count_line.remove(event);
    }

    pub fn count(&self, event: &str) -> i64 {
        self.count.get(event).copied().unwrap_or(0)
    }

    pub fn count_line(&self, event: &str) -> i64 {
        self.count_line.get(event).copied().unwrap_or(0)
    }

    pub fn line_label(&self) -> Option<&str> {
        self.line_label.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_count_line_restarts_on_new_label() {
        let mut counter = EventCounter::new();
        counter.enter_line("A");
        counter.increment("A");
        counter.increment("s");
        counter.enter_line("A");
        counter.increment("A");
        assert_eq!(counter.count_line("A"), 2);
        counter.enter_line("B");
        assert_eq!(counter.count_line("A"), 0);
        assert_eq!(counter.count("A"), 2);
        assert_eq!(counter.count("s"), 1);
        assert_eq!(counter.line_label(), Some("B"));
    }

    proptest! {
        #[test]
        fn reset_always_yields_zero(n in 0usize..50, other in 0usize..5) {
            let mut counter = EventCounter::new();
            for _ in 0..n {
                counter.increment("x");
            }
            for _ in 0..other {
                counter.increment("y");
            }
            counter.reset("x");
            prop_assert_eq!(counter.count("x"), 0);
            prop_assert_eq!(counter.count_line("x"), 0);
            prop_assert_eq!(counter.count("y"), other as i64);
        }
    }
}
