//! Rising-edge event suppression.

/// Emits once per contiguous run of a true condition.
///
/// | logged | triggered | emit | logged after |
/// |--------|-----------|------|--------------|
/// | false  | false     | no   | false        |
/// | false  | true      | yes  | true         |
/// | true   | true      | no   | true         |
/// | true   | false     | no   | false        |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventDeduplicator {
    logged: bool,
}

impl EventDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one frame's verdict; returns true when an event should be emitted.
    pub fn on_verdict(&mut self, triggered: bool) -> bool {
        let emit = triggered && !self.logged;
        self.logged = triggered;
        emit
    }

    /// Returns true while the current run has already been logged.
    pub fn is_logged(&self) -> bool {
        self.logged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_transition_table() {
        let cases = [
            (false, false, false, false),
            (false, true, true, true),
            (true, true, false, true),
            (true, false, false, false),
        ];

        for (logged, triggered, emit, after) in cases {
            let mut dedup = EventDeduplicator { logged };
            assert_eq!(dedup.on_verdict(triggered), emit);
            assert_eq!(dedup.is_logged(), after);
        }
    }

    #[test]
    fn test_reset_after_clear_frame() {
        let mut dedup = EventDeduplicator::new();
        assert!(dedup.on_verdict(true));
        assert!(!dedup.on_verdict(true));
        assert!(!dedup.on_verdict(false));
        assert!(dedup.on_verdict(true));
    }

    proptest! {
        #[test]
        fn emits_once_per_true_run(verdicts in proptest::collection::vec(any::<bool>(), 0..200)) {
            let mut dedup = EventDeduplicator::new();
            let emitted: Vec<usize> = verdicts
                .iter()
                .enumerate()
                .filter_map(|(i, &v)| dedup.on_verdict(v).then_some(i))
                .collect();

            let run_starts: Vec<usize> = (0..verdicts.len())
                .filter(|&i| verdicts[i] && (i == 0 || !verdicts[i - 1]))
                .collect();

            prop_assert_eq!(emitted, run_starts);
        }
    }
}
