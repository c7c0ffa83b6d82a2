use tidelog_types::{Sequence, Watermark};

/// Returns `true` when every entry up to `watermark` has been applied.
///
/// Only the two positions matter; the number of live objects never does.
pub fn caught_up(highest_applied: Sequence, watermark: Watermark) -> bool {
    watermark.is_reached_by(highest_applied)
}

/// Result of evaluating a [`CompletionDetector`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    /// Entries below the watermark are still outstanding.
    Pending { remaining: u64 },
    /// This evaluation is the first to find the watermark reached.
    Completed,
    /// Completion was already signalled by an earlier evaluation.
    AlreadyCompleted,
}

impl Progress {
    pub fn is_complete(self) -> bool {
        !matches!(self, Self::Pending { .. })
    }
}

/// Tracks whether replay has consumed everything that existed when the
/// watermark was captured, and signals completion exactly once.
///
/// Evaluate with [`check`](Self::check) as soon as the subscription is
/// established (an empty log is complete before anything is delivered) and
/// with [`observe`](Self::observe) after each delivered entry has been
/// applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompletionDetector {
    watermark: Watermark,
    highest_applied: Sequence,
    fired: bool,
}

impl CompletionDetector {
    pub fn new(watermark: Watermark) -> Self {
        Self {
            watermark,
            highest_applied: Sequence::ZERO,
            fired: false,
        }
    }

    /// Record that the entry at `sequence` has been applied, then evaluate.
    pub fn observe(&mut self, sequence: Sequence) -> Progress {
        self.highest_applied = self.highest_applied.max(sequence);
        self.check()
    }

    /// Evaluate completion without a new delivery.
    pub fn check(&mut self) -> Progress {
        if !caught_up(self.highest_applied, self.watermark) {
            return Progress::Pending {
                remaining: self.watermark.remaining_after(self.highest_applied),
            };
        }
        if self.fired {
            Progress::AlreadyCompleted
        } else {
            self.fired = true;
            Progress::Completed
        }
    }

    pub fn watermark(&self) -> Watermark {
        self.watermark
    }

    pub fn highest_applied(&self) -> Sequence {
        self.highest_applied
    }

    /// Whether completion has been signalled.
    pub fn is_complete(&self) -> bool {
        self.fired
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn empty_watermark_completes_at_subscription() {
        let mut detector = CompletionDetector::new(Watermark::EMPTY);
        assert_eq!(detector.check(), Progress::Completed);
        assert!(detector.is_complete());
        assert_eq!(detector.check(), Progress::AlreadyCompleted);
    }

    #[test]
    fn completes_on_entry_reaching_watermark() {
        let mut detector = CompletionDetector::new(Watermark::new(3));
        assert_eq!(detector.check(), Progress::Pending { remaining: 3 });
        assert_eq!(detector.observe(Sequence::new(1)), Progress::Pending { remaining: 2 });
        assert_eq!(detector.observe(Sequence::new(2)), Progress::Pending { remaining: 1 });
        assert_eq!(detector.observe(Sequence::new(3)), Progress::Completed);
        assert_eq!(detector.observe(Sequence::new(4)), Progress::AlreadyCompleted);
    }

    #[test]
    fn overshooting_the_watermark_completes() {
        let mut detector = CompletionDetector::new(Watermark::new(2));
        assert_eq!(detector.observe(Sequence::new(5)), Progress::Completed);
    }

    #[test]
    fn highest_applied_never_moves_backwards() {
        let mut detector = CompletionDetector::new(Watermark::new(10));
        detector.observe(Sequence::new(6));
        detector.observe(Sequence::new(2));
        assert_eq!(detector.highest_applied(), Sequence::new(6));
    }

    #[test]
    fn caught_up_ignores_everything_but_positions() {
        assert!(caught_up(Sequence::ZERO, Watermark::EMPTY));
        assert!(!caught_up(Sequence::new(4), Watermark::new(5)));
        assert!(caught_up(Sequence::new(5), Watermark::new(5)));
    }

    proptest! {
        #[test]
        fn fires_exactly_once_at_first_reach(
            watermark in 0u64..50,
            observations in prop::collection::vec(0u64..60, 0..80),
        ) {
            let mut detector = CompletionDetector::new(Watermark::new(watermark));
            let mut fired = 0usize;
            let mut previous = Sequence::ZERO;
            let mut expected_first = None;
            let mut running_max = 0u64;

            for (i, seq) in observations.iter().enumerate() {
                running_max = running_max.max(*seq);
                if expected_first.is_none() && running_max >= watermark {
                    expected_first = Some(i);
                }
                let progress = detector.observe(Sequence::new(*seq));
                prop_assert!(detector.highest_applied() >= previous);
                previous = detector.highest_applied();
                if progress == Progress::Completed {
                    fired += 1;
                    prop_assert_eq!(Some(i), expected_first);
                }
            }

            let reached = observations.iter().any(|s| *s >= watermark);
            prop_assert_eq!(fired, usize::from(reached));
        }
    }
}
