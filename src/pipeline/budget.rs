//! Wall-clock deadline shared by every stage of one run.
//!
//! The guard is polled, never preemptive: a check happens before each unit of
//! page work, and work already in flight is allowed to finish.

use std::time::{Duration, Instant};

/// A single deadline set when the run starts.
///
/// `Copy`, so concurrent page workers each hold the same start instant and
/// agree on when the budget ran out.
#[derive(Debug, Clone, Copy)]
pub struct TimeBudget {
    start: Instant,
    budget: Duration,
}

impl TimeBudget {
    /// Start the clock now.
    pub fn start(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::start(Duration::from_secs(secs))
    }

    /// `true` once elapsed time reaches the budget. A zero budget is exhausted
    /// from the start.
    pub fn is_exhausted(&self) -> bool {
        self.start.elapsed() >= self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.start.elapsed())
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_budget_is_exhausted_immediately() {
        let b = TimeBudget::from_secs(0);
        assert!(b.is_exhausted());
        assert_eq!(b.remaining(), Duration::ZERO);
    }

    #[test]
    fn generous_budget_is_not_exhausted() {
        let b = TimeBudget::from_secs(3600);
        assert!(!b.is_exhausted());
        assert!(b.remaining() > Duration::from_secs(3500));
    }

    #[test]
    fn copies_share_the_deadline() {
        let a = TimeBudget::start(Duration::from_millis(1));
        let b = a;
        std::thread::sleep(Duration::from_millis(5));
        assert!(a.is_exhausted());
        assert!(b.is_exhausted());
    }
}
