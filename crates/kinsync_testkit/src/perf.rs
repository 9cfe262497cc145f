//! Performance check: runs an operation against a time and memory budget.

use kinsync_core::EntityStore;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Something whose memory footprint can be sampled.
pub trait MemoryGauge {
    /// Current footprint in bytes.
    fn current_bytes(&self) -> usize;
}

impl MemoryGauge for EntityStore {
    fn current_bytes(&self) -> usize {
        self.estimated_bytes()
    }
}

/// A gauge that always reads zero, for time-only budgets.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMemoryGauge;

impl MemoryGauge for NoMemoryGauge {
    fn current_bytes(&self) -> usize {
        0
    }
}

/// Limits an operation must stay within.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerformanceBudget {
    /// Longest acceptable wall-clock duration.
    pub max_duration: Duration,
    /// Largest acceptable growth of the gauged footprint.
    pub max_memory_bytes: usize,
}

impl PerformanceBudget {
    /// Creates a budget.
    pub fn new(max_duration: Duration, max_memory_bytes: usize) -> Self {
        Self {
            max_duration,
            max_memory_bytes,
        }
    }

    /// A budget with no memory limit.
    pub fn time_only(max_duration: Duration) -> Self {
        Self::new(max_duration, usize::MAX)
    }
}

/// Outcome of a measured operation.
#[derive(Debug, Clone)]
pub struct PerformanceReport<T> {
    /// The operation's return value.
    pub result: T,
    /// Measured wall-clock duration.
    pub duration: Duration,
    /// Footprint after minus footprint before, in bytes.
    pub memory_delta: i64,
    /// Whether the duration stayed within budget.
    pub within_time: bool,
    /// Whether the memory growth stayed within budget.
    pub within_memory: bool,
}

impl<T> PerformanceReport<T> {
    /// True when both limits were respected.
    pub fn passed(&self) -> bool {
        self.within_time && self.within_memory
    }
}

/// Measures operations against a [`PerformanceBudget`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceMonitor;

impl PerformanceMonitor {
    /// Runs `op`, sampling `gauge` before and after.
    pub fn measure<T, F>(budget: PerformanceBudget, gauge: &dyn MemoryGauge, op: F) -> PerformanceReport<T>
    where
        F: FnOnce() -> T,
    {
        let before = gauge.current_bytes();
        let start = Instant::now();
        let result = op();
        let duration = start.elapsed();
        let after = gauge.current_bytes();

        let memory_delta = after as i64 - before as i64;
        let growth = usize::try_from(memory_delta.max(0)).unwrap_or(usize::MAX);
        let report = PerformanceReport {
            result,
            duration,
            memory_delta,
            within_time: duration <= budget.max_duration,
            within_memory: growth <= budget.max_memory_bytes,
        };

        if report.passed() {
            debug!(?duration, memory_delta, "operation within budget");
        } else {
            warn!(
                ?duration,
                max_duration = ?budget.max_duration,
                memory_delta,
                max_memory_bytes = budget.max_memory_bytes,
                "operation over budget"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinsync_core::{EntityKind, Family, UserProfile};
    use std::cell::Cell;

    struct StepGauge {
        reads: Cell<usize>,
        step: usize,
    }

    impl MemoryGauge for StepGauge {
        fn current_bytes(&self) -> usize {
            let n = self.reads.get();
            self.reads.set(n + 1);
            n * self.step
        }
    }

    #[test]
    fn fast_operation_passes() {
        let report = PerformanceMonitor::measure(
            PerformanceBudget::time_only(Duration::from_secs(5)),
            &NoMemoryGauge,
            || 21 * 2,
        );
        assert!(report.passed());
        assert_eq!(report.result, 42);
        assert_eq!(report.memory_delta, 0);
    }

    #[test]
    fn slow_operation_fails_time_budget() {
        let report = PerformanceMonitor::measure(
            PerformanceBudget::time_only(Duration::from_millis(1)),
            &NoMemoryGauge,
            || std::thread::sleep(Duration::from_millis(20)),
        );
        assert!(!report.within_time);
        assert!(!report.passed());
    }

    #[test]
    fn memory_growth_is_checked() {
        let gauge = StepGauge {
            reads: Cell::new(0),
            step: 4096,
        };
        let report = PerformanceMonitor::measure(
            PerformanceBudget::new(Duration::from_secs(5), 1024),
            &gauge,
            || (),
        );
        assert_eq!(report.memory_delta, 4096);
        assert!(report.within_time);
        assert!(!report.within_memory);
    }

    #[test]
    fn store_footprint_grows_with_records() {
        let store = EntityStore::in_memory();
        let owner = store
            .create_user_profile(UserProfile::new("Owner", "hash-owner"))
            .unwrap();

        let report = PerformanceMonitor::measure(
            PerformanceBudget::new(Duration::from_secs(30), 64 * 1024 * 1024),
            &store,
            || {
                for i in 0..100 {
                    store
                        .create_family(Family::new(format!("Family {i}"), format!("CODE{i}"), owner.id))
                        .unwrap();
                }
            },
        );
        assert!(report.passed());
        assert!(report.memory_delta > 0);
        assert_eq!(store.count(EntityKind::Family), 100);
    }
}
