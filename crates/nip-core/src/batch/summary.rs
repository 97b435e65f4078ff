use std::path::PathBuf;
use std::time::Duration;

/// Final accounting for one batch run. Every manifest item lands in
/// exactly one of the three counters.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub succeeded: u64,
    /// Items that exhausted every endpoint and retry, or timed out waiting
    /// for admission. Each has one failure ledger entry.
    pub failed: u64,
    /// Items never run because the batch stopped admitting early.
    pub skipped: u64,
    /// True when the batch stopped admitting before the manifest was done
    /// (stop signal, or first failure without continue-on-error).
    pub aborted: bool,
    pub elapsed: Duration,
    pub success_ledger: PathBuf,
    /// Created lazily; the file exists only when `failed > 0`.
    pub failure_ledger: PathBuf,
}

impl BatchSummary {
    /// True when every item ran and none failed.
    pub fn clean(&self) -> bool {
        self.failed == 0 && self.skipped == 0 && !self.aborted
    }

    pub fn total(&self) -> u64 {
        self.succeeded + self.failed + self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(succeeded: u64, failed: u64, skipped: u64, aborted: bool) -> BatchSummary {
        BatchSummary {
            succeeded,
            failed,
            skipped,
            aborted,
            elapsed: Duration::from_secs(1),
            success_ledger: PathBuf::from("x-succeeded.txt"),
            failure_ledger: PathBuf::from("x-failed.txt"),
        }
    }

    #[test]
    fn clean_means_everything_ran_and_passed() {
        assert!(summary(3, 0, 0, false).clean());
        assert!(!summary(3, 1, 0, false).clean());
        assert!(!summary(3, 0, 1, true).clean());
    }

    #[test]
    fn total_accounts_for_every_item() {
        assert_eq!(summary(2, 1, 3, true).total(), 6);
    }
}
