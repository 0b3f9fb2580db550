//! The named deployment tasks.

use std::time::Duration;

use alloy_core::primitives::Address;

use crate::task::DeployTask;

/// Name of the TimeLock contract.
pub const TIMELOCK_CONTRACT: &str = "TimeLock";

/// Name of the TimeLock test harness contract.
pub const TEST_TIMELOCK_CONTRACT: &str = "TestTimeLock";

/// Confirmations awaited by `deploy-timelock`.
pub const TIMELOCK_CONFIRMATIONS: u64 = 5;

/// Delay before verifying in `deploy-timelock`.
pub const TIMELOCK_VERIFY_DELAY: Duration = Duration::from_secs(60);

/// Confirmations awaited by `deploy-testTimelock`.
pub const TEST_TIMELOCK_CONFIRMATIONS: u64 = 5;

/// Delay before verifying in `deploy-testTimelock`.
pub const TEST_TIMELOCK_VERIFY_DELAY: Duration = Duration::from_secs(10);

/// `deploy-timelock`: deploy and verify `TimeLock`, which takes no constructor arguments.
pub fn deploy_timelock() -> DeployTask {
    DeployTask::new(TIMELOCK_CONTRACT)
        .confirmations(TIMELOCK_CONFIRMATIONS)
        .verify_delay(TIMELOCK_VERIFY_DELAY)
}

/// `deploy-testTimelock`: deploy and verify `TestTimeLock` against an existing TimeLock.
pub fn deploy_test_timelock(timelock: Address) -> DeployTask {
    DeployTask::new(TEST_TIMELOCK_CONTRACT)
        .constructor_args(vec![timelock.to_string()])
        .task_arg("timelock", timelock)
        .confirmations(TEST_TIMELOCK_CONFIRMATIONS)
        .verify_delay(TEST_TIMELOCK_VERIFY_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deploy_timelock() {
        let task = deploy_timelock();
        assert_eq!(task.contract, "TimeLock");
        assert!(task.constructor_args.is_empty());
        assert!(task.task_args.is_empty());
        assert_eq!(task.confirmations, 5);
        assert_eq!(task.verify_delay, Duration::from_secs(60));
    }

    #[test]
    fn test_deploy_test_timelock_passes_address() {
        let timelock = Address::repeat_byte(0x42);
        let task = deploy_test_timelock(timelock);

        assert_eq!(task.contract, "TestTimeLock");
        assert_eq!(task.constructor_args, vec![timelock.to_string()]);
        assert_eq!(
            task.task_args,
            vec![("timelock".to_string(), timelock.to_string())]
        );
        assert_eq!(task.confirmations, 5);
        assert_eq!(task.verify_delay, Duration::from_secs(10));
    }
}
