//! Exit code constants for the statelock CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config, default workspace deletion)
//! - 2: Object store failure (transport errors, exhausted read retries, failed uploads)
//! - 3: Lock failure (conflict, mismatch, missing lock, mutex failures)
//! - 4: Stuck lock (an unlock failed and the state may need a force-unlock)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid configuration, or a forbidden operation.
pub const USER_ERROR: i32 = 1;

/// Object store failure.
pub const STORE_FAILURE: i32 = 2;

/// Lock acquisition or release failure.
pub const LOCK_FAILURE: i32 = 3;

/// A lock could not be released and may now be stuck.
pub const STUCK_LOCK: i32 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [SUCCESS, USER_ERROR, STORE_FAILURE, LOCK_FAILURE, STUCK_LOCK];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }

    #[test]
    fn success_is_zero() {
        assert_eq!(SUCCESS, 0);
    }
}
