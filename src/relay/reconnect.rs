// Reconnect / timeout policy for a dialed (client-mode) connection.
//
// Owned by the `Connection` itself rather than the supervisor: the
// supervisor only asks "is it time to dial again" and "which address".

/// Outcome of a tick against a `RetryPolicy`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryTick {
    /// Keep waiting; still within `reconnect_interval`
    Wait,
    /// Dial `address` now
    DialNow { address_index: usize },
    /// `reconnect_count` has been exhausted; stop retrying
    GiveUp,
}

/// Per-dialed-connection retry state: address rotation, connect timeout,
/// and a bounded (or unbounded) retry counter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    address_count: usize,
    next_address: usize,
    /// Seconds to allow a single TCP connect attempt before abandoning it
    pub connection_timeout: f32,
    /// Seconds to wait between the end of one attempt and the start of
    /// the next
    pub reconnect_interval: f32,
    /// Remaining attempts; `None` means unlimited (`reconnect_count == 0`
    /// in the configuration)
    remaining_attempts: Option<u32>,
    /// Seconds elapsed since the last attempt ended
    elapsed_since_attempt: f32,
    /// Whether a dial is due on the very next tick (first attempt, or the
    /// wait interval has just elapsed)
    dial_due: bool,
}

impl RetryPolicy {
    pub fn new(
        address_count: usize,
        connection_timeout: f32,
        reconnect_interval: f32,
        reconnect_count: u32,
    ) -> RetryPolicy {
        RetryPolicy {
            address_count: address_count.max(1),
            next_address: 0,
            connection_timeout,
            reconnect_interval,
            remaining_attempts: if reconnect_count == 0 {
                None
            } else {
                Some(reconnect_count)
            },
            elapsed_since_attempt: 0.0,
            dial_due: true,
        }
    }

    /// A completed handshake resets the attempt counter: a connection
    /// that proved itself live no longer counts against the budget.
    pub fn reset_on_handshake_done(&mut self, reconnect_count: u32) {
        self.remaining_attempts = if reconnect_count == 0 {
            None
        } else {
            Some(reconnect_count)
        };
    }

    /// Called once a dial attempt has ended (succeeded then later closed,
    /// or failed/timed out outright). Starts the `reconnect_interval`
    /// countdown and consumes one attempt from the budget.
    pub fn attempt_ended(&mut self) {
        self.elapsed_since_attempt = 0.0;
        self.dial_due = self.reconnect_interval <= 0.0;

        if let Some(remaining) = self.remaining_attempts {
            self.remaining_attempts = Some(remaining.saturating_sub(1));
        }
    }

    /// Advances the wait clock by `delta_seconds` and reports whether a
    /// dial should happen now.
    pub fn tick(&mut self, delta_seconds: f32) -> RetryTick {
        if let Some(0) = self.remaining_attempts {
            return RetryTick::GiveUp;
        }

        if self.dial_due {
            let index = self.next_address;
            self.next_address = (self.next_address + 1) % self.address_count;
            self.dial_due = false;
            return RetryTick::DialNow { address_index: index };
        }

        self.elapsed_since_attempt += delta_seconds;
        if self.elapsed_since_attempt >= self.reconnect_interval {
            self.dial_due = true;
        }

        RetryTick::Wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dials_immediately_on_first_tick() {
        let mut policy = RetryPolicy::new(2, 5.0, 1.0, 0);
        assert_eq!(policy.tick(0.0), RetryTick::DialNow { address_index: 0 });
    }

    #[test]
    fn rotates_addresses_round_robin() {
        let mut policy = RetryPolicy::new(3, 5.0, 0.0, 0);
        assert_eq!(policy.tick(0.0), RetryTick::DialNow { address_index: 0 });
        policy.attempt_ended();
        assert_eq!(policy.tick(0.0), RetryTick::DialNow { address_index: 1 });
        policy.attempt_ended();
        assert_eq!(policy.tick(0.0), RetryTick::DialNow { address_index: 2 });
        policy.attempt_ended();
        assert_eq!(policy.tick(0.0), RetryTick::DialNow { address_index: 0 });
    }

    #[test]
    fn waits_reconnect_interval_between_attempts() {
        let mut policy = RetryPolicy::new(1, 5.0, 2.0, 0);
        policy.tick(0.0);
        policy.attempt_ended();

        assert_eq!(policy.tick(1.0), RetryTick::Wait);
        assert_eq!(policy.tick(1.0), RetryTick::DialNow { address_index: 0 });
    }

    #[test]
    fn gives_up_after_reconnect_count_attempts() {
        let mut policy = RetryPolicy::new(1, 5.0, 0.0, 2);

        assert_eq!(policy.tick(0.0), RetryTick::DialNow { address_index: 0 });
        policy.attempt_ended();
        assert_eq!(policy.tick(0.0), RetryTick::DialNow { address_index: 0 });
        policy.attempt_ended();
        assert_eq!(policy.tick(0.0), RetryTick::GiveUp);
    }

    #[test]
    fn handshake_done_resets_the_budget() {
        let mut policy = RetryPolicy::new(1, 5.0, 0.0, 1);
        policy.tick(0.0);
        policy.attempt_ended();
        assert_eq!(policy.tick(0.0), RetryTick::GiveUp);

        policy.reset_on_handshake_done(1);
        assert_eq!(policy.tick(0.0), RetryTick::DialNow { address_index: 0 });
    }
}
