//! Tick-driven timer scheduling.
//!
//! The runtime is single-threaded and cooperative: "later" always means a
//! later [`Scheduler::advance`] call, never another thread. Deferred actions
//! are plain data rather than closures so the caller applies them with
//! whatever mutable context it holds at tick time.

use std::time::Duration;

/// Cancellation token for a scheduled action
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

struct Timer<A> {
    token: TimerToken,
    due: Duration,
    action: A,
}

/// Ordered list of pending timed actions driven by the host's frame tick.
pub struct Scheduler<A> {
    now: Duration,
    next_token: u64,
    timers: Vec<Timer<A>>,
}

impl<A> Scheduler<A> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_token: 1,
            timers: Vec::new(),
        }
    }

    /// Elapsed scheduler time
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Schedule `action` to come due after `delay`
    pub fn after(&mut self, delay: Duration, action: A) -> TimerToken {
        let token = TimerToken(self.next_token);
        self.next_token += 1;
        self.timers.push(Timer {
            token,
            due: self.now + delay,
            action,
        });
        token
    }

    /// Cancel a pending action. Returns false if it already fired or was
    /// cancelled before.
    pub fn cancel(&mut self, token: TimerToken) -> bool {
        if let Some(idx) = self.timers.iter().position(|t| t.token == token) {
            self.timers.swap_remove(idx);
            true
        } else {
            false
        }
    }

    /// Advance the clock and drain every action that came due, in due-time
    /// order (ties break by registration order).
    pub fn advance(&mut self, dt: Duration) -> Vec<A> {
        self.now += dt;
        let now = self.now;

        let mut due: Vec<(Duration, u64, A)> = Vec::new();
        let mut i = 0;
        while i < self.timers.len() {
            if self.timers[i].due <= now {
                let t = self.timers.swap_remove(i);
                due.push((t.due, t.token.0, t.action));
            } else {
                i += 1;
            }
        }
        due.sort_by_key(|(d, tok, _)| (*d, *tok));
        due.into_iter().map(|(_, _, a)| a).collect()
    }

    /// Number of pending timers
    pub fn pending(&self) -> usize {
        self.timers.len()
    }
}

impl<A> Default for Scheduler<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_in_order() {
        let mut sched: Scheduler<u32> = Scheduler::new();
        sched.after(Duration::from_secs(2), 2);
        sched.after(Duration::from_secs(1), 1);
        sched.after(Duration::from_secs(3), 3);

        let fired = sched.advance(Duration::from_secs(2));
        assert_eq!(fired, vec![1, 2]);
        let fired = sched.advance(Duration::from_secs(1));
        assert_eq!(fired, vec![3]);
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn test_cancel() {
        let mut sched: Scheduler<&str> = Scheduler::new();
        let token = sched.after(Duration::from_secs(1), "boom");
        assert!(sched.cancel(token));
        assert!(!sched.cancel(token));
        assert!(sched.advance(Duration::from_secs(5)).is_empty());
    }

    #[test]
    fn test_tie_breaks_by_registration() {
        let mut sched: Scheduler<u32> = Scheduler::new();
        sched.after(Duration::from_secs(1), 10);
        sched.after(Duration::from_secs(1), 20);
        let fired = sched.advance(Duration::from_secs(1));
        assert_eq!(fired, vec![10, 20]);
    }
}
