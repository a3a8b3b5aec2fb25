//! A virtual-clock timer service for suspended strands.
//!
//! The executor itself knows nothing about time. Nodes like `delayNode` find a
//! [`TimerQueue`] on the host, schedule their continuation tokens on it and suspend.
//! Whoever owns the queue advances the clock and feeds the due tokens back through
//! [`GraphExecutor::continue_flow`].

use crate::executor::{ExecutionToken, GraphExecutor};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
struct Timer {
    due: f64,
    seq: u64,
    token: ExecutionToken,
}

#[derive(Debug, Default)]
struct TimerState {
    now: f64,
    next_seq: u64,
    timers: Vec<Timer>,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    state: Mutex<TimerState>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Parks `token` until the clock has advanced by `delay` seconds.
    pub fn schedule(&self, delay: f64, token: ExecutionToken) {
        let delay = if delay.is_finite() && delay > 0.0 {
            delay
        } else {
            0.0
        };
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        let due = state.now + delay;
        tracing::debug!(token = %token.id(), due, "timer scheduled");
        state.timers.push(Timer { due, seq, token });
    }

    pub fn now(&self) -> f64 {
        self.lock().now
    }

    pub fn pending_count(&self) -> usize {
        self.lock().timers.len()
    }

    /// Moves the clock forward and returns the tokens that became due, earliest first.
    pub fn advance(&self, seconds: f64) -> Vec<ExecutionToken> {
        let mut state = self.lock();
        if seconds.is_finite() && seconds > 0.0 {
            state.now += seconds;
        }
        Self::take_due(&mut state)
    }

    /// Jumps the clock to the earliest pending timer and returns every token due then.
    pub fn advance_to_next(&self) -> Vec<ExecutionToken> {
        let mut state = self.lock();
        let next = state
            .timers
            .iter()
            .map(|timer| timer.due)
            .fold(f64::INFINITY, f64::min);
        if next.is_finite() && next > state.now {
            state.now = next;
        }
        Self::take_due(&mut state)
    }

    /// Drops every pending timer, e.g. when the host goes away. Returns how many were dropped.
    pub fn cancel_all(&self) -> usize {
        let mut state = self.lock();
        let dropped = state.timers.len();
        state.timers.clear();
        dropped
    }

    /// Resumes due tokens on `executor` until no timer is left. Returns how many
    /// tokens were resumed.
    pub fn run_until_idle(&self, executor: &mut GraphExecutor) -> usize {
        let mut resumed = 0;
        loop {
            let due = self.advance_to_next();
            if due.is_empty() {
                return resumed;
            }
            for token in due {
                resumed += 1;
                executor.continue_flow(token);
            }
        }
    }

    fn take_due(state: &mut TimerState) -> Vec<ExecutionToken> {
        let now = state.now;
        let (mut due, pending): (Vec<Timer>, Vec<Timer>) = std::mem::take(&mut state.timers)
            .into_iter()
            .partition(|timer| timer.due <= now);
        state.timers = pending;
        due.sort_by(|a, b| a.due.total_cmp(&b.due).then(a.seq.cmp(&b.seq)));
        due.into_iter().map(|timer| timer.token).collect()
    }
}
