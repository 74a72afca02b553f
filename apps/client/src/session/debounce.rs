use std::time::Duration;

use tokio::task::JoinHandle;

/// Identifies one scheduled firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken(u64);

struct Pending {
    token: TimerToken,
    handle: JoinHandle<()>,
}

/// Cancellable quiet-period timer. Holds at most one live schedule.
///
/// Scheduling again replaces the pending one. A firing whose token is no
/// longer current (the callback raced a reschedule) is rejected by `claim`.
pub struct DebouncedTrigger {
    quiet_period: Duration,
    next_token: u64,
    pending: Option<Pending>,
}

impl DebouncedTrigger {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            next_token: 0,
            pending: None,
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Runs `on_fire` once the quiet period passes without another `schedule` or `cancel`.
    pub fn schedule<F>(&mut self, on_fire: F) -> TimerToken
    where
        F: FnOnce(TimerToken) + Send + 'static,
    {
        self.cancel();

        self.next_token += 1;
        let token = TimerToken(self.next_token);
        let delay = self.quiet_period;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire(token);
        });

        self.pending = Some(Pending { token, handle });
        token
    }

    /// Returns true if something was pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Accepts a firing if it belongs to the live schedule, consuming it.
    pub fn claim(&mut self, token: TimerToken) -> bool {
        match &self.pending {
            Some(pending) if pending.token == token => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}

impl Drop for DebouncedTrigger {
    fn drop(&mut self) {
        self.cancel();
    }
}
