use std::{
    thread,
    time::{Duration, Instant},
};

use tracing::trace;

/// Paces a loop to a fixed interval.
///
/// Deadlines advance by whole intervals. If a tick runs over, the schedule
/// is restarted from now instead of bursting to catch up.
#[derive(Debug)]
pub struct Ticker {
    interval: Duration,
    deadline: Instant,
}

impl Ticker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: Instant::now(),
        }
    }

    pub fn from_hz(hz: f64) -> Self {
        Self::new(Duration::from_secs_f64(1.0 / hz))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn wait(&mut self) {
        self.deadline += self.interval;

        let now = Instant::now();
        if self.deadline <= now {
            trace!(
                "Loop over ran by {:.4}s",
                (now - self.deadline).as_secs_f32()
            );
            self.deadline = now;
            return;
        }

        thread::sleep(self.deadline - now);
    }
}
