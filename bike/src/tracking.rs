//! Ride tracking driven by the two handlebar buttons
//!
//! Button 1 starts and stops a ride, button 2 pauses and resumes it. Losing
//! the GPS fix shows the ride as stopped, but it picks up again in the same
//! file once the fix comes back.

use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use common::types::{gps::Position, tracking::TrackingState};
use tracing::{info, warn};

/// Minimum spacing between two position samples in the track file
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(2);

/// Rising edges seen this tick
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Presses {
    pub track: bool,
    pub pause: bool,
}

/// Raw button levels from the previous inbound frame
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Buttons {
    pub track: bool,
    pub pause: bool,
}

impl Buttons {
    pub fn presses(&self, now: Buttons) -> Presses {
        Presses {
            track: now.track && !self.track,
            pause: now.pause && !self.pause,
        }
    }
}

/// What the tracker knows about a usable fix
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TrackFix {
    pub position: Position,
    /// Fix time on the rider's wall clock, used to name new files
    pub local_time: NaiveDateTime,
}

/// Work for the track logger, in order
#[derive(Debug, Clone, PartialEq)]
pub enum LogAction {
    Start(NaiveDateTime),
    Sample(Position),
    Paused,
    Finish,
}

#[derive(Debug, Default)]
pub struct Tracker {
    state: TrackingState,
    /// The rider has a ride going that is only stopped because the fix is gone
    resume_on_fix: bool,
    file_open: bool,
    last_sample: Option<Instant>,
    paused_written: bool,
}

impl Tracker {
    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn resume_pending(&self) -> bool {
        self.resume_on_fix && self.state == TrackingState::Stopped
    }

    /// Advances one tick.
    ///
    /// Buttons are handled first, then the fix is reconciled, then sampling.
    pub fn update(
        &mut self,
        presses: Presses,
        fix: Option<TrackFix>,
        now: Instant,
    ) -> Vec<LogAction> {
        let mut actions = Vec::new();

        if presses.track {
            self.toggle_ride(fix, &mut actions);
        }

        if presses.pause {
            self.toggle_pause();
        }

        self.reconcile_fix(fix, &mut actions);

        if let Some(fix) = fix {
            self.sample(fix, now, &mut actions);
        }

        actions
    }

    fn toggle_ride(&mut self, fix: Option<TrackFix>, actions: &mut Vec<LogAction>) {
        if self.state != TrackingState::Stopped {
            info!("Tracking stopped");

            self.state = TrackingState::Stopped;
            self.resume_on_fix = false;

            if self.file_open {
                self.file_open = false;
                actions.push(LogAction::Finish);
            }

            return;
        }

        if self.resume_on_fix {
            // Same ride, still waiting on the fix
            info!("Tracking continues once the GPS fix is back");
        } else {
            info!("Tracking started");
            self.last_sample = None;
        }

        self.state = TrackingState::Tracking;
        self.resume_on_fix = true;

        match fix {
            Some(fix) if !self.file_open => {
                self.file_open = true;
                actions.push(LogAction::Start(fix.local_time));
            }
            Some(_) => {}
            None => {
                info!("No fix yet, track file will be created once there is one");
            }
        }
    }

    fn toggle_pause(&mut self) {
        self.state = match self.state {
            TrackingState::Tracking => {
                info!("Tracking paused");
                TrackingState::Paused
            }
            TrackingState::Paused => {
                info!("Tracking resumed");
                TrackingState::Tracking
            }
            TrackingState::Stopped => TrackingState::Stopped,
        };
    }

    fn reconcile_fix(&mut self, fix: Option<TrackFix>, actions: &mut Vec<LogAction>) {
        match (fix, self.state) {
            (None, TrackingState::Tracking | TrackingState::Paused) => {
                warn!("Lost GPS fix while tracking, will resume when it returns");

                self.state = TrackingState::Stopped;
            }
            (Some(fix), TrackingState::Stopped) if self.resume_on_fix => {
                info!("GPS fix is back, resuming tracking");

                // A paused ride comes back as tracking
                self.state = TrackingState::Tracking;

                if !self.file_open {
                    self.file_open = true;
                    actions.push(LogAction::Start(fix.local_time));
                }
            }
            _ => {}
        }
    }

    fn sample(&mut self, fix: TrackFix, now: Instant, actions: &mut Vec<LogAction>) {
        if self.state != TrackingState::Paused {
            self.paused_written = false;
        }

        match self.state {
            TrackingState::Tracking => {
                let due = self
                    .last_sample
                    .map_or(true, |last| now.saturating_duration_since(last) >= SAMPLE_INTERVAL);

                if due {
                    self.last_sample = Some(now);
                    actions.push(LogAction::Sample(fix.position));
                }
            }
            TrackingState::Paused => {
                if !self.paused_written {
                    self.paused_written = true;
                    actions.push(LogAction::Paused);
                }
            }
            TrackingState::Stopped => {}
        }
    }
}
