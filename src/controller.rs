use std::time::Instant;

use tracing::{debug, info};

use crate::display::{ControlState, DisplaySink};
use crate::notify::{NotificationDispatcher, PermissionOutcome};
use crate::runtime::{TickHandle, TickScheduler, TICK_PERIOD};
use crate::timer::{format_clock, format_title, Mode, TimerConfig, TimerState};

/// The countdown state machine. Owns its collaborators; every transition is
/// pushed to the display sink before the method returns.
pub struct TimerController<D: DisplaySink, S: TickScheduler> {
    config: TimerConfig,
    state: TimerState,
    display: D,
    scheduler: S,
    dispatcher: NotificationDispatcher,
    tick: Option<TickHandle>,
}

impl<D: DisplaySink, S: TickScheduler> TimerController<D, S> {
    pub fn new(
        config: TimerConfig,
        focus_label: String,
        display: D,
        scheduler: S,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        let state = TimerState::new(&config, focus_label);
        let mut controller = Self {
            config,
            state,
            display,
            scheduler,
            dispatcher,
            tick: None,
        };
        controller.refresh_time();
        controller.refresh_status();
        controller.refresh_controls();
        controller
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// Handle of the one live tick source, if running
    pub fn active_tick(&self) -> Option<TickHandle> {
        self.tick
    }

    pub fn toggle_start_pause(&mut self) {
        if self.state.is_running {
            self.pause();
        } else {
            self.start();
        }
    }

    pub fn start(&mut self) {
        if self.state.is_running {
            return;
        }
        self.state.is_running = true;
        self.tick = Some(self.scheduler.schedule_repeating(TICK_PERIOD));
        info!(
            "started {} with {} left",
            self.state.mode,
            format_clock(self.state.remaining_seconds)
        );
        self.refresh_controls();
    }

    pub fn pause(&mut self) {
        self.stop_ticking();
        info!("paused at {}", format_clock(self.state.remaining_seconds));
        self.refresh_controls();
    }

    pub fn reset(&mut self) {
        self.stop_ticking();
        self.state.remaining_seconds = self.config.duration(self.state.mode);
        self.refresh_time();
        self.refresh_status();
        self.refresh_controls();
    }

    /// Manual switch; always leaves the timer paused and never notifies
    pub fn toggle_mode(&mut self) {
        self.stop_ticking();
        self.state.mode = self.state.mode.flipped();
        self.state.remaining_seconds = self.config.duration(self.state.mode);
        info!("switched to {} mode", self.state.mode);
        self.refresh_time();
        self.refresh_status();
        self.refresh_controls();
    }

    /// Normalizes the raw field values; an idle timer picks up the new duration at once
    pub fn set_durations(&mut self, work_minutes_raw: &str, rest_minutes_raw: &str) -> TimerConfig {
        self.config = TimerConfig::from_raw(work_minutes_raw, rest_minutes_raw);
        debug!(
            "durations set to {}s/{}s",
            self.config.work_duration_seconds(),
            self.config.rest_duration_seconds()
        );
        if !self.state.is_running {
            self.state.remaining_seconds = self.config.duration(self.state.mode);
            self.refresh_time();
        }
        self.config
    }

    pub fn set_focus_label(&mut self, label: &str) {
        self.state.focus_label = label.trim().to_string();
        if self.state.mode == Mode::Work {
            self.refresh_status();
        }
    }

    pub fn on_tick(&mut self, handle: TickHandle, now: Instant) {
        if let Some(prior) = self.advance(handle) {
            self.dispatcher.notify_interval_end(prior, now);
        }
    }

    /// Deliver every tick due at `now`, then close expired notifications.
    /// Several expiries caught up in one call announce only the last one.
    pub fn drive(&mut self, now: Instant) {
        let mut last_expired = None;
        while let Some(handle) = self.scheduler.poll_due(now) {
            if let Some(prior) = self.advance(handle) {
                last_expired = Some(prior);
            }
        }
        if let Some(prior) = last_expired {
            self.dispatcher.notify_interval_end(prior, now);
        }
        self.dispatcher.sweep(now);
    }

    pub fn request_notifications(&mut self, now: Instant) -> PermissionOutcome {
        self.dispatcher.request_permission(now)
    }

    /// Time until the runner has to wake up for a tick or a dismissal
    pub fn next_wake_in(&self, now: Instant) -> Option<std::time::Duration> {
        let tick = self.scheduler.time_until_due(now);
        let dismissal = self.dispatcher.next_dismissal_in(now);
        match (tick, dismissal) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// One countdown step; returns the finished mode when the step expired it
    fn advance(&mut self, handle: TickHandle) -> Option<Mode> {
        if !self.state.is_running || self.tick != Some(handle) {
            debug!("ignoring stale tick {}", handle.id());
            return None;
        }

        self.state.remaining_seconds = self.state.remaining_seconds.saturating_sub(1);
        let expired = if self.state.remaining_seconds == 0 {
            Some(self.expire())
        } else {
            None
        };
        self.refresh_time();
        expired
    }

    /// Flip to the next interval. The caller announces `prior`, whose message
    /// names the interval that starts now.
    fn expire(&mut self) -> Mode {
        let prior = self.state.mode;
        self.state.mode = prior.flipped();
        self.state.remaining_seconds = self.config.duration(self.state.mode);
        info!("{} interval finished, starting {}", prior, self.state.mode);
        self.refresh_status();
        self.refresh_controls();
        prior
    }

    fn stop_ticking(&mut self) {
        self.state.is_running = false;
        if let Some(handle) = self.tick.take() {
            self.scheduler.cancel(handle);
        }
    }

    fn refresh_time(&mut self) {
        let remaining = self.state.remaining_seconds;
        self.display.show_time(&format_clock(remaining));
        self.display.set_title(&format_title(remaining));
    }

    fn refresh_status(&mut self) {
        self.display.show_status(&self.state.status_text());
    }

    fn refresh_controls(&mut self) {
        self.display.show_controls(ControlState {
            mode: self.state.mode,
            running: self.state.is_running,
        });
    }
}
