use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};

/// Period of the countdown tick source
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum PomoEvent {
    Key(KeyEvent),
    Resize,
    /// The wait expired without input; due ticks should be polled
    Wake,
}

/// Source of terminal events (keyboard, resize, etc.)
pub trait PomoEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<PomoEvent, RecvTimeoutError>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    rx: Receiver<PomoEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            match event::read() {
                // windows reports releases too
                Ok(CtEvent::Key(key)) if key.kind != KeyEventKind::Release => {
                    if tx.send(PomoEvent::Key(key)).is_err() {
                        break;
                    }
                }
                Ok(CtEvent::Resize(_, _)) => {
                    if tx.send(PomoEvent::Resize).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PomoEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<PomoEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    /// Longest the runner may sleep while no tick is due
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<PomoEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<PomoEvent>) -> Self {
        Self { rx }
    }
}

impl PomoEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<PomoEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Identifies one scheduled tick source
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TickHandle(u64);

impl TickHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// "Schedule repeating callback every period; cancel by handle"
pub trait TickScheduler {
    fn schedule_repeating(&mut self, period: Duration) -> TickHandle;
    fn cancel(&mut self, handle: TickHandle);
    /// Handle of the tick that is due at `now`, advancing its deadline by one period
    fn poll_due(&mut self, now: Instant) -> Option<TickHandle>;
    /// How long until the next tick is due, `None` when nothing is scheduled
    fn time_until_due(&self, now: Instant) -> Option<Duration>;
}

#[derive(Clone, Copy, Debug)]
struct Armed {
    handle: TickHandle,
    period: Duration,
    next_due: Instant,
}

/// Deadline based scheduler holding at most one repeating tick
#[derive(Debug, Default)]
pub struct IntervalScheduler {
    armed: Option<Armed>,
    next_id: u64,
}

impl IntervalScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_at(&mut self, period: Duration, start: Instant) -> TickHandle {
        self.next_id += 1;
        let handle = TickHandle(self.next_id);
        // replaces any armed tick
        self.armed = Some(Armed {
            handle,
            period,
            next_due: start + period,
        });
        handle
    }

    pub fn active(&self) -> Option<TickHandle> {
        self.armed.map(|a| a.handle)
    }
}

impl TickScheduler for IntervalScheduler {
    fn schedule_repeating(&mut self, period: Duration) -> TickHandle {
        self.schedule_at(period, Instant::now())
    }

    fn cancel(&mut self, handle: TickHandle) {
        if self.active() == Some(handle) {
            self.armed = None;
        }
    }

    fn poll_due(&mut self, now: Instant) -> Option<TickHandle> {
        let armed = self.armed.as_mut()?;
        if now < armed.next_due {
            return None;
        }
        armed.next_due += armed.period;
        Some(armed.handle)
    }

    fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.armed
            .map(|a| a.next_due.saturating_duration_since(now))
    }
}

/// Runner that advances the application one event at a time
pub struct Runner<E: PomoEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: PomoEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks until the next event, the next due tick or the ticker interval,
    /// whichever comes first. Returns Wake on timeout.
    pub fn step(&self, until_due: Option<Duration>) -> PomoEvent {
        let timeout = until_due
            .map(|d| d.min(self.ticker.interval()))
            .unwrap_or_else(|| self.ticker.interval());

        match self.event_source.recv_timeout(timeout) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) => PomoEvent::Wake,
            Err(RecvTimeoutError::Disconnected) => {
                // keep the countdown honest even if input went away
                std::thread::sleep(timeout);
                PomoEvent::Wake
            }
        }
    }
}
