//! Idle timeout
//!
//! Fires a callback once after a period without user activity on the
//! monitored targets. Activity and time both arrive as inputs:
//!
//! ```text
//!            start             deadline passed
//! Stopped ──────────▶ Watching ───────────────▶ Fired
//!    ▲                 │  ▲                       │
//!    └──── stop ───────┘  └─ activity (restart)   │
//!    └──────────────────── stop ──────────────────┘
//! ```

use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

use tracing::debug;

/// Idle timeout used until one is configured, in seconds
pub const DEFAULT_IDLE_SECS: u32 = 90;

/// Kind of user input that counts as activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    PointerMove,
    KeyDown,
    Click,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 3] = [
        ActivityKind::PointerMove,
        ActivityKind::KeyDown,
        ActivityKind::Click,
    ];
}

/// One input event, tagged with the surface it happened on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEvent {
    pub target: String,
    pub kind: ActivityKind,
}

impl ActivityEvent {
    pub fn new(target: impl Into<String>, kind: ActivityKind) -> Self {
        Self {
            target: target.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleState {
    Stopped,
    Watching,
    Fired,
}

type Callback = Box<dyn FnMut() + Send>;
type CountdownSink = Box<dyn FnMut(u32) + Send>;

/// Inactivity timer for one screen at a time
pub struct IdleTimeoutController {
    state: IdleState,
    timeout: Duration,
    deadline: Option<Instant>,
    listeners: HashSet<(String, ActivityKind)>,
    on_timeout: Option<Callback>,
    countdown: Option<CountdownSink>,
    last_shown: Option<u32>,
}

impl fmt::Debug for IdleTimeoutController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleTimeoutController")
            .field("state", &self.state)
            .field("timeout", &self.timeout)
            .field("deadline", &self.deadline)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for IdleTimeoutController {
    fn default() -> Self {
        Self::new()
    }
}

impl IdleTimeoutController {
    pub fn new() -> Self {
        Self {
            state: IdleState::Stopped,
            timeout: Duration::from_secs(u64::from(DEFAULT_IDLE_SECS)),
            deadline: None,
            listeners: HashSet::new(),
            on_timeout: None,
            countdown: None,
            last_shown: None,
        }
    }

    /// Bind the timeout action and duration without starting
    ///
    /// A zero timeout keeps the current one.
    pub fn init<F>(&mut self, callback: F, timeout_secs: u32)
    where
        F: FnMut() + Send + 'static,
    {
        self.on_timeout = Some(Box::new(callback));
        if timeout_secs > 0 {
            self.timeout = Duration::from_secs(u64::from(timeout_secs));
        }
    }

    /// Where remaining seconds are shown
    pub fn bind_countdown<F>(&mut self, sink: F)
    where
        F: FnMut(u32) + Send + 'static,
    {
        self.countdown = Some(Box::new(sink));
    }

    pub fn state(&self) -> IdleState {
        self.state
    }

    pub fn timeout_secs(&self) -> u32 {
        self.timeout.as_secs() as u32
    }

    /// Start watching `targets`, replacing any previous ones
    pub fn start(&mut self, targets: &[&str], now: Instant) {
        self.listeners = targets
            .iter()
            .flat_map(|target| {
                ActivityKind::ALL
                    .into_iter()
                    .map(move |kind| (target.to_string(), kind))
            })
            .collect();
        self.state = IdleState::Watching;
        self.restart(now);
        debug!(targets = targets.len(), timeout = ?self.timeout, "idle timer started");
    }

    /// Report user input; restarts the countdown if it is being watched
    pub fn activity(&mut self, event: &ActivityEvent, now: Instant) -> bool {
        if self.state != IdleState::Watching {
            return false;
        }
        if !self
            .listeners
            .contains(&(event.target.clone(), event.kind))
        {
            return false;
        }
        self.restart(now);
        true
    }

    /// Advance time; returns true on the tick that fires the timeout
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.state != IdleState::Watching {
            return false;
        }
        let Some(deadline) = self.deadline else {
            return false;
        };

        if now >= deadline {
            self.state = IdleState::Fired;
            self.deadline = None;
            self.listeners.clear();
            self.show(0);
            debug!("idle timeout fired");
            if let Some(callback) = self.on_timeout.as_mut() {
                callback();
            }
            return true;
        }

        let remaining = self.remaining(now);
        self.show(remaining);
        false
    }

    /// Cancel the countdown and stop listening
    pub fn stop(&mut self) {
        if self.state != IdleState::Stopped {
            debug!("idle timer stopped");
        }
        self.state = IdleState::Stopped;
        self.deadline = None;
        self.listeners.clear();
        self.last_shown = None;
    }

    /// Whole seconds left, rounded up; zero unless watching
    pub fn remaining(&self, now: Instant) -> u32 {
        match self.deadline {
            Some(deadline) if self.state == IdleState::Watching => {
                let left = deadline.saturating_duration_since(now);
                let secs = left.as_secs() + u64::from(left.subsec_nanos() > 0);
                secs as u32
            }
            _ => 0,
        }
    }

    fn restart(&mut self, now: Instant) {
        self.deadline = Some(now + self.timeout);
        self.last_shown = None;
        self.show(self.timeout_secs());
    }

    fn show(&mut self, secs: u32) {
        if self.last_shown == Some(secs) {
            return;
        }
        self.last_shown = Some(secs);
        if let Some(sink) = self.countdown.as_mut() {
            sink(secs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn counting(timeout: u32) -> (IdleTimeoutController, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let mut idle = IdleTimeoutController::new();
        idle.init(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            timeout,
        );
        (idle, fired)
    }

    #[test]
    fn test_fires_exactly_once() {
        let t0 = Instant::now();
        let (mut idle, fired) = counting(10);
        idle.start(&["screen"], t0);

        assert!(!idle.tick(t0 + secs(9)));
        assert!(idle.tick(t0 + secs(10)));
        assert!(!idle.tick(t0 + secs(11)));
        assert!(!idle.tick(t0 + secs(100)));

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(idle.state(), IdleState::Fired);
    }

    #[test]
    fn test_activity_restarts_full_duration() {
        let t0 = Instant::now();
        let (mut idle, fired) = counting(10);
        idle.start(&["screen"], t0);

        let event = ActivityEvent::new("screen", ActivityKind::KeyDown);
        assert!(idle.activity(&event, t0 + secs(8)));

        assert!(!idle.tick(t0 + secs(17)));
        assert_eq!(idle.remaining(t0 + secs(17)), 1);
        assert!(idle.tick(t0 + secs(18)));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unmonitored_activity_is_ignored() {
        let t0 = Instant::now();
        let (mut idle, fired) = counting(5);
        idle.start(&["settings"], t0);

        let elsewhere = ActivityEvent::new("overlay", ActivityKind::Click);
        assert!(!idle.activity(&elsewhere, t0 + secs(4)));
        assert!(idle.tick(t0 + secs(5)));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_cancels() {
        let t0 = Instant::now();
        let (mut idle, fired) = counting(5);
        idle.start(&["screen"], t0);
        idle.stop();

        assert!(!idle.tick(t0 + secs(60)));
        assert!(!idle.activity(&ActivityEvent::new("screen", ActivityKind::Click), t0));
        assert_eq!(idle.remaining(t0), 0);
        assert_eq!(idle.state(), IdleState::Stopped);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_restart_after_fire() {
        let t0 = Instant::now();
        let (mut idle, fired) = counting(5);
        idle.start(&["screen"], t0);
        idle.tick(t0 + secs(5));

        // Activity after firing does nothing until started again
        assert!(!idle.activity(&ActivityEvent::new("screen", ActivityKind::KeyDown), t0 + secs(6)));

        idle.start(&["screen"], t0 + secs(6));
        assert!(idle.tick(t0 + secs(11)));
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_start_replaces_targets() {
        let t0 = Instant::now();
        let (mut idle, _fired) = counting(5);
        idle.start(&["old"], t0);
        idle.start(&["new"], t0);

        assert!(!idle.activity(&ActivityEvent::new("old", ActivityKind::Click), t0));
        assert!(idle.activity(&ActivityEvent::new("new", ActivityKind::PointerMove), t0));
    }

    #[test]
    fn test_zero_timeout_keeps_default() {
        let (idle, _fired) = counting(0);
        assert_eq!(idle.timeout_secs(), DEFAULT_IDLE_SECS);

        let (mut idle, _fired) = counting(30);
        idle.init(|| {}, 0);
        assert_eq!(idle.timeout_secs(), 30);
    }

    #[test]
    fn test_countdown_display() {
        let t0 = Instant::now();
        let shown = Arc::new(Mutex::new(Vec::new()));
        let sink = shown.clone();

        let (mut idle, _fired) = counting(3);
        idle.bind_countdown(move |s| sink.lock().unwrap().push(s));
        idle.start(&["screen"], t0);

        idle.tick(t0 + Duration::from_millis(500));
        idle.tick(t0 + secs(1));
        idle.tick(t0 + Duration::from_millis(1500));
        idle.tick(t0 + secs(2));
        idle.tick(t0 + secs(3));

        assert_eq!(*shown.lock().unwrap(), vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_remaining_rounds_up() {
        let t0 = Instant::now();
        let (mut idle, _fired) = counting(10);
        idle.start(&["screen"], t0);

        assert_eq!(idle.remaining(t0), 10);
        assert_eq!(idle.remaining(t0 + Duration::from_millis(100)), 10);
        assert_eq!(idle.remaining(t0 + secs(1)), 9);
    }
}
