//! Screens and the rules for moving between them

use std::fmt;
use std::time::{Duration, Instant};

use crate::models::{TimerKind, ViewMode};

/// Double back-press window for leaving the kiosk
pub const EXIT_THRESHOLD: Duration = Duration::from_secs(2);

/// Every screen of the kiosk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    /// Public slideshow or list view
    View(ViewMode),
    /// Admin listing of records
    Settings,
    /// Item editor; `None` creates a new item
    EditItem { order: Option<u32> },
    /// Cover editor; `None` creates a new cover
    EditCover { order: Option<u32> },
    EditOrder,
    EditTimer,
}

impl Default for Screen {
    fn default() -> Self {
        Screen::View(ViewMode::Slide)
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Screen::View(ViewMode::Slide) => write!(f, "Slides"),
            Screen::View(ViewMode::List) => write!(f, "List"),
            Screen::Settings => write!(f, "Settings"),
            Screen::EditItem { order: None } => write!(f, "New item"),
            Screen::EditItem { order: Some(o) } => write!(f, "Edit item #{}", o),
            Screen::EditCover { order: None } => write!(f, "New cover"),
            Screen::EditCover { order: Some(o) } => write!(f, "Edit cover #{}", o),
            Screen::EditOrder => write!(f, "Edit order"),
            Screen::EditTimer => write!(f, "Timers"),
        }
    }
}

/// Which idle timer a screen runs and where it leads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdlePolicy {
    pub timer: TimerKind,
    pub target: Screen,
}

impl Screen {
    pub fn is_view(&self) -> bool {
        matches!(self, Screen::View(_))
    }

    pub fn is_editor(&self) -> bool {
        matches!(
            self,
            Screen::EditItem { .. } | Screen::EditCover { .. } | Screen::EditOrder | Screen::EditTimer
        )
    }

    /// Idle behaviour on this screen; `home` is the last visited view
    ///
    /// The slideshow is itself the idle display and runs no timer.
    pub fn idle_policy(&self, home: ViewMode) -> Option<IdlePolicy> {
        match self {
            Screen::View(ViewMode::Slide) => None,
            Screen::View(ViewMode::List) => Some(IdlePolicy {
                timer: TimerKind::Home,
                target: Screen::View(ViewMode::Slide),
            }),
            Screen::Settings => Some(IdlePolicy {
                timer: TimerKind::Home,
                target: Screen::View(home),
            }),
            _ => Some(IdlePolicy {
                timer: TimerKind::Back,
                target: Screen::Settings,
            }),
        }
    }

    /// Where the back action leads, `None` from the public views
    pub fn parent(&self, home: ViewMode) -> Option<Screen> {
        match self {
            Screen::View(_) => None,
            Screen::Settings => Some(Screen::View(home)),
            _ => Some(Screen::Settings),
        }
    }

    /// Surface whose input counts as activity for the idle timer
    pub fn activity_target(&self) -> &'static str {
        match self {
            Screen::View(ViewMode::Slide) => "slides",
            Screen::View(ViewMode::List) => "view-list",
            Screen::Settings => "slider-edit",
            Screen::EditItem { .. } => "item-edit",
            Screen::EditCover { .. } => "cover-edit",
            Screen::EditOrder => "order-edit",
            Screen::EditTimer => "timer-edit",
        }
    }
}

/// Outcome of a back press on a public view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDecision {
    /// Second press inside the window
    Exit,
    /// First press; tell the user to press again
    Warn,
}

/// Requires two back presses within [`EXIT_THRESHOLD`] to exit
#[derive(Debug, Clone, Copy)]
pub struct ExitGuard {
    last_press: Option<Instant>,
    threshold: Duration,
}

impl Default for ExitGuard {
    fn default() -> Self {
        Self::new(EXIT_THRESHOLD)
    }
}

impl ExitGuard {
    pub fn new(threshold: Duration) -> Self {
        Self {
            last_press: None,
            threshold,
        }
    }

    pub fn press(&mut self, now: Instant) -> ExitDecision {
        match self.last_press {
            Some(last) if now.saturating_duration_since(last) < self.threshold => {
                self.last_press = None;
                ExitDecision::Exit
            }
            _ => {
                self.last_press = Some(now);
                ExitDecision::Warn
            }
        }
    }

    /// Whether the "press again" hint should still be visible
    pub fn is_armed(&self, now: Instant) -> bool {
        matches!(self.last_press, Some(last) if now.saturating_duration_since(last) < self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_policy_per_screen() {
        let home = ViewMode::List;

        assert_eq!(Screen::View(ViewMode::Slide).idle_policy(home), None);
        assert_eq!(
            Screen::View(ViewMode::List).idle_policy(home),
            Some(IdlePolicy {
                timer: TimerKind::Home,
                target: Screen::View(ViewMode::Slide)
            })
        );
        assert_eq!(
            Screen::Settings.idle_policy(home),
            Some(IdlePolicy {
                timer: TimerKind::Home,
                target: Screen::View(ViewMode::List)
            })
        );
        for screen in [
            Screen::EditItem { order: Some(1) },
            Screen::EditCover { order: None },
            Screen::EditOrder,
            Screen::EditTimer,
        ] {
            assert_eq!(
                screen.idle_policy(home),
                Some(IdlePolicy {
                    timer: TimerKind::Back,
                    target: Screen::Settings
                })
            );
        }
    }

    #[test]
    fn test_parent() {
        assert_eq!(Screen::View(ViewMode::Slide).parent(ViewMode::Slide), None);
        assert_eq!(
            Screen::Settings.parent(ViewMode::List),
            Some(Screen::View(ViewMode::List))
        );
        assert_eq!(
            Screen::EditTimer.parent(ViewMode::Slide),
            Some(Screen::Settings)
        );
    }

    #[test]
    fn test_exit_guard_double_press() {
        let t0 = Instant::now();
        let mut guard = ExitGuard::default();

        assert_eq!(guard.press(t0), ExitDecision::Warn);
        assert!(guard.is_armed(t0 + Duration::from_secs(1)));
        assert_eq!(
            guard.press(t0 + Duration::from_millis(1500)),
            ExitDecision::Exit
        );
    }

    #[test]
    fn test_exit_guard_slow_presses_warn() {
        let t0 = Instant::now();
        let mut guard = ExitGuard::default();

        assert_eq!(guard.press(t0), ExitDecision::Warn);
        assert!(!guard.is_armed(t0 + Duration::from_secs(2)));
        assert_eq!(guard.press(t0 + Duration::from_secs(2)), ExitDecision::Warn);
        assert_eq!(
            guard.press(t0 + Duration::from_secs(3)),
            ExitDecision::Exit
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Screen::EditItem { order: Some(3) }.to_string(), "Edit item #3");
        assert_eq!(Screen::default().to_string(), "Slides");
    }
}
