use crate::timer::{format_clock, Mode};

/// What the timer controls should currently read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    pub mode: Mode,
    pub running: bool,
}

impl ControlState {
    pub fn start_label(&self) -> &'static str {
        if self.running {
            "Pause"
        } else {
            "Start"
        }
    }

    pub fn toggle_label(&self) -> &'static str {
        self.mode.toggle_label()
    }
}

/// Where the controller pushes everything the user should see
pub trait DisplaySink {
    fn show_time(&mut self, clock: &str);
    fn show_status(&mut self, status: &str);
    fn set_title(&mut self, title: &str);
    fn show_controls(&mut self, _controls: ControlState) {}
}

/// Latest values pushed by the controller, read back by the TUI renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenModel {
    pub clock: String,
    pub status: String,
    pub title: String,
    pub controls: ControlState,
    title_dirty: bool,
}

impl Default for ScreenModel {
    fn default() -> Self {
        Self {
            clock: format_clock(0),
            status: String::new(),
            title: String::new(),
            controls: ControlState {
                mode: Mode::Work,
                running: false,
            },
            title_dirty: false,
        }
    }
}

impl ScreenModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// The new title if it changed since the last call
    pub fn take_title(&mut self) -> Option<&str> {
        if self.title_dirty {
            self.title_dirty = false;
            Some(&self.title)
        } else {
            None
        }
    }
}

impl DisplaySink for ScreenModel {
    fn show_time(&mut self, clock: &str) {
        self.clock = clock.to_string();
    }

    fn show_status(&mut self, status: &str) {
        self.status = status.to_string();
    }

    fn set_title(&mut self, title: &str) {
        if self.title != title {
            self.title = title.to_string();
            self.title_dirty = true;
        }
    }

    fn show_controls(&mut self, controls: ControlState) {
        self.controls = controls;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_is_taken_once_per_change() {
        let mut model = ScreenModel::new();
        model.set_title("(25:00) Pomodoro Timer");
        assert_eq!(model.take_title(), Some("(25:00) Pomodoro Timer"));
        assert_eq!(model.take_title(), None);

        // same title again is not a change
        model.set_title("(25:00) Pomodoro Timer");
        assert_eq!(model.take_title(), None);

        model.set_title("(24:59) Pomodoro Timer");
        assert_eq!(model.take_title(), Some("(24:59) Pomodoro Timer"));
    }

    #[test]
    fn test_control_labels() {
        let idle = ControlState {
            mode: Mode::Work,
            running: false,
        };
        assert_eq!(idle.start_label(), "Start");
        assert_eq!(idle.toggle_label(), "Rest Mode");

        let running = ControlState {
            mode: Mode::Rest,
            running: true,
        };
        assert_eq!(running.start_label(), "Pause");
        assert_eq!(running.toggle_label(), "Work Mode");
    }
}
