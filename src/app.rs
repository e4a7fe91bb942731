use std::time::Instant;

use chrono::{DateTime, Duration as ChronoDuration, Local};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::debug;

use crate::controller::TimerController;
use crate::display::ScreenModel;
use crate::form::{FormEvent, InputForm};
use crate::runtime::IntervalScheduler;

pub type PomoController = TimerController<ScreenModel, IntervalScheduler>;

/// Discrete commands from the keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartPause,
    Reset,
    ToggleMode,
    RequestNotifications,
    Quit,
}

/// Key map used while no input field is active
pub fn command_for(key: &KeyEvent) -> Option<Command> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Command::Quit);
    }
    match key.code {
        KeyCode::Char(' ') => Some(Command::StartPause),
        KeyCode::Char('r') | KeyCode::Char('R') => Some(Command::Reset),
        KeyCode::Char('m') | KeyCode::Char('M') => Some(Command::ToggleMode),
        KeyCode::Char('n') | KeyCode::Char('N') => Some(Command::RequestNotifications),
        KeyCode::Char('q') | KeyCode::Esc => Some(Command::Quit),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Continue,
    Quit,
}

pub struct App {
    pub controller: PomoController,
    pub form: InputForm,
    /// One-shot message, cleared by the next key press
    pub flash: Option<String>,
}

impl App {
    pub fn new(controller: PomoController, form: InputForm) -> Self {
        Self {
            controller,
            form,
            flash: None,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> AppAction {
        self.flash = None;

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return AppAction::Quit;
        }

        match key.code {
            KeyCode::Tab => {
                let event = self.form.focus_next();
                self.apply_form_event(event);
                return AppAction::Continue;
            }
            KeyCode::BackTab => {
                let event = self.form.focus_prev();
                self.apply_form_event(event);
                return AppAction::Continue;
            }
            _ => {}
        }

        if self.form.is_editing() {
            let event = match key.code {
                KeyCode::Esc => self.form.blur(),
                KeyCode::Enter => self.form.submit(),
                KeyCode::Backspace => {
                    self.form.backspace();
                    None
                }
                KeyCode::Char(c) => {
                    self.form.insert(c);
                    None
                }
                _ => None,
            };
            self.apply_form_event(event);
            return AppAction::Continue;
        }

        match command_for(&key) {
            Some(command) => self.handle_command(command, now),
            None => AppAction::Continue,
        }
    }

    pub fn handle_command(&mut self, command: Command, now: Instant) -> AppAction {
        debug!("command {:?}", command);
        match command {
            Command::StartPause => self.controller.toggle_start_pause(),
            Command::Reset => self.controller.reset(),
            Command::ToggleMode => self.controller.toggle_mode(),
            Command::RequestNotifications => {
                let outcome = self.controller.request_notifications(now);
                self.flash = Some(outcome.message().to_string());
            }
            Command::Quit => return AppAction::Quit,
        }
        AppAction::Continue
    }

    fn apply_form_event(&mut self, event: Option<FormEvent>) {
        match event {
            Some(FormEvent::DurationsChanged { work, rest }) => {
                let config = self.controller.set_durations(&work, &rest);
                self.form.set_minutes(
                    config.work_duration_seconds() / 60,
                    config.rest_duration_seconds() / 60,
                );
            }
            Some(FormEvent::FocusCommitted(label)) => self.controller.set_focus_label(&label),
            None => {}
        }
    }

    /// Wall-clock time the running interval ends, as HH:MM
    pub fn ends_at(&self, now: DateTime<Local>) -> Option<String> {
        let state = self.controller.state();
        if !state.is_running {
            return None;
        }
        let end = now + ChronoDuration::seconds(i64::from(state.remaining_seconds));
        Some(end.format("%H:%M").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Silent;
    use crate::notify::{MemoryNotifier, NotificationDispatcher, Permission};
    use crate::timer::{Mode, TimerConfig};
    use chrono::TimeZone;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn test_app(permission: Permission) -> (App, MemoryNotifier) {
        let notifier = MemoryNotifier::new(permission);
        let dispatcher =
            NotificationDispatcher::new(Box::new(notifier.clone()), Box::new(Silent));
        let controller = TimerController::new(
            TimerConfig::default(),
            String::new(),
            ScreenModel::new(),
            IntervalScheduler::new(),
            dispatcher,
        );
        (App::new(controller, InputForm::new("", "25", "5")), notifier)
    }

    #[test]
    fn test_key_map() {
        assert_eq!(command_for(&key(KeyCode::Char(' '))), Some(Command::StartPause));
        assert_eq!(command_for(&key(KeyCode::Char('r'))), Some(Command::Reset));
        assert_eq!(command_for(&key(KeyCode::Char('m'))), Some(Command::ToggleMode));
        assert_eq!(
            command_for(&key(KeyCode::Char('n'))),
            Some(Command::RequestNotifications)
        );
        assert_eq!(command_for(&key(KeyCode::Esc)), Some(Command::Quit));
        assert_eq!(
            command_for(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Command::Quit)
        );
        assert_eq!(command_for(&key(KeyCode::Char('x'))), None);
    }

    #[test]
    fn test_space_starts_and_pauses() {
        let (mut app, _) = test_app(Permission::Granted);
        let now = Instant::now();
        assert_eq!(app.handle_key(key(KeyCode::Char(' ')), now), AppAction::Continue);
        assert!(app.controller.state().is_running);
        app.handle_key(key(KeyCode::Char(' ')), now);
        assert!(!app.controller.state().is_running);
    }

    #[test]
    fn test_quit_keys() {
        let (mut app, _) = test_app(Permission::Granted);
        let now = Instant::now();
        assert_eq!(app.handle_key(key(KeyCode::Char('q')), now), AppAction::Quit);
        assert_eq!(
            app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), now),
            AppAction::Quit
        );
    }

    #[test]
    fn test_typing_into_field_does_not_trigger_commands() {
        let (mut app, _) = test_app(Permission::Granted);
        let now = Instant::now();
        app.handle_key(key(KeyCode::Tab), now);
        for c in "read q and r".chars() {
            assert_eq!(app.handle_key(key(KeyCode::Char(c)), now), AppAction::Continue);
        }
        assert!(!app.controller.state().is_running);
        assert_eq!(app.controller.state().remaining_seconds, 1500);

        app.handle_key(key(KeyCode::Enter), now);
        assert_eq!(app.controller.display().status, "read q and r");
    }

    #[test]
    fn test_focus_label_survives_reset_and_toggle_without_enter() {
        let (mut app, _) = test_app(Permission::Granted);
        let now = Instant::now();
        app.handle_key(key(KeyCode::Tab), now);
        for c in "inbox".chars() {
            app.handle_key(key(KeyCode::Char(c)), now);
        }
        // tab away instead of enter
        app.handle_key(key(KeyCode::Tab), now);
        app.handle_key(key(KeyCode::Esc), now);

        app.handle_key(key(KeyCode::Char('r')), now);
        assert_eq!(app.controller.display().status, "inbox");

        app.handle_key(key(KeyCode::Char('m')), now);
        app.handle_key(key(KeyCode::Char('m')), now);
        assert_eq!(app.controller.state().focus_label, "inbox");
        assert_eq!(app.controller.display().status, "inbox");
    }

    #[test]
    fn test_esc_leaves_field_before_quitting() {
        let (mut app, _) = test_app(Permission::Granted);
        let now = Instant::now();
        app.handle_key(key(KeyCode::Tab), now);
        assert_eq!(app.handle_key(key(KeyCode::Esc), now), AppAction::Continue);
        assert!(!app.form.is_editing());
        assert_eq!(app.handle_key(key(KeyCode::Esc), now), AppAction::Quit);
    }

    #[test]
    fn test_editing_work_minutes_updates_idle_timer() {
        let (mut app, _) = test_app(Permission::Granted);
        let now = Instant::now();
        app.handle_key(key(KeyCode::Tab), now);
        app.handle_key(key(KeyCode::Tab), now);
        app.handle_key(key(KeyCode::Backspace), now);
        app.handle_key(key(KeyCode::Backspace), now);
        for c in "120".chars() {
            app.handle_key(key(KeyCode::Char(c)), now);
        }
        app.handle_key(key(KeyCode::Enter), now);

        assert_eq!(app.controller.state().remaining_seconds, 3600);
        assert_eq!(app.form.work, "60");
        assert_eq!(app.controller.display().clock, "60:00");
    }

    #[test]
    fn test_notification_request_sets_flash() {
        let (mut app, notifier) = test_app(Permission::Default);
        let now = Instant::now();
        app.handle_key(key(KeyCode::Char('n')), now);
        assert_eq!(app.flash.as_deref(), Some("Notifications enabled"));
        assert_eq!(notifier.shown_bodies().len(), 1);

        app.handle_key(key(KeyCode::Char('n')), now);
        assert_eq!(app.flash.as_deref(), Some("Notifications are already enabled"));

        // any key clears it
        app.handle_key(key(KeyCode::Char('x')), now);
        assert_eq!(app.flash, None);
    }

    #[test]
    fn test_mode_key_switches_and_pauses() {
        let (mut app, _) = test_app(Permission::Granted);
        let now = Instant::now();
        app.handle_key(key(KeyCode::Char(' ')), now);
        app.handle_key(key(KeyCode::Char('m')), now);
        assert_eq!(app.controller.state().mode, Mode::Rest);
        assert!(!app.controller.state().is_running);
        assert_eq!(app.controller.scheduler().active(), None);
    }

    #[test]
    fn test_drive_runs_real_scheduler() {
        let (mut app, notifier) = test_app(Permission::Granted);
        app.handle_command(Command::StartPause, Instant::now());
        let t0 = Instant::now();

        app.controller.drive(t0 + std::time::Duration::from_secs(1500));

        assert_eq!(app.controller.state().mode, Mode::Rest);
        assert_eq!(app.controller.state().remaining_seconds, 300);
        assert_eq!(notifier.shown_bodies(), vec!["Time to take a break!"]);
    }

    #[test]
    fn test_ends_at_only_while_running() {
        let (mut app, _) = test_app(Permission::Granted);
        let now = Local.with_ymd_and_hms(2024, 5, 1, 9, 50, 0).unwrap();
        assert_eq!(app.ends_at(now), None);

        app.handle_command(Command::StartPause, Instant::now());
        assert_eq!(app.ends_at(now).as_deref(), Some("10:15"));
    }
}
