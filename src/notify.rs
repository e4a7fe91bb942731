use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::audio::AudioCue;
use crate::timer::Mode;

pub const NOTIFICATION_TITLE: &str = "Pomodoro Timer";
pub const NOTIFICATION_TAG: &str = "pomodoro-notification";
pub const NOTIFICATION_ICON: &str = "alarm-clock";
/// Shown notifications are closed after this long
pub const DISMISS_AFTER: Duration = Duration::from_secs(5);

const TO_BREAK: &str = "Time to take a break!";
const TO_WORK: &str = "Time to get back to work!";

/// Permission model of the notification capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Permission {
    Unsupported,
    /// Not requested yet
    Default,
    Granted,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub body: String,
    pub tag: &'static str,
    pub icon: &'static str,
    pub timeout: Duration,
}

impl Notice {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            tag: NOTIFICATION_TAG,
            icon: NOTIFICATION_ICON,
            timeout: DISMISS_AFTER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationHandle(u64);

impl NotificationHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifications are not permitted (permission: {0})")]
    NotPermitted(Permission),
    #[error("notification backend failed: {0}")]
    Backend(#[from] notify_rust::error::Error),
    #[error("{0}")]
    Other(String),
}

/// System notification capability
pub trait NotificationCapability {
    fn permission(&self) -> Permission;
    /// Ask for permission; returns the permission afterwards
    fn request_permission(&mut self) -> Permission;
    fn show(&mut self, notice: &Notice) -> Result<NotificationHandle, NotifyError>;
    fn dismiss(&mut self, handle: NotificationHandle);
}

/// Body text announcing the interval that follows `prior`
pub fn interval_end_message(prior: Mode) -> &'static str {
    match prior {
        Mode::Work => TO_BREAK,
        Mode::Rest => TO_WORK,
    }
}

/// Desktop notifications through notify-rust.
///
/// A desktop has no permission prompt, so "granted" means the user opted in,
/// either with `--notifications on` or by requesting it from the TUI.
pub struct DesktopNotifier {
    permission: Permission,
    next_id: u64,
    #[cfg(all(unix, not(target_os = "macos")))]
    live: std::collections::HashMap<u64, notify_rust::NotificationHandle>,
}

impl DesktopNotifier {
    pub fn new(initial: Permission) -> Self {
        let permission = if Self::server_available() {
            initial
        } else {
            Permission::Unsupported
        };
        info!("desktop notifications: {}", permission);

        Self {
            permission,
            next_id: 0,
            #[cfg(all(unix, not(target_os = "macos")))]
            live: std::collections::HashMap::new(),
        }
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    fn server_available() -> bool {
        match notify_rust::get_server_information() {
            Ok(server) => {
                debug!("notification server: {} {}", server.name, server.version);
                true
            }
            Err(e) => {
                warn!("no notification server: {}", e);
                false
            }
        }
    }

    #[cfg(not(all(unix, not(target_os = "macos"))))]
    fn server_available() -> bool {
        true
    }
}

impl NotificationCapability for DesktopNotifier {
    fn permission(&self) -> Permission {
        self.permission
    }

    fn request_permission(&mut self) -> Permission {
        if self.permission == Permission::Default {
            self.permission = Permission::Granted;
        }
        self.permission
    }

    fn show(&mut self, notice: &Notice) -> Result<NotificationHandle, NotifyError> {
        if self.permission != Permission::Granted {
            return Err(NotifyError::NotPermitted(self.permission));
        }

        let mut notification = notify_rust::Notification::new();
        notification
            .summary(&notice.title)
            .body(&notice.body)
            .appname("pomo")
            .icon(notice.icon)
            .timeout(notify_rust::Timeout::Milliseconds(
                notice.timeout.as_millis() as u32,
            ));

        self.next_id += 1;
        let handle = NotificationHandle(self.next_id);

        #[cfg(all(unix, not(target_os = "macos")))]
        {
            // servers that honour these stack same-tag notifications in place
            notification
                .hint(notify_rust::Hint::Custom(
                    "x-dunst-stack-tag".to_string(),
                    notice.tag.to_string(),
                ))
                .hint(notify_rust::Hint::Custom(
                    "x-canonical-private-synchronous".to_string(),
                    notice.tag.to_string(),
                ));
            let shown = notification.show()?;
            self.live.insert(handle.id(), shown);
        }
        #[cfg(not(all(unix, not(target_os = "macos"))))]
        {
            notification.show().map(|_| ())?;
        }

        Ok(handle)
    }

    fn dismiss(&mut self, handle: NotificationHandle) {
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            if let Some(shown) = self.live.remove(&handle.id()) {
                shown.close();
            }
        }
        #[cfg(not(all(unix, not(target_os = "macos"))))]
        {
            debug!("notification {} left to expire", handle.id());
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryLog {
    pub shown: Vec<Notice>,
    pub dismissed: Vec<NotificationHandle>,
    pub requests: usize,
}

/// In-memory capability for headless runs and tests. Clones share one log.
#[derive(Debug, Clone)]
pub struct MemoryNotifier {
    permission: Rc<RefCell<Permission>>,
    /// permission a request resolves to when still Default
    grant_to: Permission,
    fail_show: bool,
    log: Rc<RefCell<MemoryLog>>,
}

impl MemoryNotifier {
    pub fn new(permission: Permission) -> Self {
        Self {
            permission: Rc::new(RefCell::new(permission)),
            grant_to: Permission::Granted,
            fail_show: false,
            log: Rc::new(RefCell::new(MemoryLog::default())),
        }
    }

    pub fn resolving_requests_to(mut self, permission: Permission) -> Self {
        self.grant_to = permission;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_show = true;
        self
    }

    pub fn shown_bodies(&self) -> Vec<String> {
        self.log.borrow().shown.iter().map(|n| n.body.clone()).collect()
    }

    pub fn dismissed(&self) -> Vec<NotificationHandle> {
        self.log.borrow().dismissed.clone()
    }

    pub fn requests(&self) -> usize {
        self.log.borrow().requests
    }
}

impl NotificationCapability for MemoryNotifier {
    fn permission(&self) -> Permission {
        *self.permission.borrow()
    }

    fn request_permission(&mut self) -> Permission {
        self.log.borrow_mut().requests += 1;
        let mut permission = self.permission.borrow_mut();
        if *permission == Permission::Default {
            *permission = self.grant_to;
        }
        *permission
    }

    fn show(&mut self, notice: &Notice) -> Result<NotificationHandle, NotifyError> {
        if self.fail_show {
            return Err(NotifyError::Other("display refused".to_string()));
        }
        let mut log = self.log.borrow_mut();
        log.shown.push(notice.clone());
        Ok(NotificationHandle(log.shown.len() as u64))
    }

    fn dismiss(&mut self, handle: NotificationHandle) {
        self.log.borrow_mut().dismissed.push(handle);
    }
}

/// Result of an explicit "enable notifications" action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    Unsupported,
    AlreadyDenied,
    AlreadyGranted,
    Granted,
    Declined,
}

impl PermissionOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            PermissionOutcome::Unsupported => "This terminal does not support notifications",
            PermissionOutcome::AlreadyDenied => {
                "Notifications are blocked; re-enable them with --notifications on"
            }
            PermissionOutcome::AlreadyGranted => "Notifications are already enabled",
            PermissionOutcome::Granted => "Notifications enabled",
            PermissionOutcome::Declined => "Notification request was declined",
        }
    }
}

/// Fires the end-of-interval notification and chime, and closes shown
/// notifications once their deadline passes
pub struct NotificationDispatcher {
    notifier: Box<dyn NotificationCapability>,
    audio: Box<dyn AudioCue>,
    /// shown notifications with their tag and dismissal deadline
    pending: Vec<(NotificationHandle, &'static str, Instant)>,
    last_error: Option<String>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Box<dyn NotificationCapability>, audio: Box<dyn AudioCue>) -> Self {
        Self {
            notifier,
            audio,
            pending: Vec::new(),
            last_error: None,
        }
    }

    pub fn permission(&self) -> Permission {
        self.notifier.permission()
    }

    pub fn notify_interval_end(&mut self, prior: Mode, now: Instant) {
        if self.notifier.permission() == Permission::Granted {
            let notice = Notice::new(NOTIFICATION_TITLE, interval_end_message(prior));
            self.show(&notice, now);
        } else {
            debug!(
                "skipping system notification, permission {}",
                self.notifier.permission()
            );
        }
        self.audio.play_cue();
    }

    /// Explicit user request; never called from expiry
    pub fn request_permission(&mut self, now: Instant) -> PermissionOutcome {
        let outcome = match self.notifier.permission() {
            Permission::Unsupported => PermissionOutcome::Unsupported,
            Permission::Denied => PermissionOutcome::AlreadyDenied,
            Permission::Granted => PermissionOutcome::AlreadyGranted,
            Permission::Default => match self.notifier.request_permission() {
                Permission::Granted => {
                    let notice = Notice::new(
                        "Notifications Enabled",
                        "You will now receive notifications when your timer ends",
                    );
                    self.show(&notice, now);
                    PermissionOutcome::Granted
                }
                Permission::Unsupported => PermissionOutcome::Unsupported,
                Permission::Default | Permission::Denied => PermissionOutcome::Declined,
            },
        };
        info!("notification request: {:?}", outcome);
        outcome
    }

    /// A notice replaces any still-open notification carrying the same tag
    fn show(&mut self, notice: &Notice, now: Instant) {
        let notifier = &mut self.notifier;
        self.pending.retain(|(handle, tag, _)| {
            if *tag == notice.tag {
                notifier.dismiss(*handle);
                false
            } else {
                true
            }
        });

        match self.notifier.show(notice) {
            Ok(handle) => {
                self.pending.push((handle, notice.tag, now + notice.timeout));
                self.last_error = None;
            }
            Err(e) => {
                warn!("failed to show notification: {}", e);
                self.last_error = Some(e.to_string());
            }
        }
    }

    /// Dismiss every notification whose deadline has passed
    pub fn sweep(&mut self, now: Instant) {
        let notifier = &mut self.notifier;
        self.pending.retain(|(handle, _, deadline)| {
            if now >= *deadline {
                notifier.dismiss(*handle);
                false
            } else {
                true
            }
        });
    }

    pub fn next_dismissal_in(&self, now: Instant) -> Option<Duration> {
        self.pending
            .iter()
            .map(|(_, _, deadline)| deadline.saturating_duration_since(now))
            .min()
    }

    pub fn control_label(&self) -> &'static str {
        match self.notifier.permission() {
            Permission::Unsupported => "Notifications Not Supported",
            Permission::Granted => "Notifications Enabled",
            Permission::Denied => "Notifications Blocked",
            Permission::Default => "Enable Notifications",
        }
    }

    pub fn control_enabled(&self) -> bool {
        self.notifier.permission() != Permission::Unsupported
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::cell::Cell;

    #[derive(Clone, Default)]
    struct CountingCue(Rc<Cell<usize>>);

    impl AudioCue for CountingCue {
        fn play_cue(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn dispatcher(notifier: &MemoryNotifier, cue: &CountingCue) -> NotificationDispatcher {
        NotificationDispatcher::new(Box::new(notifier.clone()), Box::new(cue.clone()))
    }

    #[test]
    fn test_interval_end_message_announces_next_interval() {
        assert_eq!(interval_end_message(Mode::Work), "Time to take a break!");
        assert_eq!(interval_end_message(Mode::Rest), "Time to get back to work!");
    }

    #[test]
    fn test_granted_shows_notification_and_chimes() {
        let notifier = MemoryNotifier::new(Permission::Granted);
        let cue = CountingCue::default();
        let mut d = dispatcher(&notifier, &cue);

        d.notify_interval_end(Mode::Work, Instant::now());

        assert_eq!(notifier.shown_bodies(), vec!["Time to take a break!"]);
        assert_eq!(cue.0.get(), 1);
    }

    #[test]
    fn test_denied_still_chimes() {
        for permission in [
            Permission::Denied,
            Permission::Default,
            Permission::Unsupported,
        ] {
            let notifier = MemoryNotifier::new(permission);
            let cue = CountingCue::default();
            let mut d = dispatcher(&notifier, &cue);

            d.notify_interval_end(Mode::Rest, Instant::now());

            assert!(notifier.shown_bodies().is_empty());
            assert_eq!(cue.0.get(), 1);
        }
    }

    #[test]
    fn test_show_failure_is_recorded_not_fatal() {
        let notifier = MemoryNotifier::new(Permission::Granted).failing();
        let cue = CountingCue::default();
        let mut d = dispatcher(&notifier, &cue);

        d.notify_interval_end(Mode::Work, Instant::now());

        assert_eq!(d.last_error(), Some("display refused"));
        assert_eq!(cue.0.get(), 1);
    }

    #[test]
    fn test_sweep_dismisses_after_deadline() {
        let notifier = MemoryNotifier::new(Permission::Granted);
        let cue = CountingCue::default();
        let mut d = dispatcher(&notifier, &cue);
        let t0 = Instant::now();

        d.notify_interval_end(Mode::Work, t0);
        assert_eq!(d.next_dismissal_in(t0), Some(DISMISS_AFTER));

        d.sweep(t0 + Duration::from_secs(4));
        assert!(notifier.dismissed().is_empty());

        d.sweep(t0 + DISMISS_AFTER);
        assert_eq!(notifier.dismissed(), vec![NotificationHandle::new(1)]);
        assert_eq!(d.next_dismissal_in(t0), None);
    }

    #[test]
    fn test_same_tag_replaces_open_notification() {
        let notifier = MemoryNotifier::new(Permission::Default);
        let cue = CountingCue::default();
        let mut d = dispatcher(&notifier, &cue);
        let t0 = Instant::now();

        d.request_permission(t0);
        d.notify_interval_end(Mode::Work, t0 + Duration::from_secs(2));

        assert_eq!(notifier.shown_bodies().len(), 2);
        assert_eq!(notifier.dismissed(), vec![NotificationHandle::new(1)]);
        // only the newer one is still waiting for its deadline
        assert_eq!(d.next_dismissal_in(t0), Some(Duration::from_secs(2) + DISMISS_AFTER));

        d.sweep(t0 + Duration::from_secs(2) + DISMISS_AFTER);
        assert_eq!(
            notifier.dismissed(),
            vec![NotificationHandle::new(1), NotificationHandle::new(2)]
        );
    }

    #[test]
    fn test_request_flow_outcomes() {
        let cue = CountingCue::default();

        let unsupported = MemoryNotifier::new(Permission::Unsupported);
        let mut d = dispatcher(&unsupported, &cue);
        assert_matches!(d.request_permission(Instant::now()), PermissionOutcome::Unsupported);
        assert!(!d.control_enabled());
        assert_eq!(d.control_label(), "Notifications Not Supported");

        let denied = MemoryNotifier::new(Permission::Denied);
        let mut d = dispatcher(&denied, &cue);
        assert_matches!(d.request_permission(Instant::now()), PermissionOutcome::AlreadyDenied);
        assert_eq!(denied.requests(), 0);

        let granted = MemoryNotifier::new(Permission::Granted);
        let mut d = dispatcher(&granted, &cue);
        assert_matches!(d.request_permission(Instant::now()), PermissionOutcome::AlreadyGranted);
        assert!(granted.shown_bodies().is_empty());
    }

    #[test]
    fn test_request_grant_shows_confirmation() {
        let cue = CountingCue::default();
        let notifier = MemoryNotifier::new(Permission::Default);
        let mut d = dispatcher(&notifier, &cue);
        assert_eq!(d.control_label(), "Enable Notifications");

        assert_matches!(d.request_permission(Instant::now()), PermissionOutcome::Granted);
        assert_eq!(notifier.requests(), 1);
        assert_eq!(
            notifier.shown_bodies(),
            vec!["You will now receive notifications when your timer ends"]
        );
        assert_eq!(d.control_label(), "Notifications Enabled");
        // the confirmation does not ring the chime
        assert_eq!(cue.0.get(), 0);
    }

    #[test]
    fn test_request_refused() {
        let cue = CountingCue::default();
        let notifier = MemoryNotifier::new(Permission::Default)
            .resolving_requests_to(Permission::Denied);
        let mut d = dispatcher(&notifier, &cue);

        assert_matches!(d.request_permission(Instant::now()), PermissionOutcome::Declined);
        assert_eq!(d.control_label(), "Notifications Blocked");
        assert!(notifier.shown_bodies().is_empty());
    }
}
