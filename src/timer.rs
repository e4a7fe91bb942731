pub const DEFAULT_WORK_MINUTES: u32 = 25;
pub const DEFAULT_REST_MINUTES: u32 = 5;
pub const MIN_MINUTES: u32 = 1;
pub const MAX_MINUTES: u32 = 60;

pub const WORK_STATUS: &str = "Work Time";
pub const REST_STATUS: &str = "Rest Time";
const TITLE_SUFFIX: &str = "Pomodoro Timer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Mode {
    Work,
    Rest,
}

impl Mode {
    pub fn flipped(self) -> Self {
        match self {
            Mode::Work => Mode::Rest,
            Mode::Rest => Mode::Work,
        }
    }

    /// Label of the control that switches away from this mode
    pub fn toggle_label(self) -> &'static str {
        match self {
            Mode::Work => "Rest Mode",
            Mode::Rest => "Work Mode",
        }
    }
}

/// Work and rest durations, always within [1, 60] minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    work_duration_seconds: u32,
    rest_duration_seconds: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            work_duration_seconds: DEFAULT_WORK_MINUTES * 60,
            rest_duration_seconds: DEFAULT_REST_MINUTES * 60,
        }
    }
}

impl TimerConfig {
    /// Normalize raw user input into a config. Never fails.
    pub fn from_raw(work_minutes_raw: &str, rest_minutes_raw: &str) -> Self {
        Self {
            work_duration_seconds: normalize_minutes(work_minutes_raw, DEFAULT_WORK_MINUTES) * 60,
            rest_duration_seconds: normalize_minutes(rest_minutes_raw, DEFAULT_REST_MINUTES) * 60,
        }
    }

    pub fn work_duration_seconds(&self) -> u32 {
        self.work_duration_seconds
    }

    pub fn rest_duration_seconds(&self) -> u32 {
        self.rest_duration_seconds
    }

    pub fn duration(&self, mode: Mode) -> u32 {
        match mode {
            Mode::Work => self.work_duration_seconds,
            Mode::Rest => self.rest_duration_seconds,
        }
    }
}

/// Read the leading integer of `raw` the way a lenient form field would:
/// surrounding whitespace is ignored, an optional sign is accepted and any
/// trailing garbage after the digits is dropped.
pub fn parse_leading_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    // saturate absurdly long inputs, they clamp to the upper bound anyway
    let value = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -value } else { value })
}

/// Unparseable or zero input falls back to `default`, then clamps to range
pub fn normalize_minutes(raw: &str, default: u32) -> u32 {
    let minutes = match parse_leading_int(raw) {
        Some(0) | None => i64::from(default),
        Some(m) => m,
    };
    minutes.clamp(i64::from(MIN_MINUTES), i64::from(MAX_MINUTES)) as u32
}

/// `MM:SS`, both zero-padded
pub fn format_clock(remaining_seconds: u32) -> String {
    format!("{:02}:{:02}", remaining_seconds / 60, remaining_seconds % 60)
}

pub fn format_title(remaining_seconds: u32) -> String {
    format!("({}) {}", format_clock(remaining_seconds), TITLE_SUFFIX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerState {
    pub mode: Mode,
    pub remaining_seconds: u32,
    pub is_running: bool,
    pub focus_label: String,
}

impl TimerState {
    pub fn new(config: &TimerConfig, focus_label: String) -> Self {
        Self {
            mode: Mode::Work,
            remaining_seconds: config.work_duration_seconds(),
            is_running: false,
            focus_label,
        }
    }

    /// Work shows the focus label (or a default), rest always shows the rest text
    pub fn status_text(&self) -> String {
        match self.mode {
            Mode::Work if !self.focus_label.is_empty() => self.focus_label.clone(),
            Mode::Work => WORK_STATUS.to_string(),
            Mode::Rest => REST_STATUS.to_string(),
        }
    }
}
