use unicode_width::UnicodeWidthStr;

const MAX_MINUTES_CHARS: usize = 8;
const MAX_FOCUS_WIDTH: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Focus,
    Work,
    Rest,
}

impl Field {
    const ORDER: [Field; 3] = [Field::Focus, Field::Work, Field::Rest];

    pub fn label(&self) -> &'static str {
        match self {
            Field::Focus => "Focus",
            Field::Work => "Work (min)",
            Field::Rest => "Rest (min)",
        }
    }

    fn index(&self) -> usize {
        Self::ORDER.iter().position(|f| f == self).unwrap_or(0)
    }
}

/// Change events emitted by the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
    DurationsChanged { work: String, rest: String },
    FocusCommitted(String),
}

/// The editable fields: focus label plus the two raw duration values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputForm {
    pub focus: String,
    pub work: String,
    pub rest: String,
    active: Option<Field>,
    edited: bool,
}

impl InputForm {
    pub fn new(focus: &str, work: &str, rest: &str) -> Self {
        Self {
            focus: focus.to_string(),
            work: work.to_string(),
            rest: rest.to_string(),
            active: None,
            edited: false,
        }
    }

    pub fn active(&self) -> Option<Field> {
        self.active
    }

    pub fn is_editing(&self) -> bool {
        self.active.is_some()
    }

    pub fn value(&self, field: Field) -> &str {
        match field {
            Field::Focus => &self.focus,
            Field::Work => &self.work,
            Field::Rest => &self.rest,
        }
    }

    fn value_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Focus => &mut self.focus,
            Field::Work => &mut self.work,
            Field::Rest => &mut self.rest,
        }
    }

    /// Move to the next field (or the first one), leaving the current field
    pub fn focus_next(&mut self) -> Option<FormEvent> {
        let next = match self.active {
            None => Field::ORDER[0],
            Some(f) => Field::ORDER[(f.index() + 1) % Field::ORDER.len()],
        };
        self.switch_to(Some(next))
    }

    pub fn focus_prev(&mut self) -> Option<FormEvent> {
        let len = Field::ORDER.len();
        let prev = match self.active {
            None => Field::ORDER[len - 1],
            Some(f) => Field::ORDER[(f.index() + len - 1) % len],
        };
        self.switch_to(Some(prev))
    }

    /// Leave the active field, applying whatever was edited
    pub fn blur(&mut self) -> Option<FormEvent> {
        self.switch_to(None)
    }

    /// Enter: the focus label commits, a duration field behaves like leaving it
    pub fn submit(&mut self) -> Option<FormEvent> {
        match self.active {
            Some(Field::Focus) => {
                self.active = None;
                self.edited = false;
                Some(FormEvent::FocusCommitted(self.focus.clone()))
            }
            Some(_) => self.blur(),
            None => None,
        }
    }

    pub fn insert(&mut self, c: char) {
        let Some(field) = self.active else {
            return;
        };
        if c.is_control() {
            return;
        }

        let value = self.value_mut(field);
        let fits = match field {
            Field::Focus => {
                let mut buf = [0u8; 4];
                value.width() + c.encode_utf8(&mut buf).width() <= MAX_FOCUS_WIDTH
            }
            Field::Work | Field::Rest => value.chars().count() < MAX_MINUTES_CHARS,
        };
        if fits {
            value.push(c);
            self.edited = true;
        }
    }

    pub fn backspace(&mut self) {
        if let Some(field) = self.active {
            if self.value_mut(field).pop().is_some() {
                self.edited = true;
            }
        }
    }

    /// Show the normalized minute values after a change was applied
    pub fn set_minutes(&mut self, work_minutes: u32, rest_minutes: u32) {
        self.work = work_minutes.to_string();
        self.rest = rest_minutes.to_string();
    }

    fn switch_to(&mut self, next: Option<Field>) -> Option<FormEvent> {
        let event = match self.active {
            Some(Field::Work | Field::Rest) if self.edited => Some(FormEvent::DurationsChanged {
                work: self.work.clone(),
                rest: self.rest.clone(),
            }),
            Some(Field::Focus) if self.edited => Some(FormEvent::FocusCommitted(self.focus.clone())),
            _ => None,
        };
        self.active = next;
        self.edited = false;
        event
    }
}
