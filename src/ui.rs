pub mod clock;

use chrono::Local;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

use crate::{
    app::App,
    form::Field,
    notify::Permission,
    timer::Mode,
    ui::clock::{big_lines, big_width, GLYPH_ROWS},
};

const HORIZONTAL_MARGIN: u16 = 2;
const VERTICAL_MARGIN: u16 = 1;

fn mode_color(mode: Mode) -> Color {
    match mode {
        Mode::Work => Color::Red,
        Mode::Rest => Color::Green,
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let screen = self.controller.display();
        let dispatcher = self.controller.dispatcher();

        // styles
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);
        let mode_style = Style::default()
            .patch(bold_style)
            .fg(mode_color(screen.controls.mode));

        let block = Block::default()
            .borders(Borders::ALL)
            .title(Span::styled(" pomo ", bold_style))
            .title_alignment(Alignment::Center);
        let inner = block.inner(area);
        block.render(area, buf);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(1),                 // mode
                Constraint::Length(GLYPH_ROWS as u16), // clock
                Constraint::Length(1),                 // status
                Constraint::Length(1),                 // ends at
                Constraint::Min(0),                    // padding
                Constraint::Length(1),                 // controls
                Constraint::Length(3),                 // fields
                Constraint::Length(1),                 // flash / errors
                Constraint::Length(1),                 // legend
            ])
            .split(inner);

        let mode_label = match screen.controls.mode {
            Mode::Work => "WORK",
            Mode::Rest => "REST",
        };
        Paragraph::new(Span::styled(mode_label, mode_style))
            .alignment(Alignment::Center)
            .render(chunks[0], buf);

        // fall back to plain digits when the block font does not fit
        let clock = if big_width(&screen.clock) as u16 <= chunks[1].width {
            Paragraph::new(
                big_lines(&screen.clock)
                    .into_iter()
                    .map(|row| Line::from(Span::styled(row, mode_style)))
                    .collect::<Vec<_>>(),
            )
        } else {
            Paragraph::new(Span::styled(screen.clock.clone(), mode_style))
        };
        clock.alignment(Alignment::Center).render(chunks[1], buf);

        Paragraph::new(Span::styled(screen.status.clone(), bold_style))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(chunks[2], buf);

        if let Some(ends_at) = self.ends_at(Local::now()) {
            Paragraph::new(Span::styled(format!("ends at {}", ends_at), dim_style))
                .alignment(Alignment::Center)
                .render(chunks[3], buf);
        }

        let start_style = if screen.controls.running {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::Green)
        };
        let notify_style = match dispatcher.permission() {
            Permission::Granted => Style::default().fg(Color::Green),
            Permission::Denied => Style::default().fg(Color::Red),
            Permission::Default => Style::default().fg(Color::Gray),
            Permission::Unsupported => dim_style,
        };
        let controls = Line::from(vec![
            Span::styled("[space] ", dim_style),
            Span::styled(screen.controls.start_label(), start_style.patch(bold_style)),
            Span::raw("   "),
            Span::styled("[r] ", dim_style),
            Span::styled("Reset", bold_style),
            Span::raw("   "),
            Span::styled("[m] ", dim_style),
            Span::styled(screen.controls.toggle_label(), bold_style),
            Span::raw("   "),
            Span::styled(
                if dispatcher.control_enabled() { "[n] " } else { "    " },
                dim_style,
            ),
            Span::styled(dispatcher.control_label(), notify_style),
        ]);
        Paragraph::new(controls)
            .alignment(Alignment::Center)
            .render(chunks[5], buf);

        let fields = [Field::Focus, Field::Work, Field::Rest]
            .into_iter()
            .map(|field| {
                let active = self.form.active() == Some(field);
                let value_style = if active {
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::UNDERLINED)
                } else {
                    Style::default()
                };
                let mut value = self.form.value(field).to_string();
                if active {
                    value.push('▏');
                }
                Line::from(vec![
                    Span::styled(format!("{:>11} ", field.label()), dim_style),
                    Span::styled(value, value_style),
                ])
            })
            .collect::<Vec<_>>();
        Paragraph::new(fields).render(chunks[6], buf);

        let message = self
            .flash
            .clone()
            .map(|m| Span::styled(m, Style::default().fg(Color::Yellow)))
            .or_else(|| {
                dispatcher.last_error().map(|e| {
                    Span::styled(
                        format!("notification failed: {}", e),
                        Style::default().fg(Color::Red),
                    )
                })
            });
        if let Some(message) = message {
            Paragraph::new(message)
                .alignment(Alignment::Center)
                .render(chunks[7], buf);
        }

        let legend = if self.form.is_editing() {
            "(enter) apply / (tab) next field / (esc) done"
        } else {
            "(tab) edit fields / (q)uit"
        };
        Paragraph::new(Span::styled(legend, italic_style))
            .alignment(Alignment::Center)
            .render(chunks[8], buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Silent;
    use crate::controller::TimerController;
    use crate::display::ScreenModel;
    use crate::form::InputForm;
    use crate::notify::{MemoryNotifier, NotificationDispatcher};
    use crate::runtime::IntervalScheduler;
    use crate::timer::TimerConfig;
    use ratatui::{buffer::Buffer, layout::Rect};
    use std::time::Instant;

    fn create_test_app(permission: Permission) -> App {
        let dispatcher = NotificationDispatcher::new(
            Box::new(MemoryNotifier::new(permission)),
            Box::new(Silent),
        );
        let controller = TimerController::new(
            TimerConfig::default(),
            "write the intro".to_string(),
            ScreenModel::new(),
            IntervalScheduler::new(),
            dispatcher,
        );
        App::new(controller, InputForm::new("write the intro", "25", "5"))
    }

    fn rendered(app: &App, area: Rect) -> String {
        let mut buffer = Buffer::empty(area);
        app.render(area, &mut buffer);
        buffer
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect::<String>()
    }

    #[test]
    fn test_ui_idle_work() {
        let app = create_test_app(Permission::Default);
        let content = rendered(&app, Rect::new(0, 0, 80, 24));

        assert!(content.contains("WORK"));
        assert!(content.contains("write the intro"));
        assert!(content.contains("Start"));
        assert!(content.contains("Rest Mode"));
        assert!(content.contains("Enable Notifications"));
        assert!(content.contains("███"));
        assert!(!content.contains("ends at"));
    }

    #[test]
    fn test_ui_running_shows_pause_and_end_time() {
        let mut app = create_test_app(Permission::Granted);
        app.controller.start();
        let content = rendered(&app, Rect::new(0, 0, 80, 24));

        assert!(content.contains("Pause"));
        assert!(content.contains("ends at"));
        assert!(content.contains("Notifications Enabled"));
    }

    #[test]
    fn test_ui_rest_mode() {
        let mut app = create_test_app(Permission::Denied);
        app.controller.toggle_mode();
        let content = rendered(&app, Rect::new(0, 0, 80, 24));

        assert!(content.contains("REST"));
        assert!(content.contains("Rest Time"));
        assert!(content.contains("Work Mode"));
        assert!(content.contains("Notifications Blocked"));
    }

    #[test]
    fn test_ui_narrow_area_falls_back_to_plain_clock() {
        let app = create_test_app(Permission::Default);
        let content = rendered(&app, Rect::new(0, 0, 16, 24));
        assert!(content.contains("25:00"));
    }

    #[test]
    fn test_ui_small_area_does_not_panic() {
        let app = create_test_app(Permission::Default);
        let area = Rect::new(0, 0, 10, 4);
        let mut buffer = Buffer::empty(area);
        app.render(area, &mut buffer);
        assert!(*buffer.area() == area);
    }

    #[test]
    fn test_ui_shows_flash_and_editing_legend() {
        let mut app = create_test_app(Permission::Unsupported);
        app.flash = Some(
            app.controller
                .request_notifications(Instant::now())
                .message()
                .to_string(),
        );
        app.form.focus_next();
        let content = rendered(&app, Rect::new(0, 0, 100, 24));

        assert!(content.contains("does not support notifications"));
        assert!(content.contains("Notifications Not Supported"));
        assert!(content.contains("(enter) apply"));
    }

    #[test]
    fn test_ui_shows_notification_error() {
        let dispatcher = NotificationDispatcher::new(
            Box::new(MemoryNotifier::new(Permission::Granted).failing()),
            Box::new(Silent),
        );
        let mut controller = TimerController::new(
            TimerConfig::from_raw("1", "1"),
            String::new(),
            ScreenModel::new(),
            IntervalScheduler::new(),
            dispatcher,
        );
        controller.start();
        controller.drive(Instant::now() + std::time::Duration::from_secs(60));
        let app = App::new(controller, InputForm::new("", "1", "1"));

        let content = rendered(&app, Rect::new(0, 0, 100, 24));
        assert!(content.contains("notification failed: display refused"));
    }
}
