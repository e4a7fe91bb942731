use std::{
    fs::{self, OpenOptions},
    io::{self, stdin},
    path::PathBuf,
    sync::Mutex,
    time::{Duration, Instant},
};

use anyhow::Context;
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, SetTitle},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pomo::{
    app::{App, AppAction},
    app_dirs::AppDirs,
    audio::{AudioCue, Silent, SystemChime},
    config::{Config, ConfigStore, FileConfigStore, NotificationsMode},
    controller::TimerController,
    display::ScreenModel,
    form::InputForm,
    notify::{DesktopNotifier, NotificationDispatcher},
    runtime::{CrosstermEventSource, FixedTicker, IntervalScheduler, PomoEvent, Runner},
};

/// Upper bound on how long the loop sleeps between redraws
const IDLE_REDRAW_MS: u64 = 250;

/// a small terminal pomodoro timer
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal Pomodoro timer: alternating work and rest intervals with a focus label, desktop notifications and a chime when an interval ends."
)]
pub struct Cli {
    /// work interval in minutes (1-60, anything else is normalized)
    #[clap(short = 'w', long = "work")]
    work_minutes: Option<String>,

    /// rest interval in minutes (1-60, anything else is normalized)
    #[clap(short = 'r', long = "rest")]
    rest_minutes: Option<String>,

    /// what you are focusing on during work intervals
    #[clap(short = 'f', long)]
    focus: Option<String>,

    /// desktop notification permission to start with
    #[clap(long, value_enum)]
    notifications: Option<NotificationsMode>,

    /// do not play the chime when an interval ends
    #[clap(long)]
    no_sound: bool,

    /// enable debug logging
    #[clap(short = 'v', long)]
    verbose: bool,

    /// log file (defaults to ~/.local/state/pomo/pomo.log)
    #[clap(long)]
    log_file: Option<PathBuf>,

    /// alternate config file
    #[clap(long)]
    config: Option<PathBuf>,

    /// write the effective settings to the config file and exit
    #[clap(long)]
    write_config: bool,
}

impl Cli {
    /// CLI flags win over the config file
    fn merge(&self, file: Config) -> Config {
        let mut config =
            file.with_durations(self.work_minutes.as_deref(), self.rest_minutes.as_deref());
        if let Some(focus) = &self.focus {
            config.focus_label = focus.trim().to_string();
        }
        if let Some(mode) = self.notifications {
            config.notifications = mode;
        }
        if self.no_sound {
            config.sound = false;
        }
        config
    }

    fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    fn config_store(&self) -> FileConfigStore {
        match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        }
    }
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let Some(path) = cli.log_file.clone().or_else(AppDirs::log_path) else {
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pomo={}", cli.log_level())));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn build_app(config: &Config) -> App {
    let audio: Box<dyn AudioCue> = if config.sound {
        Box::new(SystemChime::new())
    } else {
        Box::new(Silent)
    };
    let notifier = DesktopNotifier::new(config.notifications.permission());
    let dispatcher = NotificationDispatcher::new(Box::new(notifier), audio);

    let timer_config = config.timer_config();
    let controller = TimerController::new(
        timer_config,
        config.focus_label.clone(),
        ScreenModel::new(),
        IntervalScheduler::new(),
        dispatcher,
    );
    let form = InputForm::new(
        &config.focus_label,
        &(timer_config.work_duration_seconds() / 60).to_string(),
        &(timer_config.rest_duration_seconds() / 60).to_string(),
    );
    App::new(controller, form)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let store = cli.config_store();
    let config = cli.merge(store.load());

    if cli.write_config {
        store
            .save(&config)
            .with_context(|| format!("writing {}", store.path().display()))?;
        println!("wrote {}", store.path().display());
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    info!(
        "starting pomo: work={}m rest={}m sound={} notifications={}",
        config.work_minutes, config.rest_minutes, config.sound, config.notifications
    );
    let mut app = build_app(&config);

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app);

    // restore the terminal even when the loop failed
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, SetTitle(""))?;
    terminal.show_cursor()?;

    info!("pomo exiting");
    result
}

fn ui(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}

fn start_tui<B: Backend + io::Write>(terminal: &mut Terminal<B>, app: &mut App) -> anyhow::Result<()> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(IDLE_REDRAW_MS)),
    );

    loop {
        if let Some(title) = app.controller.display_mut().take_title() {
            execute!(terminal.backend_mut(), SetTitle(title))?;
        }
        terminal.draw(|f| ui(app, f))?;

        let event = runner.step(app.controller.next_wake_in(Instant::now()));
        let now = Instant::now();
        match event {
            PomoEvent::Key(key) => {
                if app.handle_key(key, now) == AppAction::Quit {
                    break;
                }
            }
            PomoEvent::Resize | PomoEvent::Wake => {}
        }
        app.controller.drive(now);
    }

    Ok(())
}
