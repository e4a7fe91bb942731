use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use tracing::debug;

/// Fire-and-forget playback of the end-of-interval chime
pub trait AudioCue {
    fn play_cue(&mut self);
}

/// Players and sound files tried in order, first existing file wins
const CHIME_CANDIDATES: [(&str, &str); 3] = [
    ("paplay", "/usr/share/sounds/freedesktop/stereo/complete.oga"),
    ("aplay", "/usr/share/sounds/sound-icons/guitar-11.wav"),
    ("aplay", "/usr/share/sounds/generic.wav"),
];

/// Plays a system sound through an external player, falling back to the terminal bell
#[derive(Debug, Default)]
pub struct SystemChime;

impl SystemChime {
    pub fn new() -> Self {
        Self
    }
}

impl AudioCue for SystemChime {
    fn play_cue(&mut self) {
        for (player, sound_file) in CHIME_CANDIDATES {
            if !Path::new(sound_file).exists() {
                continue;
            }
            let mut command = Command::new(player);
            command.arg(sound_file);
            match spawn_reaped(&mut command) {
                Ok(_) => return,
                Err(e) => debug!("chime via {} failed: {}", player, e),
            }
        }
        TerminalBell.play_cue();
    }
}

/// Spawn `command` with its output discarded and wait for it on a detached
/// thread, so the finished child never lingers as a zombie
fn spawn_reaped(command: &mut Command) -> io::Result<JoinHandle<Option<ExitStatus>>> {
    let mut child = command.stdout(Stdio::null()).stderr(Stdio::null()).spawn()?;
    Ok(thread::spawn(move || match child.wait() {
        Ok(status) => Some(status),
        Err(e) => {
            debug!("waiting for chime player failed: {}", e);
            None
        }
    }))
}

/// BEL on stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl AudioCue for TerminalBell {
    fn play_cue(&mut self) {
        let mut stdout = io::stdout();
        if let Err(e) = stdout.write_all(b"\x07").and_then(|_| stdout.flush()) {
            debug!("terminal bell failed: {}", e);
        }
    }
}

/// --no-sound
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl AudioCue for Silent {
    fn play_cue(&mut self) {}
}
