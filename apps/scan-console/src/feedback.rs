//! # Terminal Feedback
//!
//! Operator lines go to stdout; cues play a sound file through the
//! configured player, or ring the terminal bell. Both are best-effort: a
//! broken pipe or a missing player is logged and the scan carries on.

use std::io::Write;
use std::process::Stdio;

use tracing::{debug, warn};

use packstation_core::{Cue, Feedback};

use crate::config::CuesConfig;

const BELL: &str = "\x07";

#[derive(Debug, Clone)]
pub struct TerminalFeedback {
    cues: CuesConfig,
}

impl TerminalFeedback {
    pub fn new(cues: CuesConfig) -> Self {
        TerminalFeedback { cues }
    }

    fn write(&self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|()| stdout.flush()) {
            warn!(error = %e, "Terminal output failed");
        }
    }

    fn play(&self, player: &str, cue: Cue) -> bool {
        let Some(sound) = self.cues.sound(cue) else {
            return false;
        };

        // Not awaited: the next scan must not wait for the sound to finish.
        match tokio::process::Command::new(player)
            .arg(sound)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false)
            .spawn()
        {
            Ok(_child) => {
                debug!(cue = cue.name(), player, "Cue playing");
                true
            }
            Err(e) => {
                warn!(cue = cue.name(), player, error = %e, "Cue player failed");
                false
            }
        }
    }
}

impl Feedback for TerminalFeedback {
    fn line(&mut self, text: &str) {
        self.write(&format!("{text}\n"));
    }

    fn cue(&mut self, cue: Cue) {
        if !self.cues.enabled {
            return;
        }
        let played = match self.cues.player.as_deref() {
            Some(player) => self.play(player, cue),
            None => false,
        };
        if !played {
            self.write(BELL);
        }
    }
}
