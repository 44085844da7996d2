//! # Scanner Console Loop
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CONTROL_ORDER> _                    one line per scan                  │
//! │       │                                                                 │
//! │       ├── ""            → prompt again                                  │
//! │       ├── EXIT          → leave the loop                                │
//! │       ├── HELP          → code sheet        ┐ not while waiting for a   │
//! │       ├── !cmd          → shell escape      ┘ tracking no. or serial    │
//! │       │                                                                 │
//! │       └── classify ──► resolve (catalog) ──► ShipmentSession::apply     │
//! │                                                  │                      │
//! │                                                  └─ Finalized ──►       │
//! │                                                     mark orders shipped │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lines are handled strictly one after the other; the next line is not
//! read before the previous reaction is complete.

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use packstation_core::scan::{CARRIER_CODES, VERB_CODES};
use packstation_core::session::Outcome;
use packstation_core::error::ShipResult;
use packstation_core::{
    classify, resolve, Cue, Feedback, Instruction, SessionState, Shipment, ShipmentSession,
};
use packstation_store::Database;

/// Whether the loop keeps reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Console {
    session: ShipmentSession,
    db: Database,
    /// Console-only output (help, shell escape), never part of a transcript.
    out: Box<dyn Feedback>,
    shell_escape: bool,
}

impl Console {
    pub fn new(
        session: ShipmentSession,
        db: Database,
        out: Box<dyn Feedback>,
        shell_escape: bool,
    ) -> Self {
        Console {
            session,
            db,
            out,
            shell_escape,
        }
    }

    pub fn session(&self) -> &ShipmentSession {
        &self.session
    }

    pub fn prompt(&self) -> String {
        format!("{}> ", self.session.state())
    }

    /// Reads lines until EXIT or end of input.
    pub async fn run<R>(&mut self, input: R) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(self.prompt().as_bytes())?;
                stdout.flush()?;
            }

            let Some(line) = lines.next_line().await? else {
                info!("End of input");
                return Ok(());
            };
            if self.handle_line(&line).await == Flow::Exit {
                return Ok(());
            }
        }
    }

    pub async fn handle_line(&mut self, line: &str) -> Flow {
        let line = line.trim();
        if line.is_empty() {
            return Flow::Continue;
        }
        if line.eq_ignore_ascii_case("EXIT") {
            info!("Operator exit");
            return Flow::Exit;
        }
        // WAIT_SHIPPING and WAIT_SERIAL take the line verbatim, so a tracking
        // number or serial may read `HELP` or start with `!`.
        if !self.captures_text() {
            if line.eq_ignore_ascii_case("HELP") {
                self.help();
                return Flow::Continue;
            }
            if let Some(command) = line.strip_prefix('!') {
                self.shell(command.trim()).await;
                return Flow::Continue;
            }
        }

        // Errors are already on screen.
        if let Ok(Outcome::Finalized(shipment)) = self.dispatch(line).await {
            self.mark_shipped(&shipment).await;
        }
        Flow::Continue
    }

    fn captures_text(&self) -> bool {
        matches!(
            self.session.state(),
            SessionState::WaitShipping | SessionState::WaitSerial
        )
    }

    async fn dispatch(&mut self, line: &str) -> ShipResult<Outcome> {
        match self.instruction(line).await {
            Ok(instruction) => self.session.apply(instruction).await,
            Err(err) => {
                self.session.report(&err);
                Err(err)
            }
        }
    }

    async fn instruction(&self, line: &str) -> ShipResult<Instruction> {
        let scan = classify(line)?;
        resolve(scan, self.session.catalog()).await
    }

    async fn mark_shipped(&mut self, shipment: &Shipment) {
        match self.db.mark_shipped(shipment).await {
            Ok(updated) => {
                info!(shipment_id = %shipment.shipment_id, updated, "Shop order status updated")
            }
            Err(e) => {
                warn!(shipment_id = %shipment.shipment_id, error = %e, "Shop order status not updated");
                self.out.line(&format!("[WARN] shop order status not updated: {e}"));
            }
        }
    }

    fn help(&mut self) {
        self.out.line("Scanner codes");
        for (code, verb) in VERB_CODES {
            self.out.line(&format!("  {code:<14} {verb}"));
        }
        for (code, carrier) in CARRIER_CODES {
            self.out.line(&format!("  {code:<14} {}", carrier.label()));
        }
        self.out.line("  +N*<code>      add N units, -N*<code> removes them");
        self.out.line("  EXIT           quit");
    }

    async fn shell(&mut self, command: &str) {
        if !self.shell_escape {
            warn!(command, "Shell escape refused");
            self.out.line("[ERROR] shell escape is disabled");
            self.out.cue(Cue::Error);
            return;
        }

        info!(command, "Shell escape");
        match tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await
        {
            Ok(output) => {
                for text in [&output.stdout, &output.stderr] {
                    for line in String::from_utf8_lossy(text).lines() {
                        self.out.line(line);
                    }
                }
                if !output.status.success() {
                    self.out.line(&format!("[{}]", output.status));
                }
            }
            Err(e) => {
                warn!(command, error = %e, "Shell escape failed");
                self.out.line(&format!("[ERROR] {e}"));
                self.out.cue(Cue::Error);
            }
        }
    }
}
