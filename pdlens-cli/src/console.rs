//! Console presentation of pipeline events and views

use std::io::{self, Write};
use std::sync::mpsc::Receiver;

use pdlens_pipeline::{
    FollowMode, PipelineEvent, PipelineView, ProtocolLogEntry, TelemetrySnapshot,
};
use pdlens_protocol::display::{format_time_of_day, format_tree};
use pdlens_protocol::DecodedMessage;

use crate::diagnostics_layer::DiagnosticEvent;

/// Writes log rows as they arrive and a status line on request
pub struct Console<W: Write> {
    out: W,
    show_trees: bool,
    diag_rx: Receiver<DiagnosticEvent>,
    /// Most severe recent diagnostic, cleared once shown
    pending_diagnostic: Option<DiagnosticEvent>,
    diagnostics_seen: u64,
}

impl<W: Write> Console<W> {
    pub fn new(out: W, show_trees: bool, diag_rx: Receiver<DiagnosticEvent>) -> Self {
        Self {
            out,
            show_trees,
            diag_rx,
            pending_diagnostic: None,
            diagnostics_seen: 0,
        }
    }

    /// Print whatever an event adds to the console
    ///
    /// Snapshots and selection moves only show up in the status line.
    pub fn handle_event(&mut self, event: &PipelineEvent) -> io::Result<()> {
        match event {
            PipelineEvent::EntriesAppended { entries } => {
                for entry in entries {
                    writeln!(self.out, "{}", entry_row(entry))?;
                    if self.show_trees {
                        for line in format_tree(&entry.tree) {
                            writeln!(self.out, "        {}", line)?;
                        }
                    }
                }
            }
            PipelineEvent::LogCleared => writeln!(self.out, "-- protocol log cleared --")?,
            PipelineEvent::TransientError { message } => writeln!(self.out, "! {}", message)?,
            PipelineEvent::DecoderNotReady { queued } => {
                writeln!(self.out, "~ decoder not ready, holding {} reports", queued)?
            }
            PipelineEvent::ReportsEvicted { count, total } => writeln!(
                self.out,
                "! queue overflow: dropped {} oldest reports ({} total)",
                count, total
            )?,
            PipelineEvent::Connected => writeln!(self.out, "== meter connected ==")?,
            PipelineEvent::PipelineReset => {
                writeln!(self.out, "== meter disconnected, pipeline reset ==")?
            }
            PipelineEvent::Error { source, message } => {
                writeln!(self.out, "! [{}] {}", source, message)?
            }
            PipelineEvent::SnapshotUpdated { .. } | PipelineEvent::SelectionChanged { .. } => {}
        }
        self.out.flush()
    }

    /// Print one status line for the current view
    pub fn render_status(&mut self, view: &PipelineView) -> io::Result<()> {
        self.collect_diagnostics();

        let mut line = status_line(view);
        if let Some(diagnostic) = self.pending_diagnostic.take() {
            line.push_str(&format!(
                " | {} [{}] {}",
                diagnostic.level, diagnostic.source, diagnostic.message
            ));
        }
        writeln!(self.out, "{}", line)?;
        self.out.flush()
    }

    /// Print a manually decoded message
    pub fn print_decoded(&mut self, message: &DecodedMessage) -> io::Result<()> {
        writeln!(self.out, "{} message: {}", message.kind.tag(), message.raw_hex)?;
        if let Some(message_type) = &message.protocol_message_type {
            writeln!(self.out, "type: {}", message_type)?;
        }
        for line in format_tree(&message.tree) {
            writeln!(self.out, "  {}", line)?;
        }
        self.out.flush()
    }

    /// Print the selected entry with its parse tree
    pub fn print_selected(&mut self, view: &PipelineView) -> io::Result<()> {
        match view.selected_entry() {
            Some(entry) => {
                writeln!(self.out, "selected ({}):", follow_label(view.follow))?;
                writeln!(self.out, "{}", entry_row(entry))?;
                writeln!(self.out, "  {}", entry.raw_hex)?;
                for line in format_tree(&entry.tree) {
                    writeln!(self.out, "  {}", line)?;
                }
            }
            None => writeln!(self.out, "no protocol messages captured")?,
        }
        self.out.flush()
    }

    /// Number of project diagnostics received so far
    pub fn diagnostics_seen(&self) -> u64 {
        self.diagnostics_seen
    }

    fn collect_diagnostics(&mut self) {
        while let Ok(event) = self.diag_rx.try_recv() {
            self.diagnostics_seen += 1;
            // Keep the most severe; later wins on ties
            let replace = match &self.pending_diagnostic {
                Some(current) => event.level <= current.level,
                None => true,
            };
            if replace {
                self.pending_diagnostic = Some(event);
            }
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

fn follow_label(follow: FollowMode) -> &'static str {
    if follow.is_following() {
        "following"
    } else {
        "pinned"
    }
}

/// One protocol log row
///
/// ```text
///     3  13:05:09.042   +0.045s  Source DFP  Source_Capabilities    80 bits
/// ```
pub fn entry_row(entry: &ProtocolLogEntry) -> String {
    format!(
        "{:>5}  {}  {:>8}  {:<6} {:<4} {:<20} {:>4} bits",
        entry.order_index,
        format_time_of_day(entry.arrival_ms),
        entry.delta_label(),
        entry.power_role,
        entry.data_role,
        entry.message_type,
        entry.bit_length
    )
}

/// Telemetry part of the status line
pub fn snapshot_text(snapshot: &TelemetrySnapshot) -> String {
    let mut text = format!(
        "{:.3} V  {:.3} A  {:.3} W",
        snapshot.voltage, snapshot.current, snapshot.power
    );
    if let Some(temperature) = snapshot.temperature {
        text.push_str(&format!("  {:.1} °C", temperature));
    }
    if let Some(energy) = &snapshot.aux.energy_wh {
        text.push_str(&format!("  {}", energy));
    }
    text
}

/// Whole status line for a view
pub fn status_line(view: &PipelineView) -> String {
    let telemetry = if !view.connected {
        "disconnected".to_string()
    } else {
        view.snapshot
            .as_ref()
            .map(snapshot_text)
            .unwrap_or_else(|| "waiting for telemetry".to_string())
    };

    let mut line = format!(
        "{} | {} msgs | queue {} | decoded {} skipped {} evicted {}",
        telemetry,
        view.entries.len(),
        view.queue_len,
        view.stats.decoded,
        view.stats.skipped,
        view.stats.evicted
    );
    if let Some(error) = &view.last_error {
        line.push_str(&format!(" | last error: {}", error));
    }
    line
}
