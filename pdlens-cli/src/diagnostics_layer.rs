//! Custom tracing layer for sending log events to the console status line

use std::sync::mpsc::Sender;
use tracing::field::{Field, Visit};
use tracing::subscriber::Interest;
use tracing::{Event, Level, Metadata, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Crates that belong to this project (for filtering)
const PROJECT_CRATES: &[&str] = &["pdlens", "pdlens_protocol", "pdlens_pipeline", "pdlens_sim"];

fn is_project_target(target: &str) -> bool {
    PROJECT_CRATES
        .iter()
        .any(|crate_name| target == *crate_name || target.starts_with(&format!("{}::", crate_name)))
}

/// Filter that passes project crate events at or above a fixed level
pub struct ProjectCrateFilter {
    max_level: Option<Level>,
}

impl ProjectCrateFilter {
    /// Create a filter; `None` turns diagnostics off
    pub fn new(max_level: Option<Level>) -> Self {
        Self { max_level }
    }

    fn passes(&self, meta: &Metadata<'_>) -> bool {
        match self.max_level {
            None => false,
            Some(max_level) => is_project_target(meta.target()) && *meta.level() <= max_level,
        }
    }
}

impl<S> tracing_subscriber::layer::Filter<S> for ProjectCrateFilter {
    fn enabled(&self, meta: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        self.passes(meta)
    }

    fn callsite_enabled(&self, meta: &'static Metadata<'static>) -> Interest {
        if self.passes(meta) {
            Interest::always()
        } else {
            Interest::never()
        }
    }
}

/// A diagnostic event captured from tracing
#[derive(Debug, Clone)]
pub struct DiagnosticEvent {
    /// Source of the event (derived from tracing target or custom field)
    pub source: String,
    /// Severity level
    pub level: Level,
    /// Log message
    pub message: String,
}

/// Custom tracing layer that captures log events and sends them via channel
pub struct DiagnosticsLayer {
    tx: Sender<DiagnosticEvent>,
}

impl DiagnosticsLayer {
    /// Create a new DiagnosticsLayer that sends events to the given channel
    pub fn new(tx: Sender<DiagnosticEvent>) -> Self {
        Self { tx }
    }
}

impl<S: Subscriber> Layer<S> for DiagnosticsLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let target = event.metadata().target();

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        // Custom source field wins over the target
        let source = visitor.source.unwrap_or_else(|| simplify_target(target));

        let diagnostic = DiagnosticEvent {
            source,
            level: *event.metadata().level(),
            message: visitor.message.unwrap_or_default(),
        };

        // Receiver may be gone during shutdown
        let _ = self.tx.send(diagnostic);
    }
}

/// Visitor to extract message and optional source from tracing fields
#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
    source: Option<String>,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            "source" => self.source = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => self.message = Some(format!("{:?}", value)),
            "source" => self.source = Some(format!("{:?}", value)),
            _ => {}
        }
    }
}

/// Simplify a module path target to a user-friendly source name
fn simplify_target(target: &str) -> String {
    // e.g., "pdlens_pipeline::gateway" -> "Gateway"
    target
        .rsplit("::")
        .next()
        .map(|s| {
            let mut chars = s.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => s.to_string(),
            }
        })
        .unwrap_or_else(|| target.to_string())
}
