//! Formatting helpers for presenting reports and decoded trees

use crate::metadata::{MetadataNode, MetadataValue};

const MS_PER_DAY: u64 = 24 * 60 * 60 * 1000;

/// Format bytes as upper-case, space separated hex ("FE 02 41 00")
pub fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format an inter-arrival delta in milliseconds as signed seconds ("+0.045s")
pub fn format_delta(delta_ms: i64) -> String {
    let sign = if delta_ms < 0 { '-' } else { '+' };
    let abs = delta_ms.unsigned_abs();
    format!("{}{}.{:03}s", sign, abs / 1000, abs % 1000)
}

/// Format a Unix timestamp in milliseconds as UTC time of day ("13:05:09.042")
pub fn format_time_of_day(epoch_ms: u64) -> String {
    let ms_of_day = epoch_ms % MS_PER_DAY;
    let millis = ms_of_day % 1000;
    let secs = ms_of_day / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        millis
    )
}

/// Render a parse tree as an indented outline, one node per line
///
/// ```text
/// Message Header [bits 0-15]
///   Message Type [bits 0-4]: Accept
/// ```
pub fn format_tree(node: &MetadataNode) -> Vec<String> {
    let mut lines = Vec::new();
    push_tree_lines(node, 0, &mut lines);
    lines
}

fn push_tree_lines(node: &MetadataNode, depth: usize, lines: &mut Vec<String>) {
    let label = node.field.as_deref();

    // Unnamed nodes only group their children
    let child_depth = if let Some(label) = label {
        let mut line = format!("{}{}", "  ".repeat(depth), label);
        if let Some(bits) = node.bit_range_label() {
            line.push_str(&format!(" [{}]", bits));
        }
        if let Some(value) = scalar_text(&node.value) {
            line.push_str(": ");
            line.push_str(&value);
        }
        lines.push(line);
        depth + 1
    } else {
        depth
    };

    for child in node.children() {
        push_tree_lines(child, child_depth, lines);
    }
}

fn scalar_text(value: &MetadataValue) -> Option<String> {
    match value {
        MetadataValue::Text(text) => Some(text.clone()),
        MetadataValue::Number(n) => Some(n.to_string()),
        MetadataValue::Bool(b) => Some(b.to_string()),
        MetadataValue::Null | MetadataValue::Children(_) => None,
    }
}
