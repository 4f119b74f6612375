//! Plain-text rendering of the session for the console.
//!
//! Rendering is a pure function of the state passed in; the same messages
//! always produce the same text.

use std::fmt::Write as _;

use chrono::{DateTime, Local};

use crate::entities::{ChatMessage, ImageEntry, MessageRole, MessageStatus};
use crate::services::diagnostic_log::DiagnosticLog;
use crate::utils::sanitize::sanitize_model_text;

const INDENT: &str = "  ";

fn format_time(timestamp_millis: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_millis)
        .map(|time| time.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string())
}

fn short_id(id: &str) -> String {
    id.chars().take(6).collect()
}

/// File names come from disk and are printed on one line.
fn single_line_name(name: &str) -> String {
    sanitize_model_text(name).replace(['\n', '\t'], " ")
}

pub fn render_message(message: &ChatMessage) -> String {
    let mut header = vec![
        message.role.display_name().to_string(),
        format_time(message.timestamp),
    ];
    if let Some(image_id) = &message.image_id {
        header.push(format!("Image ID: {}", short_id(image_id)));
    }
    match message.status {
        Some(MessageStatus::Loading) => header.push("Processing…".to_string()),
        Some(MessageStatus::Error) => header.push("Error".to_string()),
        _ => {}
    }

    let mut out = format!("[{}]\n", header.join(" • "));

    if let Some(images) = message.images.as_ref().filter(|images| !images.is_empty()) {
        let names: Vec<String> = images
            .iter()
            .enumerate()
            .map(|(idx, image)| format!("#{} {}", idx + 1, single_line_name(&image.name)))
            .collect();
        let _ = writeln!(out, "{INDENT}images: {}", names.join(", "));
    }

    let body = match message.role {
        MessageRole::Assistant => sanitize_model_text(&message.text),
        MessageRole::User | MessageRole::System => message.text.clone(),
    };
    for line in body.lines() {
        let _ = writeln!(out, "{INDENT}{line}");
    }

    if let Some(error) = &message.error {
        let _ = writeln!(out, "{INDENT}! {}", sanitize_model_text(error));
    }

    out
}

pub fn render_conversation(messages: &[ChatMessage]) -> String {
    if messages.is_empty() {
        return "No messages yet.\n".to_string();
    }

    messages
        .iter()
        .map(render_message)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_registry(entries: &[ImageEntry], max_images: usize) -> String {
    let mut out = format!("Images ({}/{max_images})\n", entries.len());
    if entries.is_empty() {
        out.push_str(INDENT);
        out.push_str("No images selected. Use /add <path> to choose files.\n");
        return out;
    }

    for (idx, entry) in entries.iter().enumerate() {
        let _ = writeln!(
            out,
            "{INDENT}#{} {} [{}] {}",
            idx + 1,
            single_line_name(&entry.name),
            short_id(&entry.id),
            entry.preview_ref()
        );
    }
    out
}

pub fn render_logs(logs: &DiagnosticLog) -> String {
    if logs.is_empty() {
        return "No logs yet.\n".to_string();
    }

    let mut out = String::from("Logs (most recent first)\n");
    for line in logs.entries() {
        let _ = writeln!(out, "{INDENT}- {line}");
    }
    out
}
