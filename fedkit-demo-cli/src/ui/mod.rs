//! Terminal UI utilities

use std::time::Duration;

use colored::Colorize;
use fedkit_lib::entities::Entity;
use indicatif::{ProgressBar, ProgressStyle};

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message);
}

/// Print a section header
pub fn header(text: &str) {
    println!("\n{}", text.bold().underline());
}

/// Print a key-value pair
pub fn key_value(key: &str, value: &str) {
    println!("  {}: {}", key.cyan(), value);
}

fn optional(key: &str, value: &str) {
    if !value.is_empty() {
        key_value(key, value);
    }
}

/// Create a spinner progress indicator
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Print a separator line
pub fn separator() {
    println!("{}", "─".repeat(60).dimmed());
}

/// Print the fields of a decoded entity
pub fn entity(entity: &Entity) {
    let base = entity.base();
    header(entity.kind().as_str());
    key_value("Id", &base.id);
    key_value("Actor", &base.actor_id);
    optional("Guid", &base.guid);
    optional("Handle", &base.handle);
    key_value("Created", &base.created_at.to_rfc3339());
    if let Some(target) = entity.target_id() {
        optional("Target", target);
    }
    if let Entity::Profile(profile) = entity {
        optional("Name", &profile.name);
        optional("Image", &profile.image_urls.large);
        key_value("Public key", if profile.public_key.is_empty() { "no" } else { "yes" });
    }
    if let Some(content) = entity.raw_content().filter(|content| !content.is_empty()) {
        key_value("Content", content);
    }
    let tags = entity.tags();
    if !tags.is_empty() {
        key_value("Tags", &tags.join(", "));
    }
    if !base.mentions.is_empty() {
        let mentions: Vec<&str> = base.mentions.iter().map(String::as_str).collect();
        key_value("Mentions", &mentions.join(", "));
    }
    for child in &base.children {
        key_value("Attachment", child.kind().as_str());
    }
}
