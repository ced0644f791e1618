//! Notification message rendering
//!
//! Fills an HTML template with the reading that crossed a threshold and a
//! table of the unit's recent history. Placeholders:
//!
//! * `{{unit_id}}` - the unit identity
//! * `{{quantity}}` - remaining quantity with two decimals
//! * `{{queried_at}}` - local time of the reading
//! * `{{history_table}}` - recent readings, newest first

use crate::alerts::notifier::OutgoingMessage;
use crate::alerts::tiers::Tier;
use crate::error::ConfigError;
use crate::readings::{Reading, Timestamp};
use chrono::Local;
use std::path::Path;

const DEFAULT_TEMPLATE: &str = include_str!("../../templates/notification.html");

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Renders notification messages from a template
#[derive(Debug, Clone)]
pub struct MessageRenderer {
    template: String,
}

impl Default for MessageRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl MessageRenderer {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Load the template from a file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::TemplateError` if the file cannot be read.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let template = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::TemplateError(format!("{}: {}", path.display(), e)))?;
        Ok(Self::new(template))
    }

    /// Build the subject and body for a tier notification
    pub fn render<'a>(
        &self,
        tier: Tier,
        reading: &Reading,
        history: impl Iterator<Item = &'a Reading>,
    ) -> OutgoingMessage {
        let body = self
            .template
            .replace("{{unit_id}}", &escape_html(&reading.unit_id))
            .replace("{{quantity}}", &format!("{:.2}", reading.quantity))
            .replace("{{queried_at}}", &format_time(&reading.timestamp))
            .replace("{{history_table}}", &history_table(history));

        OutgoingMessage {
            subject: format!(
                "Balance reminder: {} has {:.2} left ({})",
                reading.unit_id, reading.quantity, tier
            ),
            body,
        }
    }
}

fn format_time(timestamp: &Timestamp) -> String {
    timestamp.with_timezone(&Local).format(TIME_FORMAT).to_string()
}

fn history_table<'a>(history: impl Iterator<Item = &'a Reading>) -> String {
    let mut table = String::from(
        "<table class=\"table\"><thead><tr>\
         <th class=\"th\">Unit</th><th class=\"th\">Queried at</th><th class=\"th\">Remaining</th>\
         </tr></thead><tbody>",
    );
    for reading in history {
        table.push_str(&format!(
            "<tr><td class=\"th\">{}</td><td class=\"th\">{}</td><td class=\"th\">{}</td></tr>",
            escape_html(&reading.unit_id),
            format_time(&reading.timestamp),
            reading.quantity
        ));
    }
    table.push_str("</tbody></table>");
    table
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
