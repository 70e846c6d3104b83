use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::types::DerivedTicket;
use crate::models::enums::TicketPriority;

/// Longest title kept, in characters.
pub const MAX_TITLE_CHARS: usize = 200;

/// Fence markers wrapping the whole response. Backticks inside string
/// values are left alone.
static OPENING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*```[A-Za-z]*\s*").expect("valid fence regex"));
static CLOSING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*```\s*$").expect("valid fence regex"));

/// Parse the model's ticket response into validated records, in source order.
///
/// Never fails: a response without a parseable JSON array yields an empty
/// list, and malformed entries are dropped without affecting their siblings.
pub fn parse_ticket_response(response: &str) -> Vec<DerivedTicket> {
    let unfenced = OPENING_FENCE.replace(response.trim(), "");
    let cleaned = CLOSING_FENCE.replace(&unfenced, "");

    let (Some(start), Some(end)) = (cleaned.find('['), cleaned.rfind(']')) else {
        tracing::debug!("No JSON array in ticket response");
        return Vec::new();
    };
    if start >= end {
        return Vec::new();
    }

    let items = match serde_json::from_str::<Value>(&cleaned[start..=end]) {
        Ok(Value::Array(items)) => items,
        Ok(_) => return Vec::new(),
        Err(e) => {
            tracing::debug!(error = %e, "Ticket response is not valid JSON");
            return Vec::new();
        }
    };

    let total = items.len();
    let tickets: Vec<DerivedTicket> = items.iter().filter_map(validate_record).collect();
    if tickets.len() < total {
        tracing::warn!(
            accepted = tickets.len(),
            dropped = total - tickets.len(),
            "Dropped malformed ticket records"
        );
    }
    tickets
}

fn validate_record(value: &Value) -> Option<DerivedTicket> {
    let obj = value.as_object()?;

    let title = non_empty_str(obj.get("title"))?;
    let description = non_empty_str(obj.get("description"))?;

    Some(DerivedTicket {
        title: title.chars().take(MAX_TITLE_CHARS).collect(),
        description: description.to_string(),
        priority: TicketPriority::from_loose(obj.get("priority").and_then(Value::as_str)),
        estimated_hours: coerce_hours(obj.get("estimated_hours")),
    })
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Numbers or numeric strings; anything negative, non-finite or unreadable is 0.
fn coerce_hours(value: Option<&Value>) -> f64 {
    let hours = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match hours {
        Some(h) if h.is_finite() && h >= 0.0 => h,
        _ => 0.0,
    }
}
