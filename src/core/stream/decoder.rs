/// Event name used when a block carries no `event:` field.
pub const DEFAULT_EVENT_NAME: &str = "message";

/// One decoded unit of the chat event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireEvent {
    /// Case-preserved event name; the dispatcher lower-cases it.
    pub name: String,
    pub data: String,
}

impl WireEvent {
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    pub fn message(data: impl Into<String>) -> Self {
        Self::new(DEFAULT_EVENT_NAME, data)
    }
}

/// Decode one framed block into a [`WireEvent`].
///
/// Only `event:` and `data:` fields are understood; every other line is
/// skipped. Blank blocks decode to `None`.
pub fn decode_block(block: &str) -> Option<WireEvent> {
    if block.trim().is_empty() {
        return None;
    }

    let mut name: Option<String> = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for raw_line in block.split('\n') {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        if let Some(value) = line.strip_prefix("event:") {
            name = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(data_field_value(value));
        }
    }

    Some(WireEvent {
        name: name.unwrap_or_else(|| DEFAULT_EVENT_NAME.to_string()),
        data: data_lines.join("\n"),
    })
}

/// Strip exactly one framing space and one trailing carriage return.
fn data_field_value(value: &str) -> &str {
    let value = value.strip_prefix(' ').unwrap_or(value);
    value.strip_suffix('\r').unwrap_or(value)
}
