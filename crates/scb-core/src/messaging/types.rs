use crate::session::Mode;

/// Callback data prefix for mode buttons (`mode:apex`, `mode:host`).
pub const MODE_CALLBACK_PREFIX: &str = "mode:";

/// Inline keyboard, row by row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineKeyboard {
    pub fn new(rows: Vec<Vec<InlineButton>>) -> Self {
        Self { rows }
    }

    /// One row with an Apex and a Host button; the current mode is ticked.
    pub fn mode_picker(current: Mode) -> Self {
        let button = |mode: Mode, label: &str| InlineButton {
            label: if mode == current {
                format!("✅ {label}")
            } else {
                label.to_string()
            },
            callback_data: format!("{MODE_CALLBACK_PREFIX}{}", mode.as_str()),
        };
        Self::new(vec![vec![
            button(Mode::Apex, "Apex"),
            button(Mode::Host, "Host"),
        ]])
    }
}

/// Parse `mode:<value>` callback data. Unknown values are rejected.
pub fn parse_mode_callback(data: &str) -> Option<Mode> {
    data.strip_prefix(MODE_CALLBACK_PREFIX)?.parse::<Mode>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_picker_marks_current_mode() {
        let kb = InlineKeyboard::mode_picker(Mode::Host);
        assert_eq!(kb.rows.len(), 1);
        let labels: Vec<&str> = kb.rows[0].iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["Apex", "✅ Host"]);
        assert_eq!(kb.rows[0][0].callback_data, "mode:apex");
        assert_eq!(kb.rows[0][1].callback_data, "mode:host");
    }

    #[test]
    fn parses_mode_callbacks() {
        assert_eq!(parse_mode_callback("mode:apex"), Some(Mode::Apex));
        assert_eq!(parse_mode_callback("mode:host"), Some(Mode::Host));
        assert_eq!(parse_mode_callback("mode:other"), None);
        assert_eq!(parse_mode_callback("askuser:1:2"), None);
    }
}
