//! Ticket display
//!
//! Facilitators often paste a tracker URL instead of a key. The display
//! form pulls the issue key (e.g. `PROJ-123`) out of such URLs and keeps the
//! URL as a link target.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static URL_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://.+").expect("static URL pattern"));

static ISSUE_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z]+-\d+)").expect("static issue key pattern"));

/// How the current ticket should be shown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketDisplay {
    pub is_url: bool,
    pub ticket_name: String,
    pub url: Option<String>,
}

impl TicketDisplay {
    pub fn parse(input: &str) -> Self {
        if !URL_PREFIX.is_match(input) {
            return Self {
                is_url: false,
                ticket_name: input.to_string(),
                url: None,
            };
        }

        let ticket_name = ISSUE_KEY
            .captures(input)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| input.to_string());

        Self {
            is_url: true,
            ticket_name,
            url: Some(input.to_string()),
        }
    }
}
