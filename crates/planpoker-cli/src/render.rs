//! Text and JSON output for session views

use planpoker_core::domain::session::{
    RoundPhase, SessionView, TicketDisplay, ViewState, VoteSummary, VotingCard,
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// One row of the participant table
#[derive(Debug, Serialize)]
pub struct ParticipantLine {
    pub id: Uuid,
    pub alias: String,
    pub voted: bool,
    /// Hidden until reveal, except for the viewer's own card
    pub vote: Option<VotingCard>,
    pub you: bool,
}

/// What a viewer is allowed to see of a session
#[derive(Debug, Serialize)]
pub struct SessionReport {
    pub id: Uuid,
    pub title: String,
    pub state: ViewState,
    pub phase: RoundPhase,
    pub you: Uuid,
    pub facilitator: bool,
    pub ticket: Option<TicketDisplay>,
    pub participants: Vec<ParticipantLine>,
    /// Present once votes are revealed
    pub summary: Option<VoteSummary>,
}

impl SessionReport {
    pub fn from_view(view: &SessionView) -> Option<Self> {
        let session = view.snapshot.as_ref()?;
        let revealed = session.votes_revealed;

        let participants = session
            .participants
            .iter()
            .map(|(id, p)| {
                let you = *id == view.user_id;
                ParticipantLine {
                    id: *id,
                    alias: p.alias.clone(),
                    voted: p.vote.is_some(),
                    vote: if revealed || you { p.vote } else { None },
                    you,
                }
            })
            .collect();

        Some(Self {
            id: session.id,
            title: session.title.clone(),
            state: view.state,
            phase: session.phase(),
            you: view.user_id,
            facilitator: view.is_facilitator(),
            ticket: view.ticket(),
            participants,
            summary: revealed.then(|| VoteSummary::from_session(session)),
        })
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Session: {} ({})\n", self.title, self.id));
        out.push_str(&format!("Phase: {}\n", self.phase));
        if self.facilitator {
            out.push_str("Role: facilitator\n");
        } else if self.state == ViewState::AwaitingAlias {
            out.push_str("Role: not joined\n");
        }
        if let Some(ticket) = &self.ticket {
            match &ticket.url {
                Some(url) => out.push_str(&format!("Ticket: {} <{}>\n", ticket.ticket_name, url)),
                None => out.push_str(&format!("Ticket: {}\n", ticket.ticket_name)),
            }
        }

        if self.participants.is_empty() {
            out.push_str("Participants: none yet\n");
        } else {
            out.push_str("Participants:\n");
            for p in &self.participants {
                let card = match (p.vote, p.voted) {
                    (Some(card), _) => card.to_string(),
                    (None, true) => "voted".to_string(),
                    (None, false) => "-".to_string(),
                };
                let marker = if p.you { " (you)" } else { "" };
                out.push_str(&format!("  {:<16} {}{}\n", p.alias, card, marker));
            }
        }

        if let Some(summary) = &self.summary {
            out.push_str("Tally:\n");
            for (card, count) in &summary.counts {
                out.push_str(&format!("  {:>3}: {}\n", card.as_str(), count));
            }
            out.push_str(&format!("Average: {}\n", summary.format_average()));
        }
        out
    }
}

/// Print the view in the requested format
pub fn print_view(view: &SessionView, format: OutputFormat) -> anyhow::Result<()> {
    let Some(report) = SessionReport::from_view(view) else {
        anyhow::bail!("Session not found");
    };
    match format {
        OutputFormat::Text => print!("{}", report.render_text()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

/// Parse a card from the command line; "coffee" stands in for the cup glyph
pub fn parse_card(raw: &str) -> planpoker_core::Result<VotingCard> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "coffee" | "break" => Ok(VotingCard::Coffee),
        _ => raw.parse(),
    }
}
