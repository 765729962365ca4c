//! In-process multi-client simulation
//!
//! Runs a facilitator and several voters against one in-memory store. All
//! voters cast their cards at the same time, one of them then reconnects
//! under a new identity, and the facilitator reveals.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use planpoker_core::domain::identity::{AnonymousAuth, MemoryAliasHints, MigrationOutcome};
use planpoker_core::domain::session::{
    InMemorySessionStore, Lobby, SessionController, SessionStore, VoteSummary, VotingCard,
};
use planpoker_core::domain::sync::RetryPolicy;

#[derive(Debug, Serialize)]
pub struct VoteOutcome {
    pub alias: String,
    pub card: VotingCard,
    pub landed: bool,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReconnectOutcome {
    pub alias: String,
    pub old_id: Uuid,
    pub new_id: Uuid,
    pub migrated: bool,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub session_id: Uuid,
    pub seed: u64,
    pub votes: Vec<VoteOutcome>,
    pub reconnect: Option<ReconnectOutcome>,
    pub summary: VoteSummary,
}

impl SimulationReport {
    pub fn landed(&self) -> usize {
        self.votes.iter().filter(|v| v.landed).count()
    }

    pub fn render_text(&self) -> String {
        let mut out = format!("Simulated session {} (seed {})\n", self.session_id, self.seed);
        for vote in &self.votes {
            let status = match &vote.error {
                None => "landed".to_string(),
                Some(e) => format!("abandoned: {}", e),
            };
            out.push_str(&format!("  {:<10} {:>3}  {}\n", vote.alias, vote.card.as_str(), status));
        }
        out.push_str(&format!("Votes landed: {}/{}\n", self.landed(), self.votes.len()));
        if let Some(r) = &self.reconnect {
            let how = if r.migrated { "slot migrated" } else { "joined fresh" };
            out.push_str(&format!(
                "Reconnected {}: {} -> {} ({})\n",
                r.alias, r.old_id, r.new_id, how
            ));
        }
        out.push_str("Tally:\n");
        for (card, count) in &self.summary.counts {
            out.push_str(&format!("  {:>3}: {}\n", card.as_str(), count));
        }
        out.push_str(&format!("Average: {}\n", self.summary.format_average()));
        out
    }
}

struct Voter {
    alias: String,
    auth: Arc<AnonymousAuth>,
    controller: SessionController,
}

pub async fn run(
    clients: usize,
    seed: Option<u64>,
    policy: RetryPolicy,
) -> anyhow::Result<SimulationReport> {
    anyhow::ensure!(clients > 0, "at least one client is required");
    let seed = seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);

    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let facilitator_auth = Arc::new(AnonymousAuth::new());
    let session = Lobby::new(store.clone(), facilitator_auth.clone())
        .create_session("Simulated round")
        .await?;
    let link = session.id.to_string();
    info!(session_id = %session.id, clients, seed, "Starting simulation");

    let mut voters = Vec::with_capacity(clients);
    for i in 0..clients {
        let auth = Arc::new(AnonymousAuth::new());
        let hints = Arc::new(MemoryAliasHints::new());
        let mut controller = SessionController::new(store.clone(), auth.clone(), hints, policy);
        controller.enter(&link).await?;
        let alias = format!("Voter{}", i + 1);
        controller.join(&alias).await?;
        voters.push(Voter {
            alias,
            auth,
            controller,
        });
    }

    // Everybody votes at once
    let mut tasks = Vec::with_capacity(clients);
    for voter in voters {
        let card = VotingCard::ALL[rng.gen_range(0..VotingCard::ALL.len())];
        tasks.push(tokio::spawn(async move {
            let result = voter.controller.vote(card).await;
            (voter, card, result)
        }));
    }

    let mut voters = Vec::with_capacity(clients);
    let mut votes = Vec::with_capacity(clients);
    for task in tasks {
        let (voter, card, result) = task.await?;
        votes.push(VoteOutcome {
            alias: voter.alias.clone(),
            card,
            landed: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
        });
        voters.push(voter);
    }

    let reconnect = match voters.first_mut() {
        Some(voter) => {
            let old_id = voter.controller.view().await.user_id;
            let new_id = voter.auth.reauthenticate().await?;
            voter.controller.enter(&link).await?;
            let migrated = matches!(
                voter.controller.last_migration(),
                Some(MigrationOutcome::Migrated { .. })
            );
            Some(ReconnectOutcome {
                alias: voter.alias.clone(),
                old_id,
                new_id,
                migrated,
            })
        }
        None => None,
    };

    let mut facilitator = SessionController::new(
        store.clone(),
        facilitator_auth,
        Arc::new(MemoryAliasHints::new()),
        policy,
    );
    facilitator.enter(&link).await?;
    let revealed = facilitator.reveal().await?;
    let summary = VoteSummary::from_session(&revealed);

    facilitator.leave().await;
    for voter in &mut voters {
        voter.controller.leave().await;
    }

    Ok(SimulationReport {
        session_id: session.id,
        seed,
        votes,
        reconnect,
        summary,
    })
}
