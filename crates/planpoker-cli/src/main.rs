//! Planpoker CLI - planning poker sessions over a shared store

mod render;
mod simulate;

use clap::{Parser, Subcommand};
use planpoker_core::config::Config;
use planpoker_core::domain::identity::{
    AnonymousAuth, AuthProvider, MemoryAliasHints, ensure_identity,
};
use planpoker_core::domain::session::{
    Lobby, SessionController, SessionStore, SqliteSessionStore, ViewState,
};
use planpoker_core::storage::{Database, DatabaseConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use render::{OutputFormat, parse_card, print_view};

#[derive(Parser)]
#[command(name = "planpoker")]
#[command(author, version, long_about = None)]
#[command(about = "Planning poker sessions over a shared session store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// SQLite database file (defaults to the configured location)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Act as this identity instead of signing in anonymously
    #[arg(long, global = true)]
    user: Option<Uuid>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new session; you become its facilitator
    Create {
        /// Session title
        #[arg(short, long, default_value = "")]
        title: String,
    },

    /// Show a session
    Show { session_id: String },

    /// Join a session under an alias
    Join {
        session_id: String,
        #[arg(short, long)]
        alias: String,
    },

    /// Play a card (0 1 2 3 5 8 13 21 ? coffee); playing it again withdraws it
    Vote { session_id: String, card: String },

    /// Set the ticket being estimated (facilitator only)
    Ticket { session_id: String, ticket: String },

    /// Reveal all votes (facilitator only)
    Reveal { session_id: String },

    /// Clear votes and ticket for a new round (facilitator only)
    Reset { session_id: String },

    /// Run concurrent voters against an in-memory store
    Simulate {
        /// Number of voting clients
        #[arg(short, long, default_value_t = 4)]
        clients: usize,
        /// Seed for card choice
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show all settings
    Show,
    /// Show the config file path
    Path,
    /// Get a setting
    Get { key: String },
    /// Change a setting
    Set { key: String, value: String },
}

/// Everything a session command needs
struct App {
    store: Arc<dyn SessionStore>,
    auth: Arc<AnonymousAuth>,
    config: Config,
    format: OutputFormat,
    quiet: bool,
}

impl App {
    async fn open(cli: &Cli, config: Config) -> anyhow::Result<Self> {
        let db_config = match &cli.db {
            Some(path) => {
                DatabaseConfig::with_path(path).max_connections(config.storage.max_connections)
            }
            None => config.database_config(),
        };
        let db = Database::new(db_config).await?;
        debug!(path = %db.path().display(), "Opened session database");

        let auth = match cli.user {
            Some(user_id) => AnonymousAuth::with_user(user_id),
            None => AnonymousAuth::new(),
        };

        Ok(Self {
            store: Arc::new(SqliteSessionStore::new(db.pool().clone())),
            auth: Arc::new(auth),
            config,
            format: cli.format,
            quiet: cli.quiet,
        })
    }

    /// Make sure an identity exists and tell the user about fresh ones
    async fn identity(&self) -> anyhow::Result<Uuid> {
        let fresh = self.auth.current_user().await?.is_none();
        let user_id = ensure_identity(self.auth.as_ref()).await?;
        if fresh && !self.quiet {
            eprintln!("Signed in anonymously as {user_id}");
            eprintln!("  Pass --user {user_id} to act as this identity again");
        }
        Ok(user_id)
    }

    /// Enter `raw_id`, failing when it does not name a session
    async fn enter(&self, raw_id: &str) -> anyhow::Result<SessionController> {
        self.identity().await?;
        let mut controller = SessionController::new(
            self.store.clone(),
            self.auth.clone(),
            Arc::new(MemoryAliasHints::new()),
            self.config.retry_policy(),
        );
        if controller.enter(raw_id).await? == ViewState::NotFound {
            anyhow::bail!("Session not found: {}", raw_id.trim());
        }
        Ok(controller)
    }

    async fn show(&self, controller: &mut SessionController) -> anyhow::Result<()> {
        let view = controller.view().await;
        controller.leave().await;
        print_view(&view, self.format)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let directive = if cli.quiet { "planpoker=warn" } else { "planpoker=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err}");
        if let Some(core) = err.downcast_ref::<planpoker_core::Error>() {
            if let Some(suggestion) = core.suggestion() {
                eprintln!("  Try: {suggestion}");
            }
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Config { action } = &cli.command {
        return cmd_config(action, cli.quiet);
    }

    let config = Config::load()?;

    if let Commands::Simulate { clients, seed } = &cli.command {
        return cmd_simulate(*clients, *seed, &config, cli.format).await;
    }

    let app = App::open(&cli, config).await?;
    match &cli.command {
        Commands::Create { title } => cmd_create(&app, title).await,
        Commands::Show { session_id } => {
            let mut controller = app.enter(session_id).await?;
            app.show(&mut controller).await
        }
        Commands::Join { session_id, alias } => {
            let mut controller = app.enter(session_id).await?;
            controller.join(alias).await?;
            app.show(&mut controller).await
        }
        Commands::Vote { session_id, card } => {
            let card = parse_card(card)?;
            let mut controller = app.enter(session_id).await?;
            controller.vote(card).await?;
            app.show(&mut controller).await
        }
        Commands::Ticket { session_id, ticket } => {
            let mut controller = app.enter(session_id).await?;
            controller.set_ticket(ticket).await?;
            app.show(&mut controller).await
        }
        Commands::Reveal { session_id } => {
            let mut controller = app.enter(session_id).await?;
            controller.reveal().await?;
            app.show(&mut controller).await
        }
        Commands::Reset { session_id } => {
            let mut controller = app.enter(session_id).await?;
            controller.reset().await?;
            app.show(&mut controller).await
        }
        Commands::Simulate { .. } | Commands::Config { .. } => Ok(()),
    }
}

async fn cmd_create(app: &App, title: &str) -> anyhow::Result<()> {
    app.identity().await?;
    let lobby = Lobby::new(app.store.clone(), app.auth.clone())
        .with_default_title(app.config.session.default_title.clone());
    let session = lobby.create_session(title).await?;

    match app.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&session)?),
        OutputFormat::Text => {
            if app.quiet {
                println!("{}", session.id);
            } else {
                println!("Created session: {}", session.title);
                println!("Session ID: {}", session.id);
                println!("Facilitator: {}", session.created_by);
            }
        }
    }
    Ok(())
}

async fn cmd_simulate(
    clients: usize,
    seed: Option<u64>,
    config: &Config,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let report = simulate::run(clients, seed, config.retry_policy()).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print!("{}", report.render_text()),
    }
    Ok(())
}

fn cmd_config(action: &ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let config = Config::load()?;
            for (key, value) in config.list()? {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Path => {
            println!("{}", Config::config_path()?.display());
        }
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            println!("{}", config.get(key)?);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(key, value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
    }
    Ok(())
}
