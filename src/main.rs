//! claimdesk operator CLI
//!
//! Thin shell over the library: loads configuration, sets up logging and runs
//! one workflow action against the backend.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use claimdesk::config::{self, Config};
use claimdesk::core::rooms::{PriceOrder, RoomFilter};
use claimdesk::core::{ClaimCard, HospitalDesk, InsurerDesk, RoomDesk, Snapshot};
use claimdesk::api::{ClaimsGateway, HttpGateway};
use claimdesk::session::Session;

#[derive(Parser)]
#[command(name = "claimdesk", about = "Hospital and insurer claims desk")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Overrides the configured API base URL.
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Signed-in user's e-mail; its domain suffix decides the role.
    #[arg(long, global = true, env = "CLAIMDESK_EMAIL")]
    email: Option<String>,
    #[arg(long, global = true, env = "CLAIMDESK_USER_ID")]
    user_id: Option<String>,
    /// Required for hospital staff.
    #[arg(long, global = true, env = "CLAIMDESK_HOSPITAL_ID")]
    hospital_id: Option<String>,
}

impl Cli {
    fn session(&self) -> Result<Session> {
        let email = self.email.clone().context("--email is required for this command")?;
        let user_id = self.user_id.clone().context("--user-id is required for this command")?;
        Session::start(user_id, email, self.hospital_id.clone()).map_err(user_facing)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show a claim and its current stage.
    Show { claim_id: String },
    /// List the claims the signed-in hospital is tracking.
    Track,
    /// Admit the patient on a decided pre-authorization.
    Admit {
        claim_id: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Mark an approved claim as settled.
    Settle { claim_id: String },
    /// Re-raise a denied claim.
    ReRaise { claim_id: String, message: String },
    /// Deny a raised claim.
    Deny { claim_id: String, reason: String },
    /// List rooms.
    Rooms {
        #[arg(long, default_value = "all")]
        filter: RoomFilter,
        #[arg(long)]
        sort: Option<PriceOrder>,
    },
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn summary(snapshot: &Snapshot) -> String {
    format!(
        "{} {} [{}] {}",
        snapshot.claim.id,
        snapshot.claim.customer.name,
        snapshot.view.stage.label(),
        snapshot.claim.treatment_offered
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = config::load_config().context("Failed to load configuration")?;
    if let Some(base_url) = cli.base_url.clone() {
        config.api.base_url = base_url;
    }
    init_tracing(&config);

    let gateway = Arc::new(HttpGateway::new(&config.api).context("Invalid API configuration")?);
    info!(base_url = %gateway.base_url(), "claimdesk starting");

    match &cli.command {
        Commands::Show { claim_id } => {
            let claim = gateway.fetch_claim(claim_id).await?;
            print(&Snapshot::new(claim))?;
        }
        Commands::Track => {
            let desk = HospitalDesk::for_session(gateway, &cli.session()?).map_err(user_facing)?;
            for snapshot in desk.tracked_claims().await? {
                println!("{}", summary(&snapshot));
            }
        }
        Commands::Admit { claim_id, notes } => {
            let desk = HospitalDesk::for_session(Arc::clone(&gateway), &cli.session()?).map_err(user_facing)?;
            let claim = gateway.fetch_claim(claim_id).await?;
            let snapshot = desk.admit_patient(&claim, notes.as_deref()).await.map_err(user_facing)?;
            println!("{}", summary(&snapshot));
        }
        Commands::Settle { claim_id } => {
            let desk = HospitalDesk::for_session(Arc::clone(&gateway), &cli.session()?).map_err(user_facing)?;
            let claim = gateway.fetch_claim(claim_id).await?;
            let snapshot = desk.settle_claim(&claim).await.map_err(user_facing)?;
            println!("{}", summary(&snapshot));
        }
        Commands::ReRaise { claim_id, message } => {
            let desk = HospitalDesk::for_session(Arc::clone(&gateway), &cli.session()?).map_err(user_facing)?;
            let claim = gateway.fetch_claim(claim_id).await?;
            let mut card = ClaimCard::new(Snapshot::new(claim));
            card.drafts_mut().re_raise_message = message.clone();
            let snapshot = desk.submit_re_raise(&mut card).await.map_err(user_facing)?;
            println!("{}", summary(&snapshot));
        }
        Commands::Deny { claim_id, reason } => {
            let desk = InsurerDesk::for_session(Arc::clone(&gateway), &cli.session()?).map_err(user_facing)?;
            let claim = gateway.fetch_claim(claim_id).await?;
            let mut card = ClaimCard::new(Snapshot::new(claim));
            card.edit_denial();
            card.drafts_mut().denial_reason = reason.clone();
            let snapshot = desk.submit_denial(&mut card).await.map_err(user_facing)?;
            println!("{}", summary(&snapshot));
        }
        Commands::Rooms { filter, sort } => {
            let desk = RoomDesk::new(gateway);
            print(&desk.rooms(*filter, *sort).await?)?;
        }
    }

    Ok(())
}

fn user_facing(err: claimdesk::ClaimError) -> anyhow::Error {
    anyhow::anyhow!(err.user_message())
}
