use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::{Cli, Commands, ListArgs};
use crate::config::DeskConfig;
use crate::desk::BackOffice;
use crate::entities::ListQuery;
use crate::errors::DeskError;
use crate::observability::desk_metrics;
use crate::permissions::RequestContext;
use crate::results::{ListResult, MutationResult};
use crate::store::{InMemoryStore, SnapshotFile};
use crate::telemetry::{generate_correlation_id, init_telemetry};

pub mod admin;
pub mod claim;
pub mod client;
pub mod document;
pub mod policy;

/// One CLI invocation: the loaded store, the wired facade and the caller
pub struct Session {
    pub desk: BackOffice,
    pub ctx: RequestContext,
    store: Arc<InMemoryStore>,
    snapshot: SnapshotFile,
}

impl Session {
    pub async fn open(cli: &Cli, config: DeskConfig) -> Result<Self> {
        let snapshot = SnapshotFile::new(cli.state.clone().unwrap_or_else(|| config.state_file()));
        let state = snapshot
            .load()
            .await
            .with_context(|| format!("failed to load {}", snapshot.path().display()))?;
        let store = Arc::new(InMemoryStore::from_state(state));

        let desk = BackOffice::builder(store.clone()).config(config).build()?;
        let ctx = desk
            .context_for(cli.actor.as_deref())?
            .with_correlation_id(generate_correlation_id());

        Ok(Self {
            desk,
            ctx,
            store,
            snapshot,
        })
    }

    pub async fn close(self) -> Result<()> {
        let state = self.store.snapshot()?;
        self.snapshot
            .save(&state)
            .await
            .with_context(|| format!("failed to save {}", self.snapshot.path().display()))?;
        Ok(())
    }
}

/// Entry point shared by the binary: config, logging, store, dispatch
pub async fn run(cli: Cli) -> Result<()> {
    DeskConfig::load_env_file()?;
    let config = DeskConfig::load(cli.config.as_deref())?;
    init_telemetry(&config.observability)?;

    let Some(command) = &cli.command else {
        return show_usage();
    };

    let session = Session::open(&cli, config).await?;
    info!(correlation.id = %session.ctx.correlation_id(), "Session opened");

    let outcome = match command {
        Commands::Bootstrap { email, name } => admin::bootstrap(&session, email, name),
        Commands::Client(action) => client::ClientCommand::new(action).execute(&session),
        Commands::Policy(action) => policy::PolicyCommand::new(action).execute(&session).await,
        Commands::Claim(action) => claim::ClaimCommand::new(action).execute(&session).await,
        Commands::Document(action) => document::DocumentCommand::new(action).execute(&session).await,
        Commands::Actor(action) => admin::actor(&session, action),
        Commands::Team(action) => admin::team(&session, action),
        Commands::Transfer { from, to, scope, ids } => admin::transfer(&session, *from, *to, *scope, ids),
        Commands::History { kind, id } => admin::history(&session, kind.entity_ref(*id)),
        Commands::Grants { sweep } => admin::grants(&session, *sweep),
        Commands::Stats => emit(session.desk.summary(&session.ctx)),
    };

    session.close().await?;
    desk_metrics().log_stats();
    outcome
}

pub fn show_usage() -> Result<()> {
    println!("agency-desk - insurance agency back office");
    println!();
    println!("Getting started:");
    println!("  agency-desk bootstrap --email admin@agencia.mx --name 'Admin'");
    println!("  agency-desk --actor admin@agencia.mx actor register --email ... --role comercial");
    println!("  agency-desk --actor ventas@agencia.mx client create --name ... --tax-id ...");
    println!();
    println!("Run 'agency-desk --help' for every command.");
    Ok(())
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints a mutation outcome; backing-store failures abort the command
pub(crate) fn emit<T: Serialize>(result: Result<T, DeskError>) -> Result<()> {
    print_json(&MutationResult::from_result(result)?)
}

pub(crate) fn emit_list<T: Serialize>(result: Result<(Vec<T>, usize), DeskError>) -> Result<()> {
    print_json(&ListResult::from_result(result)?)
}

impl From<&ListArgs> for ListQuery {
    fn from(args: &ListArgs) -> Self {
        let mut query = ListQuery::page(args.page, args.page_size);
        if let Some(search) = &args.search {
            query = query.with_search(search.clone());
        }
        if let Some(status) = &args.status {
            query = query.with_status(status.clone());
        }
        if let Some(owner) = args.owner {
            query = query.with_owner(owner);
        }
        query
    }
}
