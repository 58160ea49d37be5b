use clap::{Args, Parser, Subcommand, ValueEnum};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::path::PathBuf;
use uuid::Uuid;

use crate::entities::EntityRef;
use crate::permissions::Role;
use crate::teams::TransferScope;

pub mod commands;

#[derive(Parser)]
#[command(name = "agency-desk")]
#[command(about = "Back-office workflow for an insurance agency")]
#[command(long_about = "agency-desk keeps clients, policies, claims and their documents, enforces \
                       who may do what, and drives the policy validation and claim workflows. \
                       Results are printed as JSON on stdout; logs go to stderr.")]
pub struct Cli {
    /// Configuration file (defaults to ./agency-desk.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Store snapshot file, overriding persistence.state_file
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// Email of the acting user
    #[arg(long, global = true, env = "AGENCY_DESK_ACTOR")]
    pub actor: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the first admin of an empty installation
    Bootstrap {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
    },
    /// Client records
    #[command(subcommand)]
    Client(ClientAction),
    /// Policy records and the validation workflow
    #[command(subcommand)]
    Policy(PolicyAction),
    /// Claims and their status workflow
    #[command(subcommand)]
    Claim(ClaimAction),
    /// Documents attached to policies and claims
    #[command(subcommand)]
    Document(DocumentAction),
    /// User accounts and roles
    #[command(subcommand)]
    Actor(ActorAction),
    /// Teams and membership
    #[command(subcommand)]
    Team(TeamAction),
    /// Move policies and clients from one user to another (admin)
    Transfer {
        #[arg(long)]
        from: Uuid,
        #[arg(long)]
        to: Uuid,
        /// policies, clients or both
        #[arg(long, default_value = "both")]
        scope: TransferScope,
        /// Specific records to move; everything owned by --from when omitted
        #[arg(long = "id")]
        ids: Vec<Uuid>,
    },
    /// Transition history of a record
    History {
        #[arg(value_enum)]
        kind: RecordKind,
        id: Uuid,
    },
    /// Edit grants held by the acting user
    Grants {
        /// Revoke every grant whose window has passed instead (admin only)
        #[arg(long)]
        sweep: bool,
    },
    /// Record counts across the installation (admin only)
    Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RecordKind {
    Client,
    Policy,
    Claim,
    Document,
    Actor,
    Team,
}

impl RecordKind {
    pub fn entity_ref(self, id: Uuid) -> EntityRef {
        match self {
            RecordKind::Client => EntityRef::Client(id),
            RecordKind::Policy => EntityRef::Policy(id),
            RecordKind::Claim => EntityRef::Claim(id),
            RecordKind::Document => EntityRef::Document(id),
            RecordKind::Actor => EntityRef::Actor(id),
            RecordKind::Team => EntityRef::Team(id),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[arg(long, default_value = "1")]
    pub page: usize,
    #[arg(long, default_value = "20")]
    pub page_size: usize,
    #[arg(long)]
    pub search: Option<String>,
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long)]
    pub owner: Option<Uuid>,
}

#[derive(Subcommand)]
pub enum ClientAction {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        tax_id: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        owner: Option<Uuid>,
    },
    /// Edit contact fields; an empty value clears email or phone
    Update {
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        tax_id: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    Show {
        id: Uuid,
    },
    List(ListArgs),
}

#[derive(Subcommand)]
pub enum PolicyAction {
    Create {
        #[arg(long)]
        number: String,
        #[arg(long)]
        client: Uuid,
        /// Line of business, e.g. autos, gastos_medicos, hogar, vida
        #[arg(long)]
        line: String,
        #[arg(long)]
        insurer: String,
        #[arg(long)]
        premium: Decimal,
        #[arg(long, default_value = "MXN")]
        currency: String,
        #[arg(long)]
        valid_from: NaiveDate,
        #[arg(long)]
        valid_to: NaiveDate,
        #[arg(long)]
        responsible: Option<Uuid>,
    },
    /// Edit fields; the status effect depends on the current status
    Update {
        id: Uuid,
        #[arg(long)]
        number: Option<String>,
        #[arg(long)]
        line: Option<String>,
        #[arg(long)]
        insurer: Option<String>,
        #[arg(long)]
        premium: Option<Decimal>,
        #[arg(long)]
        currency: Option<String>,
        #[arg(long)]
        valid_from: Option<NaiveDate>,
        #[arg(long)]
        valid_to: Option<NaiveDate>,
    },
    Approve {
        id: Uuid,
        #[arg(long)]
        note: Option<String>,
    },
    /// Reject a pending policy and notify its creator
    Reject {
        id: Uuid,
        #[arg(long)]
        reason: String,
    },
    Resubmit {
        id: Uuid,
        #[arg(long)]
        note: Option<String>,
    },
    Cancel {
        id: Uuid,
        #[arg(long)]
        note: Option<String>,
    },
    Renew {
        id: Uuid,
        #[arg(long)]
        note: Option<String>,
    },
    Show {
        id: Uuid,
    },
    List(ListArgs),
    /// Delete the policy with its claims and documents (admin)
    Purge {
        id: Uuid,
    },
}

#[derive(Subcommand)]
pub enum ClaimAction {
    Create {
        #[arg(long)]
        policy: Uuid,
        #[arg(long)]
        description: String,
        #[arg(long)]
        incident_date: NaiveDate,
        #[arg(long = "coverage")]
        coverages: Vec<String>,
        #[arg(long)]
        responsible: Option<Uuid>,
    },
    Update {
        id: Uuid,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        incident_date: Option<NaiveDate>,
        #[arg(long = "coverage")]
        coverages: Option<Vec<String>>,
    },
    /// Move the claim to another status of the catalog
    Transition {
        id: Uuid,
        #[arg(long)]
        to: String,
        #[arg(long)]
        note: Option<String>,
    },
    Reassign {
        id: Uuid,
        #[arg(long)]
        to: Uuid,
    },
    Show {
        id: Uuid,
    },
    List(ListArgs),
    /// Status catalog in use
    Statuses,
    Purge {
        id: Uuid,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ParentKind {
    Policy,
    Claim,
}

impl ParentKind {
    pub fn entity_ref(self, id: Uuid) -> EntityRef {
        match self {
            ParentKind::Policy => EntityRef::Policy(id),
            ParentKind::Claim => EntityRef::Claim(id),
        }
    }
}

#[derive(Subcommand)]
pub enum DocumentAction {
    Attach {
        #[arg(long, value_enum)]
        parent_kind: ParentKind,
        #[arg(long)]
        parent: Uuid,
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value = "application/octet-stream")]
        content_type: String,
    },
    /// Hide a document from ordinary listings
    Discard {
        id: Uuid,
    },
    /// Bring a discarded document back (admin)
    Restore {
        id: Uuid,
    },
    /// Remove the record and its stored file (admin)
    Delete {
        id: Uuid,
    },
    List {
        #[arg(long, value_enum)]
        parent_kind: ParentKind,
        #[arg(long)]
        parent: Uuid,
        /// Include discarded documents (admin)
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand)]
pub enum ActorAction {
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        role: Role,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        team: Option<Uuid>,
    },
    Role {
        id: Uuid,
        role: Role,
    },
    Deactivate {
        id: Uuid,
    },
    List,
}

#[derive(Subcommand)]
pub enum TeamAction {
    Create {
        name: String,
    },
    List,
    /// Put an actor in a team, or take them out with no --team
    Assign {
        actor: Uuid,
        #[arg(long)]
        team: Option<Uuid>,
    },
    Members {
        id: Uuid,
    },
}
