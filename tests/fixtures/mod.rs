//! Shared harness for integration tests: an in-memory store, a hand-driven
//! clock, and storage/notification doubles whose failures tests can switch on.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use agency_desk::entities::{Claim, Client, NewClaim, NewClient, NewPolicy, Policy};
use agency_desk::notifications::{Message, NotificationChannel, NotificationError};
use agency_desk::permissions::{RequestContext, Role};
use agency_desk::storage::{ObjectStorage, StorageError};
use agency_desk::teams::NewActor;
use agency_desk::{BackOffice, InMemoryStore, ManualClock};

/// Keeps object paths in memory; deletes fail while `fail_deletes` is set
#[derive(Debug, Default)]
pub struct FlakyStorage {
    objects: Mutex<HashSet<String>>,
    fail_deletes: AtomicBool,
}

impl FlakyStorage {
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.lock().unwrap().contains(path)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStorage for FlakyStorage {
    async fn put_object(&self, path: &str, _contents: &[u8]) -> Result<(), StorageError> {
        self.objects.lock().unwrap().insert(path.to_string());
        Ok(())
    }

    async fn delete_object(&self, path: &str) -> Result<(), StorageError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("bucket offline".to_string()));
        }
        if self.objects.lock().unwrap().remove(path) {
            Ok(())
        } else {
            Err(StorageError::NotFound(path.to_string()))
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.contains(path))
    }
}

/// Records every message it is asked to deliver
#[derive(Debug, Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<Message>>,
    reject: AtomicBool,
}

impl RecordingChannel {
    pub fn reject_all(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(&self, message: &Message) -> Result<(), NotificationError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(NotificationError::Rejected {
                channel: message.channel().to_string(),
                reason: "relay refused the message".to_string(),
            });
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub fn start_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub struct Harness {
    pub desk: BackOffice,
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<ManualClock>,
    pub storage: Arc<FlakyStorage>,
    pub channel: Arc<RecordingChannel>,
    pub admin: RequestContext,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(start_instant()));
        let storage = Arc::new(FlakyStorage::default());
        let channel = Arc::new(RecordingChannel::default());

        let desk = BackOffice::builder(store.clone())
            .clock(clock.clone())
            .storage(storage.clone())
            .channel(channel.clone())
            .build()
            .expect("default configuration builds");

        let admin = desk
            .directory
            .bootstrap_admin("admin@agencia.mx", "Administración")
            .expect("bootstrap admin");

        Self {
            desk,
            store,
            clock,
            storage,
            channel,
            admin: RequestContext::authenticated(admin),
        }
    }

    /// Registers an actor and returns a context acting as them
    pub fn actor(&self, email: &str, role: Role) -> RequestContext {
        let actor = self
            .desk
            .directory
            .register_actor(
                &self.admin,
                NewActor {
                    email: email.to_string(),
                    full_name: format!("Usuario {email}"),
                    role,
                    phone: None,
                    team_id: None,
                },
            )
            .expect("register actor");
        RequestContext::authenticated(actor)
    }

    pub fn client(&self, ctx: &RequestContext, phone: Option<&str>, email: Option<&str>) -> Client {
        self.desk
            .entities
            .create_client(
                ctx,
                NewClient {
                    full_name: "María López".to_string(),
                    tax_id: "LOPM800101ABC".to_string(),
                    email: email.map(str::to_string),
                    phone: phone.map(str::to_string),
                    owner_id: None,
                },
            )
            .expect("create client")
    }

    pub fn pending_policy(&self, ctx: &RequestContext, client: &Client, number: &str) -> Policy {
        self.desk
            .entities
            .create_policy(
                ctx,
                NewPolicy {
                    number: number.to_string(),
                    client_id: client.id,
                    line_of_business: "autos".to_string(),
                    insurer: "Seguros Atlas".to_string(),
                    premium: Decimal::new(1250000, 2),
                    currency: "MXN".to_string(),
                    valid_from: date(2026, 1, 1),
                    valid_to: date(2027, 1, 1),
                    responsible_id: None,
                },
            )
            .expect("create policy")
    }

    /// Pending policy approved by the admin
    pub fn active_policy(&self, ctx: &RequestContext, client: &Client, number: &str) -> Policy {
        let policy = self.pending_policy(ctx, client, number);
        self.desk
            .policies
            .approve(&self.admin, policy.id, None)
            .expect("approve policy")
    }

    pub fn claim(&self, ctx: &RequestContext, policy: &Policy) -> Claim {
        self.desk
            .entities
            .create_claim(
                ctx,
                NewClaim {
                    policy_id: policy.id,
                    description: "Choque en estacionamiento".to_string(),
                    incident_date: date(2026, 3, 1),
                    coverages: vec!["danos_materiales".to_string()],
                    responsible_id: None,
                },
            )
            .expect("create claim")
    }
}
