// Actor directory - registration, role changes, team membership

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::Team;
use crate::clock::Clock;
use crate::entities::types::{is_valid_email, non_empty};
use crate::entities::{EntityKind, EntityRef};
use crate::errors::DeskError;
use crate::permissions::{Action, Actor, PermissionOracle, RequestContext, Role};
use crate::store::DeskStore;
use crate::workflows::AuditTrail;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewActor {
    pub email: String,
    pub full_name: String,
    pub role: Role,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub team_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct ActorDirectory {
    store: Arc<dyn DeskStore>,
    oracle: Arc<dyn PermissionOracle>,
    clock: Arc<dyn Clock>,
    audit: AuditTrail,
}

impl ActorDirectory {
    pub fn new(store: Arc<dyn DeskStore>, oracle: Arc<dyn PermissionOracle>, clock: Arc<dyn Clock>) -> Self {
        Self {
            audit: AuditTrail::new(store.clone(), oracle.clone()),
            store,
            oracle,
            clock,
        }
    }

    fn load(&self, id: Uuid) -> Result<Actor, DeskError> {
        self.store
            .actor(id)?
            .ok_or_else(|| DeskError::not_found(EntityKind::Actor, id))
    }

    fn active_admins(&self) -> Result<usize, DeskError> {
        Ok(self
            .store
            .actors()?
            .iter()
            .filter(|a| a.active && a.role.is_admin())
            .count())
    }

    /// Fails with `LastAdmin` when `target` is the only active admin
    fn guard_last_admin(&self, target: &Actor) -> Result<(), DeskError> {
        if target.active && target.role.is_admin() && self.active_admins()? <= 1 {
            warn!(actor.id = %target.id, "Refused to remove the last active admin");
            return Err(DeskError::LastAdmin { actor_id: target.id });
        }
        Ok(())
    }

    fn build_actor(&self, new: NewActor) -> Result<Actor, DeskError> {
        let email = new.email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(DeskError::validation(format!("'{email}' is not a valid email")));
        }
        if new.full_name.trim().is_empty() {
            return Err(DeskError::validation("full name is required"));
        }
        if self.store.actor_by_email(&email)?.is_some() {
            return Err(DeskError::validation(format!("an actor with email '{email}' already exists")));
        }
        if let Some(team_id) = new.team_id {
            if self.store.team(team_id)?.is_none() {
                return Err(DeskError::not_found(EntityKind::Team, team_id));
            }
        }

        let mut actor = Actor::new(&email, &new.full_name, new.role, self.clock.now());
        actor.phone = new.phone.as_deref().and_then(non_empty);
        actor.team_id = new.team_id;
        Ok(actor)
    }

    /// Creates the first admin of an empty installation
    pub fn bootstrap_admin(&self, email: &str, full_name: &str) -> Result<Actor, DeskError> {
        if !self.store.actors()?.is_empty() {
            return Err(DeskError::validation("installation already has actors"));
        }
        let actor = self.build_actor(NewActor {
            email: email.to_string(),
            full_name: full_name.to_string(),
            role: Role::Admin,
            phone: None,
            team_id: None,
        })?;
        self.store.save_actor(&actor)?;
        info!(actor.id = %actor.id, email = %actor.email, "Bootstrap admin created");
        Ok(actor)
    }

    pub fn register_actor(&self, ctx: &RequestContext, new: NewActor) -> Result<Actor, DeskError> {
        self.oracle.check(ctx, Action::ManageActors)?;
        let actor = self.build_actor(new)?;
        self.store.save_actor(&actor)?;
        info!(
            correlation.id = %ctx.correlation_id(),
            actor.id = %actor.id,
            role = %actor.role,
            "Actor registered"
        );
        Ok(actor)
    }

    pub fn change_role(&self, ctx: &RequestContext, actor_id: Uuid, role: Role) -> Result<Actor, DeskError> {
        let admin = self.oracle.check(ctx, Action::ManageActors)?;
        let mut target = self.load(actor_id)?;
        if target.role == role {
            return Ok(target);
        }
        if !role.is_admin() {
            self.guard_last_admin(&target)?;
        }

        let previous = target.role;
        target.role = role;
        self.store.save_actor(&target)?;
        self.audit.record(
            EntityRef::Actor(target.id),
            admin.id,
            self.clock.now(),
            previous.as_str(),
            role.as_str(),
            Some("role change"),
        )?;

        info!(
            correlation.id = %ctx.correlation_id(),
            actor.id = %target.id,
            from = %previous,
            to = %role,
            "Actor role changed"
        );
        Ok(target)
    }

    pub fn deactivate_actor(&self, ctx: &RequestContext, actor_id: Uuid) -> Result<Actor, DeskError> {
        let admin = self.oracle.check(ctx, Action::ManageActors)?;
        let mut target = self.load(actor_id)?;
        if !target.active {
            return Ok(target);
        }
        self.guard_last_admin(&target)?;

        target.active = false;
        self.store.save_actor(&target)?;
        self.audit.record(
            EntityRef::Actor(target.id),
            admin.id,
            self.clock.now(),
            "active",
            "inactive",
            None,
        )?;

        info!(correlation.id = %ctx.correlation_id(), actor.id = %target.id, "Actor deactivated");
        Ok(target)
    }

    pub fn list_actors(&self, ctx: &RequestContext) -> Result<Vec<Actor>, DeskError> {
        self.oracle.check(ctx, Action::ManageActors)?;
        let mut actors = self.store.actors()?;
        actors.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(actors)
    }

    /// Resolves a login email to an actor, for building request contexts
    pub fn find_by_email(&self, email: &str) -> Result<Option<Actor>, DeskError> {
        Ok(self.store.actor_by_email(email)?)
    }

    pub fn create_team(&self, ctx: &RequestContext, name: &str) -> Result<Team, DeskError> {
        self.oracle.check(ctx, Action::ManageTeams)?;
        let name = non_empty(name).ok_or_else(|| DeskError::validation("team name is required"))?;
        if self
            .store
            .teams()?
            .iter()
            .any(|t| t.name.to_lowercase() == name.to_lowercase())
        {
            return Err(DeskError::validation(format!("team '{name}' already exists")));
        }

        let team = Team {
            id: Uuid::new_v4(),
            name,
            created_at: self.clock.now(),
        };
        self.store.save_team(&team)?;
        info!(correlation.id = %ctx.correlation_id(), team.id = %team.id, team.name = %team.name, "Team created");
        Ok(team)
    }

    pub fn list_teams(&self, ctx: &RequestContext) -> Result<Vec<Team>, DeskError> {
        self.oracle.check(ctx, Action::ManageTeams)?;
        let mut teams = self.store.teams()?;
        teams.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(teams)
    }

    /// Moves an actor into `team_id`, or out of any team with `None`
    pub fn assign_to_team(&self, ctx: &RequestContext, actor_id: Uuid, team_id: Option<Uuid>) -> Result<Actor, DeskError> {
        self.oracle.check(ctx, Action::ManageTeams)?;
        let mut actor = self.load(actor_id)?;
        if let Some(team_id) = team_id {
            if self.store.team(team_id)?.is_none() {
                return Err(DeskError::not_found(EntityKind::Team, team_id));
            }
        }

        actor.team_id = team_id;
        self.store.save_actor(&actor)?;
        info!(
            correlation.id = %ctx.correlation_id(),
            actor.id = %actor.id,
            team.id = ?team_id,
            "Team membership updated"
        );
        Ok(actor)
    }

    pub fn team_members(&self, ctx: &RequestContext, team_id: Uuid) -> Result<Vec<Actor>, DeskError> {
        self.oracle.check(ctx, Action::ManageTeams)?;
        if self.store.team(team_id)?.is_none() {
            return Err(DeskError::not_found(EntityKind::Team, team_id));
        }
        let mut members: Vec<Actor> = self
            .store
            .actors()?
            .into_iter()
            .filter(|a| a.team_id == Some(team_id))
            .collect();
        members.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::permissions::RoleBasedOracle;
    use crate::store::InMemoryStore;

    fn directory() -> (ActorDirectory, RequestContext) {
        let store = Arc::new(InMemoryStore::new());
        let directory = ActorDirectory::new(store, Arc::new(RoleBasedOracle::new()), Arc::new(SystemClock));
        let admin = directory.bootstrap_admin("admin@agencia.mx", "Admin").unwrap();
        (directory, RequestContext::authenticated(admin))
    }

    fn new_actor(email: &str, role: Role) -> NewActor {
        NewActor {
            email: email.to_string(),
            full_name: email.to_string(),
            role,
            phone: None,
            team_id: None,
        }
    }

    #[test]
    fn bootstrap_only_works_on_an_empty_installation() {
        let (directory, _) = directory();
        assert!(matches!(
            directory.bootstrap_admin("otro@agencia.mx", "Otro"),
            Err(DeskError::ValidationFailed(_))
        ));
    }

    #[test]
    fn emails_are_unique_and_case_insensitive() {
        let (directory, admin) = directory();
        directory
            .register_actor(&admin, new_actor("Ventas@Agencia.mx", Role::Comercial))
            .unwrap();
        assert!(matches!(
            directory.register_actor(&admin, new_actor("ventas@agencia.mx", Role::Agente)),
            Err(DeskError::ValidationFailed(_))
        ));
    }

    #[test]
    fn a_second_admin_unlocks_demotion() {
        let (directory, admin) = directory();
        let admin_id = admin.actor_id().unwrap();
        assert!(matches!(
            directory.deactivate_actor(&admin, admin_id),
            Err(DeskError::LastAdmin { .. })
        ));

        directory
            .register_actor(&admin, new_actor("admin2@agencia.mx", Role::Admin))
            .unwrap();
        let demoted = directory.change_role(&admin, admin_id, Role::Comercial).unwrap();
        assert_eq!(demoted.role, Role::Comercial);
    }

    #[test]
    fn team_membership() {
        let (directory, admin) = directory();
        let team = directory.create_team(&admin, "Norte").unwrap();
        assert!(directory.create_team(&admin, "norte").is_err());

        let agent = directory
            .register_actor(&admin, new_actor("agente@agencia.mx", Role::Agente))
            .unwrap();
        directory.assign_to_team(&admin, agent.id, Some(team.id)).unwrap();

        let members = directory.team_members(&admin, team.id).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, agent.id);
    }
}
