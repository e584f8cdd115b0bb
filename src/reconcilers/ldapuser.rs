// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `LDAPUser` reconciliation logic.
//!
//! A pass resolves the referenced `LDAPServer`, creates or updates the user's
//! `inetOrgPerson`/`posixAccount` entry and converges its group memberships under
//! the `groups` OU. Desired groups that do not exist leave the user in the
//! `Warning` phase instead of failing the pass.
//!
//! Deletion removes the user from every group it belongs to, then deletes the
//! entry. Directory failures during deletion are logged and never block
//! finalizer removal.

use anyhow::{Context as _, Result};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::connection::{
    check_gate, fetch_server, gate_message, open_session, server_key, ServerGate,
};
use super::finalizers::{
    cleanup_then_release, ensure_finalizer, has_finalizer, is_being_deleted, remove_finalizer,
};
use super::requeue_for;
use super::status::{publish_status, set_ready_condition};
use crate::constants::{DEFAULT_GROUP_OU, FINALIZER, KIND_LDAP_USER};
use crate::context::Context;
use crate::crd::{LDAPServerSpec, LDAPUser, LDAPUserSpec, LDAPUserStatus, UserPhase};
use crate::directory::dn::{build_user_dn, ou_dn};
use crate::directory::entry::home_directory;
use crate::directory::membership::{remove_all_memberships, sync_user_groups, GroupSyncResult};
use crate::directory::reconcile::{delete_entry, reconcile_user_entry, EntryOutcome};
use crate::directory::DirectoryClient;
use crate::metrics;
use crate::secrets::get_secret_string;
use crate::status_reasons::{user_phase_is_ready, user_phase_reason};

/// What a successful pass against the directory produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserPass {
    pub dn: String,
    pub home_directory: String,
    pub outcome: EntryOutcome,
    pub groups: GroupSyncResult,
}

impl UserPass {
    /// Phase this pass leaves the user in.
    #[must_use]
    pub fn phase(&self) -> UserPhase {
        if self.groups.missing.is_empty() {
            UserPhase::Ready
        } else {
            UserPhase::Warning
        }
    }

    #[must_use]
    pub fn message(&self) -> String {
        if self.groups.missing.is_empty() {
            "User synchronized successfully".to_string()
        } else {
            format!(
                "User synchronized with {} missing groups ({})",
                self.groups.missing.len(),
                self.groups.missing.join(", ")
            )
        }
    }
}

/// Outcome of an `LDAPUser` reconciliation pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserOutcome {
    /// The referenced `LDAPServer` is not connected.
    Pending(String),
    /// The pass failed.
    Failed(String),
    /// The entry and memberships were reconciled.
    Synced(UserPass),
}

impl UserOutcome {
    #[must_use]
    pub fn phase(&self) -> UserPhase {
        match self {
            Self::Pending(_) => UserPhase::Pending,
            Self::Failed(_) => UserPhase::Error,
            Self::Synced(pass) => pass.phase(),
        }
    }

    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Pending(message) | Self::Failed(message) => message.clone(),
            Self::Synced(pass) => pass.message(),
        }
    }
}

/// Reconcile the user's entry and memberships through `client`.
///
/// # Errors
///
/// Returns an error if the entry cannot be created or updated, or the current
/// memberships cannot be read.
pub async fn apply_user_pass<C>(
    client: &mut C,
    server: &LDAPServerSpec,
    spec: &LDAPUserSpec,
    password: Option<&str>,
) -> Result<UserPass>
where
    C: DirectoryClient + ?Sized,
{
    let dn = build_user_dn(&spec.username, &spec.organizational_unit, &server.base_dn);
    let outcome = reconcile_user_entry(client, &dn, spec, password)
        .await
        .with_context(|| format!("Failed to reconcile user entry {dn}"))?;

    let group_base = ou_dn(DEFAULT_GROUP_OU, &server.base_dn);
    let groups = sync_user_groups(client, &spec.username, &dn, &spec.groups, &group_base)
        .await
        .context("Failed to synchronize group memberships")?;

    Ok(UserPass {
        dn,
        home_directory: home_directory(spec),
        outcome,
        groups,
    })
}

/// Remove the user from all groups, then delete its entry.
///
/// Returns the number of memberships removed.
///
/// # Errors
///
/// Returns an error if the entry cannot be deleted. Failing to read the
/// memberships is logged and does not prevent the delete.
pub async fn remove_user<C>(
    client: &mut C,
    server: &LDAPServerSpec,
    spec: &LDAPUserSpec,
) -> Result<usize>
where
    C: DirectoryClient + ?Sized,
{
    let dn = build_user_dn(&spec.username, &spec.organizational_unit, &server.base_dn);
    let group_base = ou_dn(DEFAULT_GROUP_OU, &server.base_dn);

    let removed = match remove_all_memberships(client, &spec.username, &dn, &group_base).await {
        Ok(removed) => removed,
        Err(e) => {
            warn!(dn = %dn, error = %e, "Could not remove group memberships");
            0
        }
    };

    delete_entry(client, &dn)
        .await
        .with_context(|| format!("Failed to delete user entry {dn}"))?;
    Ok(removed)
}

/// Write the outcome of a pass into `status`.
pub fn apply_user_outcome(
    status: &mut LDAPUserStatus,
    outcome: &UserOutcome,
    generation: Option<i64>,
) {
    let phase = outcome.phase();
    let message = outcome.message();

    if let UserOutcome::Synced(pass) = outcome {
        status.dn = Some(pass.dn.clone());
        status.home_directory = Some(pass.home_directory.clone());
        status.groups.clone_from(&pass.groups.existing);
        status.missing_groups.clone_from(&pass.groups.missing);
    }

    status.phase = phase;
    status.observed_generation = generation;
    set_ready_condition(
        &mut status.conditions,
        user_phase_is_ready(phase),
        user_phase_reason(phase),
        &message,
    );
    status.message = Some(message);
}

async fn user_password(client: &Client, user: &LDAPUser, namespace: &str) -> Result<Option<String>> {
    let Some(secret) = &user.spec.password_secret else {
        return Ok(None);
    };
    let password = get_secret_string(client, namespace, &secret.name, &secret.key)
        .await
        .context("User password")?;
    Ok(Some(password))
}

async fn sync_user(client: &Client, user: &LDAPUser, namespace: &str) -> UserOutcome {
    let reference = &user.spec.ldap_server_ref;
    let key = server_key(reference, namespace);

    let server = match fetch_server(client, reference, namespace).await {
        Ok(server) => server,
        Err(e) => return UserOutcome::Failed(format!("{e:#}")),
    };
    let server = match check_gate(server) {
        ServerGate::Ready(server) => server,
        gate @ ServerGate::NotConnected(_) => return UserOutcome::Pending(gate_message(&gate, &key)),
        gate @ ServerGate::Missing => return UserOutcome::Failed(gate_message(&gate, &key)),
    };

    let password = match user_password(client, user, namespace).await {
        Ok(password) => password,
        Err(e) => return UserOutcome::Failed(format!("{e:#}")),
    };

    let mut session = match open_session(client, &server).await {
        Ok(session) => session,
        Err(e) => {
            metrics::record_error(KIND_LDAP_USER, "connection");
            return UserOutcome::Failed(format!("{e:#}"));
        }
    };

    let result = apply_user_pass(&mut session, &server.spec, &user.spec, password.as_deref()).await;
    if let Err(e) = session.close().await {
        debug!(error = %e, "Error closing directory session");
    }

    match result {
        Ok(pass) => UserOutcome::Synced(pass),
        Err(e) => {
            metrics::record_error(KIND_LDAP_USER, "directory");
            UserOutcome::Failed(format!("{e:#}"))
        }
    }
}

/// Reconciles an `LDAPUser` resource.
///
/// # Errors
///
/// Returns an error if the finalizer cannot be updated or the status cannot be
/// written. Directory failures are reported through the status instead.
pub async fn reconcile_ldapuser(ctx: Arc<Context>, user: LDAPUser) -> Result<Action> {
    let client = &ctx.client;
    let namespace = user.namespace().unwrap_or_default();
    let name = user.name_any();

    info!("Reconciling LDAPUser: {}/{}", namespace, name);

    if is_being_deleted(&user) {
        delete_ldapuser(client, &user).await?;
        return Ok(Action::await_change());
    }

    if ensure_finalizer(client, &user, FINALIZER).await? {
        return Ok(Action::requeue(Duration::ZERO));
    }

    let outcome = sync_user(client, &user, &namespace).await;
    let phase = outcome.phase();
    match &outcome {
        UserOutcome::Synced(pass) => debug!(
            namespace = %namespace,
            name = %name,
            dn = %pass.dn,
            entry = ?pass.outcome,
            missing_groups = pass.groups.missing.len(),
            "User entry reconciled"
        ),
        other => warn!(
            namespace = %namespace,
            name = %name,
            phase = %phase,
            message = %other.message(),
            "LDAPUser not synchronized"
        ),
    }

    let generation = user.metadata.generation;
    publish_status::<LDAPUser, _>(client, &namespace, &name, |status| {
        apply_user_outcome(status, &outcome, generation);
    })
    .await?;

    info!("LDAPUser {}/{} is {}", namespace, name, phase);
    Ok(requeue_for(user_phase_is_ready(phase)))
}

/// Tears down an `LDAPUser` and releases its finalizer.
///
/// # Errors
///
/// Returns an error only if the finalizer cannot be removed.
pub async fn delete_ldapuser(client: &Client, user: &LDAPUser) -> Result<()> {
    if !has_finalizer(user, FINALIZER) {
        return Ok(());
    }

    let namespace = user.namespace().unwrap_or_default();
    let name = user.name_any();
    info!("Deleting LDAPUser {}/{}", namespace, name);

    let published = publish_status::<LDAPUser, _>(client, &namespace, &name, |status| {
        status.phase = UserPhase::Deleting;
        status.message = Some("Removing user from directory".to_string());
        set_ready_condition(
            &mut status.conditions,
            false,
            user_phase_reason(UserPhase::Deleting),
            "Removing user from directory",
        );
    })
    .await;
    if let Err(e) = published {
        debug!(error = %e, "Could not publish Deleting phase");
    }

    cleanup_then_release(
        &format!("LDAPUser {namespace}/{name}"),
        teardown_user(client, user, &namespace),
        remove_finalizer(client, user, FINALIZER),
    )
    .await?;
    Ok(())
}

async fn teardown_user(client: &Client, user: &LDAPUser, namespace: &str) -> Result<()> {
    let reference = &user.spec.ldap_server_ref;
    let Some(server) = fetch_server(client, reference, namespace).await? else {
        warn!(
            server = %server_key(reference, namespace),
            "LDAPServer not found, skipping directory cleanup"
        );
        return Ok(());
    };

    let mut session = open_session(client, &server).await?;
    let result = remove_user(&mut session, &server.spec, &user.spec).await;
    if let Err(e) = session.close().await {
        debug!(error = %e, "Error closing directory session");
    }

    let removed = result?;
    info!(
        user = %user.spec.username,
        memberships_removed = removed,
        "Removed user from directory"
    );
    Ok(())
}

#[cfg(test)]
#[path = "ldapuser_tests.rs"]
mod ldapuser_tests;
