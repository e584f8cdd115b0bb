// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `LDAPGroup` reconciliation logic.
//!
//! The group entry is created or updated, then its members are read back into
//! the status. Members themselves are managed from the `LDAPUser` side.

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
use crate::constants::{FINALIZER, KIND_LDAP_GROUP};
use crate::context::Context;
use crate::crd::{GroupPhase, LDAPGroup, LDAPGroupSpec, LDAPGroupStatus, LDAPServerSpec};
use crate::directory::dn::build_group_dn;
use crate::directory::membership::read_group_members;
use crate::directory::reconcile::{delete_entry, reconcile_group_entry, EntryOutcome};
use crate::directory::DirectoryClient;
use crate::metrics;
use crate::status_reasons::group_phase_reason;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupPass {
    pub dn: String,
    pub outcome: EntryOutcome,
    pub members: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GroupOutcome {
    Pending(String),
    Failed(String),
    Synced(GroupPass),
}

impl GroupOutcome {
    #[must_use]
    pub fn phase(&self) -> GroupPhase {
        match self {
            Self::Pending(_) => GroupPhase::Pending,
            Self::Failed(_) => GroupPhase::Error,
            Self::Synced(_) => GroupPhase::Ready,
        }
    }

    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Pending(message) | Self::Failed(message) => message.clone(),
            Self::Synced(pass) => format!("Group synchronized with {} members", pass.members.len()),
        }
    }
}

/// Reconcile the group entry through `client` and read back its members.
///
/// # Errors
///
/// Returns an error if the entry cannot be created, updated or read.
pub async fn apply_group_pass<C>(
    client: &mut C,
    server: &LDAPServerSpec,
    spec: &LDAPGroupSpec,
) -> Result<GroupPass>
where
    C: DirectoryClient + ?Sized,
{
    let dn = build_group_dn(&spec.group_name, &spec.organizational_unit, &server.base_dn);
    let outcome = reconcile_group_entry(client, &dn, spec)
        .await
        .with_context(|| format!("Failed to reconcile group entry {dn}"))?;

    let members = read_group_members(client, &dn)
        .await
        .with_context(|| format!("Failed to read members of {dn}"))?;

    Ok(GroupPass {
        dn,
        outcome,
        members,
    })
}

/// Write the outcome of a pass into `status`.
pub fn apply_group_outcome(
    status: &mut LDAPGroupStatus,
    outcome: &GroupOutcome,
    generation: Option<i64>,
) {
    let phase = outcome.phase();
    let message = outcome.message();

    if let GroupOutcome::Synced(pass) = outcome {
        status.dn = Some(pass.dn.clone());
        status.members.clone_from(&pass.members);
        status.member_count = i32::try_from(pass.members.len()).unwrap_or(i32::MAX);
    }

    status.phase = phase;
    status.observed_generation = generation;
    set_ready_condition(
        &mut status.conditions,
        phase == GroupPhase::Ready,
        group_phase_reason(phase),
        &message,
    );
    status.message = Some(message);
}

async fn sync_group(client: &Client, group: &LDAPGroup, namespace: &str) -> GroupOutcome {
    let reference = &group.spec.ldap_server_ref;
    let key = server_key(reference, namespace);

    let server = match fetch_server(client, reference, namespace).await {
        Ok(server) => server,
        Err(e) => return GroupOutcome::Failed(format!("{e:#}")),
    };
    let server = match check_gate(server) {
        ServerGate::Ready(server) => server,
        gate @ ServerGate::NotConnected(_) => {
            return GroupOutcome::Pending(gate_message(&gate, &key))
        }
        gate @ ServerGate::Missing => return GroupOutcome::Failed(gate_message(&gate, &key)),
    };

    let mut session = match open_session(client, &server).await {
        Ok(session) => session,
        Err(e) => {
            metrics::record_error(KIND_LDAP_GROUP, "connection");
            return GroupOutcome::Failed(format!("{e:#}"));
        }
    };

    let result = apply_group_pass(&mut session, &server.spec, &group.spec).await;
    if let Err(e) = session.close().await {
        debug!(error = %e, "Error closing directory session");
    }

    match result {
        Ok(pass) => GroupOutcome::Synced(pass),
        Err(e) => {
            metrics::record_error(KIND_LDAP_GROUP, "directory");
            GroupOutcome::Failed(format!("{e:#}"))
        }
    }
}

/// Reconciles an `LDAPGroup` resource.
///
/// # Errors
///
/// Returns an error if the finalizer cannot be updated or the status cannot be
/// written.
pub async fn reconcile_ldapgroup(ctx: Arc<Context>, group: LDAPGroup) -> Result<Action> {
    let client = &ctx.client;
    let namespace = group.namespace().unwrap_or_default();
    let name = group.name_any();

    info!("Reconciling LDAPGroup: {}/{}", namespace, name);

    if is_being_deleted(&group) {
        delete_ldapgroup(client, &group).await?;
        return Ok(Action::await_change());
    }

    if ensure_finalizer(client, &group, FINALIZER).await? {
        return Ok(Action::requeue(Duration::ZERO));
    }

    let outcome = sync_group(client, &group, &namespace).await;
    let phase = outcome.phase();
    if phase != GroupPhase::Ready {
        warn!(
            namespace = %namespace,
            name = %name,
            phase = %phase,
            message = %outcome.message(),
            "LDAPGroup not synchronized"
        );
    }

    let generation = group.metadata.generation;
    publish_status::<LDAPGroup, _>(client, &namespace, &name, |status| {
        apply_group_outcome(status, &outcome, generation);
    })
    .await?;

    info!("LDAPGroup {}/{} is {}", namespace, name, phase);
    Ok(requeue_for(phase == GroupPhase::Ready))
}

/// Deletes the group entry and releases the finalizer.
///
/// # Errors
///
/// Returns an error only if the finalizer cannot be removed.
pub async fn delete_ldapgroup(client: &Client, group: &LDAPGroup) -> Result<()> {
    if !has_finalizer(group, FINALIZER) {
        return Ok(());
    }

    let namespace = group.namespace().unwrap_or_default();
    let name = group.name_any();
    info!("Deleting LDAPGroup {}/{}", namespace, name);

    if let Err(e) = publish_status::<LDAPGroup, _>(client, &namespace, &name, |status| {
        status.phase = GroupPhase::Deleting;
        status.message = Some("Removing group from directory".to_string());
        set_ready_condition(
            &mut status.conditions,
            false,
            group_phase_reason(GroupPhase::Deleting),
            "Removing group from directory",
        );
    })
    .await
    {
        debug!(error = %e, "Could not publish Deleting phase");
    }

    cleanup_then_release(
        &format!("LDAPGroup {namespace}/{name}"),
        teardown_group(client, group, &namespace),
        remove_finalizer(client, group, FINALIZER),
    )
    .await?;
    Ok(())
}

async fn teardown_group(client: &Client, group: &LDAPGroup, namespace: &str) -> Result<()> {
    let reference = &group.spec.ldap_server_ref;
    let Some(server) = fetch_server(client, reference, namespace).await? else {
        warn!(
            server = %server_key(reference, namespace),
            "LDAPServer not found, skipping directory cleanup"
        );
        return Ok(());
    };

    let dn = build_group_dn(
        &group.spec.group_name,
        &group.spec.organizational_unit,
        &server.spec.base_dn,
    );
    let mut session = open_session(client, &server).await?;
    let result = delete_entry(&mut session, &dn).await;
    if let Err(e) = session.close().await {
        debug!(error = %e, "Error closing directory session");
    }

    result.with_context(|| format!("Failed to delete group entry {dn}"))
}

#[cfg(test)]
#[path = "ldapgroup_tests.rs"]
mod ldapgroup_tests;
