// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `LDAPServer` connectivity probing.
//!
//! Each pass connects to the server, binds with the configured credentials and
//! reads the base DN. The outcome is published as `status.connectionStatus`,
//! which `LDAPUser` and `LDAPGroup` reconcilers use as a precondition.
//!
//! | Failure | Status |
//! |---|---|
//! | none | `Connected` |
//! | server unreachable or connect/bind timeout | `Disconnected` |
//! | bind password missing, bind rejected, base DN search failed | `Error` |
//!
//! Writing `lastChecked` triggers a new watch event for the same object, so a
//! pass that finds a recent probe for the current generation only requeues for
//! the rest of the interval.

use anyhow::Result;
use chrono::{DateTime, Utc};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::connection::bind_password;
use super::finalizers::{ensure_finalizer, is_being_deleted, remove_finalizer};
use super::should_reconcile;
use super::status::{publish_status, set_ready_condition};
use crate::constants::{
    DEFAULT_HEALTH_CHECK_INTERVAL_SECS, FILTER_ANY_OBJECT, FINALIZER, KIND_LDAP_SERVER,
};
use crate::context::Context;
use crate::crd::{ConnectionStatus, LDAPServer, LDAPServerStatus};
use crate::directory::session::LdapSession;
use crate::directory::{DirectoryClient, Scope};
use crate::directory_errors::ConnectError;
use crate::duration::parse_duration_or;
use crate::metrics;
use crate::status_reasons::connection_reason;

/// Result of one connectivity probe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeResult {
    pub status: ConnectionStatus,
    pub message: String,
}

impl ProbeResult {
    fn new(status: ConnectionStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Probe interval of `server`, falling back to the default when unset or invalid.
#[must_use]
pub fn health_check_interval(server: &LDAPServer) -> Duration {
    parse_duration_or(
        server.spec.health_check_interval.as_deref(),
        DEFAULT_HEALTH_CHECK_INTERVAL_SECS,
    )
    .unwrap_or_else(|e| {
        warn!(
            server = %server.name_any(),
            error = %e,
            "Invalid healthCheckInterval, using default"
        );
        Duration::from_secs(DEFAULT_HEALTH_CHECK_INTERVAL_SECS)
    })
}

/// Time left until the next probe is due, or `None` if it is due now.
///
/// A probe is due when the spec changed since the last one, when no probe was
/// recorded, or when `interval` has elapsed since `lastChecked`.
#[must_use]
pub fn next_probe_in(
    status: Option<&LDAPServerStatus>,
    generation: Option<i64>,
    interval: Duration,
    now: DateTime<Utc>,
) -> Option<Duration> {
    let status = status?;
    if should_reconcile(generation, status.observed_generation) {
        return None;
    }

    let last_checked = DateTime::parse_from_rfc3339(status.last_checked.as_deref()?).ok()?;
    let elapsed = now
        .signed_duration_since(last_checked.with_timezone(&Utc))
        .to_std()
        .ok()?;

    interval.checked_sub(elapsed).filter(|left| !left.is_zero())
}

/// Map a failure to open a session to a connection status.
#[must_use]
pub fn connect_failure(error: &ConnectError) -> ProbeResult {
    let status = if error.is_unreachable() {
        ConnectionStatus::Disconnected
    } else {
        ConnectionStatus::Error
    };
    ProbeResult::new(status, error.to_string())
}

/// Check an open session by reading `base_dn`, then close it.
pub async fn verify_base_dn<C>(client: &mut C, base_dn: &str, url: &str) -> ProbeResult
where
    C: DirectoryClient + ?Sized,
{
    let search = client
        .search(base_dn, Scope::Base, FILTER_ANY_OBJECT, &["1.1"])
        .await;

    if let Err(e) = client.close().await {
        debug!(url = %url, error = %e, "Error closing probe session");
    }

    match search {
        Ok(_) => ProbeResult::new(
            ConnectionStatus::Connected,
            format!("Successfully connected to {url}"),
        ),
        Err(e) => ProbeResult::new(
            ConnectionStatus::Error,
            format!("Base DN search failed: {e}"),
        ),
    }
}

/// Run a full probe against `server`.
pub async fn probe_server(client: &Client, server: &LDAPServer) -> ProbeResult {
    let password = match bind_password(client, server).await {
        Ok(password) => password,
        Err(e) => return ProbeResult::new(ConnectionStatus::Error, format!("{e:#}")),
    };

    let url = server.spec.url();
    match LdapSession::open(&server.spec, &password).await {
        Ok(mut session) => verify_base_dn(&mut session, &server.spec.base_dn, &url).await,
        Err(e) => connect_failure(&e),
    }
}

/// Write a probe result into `status`.
pub fn apply_probe_result(
    status: &mut LDAPServerStatus,
    result: &ProbeResult,
    checked_at: &str,
    generation: Option<i64>,
) {
    status.connection_status = result.status;
    status.message = Some(result.message.clone());
    status.last_checked = Some(checked_at.to_string());
    status.observed_generation = generation;
    set_ready_condition(
        &mut status.conditions,
        result.status == ConnectionStatus::Connected,
        connection_reason(result.status),
        &result.message,
    );
}

/// Reconciles an `LDAPServer` resource.
///
/// # Errors
///
/// Returns an error if the finalizer cannot be updated or the status cannot be
/// written.
pub async fn reconcile_ldapserver(ctx: Arc<Context>, server: LDAPServer) -> Result<Action> {
    let client = &ctx.client;
    let namespace = server.namespace().unwrap_or_default();
    let name = server.name_any();

    debug!(
        namespace = %namespace,
        name = %name,
        generation = ?server.metadata.generation,
        "Starting LDAPServer reconciliation"
    );

    if is_being_deleted(&server) {
        info!("LDAPServer {}/{} is being deleted", namespace, name);
        remove_finalizer(client, &server, FINALIZER).await?;
        return Ok(Action::await_change());
    }

    if ensure_finalizer(client, &server, FINALIZER).await? {
        return Ok(Action::requeue(Duration::ZERO));
    }

    let interval = health_check_interval(&server);
    if let Some(wait) = next_probe_in(
        server.status.as_ref(),
        server.metadata.generation,
        interval,
        Utc::now(),
    ) {
        debug!(
            namespace = %namespace,
            name = %name,
            next_probe_in = ?wait,
            "Recent probe on record, skipping"
        );
        return Ok(Action::requeue(wait));
    }

    let result = probe_server(client, &server).await;
    match result.status {
        ConnectionStatus::Connected => {
            info!("LDAPServer {}/{} connected", namespace, name);
        }
        status => {
            warn!(
                namespace = %namespace,
                name = %name,
                status = %status,
                message = %result.message,
                "LDAPServer probe failed"
            );
            metrics::record_error(KIND_LDAP_SERVER, "connection");
        }
    }

    let checked_at = Utc::now().to_rfc3339();
    let generation = server.metadata.generation;
    publish_status::<LDAPServer, _>(client, &namespace, &name, |status| {
        apply_probe_result(status, &result, &checked_at, generation);
    })
    .await?;

    Ok(Action::requeue(interval))
}

#[cfg(test)]
#[path = "ldapserver_tests.rs"]
mod ldapserver_tests;
