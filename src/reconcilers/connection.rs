// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Resolving the `LDAPServer` behind an `ldapServerRef` and opening a session to it.
//!
//! `LDAPUser` and `LDAPGroup` reconcilers only talk to a directory whose
//! `LDAPServer` the prober last reported as `Connected`. [`check_gate`] turns the
//! looked-up server into that decision; [`open_session`] then resolves the bind
//! password and connects.

use anyhow::{Context as _, Result};
use kube::{Api, Client, ResourceExt};
use tracing::debug;

use super::retry::retry_api_call;
use crate::crd::{ConnectionStatus, LDAPServer, LDAPServerRef};
use crate::directory::session::LdapSession;
use crate::secrets::get_secret_string;

/// Whether a referenced `LDAPServer` may be used.
#[derive(Debug)]
pub enum ServerGate {
    /// The `LDAPServer` does not exist.
    Missing,
    /// The `LDAPServer` exists but its last probe was not successful.
    NotConnected(ConnectionStatus),
    /// The `LDAPServer` is connected.
    Ready(Box<LDAPServer>),
}

/// Decide whether `server` can be used for directory operations.
#[must_use]
pub fn check_gate(server: Option<LDAPServer>) -> ServerGate {
    let Some(server) = server else {
        return ServerGate::Missing;
    };

    let status = server
        .status
        .as_ref()
        .map(|s| s.connection_status)
        .unwrap_or_default();

    if status == ConnectionStatus::Connected {
        ServerGate::Ready(Box::new(server))
    } else {
        ServerGate::NotConnected(status)
    }
}

/// Namespace and name of the `LDAPServer` a resource in `resource_namespace` refers to.
#[must_use]
pub fn server_key(reference: &LDAPServerRef, resource_namespace: &str) -> String {
    format!(
        "{}/{}",
        reference.namespace_or(resource_namespace),
        reference.name
    )
}

/// Status message for a resource blocked by `gate`.
#[must_use]
pub fn gate_message(gate: &ServerGate, server_key: &str) -> String {
    match gate {
        ServerGate::Missing => format!("LDAPServer {server_key} not found"),
        ServerGate::NotConnected(status) => {
            format!("LDAPServer {server_key} is not connected (status: {status})")
        }
        ServerGate::Ready(_) => format!("LDAPServer {server_key} is connected"),
    }
}

/// Look up the `LDAPServer` referenced from `resource_namespace`.
///
/// # Errors
///
/// Returns an error if the API server cannot be queried. A missing server is
/// `Ok(None)`.
pub async fn fetch_server(
    client: &Client,
    reference: &LDAPServerRef,
    resource_namespace: &str,
) -> Result<Option<LDAPServer>> {
    let namespace = reference.namespace_or(resource_namespace);
    let api: Api<LDAPServer> = Api::namespaced(client.clone(), namespace);
    let operation = format!("get LDAPServer {namespace}/{}", reference.name);

    retry_api_call(|| api.get_opt(&reference.name), &operation).await
}

/// Bind password of `server`, read from its own namespace.
///
/// # Errors
///
/// Returns an error if the secret or key is missing or unreadable.
pub async fn bind_password(client: &Client, server: &LDAPServer) -> Result<String> {
    let namespace = server.namespace().unwrap_or_default();
    let secret = &server.spec.bind_password_secret;

    get_secret_string(client, &namespace, &secret.name, &secret.key)
        .await
        .with_context(|| format!("Bind password for LDAPServer {namespace}/{}", server.name_any()))
}

/// Resolve the bind password of `server` and open an authenticated session.
///
/// # Errors
///
/// Returns an error if the bind password cannot be read or the connection or
/// bind fails.
pub async fn open_session(client: &Client, server: &LDAPServer) -> Result<LdapSession> {
    let password = bind_password(client, server).await?;
    let session = LdapSession::open(&server.spec, &password)
        .await
        .with_context(|| format!("Failed to open session to {}", server.spec.url()))?;

    debug!(server = %server.name_any(), url = %session.url(), "Opened directory session");
    Ok(session)
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod connection_tests;
