// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Authenticated `ldap3` session.
//!
//! A session is opened at the start of a reconciliation pass and closed at its
//! end. The connection timeout from the `LDAPServer` bounds both the initial
//! connect and every operation sent over the session.

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, LdapResult, Mod, SearchEntry};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{AttributeSet, DirectoryClient, DirectoryEntry, Modification, Scope};
use crate::constants::{
    DEFAULT_CONNECTION_TIMEOUT_SECS, LDAP_RC_INVALID_CREDENTIALS, LDAP_RC_SUCCESS,
};
use crate::crd::LDAPServerSpec;
use crate::directory_errors::{ConnectError, DirectoryError};
use crate::duration::parse_duration_or;
use crate::metrics;

/// An open, bound connection to a directory server.
pub struct LdapSession {
    ldap: Ldap,
    timeout: Duration,
    url: String,
}

impl LdapSession {
    /// Connect to the server described by `spec` and bind as `spec.bind_dn`.
    ///
    /// With TLS enabled the connection uses `ldaps://`, verifying the server
    /// certificate and name unless `insecureSkipVerify` is set.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] if the timeout is invalid, the server cannot be
    /// reached, or the bind is rejected. The connection is released before
    /// returning.
    pub async fn open(spec: &LDAPServerSpec, bind_password: &str) -> Result<Self, ConnectError> {
        let timeout = parse_duration_or(
            spec.connection_timeout.as_deref(),
            DEFAULT_CONNECTION_TIMEOUT_SECS,
        )
        .map_err(|e| ConnectError::InvalidConfiguration {
            reason: format!("connectionTimeout: {e}"),
        })?;

        let url = spec.url();
        let settings = LdapConnSettings::new()
            .set_conn_timeout(timeout)
            .set_no_tls_verify(spec.tls_enabled() && spec.tls_skip_verify());

        if spec.tls_skip_verify() {
            warn!(url = %url, "TLS certificate verification disabled");
        }
        debug!(url = %url, timeout_secs = timeout.as_secs(), "Connecting to LDAP server");

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| connect_error(&url, timeout, e))?;

        let driver_url = url.clone();
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(url = %driver_url, error = %e, "LDAP connection driver error");
            }
        });

        let bind = ldap
            .with_timeout(timeout)
            .simple_bind(&spec.bind_dn, bind_password)
            .await;

        let failure = match bind {
            Ok(result) if result.rc == LDAP_RC_SUCCESS => None,
            Ok(result) if result.rc == LDAP_RC_INVALID_CREDENTIALS => {
                Some(ConnectError::InvalidCredentials {
                    url: url.clone(),
                    bind_dn: spec.bind_dn.clone(),
                })
            }
            Ok(result) => Some(ConnectError::BindFailed {
                url: url.clone(),
                bind_dn: spec.bind_dn.clone(),
                rc: result.rc,
                text: result.text,
            }),
            Err(e) => Some(connect_error(&url, timeout, e)),
        };

        if let Some(error) = failure {
            if let Err(e) = ldap.unbind().await {
                debug!(url = %url, error = %e, "Error releasing connection after failed bind");
            }
            return Err(error);
        }

        debug!(url = %url, bind_dn = %spec.bind_dn, "LDAP bind succeeded");
        Ok(Self { ldap, timeout, url })
    }

    /// URL this session is connected to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

fn connect_error(url: &str, timeout: Duration, error: LdapError) -> ConnectError {
    match error {
        LdapError::Timeout { .. } => ConnectError::Timeout {
            url: url.to_string(),
            timeout_secs: timeout.as_secs(),
        },
        other => ConnectError::Transport {
            url: url.to_string(),
            reason: other.to_string(),
        },
    }
}

/// Turn an `ldap3` outcome into a `DirectoryError`, recording the operation metric.
fn check(
    operation: &'static str,
    dn: &str,
    started: Instant,
    outcome: Result<LdapResult, LdapError>,
) -> Result<LdapResult, DirectoryError> {
    let result = match outcome {
        Ok(result) if result.rc == LDAP_RC_SUCCESS => Ok(result),
        Ok(result) => Err(DirectoryError::OperationFailed {
            operation,
            dn: dn.to_string(),
            rc: result.rc,
            text: result.text,
        }),
        Err(e) => Err(DirectoryError::Transport {
            operation,
            dn: dn.to_string(),
            reason: e.to_string(),
        }),
    };

    let rc = match &result {
        Ok(_) => Some(LDAP_RC_SUCCESS),
        Err(e) => e.result_code(),
    };
    metrics::record_directory_operation(operation, rc, started.elapsed());
    result
}

fn value_set(values: &[String]) -> HashSet<String> {
    values.iter().cloned().collect()
}

#[async_trait]
impl DirectoryClient for LdapSession {
    async fn search(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let started = Instant::now();
        let scope = match scope {
            Scope::Base => ldap3::Scope::Base,
            Scope::Subtree => ldap3::Scope::Subtree,
        };

        let outcome = self
            .ldap
            .with_timeout(self.timeout)
            .search(base, scope, filter, attrs.to_vec())
            .await;

        let (entries, result) = match outcome {
            Ok(search) => (search.0, Ok(search.1)),
            Err(e) => (Vec::new(), Err(e)),
        };
        check("search", base, started, result)?;

        Ok(entries
            .into_iter()
            .map(|raw| {
                let entry = SearchEntry::construct(raw);
                DirectoryEntry {
                    dn: entry.dn,
                    attrs: entry.attrs.into_iter().collect(),
                }
            })
            .collect())
    }

    async fn add(&mut self, dn: &str, attrs: &AttributeSet) -> Result<(), DirectoryError> {
        let started = Instant::now();
        let attrs: Vec<(String, HashSet<String>)> = attrs
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(attr, values)| (attr.clone(), value_set(values)))
            .collect();

        let outcome = self.ldap.with_timeout(self.timeout).add(dn, attrs).await;
        check("add", dn, started, outcome).map(|_| ())
    }

    async fn modify(&mut self, dn: &str, mods: &[Modification]) -> Result<(), DirectoryError> {
        let started = Instant::now();
        let mods: Vec<Mod<String>> = mods
            .iter()
            .map(|m| match m {
                Modification::Add(attr, values) => Mod::Add(attr.clone(), value_set(values)),
                Modification::Delete(attr, values) => {
                    Mod::Delete(attr.clone(), value_set(values))
                }
                Modification::Replace(attr, values) => {
                    Mod::Replace(attr.clone(), value_set(values))
                }
            })
            .collect();

        let outcome = self.ldap.with_timeout(self.timeout).modify(dn, mods).await;
        check("modify", dn, started, outcome).map(|_| ())
    }

    async fn delete(&mut self, dn: &str) -> Result<(), DirectoryError> {
        let started = Instant::now();
        let outcome = self.ldap.with_timeout(self.timeout).delete(dn).await;
        check("delete", dn, started, outcome).map(|_| ())
    }

    async fn close(&mut self) -> Result<(), DirectoryError> {
        self.ldap
            .unbind()
            .await
            .map_err(|e| DirectoryError::Transport {
                operation: "unbind",
                dn: self.url.clone(),
                reason: e.to_string(),
            })
    }
}
