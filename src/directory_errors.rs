// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Directory connection and operation error types for ldapy.
//!
//! This module provides specialized error types for:
//! - Opening and binding an LDAP session (transport, TLS, credentials)
//! - Individual search/add/modify/delete operations
//! - Group membership synchronization
//!
//! Every error is eventually turned into an `Error` phase and a status message by
//! the reconcilers, so the `Display` output is written for end users.

use crate::constants::LDAP_RC_NO_SUCH_OBJECT;
use thiserror::Error;

/// Errors that can occur while opening an authenticated session.
///
/// Any of these is fatal for a reconciliation pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// The TCP or TLS connection could not be established.
    #[error("Failed to connect to {url}: {reason}")]
    Transport {
        /// The LDAP URL that was dialed
        url: String,
        /// Underlying transport or TLS failure
        reason: String,
    },

    /// The connection or the bind did not complete within the configured timeout.
    #[error("Timed out after {timeout_secs}s connecting to {url}")]
    Timeout {
        /// The LDAP URL that was dialed
        url: String,
        /// The configured timeout in seconds
        timeout_secs: u64,
    },

    /// The server rejected the bind credentials (result code 49).
    #[error("Bind as '{bind_dn}' to {url} rejected: invalid credentials")]
    InvalidCredentials {
        /// The LDAP URL that was dialed
        url: String,
        /// DN used for the bind
        bind_dn: String,
    },

    /// The bind failed with a result code other than invalid credentials.
    #[error("Bind as '{bind_dn}' to {url} failed with code {rc}: {text}")]
    BindFailed {
        /// The LDAP URL that was dialed
        url: String,
        /// DN used for the bind
        bind_dn: String,
        /// LDAP result code
        rc: u32,
        /// Diagnostic message returned by the server
        text: String,
    },

    /// The `LDAPServer` settings cannot be turned into a connection.
    #[error("Invalid connection configuration: {reason}")]
    InvalidConfiguration {
        /// Explanation of what is invalid
        reason: String,
    },
}

impl ConnectError {
    /// Whether the server could not be reached at all, as opposed to being
    /// reached and refusing the session.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }
}

/// Errors returned by a single directory operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// The server answered with a non-success result code.
    #[error("LDAP {operation} on '{dn}' failed with code {rc}: {text}")]
    OperationFailed {
        /// Operation name (search, add, modify, delete)
        operation: &'static str,
        /// Target DN (or search base)
        dn: String,
        /// LDAP result code
        rc: u32,
        /// Diagnostic message returned by the server
        text: String,
    },

    /// The request could not be sent or its response never arrived.
    #[error("LDAP {operation} on '{dn}' failed: {reason}")]
    Transport {
        /// Operation name (search, add, modify, delete)
        operation: &'static str,
        /// Target DN (or search base)
        dn: String,
        /// Underlying failure
        reason: String,
    },
}

impl DirectoryError {
    /// LDAP result code, if the server answered.
    #[must_use]
    pub fn result_code(&self) -> Option<u32> {
        match self {
            Self::OperationFailed { rc, .. } => Some(*rc),
            Self::Transport { .. } => None,
        }
    }

    /// Whether the target entry does not exist (result code 32).
    #[must_use]
    pub fn is_no_such_object(&self) -> bool {
        self.result_code() == Some(LDAP_RC_NO_SUCH_OBJECT)
    }
}

/// Errors that abort a group membership synchronization as a whole.
///
/// Failures affecting a single group are logged and never surface as a `SyncError`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The current memberships of the user could not be read.
    #[error("Failed to read current group memberships of '{user_dn}' under '{group_base}': {source}")]
    ReadMemberships {
        /// DN of the user being synchronized
        user_dn: String,
        /// Group subtree that was searched
        group_base: String,
        /// The failed search
        #[source]
        source: DirectoryError,
    },
}

#[cfg(test)]
#[path = "directory_errors_tests.rs"]
mod directory_errors_tests;
