// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Standard Kubernetes status condition reasons for ldapy resources.
//!
//! Every resource carries a single `type: Ready` condition. Its `reason` is
//! derived from the resource's phase (or, for `LDAPServer`, its connection
//! status), and its `message` mirrors `status.message`.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   phase: Warning
//!   message: "User synchronized with 1 missing groups (vpn-users)"
//!   conditions:
//!     - type: Ready
//!       status: "True"
//!       reason: MissingGroups
//!       message: "User synchronized with 1 missing groups (vpn-users)"
//! ```

use crate::crd::{ConnectionStatus, GroupPhase, UserPhase};

/// The single condition type maintained on every resource
pub const CONDITION_TYPE_READY: &str = "Ready";

pub const CONDITION_STATUS_TRUE: &str = "True";

pub const CONDITION_STATUS_FALSE: &str = "False";

// ============================================================================
// Phase Reasons (LDAPUser, LDAPGroup)
// ============================================================================

/// Entry and memberships match the spec
pub const REASON_READY: &str = "Ready";

/// Entry matches the spec but some desired groups do not exist
pub const REASON_MISSING_GROUPS: &str = "MissingGroups";

/// The referenced `LDAPServer` is not `Connected` yet
pub const REASON_SERVER_NOT_CONNECTED: &str = "LDAPServerNotConnected";

/// The last reconciliation failed; see the message
pub const REASON_RECONCILE_FAILED: &str = "ReconcileFailed";

/// The resource is being torn down
pub const REASON_DELETING: &str = "Deleting";

// ============================================================================
// Connection Reasons (LDAPServer)
// ============================================================================

/// Connect, bind and base search succeeded
pub const REASON_CONNECTED: &str = "Connected";

/// The server could not be reached
pub const REASON_SERVER_UNREACHABLE: &str = "ServerUnreachable";

/// The server was reached but bind, secret lookup or base search failed
pub const REASON_CONNECTION_FAILED: &str = "ConnectionFailed";

/// No probe has completed
pub const REASON_NOT_PROBED: &str = "NotProbed";

/// `Ready` condition reason for a user phase.
#[must_use]
pub fn user_phase_reason(phase: UserPhase) -> &'static str {
    match phase {
        UserPhase::Ready => REASON_READY,
        UserPhase::Warning => REASON_MISSING_GROUPS,
        UserPhase::Pending => REASON_SERVER_NOT_CONNECTED,
        UserPhase::Error => REASON_RECONCILE_FAILED,
        UserPhase::Deleting => REASON_DELETING,
    }
}

/// `Ready` condition reason for a group phase.
#[must_use]
pub fn group_phase_reason(phase: GroupPhase) -> &'static str {
    match phase {
        GroupPhase::Ready => REASON_READY,
        GroupPhase::Pending => REASON_SERVER_NOT_CONNECTED,
        GroupPhase::Error => REASON_RECONCILE_FAILED,
        GroupPhase::Deleting => REASON_DELETING,
    }
}

/// `Ready` condition reason for a probe outcome.
#[must_use]
pub fn connection_reason(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Connected => REASON_CONNECTED,
        ConnectionStatus::Disconnected => REASON_SERVER_UNREACHABLE,
        ConnectionStatus::Error => REASON_CONNECTION_FAILED,
        ConnectionStatus::Unknown => REASON_NOT_PROBED,
    }
}

/// Whether a user phase counts as ready. `Warning` does: the entry is in sync.
#[must_use]
pub fn user_phase_is_ready(phase: UserPhase) -> bool {
    matches!(phase, UserPhase::Ready | UserPhase::Warning)
}

#[cfg(test)]
#[path = "status_reasons_tests.rs"]
mod status_reasons_tests;
