// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes reconciliation controllers for LDAP resources.
//!
//! This module contains the reconciliation logic for all ldapy Custom Resources.
//! Each reconciler compares the desired state in a resource's spec with the
//! directory and reports the result back in the resource's status.
//!
//! # Reconciliation Architecture
//!
//! ldapy follows the standard Kubernetes controller pattern:
//!
//! 1. **Finalize** - Add the finalizer on first sight, tear down on deletion
//! 2. **Gate** - Wait until the referenced `LDAPServer` reports `Connected`
//! 3. **Reconcile** - Create or update the directory entry (and memberships)
//! 4. **Status** - Publish the outcome with conflict-safe writes
//!
//! # Available Reconcilers
//!
//! - [`reconcile_ldapserver`] - Probes connectivity of a directory server
//! - [`reconcile_ldapuser`] / [`delete_ldapuser`] - Manages user entries and group memberships
//! - [`reconcile_ldapgroup`] / [`delete_ldapgroup`] - Manages group entries
//!
//! # Example: Using a Reconciler
//!
//! ```rust,no_run
//! use ldapy::reconcilers::reconcile_ldapuser;
//! use ldapy::crd::LDAPUser;
//! use ldapy::context::Context;
//! use std::sync::Arc;
//!
//! async fn reconcile_user(ctx: Arc<Context>, user: LDAPUser) -> anyhow::Result<()> {
//!     let action = reconcile_ldapuser(ctx, user).await?;
//!     println!("next: {action:?}");
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod finalizers;
pub mod ldapgroup;
pub mod ldapserver;
pub mod ldapuser;
pub mod retry;
pub mod status;

pub use ldapgroup::{delete_ldapgroup, reconcile_ldapgroup};
pub use ldapserver::reconcile_ldapserver;
pub use ldapuser::{delete_ldapuser, reconcile_ldapuser};

use kube::runtime::controller::Action;
use std::time::Duration;

use crate::constants::REQUEUE_NOT_READY_SECS;

/// Check if a resource's spec has changed by comparing generation with `observed_generation`.
///
/// The `metadata.generation` field is incremented by Kubernetes only when the spec changes,
/// while `status.observed_generation` is set by the controller after processing a spec.
///
/// # Returns
///
/// * `true` - Reconciliation is needed (spec changed or first reconciliation)
/// * `false` - No reconciliation needed (spec unchanged, status-only update)
#[must_use]
pub fn should_reconcile(current_generation: Option<i64>, observed_generation: Option<i64>) -> bool {
    match (current_generation, observed_generation) {
        (Some(current), Some(observed)) => current != observed,
        (Some(_), None) => true, // First reconciliation
        _ => false,              // No generation tracking available
    }
}

/// Next action after a pass.
///
/// Ready resources wait for the next change; anything else is retried after
/// [`REQUEUE_NOT_READY_SECS`].
#[must_use]
pub fn requeue_for(ready: bool) -> Action {
    if ready {
        Action::await_change()
    } else {
        Action::requeue(Duration::from_secs(REQUEUE_NOT_READY_SECS))
    }
}

#[cfg(test)]
mod mod_tests;
