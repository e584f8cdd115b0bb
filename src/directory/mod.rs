// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! LDAP directory access for ldapy.
//!
//! This module contains everything that talks to, or describes, the directory:
//!
//! - [`session`] - Authenticated `ldap3` session opened once per reconciliation pass
//! - [`dn`] - Distinguished name construction and RFC 4514 / RFC 4515 escaping
//! - [`entry`] - Mapping of `LDAPUser` / `LDAPGroup` specs to directory attributes
//! - [`reconcile`] - Idempotent create-or-update and delete of a single entry
//! - [`membership`] - Convergence of a user's group memberships
//!
//! Reconcilers only depend on the [`DirectoryClient`] trait, so the same code runs
//! against a live server and against the in-memory directory used in tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use ldapy::directory::{session::LdapSession, DirectoryClient, Scope};
//! use ldapy::crd::LDAPServerSpec;
//!
//! async fn list_groups(spec: &LDAPServerSpec, password: &str) -> anyhow::Result<()> {
//!     let mut session = LdapSession::open(spec, password).await?;
//!     let groups = session
//!         .search(&spec.base_dn, Scope::Subtree, "(objectClass=groupOfNames)", &["cn"])
//!         .await?;
//!     for group in groups {
//!         println!("{}", group.dn);
//!     }
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

pub mod dn;
pub mod entry;
pub mod membership;
pub mod reconcile;
pub mod session;

#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::directory_errors::DirectoryError;

/// Attributes of an entry to create, keyed by attribute name.
pub type AttributeSet = BTreeMap<String, Vec<String>>;

/// Search scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Only the base entry itself
    Base,
    /// The base entry and everything below it
    Subtree,
}

/// A single change inside a modify request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Modification {
    /// Add values to an attribute
    Add(String, Vec<String>),
    /// Remove values from an attribute (all values when empty)
    Delete(String, Vec<String>),
    /// Replace all values of an attribute (removes it when empty)
    Replace(String, Vec<String>),
}

impl Modification {
    /// Attribute the modification applies to.
    #[must_use]
    pub fn attribute(&self) -> &str {
        match self {
            Self::Add(attr, _) | Self::Delete(attr, _) | Self::Replace(attr, _) => attr,
        }
    }
}

/// An entry returned by a search.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attrs: BTreeMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// All values of `attr`. Attribute names compare case-insensitively.
    #[must_use]
    pub fn values(&self, attr: &str) -> &[String] {
        self.attrs
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attr))
            .map_or(&[], |(_, values)| values.as_slice())
    }

    /// First value of `attr`, if any.
    #[must_use]
    pub fn first(&self, attr: &str) -> Option<&str> {
        self.values(attr).first().map(String::as_str)
    }
}

/// Operations the reconcilers need from a directory server.
///
/// Every call is bounded by the session's operation timeout. Implementations
/// report non-success result codes as [`DirectoryError::OperationFailed`].
#[async_trait]
pub trait DirectoryClient: Send {
    /// Search below `base` and return the matching entries with the requested attributes.
    async fn search(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError>;

    /// Create an entry.
    async fn add(&mut self, dn: &str, attrs: &AttributeSet) -> Result<(), DirectoryError>;

    /// Apply `mods` to an existing entry in a single request.
    async fn modify(&mut self, dn: &str, mods: &[Modification]) -> Result<(), DirectoryError>;

    /// Delete an entry.
    async fn delete(&mut self, dn: &str) -> Result<(), DirectoryError>;

    /// Unbind and release the connection.
    async fn close(&mut self) -> Result<(), DirectoryError>;
}
