// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Idempotent create-or-update of single directory entries.
//!
//! Each function first checks whether the entry exists with a base-scoped search,
//! then either adds the full attribute set or replaces the mutable fields.
//! Running them repeatedly against an unchanged spec leaves the directory as is.

use tracing::{debug, info};

use super::entry::{group_attributes, group_replacements, user_attributes, user_replacements};
use super::{DirectoryClient, Scope};
use crate::constants::FILTER_ANY_OBJECT;
use crate::crd::{LDAPGroupSpec, LDAPUserSpec};
use crate::directory_errors::DirectoryError;

/// What a create-or-update did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryOutcome {
    Created,
    Updated,
}

/// Whether an entry exists at `dn`.
///
/// # Errors
///
/// Returns the search error for anything other than "no such object".
pub async fn entry_exists<C>(client: &mut C, dn: &str) -> Result<bool, DirectoryError>
where
    C: DirectoryClient + ?Sized,
{
    match client
        .search(dn, Scope::Base, FILTER_ANY_OBJECT, &["1.1"])
        .await
    {
        Ok(entries) => Ok(entries.len() == 1),
        Err(e) if e.is_no_such_object() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Create or update a user entry.
///
/// `password` is only written when the entry is created.
///
/// # Errors
///
/// Returns the first failed directory operation.
pub async fn reconcile_user_entry<C>(
    client: &mut C,
    dn: &str,
    spec: &LDAPUserSpec,
    password: Option<&str>,
) -> Result<EntryOutcome, DirectoryError>
where
    C: DirectoryClient + ?Sized,
{
    if entry_exists(client, dn).await? {
        debug!(dn = %dn, "User entry exists, replacing mutable attributes");
        client.modify(dn, &user_replacements(spec)).await?;
        Ok(EntryOutcome::Updated)
    } else {
        info!(dn = %dn, "Creating user entry");
        client.add(dn, &user_attributes(spec, password)).await?;
        Ok(EntryOutcome::Created)
    }
}

/// Create or update a group entry.
///
/// # Errors
///
/// Returns the first failed directory operation.
pub async fn reconcile_group_entry<C>(
    client: &mut C,
    dn: &str,
    spec: &LDAPGroupSpec,
) -> Result<EntryOutcome, DirectoryError>
where
    C: DirectoryClient + ?Sized,
{
    if entry_exists(client, dn).await? {
        debug!(dn = %dn, "Group entry exists, replacing description");
        client.modify(dn, &group_replacements(spec)).await?;
        Ok(EntryOutcome::Updated)
    } else {
        info!(dn = %dn, group_type = ?spec.group_type, "Creating group entry");
        client.add(dn, &group_attributes(spec)).await?;
        Ok(EntryOutcome::Created)
    }
}

/// Delete the entry at `dn`. An entry that is already gone counts as deleted.
///
/// # Errors
///
/// Returns the delete error for anything other than "no such object".
pub async fn delete_entry<C>(client: &mut C, dn: &str) -> Result<(), DirectoryError>
where
    C: DirectoryClient + ?Sized,
{
    match client.delete(dn).await {
        Ok(()) => {
            info!(dn = %dn, "Deleted directory entry");
            Ok(())
        }
        Err(e) if e.is_no_such_object() => {
            debug!(dn = %dn, "Directory entry already absent");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod reconcile_tests;
