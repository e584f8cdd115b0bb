// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Group membership synchronization.
//!
//! Groups may list their members in one of three ways, and the operator does not
//! know in advance which one a given group uses:
//!
//! | Convention | Attribute | Value |
//! |---|---|---|
//! | `groupOfNames` | `member` | user DN |
//! | `posixGroup` | `memberUid` | username |
//! | `groupOfUniqueNames` | `uniqueMember` | user DN |
//!
//! Additions and removals try the conventions in [`MembershipKind::FALLBACK_ORDER`]
//! and stop at the first one the server accepts.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use super::dn::{child_dn, membership_filter};
use super::reconcile::entry_exists;
use super::{DirectoryClient, Modification, Scope};
use crate::constants::{
    LDAP_RC_ATTRIBUTE_OR_VALUE_EXISTS, LDAP_RC_OBJECT_CLASS_VIOLATION, PLACEHOLDER_MEMBER_DN,
};
use crate::directory_errors::{DirectoryError, SyncError};
use crate::metrics;

/// How a group records one of its members.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MembershipKind {
    /// `member: <user DN>`
    Member,
    /// `memberUid: <username>`
    MemberUid,
    /// `uniqueMember: <user DN>`
    UniqueMember,
}

impl MembershipKind {
    pub const FALLBACK_ORDER: [Self; 3] = [Self::Member, Self::MemberUid, Self::UniqueMember];

    #[must_use]
    pub fn attribute(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::MemberUid => "memberUid",
            Self::UniqueMember => "uniqueMember",
        }
    }

    /// Value identifying the user under this convention.
    #[must_use]
    pub fn member_value<'a>(self, username: &'a str, user_dn: &'a str) -> &'a str {
        match self {
            Self::MemberUid => username,
            Self::Member | Self::UniqueMember => user_dn,
        }
    }

    /// Whether the group's schema requires at least one value.
    #[must_use]
    pub fn requires_value(self) -> bool {
        !matches!(self, Self::MemberUid)
    }

    /// Add the user to `group_dn`. A value that is already present counts as added.
    ///
    /// # Errors
    ///
    /// Returns the modify error when the server rejects the change.
    pub async fn add<C>(
        self,
        client: &mut C,
        group_dn: &str,
        username: &str,
        user_dn: &str,
    ) -> Result<(), DirectoryError>
    where
        C: DirectoryClient + ?Sized,
    {
        let change = Modification::Add(
            self.attribute().to_string(),
            vec![self.member_value(username, user_dn).to_string()],
        );
        match client.modify(group_dn, &[change]).await {
            Err(e) if e.result_code() == Some(LDAP_RC_ATTRIBUTE_OR_VALUE_EXISTS) => Ok(()),
            other => other,
        }
    }

    /// Remove the user from `group_dn`.
    ///
    /// When the user is the last value of a DN-based membership attribute the
    /// server refuses to empty it, so the value is swapped for the placeholder.
    ///
    /// # Errors
    ///
    /// Returns the modify error when the server rejects the change.
    pub async fn remove<C>(
        self,
        client: &mut C,
        group_dn: &str,
        username: &str,
        user_dn: &str,
    ) -> Result<(), DirectoryError>
    where
        C: DirectoryClient + ?Sized,
    {
        let change = Modification::Delete(
            self.attribute().to_string(),
            vec![self.member_value(username, user_dn).to_string()],
        );
        match client.modify(group_dn, &[change]).await {
            Err(e)
                if self.requires_value()
                    && e.result_code() == Some(LDAP_RC_OBJECT_CLASS_VIOLATION) =>
            {
                debug!(
                    group = %group_dn,
                    attribute = self.attribute(),
                    "Last member removed, writing placeholder"
                );
                let replace = Modification::Replace(
                    self.attribute().to_string(),
                    vec![PLACEHOLDER_MEMBER_DN.to_string()],
                );
                client.modify(group_dn, &[replace]).await
            }
            other => other,
        }
    }
}

/// Result of a membership sync.
///
/// `existing` and `missing` partition the desired groups: `existing` are the
/// groups found in the directory, `missing` the ones that were not.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupSyncResult {
    pub existing: Vec<String>,
    pub missing: Vec<String>,
}

/// Groups under `group_base` currently listing the user, as `DN -> cn values`.
///
/// # Errors
///
/// Returns [`SyncError::ReadMemberships`] when the search fails.
pub async fn current_memberships<C>(
    client: &mut C,
    username: &str,
    user_dn: &str,
    group_base: &str,
) -> Result<BTreeMap<String, Vec<String>>, SyncError>
where
    C: DirectoryClient + ?Sized,
{
    let entries = client
        .search(
            group_base,
            Scope::Subtree,
            &membership_filter(user_dn, username),
            &["cn"],
        )
        .await
        .map_err(|source| SyncError::ReadMemberships {
            user_dn: user_dn.to_string(),
            group_base: group_base.to_string(),
            source,
        })?;

    Ok(entries
        .into_iter()
        .map(|entry| {
            let cns = entry.values("cn").to_vec();
            (entry.dn, cns)
        })
        .collect())
}

/// `cn` matching is case-insensitive in the directory, so it is here too.
fn group_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

fn lists_any(cns: &[String], wanted: &BTreeSet<String>) -> bool {
    cns.iter().any(|cn| wanted.contains(&group_key(cn)))
}

/// Converge the user's memberships under `group_base` to `groups`.
///
/// Desired groups that do not exist are reported as missing and skipped. Failures
/// to add or remove a single membership are logged and do not fail the sync.
///
/// # Errors
///
/// Returns [`SyncError`] when the current memberships cannot be read.
pub async fn sync_user_groups<C>(
    client: &mut C,
    username: &str,
    user_dn: &str,
    groups: &[String],
    group_base: &str,
) -> Result<GroupSyncResult, SyncError>
where
    C: DirectoryClient + ?Sized,
{
    let current = current_memberships(client, username, user_dn, group_base).await?;

    let mut result = GroupSyncResult::default();
    let mut seen = BTreeSet::new();
    for group in groups {
        if !seen.insert(group_key(group)) {
            continue;
        }
        let group_dn = child_dn("cn", group, group_base);
        match entry_exists(client, &group_dn).await {
            Ok(true) => result.existing.push(group.clone()),
            Ok(false) => {
                debug!(group = %group, "Desired group does not exist");
                result.missing.push(group.clone());
            }
            Err(e) => {
                warn!(group = %group, error = %e, "Could not check group, treating as missing");
                result.missing.push(group.clone());
            }
        }
    }

    let joined: BTreeSet<String> = current
        .values()
        .flat_map(|cns| cns.iter().map(|cn| group_key(cn)))
        .collect();
    let wanted: BTreeSet<String> = result.existing.iter().map(|g| group_key(g)).collect();

    for group in &result.existing {
        if joined.contains(&group_key(group)) {
            continue;
        }
        let group_dn = child_dn("cn", group, group_base);
        if apply_with_fallback(client, &group_dn, username, user_dn, Change::Add).await {
            info!(user = %username, group = %group, "Added user to group");
        }
    }

    for (group_dn, cns) in &current {
        if lists_any(cns, &wanted) {
            continue;
        }
        if apply_with_fallback(client, group_dn, username, user_dn, Change::Remove).await {
            info!(user = %username, group = %group_dn, "Removed user from group");
        }
    }

    Ok(result)
}

/// Remove the user from every group under `group_base`. Returns how many
/// memberships were removed.
///
/// # Errors
///
/// Returns [`SyncError`] when the current memberships cannot be read.
pub async fn remove_all_memberships<C>(
    client: &mut C,
    username: &str,
    user_dn: &str,
    group_base: &str,
) -> Result<usize, SyncError>
where
    C: DirectoryClient + ?Sized,
{
    let current = current_memberships(client, username, user_dn, group_base).await?;
    let mut removed = 0;
    for group_dn in current.keys() {
        if apply_with_fallback(client, group_dn, username, user_dn, Change::Remove).await {
            removed += 1;
        }
    }
    Ok(removed)
}

/// Members of a group under any convention, without the placeholder.
///
/// # Errors
///
/// Returns the search error.
pub async fn read_group_members<C>(
    client: &mut C,
    group_dn: &str,
) -> Result<Vec<String>, DirectoryError>
where
    C: DirectoryClient + ?Sized,
{
    let attrs: Vec<&str> = MembershipKind::FALLBACK_ORDER
        .iter()
        .map(|kind| kind.attribute())
        .collect();
    let entries = client
        .search(group_dn, Scope::Base, "(objectClass=*)", &attrs)
        .await?;

    let Some(entry) = entries.into_iter().next() else {
        return Ok(Vec::new());
    };

    Ok(MembershipKind::FALLBACK_ORDER
        .iter()
        .flat_map(|kind| entry.values(kind.attribute()).iter())
        .filter(|value| !value.eq_ignore_ascii_case(PLACEHOLDER_MEMBER_DN))
        .cloned()
        .collect())
}

#[derive(Clone, Copy, Debug)]
enum Change {
    Add,
    Remove,
}

impl Change {
    fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
        }
    }
}

async fn apply_with_fallback<C>(
    client: &mut C,
    group_dn: &str,
    username: &str,
    user_dn: &str,
    change: Change,
) -> bool
where
    C: DirectoryClient + ?Sized,
{
    for kind in MembershipKind::FALLBACK_ORDER {
        let outcome = match change {
            Change::Add => kind.add(client, group_dn, username, user_dn).await,
            Change::Remove => kind.remove(client, group_dn, username, user_dn).await,
        };
        match outcome {
            Ok(()) => {
                metrics::record_membership_change(change.as_str(), kind.attribute(), true);
                return true;
            }
            Err(e) => debug!(
                group = %group_dn,
                attribute = kind.attribute(),
                error = %e,
                "Membership {} rejected, trying next convention",
                change.as_str()
            ),
        }
    }

    metrics::record_membership_change(change.as_str(), "none", false);
    warn!(
        group = %group_dn,
        user = %user_dn,
        "Could not {} membership with any convention",
        change.as_str()
    );
    false
}

#[cfg(test)]
#[path = "membership_tests.rs"]
mod membership_tests;
