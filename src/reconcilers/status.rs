// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status conditions and conflict-safe status persistence.
//!
//! Every reconciler publishes its outcome through [`publish_status`], which
//! re-reads the latest object, applies the caller's status mutation to it and
//! writes the result as a merge patch carrying `metadata.resourceVersion`. When
//! another writer got there first the API server answers 409 and the whole
//! read-modify-write is retried with [`conflict_backoff`].
//!
//! A write is skipped when the mutation leaves the status unchanged, so a
//! reconciler that publishes the same outcome twice does not generate a watch
//! event and re-trigger itself.
//!
//! # Example
//!
//! ```rust,no_run
//! use kube::Client;
//! use ldapy::crd::{GroupPhase, LDAPGroup};
//! use ldapy::reconcilers::status::publish_status;
//!
//! # async fn example(client: Client) -> Result<(), ldapy::reconcilers::status::PersistError> {
//! publish_status::<LDAPGroup, _>(&client, "identity", "developers", |status| {
//!     status.phase = GroupPhase::Ready;
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::Utc;
use kube::api::{Patch, PatchParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::Debug;
use thiserror::Error;
use tracing::{debug, warn};

use super::retry::{conflict_backoff, is_conflict};
use crate::constants::STATUS_CONFLICT_MAX_ATTEMPTS;
use crate::crd::{
    Condition, LDAPGroup, LDAPGroupStatus, LDAPServer, LDAPServerStatus, LDAPUser, LDAPUserStatus,
};
use crate::status_reasons::{CONDITION_STATUS_FALSE, CONDITION_STATUS_TRUE, CONDITION_TYPE_READY};

/// Create a new Kubernetes condition with the current timestamp.
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Update or add a condition in a conditions list (in-memory, no API call).
///
/// `lastTransitionTime` is preserved when the condition's status does not change.
pub fn update_condition_in_memory(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        let last_transition_time = if existing.status == status {
            existing
                .last_transition_time
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339())
        } else {
            Utc::now().to_rfc3339()
        };

        existing.status = status.to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
        existing.last_transition_time = Some(last_transition_time);
    } else {
        conditions.push(create_condition(condition_type, status, reason, message));
    }
}

/// Set the `Ready` condition.
pub fn set_ready_condition(conditions: &mut Vec<Condition>, ready: bool, reason: &str, message: &str) {
    let status = if ready {
        CONDITION_STATUS_TRUE
    } else {
        CONDITION_STATUS_FALSE
    };
    update_condition_in_memory(conditions, CONDITION_TYPE_READY, status, reason, message);
}

/// A namespaced custom resource whose status is owned by this operator.
pub trait ManagedResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + DeserializeOwned
    + Serialize
    + Send
    + Sync
    + 'static
{
    type Status: Clone + Debug + Default + PartialEq + Serialize + Send + Sync;

    /// The status currently stored on the object.
    fn current_status(&self) -> Option<&Self::Status>;

    /// Record that the status content changed at `now` (RFC3339).
    fn touch(status: &mut Self::Status, now: &str);
}

impl ManagedResource for LDAPServer {
    type Status = LDAPServerStatus;

    fn current_status(&self) -> Option<&Self::Status> {
        self.status.as_ref()
    }

    // lastChecked is written by every probe.
    fn touch(_status: &mut Self::Status, _now: &str) {}
}

impl ManagedResource for LDAPUser {
    type Status = LDAPUserStatus;

    fn current_status(&self) -> Option<&Self::Status> {
        self.status.as_ref()
    }

    fn touch(status: &mut Self::Status, now: &str) {
        status.last_modified = Some(now.to_string());
    }
}

impl ManagedResource for LDAPGroup {
    type Status = LDAPGroupStatus;

    fn current_status(&self) -> Option<&Self::Status> {
        self.status.as_ref()
    }

    fn touch(status: &mut Self::Status, now: &str) {
        status.last_modified = Some(now.to_string());
    }
}

/// Errors that can occur while persisting a status.
#[derive(Error, Debug)]
pub enum PersistError {
    /// The object disappeared between the reconcile and the status write.
    #[error("{kind} {namespace}/{name} not found while writing status")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    /// Every attempt lost the race against another writer.
    #[error("Status write for {kind} {namespace}/{name} still conflicting after {attempts} attempts")]
    Conflict {
        kind: String,
        namespace: String,
        name: String,
        attempts: u32,
    },

    /// The API server rejected the read or the write.
    #[error("Failed to write status for {kind} {namespace}/{name}: {source}")]
    Api {
        kind: String,
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    /// The status could not be serialized into a patch.
    #[error("Failed to serialize status: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Where statuses are read from and written to.
///
/// The production implementation is [`ApiStatusStore`]; tests substitute an
/// in-memory store that emulates `resourceVersion` checks.
#[async_trait]
pub trait StatusStore<K: ManagedResource>: Send + Sync {
    /// Namespace the store operates in.
    fn namespace(&self) -> &str;

    /// Latest version of the object, `None` when it no longer exists.
    async fn get(&self, name: &str) -> Result<Option<K>, kube::Error>;

    /// Apply a JSON merge patch to the status subresource.
    async fn patch_status(&self, name: &str, patch: &Value) -> Result<K, kube::Error>;
}

/// [`StatusStore`] backed by the Kubernetes API.
pub struct ApiStatusStore<K: ManagedResource> {
    api: Api<K>,
    namespace: String,
}

impl<K: ManagedResource> ApiStatusStore<K> {
    #[must_use]
    pub fn new(client: &Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client.clone(), namespace),
            namespace: namespace.to_string(),
        }
    }
}

#[async_trait]
impl<K: ManagedResource> StatusStore<K> for ApiStatusStore<K> {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn get(&self, name: &str) -> Result<Option<K>, kube::Error> {
        self.api.get_opt(name).await
    }

    async fn patch_status(&self, name: &str, patch: &Value) -> Result<K, kube::Error> {
        self.api
            .patch_status(name, &PatchParams::default(), &Patch::Merge(patch))
            .await
    }
}

/// Build the merge patch turning `current` into `desired`.
///
/// Top-level status fields present in `current` but omitted from `desired` are
/// set to `null` so the merge removes them. `resource_version` makes the write
/// conditional on the object not having changed since it was read.
///
/// # Errors
///
/// Returns a serialization error if either status cannot be turned into JSON.
pub fn status_patch<S: Serialize>(
    resource_version: Option<&str>,
    current: Option<&S>,
    desired: &S,
) -> Result<Value, serde_json::Error> {
    let mut status = serde_json::to_value(desired)?;

    if let (Some(current), Value::Object(fields)) = (current, &mut status) {
        if let Value::Object(previous) = serde_json::to_value(current)? {
            for key in previous.keys() {
                if !fields.contains_key(key) {
                    fields.insert(key.clone(), Value::Null);
                }
            }
        }
    }

    let mut patch = json!({ "status": status });
    if let Some(resource_version) = resource_version {
        patch["metadata"] = json!({ "resourceVersion": resource_version });
    }
    Ok(patch)
}

/// Read the latest object, apply `mutate` to its status and write it back,
/// retrying on conflicts.
///
/// `mutate` may run several times, each time on a freshly read status.
///
/// # Errors
///
/// Returns [`PersistError::Conflict`] after [`STATUS_CONFLICT_MAX_ATTEMPTS`]
/// conflicting writes, or the first non-conflict failure.
pub async fn read_modify_write<K, S, F>(
    store: &S,
    name: &str,
    mut mutate: F,
) -> Result<K, PersistError>
where
    K: ManagedResource,
    S: StatusStore<K> + ?Sized,
    F: FnMut(&mut K::Status) + Send,
{
    let kind = K::kind(&()).to_string();
    let namespace = store.namespace().to_string();
    let resource = format!("{namespace}/{name}");
    let api_error = |source: kube::Error| PersistError::Api {
        kind: kind.clone(),
        namespace: namespace.clone(),
        name: name.to_string(),
        source,
    };

    let mut backoff = conflict_backoff();
    for attempt in 1..=STATUS_CONFLICT_MAX_ATTEMPTS {
        let Some(latest) = store.get(name).await.map_err(api_error)? else {
            return Err(PersistError::NotFound {
                kind: kind.clone(),
                namespace: namespace.clone(),
                name: name.to_string(),
            });
        };

        let current = latest.current_status();
        let mut desired = current.cloned().unwrap_or_default();
        mutate(&mut desired);

        if current == Some(&desired) {
            debug!(kind = %kind, resource = %resource, "Status unchanged, skipping write");
            return Ok(latest);
        }
        K::touch(&mut desired, &Utc::now().to_rfc3339());

        let resource_version = latest.resource_version();
        let patch = status_patch(resource_version.as_deref(), current, &desired)?;

        match store.patch_status(name, &patch).await {
            Ok(updated) => {
                debug!(
                    kind = %kind,
                    resource = %resource,
                    attempt,
                    "Status written"
                );
                return Ok(updated);
            }
            Err(e) if is_conflict(&e) => {
                warn!(
                    kind = %kind,
                    resource = %resource,
                    attempt,
                    "Status write conflicted, re-reading"
                );
                if attempt < STATUS_CONFLICT_MAX_ATTEMPTS {
                    if let Some(delay) = backoff.next_backoff() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
            Err(e) => return Err(api_error(e)),
        }
    }

    Err(PersistError::Conflict {
        kind,
        namespace,
        name: name.to_string(),
        attempts: STATUS_CONFLICT_MAX_ATTEMPTS,
    })
}

/// Publish a status mutation for `namespace/name` through the Kubernetes API.
///
/// # Errors
///
/// See [`read_modify_write`].
pub async fn publish_status<K, F>(
    client: &Client,
    namespace: &str,
    name: &str,
    mutate: F,
) -> Result<K, PersistError>
where
    K: ManagedResource,
    F: FnMut(&mut K::Status) + Send,
{
    let store = ApiStatusStore::<K>::new(client, namespace);
    read_modify_write(&store, name, mutate).await
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
