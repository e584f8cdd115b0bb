// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management for ldapy resources.
//!
//! Every managed resource carries [`FINALIZER`](crate::constants::FINALIZER) so
//! that its directory entry can be cleaned up before Kubernetes forgets the
//! object. The reconcilers follow the same protocol:
//!
//! 1. Finalizer missing: add it and requeue immediately.
//! 2. Deletion timestamp set: tear down, then remove the finalizer.
//! 3. Otherwise: reconcile normally.
//!
//! # Example
//!
//! ```rust,ignore
//! use ldapy::constants::FINALIZER;
//! use ldapy::reconcilers::finalizers::{ensure_finalizer, is_being_deleted, remove_finalizer};
//!
//! if is_being_deleted(&group) {
//!     // teardown...
//!     remove_finalizer(&client, &group, FINALIZER).await?;
//! } else if ensure_finalizer(&client, &group, FINALIZER).await? {
//!     return Ok(Action::requeue(Duration::ZERO));
//! }
//! ```

use anyhow::{Context as _, Result};
use kube::api::{Patch, PatchParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use serde_json::json;
use std::future::Future;
use tracing::{debug, info, warn};

/// Whether `finalizer` is present on the resource.
#[must_use]
pub fn has_finalizer<T: Resource>(resource: &T, finalizer: &str) -> bool {
    resource
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|existing| existing == finalizer))
}

/// Whether the resource carries a deletion timestamp.
#[must_use]
pub fn is_being_deleted<T: Resource>(resource: &T) -> bool {
    resource.meta().deletion_timestamp.is_some()
}

/// Add `finalizer` to the resource if it is missing.
///
/// Returns `true` when the finalizer was added, in which case the caller should
/// requeue and pick up the updated object.
///
/// # Errors
///
/// Returns an error if the patch is rejected by the API server.
pub async fn ensure_finalizer<T>(client: &Client, resource: &T, finalizer: &str) -> Result<bool>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    if has_finalizer(resource, finalizer) {
        return Ok(false);
    }

    let namespace = resource.namespace().unwrap_or_default();
    let name = resource.name_any();
    info!(
        "Adding finalizer {} to {} {}/{}",
        finalizer,
        T::kind(&()),
        namespace,
        name
    );

    let mut finalizers = resource.finalizers().to_vec();
    finalizers.push(finalizer.to_string());

    let api: Api<T> = Api::namespaced(client.clone(), &namespace);
    let patch = json!({ "metadata": { "finalizers": finalizers } });
    api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .with_context(|| format!("Failed to add finalizer to {} {namespace}/{name}", T::kind(&())))?;

    Ok(true)
}

/// Remove `finalizer` from the resource if it is present.
///
/// An object that is already gone counts as done.
///
/// # Errors
///
/// Returns an error if the patch is rejected by the API server.
pub async fn remove_finalizer<T>(client: &Client, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    if !has_finalizer(resource, finalizer) {
        return Ok(());
    }

    let namespace = resource.namespace().unwrap_or_default();
    let name = resource.name_any();
    info!(
        "Removing finalizer {} from {} {}/{}",
        finalizer,
        T::kind(&()),
        namespace,
        name
    );

    let finalizers: Vec<String> = resource
        .finalizers()
        .iter()
        .filter(|f| f.as_str() != finalizer)
        .cloned()
        .collect();

    let api: Api<T> = Api::namespaced(client.clone(), &namespace);
    let patch = json!({ "metadata": { "finalizers": finalizers } });
    match api
        .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
    {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 404 => {
            debug!("{} {}/{} already gone", T::kind(&()), namespace, name);
            Ok(())
        }
        Err(e) => Err(e).with_context(|| {
            format!(
                "Failed to remove finalizer from {} {namespace}/{name}",
                T::kind(&())
            )
        }),
    }
}

/// Run `cleanup`, then `release`, whether or not cleanup succeeded.
///
/// A cleanup failure is logged and handed back as `Ok(Some(message))`; deletion
/// must never block on an unreachable directory. Only a failed `release` is an error.
///
/// # Errors
///
/// Returns the error from `release`.
pub async fn cleanup_then_release<C, R>(
    resource: &str,
    cleanup: C,
    release: R,
) -> Result<Option<String>>
where
    C: Future<Output = Result<()>>,
    R: Future<Output = Result<()>>,
{
    let failure = match cleanup.await {
        Ok(()) => None,
        Err(e) => {
            let error = format!("{e:#}");
            warn!(
                resource = %resource,
                error = %error,
                "Directory cleanup failed, removing finalizer anyway"
            );
            Some(error)
        }
    };

    release.await?;
    Ok(failure)
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
