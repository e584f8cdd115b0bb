// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reading credentials from Kubernetes `Secret` objects.
//!
//! Bind passwords and initial user passwords are referenced by
//! [`SecretKeyRef`](crate::crd::SecretKeyRef) and always resolved in the
//! namespace of the referencing resource.

use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while resolving a secret value.
#[derive(Error, Debug)]
pub enum SecretError {
    /// The `Secret` does not exist.
    #[error("Secret {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    /// The `Secret` exists but has no such key.
    #[error("Key '{key}' not found in Secret {namespace}/{name}")]
    KeyNotFound {
        namespace: String,
        name: String,
        key: String,
    },

    /// The value is not valid UTF-8.
    #[error("Key '{key}' in Secret {namespace}/{name} is not valid UTF-8")]
    InvalidUtf8 {
        namespace: String,
        name: String,
        key: String,
    },

    /// The API server could not be queried.
    #[error("Failed to read Secret {namespace}/{name}: {source}")]
    Api {
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },
}

/// Value stored under `key` in `secret`. `stringData` is consulted too, for
/// secrets that were read back before the API server folded it into `data`.
#[must_use]
pub fn extract_key(secret: &Secret, key: &str) -> Option<Vec<u8>> {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .map(|value| value.0.clone())
        .or_else(|| {
            secret
                .string_data
                .as_ref()
                .and_then(|data| data.get(key))
                .map(|value| value.as_bytes().to_vec())
        })
}

/// Read the raw value stored under `key` in Secret `namespace/name`.
///
/// # Errors
///
/// Returns [`SecretError::NotFound`] or [`SecretError::KeyNotFound`] when the
/// secret or key is absent, and [`SecretError::Api`] for API failures.
pub async fn get_secret_value(
    client: &Client,
    namespace: &str,
    name: &str,
    key: &str,
) -> Result<Vec<u8>, SecretError> {
    let api: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let secret = api
        .get_opt(name)
        .await
        .map_err(|source| SecretError::Api {
            namespace: namespace.to_string(),
            name: name.to_string(),
            source,
        })?
        .ok_or_else(|| SecretError::NotFound {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })?;

    debug!(namespace = %namespace, secret = %name, key = %key, "Read secret");
    extract_key(&secret, key).ok_or_else(|| SecretError::KeyNotFound {
        namespace: namespace.to_string(),
        name: name.to_string(),
        key: key.to_string(),
    })
}

/// Read the value under `key` as UTF-8 text.
///
/// # Errors
///
/// As [`get_secret_value`], plus [`SecretError::InvalidUtf8`].
pub async fn get_secret_string(
    client: &Client,
    namespace: &str,
    name: &str,
    key: &str,
) -> Result<String, SecretError> {
    let bytes = get_secret_value(client, namespace, name, key).await?;
    String::from_utf8(bytes).map_err(|_| SecretError::InvalidUtf8 {
        namespace: namespace.to_string(),
        name: name.to_string(),
        key: key.to_string(),
    })
}

#[cfg(test)]
#[path = "secrets_tests.rs"]
mod secrets_tests;
