// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for all controllers with reflector stores.
//!
//! All controllers receive an `Arc<Context>` holding the Kubernetes client and
//! the reflector stores of the three ldapy kinds. The stores back the watch
//! mappers: when an `LDAPServer` changes, the `LDAPUser` and `LDAPGroup`
//! controllers look up every resource referencing it in memory instead of
//! querying the API server.

use crate::crd::{LDAPGroup, LDAPServer, LDAPServerRef, LDAPUser};
use kube::runtime::reflector::{ObjectRef, Store};
use kube::{Client, ResourceExt};

/// Shared state handed to every reconciler.
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client
    pub client: Client,

    /// Reflector stores for in-memory lookups
    pub stores: Stores,
}

/// Reflector stores of all ldapy kinds.
#[derive(Clone)]
pub struct Stores {
    pub ldap_servers: Store<LDAPServer>,
    pub ldap_users: Store<LDAPUser>,
    pub ldap_groups: Store<LDAPGroup>,
}

/// Whether `reference`, held by a resource in `resource_namespace`, points at
/// the `LDAPServer` `server_namespace/server_name`.
#[must_use]
pub fn references_server(
    reference: &LDAPServerRef,
    resource_namespace: &str,
    server_name: &str,
    server_namespace: &str,
) -> bool {
    reference.name == server_name && reference.namespace_or(resource_namespace) == server_namespace
}

impl Stores {
    /// `LDAPUser`s that reference `server`.
    #[must_use]
    pub fn users_referencing_server(&self, server: &LDAPServer) -> Vec<ObjectRef<LDAPUser>> {
        let server_name = server.name_any();
        let server_namespace = server.namespace().unwrap_or_default();

        self.ldap_users
            .state()
            .iter()
            .filter(|user| {
                let namespace = user.namespace().unwrap_or_default();
                references_server(
                    &user.spec.ldap_server_ref,
                    &namespace,
                    &server_name,
                    &server_namespace,
                )
            })
            .map(|user| ObjectRef::from_obj(user.as_ref()))
            .collect()
    }

    /// `LDAPGroup`s that reference `server`.
    #[must_use]
    pub fn groups_referencing_server(&self, server: &LDAPServer) -> Vec<ObjectRef<LDAPGroup>> {
        let server_name = server.name_any();
        let server_namespace = server.namespace().unwrap_or_default();

        self.ldap_groups
            .state()
            .iter()
            .filter(|group| {
                let namespace = group.namespace().unwrap_or_default();
                references_server(
                    &group.spec.ldap_server_ref,
                    &namespace,
                    &server_name,
                    &server_namespace,
                )
            })
            .map(|group| ObjectRef::from_obj(group.as_ref()))
            .collect()
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
