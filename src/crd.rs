// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for LDAP directory management.
//!
//! This module defines all Kubernetes Custom Resource Definitions used by ldapy
//! to manage LDAP directory entries declaratively.
//!
//! # Resource Types
//!
//! - [`LDAPServer`] - Connection details for a directory server, probed for connectivity
//! - [`LDAPUser`] - A person entry (`inetOrgPerson` + `posixAccount`) and its group memberships
//! - [`LDAPGroup`] - A group entry in one of three membership representations
//!
//! # Example: Describing a User
//!
//! ```rust,no_run
//! use ldapy::crd::{LDAPServerRef, LDAPUserSpec};
//!
//! let spec = LDAPUserSpec {
//!     ldap_server_ref: LDAPServerRef {
//!         name: "corp-ldap".to_string(),
//!         namespace: None,
//!     },
//!     username: "jdoe".to_string(),
//!     email: Some("jdoe@example.com".to_string()),
//!     first_name: Some("John".to_string()),
//!     last_name: Some("Doe".to_string()),
//!     display_name: None,
//!     uid_number: Some(10001),
//!     gid_number: Some(10000),
//!     organizational_unit: "users".to_string(),
//!     home_directory: None,
//!     login_shell: Some("/bin/bash".to_string()),
//!     enabled: true,
//!     groups: vec!["developers".to_string()],
//!     additional_attributes: Default::default(),
//!     password_secret: None,
//! };
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::constants::{DEFAULT_GROUP_OU, DEFAULT_USER_OU, LDAPS_PORT, LDAP_PORT};

/// Condition represents an observation of a resource's current state.
///
/// Conditions are used in status subresources to communicate the state of
/// a resource to users and controllers.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition. ldapy reports a single `Ready` condition per resource.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Reference to a key inside a Kubernetes `Secret` in the referencing resource's namespace.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeyRef {
    /// Name of the Secret.
    pub name: String,

    /// Key within the Secret's data. Defaults to `password`.
    #[serde(default = "default_secret_key")]
    pub key: String,
}

fn default_secret_key() -> String {
    "password".to_string()
}

/// Reference to the `LDAPServer` a user or group lives on.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LDAPServerRef {
    /// Name of the `LDAPServer`.
    pub name: String,

    /// Namespace of the `LDAPServer`. Defaults to the referencing resource's namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl LDAPServerRef {
    /// Namespace the referenced server lives in, falling back to `default_namespace`.
    #[must_use]
    pub fn namespace_or<'a>(&'a self, default_namespace: &'a str) -> &'a str {
        self.namespace.as_deref().unwrap_or(default_namespace)
    }
}

/// TLS settings for an `LDAPServer`.
///
/// TLS is on unless `enabled` is explicitly `false`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    /// Use LDAPS. Defaults to `true` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Skip server certificate verification. Only for test environments.
    #[serde(default)]
    pub insecure_skip_verify: bool,

    /// Secret holding a CA bundle (`ca.crt`) for the server certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_secret: Option<SecretKeyRef>,

    /// Secret holding a client certificate and key (`tls.crt`, `tls.key`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_cert_secret: Option<SecretKeyRef>,
}

/// `LDAPServer` describes how to reach and authenticate against a directory server.
///
/// The operator probes every `LDAPServer` on `healthCheckInterval` and publishes
/// `status.connectionStatus`. Users and groups referencing the server are only
/// reconciled while that status is `Connected`.
///
/// # Example
///
/// ```yaml
/// apiVersion: ldap.firestoned.io/v1alpha1
/// kind: LDAPServer
/// metadata:
///   name: corp-ldap
///   namespace: identity
/// spec:
///   host: ldap.example.com
///   bindDN: cn=admin,dc=example,dc=com
///   bindPasswordSecret:
///     name: ldap-admin
///     key: password
///   baseDN: dc=example,dc=com
///   connectionTimeout: 30s
///   healthCheckInterval: 5m
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "ldap.firestoned.io",
    version = "v1alpha1",
    kind = "LDAPServer",
    namespaced,
    shortname = "ldapsrv",
    doc = "LDAPServer holds the connection, bind and TLS settings for a directory server. Its status reports the result of the most recent connectivity probe."
)]
#[kube(status = "LDAPServerStatus")]
#[kube(printcolumn = r#"{"name":"Host","type":"string","jsonPath":".spec.host"}"#)]
#[kube(printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.connectionStatus"}"#)]
#[serde(rename_all = "camelCase")]
pub struct LDAPServerSpec {
    /// Hostname or IP address of the directory server.
    pub host: String,

    /// TCP port. Defaults to 636 with TLS and 389 without.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1, max = 65535))]
    pub port: Option<i32>,

    /// Distinguished name used for the simple bind.
    #[serde(rename = "bindDN")]
    pub bind_dn: String,

    /// Secret holding the bind password.
    pub bind_password_secret: SecretKeyRef,

    /// Base DN under which users and groups are placed.
    #[serde(rename = "baseDN")]
    pub base_dn: String,

    /// TLS settings. Omitting the block keeps TLS enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,

    /// Timeout for connecting and for each directory operation (e.g. "30s", "1m").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_timeout: Option<String>,

    /// Interval between connectivity probes (e.g. "5m").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_interval: Option<String>,
}

impl LDAPServerSpec {
    /// Whether the connection uses TLS. Only an explicit `enabled: false` turns it off.
    #[must_use]
    pub fn tls_enabled(&self) -> bool {
        self.tls
            .as_ref()
            .and_then(|tls| tls.enabled)
            .unwrap_or(true)
    }

    /// Whether certificate verification should be skipped.
    #[must_use]
    pub fn tls_skip_verify(&self) -> bool {
        self.tls.as_ref().is_some_and(|tls| tls.insecure_skip_verify)
    }

    /// Port to connect to, defaulting by transport.
    #[must_use]
    pub fn effective_port(&self) -> u16 {
        match self.port.and_then(|p| u16::try_from(p).ok()) {
            Some(port) if port != 0 => port,
            _ if self.tls_enabled() => LDAPS_PORT,
            _ => LDAP_PORT,
        }
    }

    /// Connection URL, `ldaps://` when TLS is enabled.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.tls_enabled() { "ldaps" } else { "ldap" };
        format!("{scheme}://{}:{}", self.host, self.effective_port())
    }
}

/// Connectivity reported by the `LDAPServer` prober.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Connect, bind and base search all succeeded.
    Connected,
    /// The server could not be reached.
    Disconnected,
    /// The server was reached but bind, credentials or search failed.
    Error,
    /// No probe has completed yet.
    #[default]
    Unknown,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connected => "Connected",
            Self::Disconnected => "Disconnected",
            Self::Error => "Error",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// `LDAPServer` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LDAPServerStatus {
    #[serde(default)]
    pub connection_status: ConnectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// `LDAPUser` describes a person entry and the groups it should belong to.
///
/// The entry is created as `uid=<username>,ou=<organizationalUnit>,<baseDN>` with
/// object classes `inetOrgPerson` and `posixAccount`.
///
/// # Example
///
/// ```yaml
/// apiVersion: ldap.firestoned.io/v1alpha1
/// kind: LDAPUser
/// metadata:
///   name: jdoe
///   namespace: identity
/// spec:
///   ldapServerRef:
///     name: corp-ldap
///   username: jdoe
///   firstName: John
///   lastName: Doe
///   email: jdoe@example.com
///   uidNumber: 10001
///   gidNumber: 10000
///   groups:
///     - developers
///     - vpn-users
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "ldap.firestoned.io",
    version = "v1alpha1",
    kind = "LDAPUser",
    namespaced,
    shortname = "ldapuser",
    doc = "LDAPUser is a person entry in a directory server together with its desired group memberships."
)]
#[kube(status = "LDAPUserStatus")]
#[kube(printcolumn = r#"{"name":"Username","type":"string","jsonPath":".spec.username"}"#)]
#[kube(printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#)]
#[serde(rename_all = "camelCase")]
pub struct LDAPUserSpec {
    /// The `LDAPServer` this user is created on.
    pub ldap_server_ref: LDAPServerRef,

    /// Login name, used as the `uid` RDN. Unique within the base DN.
    #[schemars(regex(pattern = r"^[a-zA-Z0-9._-]+$"))]
    pub username: String,

    /// Mail address (`mail`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Given name (`givenName`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    /// Surname (`sn`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    /// Display name (`displayName`, also used for `cn`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// POSIX user id (`uidNumber`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0))]
    pub uid_number: Option<i64>,

    /// POSIX primary group id (`gidNumber`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0))]
    pub gid_number: Option<i64>,

    /// Organizational unit the entry is placed under. Defaults to `users`.
    #[serde(default = "default_user_ou")]
    pub organizational_unit: String,

    /// Home directory. Defaults to `/home/<username>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_directory: Option<String>,

    /// Login shell (`loginShell`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_shell: Option<String>,

    /// Whether the account is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Names of the groups this user should be a member of.
    #[serde(default)]
    pub groups: Vec<String>,

    /// Extra attributes written when the entry is created.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_attributes: BTreeMap<String, Vec<String>>,

    /// Secret holding the initial password (`userPassword`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_secret: Option<SecretKeyRef>,
}

fn default_user_ou() -> String {
    DEFAULT_USER_OU.to_string()
}

fn default_true() -> bool {
    true
}

/// Lifecycle phase of an `LDAPUser`.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum UserPhase {
    /// Waiting for the server to become reachable.
    #[default]
    Pending,
    /// Entry and all memberships are in sync.
    Ready,
    /// Entry is in sync but some desired groups do not exist.
    Warning,
    /// The last reconciliation failed.
    Error,
    /// The entry is being removed from the directory.
    Deleting,
}

impl fmt::Display for UserPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Ready => "Ready",
            Self::Warning => "Warning",
            Self::Error => "Error",
            Self::Deleting => "Deleting",
        };
        f.write_str(s)
    }
}

/// `LDAPUser` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LDAPUserStatus {
    #[serde(default)]
    pub phase: UserPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_directory: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub missing_groups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Membership representation of an `LDAPGroup`.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum GroupType {
    /// `posixGroup`, members listed by bare username in `memberUid`.
    Posix,
    /// `groupOfNames`, members listed by DN in `member`.
    #[default]
    GroupOfNames,
    /// `groupOfUniqueNames`, members listed by DN in `uniqueMember`.
    GroupOfUniqueNames,
}

/// `LDAPGroup` describes a group entry.
///
/// # Example
///
/// ```yaml
/// apiVersion: ldap.firestoned.io/v1alpha1
/// kind: LDAPGroup
/// metadata:
///   name: developers
///   namespace: identity
/// spec:
///   ldapServerRef:
///     name: corp-ldap
///   groupName: developers
///   description: Engineering team
///   groupType: groupOfNames
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "ldap.firestoned.io",
    version = "v1alpha1",
    kind = "LDAPGroup",
    namespaced,
    shortname = "ldapgroup",
    doc = "LDAPGroup is a group entry in a directory server. Membership is driven from LDAPUser resources."
)]
#[kube(status = "LDAPGroupStatus")]
#[kube(printcolumn = r#"{"name":"Group","type":"string","jsonPath":".spec.groupName"}"#)]
#[kube(printcolumn = r#"{"name":"Members","type":"integer","jsonPath":".status.memberCount"}"#)]
#[kube(printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#)]
#[serde(rename_all = "camelCase")]
pub struct LDAPGroupSpec {
    /// The `LDAPServer` this group is created on.
    pub ldap_server_ref: LDAPServerRef,

    /// Group name, used as the `cn` RDN. Unique within the base DN.
    pub group_name: String,

    /// Free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Membership representation. Defaults to `groupOfNames`.
    #[serde(default)]
    pub group_type: GroupType,

    /// Organizational unit the entry is placed under. Defaults to `groups`.
    #[serde(default = "default_group_ou")]
    pub organizational_unit: String,

    /// POSIX group id (`gidNumber`). Only used for `posix` groups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0))]
    pub gid_number: Option<i64>,

    /// Extra attributes written when the entry is created.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_attributes: BTreeMap<String, Vec<String>>,
}

fn default_group_ou() -> String {
    DEFAULT_GROUP_OU.to_string()
}

/// Lifecycle phase of an `LDAPGroup`.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum GroupPhase {
    /// Waiting for the server to become reachable.
    #[default]
    Pending,
    /// Entry is in sync.
    Ready,
    /// The last reconciliation failed.
    Error,
    /// The entry is being removed from the directory.
    Deleting,
}

impl fmt::Display for GroupPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Ready => "Ready",
            Self::Error => "Error",
            Self::Deleting => "Deleting",
        };
        f.write_str(s)
    }
}

/// `LDAPGroup` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LDAPGroupStatus {
    #[serde(default)]
    pub phase: GroupPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dn: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub member_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
