// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # ldapy - LDAP Directory Operator for Kubernetes
//!
//! ldapy is a Kubernetes operator written in Rust that keeps users, groups and
//! group memberships in an LDAP directory in sync with Custom Resources.
//!
//! ## Overview
//!
//! This library provides the core functionality for the ldapy operator, including:
//!
//! - Custom Resource Definitions (CRDs) for directory servers, users and groups
//! - Reconciliation logic for each resource type
//! - An LDAP session layer over `ldap3` with DN construction and escaping
//! - Group membership synchronization across `groupOfNames`,
//!   `groupOfUniqueNames` and `posixGroup`
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types
//! - [`reconcilers`] - Reconciliation logic for each resource type
//! - [`context`] - Shared context and reflector stores for controllers
//! - [`directory`] - LDAP sessions, entry mapping and membership sync
//! - [`directory_errors`] - Directory error types
//! - [`secrets`] - Credential lookup in Kubernetes `Secret`s
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
//!
//! ```rust,no_run
//! use ldapy::crd::{GroupType, LDAPGroupSpec, LDAPServerRef};
//!
//! let group = LDAPGroupSpec {
//!     ldap_server_ref: LDAPServerRef {
//!         name: "corp-ldap".to_string(),
//!         namespace: None,
//!     },
//!     group_name: "developers".to_string(),
//!     description: Some("Engineering".to_string()),
//!     group_type: GroupType::GroupOfNames,
//!     organizational_unit: "groups".to_string(),
//!     gid_number: None,
//!     additional_attributes: Default::default(),
//! };
//! ```
//!
//! ## Features
//!
//! - **TLS by default** - `ldaps://` unless explicitly disabled
//! - **Connectivity gating** - Users and groups wait for a connected `LDAPServer`
//! - **Safe deletion** - Finalizers remove directory entries before the resource goes away
//! - **Status Tracking** - Full status subresources with `Ready` conditions

pub mod constants;
pub mod context;
pub mod crd;
pub mod directory;
pub mod directory_errors;
pub mod duration;
pub mod metrics;
pub mod reconcilers;
pub mod secrets;
pub mod status_reasons;
