// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the ldapy operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for all ldapy CRDs
pub const API_GROUP: &str = "ldap.firestoned.io";

/// Kind name for `LDAPServer` resource
pub const KIND_LDAP_SERVER: &str = "LDAPServer";

/// Kind name for `LDAPUser` resource
pub const KIND_LDAP_USER: &str = "LDAPUser";

/// Kind name for `LDAPGroup` resource
pub const KIND_LDAP_GROUP: &str = "LDAPGroup";

/// Finalizer placed on every managed resource.
///
/// Directory cleanup runs while this finalizer is present; removing it lets
/// Kubernetes delete the object.
pub const FINALIZER: &str = "ldap.firestoned.io/finalizer";

// ============================================================================
// LDAP Protocol Constants
// ============================================================================

/// Standard LDAP port (plaintext)
pub const LDAP_PORT: u16 = 389;

/// Standard LDAPS port (TLS from the first byte)
pub const LDAPS_PORT: u16 = 636;

/// Default timeout applied to connect and every directory operation (30 seconds)
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Default interval between `LDAPServer` connectivity probes (5 minutes)
pub const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 300;

/// Default organizational unit for users
pub const DEFAULT_USER_OU: &str = "users";

/// Default organizational unit for groups
pub const DEFAULT_GROUP_OU: &str = "groups";

/// Prefix used to derive a home directory when none is given
pub const DEFAULT_HOME_DIRECTORY_PREFIX: &str = "/home";

/// Member value written into `groupOfNames` / `groupOfUniqueNames` groups that
/// have no real member yet. Both object classes require at least one value.
pub const PLACEHOLDER_MEMBER_DN: &str = "cn=placeholder";

/// Filter matching any entry, used for base-scoped existence checks
pub const FILTER_ANY_OBJECT: &str = "(objectClass=*)";

// ============================================================================
// LDAP Result Codes (RFC 4511)
// ============================================================================

/// Operation completed successfully
pub const LDAP_RC_SUCCESS: u32 = 0;

/// Attribute value to add already exists on the entry
pub const LDAP_RC_ATTRIBUTE_OR_VALUE_EXISTS: u32 = 20;

/// Target entry does not exist
pub const LDAP_RC_NO_SUCH_OBJECT: u32 = 32;

/// Bind credentials were rejected
pub const LDAP_RC_INVALID_CREDENTIALS: u32 = 49;

/// Change would violate the entry's object class rules
pub const LDAP_RC_OBJECT_CLASS_VIOLATION: u32 = 65;

/// Entry to add already exists
pub const LDAP_RC_ENTRY_ALREADY_EXISTS: u32 = 68;

// ============================================================================
// Controller Requeue Constants
// ============================================================================

/// Fixed requeue for resources in `Pending` or `Error` phase (5 minutes)
pub const REQUEUE_NOT_READY_SECS: u64 = 300;

/// Requeue duration for controller errors (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Maximum number of attempts for a conflicting status write
pub const STATUS_CONFLICT_MAX_ATTEMPTS: u32 = 5;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
