// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Mapping of `LDAPUser` and `LDAPGroup` specs to directory attributes.
//!
//! Everything here is pure: the same spec always produces the same attributes.
//! The full attribute set is only written when an entry is created; existing
//! entries receive the smaller list of replacements for their mutable fields.

use super::{AttributeSet, Modification};
use crate::constants::{DEFAULT_HOME_DIRECTORY_PREFIX, PLACEHOLDER_MEMBER_DN};
use crate::crd::{GroupType, LDAPGroupSpec, LDAPUserSpec};

/// Object classes of every user entry.
pub const USER_OBJECT_CLASSES: [&str; 2] = ["inetOrgPerson", "posixAccount"];

/// Object class for a group type.
#[must_use]
pub fn group_object_class(group_type: GroupType) -> &'static str {
    match group_type {
        GroupType::Posix => "posixGroup",
        GroupType::GroupOfNames => "groupOfNames",
        GroupType::GroupOfUniqueNames => "groupOfUniqueNames",
    }
}

/// Home directory of a user, `/home/<username>` unless set explicitly.
#[must_use]
pub fn home_directory(spec: &LDAPUserSpec) -> String {
    match non_empty(spec.home_directory.as_deref()) {
        Some(dir) => dir.to_string(),
        None => format!("{DEFAULT_HOME_DIRECTORY_PREFIX}/{}", spec.username),
    }
}

/// Common name of a user: display name, else "first last", else the username.
#[must_use]
pub fn common_name(spec: &LDAPUserSpec) -> String {
    if let Some(display) = non_empty(spec.display_name.as_deref()) {
        return display.to_string();
    }

    let parts: Vec<&str> = [spec.first_name.as_deref(), spec.last_name.as_deref()]
        .into_iter()
        .filter_map(non_empty)
        .collect();

    if parts.is_empty() {
        spec.username.clone()
    } else {
        parts.join(" ")
    }
}

/// Surname of a user: last name, else the username.
#[must_use]
pub fn surname(spec: &LDAPUserSpec) -> String {
    non_empty(spec.last_name.as_deref()).map_or_else(|| spec.username.clone(), str::to_string)
}

/// Attributes for a new user entry.
///
/// `password` becomes `userPassword`. `additionalAttributes` are added last and
/// never override an attribute built from the spec.
#[must_use]
pub fn user_attributes(spec: &LDAPUserSpec, password: Option<&str>) -> AttributeSet {
    let mut attrs = AttributeSet::new();

    attrs.insert(
        "objectClass".to_string(),
        USER_OBJECT_CLASSES.iter().map(ToString::to_string).collect(),
    );
    attrs.insert("uid".to_string(), vec![spec.username.clone()]);

    for (attr, values) in user_mutable_fields(spec) {
        if !values.is_empty() {
            attrs.insert(attr.to_string(), values);
        }
    }

    insert_number(&mut attrs, "uidNumber", spec.uid_number);
    insert_number(&mut attrs, "gidNumber", spec.gid_number);

    if let Some(password) = password.filter(|p| !p.is_empty()) {
        attrs.insert("userPassword".to_string(), vec![password.to_string()]);
    }

    merge_additional(&mut attrs, &spec.additional_attributes);
    attrs
}

/// Replacements applied to an existing user entry.
///
/// Optional fields that are unset are replaced with no values, which removes
/// them from the entry.
#[must_use]
pub fn user_replacements(spec: &LDAPUserSpec) -> Vec<Modification> {
    user_mutable_fields(spec)
        .into_iter()
        .map(|(attr, values)| Modification::Replace(attr.to_string(), values))
        .collect()
}

fn user_mutable_fields(spec: &LDAPUserSpec) -> Vec<(&'static str, Vec<String>)> {
    vec![
        ("cn", vec![common_name(spec)]),
        ("sn", vec![surname(spec)]),
        ("givenName", optional(spec.first_name.as_deref())),
        ("displayName", optional(spec.display_name.as_deref())),
        ("mail", optional(spec.email.as_deref())),
        ("homeDirectory", vec![home_directory(spec)]),
        ("loginShell", optional(spec.login_shell.as_deref())),
    ]
}

/// Attributes for a new group entry.
///
/// `groupOfNames` and `groupOfUniqueNames` require at least one member, so the
/// placeholder DN is written until real members are added.
#[must_use]
pub fn group_attributes(spec: &LDAPGroupSpec) -> AttributeSet {
    let mut attrs = AttributeSet::new();

    attrs.insert(
        "objectClass".to_string(),
        vec![group_object_class(spec.group_type).to_string()],
    );
    attrs.insert("cn".to_string(), vec![spec.group_name.clone()]);

    match spec.group_type {
        GroupType::Posix => insert_number(&mut attrs, "gidNumber", spec.gid_number),
        GroupType::GroupOfNames => {
            attrs.insert("member".to_string(), vec![PLACEHOLDER_MEMBER_DN.to_string()]);
        }
        GroupType::GroupOfUniqueNames => {
            attrs.insert(
                "uniqueMember".to_string(),
                vec![PLACEHOLDER_MEMBER_DN.to_string()],
            );
        }
    }

    let description = optional(spec.description.as_deref());
    if !description.is_empty() {
        attrs.insert("description".to_string(), description);
    }

    merge_additional(&mut attrs, &spec.additional_attributes);
    attrs
}

/// Replacements applied to an existing group entry.
#[must_use]
pub fn group_replacements(spec: &LDAPGroupSpec) -> Vec<Modification> {
    vec![Modification::Replace(
        "description".to_string(),
        optional(spec.description.as_deref()),
    )]
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn optional(value: Option<&str>) -> Vec<String> {
    non_empty(value).map(|v| vec![v.to_string()]).unwrap_or_default()
}

fn insert_number(attrs: &mut AttributeSet, attr: &str, value: Option<i64>) {
    if let Some(n) = value {
        attrs.insert(attr.to_string(), vec![n.to_string()]);
    }
}

fn merge_additional(
    attrs: &mut AttributeSet,
    additional: &std::collections::BTreeMap<String, Vec<String>>,
) {
    for (attr, values) in additional {
        if values.is_empty() || attrs.keys().any(|k| k.eq_ignore_ascii_case(attr)) {
            continue;
        }
        attrs.insert(attr.clone(), values.clone());
    }
}

#[cfg(test)]
#[path = "entry_tests.rs"]
mod entry_tests;
