// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Distinguished name construction and value escaping.
//!
//! Users live at `uid=<username>,ou=<ou>,<baseDN>` and groups at
//! `cn=<name>,ou=<ou>,<baseDN>`. The `ou=` segment is omitted when the
//! organizational unit is empty.

/// Escape an attribute value for use inside an RDN (RFC 4514).
///
/// Escapes `, + " \ < > ; =` with a backslash, NUL as `\00`, a leading `#` as
/// `\23`, and leading or trailing spaces as `\20`.
#[must_use]
pub fn escape_dn_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len() * 2);
    let last = value.chars().count().saturating_sub(1);

    for (i, ch) in value.chars().enumerate() {
        match ch {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                result.push('\\');
                result.push(ch);
            }
            '\0' => result.push_str("\\00"),
            ' ' if i == 0 || i == last => result.push_str("\\20"),
            '#' if i == 0 => result.push_str("\\23"),
            _ => result.push(ch),
        }
    }

    result
}

/// Escape a value for use inside a search filter (RFC 4515).
#[must_use]
pub fn escape_filter_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => result.push_str("\\5c"),
            '*' => result.push_str("\\2a"),
            '(' => result.push_str("\\28"),
            ')' => result.push_str("\\29"),
            '\0' => result.push_str("\\00"),
            _ => result.push(ch),
        }
    }
    result
}

/// DN of a child entry: `<attr>=<escaped value>,<parent>`.
#[must_use]
pub fn child_dn(attr: &str, value: &str, parent: &str) -> String {
    if parent.is_empty() {
        format!("{attr}={}", escape_dn_value(value))
    } else {
        format!("{attr}={},{parent}", escape_dn_value(value))
    }
}

/// DN of an organizational unit below `base_dn`, or `base_dn` itself when `ou` is empty.
#[must_use]
pub fn ou_dn(ou: &str, base_dn: &str) -> String {
    if ou.trim().is_empty() {
        base_dn.to_string()
    } else {
        child_dn("ou", ou, base_dn)
    }
}

/// Build the DN of a user entry.
///
/// # Example
///
/// ```
/// use ldapy::directory::dn::build_user_dn;
///
/// assert_eq!(
///     build_user_dn("jdoe", "employees", "dc=example,dc=com"),
///     "uid=jdoe,ou=employees,dc=example,dc=com"
/// );
/// assert_eq!(build_user_dn("jdoe", "", "dc=example,dc=com"), "uid=jdoe,dc=example,dc=com");
/// ```
#[must_use]
pub fn build_user_dn(username: &str, ou: &str, base_dn: &str) -> String {
    child_dn("uid", username, &ou_dn(ou, base_dn))
}

/// Build the DN of a group entry.
#[must_use]
pub fn build_group_dn(group_name: &str, ou: &str, base_dn: &str) -> String {
    child_dn("cn", group_name, &ou_dn(ou, base_dn))
}

/// Filter matching every group that lists the user under any membership convention.
#[must_use]
pub fn membership_filter(user_dn: &str, username: &str) -> String {
    let dn = escape_filter_value(user_dn);
    format!(
        "(|(member={dn})(uniqueMember={dn})(memberUid={}))",
        escape_filter_value(username)
    )
}

#[cfg(test)]
#[path = "dn_tests.rs"]
mod dn_tests;
