// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory [`DirectoryClient`] used by unit tests.
//!
//! Models just enough of an LDAP server to exercise the reconcilers: base and
//! subtree searches with a small filter grammar, result codes 16, 20, 32, 65 and
//! 68, and the membership rules of `groupOfNames`, `groupOfUniqueNames` and
//! `posixGroup`.

use async_trait::async_trait;
use std::collections::BTreeMap;

use super::{AttributeSet, DirectoryClient, DirectoryEntry, Modification, Scope};
use crate::constants::{
    LDAP_RC_ATTRIBUTE_OR_VALUE_EXISTS, LDAP_RC_ENTRY_ALREADY_EXISTS, LDAP_RC_NO_SUCH_OBJECT,
    LDAP_RC_OBJECT_CLASS_VIOLATION,
};
use crate::directory_errors::DirectoryError;

/// Result code for removing a value that is not present.
const LDAP_RC_NO_SUCH_ATTRIBUTE: u32 = 16;

/// Membership attributes and which object class permits each.
const MEMBERSHIP_RULES: [(&str, &str); 3] = [
    ("member", "groupOfNames"),
    ("uniqueMember", "groupOfUniqueNames"),
    ("memberUid", "posixGroup"),
];

#[derive(Debug, Default, Clone)]
pub struct InMemoryDirectory {
    entries: BTreeMap<String, DirectoryEntry>,
    failures: Vec<(&'static str, String, u32)>,
    mutations: Vec<String>,
    closed: bool,
}

impl InMemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an entry directly, bypassing schema checks and the mutation log.
    pub fn insert(&mut self, dn: &str, attrs: &[(&str, &[&str])]) {
        let entry = DirectoryEntry {
            dn: dn.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, vs)| ((*k).to_string(), vs.iter().map(ToString::to_string).collect()))
                .collect(),
        };
        self.entries.insert(key(dn), entry);
    }

    /// Make every `operation` ("search", "add", "modify", "delete") on `dn` fail with `rc`.
    pub fn fail_on(&mut self, operation: &'static str, dn: &str, rc: u32) {
        self.failures.push((operation, key(dn), rc));
    }

    #[must_use]
    pub fn get(&self, dn: &str) -> Option<&DirectoryEntry> {
        self.entries.get(&key(dn))
    }

    #[must_use]
    pub fn contains(&self, dn: &str) -> bool {
        self.entries.contains_key(&key(dn))
    }

    /// Values of `attr` on `dn`, empty when either is missing.
    #[must_use]
    pub fn values(&self, dn: &str, attr: &str) -> Vec<String> {
        self.get(dn)
            .map(|e| e.values(attr).to_vec())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, DirectoryEntry> {
        self.entries.clone()
    }

    /// Successful add/modify/delete requests, as "<op> <dn>".
    #[must_use]
    pub fn mutations(&self) -> &[String] {
        &self.mutations
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn check_failure(&self, operation: &'static str, dn: &str) -> Result<(), DirectoryError> {
        let dn_key = key(dn);
        match self
            .failures
            .iter()
            .find(|(op, target, _)| *op == operation && *target == dn_key)
        {
            Some((_, _, rc)) => Err(failed(operation, dn, *rc)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DirectoryClient for InMemoryDirectory {
    async fn search(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
        _attrs: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        self.check_failure("search", base)?;
        let base_key = key(base);
        if !self.entries.contains_key(&base_key) {
            return Err(failed("search", base, LDAP_RC_NO_SUCH_OBJECT));
        }

        let filter = Filter::parse(filter).map_err(|reason| DirectoryError::Transport {
            operation: "search",
            dn: base.to_string(),
            reason,
        })?;

        let suffix = format!(",{base_key}");
        Ok(self
            .entries
            .iter()
            .filter(|(k, _)| match scope {
                Scope::Base => **k == base_key,
                Scope::Subtree => **k == base_key || k.ends_with(&suffix),
            })
            .filter(|(_, entry)| filter.matches(entry))
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    async fn add(&mut self, dn: &str, attrs: &AttributeSet) -> Result<(), DirectoryError> {
        self.check_failure("add", dn)?;
        if self.contains(dn) {
            return Err(failed("add", dn, LDAP_RC_ENTRY_ALREADY_EXISTS));
        }

        let entry = DirectoryEntry {
            dn: dn.to_string(),
            attrs: attrs.clone(),
        };
        if !schema_allows(&entry) {
            return Err(failed("add", dn, LDAP_RC_OBJECT_CLASS_VIOLATION));
        }

        self.entries.insert(key(dn), entry);
        self.mutations.push(format!("add {dn}"));
        Ok(())
    }

    async fn modify(&mut self, dn: &str, mods: &[Modification]) -> Result<(), DirectoryError> {
        self.check_failure("modify", dn)?;
        let mut entry = self
            .get(dn)
            .cloned()
            .ok_or_else(|| failed("modify", dn, LDAP_RC_NO_SUCH_OBJECT))?;

        for m in mods {
            apply(&mut entry, m).map_err(|rc| failed("modify", dn, rc))?;
        }
        if !schema_allows(&entry) {
            return Err(failed("modify", dn, LDAP_RC_OBJECT_CLASS_VIOLATION));
        }

        self.entries.insert(key(dn), entry);
        self.mutations.push(format!("modify {dn}"));
        Ok(())
    }

    async fn delete(&mut self, dn: &str) -> Result<(), DirectoryError> {
        self.check_failure("delete", dn)?;
        if self.entries.remove(&key(dn)).is_none() {
            return Err(failed("delete", dn, LDAP_RC_NO_SUCH_OBJECT));
        }
        self.mutations.push(format!("delete {dn}"));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DirectoryError> {
        self.closed = true;
        Ok(())
    }
}

fn key(dn: &str) -> String {
    dn.to_ascii_lowercase()
}

fn failed(operation: &'static str, dn: &str, rc: u32) -> DirectoryError {
    DirectoryError::OperationFailed {
        operation,
        dn: dn.to_string(),
        rc,
        text: format!("in-memory directory returned {rc}"),
    }
}

fn attr_slot<'a>(entry: &'a mut DirectoryEntry, attr: &str) -> Option<&'a mut Vec<String>> {
    entry
        .attrs
        .iter_mut()
        .find(|(name, _)| name.eq_ignore_ascii_case(attr))
        .map(|(_, values)| values)
}

fn remove_attr(entry: &mut DirectoryEntry, attr: &str) -> bool {
    let name = entry
        .attrs
        .keys()
        .find(|name| name.eq_ignore_ascii_case(attr))
        .cloned();
    name.is_some_and(|name| entry.attrs.remove(&name).is_some())
}

fn apply(entry: &mut DirectoryEntry, modification: &Modification) -> Result<(), u32> {
    match modification {
        Modification::Add(attr, values) => {
            let name = entry
                .attrs
                .keys()
                .find(|name| name.eq_ignore_ascii_case(attr))
                .cloned()
                .unwrap_or_else(|| attr.clone());
            let slot = entry.attrs.entry(name).or_default();
            for value in values {
                if slot.iter().any(|v| v.eq_ignore_ascii_case(value)) {
                    return Err(LDAP_RC_ATTRIBUTE_OR_VALUE_EXISTS);
                }
                slot.push(value.clone());
            }
        }
        Modification::Delete(attr, values) if values.is_empty() => {
            if !remove_attr(entry, attr) {
                return Err(LDAP_RC_NO_SUCH_ATTRIBUTE);
            }
        }
        Modification::Delete(attr, values) => {
            let slot = attr_slot(entry, attr).ok_or(LDAP_RC_NO_SUCH_ATTRIBUTE)?;
            for value in values {
                let pos = slot
                    .iter()
                    .position(|v| v.eq_ignore_ascii_case(value))
                    .ok_or(LDAP_RC_NO_SUCH_ATTRIBUTE)?;
                slot.remove(pos);
            }
            if slot.is_empty() {
                remove_attr(entry, attr);
            }
        }
        Modification::Replace(attr, values) => {
            remove_attr(entry, attr);
            if !values.is_empty() {
                entry.attrs.insert(attr.clone(), values.clone());
            }
        }
    }
    Ok(())
}

fn has_class(entry: &DirectoryEntry, class: &str) -> bool {
    entry
        .values("objectClass")
        .iter()
        .any(|c| c.eq_ignore_ascii_case(class))
}

/// Membership attributes must be permitted by the object class, and the two
/// DN-based group classes must keep at least one member.
fn schema_allows(entry: &DirectoryEntry) -> bool {
    MEMBERSHIP_RULES.iter().all(|(attr, class)| {
        let present = !entry.values(attr).is_empty();
        let permitted = has_class(entry, class);
        let required = permitted && *attr != "memberUid";
        (!present || permitted) && (!required || present)
    })
}

/// Parsed search filter.
#[derive(Debug, PartialEq, Eq)]
enum Filter {
    Present(String),
    Equal(String, String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    fn parse(input: &str) -> Result<Self, String> {
        let (filter, rest) = Self::parse_one(input.trim())?;
        if rest.is_empty() {
            Ok(filter)
        } else {
            Err(format!("trailing input in filter: {rest}"))
        }
    }

    fn parse_one(input: &str) -> Result<(Self, &str), String> {
        let body = input
            .strip_prefix('(')
            .ok_or_else(|| format!("expected '(' in filter: {input}"))?;

        if let Some(rest) = body.strip_prefix('&') {
            let (filters, rest) = Self::parse_list(rest)?;
            return Ok((Self::And(filters), rest));
        }
        if let Some(rest) = body.strip_prefix('|') {
            let (filters, rest) = Self::parse_list(rest)?;
            return Ok((Self::Or(filters), rest));
        }
        if let Some(rest) = body.strip_prefix('!') {
            let (inner, rest) = Self::parse_one(rest)?;
            let rest = rest
                .strip_prefix(')')
                .ok_or_else(|| "unterminated '!' filter".to_string())?;
            return Ok((Self::Not(Box::new(inner)), rest));
        }

        let end = body
            .find(')')
            .ok_or_else(|| format!("unterminated filter item: {input}"))?;
        let (item, rest) = (&body[..end], &body[end + 1..]);
        let (attr, value) = item
            .split_once('=')
            .ok_or_else(|| format!("filter item without '=': {item}"))?;

        let filter = if value == "*" {
            Self::Present(attr.to_string())
        } else {
            Self::Equal(attr.to_string(), unescape(value)?)
        };
        Ok((filter, rest))
    }

    fn parse_list(mut input: &str) -> Result<(Vec<Self>, &str), String> {
        let mut filters = Vec::new();
        loop {
            if let Some(rest) = input.strip_prefix(')') {
                return Ok((filters, rest));
            }
            let (filter, rest) = Self::parse_one(input)?;
            filters.push(filter);
            input = rest;
        }
    }

    fn matches(&self, entry: &DirectoryEntry) -> bool {
        match self {
            Self::Present(attr) => !entry.values(attr).is_empty(),
            Self::Equal(attr, value) => entry
                .values(attr)
                .iter()
                .any(|v| v.eq_ignore_ascii_case(value)),
            Self::And(filters) => filters.iter().all(|f| f.matches(entry)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(entry)),
            Self::Not(filter) => !filter.matches(entry),
        }
    }
}

/// Undo RFC 4515 `\XX` escapes.
fn unescape(value: &str) -> Result<String, String> {
    let mut bytes = Vec::with_capacity(value.len());
    let raw = value.as_bytes();
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\\' {
            let hex = value
                .get(i + 1..i + 3)
                .ok_or_else(|| format!("truncated escape in filter value: {value}"))?;
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| format!("invalid escape in filter value: {value}"))?;
            bytes.push(byte);
            i += 3;
        } else {
            bytes.push(raw[i]);
            i += 1;
        }
    }
    String::from_utf8(bytes).map_err(|e| e.to_string())
}

#[cfg(test)]
#[path = "testing_tests.rs"]
mod testing_tests;
