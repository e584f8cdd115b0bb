// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for DN construction and escaping

#[cfg(test)]
mod tests {
    use super::super::*;

    // ========================================================================
    // DN construction
    // ========================================================================

    #[test]
    fn test_build_user_dn_with_ou() {
        assert_eq!(
            build_user_dn("jdoe", "employees", "dc=example,dc=com"),
            "uid=jdoe,ou=employees,dc=example,dc=com"
        );
    }

    #[test]
    fn test_build_user_dn_without_ou() {
        assert_eq!(
            build_user_dn("jdoe", "", "dc=example,dc=com"),
            "uid=jdoe,dc=example,dc=com",
            "Empty OU should omit the ou= segment"
        );
    }

    #[test]
    fn test_build_group_dn() {
        assert_eq!(
            build_group_dn("developers", "groups", "dc=example,dc=com"),
            "cn=developers,ou=groups,dc=example,dc=com"
        );
        assert_eq!(
            build_group_dn("developers", "  ", "dc=example,dc=com"),
            "cn=developers,dc=example,dc=com",
            "Whitespace-only OU counts as empty"
        );
    }

    #[test]
    fn test_build_dn_escapes_rdn_value() {
        assert_eq!(
            build_group_dn("R&D, Europe", "groups", "dc=example,dc=com"),
            "cn=R&D\\, Europe,ou=groups,dc=example,dc=com"
        );
    }

    #[test]
    fn test_ou_dn() {
        assert_eq!(ou_dn("groups", "dc=example,dc=com"), "ou=groups,dc=example,dc=com");
        assert_eq!(ou_dn("", "dc=example,dc=com"), "dc=example,dc=com");
    }

    #[test]
    fn test_child_dn_with_empty_parent() {
        assert_eq!(child_dn("cn", "admins", ""), "cn=admins");
    }

    // ========================================================================
    // RFC 4514 escaping
    // ========================================================================

    #[test]
    fn test_escape_dn_special_characters() {
        assert_eq!(escape_dn_value("a,b"), "a\\,b");
        assert_eq!(escape_dn_value("a+b"), "a\\+b");
        assert_eq!(escape_dn_value("a\"b"), "a\\\"b");
        assert_eq!(escape_dn_value("a\\b"), "a\\\\b");
        assert_eq!(escape_dn_value("<a>"), "\\<a\\>");
        assert_eq!(escape_dn_value("a;b=c"), "a\\;b\\=c");
        assert_eq!(escape_dn_value("a\0b"), "a\\00b");
    }

    #[test]
    fn test_escape_dn_leading_and_trailing() {
        assert_eq!(escape_dn_value(" admin "), "\\20admin\\20");
        assert_eq!(escape_dn_value("#admin"), "\\23admin");
        assert_eq!(escape_dn_value("ad#min"), "ad#min");
        assert_eq!(escape_dn_value("a b"), "a b", "Inner spaces are kept");
    }

    #[test]
    fn test_escape_dn_multibyte_trailing_space() {
        assert_eq!(escape_dn_value("jörg "), "jörg\\20");
    }

    #[test]
    fn test_escape_dn_plain_value_unchanged() {
        assert_eq!(escape_dn_value("jdoe"), "jdoe");
        assert_eq!(escape_dn_value(""), "");
    }

    // ========================================================================
    // RFC 4515 escaping
    // ========================================================================

    #[test]
    fn test_escape_filter_value() {
        assert_eq!(escape_filter_value("*"), "\\2a");
        assert_eq!(escape_filter_value("(admin)"), "\\28admin\\29");
        assert_eq!(escape_filter_value("a\\b"), "a\\5cb");
        assert_eq!(escape_filter_value("a\0"), "a\\00");
        assert_eq!(escape_filter_value("jdoe"), "jdoe");
    }

    #[test]
    fn test_membership_filter() {
        assert_eq!(
            membership_filter("uid=jdoe,ou=users,dc=example,dc=com", "jdoe"),
            "(|(member=uid=jdoe,ou=users,dc=example,dc=com)\
             (uniqueMember=uid=jdoe,ou=users,dc=example,dc=com)\
             (memberUid=jdoe))"
        );
    }

    #[test]
    fn test_membership_filter_escapes_injection() {
        let filter = membership_filter("uid=x,dc=example", "*)(uid=*");
        assert!(filter.ends_with("(memberUid=\\2a\\29\\28uid=\\2a))"));
    }
}
