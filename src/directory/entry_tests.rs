// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for attribute building

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::{GroupType, LDAPGroupSpec, LDAPServerRef, LDAPUserSpec};
    use crate::directory::Modification;
    use std::collections::BTreeMap;

    fn user_spec() -> LDAPUserSpec {
        LDAPUserSpec {
            ldap_server_ref: LDAPServerRef {
                name: "corp-ldap".to_string(),
                namespace: None,
            },
            username: "jdoe".to_string(),
            email: None,
            first_name: None,
            last_name: None,
            display_name: None,
            uid_number: None,
            gid_number: None,
            organizational_unit: "users".to_string(),
            home_directory: None,
            login_shell: None,
            enabled: true,
            groups: vec![],
            additional_attributes: BTreeMap::new(),
            password_secret: None,
        }
    }

    fn group_spec(group_type: GroupType) -> LDAPGroupSpec {
        LDAPGroupSpec {
            ldap_server_ref: LDAPServerRef {
                name: "corp-ldap".to_string(),
                namespace: None,
            },
            group_name: "developers".to_string(),
            description: None,
            group_type,
            organizational_unit: "groups".to_string(),
            gid_number: None,
            additional_attributes: BTreeMap::new(),
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    // ========================================================================
    // Derived user fields
    // ========================================================================

    #[test]
    fn test_common_name_prefers_display_name() {
        let mut spec = user_spec();
        spec.display_name = Some("Johnny D".to_string());
        spec.first_name = Some("John".to_string());
        spec.last_name = Some("Doe".to_string());
        assert_eq!(common_name(&spec), "Johnny D");
    }

    #[test]
    fn test_common_name_from_first_and_last() {
        let mut spec = user_spec();
        spec.first_name = Some("John".to_string());
        spec.last_name = Some("Doe".to_string());
        assert_eq!(common_name(&spec), "John Doe");

        spec.first_name = None;
        assert_eq!(common_name(&spec), "Doe");
    }

    #[test]
    fn test_common_name_falls_back_to_username() {
        let mut spec = user_spec();
        spec.display_name = Some("   ".to_string());
        assert_eq!(common_name(&spec), "jdoe", "Blank display name is ignored");
    }

    #[test]
    fn test_surname_defaults_to_username() {
        let mut spec = user_spec();
        assert_eq!(surname(&spec), "jdoe");
        spec.last_name = Some("Doe".to_string());
        assert_eq!(surname(&spec), "Doe");
    }

    #[test]
    fn test_home_directory_default() {
        let mut spec = user_spec();
        assert_eq!(home_directory(&spec), "/home/jdoe");
        spec.home_directory = Some("/srv/home/jdoe".to_string());
        assert_eq!(home_directory(&spec), "/srv/home/jdoe");
    }

    // ========================================================================
    // User attributes
    // ========================================================================

    #[test]
    fn test_minimal_user_attributes() {
        let attrs = user_attributes(&user_spec(), None);

        assert_eq!(attrs["objectClass"], strings(&["inetOrgPerson", "posixAccount"]));
        assert_eq!(attrs["uid"], strings(&["jdoe"]));
        assert_eq!(attrs["cn"], strings(&["jdoe"]));
        assert_eq!(attrs["sn"], strings(&["jdoe"]));
        assert_eq!(attrs["homeDirectory"], strings(&["/home/jdoe"]));
        assert!(!attrs.contains_key("mail"), "Unset optional fields are omitted");
        assert!(!attrs.contains_key("givenName"));
        assert!(!attrs.contains_key("uidNumber"));
        assert!(!attrs.contains_key("userPassword"));
    }

    #[test]
    fn test_full_user_attributes() {
        let mut spec = user_spec();
        spec.email = Some("jdoe@example.com".to_string());
        spec.first_name = Some("John".to_string());
        spec.last_name = Some("Doe".to_string());
        spec.uid_number = Some(10001);
        spec.gid_number = Some(10000);
        spec.login_shell = Some("/bin/bash".to_string());

        let attrs = user_attributes(&spec, Some("s3cret"));

        assert_eq!(attrs["cn"], strings(&["John Doe"]));
        assert_eq!(attrs["sn"], strings(&["Doe"]));
        assert_eq!(attrs["givenName"], strings(&["John"]));
        assert_eq!(attrs["mail"], strings(&["jdoe@example.com"]));
        assert_eq!(attrs["uidNumber"], strings(&["10001"]));
        assert_eq!(attrs["gidNumber"], strings(&["10000"]));
        assert_eq!(attrs["loginShell"], strings(&["/bin/bash"]));
        assert_eq!(attrs["userPassword"], strings(&["s3cret"]));
    }

    #[test]
    fn test_additional_attributes_never_override() {
        let mut spec = user_spec();
        spec.additional_attributes
            .insert("mobile".to_string(), strings(&["+15551234"]));
        spec.additional_attributes
            .insert("CN".to_string(), strings(&["Evil"]));
        spec.additional_attributes.insert("title".to_string(), vec![]);

        let attrs = user_attributes(&spec, None);

        assert_eq!(attrs["mobile"], strings(&["+15551234"]));
        assert_eq!(attrs["cn"], strings(&["jdoe"]));
        assert!(!attrs.contains_key("CN"), "Built attributes win over extras");
        assert!(!attrs.contains_key("title"), "Empty extras are skipped");
    }

    #[test]
    fn test_user_replacements_cover_mutable_fields_only() {
        let mut spec = user_spec();
        spec.email = Some("jdoe@example.com".to_string());
        spec.uid_number = Some(10001);

        let mods = user_replacements(&spec);
        let attrs: Vec<&str> = mods.iter().map(Modification::attribute).collect();

        assert_eq!(
            attrs,
            vec!["cn", "sn", "givenName", "displayName", "mail", "homeDirectory", "loginShell"]
        );
        assert!(mods.iter().all(|m| matches!(m, Modification::Replace(..))));
        assert!(
            mods.contains(&Modification::Replace("givenName".to_string(), vec![])),
            "Unset optional fields are cleared"
        );
        assert!(mods.contains(&Modification::Replace(
            "mail".to_string(),
            strings(&["jdoe@example.com"])
        )));
    }

    // ========================================================================
    // Group attributes
    // ========================================================================

    #[test]
    fn test_group_of_names_gets_placeholder_member() {
        let attrs = group_attributes(&group_spec(GroupType::GroupOfNames));

        assert_eq!(attrs["objectClass"], strings(&["groupOfNames"]));
        assert_eq!(attrs["cn"], strings(&["developers"]));
        assert_eq!(attrs["member"], strings(&["cn=placeholder"]));
        assert!(!attrs.contains_key("uniqueMember"));
        assert!(!attrs.contains_key("gidNumber"));
    }

    #[test]
    fn test_group_of_unique_names_gets_placeholder_unique_member() {
        let attrs = group_attributes(&group_spec(GroupType::GroupOfUniqueNames));

        assert_eq!(attrs["objectClass"], strings(&["groupOfUniqueNames"]));
        assert_eq!(attrs["uniqueMember"], strings(&["cn=placeholder"]));
        assert!(!attrs.contains_key("member"));
    }

    #[test]
    fn test_posix_group_attributes() {
        let mut spec = group_spec(GroupType::Posix);
        spec.gid_number = Some(5000);
        spec.description = Some("Engineering".to_string());

        let attrs = group_attributes(&spec);

        assert_eq!(attrs["objectClass"], strings(&["posixGroup"]));
        assert_eq!(attrs["gidNumber"], strings(&["5000"]));
        assert_eq!(attrs["description"], strings(&["Engineering"]));
        assert!(!attrs.contains_key("member"));
        assert!(!attrs.contains_key("memberUid"));
    }

    #[test]
    fn test_gid_number_ignored_for_non_posix_groups() {
        let mut spec = group_spec(GroupType::GroupOfNames);
        spec.gid_number = Some(5000);
        assert!(!group_attributes(&spec).contains_key("gidNumber"));
    }

    #[test]
    fn test_group_replacements_only_touch_description() {
        let mut spec = group_spec(GroupType::GroupOfNames);
        assert_eq!(
            group_replacements(&spec),
            vec![Modification::Replace("description".to_string(), vec![])]
        );

        spec.description = Some("Engineering".to_string());
        assert_eq!(
            group_replacements(&spec),
            vec![Modification::Replace(
                "description".to_string(),
                strings(&["Engineering"])
            )]
        );
    }
}
