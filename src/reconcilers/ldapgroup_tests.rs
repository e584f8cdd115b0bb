// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `ldapgroup.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::{GroupType, LDAPServerRef, SecretKeyRef};
    use crate::directory::testing::InMemoryDirectory;
    use crate::status_reasons::{CONDITION_STATUS_FALSE, CONDITION_STATUS_TRUE, REASON_READY};
    use std::collections::BTreeMap;

    const BASE_DN: &str = "dc=example,dc=com";
    const GROUP_DN: &str = "cn=developers,ou=groups,dc=example,dc=com";
    const USER_DN: &str = "uid=jdoe,ou=users,dc=example,dc=com";

    fn server_spec() -> LDAPServerSpec {
        LDAPServerSpec {
            host: "ldap.example.com".to_string(),
            port: None,
            bind_dn: "cn=admin,dc=example,dc=com".to_string(),
            bind_password_secret: SecretKeyRef {
                name: "ldap-admin".to_string(),
                key: "password".to_string(),
            },
            base_dn: BASE_DN.to_string(),
            tls: None,
            connection_timeout: None,
            health_check_interval: None,
        }
    }

    fn group_spec(group_type: GroupType, description: Option<&str>) -> LDAPGroupSpec {
        LDAPGroupSpec {
            ldap_server_ref: LDAPServerRef {
                name: "corp-ldap".to_string(),
                namespace: None,
            },
            group_name: "developers".to_string(),
            description: description.map(ToString::to_string),
            group_type,
            organizational_unit: "groups".to_string(),
            gid_number: (group_type == GroupType::Posix).then_some(5000),
            additional_attributes: BTreeMap::new(),
        }
    }

    fn directory() -> InMemoryDirectory {
        let mut dir = InMemoryDirectory::new();
        dir.insert(BASE_DN, &[("objectClass", &["domain"])]);
        dir.insert("ou=groups,dc=example,dc=com", &[("ou", &["groups"])]);
        dir
    }

    #[tokio::test]
    async fn test_new_group_has_no_members() {
        let mut dir = directory();

        let pass = apply_group_pass(
            &mut dir,
            &server_spec(),
            &group_spec(GroupType::GroupOfNames, Some("Developers")),
        )
        .await
        .unwrap();

        assert_eq!(pass.dn, GROUP_DN);
        assert_eq!(pass.outcome, EntryOutcome::Created);
        assert!(pass.members.is_empty());
        assert_eq!(dir.values(GROUP_DN, "member"), vec!["cn=placeholder"]);
    }

    #[tokio::test]
    async fn test_existing_members_are_read_back() {
        let mut dir = directory();
        dir.insert(
            GROUP_DN,
            &[
                ("objectClass", &["groupOfUniqueNames"]),
                ("cn", &["developers"]),
                ("uniqueMember", &["cn=placeholder", USER_DN]),
            ],
        );

        let pass = apply_group_pass(
            &mut dir,
            &server_spec(),
            &group_spec(GroupType::GroupOfUniqueNames, Some("Developers")),
        )
        .await
        .unwrap();

        assert_eq!(pass.outcome, EntryOutcome::Updated);
        assert_eq!(pass.members, vec![USER_DN]);
        assert_eq!(dir.values(GROUP_DN, "description"), vec!["Developers"]);
    }

    #[tokio::test]
    async fn test_posix_group_pass_is_idempotent() {
        let mut dir = directory();
        let spec = group_spec(GroupType::Posix, None);

        let first = apply_group_pass(&mut dir, &server_spec(), &spec).await.unwrap();
        let snapshot = dir.snapshot();
        let second = apply_group_pass(&mut dir, &server_spec(), &spec).await.unwrap();

        assert_eq!(first.members, second.members);
        assert_eq!(dir.snapshot(), snapshot);
        assert_eq!(dir.values(GROUP_DN, "gidNumber"), vec!["5000"]);
    }

    #[tokio::test]
    async fn test_entry_failure_fails_pass() {
        let mut dir = directory();
        dir.fail_on("add", GROUP_DN, 50);

        let err = apply_group_pass(&mut dir, &server_spec(), &group_spec(GroupType::Posix, None))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("Failed to reconcile group entry"));
    }

    #[test]
    fn test_synced_status() {
        let mut status = LDAPGroupStatus::default();
        let outcome = GroupOutcome::Synced(GroupPass {
            dn: GROUP_DN.to_string(),
            outcome: EntryOutcome::Updated,
            members: vec![USER_DN.to_string()],
        });

        apply_group_outcome(&mut status, &outcome, Some(4));

        assert_eq!(status.phase, GroupPhase::Ready);
        assert_eq!(status.dn.as_deref(), Some(GROUP_DN));
        assert_eq!(status.member_count, 1);
        assert_eq!(status.message.as_deref(), Some("Group synchronized with 1 members"));
        assert_eq!(status.observed_generation, Some(4));
        assert_eq!(status.conditions[0].status, CONDITION_STATUS_TRUE);
        assert_eq!(status.conditions[0].reason.as_deref(), Some(REASON_READY));
    }

    #[test]
    fn test_pending_status() {
        let mut status = LDAPGroupStatus::default();
        let outcome = GroupOutcome::Pending("LDAPServer identity/corp-ldap is not connected".to_string());

        apply_group_outcome(&mut status, &outcome, Some(1));

        assert_eq!(status.phase, GroupPhase::Pending);
        assert_eq!(status.member_count, 0);
        assert_eq!(status.conditions[0].status, CONDITION_STATUS_FALSE);
        assert_eq!(
            requeue_for(outcome.phase() == GroupPhase::Ready),
            Action::requeue(Duration::from_secs(300))
        );
    }
}
