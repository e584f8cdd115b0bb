// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `connection.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::{LDAPServerSpec, LDAPServerStatus, SecretKeyRef};

    fn server(status: Option<ConnectionStatus>) -> LDAPServer {
        let mut server = LDAPServer::new(
            "corp-ldap",
            LDAPServerSpec {
                host: "ldap.example.com".to_string(),
                port: None,
                bind_dn: "cn=admin,dc=example,dc=com".to_string(),
                bind_password_secret: SecretKeyRef {
                    name: "ldap-admin".to_string(),
                    key: "password".to_string(),
                },
                base_dn: "dc=example,dc=com".to_string(),
                tls: None,
                connection_timeout: None,
                health_check_interval: None,
            },
        );
        server.metadata.namespace = Some("identity".to_string());
        server.status = status.map(|connection_status| LDAPServerStatus {
            connection_status,
            ..Default::default()
        });
        server
    }

    #[test]
    fn test_missing_server() {
        assert!(matches!(check_gate(None), ServerGate::Missing));
    }

    #[test]
    fn test_connected_server_is_ready() {
        match check_gate(Some(server(Some(ConnectionStatus::Connected)))) {
            ServerGate::Ready(s) => assert_eq!(s.spec.host, "ldap.example.com"),
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn test_unprobed_server_is_not_connected() {
        assert!(matches!(
            check_gate(Some(server(None))),
            ServerGate::NotConnected(ConnectionStatus::Unknown)
        ));
    }

    #[test]
    fn test_failed_probe_is_not_connected() {
        for status in [ConnectionStatus::Disconnected, ConnectionStatus::Error] {
            match check_gate(Some(server(Some(status)))) {
                ServerGate::NotConnected(s) => assert_eq!(s, status),
                other => panic!("expected NotConnected, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_server_key_defaults_namespace() {
        let local = LDAPServerRef {
            name: "corp-ldap".to_string(),
            namespace: None,
        };
        let shared = LDAPServerRef {
            name: "corp-ldap".to_string(),
            namespace: Some("shared".to_string()),
        };
        assert_eq!(server_key(&local, "identity"), "identity/corp-ldap");
        assert_eq!(server_key(&shared, "identity"), "shared/corp-ldap");
    }

    #[test]
    fn test_gate_messages() {
        assert_eq!(
            gate_message(&ServerGate::Missing, "identity/corp-ldap"),
            "LDAPServer identity/corp-ldap not found"
        );
        assert_eq!(
            gate_message(
                &ServerGate::NotConnected(ConnectionStatus::Disconnected),
                "identity/corp-ldap"
            ),
            "LDAPServer identity/corp-ldap is not connected (status: Disconnected)"
        );
    }
}
