// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `secrets.rs`

#[cfg(test)]
mod tests {
    use crate::secrets::{extract_key, SecretError};
    use k8s_openapi::api::core::v1::Secret;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    fn secret(data: &[(&str, &[u8])], string_data: &[(&str, &str)]) -> Secret {
        Secret {
            data: (!data.is_empty()).then(|| {
                data.iter()
                    .map(|(k, v)| ((*k).to_string(), ByteString(v.to_vec())))
                    .collect::<BTreeMap<_, _>>()
            }),
            string_data: (!string_data.is_empty()).then(|| {
                string_data
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect::<BTreeMap<_, _>>()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_key_from_data() {
        let s = secret(&[("password", b"s3cret")], &[]);
        assert_eq!(extract_key(&s, "password"), Some(b"s3cret".to_vec()));
    }

    #[test]
    fn test_extract_missing_key() {
        let s = secret(&[("username", b"admin")], &[]);
        assert_eq!(extract_key(&s, "password"), None);
        assert_eq!(extract_key(&Secret::default(), "password"), None);
    }

    #[test]
    fn test_extract_key_falls_back_to_string_data() {
        let s = secret(&[], &[("password", "from-string-data")]);
        assert_eq!(
            extract_key(&s, "password"),
            Some(b"from-string-data".to_vec())
        );
    }

    #[test]
    fn test_data_takes_precedence() {
        let s = secret(&[("password", b"binary")], &[("password", "text")]);
        assert_eq!(extract_key(&s, "password"), Some(b"binary".to_vec()));
    }

    #[test]
    fn test_error_messages() {
        let missing = SecretError::NotFound {
            namespace: "identity".to_string(),
            name: "ldap-admin".to_string(),
        };
        let missing_key = SecretError::KeyNotFound {
            namespace: "identity".to_string(),
            name: "ldap-admin".to_string(),
            key: "password".to_string(),
        };
        let bad_utf8 = SecretError::InvalidUtf8 {
            namespace: "identity".to_string(),
            name: "ldap-admin".to_string(),
            key: "password".to_string(),
        };

        assert_eq!(missing.to_string(), "Secret identity/ldap-admin not found");
        assert_eq!(
            missing_key.to_string(),
            "Key 'password' not found in Secret identity/ldap-admin"
        );
        assert_eq!(
            bad_utf8.to_string(),
            "Key 'password' in Secret identity/ldap-admin is not valid UTF-8"
        );
    }
}
