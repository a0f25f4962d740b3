/// Provider credential validation
///
/// Each supported provider expects a fixed set of credential keys. Missing
/// keys are reported together, in schema order.

use crate::error::{ApiError, ApiResult};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const SUPPORTED_PROVIDERS: &str = "{aws, azure, openstack}";

const AWS_KEYS: &[&str] = &["access_key", "secret_key"];
const AZURE_KEYS: &[&str] = &["subscription_id", "client_id", "secret", "tenant"];
const OPENSTACK_KEYS: &[&str] = &[
    "username",
    "password",
    "auth_url",
    "project_name",
    "project_domain_name",
    "user_domain_name",
];

/// Validated connection settings for one provider
#[derive(Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    Aws {
        access_key: String,
        secret_key: String,
    },
    Azure {
        subscription_id: String,
        client_id: String,
        secret: String,
        tenant: String,
    },
    OpenStack {
        username: String,
        password: String,
        auth_url: String,
        project_name: String,
        project_domain_name: String,
        user_domain_name: String,
    },
}

// Secrets stay out of logs.
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider_name())
            .finish_non_exhaustive()
    }
}

fn credential_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Pull `keys` out of `credentials`, failing with every missing key at once
fn extract(credentials: &Map<String, Value>, keys: &[&str]) -> ApiResult<Vec<String>> {
    let mut values = Vec::with_capacity(keys.len());
    let mut missing = Vec::new();

    for key in keys {
        match credentials.get(*key).and_then(credential_value) {
            Some(value) => values.push(value),
            None => missing.push(format!("'{}'", key)),
        }
    }

    if !missing.is_empty() {
        return Err(ApiError::MissingParameter(format!(
            "The following required key(s) are missing from the provided credentials object: [{}]",
            missing.join(", ")
        )));
    }

    Ok(values)
}

impl ProviderConfig {
    pub fn from_credentials(provider: &str, credentials: &Map<String, Value>) -> ApiResult<Self> {
        match provider {
            "aws" => {
                let mut v = extract(credentials, AWS_KEYS)?.into_iter();
                Ok(ProviderConfig::Aws {
                    access_key: v.next().unwrap_or_default(),
                    secret_key: v.next().unwrap_or_default(),
                })
            }
            "azure" => {
                let mut v = extract(credentials, AZURE_KEYS)?.into_iter();
                Ok(ProviderConfig::Azure {
                    subscription_id: v.next().unwrap_or_default(),
                    client_id: v.next().unwrap_or_default(),
                    secret: v.next().unwrap_or_default(),
                    tenant: v.next().unwrap_or_default(),
                })
            }
            "openstack" => {
                let mut v = extract(credentials, OPENSTACK_KEYS)?.into_iter();
                Ok(ProviderConfig::OpenStack {
                    username: v.next().unwrap_or_default(),
                    password: v.next().unwrap_or_default(),
                    auth_url: v.next().unwrap_or_default(),
                    project_name: v.next().unwrap_or_default(),
                    project_domain_name: v.next().unwrap_or_default(),
                    user_domain_name: v.next().unwrap_or_default(),
                })
            }
            _ => Err(ApiError::InvalidParameter(format!(
                "Unrecognized provider '{}'; the following are the supported providers: {}.",
                provider, SUPPORTED_PROVIDERS
            ))),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        match self {
            ProviderConfig::Aws { .. } => "aws",
            ProviderConfig::Azure { .. } => "azure",
            ProviderConfig::OpenStack { .. } => "openstack",
        }
    }

    /// Settings in the key layout backend SDKs expect
    pub fn backend_settings(&self) -> BTreeMap<&'static str, String> {
        let mut settings = BTreeMap::new();
        match self {
            ProviderConfig::Aws { access_key, secret_key } => {
                settings.insert("aws_access_key", access_key.clone());
                settings.insert("aws_secret_key", secret_key.clone());
            }
            ProviderConfig::Azure { subscription_id, client_id, secret, tenant } => {
                settings.insert("azure_subscription_id", subscription_id.clone());
                settings.insert("azure_client_id", client_id.clone());
                settings.insert("azure_secret", secret.clone());
                settings.insert("azure_tenant", tenant.clone());
            }
            ProviderConfig::OpenStack {
                username,
                password,
                auth_url,
                project_name,
                project_domain_name,
                user_domain_name,
            } => {
                settings.insert("os_username", username.clone());
                settings.insert("os_password", password.clone());
                settings.insert("os_auth_url", auth_url.clone());
                settings.insert("os_project_name", project_name.clone());
                settings.insert("os_project_domain_name", project_domain_name.clone());
                settings.insert("os_user_domain_name", user_domain_name.clone());
            }
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn creds(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn aws_credentials_are_accepted() {
        let config = ProviderConfig::from_credentials(
            "aws",
            &creds(json!({"access_key": "AK", "secret_key": "SK"})),
        )
        .unwrap();

        assert_eq!(config.provider_name(), "aws");
        assert_eq!(config.backend_settings()["aws_access_key"], "AK");
        assert!(!format!("{:?}", config).contains("SK"));
    }

    #[test]
    fn all_missing_keys_are_reported_in_schema_order() {
        let err = ProviderConfig::from_credentials(
            "azure",
            &creds(json!({"client_id": "c", "tenant": null})),
        )
        .unwrap_err();

        assert!(matches!(err, ApiError::MissingParameter(_)));
        assert_eq!(
            err.to_string(),
            "The following required key(s) are missing from the provided credentials object: \
             ['subscription_id', 'secret', 'tenant']"
        );
    }

    #[test]
    fn openstack_reports_only_absent_keys() {
        let err = ProviderConfig::from_credentials(
            "openstack",
            &creds(json!({
                "username": "u",
                "password": "p",
                "auth_url": "http://keystone",
                "project_name": "proj",
            })),
        )
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "The following required key(s) are missing from the provided credentials object: \
             ['project_domain_name', 'user_domain_name']"
        );
    }

    #[test]
    fn scalar_values_are_stringified() {
        let config = ProviderConfig::from_credentials(
            "aws",
            &creds(json!({"access_key": 1234, "secret_key": true})),
        )
        .unwrap();

        assert_eq!(
            config,
            ProviderConfig::Aws {
                access_key: "1234".to_string(),
                secret_key: "true".to_string(),
            }
        );
    }

    #[test]
    fn unknown_provider_is_invalid() {
        let err = ProviderConfig::from_credentials("gcp", &Map::new()).unwrap_err();

        assert!(matches!(err, ApiError::InvalidParameter(_)));
        assert_eq!(
            err.to_string(),
            "Unrecognized provider 'gcp'; the following are the supported providers: \
             {aws, azure, openstack}."
        );
    }
    #[test]
    fn provider_names_are_case_sensitive() {
        let keys = creds(json!({"access_key": "AK", "secret_key": "SK"}));

        for provider in ["AWS", "Azure", "OpenStack"] {
            let err = ProviderConfig::from_credentials(provider, &keys).unwrap_err();
            assert!(matches!(err, ApiError::InvalidParameter(_)), "{provider}");
            assert!(err
                .to_string()
                .starts_with(&format!("Unrecognized provider '{}';", provider)));
        }
    }
}
