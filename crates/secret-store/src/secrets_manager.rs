//! AWS Secrets Manager backend
//!
//! One secret per session, named by the session identifier. The client is
//! built from static credentials; `endpoint_url` points it at a local
//! emulator (e.g. LocalStack) and is only set in development mode. SDK
//! retries are disabled: a failed call fails the request that made it.

use aws_sdk_secretsmanager::Client;
use aws_sdk_secretsmanager::config::retry::RetryConfig;
use aws_sdk_secretsmanager::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use common::Secret;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::record::SessionRecord;
use crate::{SecretStore, StoreFuture};

/// Connection settings for Secrets Manager.
#[derive(Debug, Clone)]
pub struct SecretsManagerSettings {
    pub region: String,
    pub access_key_id: Secret<String>,
    pub secret_access_key: Secret<String>,
    pub endpoint_url: Option<String>,
}

/// Secret store backed by AWS Secrets Manager.
#[derive(Debug, Clone)]
pub struct SecretsManagerStore {
    client: Client,
}

impl SecretsManagerStore {
    pub fn new(settings: &SecretsManagerSettings) -> Self {
        let credentials = Credentials::new(
            settings.access_key_id.expose(),
            settings.secret_access_key.expose(),
            None,
            None,
            "github-relay",
        );

        let mut builder = aws_sdk_secretsmanager::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .retry_config(RetryConfig::disabled())
            .credentials_provider(credentials);
        if let Some(endpoint) = &settings.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(builder.build()),
        }
    }

    #[cfg(test)]
    fn region(&self) -> Option<String> {
        self.client.config().region().map(|r| r.to_string())
    }
}

impl SecretStore for SecretsManagerStore {
    fn backend(&self) -> &str {
        "secrets_manager"
    }

    fn create<'a>(&'a self, key: &'a str, record: &'a SessionRecord) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.client
                .create_secret()
                .name(key)
                .secret_string(record.encode())
                .send()
                .await
                .map_err(|e| {
                    warn!(error = %DisplayErrorContext(&e), "create_secret failed");
                    Error::Unavailable(format!(
                        "secret creation failed - {}",
                        DisplayErrorContext(&e)
                    ))
                })?;
            debug!(backend = "secrets_manager", "created record");
            Ok(())
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, SessionRecord> {
        Box::pin(async move {
            let output = self
                .client
                .get_secret_value()
                .secret_id(key)
                .send()
                .await
                .map_err(|e| {
                    let not_found = e
                        .as_service_error()
                        .is_some_and(|s| s.is_resource_not_found_exception());
                    if not_found {
                        Error::NotFound(key.to_owned())
                    } else {
                        Error::Unavailable(format!(
                            "secret fetch failed - {}",
                            DisplayErrorContext(&e)
                        ))
                    }
                })?;

            output
                .secret_string()
                .map(SessionRecord::decode)
                .ok_or_else(|| Error::NotFound(format!("{key} has no string value")))
        })
    }

    fn put<'a>(&'a self, key: &'a str, record: &'a SessionRecord) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.client
                .put_secret_value()
                .secret_id(key)
                .secret_string(record.encode())
                .send()
                .await
                .map_err(|e| {
                    let not_found = e
                        .as_service_error()
                        .is_some_and(|s| s.is_resource_not_found_exception());
                    if not_found {
                        Error::NotFound(key.to_owned())
                    } else {
                        Error::Unavailable(format!(
                            "secret update failed - {}",
                            DisplayErrorContext(&e)
                        ))
                    }
                })?;
            debug!(backend = "secrets_manager", "updated record");
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            match self
                .client
                .delete_secret()
                .secret_id(key)
                .force_delete_without_recovery(true)
                .send()
                .await
            {
                Ok(_) => Ok(()),
                Err(e)
                    if e.as_service_error()
                        .is_some_and(|s| s.is_resource_not_found_exception()) =>
                {
                    Ok(())
                }
                Err(e) => Err(Error::Unavailable(format!(
                    "secret deletion failed - {}",
                    DisplayErrorContext(&e)
                ))),
            }
        })
    }
}
