// ABOUTME: Managed-platform API boundary and its REST implementation.
// ABOUTME: Trait for substitutability in tests; reqwest client in production.

use super::resource::ContainerAppResource;
use crate::config::Environment;
use crate::provider::error::{
    MissingCredentialSnafu, PlatformRejectedSnafu, PlatformRequestSnafu, ProviderError,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

/// Lifecycle state the platform reports for a submitted resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisioningState {
    InProgress,
    Succeeded,
    Failed,
    Canceled,
}

impl ProvisioningState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, ProvisioningState::InProgress)
    }
}

/// Snapshot of one platform resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    pub name: String,
    pub provisioning_state: ProvisioningState,
    #[serde(default)]
    pub running_status: Option<String>,
    #[serde(default)]
    pub fqdn: Option<String>,
}

/// The platform's declarative resource API, reduced to what the provider
/// needs. Production talks REST; tests substitute a fake.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn put_app(&self, resource: &ContainerAppResource)
    -> Result<ResourceStatus, ProviderError>;

    async fn get_app(&self, name: &str) -> Result<Option<ResourceStatus>, ProviderError>;

    async fn delete_app(&self, name: &str) -> Result<(), ProviderError>;

    async fn list_apps(&self) -> Result<Vec<String>, ProviderError>;

    async fn fetch_logs(&self, name: &str, lines: usize) -> Result<String, ProviderError>;
}

/// REST client against the platform's resource API.
pub struct HttpPlatformClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

pub const PLATFORM_URL_VAR: &str = "CARAVEL_PLATFORM_URL";
pub const PLATFORM_TOKEN_VAR: &str = "CARAVEL_PLATFORM_TOKEN";

impl HttpPlatformClient {
    /// Build a client from process-environment credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::MissingCredential`] when either variable is
    /// unset.
    pub fn from_env(environment: Environment) -> Result<Self, ProviderError> {
        let base_url = std::env::var(PLATFORM_URL_VAR).map_err(|_| {
            MissingCredentialSnafu {
                variable: PLATFORM_URL_VAR.to_string(),
            }
            .build()
        })?;
        let token = std::env::var(PLATFORM_TOKEN_VAR).map_err(|_| {
            MissingCredentialSnafu {
                variable: PLATFORM_TOKEN_VAR.to_string(),
            }
            .build()
        })?;

        tracing::debug!(%environment, base_url = %base_url, "platform client configured");
        Ok(Self::new(&base_url, &token))
    }

    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn reject(resource: &str, response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        PlatformRejectedSnafu {
            status,
            resource: resource.to_string(),
            message,
        }
        .build()
    }
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    async fn put_app(
        &self,
        resource: &ContainerAppResource,
    ) -> Result<ResourceStatus, ProviderError> {
        let response = self
            .http
            .put(self.url(&format!("/apps/{}", resource.name)))
            .bearer_auth(&self.token)
            .json(resource)
            .send()
            .await
            .context(PlatformRequestSnafu)?;

        if !response.status().is_success() {
            return Err(Self::reject(&resource.name, response).await);
        }

        response.json().await.context(PlatformRequestSnafu)
    }

    async fn get_app(&self, name: &str) -> Result<Option<ResourceStatus>, ProviderError> {
        let response = self
            .http
            .get(self.url(&format!("/apps/{name}")))
            .bearer_auth(&self.token)
            .send()
            .await
            .context(PlatformRequestSnafu)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::reject(name, response).await);
        }

        response.json().await.map(Some).context(PlatformRequestSnafu)
    }

    async fn delete_app(&self, name: &str) -> Result<(), ProviderError> {
        let response = self
            .http
            .delete(self.url(&format!("/apps/{name}")))
            .bearer_auth(&self.token)
            .send()
            .await
            .context(PlatformRequestSnafu)?;

        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(Self::reject(name, response).await);
        }
        Ok(())
    }

    async fn list_apps(&self) -> Result<Vec<String>, ProviderError> {
        let response = self
            .http
            .get(self.url("/apps"))
            .bearer_auth(&self.token)
            .send()
            .await
            .context(PlatformRequestSnafu)?;

        if !response.status().is_success() {
            return Err(Self::reject("apps", response).await);
        }

        let statuses: Vec<ResourceStatus> =
            response.json().await.context(PlatformRequestSnafu)?;
        Ok(statuses.into_iter().map(|s| s.name).collect())
    }

    async fn fetch_logs(&self, name: &str, lines: usize) -> Result<String, ProviderError> {
        let response = self
            .http
            .get(self.url(&format!("/apps/{name}/logs")))
            .query(&[("lines", lines)])
            .bearer_auth(&self.token)
            .send()
            .await
            .context(PlatformRequestSnafu)?;

        if !response.status().is_success() {
            return Err(Self::reject(name, response).await);
        }

        response.text().await.context(PlatformRequestSnafu)
    }
}
