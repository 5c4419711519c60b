//! Azure Resource Manager REST client

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::api::{
    ApiConnector, ApiError, ApiResult, BlobContainer, ContainerProperties, ManagementApi,
    NameAvailability, PendingOperation, PublicAccess, ResourceGroup, StorageAccount,
    StorageAccountCreate,
};
use crate::credential::{TokenCredential, credential_from_env};

/// Public cloud management endpoint
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

const RESOURCES_API_VERSION: &str = "2021-04-01";
const STORAGE_API_VERSION: &str = "2023-01-01";
const STORAGE_ACCOUNT_TYPE: &str = "Microsoft.Storage/storageAccounts";

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Body of an `Azure-AsyncOperation` status monitor
#[derive(Debug, Deserialize)]
struct OperationStatus {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<ErrorDetail>,
}

/// Management client bound to one subscription
pub struct ArmClient {
    http: reqwest::Client,
    endpoint: String,
    subscription_id: String,
    credential: Arc<dyn TokenCredential>,
}

impl ArmClient {
    pub fn new(subscription_id: impl Into<String>, credential: Arc<dyn TokenCredential>) -> Self {
        Self::with_http(reqwest::Client::new(), subscription_id, credential)
    }

    pub fn with_http(
        http: reqwest::Client,
        subscription_id: impl Into<String>,
        credential: Arc<dyn TokenCredential>,
    ) -> Self {
        Self {
            http,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            subscription_id: subscription_id.into(),
            credential,
        }
    }

    /// Use a different management endpoint (sovereign clouds, tests)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    fn token_scope(&self) -> String {
        format!("{}/.default", self.endpoint)
    }

    fn subscription_url(&self) -> String {
        format!("{}/subscriptions/{}", self.endpoint, self.subscription_id)
    }

    fn resource_group_url(&self, name: &str) -> String {
        format!("{}/resourcegroups/{}", self.subscription_url(), name)
    }

    fn storage_account_url(&self, resource_group: &str, name: &str) -> String {
        format!(
            "{}/resourceGroups/{}/providers/{}/{}",
            self.subscription_url(),
            resource_group,
            STORAGE_ACCOUNT_TYPE,
            name
        )
    }

    fn container_url(&self, resource_group: &str, account_name: &str, name: &str) -> String {
        format!(
            "{}/blobServices/default/containers/{}",
            self.storage_account_url(resource_group, account_name),
            name
        )
    }

    /// Build an authenticated request
    async fn request(
        &self,
        method: Method,
        url: &str,
        api_version: Option<&str>,
    ) -> ApiResult<RequestBuilder> {
        let token = self.credential.get_token(&self.token_scope()).await?;
        let mut request = self.http.request(method, url).bearer_auth(token.token);
        if let Some(version) = api_version {
            request = request.query(&[("api-version", version)]);
        }
        Ok(request)
    }

    /// Send a request, turning non-success responses into errors
    async fn send(&self, request: RequestBuilder) -> ApiResult<Response> {
        let response = request.send().await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        api_version: &str,
    ) -> ApiResult<T> {
        let request = self.request(Method::GET, url, Some(api_version)).await?;
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    /// Check an async operation monitor once
    ///
    /// Returns `Some(retry_after)` while the operation is still running.
    async fn check_status(&self, status_url: &str) -> ApiResult<Option<Option<Duration>>> {
        // Monitor URLs already carry their api-version
        let request = self.request(Method::GET, status_url, None).await?;
        let response = self.send(request).await?;
        let retry_after = parse_retry_after(response.headers());

        if response.status() == StatusCode::ACCEPTED {
            return Ok(Some(retry_after));
        }

        let body = response.text().await?;
        let status: OperationStatus = match serde_json::from_str(&body) {
            Ok(status) => status,
            // A Location monitor answers with the finished resource
            Err(_) => return Ok(None),
        };

        match status.status.as_deref() {
            None | Some("Succeeded") => Ok(None),
            Some(state @ ("Failed" | "Canceled")) => {
                let detail = status.error.unwrap_or(ErrorDetail {
                    code: None,
                    message: None,
                });
                let mut error = ApiError::new(detail.message.unwrap_or_else(|| {
                    format!("Storage account creation {}", state.to_lowercase())
                }));
                if let Some(code) = detail.code {
                    error = error.with_code(code);
                }
                Err(error)
            }
            Some(_) => Ok(Some(retry_after)),
        }
    }
}

#[async_trait]
impl ManagementApi for ArmClient {
    async fn resource_group_exists(&self, name: &str) -> ApiResult<bool> {
        let request = self
            .request(
                Method::HEAD,
                &self.resource_group_url(name),
                Some(RESOURCES_API_VERSION),
            )
            .await?;

        match self.send(request).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn get_resource_group(&self, name: &str) -> ApiResult<ResourceGroup> {
        self.get_json(&self.resource_group_url(name), RESOURCES_API_VERSION)
            .await
    }

    async fn create_or_update_resource_group(
        &self,
        name: &str,
        location: &str,
    ) -> ApiResult<ResourceGroup> {
        let request = self
            .request(
                Method::PUT,
                &self.resource_group_url(name),
                Some(RESOURCES_API_VERSION),
            )
            .await?
            .json(&json!({ "location": location }));

        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    async fn check_storage_account_name(&self, name: &str) -> ApiResult<NameAvailability> {
        let url = format!(
            "{}/providers/Microsoft.Storage/checkNameAvailability",
            self.subscription_url()
        );
        let request = self
            .request(Method::POST, &url, Some(STORAGE_API_VERSION))
            .await?
            .json(&json!({ "name": name, "type": STORAGE_ACCOUNT_TYPE }));

        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    async fn begin_create_storage_account(
        &self,
        resource_group: &str,
        name: &str,
        params: &StorageAccountCreate,
    ) -> ApiResult<PendingOperation> {
        let request = self
            .request(
                Method::PUT,
                &self.storage_account_url(resource_group, name),
                Some(STORAGE_API_VERSION),
            )
            .await?
            .json(params);

        let response = self.send(request).await?;
        let headers = response.headers();
        let status_url = header_str(headers, "azure-asyncoperation")
            .or_else(|| header_str(headers, "location"));

        Ok(PendingOperation {
            account_name: name.to_string(),
            resource_group: resource_group.to_string(),
            status_url,
            retry_after: parse_retry_after(headers),
        })
    }

    async fn poll_until_done(
        &self,
        operation: &PendingOperation,
        interval: Duration,
    ) -> ApiResult<StorageAccount> {
        // A suggested delay applies to the next wait only
        let mut suggested = operation.retry_after;

        loop {
            match &operation.status_url {
                Some(status_url) => match self.check_status(status_url).await? {
                    Some(retry_after) => suggested = retry_after,
                    None => break,
                },
                None => {
                    let account = self
                        .get_storage_account(&operation.resource_group, &operation.account_name)
                        .await?;
                    match account.properties.provisioning_state.as_deref() {
                        None | Some("Succeeded") => return Ok(account),
                        Some("Failed") => {
                            return Err(ApiError::new(format!(
                                "Storage account {} failed to provision",
                                account.name
                            ))
                            .with_code("ProvisioningFailed"));
                        }
                        Some(_) => {}
                    }
                }
            }

            log::debug!(
                "Waiting for storage account {} to be provisioned",
                operation.account_name
            );
            tokio::time::sleep(next_delay(suggested.take(), interval)).await;
        }

        self.get_storage_account(&operation.resource_group, &operation.account_name)
            .await
    }

    async fn get_storage_account(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ApiResult<StorageAccount> {
        self.get_json(
            &self.storage_account_url(resource_group, name),
            STORAGE_API_VERSION,
        )
        .await
    }

    async fn get_blob_container(
        &self,
        resource_group: &str,
        account_name: &str,
        name: &str,
    ) -> ApiResult<BlobContainer> {
        self.get_json(
            &self.container_url(resource_group, account_name, name),
            STORAGE_API_VERSION,
        )
        .await
    }

    async fn create_blob_container(
        &self,
        resource_group: &str,
        account_name: &str,
        name: &str,
        public_access: PublicAccess,
    ) -> ApiResult<BlobContainer> {
        let properties = ContainerProperties {
            public_access: Some(public_access),
        };
        let request = self
            .request(
                Method::PUT,
                &self.container_url(resource_group, account_name, name),
                Some(STORAGE_API_VERSION),
            )
            .await?
            .json(&json!({ "properties": properties }));

        let response = self.send(request).await?;
        Ok(response.json().await?)
    }
}

/// Connector creating [`ArmClient`]s with credentials from the environment
///
/// Credentials are resolved once per tenant so cached tokens are reused
/// across subscriptions.
pub struct ArmConnector {
    http: reqwest::Client,
    endpoint: String,
    credential: Option<Arc<dyn TokenCredential>>,
    by_tenant: Mutex<HashMap<String, Arc<dyn TokenCredential>>>,
}

impl ArmConnector {
    /// Resolve credentials from the environment on first use per tenant
    pub fn from_env() -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            credential: None,
            by_tenant: Mutex::new(HashMap::new()),
        }
    }

    /// Always authenticate with `credential`
    pub fn with_credential(credential: Arc<dyn TokenCredential>) -> Self {
        Self {
            credential: Some(credential),
            ..Self::from_env()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    fn credential_for(&self, tenant_id: &str) -> ApiResult<Arc<dyn TokenCredential>> {
        if let Some(credential) = &self.credential {
            return Ok(credential.clone());
        }

        let mut by_tenant = self
            .by_tenant
            .lock()
            .map_err(|_| ApiError::new("credential cache poisoned"))?;
        if let Some(credential) = by_tenant.get(tenant_id) {
            return Ok(credential.clone());
        }

        let credential = credential_from_env(tenant_id)?;
        by_tenant.insert(tenant_id.to_string(), credential.clone());
        Ok(credential)
    }
}

impl ApiConnector for ArmConnector {
    fn connect(
        &self,
        tenant_id: &str,
        subscription_id: &str,
    ) -> ApiResult<Arc<dyn ManagementApi>> {
        if subscription_id.is_empty() {
            return Err(ApiError::new("A subscription ID is required to reach the management API"));
        }

        let credential = self.credential_for(tenant_id)?;
        let client = ArmClient::with_http(self.http.clone(), subscription_id, credential)
            .with_endpoint(self.endpoint.clone());
        Ok(Arc::new(client))
    }
}

/// Convert an error response into an `ApiError`
async fn error_from_response(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    let error = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(parsed) => {
            let error = ApiError::new(
                parsed
                    .error
                    .message
                    .unwrap_or_else(|| format!("request failed with status {}", status)),
            );
            match parsed.error.code {
                Some(code) => error.with_code(code),
                None => error,
            }
        }
        // HEAD responses and some gateway errors carry no JSON body
        Err(_) if body.is_empty() => ApiError::new(format!("request failed with status {}", status)),
        Err(_) => ApiError::new(body),
    };

    error.with_status(status)
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Parse a `Retry-After` header given in seconds
/// Wait suggested by the service, or `interval` when it suggests none or zero
fn next_delay(suggested: Option<Duration>, interval: Duration) -> Duration {
    match suggested {
        Some(delay) if !delay.is_zero() => delay,
        _ => interval,
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::StaticTokenCredential;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SUB: &str = "00000000-0000-0000-0000-000000000001";

    fn client(server: &MockServer) -> ArmClient {
        ArmClient::new(SUB, Arc::new(StaticTokenCredential::new("test-token")))
            .with_endpoint(server.uri())
    }

    fn rg_path(name: &str) -> String {
        format!("/subscriptions/{}/resourcegroups/{}", SUB, name)
    }

    fn account_path(rg: &str, name: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Storage/storageAccounts/{}",
            SUB, rg, name
        )
    }

    #[tokio::test]
    async fn test_resource_group_exists() {
        let server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path(rg_path("rg1")))
            .and(query_param("api-version", RESOURCES_API_VERSION))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path(rg_path("missing")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path(rg_path("forbidden")))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = client(&server);
        assert!(client.resource_group_exists("rg1").await.unwrap());
        assert!(!client.resource_group_exists("missing").await.unwrap());

        let err = client.resource_group_exists("forbidden").await.unwrap_err();
        assert_eq!(err.status, Some(403));
    }

    #[tokio::test]
    async fn test_create_or_update_resource_group() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(rg_path("rg1")))
            .and(body_json(json!({"location": "North Europe"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": format!("/subscriptions/{}/resourceGroups/rg1", SUB),
                "name": "rg1",
                "location": "northeurope",
                "properties": {"provisioningState": "Succeeded"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let group = client(&server)
            .create_or_update_resource_group("rg1", "North Europe")
            .await
            .unwrap();
        assert_eq!(group.name, "rg1");
        assert_eq!(group.location, "northeurope");
    }

    #[tokio::test]
    async fn test_get_resource_group_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(rg_path("rg1")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {
                    "code": "ResourceGroupNotFound",
                    "message": "Resource group 'rg1' could not be found."
                }
            })))
            .mount(&server)
            .await;

        let err = client(&server).get_resource_group("rg1").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.code.as_deref(), Some("ResourceGroupNotFound"));
        assert_eq!(err.message, "Resource group 'rg1' could not be found.");
    }

    #[tokio::test]
    async fn test_check_storage_account_name() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!(
                "/subscriptions/{}/providers/Microsoft.Storage/checkNameAvailability",
                SUB
            )))
            .and(query_param("api-version", STORAGE_API_VERSION))
            .and(body_json(json!({
                "name": "sa1",
                "type": "Microsoft.Storage/storageAccounts"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"nameAvailable": true})),
            )
            .mount(&server)
            .await;

        let availability = client(&server)
            .check_storage_account_name("sa1")
            .await
            .unwrap();
        assert!(availability.name_available);
    }

    #[tokio::test]
    async fn test_create_storage_account_polls_async_operation() {
        let server = MockServer::start().await;
        let monitor = format!("{}/operations/op-1", server.uri());

        Mock::given(method("PUT"))
            .and(path(account_path("rg1", "sa1")))
            .and(body_json(json!({
                "kind": "StorageV2",
                "location": "North Europe",
                "sku": {"name": "Standard_LRS"}
            })))
            .respond_with(
                ResponseTemplate::new(202)
                    .insert_header("Azure-AsyncOperation", monitor.as_str())
                    .insert_header("Retry-After", "0"),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/operations/op-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "InProgress"})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/op-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "Succeeded"})))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(account_path("rg1", "sa1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "sa1",
                "location": "northeurope",
                "properties": {"provisioningState": "Succeeded"}
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        let operation = client
            .begin_create_storage_account(
                "rg1",
                "sa1",
                &StorageAccountCreate::general_purpose_v2("North Europe"),
            )
            .await
            .unwrap();
        assert_eq!(operation.status_url.as_deref(), Some(monitor.as_str()));
        assert_eq!(operation.retry_after, Some(Duration::ZERO));

        let account = client
            .poll_until_done(&operation, Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(account.name, "sa1");
    }

    #[test]
    fn test_next_delay() {
        let interval = Duration::from_secs(5);
        assert_eq!(next_delay(None, interval), interval);
        assert_eq!(next_delay(Some(Duration::ZERO), interval), interval);
        assert_eq!(
            next_delay(Some(Duration::from_secs(2)), interval),
            Duration::from_secs(2)
        );
    }

    #[tokio::test]
    async fn test_poll_zero_retry_after_waits_interval() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/operations/op-3"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Retry-After", "0")
                    .set_body_json(json!({"status": "InProgress"})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/op-3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "Succeeded"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(account_path("rg1", "sa1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "sa1",
                "location": "northeurope",
                "properties": {"provisioningState": "Succeeded"}
            })))
            .mount(&server)
            .await;

        let operation = PendingOperation {
            account_name: "sa1".to_string(),
            resource_group: "rg1".to_string(),
            status_url: Some(format!("{}/operations/op-3", server.uri())),
            retry_after: Some(Duration::ZERO),
        };

        let interval = Duration::from_millis(100);
        let started = std::time::Instant::now();
        client(&server)
            .poll_until_done(&operation, interval)
            .await
            .unwrap();
        assert!(started.elapsed() >= interval);
    }

    #[tokio::test]
    async fn test_poll_reports_failed_operation() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/operations/op-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "Failed",
                "error": {"code": "StorageAccountAlreadyTaken", "message": "taken"}
            })))
            .mount(&server)
            .await;

        let operation = PendingOperation {
            account_name: "sa1".to_string(),
            resource_group: "rg1".to_string(),
            status_url: Some(format!("{}/operations/op-2", server.uri())),
            retry_after: None,
        };

        let err = client(&server)
            .poll_until_done(&operation, Duration::from_millis(1))
            .await
            .unwrap_err();
        assert_eq!(err.code.as_deref(), Some("StorageAccountAlreadyTaken"));
    }

    #[tokio::test]
    async fn test_poll_without_monitor_checks_provisioning_state() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(account_path("rg1", "sa1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "sa1",
                "location": "westeurope",
                "properties": {"provisioningState": "Creating"}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(account_path("rg1", "sa1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "sa1",
                "location": "westeurope",
                "properties": {"provisioningState": "Succeeded"}
            })))
            .mount(&server)
            .await;

        let operation = PendingOperation {
            account_name: "sa1".to_string(),
            resource_group: "rg1".to_string(),
            status_url: None,
            retry_after: None,
        };

        let account = client(&server)
            .poll_until_done(&operation, Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(account.location, "westeurope");
    }

    #[tokio::test]
    async fn test_blob_container_get_and_create() {
        let server = MockServer::start().await;
        let container_path = format!(
            "{}/blobServices/default/containers/c1",
            account_path("rg1", "sa1")
        );

        Mock::given(method("GET"))
            .and(path(container_path.clone()))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": "ContainerNotFound", "message": "missing"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(container_path))
            .and(body_json(json!({"properties": {"publicAccess": "None"}})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "name": "c1",
                "properties": {"publicAccess": "None"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let err = client
            .get_blob_container("rg1", "sa1", "c1")
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let container = client
            .create_blob_container("rg1", "sa1", "c1", PublicAccess::None)
            .await
            .unwrap();
        assert_eq!(container.name, "c1");
        assert_eq!(container.properties.public_access, Some(PublicAccess::None));
    }

    #[test]
    fn test_connector_requires_subscription() {
        let connector =
            ArmConnector::with_credential(Arc::new(StaticTokenCredential::new("token")));
        assert!(connector.connect("", "").is_err());
        assert!(connector.connect("", SUB).is_ok());
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert("retry-after", "17".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(17)));
    }
}
