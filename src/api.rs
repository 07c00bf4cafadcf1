//! Drive API client: folder creation and pre-signed upload URL issuance.

use std::future::Future;

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::ApiConfig;
use crate::{Result, VaultError};

/// Server-side collaborators of the upload scheduler.
pub trait DriveApi: Send + Sync + 'static {
    /// Create a folder and return its id. `parent_id = None` creates it at the drive root.
    fn create_folder(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Get a pre-signed URL that accepts a PUT of the file's bytes.
    fn request_upload_url(
        &self,
        name: &str,
        size: u64,
        folder_id: Option<&str>,
    ) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateFolderRequest<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CreateFolderResponse {
    id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadUrlRequest<'a> {
    name: &'a str,
    size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    folder_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct UploadUrlResponse {
    url: String,
}

/// JSON-over-HTTP drive API client authenticated with a bearer session token.
#[derive(Debug, Clone)]
pub struct HttpDriveClient {
    client: Client,
    base_url: Url,
    token: String,
}

impl HttpDriveClient {
    /// Create a client from the `[api]` configuration section.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Self::with_client(client, &config.base_url, &config.token)
    }

    /// Create a client around an existing `reqwest::Client`.
    pub fn with_client(client: Client, base_url: &str, token: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| VaultError::Config(format!("invalid api base url {base_url}: {e}")))?;
        // Url::join replaces the last segment unless the path ends with a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            token: token.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| VaultError::Config(format!("invalid endpoint {path}: {e}")))
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: for<'de> Deserialize<'de>,
    {
        let url = self.endpoint(path)?;
        debug!(%url, "POST");

        let mut request = self.client.post(url).json(body);
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }

        let response = check_status(request.send().await?).await?;
        Ok(response.json::<R>().await?)
    }
}

/// Turn a non-success response into `VaultError::Rejected` carrying the body text.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{status}: {}", body.trim())
    };
    Err(VaultError::Rejected(message))
}

impl DriveApi for HttpDriveClient {
    async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String> {
        let response: CreateFolderResponse = self
            .post("folders", &CreateFolderRequest { name, parent_id })
            .await?;
        Ok(response.id)
    }

    async fn request_upload_url(
        &self,
        name: &str,
        size: u64,
        folder_id: Option<&str>,
    ) -> Result<String> {
        let response: UploadUrlResponse = self
            .post(
                "files/upload",
                &UploadUrlRequest {
                    name,
                    size,
                    folder_id,
                },
            )
            .await?;
        Ok(response.url)
    }
}
