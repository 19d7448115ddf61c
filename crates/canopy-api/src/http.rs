//! HTTP implementation of [`ProjectApi`].

use std::time::Duration;

use canopy_core::{
    ApiError, ApiResult, BranchInfo, CheckoutResponse, CommitResponse, DirectoryEntry, EntryKind,
    GitStatusSnapshot, LogResponse, SyncResponse,
};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;

use crate::contract::ProjectApi;
use crate::wire::{
    BranchesResponse, CheckoutBody, CommitBody, ConfigResponse, CreateBody, ErrorBody,
    ListResponse, PathsBody, RenameBody,
};

/// Client for a project server reachable over HTTP.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base: Url,
}

impl HttpApi {
    /// Create a client for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| ApiError::network(format!("Invalid server URL '{base_url}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::network(format!(
                "Server URL '{base_url}' cannot carry a path"
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::network(e.to_string()))?;
        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// `{base}/api/{segments...}` with each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::network("Server URL cannot carry a path"))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    fn project_url(&self, project: &str, segments: &[&str]) -> ApiResult<Url> {
        let mut all = vec!["projects", project];
        all.extend_from_slice(segments);
        self.url(&all)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        tracing::trace!(%method, %url, "request");
        self.client.request(method, url)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = Self::execute(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::decode(e.to_string()))
    }

    async fn send_empty(&self, request: RequestBuilder) -> ApiResult<()> {
        Self::execute(request).await.map(|_| ())
    }

    async fn execute(request: RequestBuilder) -> ApiResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::network(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(ErrorBody::into_message)
            .or_else(|| Some(text.trim().to_string()).filter(|t| !t.is_empty()))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            });
        Err(ApiError::status(status.as_u16(), message))
    }

    async fn index_op(&self, project: &str, verb: &str, paths: &[String]) -> ApiResult<()> {
        let url = self.project_url(project, &["git", verb])?;
        self.send_empty(self.request(Method::POST, url).json(&PathsBody { paths }))
            .await
    }

    async fn remote_op(&self, project: &str, op: &str) -> ApiResult<SyncResponse> {
        let url = self.project_url(project, &["git", op])?;
        self.send_json(self.request(Method::POST, url)).await
    }
}

impl ProjectApi for HttpApi {
    async fn list(
        &self,
        project: &str,
        path: &str,
        show_hidden: bool,
    ) -> ApiResult<Vec<DirectoryEntry>> {
        let url = self.project_url(project, &["files"])?;
        let request = self
            .request(Method::GET, url)
            .query(&[("path", path), ("showHidden", if show_hidden { "true" } else { "false" })]);
        let body: ListResponse = self.send_json(request).await?;
        Ok(body.entries)
    }

    async fn status(&self, project: &str) -> ApiResult<GitStatusSnapshot> {
        let url = self.project_url(project, &["git", "status"])?;
        self.send_json(self.request(Method::GET, url)).await
    }

    async fn stage(&self, project: &str, paths: &[String]) -> ApiResult<()> {
        self.index_op(project, "stage", paths).await
    }

    async fn unstage(&self, project: &str, paths: &[String]) -> ApiResult<()> {
        self.index_op(project, "unstage", paths).await
    }

    async fn discard(&self, project: &str, paths: &[String]) -> ApiResult<()> {
        self.index_op(project, "discard", paths).await
    }

    async fn commit(&self, project: &str, message: &str) -> ApiResult<CommitResponse> {
        let url = self.project_url(project, &["git", "commit"])?;
        self.send_json(self.request(Method::POST, url).json(&CommitBody { message }))
            .await
    }

    async fn fetch(&self, project: &str) -> ApiResult<SyncResponse> {
        self.remote_op(project, "fetch").await
    }

    async fn push(&self, project: &str) -> ApiResult<SyncResponse> {
        self.remote_op(project, "push").await
    }

    async fn pull(&self, project: &str) -> ApiResult<SyncResponse> {
        self.remote_op(project, "pull").await
    }

    async fn log(&self, project: &str, limit: usize) -> ApiResult<LogResponse> {
        let url = self.project_url(project, &["git", "log"])?;
        self.send_json(self.request(Method::GET, url).query(&[("limit", limit)]))
            .await
    }

    async fn branches(&self, project: &str) -> ApiResult<Vec<BranchInfo>> {
        let url = self.project_url(project, &["git", "branches"])?;
        let body: BranchesResponse = self.send_json(self.request(Method::GET, url)).await?;
        Ok(body.branches)
    }

    async fn checkout(
        &self,
        project: &str,
        branch: &str,
        create: bool,
    ) -> ApiResult<CheckoutResponse> {
        let url = self.project_url(project, &["git", "checkout"])?;
        self.send_json(
            self.request(Method::POST, url)
                .json(&CheckoutBody { branch, create }),
        )
        .await
    }

    async fn rename(&self, project: &str, path: &str, new_name: &str) -> ApiResult<()> {
        let url = self.project_url(project, &["files", "rename"])?;
        self.send_empty(self.request(Method::POST, url).json(&RenameBody { path, new_name }))
            .await
    }

    async fn delete(&self, project: &str, path: &str) -> ApiResult<()> {
        let url = self.project_url(project, &["files"])?;
        self.send_empty(self.request(Method::DELETE, url).query(&[("path", path)]))
            .await
    }

    async fn create(&self, project: &str, path: &str, kind: EntryKind) -> ApiResult<()> {
        let url = self.project_url(project, &["files", "create"])?;
        self.send_empty(self.request(Method::POST, url).json(&CreateBody { path, kind }))
            .await
    }

    async fn ignore_list(&self) -> ApiResult<Vec<String>> {
        let url = self.url(&["config"])?;
        let body: ConfigResponse = self.send_json(self.request(Method::GET, url)).await?;
        Ok(body.ignored_directories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base: &str) -> HttpApi {
        HttpApi::new(base, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_project_url_encodes_segments() {
        let url = api("http://localhost:3001")
            .project_url("my project", &["git", "status"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:3001/api/projects/my%20project/git/status"
        );
    }

    #[test]
    fn test_url_keeps_base_path() {
        let url = api("http://localhost:3001/ui/").url(&["config"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3001/ui/api/config");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(HttpApi::new("not a url", Duration::from_secs(1)).is_err());
        assert!(HttpApi::new("mailto:someone@example.com", Duration::from_secs(1)).is_err());
    }
}
