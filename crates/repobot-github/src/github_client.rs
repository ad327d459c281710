//! HTTP client for the GitHub user repository listing.

use anyhow::{Context, Result};

use crate::repository_report::{
    render_report_error, render_repository_report, sort_repositories_by_stars, RepositoryRecord,
};

/// Page size requested from GitHub. Only the first page is fetched.
pub const GITHUB_REPOS_PER_PAGE: usize = 100;

const GITHUB_USER_AGENT: &str = "repobot";

#[derive(Debug, Clone)]
/// Connection settings for [`GithubRepositoryClient`].
pub struct GithubClientConfig {
    pub api_base: String,
}

impl Default for GithubClientConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct GithubRepositoryClient {
    http: reqwest::Client,
    api_base: String,
}

impl GithubRepositoryClient {
    pub fn new(config: GithubClientConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static(GITHUB_USER_AGENT),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("failed to create github api client")?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Fetches the first page of `user`'s public repositories.
    ///
    /// The HTTP status is not inspected: any body that decodes as a repository
    /// array is accepted, anything else is a decode error.
    pub async fn fetch_user_repositories(&self, user: &str) -> Result<Vec<RepositoryRecord>> {
        let url = format!(
            "{}/users/{}/repos?per_page={}",
            self.api_base, user, GITHUB_REPOS_PER_PAGE
        );
        tracing::debug!(user, url = %url, "fetching github repositories");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("github request for {user} failed"))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .with_context(|| format!("failed to read github response for {user}"))?;
        let repositories = serde_json::from_slice::<Vec<RepositoryRecord>>(&body)
            .with_context(|| {
                format!(
                    "failed to decode github repository listing for {user} (status {})",
                    status.as_u16()
                )
            })?;
        tracing::debug!(
            user,
            status = status.as_u16(),
            repositories = repositories.len(),
            "github repositories fetched"
        );
        Ok(repositories)
    }

    /// Builds the star-ordered report for `user`.
    ///
    /// Never fails: fetch and decode errors come back as a single
    /// `Error occurred: ...` line that is delivered like any other report.
    pub async fn build_report(&self, user: &str) -> String {
        match self.fetch_user_repositories(user).await {
            Ok(mut repositories) => {
                sort_repositories_by_stars(&mut repositories);
                render_repository_report(&repositories)
            }
            Err(error) => {
                tracing::warn!(user, error = %format!("{error:#}"), "github report failed");
                render_report_error(&error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::{GithubClientConfig, GithubRepositoryClient};

    fn client_for(base_url: String) -> GithubRepositoryClient {
        GithubRepositoryClient::new(GithubClientConfig { api_base: base_url }).expect("client")
    }

    #[tokio::test]
    async fn integration_build_report_orders_repositories_by_stars() {
        let server = MockServer::start();
        let listing = server.mock(|when, then| {
            when.method(GET)
                .path("/users/octocat/repos")
                .query_param("per_page", "100")
                .header("user-agent", "repobot");
            then.status(200).json_body(json!([
                {"full_name": "a/x", "stargazers_count": 5, "private": false},
                {"full_name": "b/y", "stargazers_count": 9, "language": "Rust"}
            ]));
        });

        let report = client_for(server.base_url()).build_report("octocat").await;
        assert_eq!(
            report,
            "https://github.com/b/y with stars 9\nhttps://github.com/a/x with stars 5\n"
        );
        listing.assert_calls(1);
    }

    #[tokio::test]
    async fn functional_build_report_is_empty_for_user_without_repositories() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/users/empty_user/repos");
            then.status(200).json_body(json!([]));
        });

        let report = client_for(server.base_url()).build_report("empty_user").await;
        assert_eq!(report, "");
    }

    #[tokio::test]
    async fn regression_build_report_renders_decode_failure_as_error_line() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/users/ghost/repos");
            then.status(404)
                .json_body(json!({"message": "Not Found", "status": "404"}));
        });

        let report = client_for(server.base_url()).build_report("ghost").await;
        assert!(report.starts_with("Error occurred: "), "{report}");
        assert!(report.contains("failed to decode github repository listing"));
        assert!(!report.contains('\n'));
    }

    #[tokio::test]
    async fn regression_build_report_accepts_array_body_regardless_of_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/users/odd/repos");
            then.status(500)
                .json_body(json!([{"full_name": "odd/one", "stargazers_count": 1}]));
        });

        let report = client_for(server.base_url()).build_report("odd").await;
        assert_eq!(report, "https://github.com/odd/one with stars 1\n");
    }

    #[tokio::test]
    async fn regression_build_report_renders_network_failure_as_error_line() {
        let report = client_for("http://127.0.0.1:1".to_string())
            .build_report("octocat")
            .await;
        assert!(report.starts_with("Error occurred: "), "{report}");
        assert!(report.contains("github request for octocat failed"));
    }

    #[tokio::test]
    async fn unit_client_trims_trailing_slash_from_api_base() {
        let server = MockServer::start();
        let listing = server.mock(|when, then| {
            when.method(GET).path("/users/octocat/repos");
            then.status(200).json_body(json!([]));
        });

        let client = client_for(format!("{}/", server.base_url()));
        let repositories = client
            .fetch_user_repositories("octocat")
            .await
            .expect("fetch succeeds");
        assert!(repositories.is_empty());
        listing.assert_calls(1);
    }
}
