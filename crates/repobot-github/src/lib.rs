//! GitHub repository listing client and star-ordered report rendering.
//!
//! The report builder collapses fetch and decode failures into a single
//! user-facing `Error occurred: ...` line so chat delivery never branches.

pub mod github_client;
pub mod repository_report;

pub use github_client::{GithubClientConfig, GithubRepositoryClient, GITHUB_REPOS_PER_PAGE};
pub use repository_report::{
    render_repository_report, render_report_error, sort_repositories_by_stars, RepositoryRecord,
};
