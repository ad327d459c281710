use std::fmt::Write as _;

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
/// One repository from the GitHub listing. Only the two rendered fields are decoded.
pub struct RepositoryRecord {
    pub full_name: String,
    pub stargazers_count: u64,
}

/// Sorts by star count descending. Equal counts keep their input order.
pub fn sort_repositories_by_stars(repositories: &mut [RepositoryRecord]) {
    repositories.sort_by(|left, right| right.stargazers_count.cmp(&left.stargazers_count));
}

/// Renders one newline-terminated line per repository, in slice order.
pub fn render_repository_report(repositories: &[RepositoryRecord]) -> String {
    let mut out = String::new();
    for repository in repositories {
        let _ = writeln!(
            out,
            "https://github.com/{} with stars {}",
            repository.full_name, repository.stargazers_count
        );
    }
    out
}

pub fn render_report_error(error: &anyhow::Error) -> String {
    format!("Error occurred: {error:#}")
}
