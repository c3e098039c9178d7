//! Problem-count fetching.
//!
//! The core only sees [`CountFetcher`], which never fails: every transport or
//! markup problem collapses into `FetchOutcome { success: false, .. }`.
//! [`CodeChefFetcher`] scrapes the public CodeChef profile page.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

/// Markup used by older profile pages: `<div class="problems-solved">123</div>`
static PROBLEMS_SOLVED_DIV: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"class="[^"]*\bproblems-solved\b[^"]*"[^>]*>\s*(\d+)\s*<"#).unwrap()
});

/// Current profile pages: `<h3>Total Problems Solved: 123</h3>`
static TOTAL_PROBLEMS_SOLVED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Total\s+Problems\s+Solved\s*:\s*(\d+)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOutcome {
    pub count: u64,
    pub success: bool,
}

impl FetchOutcome {
    pub fn ok(count: u64) -> Self {
        Self {
            count,
            success: true,
        }
    }

    pub fn failed() -> Self {
        Self {
            count: 0,
            success: false,
        }
    }
}

/// Capability for looking up a user's solved-problem count
#[async_trait]
pub trait CountFetcher: Send + Sync {
    async fn fetch(&self, username: &str) -> FetchOutcome;
}

pub struct CodeChefFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl CodeChefFetcher {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("leaderboard-service/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn profile_url(&self, username: &str) -> String {
        format!("{}/{}", self.base_url, username)
    }

    async fn fetch_count(&self, username: &str) -> Result<u64, String> {
        let url = self.profile_url(username);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("Request to {} failed: {}", url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("Profile page returned {}", status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| format!("Failed to read response: {}", e))?;

        parse_problems_solved(&body).ok_or_else(|| "Problem count not found on page".to_string())
    }
}

#[async_trait]
impl CountFetcher for CodeChefFetcher {
    async fn fetch(&self, username: &str) -> FetchOutcome {
        match self.fetch_count(username).await {
            Ok(count) => {
                log::debug!("[LEADERBOARD] Fetched {}: {} problems", username, count);
                FetchOutcome::ok(count)
            }
            Err(e) => {
                log::warn!("[LEADERBOARD] Error fetching stats for {}: {}", username, e);
                FetchOutcome::failed()
            }
        }
    }
}

/// Extract the solved-problem count from a profile page
pub fn parse_problems_solved(html: &str) -> Option<u64> {
    [&*PROBLEMS_SOLVED_DIV, &*TOTAL_PROBLEMS_SOLVED]
        .iter()
        .find_map(|re| re.captures(html))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
