//! Google Classroom REST client.
//!
//! Only the course listing is used: `GET {base_url}/courses` with a
//! bearer token obtained by the browser's identity flow. Each call is a
//! single attempt with no retry.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ClassroomConfig;

/// A course visible to the signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// Fetch the user's courses.
pub async fn fetch_courses(config: &ClassroomConfig, token: &str) -> Result<Vec<Course>> {
    let url = format!("{}/courses", config.base_url.trim_end_matches('/'));
    tracing::debug!(%url, "fetching classroom courses");

    let resp = reqwest::Client::new()
        .get(&url)
        .bearer_auth(token)
        .send()
        .await
        .with_context(|| format!("Classroom request to {} failed", url))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("Classroom API returned {}: {}", status, body);
    }

    let data: Value = resp
        .json()
        .await
        .context("Classroom API returned invalid JSON")?;
    let courses = parse_courses(&data);
    tracing::info!(count = courses.len(), "fetched classroom courses");
    Ok(courses)
}

/// Map a `courses.list` response body to [`Course`]s. Entries without an
/// id are skipped; a missing `courses` array means no courses.
pub fn parse_courses(data: &Value) -> Vec<Course> {
    let Some(items) = data.get("courses").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|c| {
            let id = c.get("id")?.as_str()?.to_string();
            let field = |name: &str| {
                c.get(name)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            Some(Course {
                id,
                name: field("name"),
                description: field("description"),
            })
        })
        .collect()
}
