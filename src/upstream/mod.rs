//! HTTP client for the upstream institutional source.
//!
//! Two endpoints are consumed: the month schedule listing and the
//! per-group roster export. Roster fetches fan out concurrently, one
//! request per group, and the whole batch fails if any request fails.

mod types;

pub use types::{entry_id, extract_lesson};

use crate::config::AppConfig;
use crate::dates;
use crate::error::SyncError;
use crate::store::GroupRow;
use chrono::{Datelike, Local};
use futures::future::join_all;
use reqwest::header::COOKIE;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use types::{RosterResponse, ScheduleResponse};

const SCHEDULE_PATH: &str = "/api/RaspManager";
const ROSTER_PATH: &str = "/api/GroupManager/StudentsExport";

/// Client for the upstream schedule and roster endpoints.
pub struct UpstreamClient {
    client: Client,
    base_url: String,
    education_space: u32,
    auth_token: String,
}

impl UpstreamClient {
    /// Builds a client with explicit timeouts, so a hung upstream call
    /// fails the cycle instead of wedging its loop.
    pub fn new(config: &AppConfig) -> Result<Self, SyncError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(20))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            education_space: config.education_space,
            auth_token: config.auth_token.clone(),
        })
    }

    /// Fetches the full current schedule listing for this month.
    pub async fn fetch_schedule(&self) -> Result<Vec<Value>, SyncError> {
        let now = Local::now();
        let mut url = url::Url::parse(&self.base_url)?.join(SCHEDULE_PATH)?;
        url.query_pairs_mut()
            .append_pair("educationSpaceId", &self.education_space.to_string())
            .append_pair("month", &now.month().to_string())
            .append_pair("showJournalFilled", "false")
            .append_pair("year", &dates::academic_year(now))
            .append_pair("showAll", "true");

        debug!(url = %url, "Fetching schedule listing");
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(SyncError::UnexpectedResponse {
                message: format!("schedule endpoint returned {}", response.status()),
            });
        }

        let parsed: ScheduleResponse =
            response
                .json()
                .await
                .map_err(|e| SyncError::UnexpectedResponse {
                    message: format!("schedule listing did not parse: {e}"),
                })?;
        Ok(parsed.data.rasp_list)
    }

    /// Fetches one group's member roster. Requires the session
    /// credential, passed as a cookie header.
    pub async fn fetch_group_members(&self, group_id: &str) -> Result<Vec<String>, SyncError> {
        let mut url = url::Url::parse(&self.base_url)?.join(ROSTER_PATH)?;
        url.query_pairs_mut().append_pair("groupID", group_id);

        let response = self
            .client
            .get(url)
            .header(COOKIE, format!("authToken={}", self.auth_token))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SyncError::UnexpectedResponse {
                message: format!(
                    "roster endpoint returned {} for group {group_id}",
                    response.status()
                ),
            });
        }

        let parsed: RosterResponse =
            response
                .json()
                .await
                .map_err(|e| SyncError::UnexpectedResponse {
                    message: format!("roster for group {group_id} did not parse: {e}"),
                })?;
        Ok(parsed
            .data
            .students
            .into_iter()
            .map(|student| student.name)
            .collect())
    }

    /// Fetches rosters for every group concurrently. Any single fetch
    /// failure fails the batch; the caller skips the cycle.
    pub async fn fetch_rosters(&self, group_ids: &[String]) -> Result<Vec<GroupRow>, SyncError> {
        let fetches = group_ids.iter().map(|id| async move {
            let students = self.fetch_group_members(id).await?;
            Ok(GroupRow {
                group_id: id.clone(),
                students,
            })
        });

        join_all(fetches).await.into_iter().collect()
    }
}

/// Collects the distinct group IDs referenced by a schedule listing,
/// in first-seen order. Only `info.groups` is read, so entries that are
/// otherwise malformed still contribute their group IDs; entries
/// without a readable group list are skipped.
pub fn collect_group_ids(entries: &[Value]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for entry in entries {
        let Ok(group_ids) = types::entry_group_ids(entry) else {
            continue;
        };
        for id in group_ids {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}
