//! Per-user schedule resolution.
//!
//! Resolution joins the student's group memberships against
//! date-filtered lesson rows: look up the full name, scan the group
//! rosters for it, then filter the lessons table once per matched group
//! concurrently and merge the results, dropping exact duplicates.

use crate::dates;
use crate::error::SyncError;
use crate::store::{LessonRow, ScheduleStore};
use chrono::Local;
use std::sync::Arc;
use tracing::warn;

/// Decides whether a student belongs to a group roster.
///
/// The deployed behavior is an exact string comparison between the
/// registered full name and roster entries. It is brittle by
/// construction; this seam exists so an ID-based join can replace it
/// without touching the resolution control flow.
pub trait MembershipMatcher: Send + Sync {
    fn is_member(&self, fullname: &str, roster: &[String]) -> bool;
}

/// Exact match: case- and whitespace-sensitive, no normalization.
pub struct ExactMatcher;

impl MembershipMatcher for ExactMatcher {
    fn is_member(&self, fullname: &str, roster: &[String]) -> bool {
        roster.iter().any(|name| name == fullname)
    }
}

/// Read-only query engine over the schedule store.
pub struct ScheduleResolver {
    store: Arc<ScheduleStore>,
    matcher: Box<dyn MembershipMatcher>,
}

impl ScheduleResolver {
    /// Creates a resolver with the exact-match membership rule.
    pub fn new(store: Arc<ScheduleStore>) -> Self {
        Self::with_matcher(store, Box::new(ExactMatcher))
    }

    pub fn with_matcher(store: Arc<ScheduleStore>, matcher: Box<dyn MembershipMatcher>) -> Self {
        Self { store, matcher }
    }

    /// Returns the user's lessons `day_offset` days from today.
    ///
    /// An unregistered user resolves to an empty list, not an error.
    pub async fn resolve(
        &self,
        user_id: &str,
        day_offset: i64,
    ) -> Result<Vec<LessonRow>, SyncError> {
        let date = dates::target_date(Local::now(), day_offset);
        self.resolve_on(user_id, &date).await
    }

    /// Returns the user's lessons on an explicit `%Y-%m-%d` date.
    pub async fn resolve_on(&self, user_id: &str, date: &str) -> Result<Vec<LessonRow>, SyncError> {
        let Some(fullname) = self.store.get_user_fullname(user_id)? else {
            return Ok(Vec::new());
        };

        let group_ids: Vec<String> = self
            .store
            .select_groups()?
            .into_iter()
            .filter(|group| self.matcher.is_member(&fullname, &group.students))
            .map(|group| group.group_id)
            .collect();

        // One snapshot of the lessons table, shared by every per-group
        // filter task.
        let lessons: Arc<[LessonRow]> = self.store.select_lessons()?.into();

        let tasks: Vec<_> = group_ids
            .iter()
            .map(|group_id| {
                let lessons = lessons.clone();
                let group_id = group_id.clone();
                let date = date.to_string();
                tokio::spawn(async move {
                    lessons
                        .iter()
                        .filter(|lesson| {
                            dates::date_part(&lesson.start_time) == date
                                && lesson.groups.contains(&group_id)
                        })
                        .cloned()
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        // Merge in group-scan order, dropping exact-duplicate rows; a
        // lesson shared by two of the user's groups is returned once.
        // A failed filter task only loses that group's rows.
        let mut result: Vec<LessonRow> = Vec::new();
        for (group_id, task) in group_ids.iter().zip(tasks) {
            match task.await {
                Ok(rows) => {
                    for row in rows {
                        if !result.contains(&row) {
                            result.push(row);
                        }
                    }
                }
                Err(e) => {
                    warn!(group = %group_id, error = %e, "Group filter task failed, skipping");
                }
            }
        }
        Ok(result)
    }

    /// Checks whether a full name appears in any group roster.
    pub fn user_in_any_group(&self, fullname: &str) -> Result<bool, SyncError> {
        Ok(self
            .store
            .select_groups()?
            .iter()
            .any(|group| self.matcher.is_member(fullname, &group.students)))
    }
}
