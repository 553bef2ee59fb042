//! Wire types for the upstream schedule and roster endpoints.
//!
//! Schedule entries are kept loosely typed so one malformed entry can
//! be skipped without failing the whole response.

use crate::error::SyncError;
use crate::store::LessonRow;
use serde::Deserialize;
use serde_json::Value;

/// Response of the `RaspManager` schedule endpoint.
#[derive(Debug, Deserialize)]
pub struct ScheduleResponse {
    pub data: ScheduleData,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleData {
    #[serde(rename = "raspList")]
    pub rasp_list: Vec<Value>,
}

/// Response of the `StudentsExport` roster endpoint.
#[derive(Debug, Deserialize)]
pub struct RosterResponse {
    pub data: RosterData,
}

#[derive(Debug, Deserialize)]
pub struct RosterData {
    pub students: Vec<RosterStudent>,
}

#[derive(Debug, Deserialize)]
pub struct RosterStudent {
    pub name: String,
}

/// Extracts a lesson row from one schedule entry.
///
/// Any missing required field is a row-level error; the caller logs it
/// and moves on to the next entry.
pub fn extract_lesson(entry: &Value) -> Result<LessonRow, SyncError> {
    let info = entry
        .get("info")
        .ok_or_else(|| malformed("missing info object"))?;

    let groups = entry_group_ids(entry)?;

    let teachers = info
        .get("teachersNames")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing info.teachersNames"))?;
    let teacher = if teachers.is_empty() {
        "None".to_string()
    } else {
        teachers.to_string()
    };

    Ok(LessonRow {
        name: required_str(entry, "name")?,
        rasp_item_id: info
            .get("raspItemID")
            .map(stringify)
            .ok_or_else(|| malformed("missing info.raspItemID"))?,
        teacher,
        auditory: required_str(info, "aud")?,
        start_time: required_str(entry, "start")?,
        end_time: required_str(entry, "end")?,
        groups,
    })
}

/// Group IDs referenced by one schedule entry, in upstream order.
///
/// Reads only `info.groups[].groupID`, so group discovery still works
/// for entries whose other fields are malformed.
pub fn entry_group_ids(entry: &Value) -> Result<Vec<String>, SyncError> {
    entry
        .get("info")
        .and_then(|info| info.get("groups"))
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("missing info.groups"))?
        .iter()
        .map(|group| {
            group
                .get("groupID")
                .map(stringify)
                .ok_or_else(|| malformed("group entry missing groupID"))
        })
        .collect()
}

/// Identifier of a schedule entry, for skip logging. Best-effort.
pub fn entry_id(entry: &Value) -> String {
    entry
        .get("info")
        .and_then(|info| info.get("raspItemID"))
        .map(stringify)
        .unwrap_or_else(|| "<unknown>".to_string())
}

fn required_str(value: &Value, key: &str) -> Result<String, SyncError> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| malformed(&format!("missing {key}")))
}

/// Upstream sends IDs sometimes as numbers, sometimes as strings.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn malformed(reason: &str) -> SyncError {
    SyncError::MalformedEntry {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry() -> Value {
        json!({
            "name": "Math",
            "start": "2024-05-01T09:00:00+03:00",
            "end": "2024-05-01T10:30:00+03:00",
            "info": {
                "raspItemID": 4242,
                "aud": "a101",
                "teachersNames": "Ivanova A. A.",
                "groups": [{"groupID": 1062}, {"groupID": "1063"}]
            }
        })
    }

    #[test]
    fn test_extract_lesson() {
        let lesson = extract_lesson(&entry()).unwrap();
        assert_eq!(lesson.name, "Math");
        assert_eq!(lesson.rasp_item_id, "4242");
        assert_eq!(lesson.teacher, "Ivanova A. A.");
        assert_eq!(lesson.groups, vec!["1062", "1063"]);
    }

    #[test]
    fn test_empty_teacher_normalizes_to_sentinel() {
        let mut value = entry();
        value["info"]["teachersNames"] = json!("");
        assert_eq!(extract_lesson(&value).unwrap().teacher, "None");
    }

    #[test]
    fn test_missing_field_is_row_level() {
        let mut value = entry();
        value.as_object_mut().unwrap().remove("start");
        let err = extract_lesson(&value).unwrap_err();
        assert!(err.is_row_level());
    }

    #[test]
    fn test_entry_id_is_best_effort() {
        assert_eq!(entry_id(&entry()), "4242");
        assert_eq!(entry_id(&json!({})), "<unknown>");
    }
}
