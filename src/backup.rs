//! Timestamped snapshots of the schedule store.
//!
//! A snapshot is a single JSON object keyed by table display name; each
//! value is a list of parenthesized, comma-joined row tuples. Every
//! save writes two files with identical content: `{timestamp}.json` and
//! the fixed-name `last_backup.json`. Restore is additive: rows are
//! re-inserted verbatim and existing table contents are never cleared.

use crate::dates;
use crate::error::SyncError;
use crate::store::{GroupRow, LessonRow, ScheduleStore, StudentRow, Table};
use chrono::Local;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Fixed name of the most recent snapshot.
pub const LATEST: &str = "last_backup";

/// Outcome of a restore attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The snapshot file does not exist. Expected on first run.
    NotFound,
    /// Rows were re-inserted from the snapshot.
    Restored { tables: usize, rows: usize },
}

/// Writes and reads snapshot files in a configured folder.
pub struct BackupManager {
    folder: PathBuf,
}

impl BackupManager {
    /// Creates a manager, creating the snapshot folder if needed.
    pub fn new(folder: &Path) -> Result<Self, SyncError> {
        fs::create_dir_all(folder)?;
        Ok(Self {
            folder: folder.to_path_buf(),
        })
    }

    /// Serializes every table and writes the timestamped snapshot plus
    /// `last_backup.json`. Returns the snapshot identifier.
    pub fn save(&self, store: &ScheduleStore) -> Result<String, SyncError> {
        let name = dates::backup_name(Local::now());

        let mut data: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for table in Table::all() {
            let rows: Vec<String> = match table {
                Table::Lessons => store.select_lessons()?.iter().map(encode_lesson).collect(),
                Table::Groups => store.select_groups()?.iter().map(encode_group).collect(),
                Table::Students => store.select_students()?.iter().map(encode_student).collect(),
            };
            data.insert(table.display_name().to_string(), rows);
        }

        let content = serde_json::to_string_pretty(&data).map_err(|e| {
            SyncError::MalformedSnapshot {
                name: name.clone(),
                message: e.to_string(),
            }
        })?;

        self.write_atomic(&name, &content)?;
        self.write_atomic(LATEST, &content)?;

        info!(snapshot = %name, "Saved backup snapshot");
        Ok(name)
    }

    /// Re-inserts every row of the named snapshot into the store.
    ///
    /// A missing file is an expected no-op (`RestoreOutcome::NotFound`);
    /// a file that exists but cannot be parsed is a reported error.
    /// Every row is decoded before anything is inserted, so a malformed
    /// snapshot leaves the store untouched.
    pub fn restore(
        &self,
        store: &ScheduleStore,
        name: &str,
    ) -> Result<RestoreOutcome, SyncError> {
        let path = self.snapshot_path(name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(snapshot = %name, "No snapshot file, skipping restore");
                return Ok(RestoreOutcome::NotFound);
            }
            Err(e) => return Err(e.into()),
        };

        let data: BTreeMap<String, Vec<String>> =
            serde_json::from_str(&content).map_err(|e| SyncError::MalformedSnapshot {
                name: name.to_string(),
                message: e.to_string(),
            })?;

        let mut decoded: Vec<SnapshotRow> = Vec::new();
        let mut tables = 0;
        for (key, values) in &data {
            if values.is_empty() {
                continue;
            }
            let table = Table::from_display_name(key).ok_or_else(|| {
                SyncError::MalformedSnapshot {
                    name: name.to_string(),
                    message: format!("unknown table {key:?}"),
                }
            })?;
            for value in values {
                let row = decode_row(table, value).map_err(|message| {
                    SyncError::MalformedSnapshot {
                        name: name.to_string(),
                        message: format!("table {key:?}: {message}"),
                    }
                })?;
                decoded.push(row);
            }
            tables += 1;
        }

        let rows = decoded.len();
        for row in decoded {
            match row {
                SnapshotRow::Lesson(lesson) => store.insert_lesson(&lesson)?,
                SnapshotRow::Group(group) => store.insert_group(&group)?,
                SnapshotRow::Student(student) => store.insert_student(&student)?,
            }
        }

        info!(snapshot = %name, tables, rows, "Restored backup snapshot");
        Ok(RestoreOutcome::Restored { tables, rows })
    }

    fn snapshot_path(&self, name: &str) -> PathBuf {
        self.folder.join(format!("{name}.json"))
    }

    /// Writes through a temp file and renames, so a crash mid-write
    /// never leaves a truncated snapshot behind.
    fn write_atomic(&self, name: &str, content: &str) -> Result<(), SyncError> {
        let path = self.snapshot_path(name);
        let tmp = self.folder.join(format!(".{name}.json.tmp"));
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

// --- row codec ---
//
// Rows are stored as `('field', 'field', ['item', 'item'])`. Decoding
// strips the enclosing parentheses, splits on top-level commas, and
// unquotes each field.

/// One decoded snapshot row, ready for insertion.
enum SnapshotRow {
    Lesson(LessonRow),
    Group(GroupRow),
    Student(StudentRow),
}

fn decode_row(table: Table, value: &str) -> Result<SnapshotRow, String> {
    Ok(match table {
        Table::Lessons => SnapshotRow::Lesson(decode_lesson(value)?),
        Table::Groups => SnapshotRow::Group(decode_group(value)?),
        Table::Students => SnapshotRow::Student(decode_student(value)?),
    })
}

fn encode_lesson(lesson: &LessonRow) -> String {
    format!(
        "({}, {}, {}, {}, {}, {}, {})",
        quote(&lesson.name),
        quote(&lesson.rasp_item_id),
        quote(&lesson.teacher),
        quote(&lesson.auditory),
        quote(&lesson.start_time),
        quote(&lesson.end_time),
        encode_list(&lesson.groups),
    )
}

fn encode_group(group: &GroupRow) -> String {
    format!("({}, {})", quote(&group.group_id), encode_list(&group.students))
}

fn encode_student(student: &StudentRow) -> String {
    format!("({}, {})", quote(&student.user_id), quote(&student.fullname))
}

fn decode_lesson(value: &str) -> Result<LessonRow, String> {
    let fields = split_fields(strip_parens(value)?)?;
    if fields.len() != 7 {
        return Err(format!("expected 7 fields, got {}", fields.len()));
    }
    Ok(LessonRow {
        name: unquote(&fields[0])?,
        rasp_item_id: unquote(&fields[1])?,
        teacher: unquote(&fields[2])?,
        auditory: unquote(&fields[3])?,
        start_time: unquote(&fields[4])?,
        end_time: unquote(&fields[5])?,
        groups: decode_list(&fields[6])?,
    })
}

fn decode_group(value: &str) -> Result<GroupRow, String> {
    let fields = split_fields(strip_parens(value)?)?;
    if fields.len() != 2 {
        return Err(format!("expected 2 fields, got {}", fields.len()));
    }
    Ok(GroupRow {
        group_id: unquote(&fields[0])?,
        students: decode_list(&fields[1])?,
    })
}

fn decode_student(value: &str) -> Result<StudentRow, String> {
    let fields = split_fields(strip_parens(value)?)?;
    if fields.len() != 2 {
        return Err(format!("expected 2 fields, got {}", fields.len()));
    }
    Ok(StudentRow {
        user_id: unquote(&fields[0])?,
        fullname: unquote(&fields[1])?,
    })
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn unquote(s: &str) -> Result<String, String> {
    let inner = s
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .ok_or_else(|| format!("field {s:?} is not quoted"))?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(escaped) => out.push(escaped),
                None => return Err(format!("dangling escape in {s:?}")),
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

fn encode_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|item| quote(item)).collect();
    format!("[{}]", quoted.join(", "))
}

fn decode_list(s: &str) -> Result<Vec<String>, String> {
    let inner = s
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| format!("field {s:?} is not a list"))?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    split_fields(inner)?.iter().map(|item| unquote(item)).collect()
}

fn strip_parens(value: &str) -> Result<&str, String> {
    value
        .trim()
        .strip_prefix('(')
        .and_then(|v| v.strip_suffix(')'))
        .ok_or_else(|| format!("row {value:?} is not parenthesized"))
}

/// Splits on commas at the top level only: commas inside quotes or
/// brackets do not separate fields.
fn split_fields(s: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut depth = 0usize;

    for c in s.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '\'' => {
                current.push(c);
                in_quotes = !in_quotes;
            }
            '[' if !in_quotes => {
                current.push(c);
                depth += 1;
            }
            ']' if !in_quotes => {
                current.push(c);
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| format!("unbalanced brackets in {s:?}"))?;
            }
            ',' if !in_quotes && depth == 0 => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if in_quotes || depth != 0 {
        return Err(format!("unbalanced quotes or brackets in {s:?}"));
    }
    fields.push(current.trim().to_string());
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn lesson(name: &str, groups: &[&str]) -> LessonRow {
        LessonRow {
            name: name.to_string(),
            rasp_item_id: "42".to_string(),
            teacher: "None".to_string(),
            auditory: "a101".to_string(),
            start_time: "2024-05-01T09:00:00+03:00".to_string(),
            end_time: "2024-05-01T10:30:00+03:00".to_string(),
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    #[test]
    fn test_lesson_codec_round_trip() {
        let row = lesson("Math, advanced ('22)", &["1062", "1063"]);
        let decoded = decode_lesson(&encode_lesson(&row)).unwrap();
        assert_eq!(decoded, row);
    }

    #[test]
    fn test_group_codec_round_trip() {
        let row = GroupRow {
            group_id: "G1".to_string(),
            students: vec!["Ivan Petrov".to_string(), "O'Neil, Anna".to_string()],
        };
        assert_eq!(decode_group(&encode_group(&row)).unwrap(), row);
    }

    #[test]
    fn test_decode_rejects_unparenthesized_rows() {
        assert!(decode_student("'U1', 'Ivan'").is_err());
        assert!(decode_student("('U1', 'Ivan'").is_err());
    }

    #[test]
    fn test_empty_list_round_trip() {
        let row = GroupRow {
            group_id: "G9".to_string(),
            students: vec![],
        };
        assert_eq!(decode_group(&encode_group(&row)).unwrap(), row);
    }

    #[test]
    fn test_save_then_restore_reproduces_rows() {
        let dir = TempDir::new().unwrap();
        let manager = BackupManager::new(dir.path()).unwrap();

        let store = ScheduleStore::open_in_memory().unwrap();
        store.insert_lesson(&lesson("Math", &["1062"])).unwrap();
        store
            .insert_group(&GroupRow {
                group_id: "G1".to_string(),
                students: vec!["A".to_string()],
            })
            .unwrap();
        store.register_user("U1", "Ivan Petrov").unwrap();

        let name = manager.save(&store).unwrap();
        assert!(dir.path().join(format!("{name}.json")).exists());
        assert!(dir.path().join("last_backup.json").exists());

        let fresh = ScheduleStore::open_in_memory().unwrap();
        let outcome = manager.restore(&fresh, LATEST).unwrap();
        assert_eq!(outcome, RestoreOutcome::Restored { tables: 3, rows: 3 });

        assert_eq!(fresh.select_lessons().unwrap(), store.select_lessons().unwrap());
        assert_eq!(fresh.select_groups().unwrap(), store.select_groups().unwrap());
        assert_eq!(fresh.select_students().unwrap(), store.select_students().unwrap());
    }

    #[test]
    fn test_empty_tables_serialize_as_empty_lists() {
        let dir = TempDir::new().unwrap();
        let manager = BackupManager::new(dir.path()).unwrap();

        let store = ScheduleStore::open_in_memory().unwrap();
        store
            .insert_group(&GroupRow {
                group_id: "G1".to_string(),
                students: vec!["A".to_string()],
            })
            .unwrap();

        manager.save(&store).unwrap();

        let content = fs::read_to_string(dir.path().join("last_backup.json")).unwrap();
        let data: BTreeMap<String, Vec<String>> = serde_json::from_str(&content).unwrap();
        assert!(data["Lessons"].is_empty());
        assert_eq!(data["Groups"].len(), 1);
        assert!(data["Students"].is_empty());
    }

    #[test]
    fn test_restore_is_additive() {
        let dir = TempDir::new().unwrap();
        let manager = BackupManager::new(dir.path()).unwrap();

        let store = ScheduleStore::open_in_memory().unwrap();
        store
            .insert_group(&GroupRow {
                group_id: "G1".to_string(),
                students: vec!["A".to_string()],
            })
            .unwrap();
        manager.save(&store).unwrap();

        // Target store already holds a different G1 row; restore must
        // add a second one rather than replace it.
        let target = ScheduleStore::open_in_memory().unwrap();
        target
            .insert_group(&GroupRow {
                group_id: "G1".to_string(),
                students: vec!["B".to_string()],
            })
            .unwrap();
        manager.restore(&target, LATEST).unwrap();

        let groups = target.select_groups().unwrap();
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.group_id == "G1"));
    }

    #[test]
    fn test_restore_missing_snapshot_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let manager = BackupManager::new(dir.path()).unwrap();
        let store = ScheduleStore::open_in_memory().unwrap();

        let outcome = manager.restore(&store, "nonexistent").unwrap();
        assert_eq!(outcome, RestoreOutcome::NotFound);
    }

    #[test]
    fn test_restore_malformed_snapshot_is_reported() {
        let dir = TempDir::new().unwrap();
        let manager = BackupManager::new(dir.path()).unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

        let store = ScheduleStore::open_in_memory().unwrap();
        let result = manager.restore(&store, "broken");
        assert!(matches!(result, Err(SyncError::MalformedSnapshot { .. })));
    }

    #[test]
    fn test_restore_malformed_row_is_reported_as_malformed_snapshot() {
        let dir = TempDir::new().unwrap();
        let manager = BackupManager::new(dir.path()).unwrap();
        fs::write(
            dir.path().join("badrow.json"),
            r#"{"Students": ["not a row tuple"]}"#,
        )
        .unwrap();

        let store = ScheduleStore::open_in_memory().unwrap();
        let result = manager.restore(&store, "badrow");
        assert!(matches!(result, Err(SyncError::MalformedSnapshot { .. })));
    }

    #[test]
    fn test_restore_of_malformed_snapshot_leaves_store_untouched() {
        let dir = TempDir::new().unwrap();
        let manager = BackupManager::new(dir.path()).unwrap();

        // A valid row ahead of a malformed one in the same table: the
        // valid row must not be inserted when the snapshot is rejected.
        fs::write(
            dir.path().join("partial.json"),
            r#"{"Groups": ["('G1', ['A'])", "garbage"]}"#,
        )
        .unwrap();

        let store = ScheduleStore::open_in_memory().unwrap();
        let result = manager.restore(&store, "partial");
        assert!(matches!(result, Err(SyncError::MalformedSnapshot { .. })));
        assert!(store.select_groups().unwrap().is_empty());
    }
}
