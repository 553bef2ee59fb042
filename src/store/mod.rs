/// Store module managing the lessons, groups, and students tables.
mod types;

pub use types::{GroupRow, LessonRow, StudentRow, Table};

use rusqlite::types::Type;
use rusqlite::{Connection, Result};
use std::path::Path;
use std::sync::Mutex;

const SCHEMA_SQL: &str = include_str!("../../sql/init_tables.sql");

/// Manager for the schedule store.
///
/// All mutation is serialized through a single connection; refresh
/// loops are single-writer per table and the query path only reads.
pub struct ScheduleStore {
    db: Mutex<Connection>,
}

impl ScheduleStore {
    /// Opens the store at the given path and initializes the schema.
    pub fn open(db_path: &Path) -> Result<Self> {
        Self::from_connection(Connection::open(db_path)?)
    }

    /// Opens an in-memory store (used by tests).
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Inserts a single lesson row.
    pub fn insert_lesson(&self, lesson: &LessonRow) -> Result<()> {
        let db = self.db.lock().unwrap();
        insert_lesson_stmt(&db, lesson)
    }

    /// Inserts a single group row.
    pub fn insert_group(&self, group: &GroupRow) -> Result<()> {
        let db = self.db.lock().unwrap();
        insert_group_stmt(&db, group)
    }

    /// Inserts a single student row.
    pub fn insert_student(&self, student: &StudentRow) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO students (user_id, fullname) VALUES (?1, ?2)",
            (&student.user_id, &student.fullname),
        )?;
        Ok(())
    }

    /// Replaces the entire lessons table in one transaction, so a
    /// concurrent query never observes a half-repopulated table.
    pub fn replace_lessons(&self, lessons: &[LessonRow]) -> Result<()> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        tx.execute("DELETE FROM lessons", [])?;
        for lesson in lessons {
            insert_lesson_stmt(&tx, lesson)?;
        }
        tx.commit()
    }

    /// Replaces the entire groups table in one transaction.
    pub fn replace_groups(&self, groups: &[GroupRow]) -> Result<()> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        tx.execute("DELETE FROM groups", [])?;
        for group in groups {
            insert_group_stmt(&tx, group)?;
        }
        tx.commit()
    }

    /// Returns every lesson row, in store order. Callers must not
    /// assume any particular ordering.
    pub fn select_lessons(&self) -> Result<Vec<LessonRow>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT name, rasp_item_id, teacher, auditory, start_time, end_time, groups
             FROM lessons",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(LessonRow {
                name: row.get(0)?,
                rasp_item_id: row.get(1)?,
                teacher: row.get(2)?,
                auditory: row.get(3)?,
                start_time: row.get(4)?,
                end_time: row.get(5)?,
                groups: decode_json_list(row.get::<_, String>(6)?)?,
            })
        })?;
        rows.collect()
    }

    /// Returns every group row, in store order.
    pub fn select_groups(&self) -> Result<Vec<GroupRow>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare("SELECT group_id, students FROM groups")?;
        let rows = stmt.query_map([], |row| {
            Ok(GroupRow {
                group_id: row.get(0)?,
                students: decode_json_list(row.get::<_, String>(1)?)?,
            })
        })?;
        rows.collect()
    }

    /// Returns every student row, in store order.
    pub fn select_students(&self) -> Result<Vec<StudentRow>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare("SELECT user_id, fullname FROM students")?;
        let rows = stmt.query_map([], |row| {
            Ok(StudentRow {
                user_id: row.get(0)?,
                fullname: row.get(1)?,
            })
        })?;
        rows.collect()
    }

    /// Deletes every row where `column` equals `value`. The column must
    /// be one of the table's known columns.
    pub fn delete_where(&self, table: Table, column: &str, value: &str) -> Result<usize> {
        if !table.columns().contains(&column) {
            return Err(rusqlite::Error::InvalidColumnName(column.to_string()));
        }
        let db = self.db.lock().unwrap();
        db.execute(
            &format!("DELETE FROM {} WHERE {} = ?1", table.sql_name(), column),
            [value],
        )
    }

    /// Removes every row from the table.
    pub fn clear(&self, table: Table) -> Result<usize> {
        let db = self.db.lock().unwrap();
        db.execute(&format!("DELETE FROM {}", table.sql_name()), [])
    }

    /// Registers a user unless the ID is already taken. Returns true if
    /// a row was inserted.
    pub fn register_user(&self, user_id: &str, fullname: &str) -> Result<bool> {
        if self.user_exists(user_id)? {
            return Ok(false);
        }
        self.insert_student(&StudentRow {
            user_id: user_id.to_string(),
            fullname: fullname.to_string(),
        })?;
        Ok(true)
    }

    /// Checks whether a user ID is registered.
    pub fn user_exists(&self, user_id: &str) -> Result<bool> {
        Ok(self.get_user_fullname(user_id)?.is_some())
    }

    /// Looks up a registered user's full name.
    pub fn get_user_fullname(&self, user_id: &str) -> Result<Option<String>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare("SELECT fullname FROM students WHERE user_id = ?1")?;
        let mut rows = stmt.query_map([user_id], |row| row.get::<_, String>(0))?;
        rows.next().transpose()
    }
}

fn insert_lesson_stmt(conn: &Connection, lesson: &LessonRow) -> Result<()> {
    conn.execute(
        "INSERT INTO lessons (name, rasp_item_id, teacher, auditory, start_time, end_time, groups)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        (
            &lesson.name,
            &lesson.rasp_item_id,
            &lesson.teacher,
            &lesson.auditory,
            &lesson.start_time,
            &lesson.end_time,
            encode_json_list(&lesson.groups),
        ),
    )?;
    Ok(())
}

fn insert_group_stmt(conn: &Connection, group: &GroupRow) -> Result<()> {
    conn.execute(
        "INSERT INTO groups (group_id, students) VALUES (?1, ?2)",
        (&group.group_id, encode_json_list(&group.students)),
    )?;
    Ok(())
}

fn encode_json_list(items: &[String]) -> String {
    // Serializing Vec<String> cannot fail.
    serde_json::to_string(items).unwrap()
}

fn decode_json_list(raw: String) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(name: &str, start: &str, groups: &[&str]) -> LessonRow {
        LessonRow {
            name: name.to_string(),
            rasp_item_id: "100".to_string(),
            teacher: "None".to_string(),
            auditory: "a101".to_string(),
            start_time: start.to_string(),
            end_time: start.to_string(),
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    #[test]
    fn test_lesson_insert_select_round_trip() {
        let store = ScheduleStore::open_in_memory().unwrap();
        let row = lesson("Math", "2024-05-01T09:00:00+03:00", &["1062", "1063"]);
        store.insert_lesson(&row).unwrap();

        let rows = store.select_lessons().unwrap();
        assert_eq!(rows, vec![row]);
    }

    #[test]
    fn test_replace_lessons_has_replace_semantics() {
        let store = ScheduleStore::open_in_memory().unwrap();
        store
            .replace_lessons(&[
                lesson("A", "2024-05-01T09:00:00", &["g1"]),
                lesson("B", "2024-05-01T11:00:00", &["g1"]),
            ])
            .unwrap();
        store
            .replace_lessons(&[lesson("C", "2024-05-02T09:00:00", &["g2"])])
            .unwrap();

        let rows = store.select_lessons().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "C");
    }

    #[test]
    fn test_register_user_is_idempotent() {
        let store = ScheduleStore::open_in_memory().unwrap();
        assert!(store.register_user("U1", "Ivan Petrov").unwrap());
        assert!(!store.register_user("U1", "Somebody Else").unwrap());

        assert_eq!(
            store.get_user_fullname("U1").unwrap().as_deref(),
            Some("Ivan Petrov")
        );
        assert_eq!(store.get_user_fullname("U2").unwrap(), None);
        assert_eq!(store.select_students().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_where_and_clear() {
        let store = ScheduleStore::open_in_memory().unwrap();
        store
            .insert_group(&GroupRow {
                group_id: "G1".to_string(),
                students: vec!["A".to_string()],
            })
            .unwrap();
        store
            .insert_group(&GroupRow {
                group_id: "G2".to_string(),
                students: vec![],
            })
            .unwrap();

        assert_eq!(store.delete_where(Table::Groups, "group_id", "G1").unwrap(), 1);
        assert_eq!(store.select_groups().unwrap().len(), 1);

        store.clear(Table::Groups).unwrap();
        assert!(store.select_groups().unwrap().is_empty());
    }

    #[test]
    fn test_delete_where_rejects_unknown_column() {
        let store = ScheduleStore::open_in_memory().unwrap();
        assert!(store
            .delete_where(Table::Groups, "students; DROP TABLE groups", "x")
            .is_err());
    }
}
