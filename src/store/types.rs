//! Row types and table identifiers for the schedule store.

use serde::Serialize;

/// One lesson as stored locally. The lessons table is fully replaced on
/// every refresh cycle, so rows have no identity across cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LessonRow {
    pub name: String,
    pub rasp_item_id: String,
    /// Teacher name; the sentinel `"None"` when upstream sends an
    /// empty string.
    pub teacher: String,
    pub auditory: String,
    pub start_time: String,
    pub end_time: String,
    /// Group IDs this lesson belongs to, in upstream order.
    pub groups: Vec<String>,
}

/// One group roster. Replaced wholesale on its own refresh interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRow {
    pub group_id: String,
    /// Member full names, in upstream order. Membership checks are
    /// exact string comparisons against these.
    pub students: Vec<String>,
}

/// One registered user. Append-only; never touched by refresh cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentRow {
    pub user_id: String,
    pub fullname: String,
}

/// The three tables managed by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Lessons,
    Groups,
    Students,
}

impl Table {
    /// Name of the backing sqlite table.
    pub fn sql_name(&self) -> &'static str {
        match self {
            Table::Lessons => "lessons",
            Table::Groups => "groups",
            Table::Students => "students",
        }
    }

    /// Display name used as the top-level key in snapshot files.
    pub fn display_name(&self) -> &'static str {
        match self {
            Table::Lessons => "Lessons",
            Table::Groups => "Groups",
            Table::Students => "Students",
        }
    }

    /// Columns that may be used in `delete_where` predicates.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Table::Lessons => &[
                "name",
                "rasp_item_id",
                "teacher",
                "auditory",
                "start_time",
                "end_time",
            ],
            Table::Groups => &["group_id"],
            Table::Students => &["user_id", "fullname"],
        }
    }

    /// All tables, in snapshot order.
    pub fn all() -> [Table; 3] {
        [Table::Lessons, Table::Groups, Table::Students]
    }

    /// Maps a snapshot key back to a table, case-insensitively.
    pub fn from_display_name(name: &str) -> Option<Table> {
        match name.to_lowercase().as_str() {
            "lessons" => Some(Table::Lessons),
            "groups" => Some(Table::Groups),
            "students" => Some(Table::Students),
            _ => None,
        }
    }
}
