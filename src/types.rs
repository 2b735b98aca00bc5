//! Core types shared by the store, the REST API, and the board client.

use crate::error::ApiError;
use heck::ToKebabCase;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Slugs of the default columns. These can never be deleted.
pub const PROTECTED_SLUGS: [&str; 3] = ["todo", "doing", "done"];

/// Slug of the column new tasks land in when no column is given.
pub const DEFAULT_TASK_COLUMN: &str = "todo";

/// Fallback column color.
pub const DEFAULT_COLUMN_COLOR: &str = "#eef2f7";

static COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid color regex"));

/// A board column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub color: String,
    pub ord: i64,
}

impl Column {
    /// Negative ids are client-side placeholders with no backing row.
    pub fn is_unsaved(&self) -> bool {
        is_placeholder(self.id)
    }

    /// Default columns are identified by slug and never deletable.
    pub fn is_protected(&self) -> bool {
        is_protected_slug(&self.slug)
    }
}

/// A task, joined with its owning column's metadata when read from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub column_id: i64,
    pub ord: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Task {
    pub fn is_unsaved(&self) -> bool {
        is_placeholder(self.id)
    }

    /// Copy the display fields a task inherits from its column.
    pub fn inherit_from(&mut self, column: &Column) {
        self.column_id = column.id;
        self.column_slug = Some(column.slug.clone());
        self.column_title = Some(column.title.clone());
        self.color = Some(column.color.clone());
    }
}

/// Body of `POST /api/columns`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewColumn {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Body of `PUT /api/columns/:id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Body of `POST /api/tasks`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_id: Option<i64>,
}

/// Body of `PUT /api/tasks/:id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_id: Option<i64>,
}

/// One element of `PUT /api/reorderColumns`. Position in the array is
/// authoritative; `ord` is informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderColumnEntry {
    pub id: i64,
    #[serde(default)]
    pub ord: i64,
}

impl From<&Column> for ReorderColumnEntry {
    fn from(column: &Column) -> Self {
        Self {
            id: column.id,
            ord: column.ord,
        }
    }
}

/// One element of `PUT /api/reorderTasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderTaskEntry {
    pub id: i64,
    pub column_id: i64,
    #[serde(default)]
    pub title: String,
    pub ord: i64,
}

impl From<&Task> for ReorderTaskEntry {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            column_id: task.column_id,
            title: task.title.clone(),
            ord: task.ord,
        }
    }
}

pub fn is_placeholder(id: i64) -> bool {
    id < 0
}

pub fn is_protected_slug(slug: &str) -> bool {
    PROTECTED_SLUGS.contains(&slug)
}

/// Derive the stable lowercase slug for a column title.
pub fn slugify(title: &str) -> String {
    title.trim().to_kebab_case()
}

/// The single rule for duplicate column titles, used by both the client
/// session and the store: equal ignoring case, or colliding slugs.
/// `except` skips the column being renamed.
pub fn title_conflicts<'a>(
    columns: impl IntoIterator<Item = &'a Column>,
    title: &str,
    except: Option<i64>,
) -> bool {
    let wanted = title.trim().to_lowercase();
    let slug = slugify(title);
    columns
        .into_iter()
        .filter(|c| Some(c.id) != except)
        .any(|c| c.title.trim().to_lowercase() == wanted || c.slug == slug)
}

/// Validate a column title and return its trimmed form.
pub fn validate_column_title(title: Option<&str>) -> Result<String, ApiError> {
    let title = title.map(str::trim).unwrap_or_default();
    if title.is_empty() {
        return Err(ApiError::missing_field("title"));
    }
    if slugify(title).is_empty() {
        return Err(ApiError::invalid_value(
            "title",
            "title must contain at least one letter or digit",
        ));
    }
    Ok(title.to_string())
}

/// Validate a task title and return its trimmed form.
pub fn validate_task_title(title: Option<&str>) -> Result<String, ApiError> {
    match title.map(str::trim) {
        Some(t) if !t.is_empty() => Ok(t.to_string()),
        _ => Err(ApiError::missing_field("title")),
    }
}

/// Colors are `#rrggbb` hex strings.
pub fn validate_color(color: &str) -> Result<(), ApiError> {
    if COLOR_RE.is_match(color) {
        Ok(())
    } else {
        Err(ApiError::invalid_value(
            "color",
            format!("color must be a #rrggbb hex value, got '{}'", color),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(id: i64, title: &str, slug: &str) -> Column {
        Column {
            id,
            title: title.to_string(),
            slug: slug.to_string(),
            color: DEFAULT_COLUMN_COLOR.to_string(),
            ord: id,
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("To Do"), "to-do");
        assert_eq!(slugify("  Code Review "), "code-review");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_title_conflicts_ignores_case_and_matches_slug() {
        let cols = vec![column(1, "To Do", "todo"), column(2, "Code Review", "code-review")];
        assert!(title_conflicts(&cols, "to do", None));
        assert!(title_conflicts(&cols, "code_review", None));
        assert!(title_conflicts(&cols, "todo", None));
        assert!(!title_conflicts(&cols, "Blocked", None));
        // Renaming a column to its own title is not a conflict
        assert!(!title_conflicts(&cols, "Code review", Some(2)));
    }

    #[test]
    fn test_validate_column_title() {
        assert_eq!(validate_column_title(Some(" Backlog ")).unwrap(), "Backlog");
        assert!(validate_column_title(None).is_err());
        assert!(validate_column_title(Some("   ")).is_err());
        assert!(validate_column_title(Some("???")).is_err());
    }

    #[test]
    fn test_validate_color() {
        assert!(validate_color("#eef2f7").is_ok());
        assert!(validate_color("#E6F4FF").is_ok());
        assert!(validate_color("red").is_err());
        assert!(validate_color("#fff").is_err());
    }

    #[test]
    fn test_new_task_body_shape() {
        let body = NewTask {
            title: Some("Buy milk".to_string()),
            column_id: Some(1),
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"title":"Buy milk","column_id":1}"#
        );
    }

    #[test]
    fn test_placeholder_ids() {
        assert!(is_placeholder(-1));
        assert!(!is_placeholder(1));
        assert!(column(1, "To Do", "todo").is_protected());
        assert!(!column(4, "Review", "review").is_protected());
    }
}
