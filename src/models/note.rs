//! Notes attached to contacts.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;

/// Accepted spellings of the note body, lowest precedence first.
const BODY_ALIASES: [&str; 4] = ["note_body", "note_text", "content", "text"];

/// Processing state of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteStatus {
    Pending,
    Processed,
}

impl NoteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            NoteStatus::Pending => "pending",
            NoteStatus::Processed => "processed",
        }
    }
}

/// Note record.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Note {
    pub id: i64,
    pub contact_id: i64,
    pub user_id: i64,
    pub body: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Extract the note body from a request payload.
///
/// `body` is used unless one of the aliases is present; among aliases the
/// last one in [`BODY_ALIASES`] wins. A present alias with a non-string
/// value counts as missing.
pub fn normalize_note_body(payload: &Value) -> Option<String> {
    let object = payload.as_object()?;

    let mut body = object.get("body");
    for alias in BODY_ALIASES {
        if let Some(value) = object.get(alias) {
            body = Some(value);
        }
    }

    body.and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

const COLUMNS: &str = "id, contact_id, user_id, body, status, created_at, updated_at";

impl Note {
    pub async fn list_for_contact(
        pool: &PgPool,
        contact_id: i64,
        user_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Note>(&format!(
            "SELECT {COLUMNS} FROM notes WHERE contact_id = $1 AND user_id = $2 \
             ORDER BY created_at DESC"
        ))
        .bind(contact_id)
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_owned(
        pool: &PgPool,
        id: i64,
        contact_id: i64,
        user_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Note>(
            r#"
            SELECT n.id, n.contact_id, n.user_id, n.body, n.status, n.created_at, n.updated_at
            FROM notes n
            JOIN contacts c ON c.id = n.contact_id
            WHERE n.id = $1 AND n.contact_id = $2 AND c.user_id = $3
            "#,
        )
        .bind(id)
        .bind(contact_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &PgPool,
        contact_id: i64,
        user_id: i64,
        body: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Note>(&format!(
            "INSERT INTO notes (contact_id, user_id, body, status) VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        ))
        .bind(contact_id)
        .bind(user_id)
        .bind(body)
        .bind(NoteStatus::Pending.as_str())
        .fetch_one(pool)
        .await
    }

    pub async fn update_body(
        pool: &PgPool,
        id: i64,
        user_id: i64,
        body: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Note>(&format!(
            "UPDATE notes SET body = $3, updated_at = CURRENT_TIMESTAMP \
             WHERE id = $1 AND user_id = $2 RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(body)
        .fetch_optional(pool)
        .await
    }

    pub async fn set_status(
        pool: &PgPool,
        id: i64,
        status: NoteStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Note>(&format!(
            "UPDATE notes SET status = $2, updated_at = CURRENT_TIMESTAMP \
             WHERE id = $1 RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_body() {
        assert_eq!(
            normalize_note_body(&json!({ "body": " call back " })).as_deref(),
            Some("call back")
        );
    }

    #[test]
    fn test_later_alias_wins() {
        let payload = json!({ "body": "a", "note_body": "b", "content": "c" });
        assert_eq!(normalize_note_body(&payload).as_deref(), Some("c"));

        let payload = json!({ "note_text": "x", "text": "y" });
        assert_eq!(normalize_note_body(&payload).as_deref(), Some("y"));
    }

    #[test]
    fn test_null_alias_counts_as_present() {
        let payload = json!({ "body": "kept?", "text": null });
        assert_eq!(normalize_note_body(&payload), None);
    }

    #[test]
    fn test_missing_or_blank_body() {
        assert_eq!(normalize_note_body(&json!({})), None);
        assert_eq!(normalize_note_body(&json!({ "body": "   " })), None);
        assert_eq!(normalize_note_body(&json!("body")), None);
    }
}
