//! Contacts owned by a user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::PgPool;

const COLUMNS: &str = "id, user_id, first_name, last_name, email, phone, company, \
                       job_title, address, created_at, updated_at";

/// Contact record.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Contact {
    pub id: i64,
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of a create request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewContact {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub address: Option<String>,
}

impl NewContact {
    /// Trimmed first and last name, when both are present and non-blank.
    pub fn names(&self) -> Option<(&str, &str)> {
        let first = self.first_name.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let last = self.last_name.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some((first, last))
    }
}

/// Body of an update request.
///
/// Optional fields distinguish an absent key (`None`, keep) from an explicit
/// `null` (`Some(None)`, clear).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub company: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub job_title: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl ContactUpdate {
    /// Merge this update onto an existing contact.
    pub fn apply(&self, mut contact: Contact) -> Contact {
        if let Some(first) = non_blank(self.first_name.as_ref()) {
            contact.first_name = first;
        }
        if let Some(last) = non_blank(self.last_name.as_ref()) {
            contact.last_name = last;
        }
        for (field, update) in [
            (&mut contact.email, &self.email),
            (&mut contact.phone, &self.phone),
            (&mut contact.company, &self.company),
            (&mut contact.job_title, &self.job_title),
            (&mut contact.address, &self.address),
        ] {
            if let Some(value) = update {
                *field = value.clone();
            }
        }
        contact
    }
}

fn list_for_user_sql() -> String {
    format!("SELECT {COLUMNS} FROM contacts WHERE user_id = $1 ORDER BY created_at DESC")
}

impl Contact {
    /// Newest first.
    pub async fn list_for_user(pool: &PgPool, user_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Contact>(&list_for_user_sql())
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Fetch a contact only if it belongs to `user_id`.
    pub async fn find_owned(
        pool: &PgPool,
        id: i64,
        user_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Contact>(&format!(
            "SELECT {COLUMNS} FROM contacts WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &PgPool,
        user_id: i64,
        first_name: &str,
        last_name: &str,
        input: &NewContact,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Contact>(&format!(
            r#"
            INSERT INTO contacts
                (user_id, first_name, last_name, email, phone, company, job_title, address)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(first_name)
        .bind(last_name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.company)
        .bind(&input.job_title)
        .bind(&input.address)
        .fetch_one(pool)
        .await
    }

    /// Persist every mutable column of `self`.
    pub async fn save(&self, pool: &PgPool) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Contact>(&format!(
            r#"
            UPDATE contacts
            SET first_name = $3, last_name = $4, email = $5, phone = $6,
                company = $7, job_title = $8, address = $9,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND user_id = $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(self.id)
        .bind(self.user_id)
        .bind(&self.first_name)
        .bind(&self.last_name)
        .bind(&self.email)
        .bind(&self.phone)
        .bind(&self.company)
        .bind(&self.job_title)
        .bind(&self.address)
        .fetch_optional(pool)
        .await
    }

    /// Returns true when a row was removed.
    pub async fn delete(pool: &PgPool, id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM contacts WHERE id = $1 AND user_id = $2")
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

    fn contact() -> Contact {
        let now = Utc::now();
        Contact {
            id: 1,
            user_id: 7,
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: Some("ada@example.com".into()),
            phone: Some("555-0100".into()),
            company: None,
            job_title: None,
            address: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_list_is_newest_first() {
        assert!(list_for_user_sql().ends_with("ORDER BY created_at DESC"));
    }

    #[test]
    fn test_absent_keeps_null_clears() {
        let update: ContactUpdate =
            serde_json::from_str(r#"{"phone": null, "company": "Analytical Engines"}"#).unwrap();
        let merged = update.apply(contact());

        assert_eq!(merged.email.as_deref(), Some("ada@example.com"));
        assert_eq!(merged.phone, None);
        assert_eq!(merged.company.as_deref(), Some("Analytical Engines"));
    }

    #[test]
    fn test_blank_names_fall_back() {
        let update: ContactUpdate =
            serde_json::from_str(r#"{"first_name": "  ", "last_name": "King"}"#).unwrap();
        let merged = update.apply(contact());

        assert_eq!(merged.first_name, "Ada");
        assert_eq!(merged.last_name, "King");
    }

    #[test]
    fn test_new_contact_requires_both_names() {
        let input: NewContact = serde_json::from_str(r#"{"first_name": "Ada"}"#).unwrap();
        assert!(input.names().is_none());

        let input: NewContact =
            serde_json::from_str(r#"{"first_name": " Ada ", "last_name": "Lovelace"}"#).unwrap();
        assert_eq!(input.names(), Some(("Ada", "Lovelace")));
    }
}
