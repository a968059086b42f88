//! Quality profile and custom format storage.
//!
//! `items`, `format_items` and `specifications` are JSON columns; the scorer
//! deserializes them lazily via [`Database::load_profile`] and
//! [`Database::load_custom_formats`].

use crate::error::DatabaseError;
use crate::scoring::{CustomFormat, FormatItem, QualityItem, QualityProfile};
use crate::{Error, Result};

use super::{CustomFormatRow, Database, QualityProfileRow};

impl Database {
    /// Insert a quality profile, serializing the item lists to JSON
    pub async fn insert_profile(&self, profile: &QualityProfile) -> Result<i64> {
        let items = serde_json::to_string(&profile.items)?;
        let format_items = serde_json::to_string(&profile.format_items)?;

        let result = sqlx::query(
            r#"
            INSERT INTO quality_profiles (name, items, cutoff, format_items, min_format_score)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&profile.name)
        .bind(&items)
        .bind(&profile.cutoff)
        .bind(&format_items)
        .bind(profile.min_format_score)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert profile: {}",
                e
            )))
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Load a profile by id, deserializing the JSON columns
    pub async fn load_profile(&self, id: i64) -> Result<Option<QualityProfile>> {
        let row = sqlx::query_as::<_, QualityProfileRow>(
            "SELECT id, name, items, cutoff, format_items, min_format_score \
             FROM quality_profiles WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to load profile: {}",
                e
            )))
        })?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items: Vec<QualityItem> = serde_json::from_str(&row.items)?;
        let format_items: Vec<FormatItem> = serde_json::from_str(&row.format_items)?;

        Ok(Some(QualityProfile {
            id: row.id,
            name: row.name,
            items,
            cutoff: row.cutoff,
            format_items,
            min_format_score: row.min_format_score,
        }))
    }

    /// Insert a custom format, serializing the specifications to JSON
    pub async fn insert_custom_format(&self, format: &CustomFormat) -> Result<i64> {
        let specifications = serde_json::to_string(&format.specifications)?;

        let result = sqlx::query(
            "INSERT INTO custom_formats (name, specifications) VALUES (?, ?)",
        )
        .bind(&format.name)
        .bind(&specifications)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert custom format: {}",
                e
            )))
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Load every custom format.
    ///
    /// Rows with unparseable specification JSON are skipped with a warning
    /// rather than failing the whole load.
    pub async fn load_custom_formats(&self) -> Result<Vec<CustomFormat>> {
        let rows = sqlx::query_as::<_, CustomFormatRow>(
            "SELECT id, name, specifications FROM custom_formats ORDER BY id ASC",
        )
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to load custom formats: {}",
                e
            )))
        })?;

        let mut formats = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_str(&row.specifications) {
                Ok(specifications) => formats.push(CustomFormat {
                    id: row.id,
                    name: row.name,
                    specifications,
                }),
                Err(e) => {
                    tracing::warn!(format = %row.name, error = %e, "Skipping custom format with bad JSON");
                }
            }
        }

        Ok(formats)
    }
}
