//! Background note processing.

use sqlx::PgPool;

use crate::models::{Note, NoteStatus};

/// Mark a freshly created note as processed.
///
/// Returns the updated note, or `None` if it was deleted in the meantime.
pub async fn process_note(pool: &PgPool, note: &Note) -> Result<Option<Note>, sqlx::Error> {
    tracing::debug!(note_id = note.id, contact_id = note.contact_id, "Processing note");
    let processed = Note::set_status(pool, note.id, NoteStatus::Processed).await?;
    if processed.is_some() {
        tracing::info!(note_id = note.id, "Note processed");
    }
    Ok(processed)
}
