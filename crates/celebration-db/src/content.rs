use celebration_common::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageRecord {
    pub id: i64,
    pub name: String,
    pub relationship: Option<String>,
    pub message: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub name: String,
    pub relationship: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryRecord {
    pub id: i64,
    pub name: String,
    pub caption: Option<String>,
    pub image_url: String,
    pub cloudinary_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub storage_type: Option<String>,
    pub file_size: Option<i64>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DonationStats {
    pub total_raised: f64,
    pub donor_count: i64,
}

pub fn list_messages(conn: &Connection, limit: u32, offset: u32) -> Result<Vec<MessageRecord>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, relationship, message, created_at FROM messages
             ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
        )
        .map_err(|e| Error::Database(format!("failed to prepare message query: {e}")))?;

    stmt.query_map(params![limit, offset], message_from_row)
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
        .map_err(|e| Error::Database(format!("failed to list messages: {e}")))
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRecord> {
    Ok(MessageRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        relationship: row.get(2)?,
        message: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn insert_message(conn: &Connection, message: &NewMessage) -> Result<i64> {
    if message.name.trim().is_empty() || message.message.trim().is_empty() {
        return Err(Error::InvalidInput("name and message required".into()));
    }
    conn.execute(
        "INSERT INTO messages (name, relationship, message) VALUES (?1, ?2, ?3)",
        params![
            message.name,
            message.relationship.as_deref().unwrap_or(""),
            message.message
        ],
    )
    .map_err(|e| Error::Database(format!("failed to insert message: {e}")))?;
    Ok(conn.last_insert_rowid())
}

/// `kind` of `None` or `"all"` lists every memory type.
pub fn list_memories(
    conn: &Connection,
    kind: Option<&str>,
    limit: u32,
    offset: u32,
) -> Result<Vec<MemoryRecord>> {
    let kind = kind.filter(|k| *k != "all");
    let mut stmt = conn
        .prepare(
            "SELECT id, name, caption, image_url, cloudinary_id, type, storage_type, file_size, created_at
             FROM memories
             WHERE ?1 IS NULL OR type = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3",
        )
        .map_err(|e| Error::Database(format!("failed to prepare memory query: {e}")))?;

    stmt.query_map(params![kind, limit, offset], |row| {
        Ok(MemoryRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            caption: row.get(2)?,
            image_url: row.get(3)?,
            cloudinary_id: row.get(4)?,
            kind: row.get(5)?,
            storage_type: row.get(6)?,
            file_size: row.get(7)?,
            created_at: row.get(8)?,
        })
    })
    .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
    .map_err(|e| Error::Database(format!("failed to list memories: {e}")))
}

/// Text memories have no image; the message is stored as the caption.
pub fn insert_text_memory(conn: &Connection, name: &str, message: &str) -> Result<i64> {
    if name.trim().is_empty() || message.trim().is_empty() {
        return Err(Error::InvalidInput("name and message required".into()));
    }
    conn.execute(
        "INSERT INTO memories (name, caption, image_url, type) VALUES (?1, ?2, '', 'text')",
        params![name, message],
    )
    .map_err(|e| Error::Database(format!("failed to insert memory: {e}")))?;
    Ok(conn.last_insert_rowid())
}

pub fn delete_memory(conn: &Connection, id: i64) -> Result<()> {
    let existing: Option<i64> = conn
        .query_row("SELECT id FROM memories WHERE id = ?1", [id], |row| {
            row.get(0)
        })
        .optional()
        .map_err(|e| Error::Database(format!("failed to look up memory {id}: {e}")))?;

    if existing.is_none() {
        return Err(Error::NotFound(format!("memory {id}")));
    }

    conn.execute("DELETE FROM memories WHERE id = ?1", [id])
        .map_err(|e| Error::Database(format!("failed to delete memory {id}: {e}")))?;
    Ok(())
}

/// Totals over completed donations only.
pub fn donation_stats(conn: &Connection) -> Result<DonationStats> {
    conn.query_row(
        "SELECT COALESCE(SUM(amount), 0.0), COUNT(DISTINCT donor_email)
         FROM donations WHERE status = 'completed'",
        [],
        |row| {
            Ok(DonationStats {
                total_raised: row.get(0)?,
                donor_count: row.get(1)?,
            })
        },
    )
    .map_err(|e| Error::Database(format!("failed to compute donation stats: {e}")))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GalleryFolder {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub icon: Option<String>,
    pub gradient: Option<String>,
    pub description: Option<String>,
    pub image_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GalleryImage {
    pub id: i64,
    pub folder_name: String,
    pub image_url: String,
    pub cloudinary_id: Option<String>,
    pub order_index: Option<i64>,
    pub created_at: Option<String>,
}

/// A guest withdrawing or changing an RSVP.
#[derive(Debug, Clone, Default)]
pub struct NewCancellation {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub request_type: String,
    pub number_of_guests: Option<i64>,
    pub reason: String,
    pub zoom_interest: bool,
    pub future_updates: bool,
}

pub fn list_gallery_folders(conn: &Connection) -> Result<Vec<GalleryFolder>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, display_name, icon, gradient, description, image_count
             FROM gallery_folders ORDER BY display_name",
        )
        .map_err(|e| Error::Database(format!("failed to prepare folder query: {e}")))?;

    stmt.query_map([], |row| {
        Ok(GalleryFolder {
            id: row.get(0)?,
            name: row.get(1)?,
            display_name: row.get(2)?,
            icon: row.get(3)?,
            gradient: row.get(4)?,
            description: row.get(5)?,
            image_count: row.get(6)?,
        })
    })
    .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
    .map_err(|e| Error::Database(format!("failed to list gallery folders: {e}")))
}

pub fn list_gallery_images(conn: &Connection, folder: &str) -> Result<Vec<GalleryImage>> {
    if folder.trim().is_empty() {
        return Err(Error::InvalidInput("folder name required".into()));
    }
    let mut stmt = conn
        .prepare(
            "SELECT id, folder_name, image_url, cloudinary_id, order_index, created_at
             FROM gallery_images WHERE folder_name = ?1 ORDER BY order_index, id",
        )
        .map_err(|e| Error::Database(format!("failed to prepare image query: {e}")))?;

    stmt.query_map([folder], |row| {
        Ok(GalleryImage {
            id: row.get(0)?,
            folder_name: row.get(1)?,
            image_url: row.get(2)?,
            cloudinary_id: row.get(3)?,
            order_index: row.get(4)?,
            created_at: row.get(5)?,
        })
    })
    .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
    .map_err(|e| Error::Database(format!("failed to list images in {folder}: {e}")))
}

pub fn insert_cancellation(conn: &Connection, request: &NewCancellation) -> Result<i64> {
    let required = [
        &request.first_name,
        &request.last_name,
        &request.email,
        &request.request_type,
        &request.reason,
    ];
    if required.iter().any(|field| field.trim().is_empty()) {
        return Err(Error::InvalidInput("missing required fields".into()));
    }

    conn.execute(
        "INSERT INTO cancellations
             (first_name, last_name, email, phone, request_type, number_of_guests,
              reason, zoom_interest, future_updates)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            request.first_name,
            request.last_name,
            request.email,
            request.phone.as_deref().unwrap_or(""),
            request.request_type,
            request.number_of_guests.unwrap_or(0),
            request.reason,
            request.zoom_interest,
            request.future_updates,
        ],
    )
    .map_err(|e| Error::Database(format!("failed to record cancellation: {e}")))?;
    Ok(conn.last_insert_rowid())
}

/// Mark the donation paid with `payment_id` as completed. Returns the number
/// of donations updated; an unknown id updates nothing.
pub fn confirm_donation(conn: &Connection, payment_id: &str) -> Result<usize> {
    if payment_id.trim().is_empty() {
        return Err(Error::InvalidInput("payment id required".into()));
    }
    conn.execute(
        "UPDATE donations SET status = 'completed' WHERE stripe_payment_id = ?1",
        [payment_id],
    )
    .map_err(|e| Error::Database(format!("failed to confirm donation {payment_id}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::SchemaMigrator;
    use crate::store::Store;

    fn fresh_store() -> Store {
        let mut store = Store::in_memory().expect("failed to open in-memory store");
        store.init_schema().expect("schema should apply");
        SchemaMigrator::memories()
            .apply(store.connection_mut())
            .expect("migration should run");
        store
    }

    #[test]
    fn messages_insert_and_list_newest_first() {
        let store = fresh_store();
        let conn = store.connection();
        for name in ["Ana", "Ben", "Cy"] {
            insert_message(
                conn,
                &NewMessage {
                    name: name.to_string(),
                    relationship: None,
                    message: format!("hello from {name}"),
                },
            )
            .expect("insert message");
        }

        let page = list_messages(conn, 2, 0).expect("list");
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].name, "Cy");
        assert_eq!(page[0].relationship.as_deref(), Some(""));

        let rest = list_messages(conn, 10, 2).expect("list");
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].name, "Ana");
    }

    #[test]
    fn blank_message_is_rejected() {
        let store = fresh_store();
        let err = insert_message(
            store.connection(),
            &NewMessage {
                name: "  ".to_string(),
                relationship: None,
                message: "hi".to_string(),
            },
        )
        .expect_err("blank name should fail");
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn memories_filter_by_type_and_delete() {
        let store = fresh_store();
        let conn = store.connection();
        conn.execute(
            "INSERT INTO memories (name, image_url) VALUES ('Ana', 'https://img/1.jpg')",
            [],
        )
        .expect("insert photo");
        let text_id = insert_text_memory(conn, "Ben", "Remember the lake?").expect("insert");

        let all = list_memories(conn, Some("all"), 20, 0).expect("list all");
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].storage_type.as_deref(), Some("cloudinary"));

        let texts = list_memories(conn, Some("text"), 20, 0).expect("list text");
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].caption.as_deref(), Some("Remember the lake?"));

        delete_memory(conn, text_id).expect("delete");
        assert!(matches!(
            delete_memory(conn, text_id),
            Err(Error::NotFound(_))
        ));
        assert_eq!(list_memories(conn, None, 20, 0).expect("list").len(), 1);
    }

    #[test]
    fn stats_count_completed_donations_only() {
        let store = fresh_store();
        store
            .connection()
            .execute_batch(
                "INSERT INTO donations (donor_name, donor_email, amount, status)
                     VALUES ('Ana', 'ana@example.org', 50.0, 'completed');
                 INSERT INTO donations (donor_name, donor_email, amount, status)
                     VALUES ('Ana', 'ana@example.org', 25.5, 'completed');
                 INSERT INTO donations (donor_name, donor_email, amount, status)
                     VALUES ('Ben', 'ben@example.org', 100.0, 'pending');",
            )
            .expect("seed donations");

        let stats = donation_stats(store.connection()).expect("stats");
        assert_eq!(stats.total_raised, 75.5);
        assert_eq!(stats.donor_count, 1);
    }

    #[test]
    fn stats_on_empty_table_are_zero() {
        let store = fresh_store();
        let stats = donation_stats(store.connection()).expect("stats");
        assert_eq!(stats.total_raised, 0.0);
        assert_eq!(stats.donor_count, 0);
    }

    fn seed_gallery(conn: &Connection) {
        conn.execute_batch(
            "INSERT INTO gallery_folders (name, display_name) VALUES ('wedding', 'Wedding');
             INSERT INTO gallery_folders (name, display_name, icon) VALUES ('beach', 'At the beach', 'fa-sun');
             INSERT INTO gallery_images (folder_name, image_url, order_index) VALUES ('wedding', 'https://img/w2.jpg', 2);
             INSERT INTO gallery_images (folder_name, image_url, order_index) VALUES ('wedding', 'https://img/w1.jpg', 1);
             INSERT INTO gallery_images (folder_name, image_url, order_index) VALUES ('beach', 'https://img/b1.jpg', 0);",
        )
        .expect("seed gallery");
    }

    #[test]
    fn gallery_folders_sort_by_display_name() {
        let store = fresh_store();
        seed_gallery(store.connection());

        let folders = list_gallery_folders(store.connection()).expect("list folders");
        let names: Vec<&str> = folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["beach", "wedding"]);
        assert_eq!(folders[0].icon.as_deref(), Some("fa-sun"));
        assert_eq!(folders[1].gradient.as_deref(), Some("folder-solo"));
    }

    #[test]
    fn gallery_images_filter_by_folder_in_order() {
        let store = fresh_store();
        seed_gallery(store.connection());

        let images = list_gallery_images(store.connection(), "wedding").expect("list images");
        let urls: Vec<&str> = images.iter().map(|i| i.image_url.as_str()).collect();
        assert_eq!(urls, vec!["https://img/w1.jpg", "https://img/w2.jpg"]);

        assert!(
            list_gallery_images(store.connection(), "missing")
                .expect("list images")
                .is_empty()
        );
        assert!(matches!(
            list_gallery_images(store.connection(), " "),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn cancellation_requires_every_mandatory_field() {
        let store = fresh_store();
        let mut request = NewCancellation {
            first_name: "Ana".to_string(),
            last_name: "Silva".to_string(),
            email: "ana@example.org".to_string(),
            request_type: "cancel".to_string(),
            reason: "Travel plans changed".to_string(),
            number_of_guests: Some(2),
            zoom_interest: true,
            ..Default::default()
        };

        let id = insert_cancellation(store.connection(), &request).expect("insert");
        let (phone, guests, zoom, updates): (String, i64, bool, bool) = store
            .connection()
            .query_row(
                "SELECT phone, number_of_guests, zoom_interest, future_updates
                 FROM cancellations WHERE id = ?1",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .expect("read cancellation");
        assert_eq!((phone.as_str(), guests, zoom, updates), ("", 2, true, false));

        request.reason = String::new();
        assert!(matches!(
            insert_cancellation(store.connection(), &request),
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(store.row_count("cancellations").expect("count"), 1);
    }

    #[test]
    fn confirming_a_donation_counts_toward_stats() {
        let store = fresh_store();
        let conn = store.connection();
        conn.execute(
            "INSERT INTO donations (donor_name, donor_email, amount, stripe_payment_id)
             VALUES ('Ana', 'ana@example.org', 40.0, 'pi_123')",
            [],
        )
        .expect("seed pending donation");
        assert_eq!(donation_stats(conn).expect("stats").donor_count, 0);

        assert_eq!(confirm_donation(conn, "pi_123").expect("confirm"), 1);
        assert_eq!(confirm_donation(conn, "pi_unknown").expect("confirm"), 0);
        assert!(matches!(
            confirm_donation(conn, ""),
            Err(Error::InvalidInput(_))
        ));

        let stats = donation_stats(conn).expect("stats");
        assert_eq!(stats.total_raised, 40.0);
        assert_eq!(stats.donor_count, 1);
    }
}
