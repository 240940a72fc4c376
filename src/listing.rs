use chrono::{DateTime, Local, Utc};

use crate::models::{ObjectMetadata, StoredObject, UPLOADED_DATE_KEY};
use crate::storage::human_readable_size;

/// Label shown for objects that were never stamped with an upload date
pub const NO_DATE_LABEL: &str = "no upload date";

/// Parse the `uploadedDate` custom metadata, if present and well-formed
pub fn uploaded_at(meta: &ObjectMetadata) -> Option<DateTime<Utc>> {
    meta.custom_metadata
        .get(UPLOADED_DATE_KEY)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn date_label(uploaded_at: Option<DateTime<Utc>>) -> String {
    match uploaded_at {
        Some(dt) => dt
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => NO_DATE_LABEL.to_string(),
    }
}

pub fn to_stored_object(meta: ObjectMetadata, download_url: String) -> StoredObject {
    let uploaded_at = uploaded_at(&meta);
    StoredObject {
        date_label: date_label(uploaded_at),
        uploaded_at,
        download_url,
        size_human: human_readable_size(meta.size),
        size: meta.size,
        content_type: meta.content_type,
        full_path: meta.full_path,
        name: meta.name,
    }
}

/// Newest first; undated objects are treated as the epoch and sink to the end.
/// The sort is stable, so ties keep the order the backend listed them in.
pub fn sort_newest_first(files: &mut [StoredObject]) {
    files.sort_by(|a, b| {
        let a_date = a.uploaded_at.unwrap_or(DateTime::UNIX_EPOCH);
        let b_date = b.uploaded_at.unwrap_or(DateTime::UNIX_EPOCH);
        b_date.cmp(&a_date)
    });
}
