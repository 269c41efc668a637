//! Health diary access (authenticated only).

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use super::{DalError, DalResult};
use crate::models::{DiaryDraft, DiaryEntry, Identity, ImageUpload};
use crate::remote::schema::{parse_rows, to_row, DiaryEntryRow, DIARY_ENTRIES, DIARY_IMAGES_BUCKET};
use crate::remote::{BlobStore, Direction, Filter, Query, RecordStore, RemoteError};
use crate::session::SessionContext;

/// Marker separating the base URL from the object path in public URLs.
const PUBLIC_OBJECT_MARKER: &str = "/storage/v1/object/public/";

/// Recover the object path inside `bucket` from a public URL.
pub fn object_path_from_public_url<'a>(url: &'a str, bucket: &str) -> Option<&'a str> {
    let marker = format!("{}{}/", PUBLIC_OBJECT_MARKER, bucket);
    url.split_once(marker.as_str())
        .map(|(_, path)| path)
        .filter(|path| !path.is_empty())
}

#[derive(Clone)]
pub struct DiaryRepository {
    session: SessionContext,
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
}

impl DiaryRepository {
    pub fn new(
        session: SessionContext,
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            session,
            records,
            blobs,
        }
    }

    /// Guests have no diary; authenticated visitors need a resolved identity.
    async fn require_identity(&self) -> DalResult<Identity> {
        if self.session.is_guest_session() {
            return Err(DalError::NoIdentity);
        }
        self.session
            .current_identity()
            .await
            .ok_or(DalError::NoIdentity)
    }

    async fn upload_image(&self, identity: &Identity, image: &ImageUpload) -> DalResult<String> {
        let path = format!(
            "{}/{}.{}",
            identity.id,
            uuid::Uuid::new_v4(),
            image.extension()
        );
        self.blobs
            .upload(
                DIARY_IMAGES_BUCKET,
                &path,
                image.bytes.clone(),
                &image.content_type,
                true,
            )
            .await?;
        Ok(self.blobs.public_url(DIARY_IMAGES_BUCKET, &path))
    }

    /// Entries, newest first.
    pub async fn list(&self) -> DalResult<Vec<DiaryEntry>> {
        let identity = self.require_identity().await?;
        let query = Query::new()
            .eq("user_id", identity.id.as_str())
            .order_by("created_at", Direction::Descending);
        let rows = self.records.select(DIARY_ENTRIES, &query).await?;
        let parsed: Vec<DiaryEntryRow> = parse_rows(DIARY_ENTRIES, rows)?;
        Ok(parsed.into_iter().map(DiaryEntry::from).collect())
    }

    pub async fn create(&self, draft: &DiaryDraft) -> DalResult<DiaryEntry> {
        draft
            .validate()
            .map_err(|e| DalError::Validation(e.to_string()))?;
        let identity = self.require_identity().await?;

        let image_url = match &draft.image {
            Some(image) => Some(self.upload_image(&identity, image).await?),
            None => None,
        };

        let row = to_row(
            DIARY_ENTRIES,
            &json!({
                "user_id": identity.id,
                "title": draft.title.trim(),
                "content": draft.content,
                "image_url": image_url,
                "updated_at": chrono::Utc::now().to_rfc3339(),
            }),
        )?;
        let stored = self.records.insert(DIARY_ENTRIES, vec![row]).await?;
        let parsed: Vec<DiaryEntryRow> = parse_rows(DIARY_ENTRIES, stored)?;
        let entry = parsed
            .into_iter()
            .next()
            .map(DiaryEntry::from)
            .ok_or_else(|| RemoteError::MalformedRecord {
                collection: DIARY_ENTRIES.into(),
                reason: "insert returned no row".into(),
            })?;
        debug!(id = %entry.id, "diary entry created");
        Ok(entry)
    }

    /// Edit an entry. Keeps the existing image unless the draft carries a new one.
    pub async fn update(&self, entry: &DiaryEntry, draft: &DiaryDraft) -> DalResult<bool> {
        draft
            .validate()
            .map_err(|e| DalError::Validation(e.to_string()))?;
        let identity = self.require_identity().await?;

        let image_url = match &draft.image {
            Some(image) => Some(self.upload_image(&identity, image).await?),
            None => entry.image_url.clone(),
        };

        let patch = to_row(
            DIARY_ENTRIES,
            &json!({
                "title": draft.title.trim(),
                "content": draft.content,
                "image_url": image_url,
                "updated_at": chrono::Utc::now().to_rfc3339(),
            }),
        )?;
        let filters = [
            Filter::eq("id", entry.id.as_str()),
            Filter::eq("user_id", identity.id.as_str()),
        ];
        Ok(self.records.update(DIARY_ENTRIES, &filters, patch).await? > 0)
    }

    /// Delete an entry and its image. A failed image cleanup is only logged.
    pub async fn delete(&self, entry: &DiaryEntry) -> DalResult<bool> {
        let identity = self.require_identity().await?;
        let filters = [
            Filter::eq("id", entry.id.as_str()),
            Filter::eq("user_id", identity.id.as_str()),
        ];
        let deleted = self.records.delete(DIARY_ENTRIES, &filters).await?;

        if let Some(path) = entry
            .image_url
            .as_deref()
            .and_then(|url| object_path_from_public_url(url, DIARY_IMAGES_BUCKET))
        {
            if let Err(e) = self
                .blobs
                .remove(DIARY_IMAGES_BUCKET, &[path.to_string()])
                .await
            {
                warn!(error = %e, path, "diary image cleanup failed");
            }
        }
        Ok(deleted > 0)
    }
}
