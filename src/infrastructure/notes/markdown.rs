//! Filesystem note store
//!
//! Each note is two files in the notes directory: `<id>.md` holding the
//! markdown content and `<id>.meta.json` holding pretty-printed metadata.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;

use crate::application::ports::{NoteStore, NoteStoreError};
use crate::domain::note::{Note, NoteId, NoteMeta, NoteSummary};

const CONTENT_EXT: &str = "md";
const META_SUFFIX: &str = ".meta.json";

/// Notes stored as markdown files in one directory
pub struct MarkdownNoteStore {
    dir: PathBuf,
}

impl MarkdownNoteStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn content_path(&self, id: &NoteId) -> PathBuf {
        self.dir.join(format!("{}.{}", id, CONTENT_EXT))
    }

    fn meta_path(&self, id: &NoteId) -> PathBuf {
        self.dir.join(format!("{}{}", id, META_SUFFIX))
    }

    async fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir).await
    }

    /// Metadata for `id`. A missing file yields fallback metadata.
    async fn read_meta(&self, id: &NoteId) -> Result<NoteMeta, String> {
        match fs::read_to_string(self.meta_path(id)).await {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| e.to_string()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(NoteMeta::fallback(id, Utc::now())),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn summarize(&self, id: NoteId) -> NoteSummary {
        let content = fs::read_to_string(self.content_path(&id))
            .await
            .unwrap_or_default();
        let meta = match self.read_meta(&id).await {
            Ok(meta) => meta,
            Err(e) => {
                log::warn!("Unreadable metadata for note {}: {}", id, e);
                NoteMeta::fallback(&id, Utc::now())
            }
        };
        NoteSummary::from_parts(id, &content, &meta)
    }
}

/// Write via a sibling temp file and rename
async fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents).await?;
    fs::rename(&tmp, path).await
}

async fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[async_trait]
impl NoteStore for MarkdownNoteStore {
    async fn list(&self) -> Result<Vec<NoteSummary>, NoteStoreError> {
        self.ensure_dir()
            .await
            .map_err(|e| NoteStoreError::ListFailed(e.to_string()))?;
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| NoteStoreError::ListFailed(e.to_string()))?;

        let mut notes = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| NoteStoreError::ListFailed(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(CONTENT_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match stem.parse::<NoteId>() {
                Ok(id) => notes.push(self.summarize(id).await),
                Err(e) => log::debug!("Skipping {}: {}", path.display(), e),
            }
        }

        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(notes)
    }

    async fn read(&self, id: &NoteId) -> Result<Note, NoteStoreError> {
        let content = match fs::read_to_string(self.content_path(id)).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(NoteStoreError::NotFound(id.clone()))
            }
            Err(e) => {
                return Err(NoteStoreError::ReadFailed {
                    id: id.clone(),
                    message: e.to_string(),
                })
            }
        };
        let meta = self
            .read_meta(id)
            .await
            .map_err(|message| NoteStoreError::ReadFailed {
                id: id.clone(),
                message,
            })?;

        Ok(Note {
            id: id.clone(),
            content,
            meta,
        })
    }

    async fn write(
        &self,
        id: &NoteId,
        content: &str,
        meta: &NoteMeta,
    ) -> Result<(), NoteStoreError> {
        let failed = |message: String| NoteStoreError::WriteFailed {
            id: id.clone(),
            message,
        };

        let meta_json = serde_json::to_string_pretty(meta).map_err(|e| failed(e.to_string()))?;
        self.ensure_dir().await.map_err(|e| failed(e.to_string()))?;
        write_atomic(&self.content_path(id), content.as_bytes())
            .await
            .map_err(|e| failed(e.to_string()))?;
        write_atomic(&self.meta_path(id), meta_json.as_bytes())
            .await
            .map_err(|e| failed(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, id: &NoteId) -> Result<(), NoteStoreError> {
        let failed = |e: std::io::Error| NoteStoreError::DeleteFailed {
            id: id.clone(),
            message: e.to_string(),
        };
        remove_if_present(&self.content_path(id))
            .await
            .map_err(failed)?;
        remove_if_present(&self.meta_path(id)).await.map_err(failed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names() {
        let store = MarkdownNoteStore::new("/notes");
        let id: NoteId = "2026-10-15-abcd1234".parse().unwrap();
        assert_eq!(
            store.content_path(&id),
            PathBuf::from("/notes/2026-10-15-abcd1234.md")
        );
        assert_eq!(
            store.meta_path(&id),
            PathBuf::from("/notes/2026-10-15-abcd1234.meta.json")
        );
    }

    #[tokio::test]
    async fn missing_meta_falls_back_to_id_title() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("loose.md"), "just text").unwrap();
        let store = MarkdownNoteStore::new(dir.path());

        let note = store.read(&"loose".parse().unwrap()).await.unwrap();
        assert_eq!(note.meta.title, "loose");
        assert_eq!(note.content, "just text");
    }

    #[tokio::test]
    async fn corrupt_meta_fails_read_but_not_list() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.md"), "body").unwrap();
        std::fs::write(dir.path().join("bad.meta.json"), "{ nope").unwrap();
        let store = MarkdownNoteStore::new(dir.path());

        assert!(matches!(
            store.read(&"bad".parse().unwrap()).await,
            Err(NoteStoreError::ReadFailed { .. })
        ));
        let list = store.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].title, "bad");
    }
}
