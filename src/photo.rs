use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc::Sender,
    },
    thread,
};

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::{communication::Message, error::IngestError};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Ids have to stay unique across restarts and across processes sharing
/// the store, so the counter is prefixed with the creation time and a
/// random tag.
fn next_id() -> String {
    let n = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let tag: u64 = rand::random();
    format!(
        "{:x}-{tag:016x}-{n}",
        chrono::Local::now().timestamp_millis()
    )
}

/// An opaque, immutable photo: an optional id plus its encoded content.
/// Handles with ids compare by id. Handles without one (older records)
/// only equal other id-less handles with the same content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "PhotoRecord", into = "PhotoRecord")]
pub struct PhotoHandle {
    id: Option<String>,
    name: Option<String>,
    data: String,
}

impl PhotoHandle {
    #[must_use]
    pub fn new(name: Option<String>, data: String) -> Self {
        Self {
            id: Some(next_id()),
            name,
            data,
        }
    }

    /// A handle with no id, as stored by records that only kept the content.
    #[must_use]
    pub const fn from_content(data: String) -> Self {
        Self {
            id: None,
            name: None,
            data,
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// `data:` url of the image
    #[must_use]
    pub fn data(&self) -> &str {
        &self.data
    }
}

impl PartialEq for PhotoHandle {
    fn eq(&self, other: &Self) -> bool {
        match (&self.id, &other.id) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.data == other.data,
            _ => false,
        }
    }
}

impl Eq for PhotoHandle {}

impl fmt::Display for PhotoHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, &self.id) {
            (Some(name), _) => write!(f, "{name}"),
            (None, Some(id)) => write!(f, "photo {id}"),
            (None, None) => write!(f, "photo ({} bytes)", self.data.len()),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PhotoRecord {
    Tagged {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        data: String,
    },
    Bare(String),
}

impl From<PhotoRecord> for PhotoHandle {
    fn from(record: PhotoRecord) -> Self {
        match record {
            PhotoRecord::Tagged { id, name, data } => Self {
                id: Some(id),
                name,
                data,
            },
            PhotoRecord::Bare(data) => Self::from_content(data),
        }
    }
}

impl From<PhotoHandle> for PhotoRecord {
    fn from(photo: PhotoHandle) -> Self {
        match photo.id {
            Some(id) => Self::Tagged {
                id,
                name: photo.name,
                data: photo.data,
            },
            None => Self::Bare(photo.data),
        }
    }
}

fn mime_type(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    Some(match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        _ => return None,
    })
}

/// Reads an image file into a photo whose content is a base64 `data:` url.
pub fn load_photo(path: &Path) -> Result<PhotoHandle, IngestError> {
    let mime = mime_type(path).ok_or_else(|| IngestError::NotAnImage {
        path: path.to_path_buf(),
    })?;
    let bytes = std::fs::read(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let encoded = base64::prelude::BASE64_STANDARD.encode(bytes);
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    Ok(PhotoHandle::new(name, format!("data:{mime};base64,{encoded}")))
}

/// Loads the photos on a background thread, sending one message per path
/// as each finishes. The caller gets control back immediately and should
/// expect the photos to trickle in later.
pub fn ingest(paths: Vec<PathBuf>, sender: Sender<Message>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for path in paths {
            let message = match load_photo(&path) {
                Ok(photo) => {
                    log::debug!("loaded photo {}", path.display());
                    Message::PhotoLoaded(photo)
                }
                Err(err) => {
                    log::warn!("{err}");
                    Message::PhotoFailed {
                        path,
                        reason: err.to_string(),
                    }
                }
            };
            if sender.send(message).is_err() {
                // nobody is listening anymore
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn equality_prefers_ids() {
        let a = PhotoHandle::new(None, "same".to_string());
        let b = PhotoHandle::new(None, "same".to_string());
        assert_ne!(a, b);
        assert_eq!(a, a.clone());

        let bare = PhotoHandle::from_content("same".to_string());
        assert_eq!(bare, PhotoHandle::from_content("same".to_string()));
        assert_ne!(bare, PhotoHandle::from_content("other".to_string()));

        // an id-less handle never equals one with an id, keeping `==` transitive
        assert_ne!(bare, a);
        assert_ne!(a, bare);
        assert_ne!(bare, b);
    }

    #[test]
    fn ids_carry_a_random_tag() {
        let ids: Vec<String> = (0..64)
            .map(|_| PhotoHandle::new(None, "x".to_string()).id().unwrap().to_string())
            .collect();
        let tags: std::collections::HashSet<&str> = ids
            .iter()
            .map(|id| id.split('-').nth(1).unwrap())
            .collect();
        assert!(ids.iter().all(|id| id.split('-').count() == 3));
        assert!(tags.iter().all(|tag| tag.len() == 16));
        // two processes minting in the same millisecond with the same counter
        // still end up apart
        assert!(tags.len() > 1);
    }

    #[test]
    fn reads_bare_and_tagged_records() {
        let photos: Vec<PhotoHandle> = serde_json::from_str(
            r#"["data:image/png;base64,AAAA", {"id": "p1", "name": "me.png", "data": "data:image/png;base64,BBBB"}]"#,
        )
        .unwrap();
        assert_eq!(photos[0].id(), None);
        assert_eq!(photos[0].data(), "data:image/png;base64,AAAA");
        assert_eq!(photos[1].id(), Some("p1"));
        assert_eq!(photos[1].name(), Some("me.png"));

        let written = serde_json::to_value(&photos).unwrap();
        assert_eq!(written[0], "data:image/png;base64,AAAA");
        assert_eq!(written[1]["id"], "p1");
    }

    #[test]
    fn loads_images_as_data_urls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Snore.PNG");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let photo = load_photo(&path).unwrap();
        assert_eq!(photo.data(), "data:image/png;base64,AQID");
        assert_eq!(photo.name(), Some("Snore.PNG"));
        assert!(photo.id().is_some());
    }

    #[test]
    fn refuses_non_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "zzz").unwrap();
        assert!(matches!(
            load_photo(&path),
            Err(IngestError::NotAnImage { .. })
        ));
        assert!(matches!(
            load_photo(&dir.path().join("missing.jpg")),
            Err(IngestError::Io { .. })
        ));
    }

    #[test]
    fn ingest_reports_every_path() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("a.jpg");
        std::fs::write(&good, b"jpeg").unwrap();
        let bad = dir.path().join("b.gif");

        let (tx, rx) = mpsc::channel();
        ingest(vec![good, bad.clone()], tx).join().unwrap();

        let messages: Vec<Message> = rx.iter().collect();
        assert_eq!(messages.len(), 2);
        assert!(matches!(&messages[0], Message::PhotoLoaded(photo) if photo.name() == Some("a.jpg")));
        assert!(matches!(&messages[1], Message::PhotoFailed { path, .. } if *path == bad));
    }
}
