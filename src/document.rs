use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::format::FormatKind;

/// Sequential identity of a selected document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub u64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a document's bytes live. In-memory bytes are never mutated once
/// handed over.
#[derive(Debug, Clone)]
pub enum ByteSource {
    File(PathBuf),
    Memory(Arc<[u8]>),
}

impl From<Vec<u8>> for ByteSource {
    fn from(bytes: Vec<u8>) -> Self {
        ByteSource::Memory(bytes.into())
    }
}

impl From<PathBuf> for ByteSource {
    fn from(path: PathBuf) -> Self {
        ByteSource::File(path)
    }
}

/// Tracks every live display URL and what it points at.
#[derive(Debug, Clone, Default)]
pub struct UrlRegistry {
    urls: Arc<Mutex<HashMap<String, ByteSource>>>,
}

impl UrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh URL for `source`. It stays resolvable until the returned
    /// handle is dropped.
    pub fn create(&self, source: &ByteSource) -> DisplayUrl {
        let url = format!("blob:docpreview/{}", Uuid::new_v4());
        self.lock().insert(url.clone(), source.clone());
        tracing::debug!("created display url {}", url);
        DisplayUrl {
            url,
            registry: self.clone(),
        }
    }

    pub fn resolve(&self, url: &str) -> Option<ByteSource> {
        self.lock().get(url).cloned()
    }

    /// Number of URLs created and not yet released.
    pub fn live(&self) -> usize {
        self.lock().len()
    }

    fn release(&self, url: &str) {
        if self.lock().remove(url).is_some() {
            tracing::debug!("released display url {}", url);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ByteSource>> {
        // A poisoned map is still structurally valid.
        self.urls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A transient URL for showing a document by reference. Released exactly once,
/// when dropped.
#[derive(Debug)]
pub struct DisplayUrl {
    url: String,
    registry: UrlRegistry,
}

impl DisplayUrl {
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl Drop for DisplayUrl {
    fn drop(&mut self) {
        self.registry.release(&self.url);
    }
}

/// One selected file, owned by the controller's file list.
#[derive(Debug)]
pub struct DocumentHandle {
    id: DocumentId,
    name: String,
    kind: FormatKind,
    source: ByteSource,
    display_url: DisplayUrl,
}

impl DocumentHandle {
    pub fn new(id: DocumentId, name: impl Into<String>, source: ByteSource, registry: &UrlRegistry) -> Self {
        let name = name.into();
        let kind = FormatKind::from_name(&name);
        let display_url = registry.create(&source);
        Self {
            id,
            name,
            kind,
            source,
            display_url,
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FormatKind {
        self.kind
    }

    pub fn source(&self) -> &ByteSource {
        &self.source
    }

    pub fn display_url(&self) -> &str {
        self.display_url.as_str()
    }

    /// Owned copy of everything a pipeline run needs. The display URL is
    /// copied as text; it stops resolving once this handle is dropped.
    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            id: self.id,
            name: self.name.clone(),
            kind: self.kind,
            source: self.source.clone(),
            display_url: self.display_url.as_str().to_string(),
        }
    }
}

/// Read-only view of a [`DocumentHandle`] handed to pipeline runs.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub id: DocumentId,
    pub name: String,
    pub kind: FormatKind,
    pub source: ByteSource,
    pub display_url: String,
}
