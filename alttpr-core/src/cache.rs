//! Namespaced blob store on the local filesystem.
//!
//! Layout: `<base_dir>/<namespace>/<key>`, raw bytes, no header and no
//! manifest. Entries never expire; they live until something outside this
//! crate removes them.

use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid cache key '{0}'")]
    InvalidKey(String),
}

fn io_at(path: &Path) -> impl FnOnce(io::Error) -> CacheError + '_ {
    move |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Name of one cache subdirectory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(Cow<'static, str>);

impl Namespace {
    /// Base patches, keyed by the hash of the base image they apply to.
    pub const BASE_PATCH: Namespace = Namespace(Cow::Borrowed("base_patch"));
    /// Reconstructed seed images, keyed by seed hash.
    pub const SEED: Namespace = Namespace(Cow::Borrowed("seed"));
    pub const MISC: Namespace = Namespace(Cow::Borrowed("misc"));
    /// Saved configuration snapshots.
    pub const CONFIG: Namespace = Namespace(Cow::Borrowed("config"));

    pub fn new(name: impl Into<String>) -> Self {
        Namespace(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle on a single namespace. Cheap to construct; the directory is only
/// created by the first `put`.
#[derive(Debug, Clone)]
pub struct BlobCache {
    namespace: Namespace,
    dir: PathBuf,
}

impl BlobCache {
    pub fn new(base_dir: impl AsRef<Path>, namespace: Namespace) -> Self {
        let dir = base_dir.as_ref().join(namespace.as_str());
        Self { namespace, dir }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    // Keys are plain file names. A leading dot is reserved for in-flight
    // temporary files.
    fn entry_path(&self, key: &str) -> Result<PathBuf, CacheError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && !key.contains(['/', '\\'])
            && !key.contains('\0');
        if !valid {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(key))
    }

    /// Returns `Ok(None)` when the entry does not exist.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.entry_path(key)?;
        match fs::read(&path) {
            Ok(bytes) => {
                debug!(namespace = %self.namespace, key, len = bytes.len(), "cache hit");
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(namespace = %self.namespace, key, "cache miss");
                Ok(None)
            }
            Err(e) => Err(io_at(&path)(e)),
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        match self.entry_path(key) {
            Ok(path) => path.is_file(),
            Err(_) => false,
        }
    }

    /// Writes or overwrites an entry. The bytes go to a temporary file in
    /// the namespace directory first and are renamed into place, so a
    /// concurrent reader sees either the old blob or the new one.
    pub fn put(&self, key: &str, bytes: &[u8]) -> Result<(), CacheError> {
        let path = self.entry_path(key)?;
        fs::create_dir_all(&self.dir).map_err(io_at(&self.dir))?;

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(io_at(&self.dir))?;
        tmp.write_all(bytes).map_err(io_at(tmp.path()))?;
        tmp.persist(&path).map_err(|e| CacheError::Io {
            path: path.clone(),
            source: e.error,
        })?;

        debug!(namespace = %self.namespace, key, len = bytes.len(), "cache write");
        Ok(())
    }
}

/// The four namespaces used by the rest of the crate, opened once at
/// startup and passed around by reference.
#[derive(Debug, Clone)]
pub struct Caches {
    root: PathBuf,
    pub base_patch: BlobCache,
    pub seed: BlobCache,
    pub misc: BlobCache,
    pub config: BlobCache,
}

impl Caches {
    pub fn open(base_dir: impl Into<PathBuf>) -> Self {
        let root = base_dir.into();
        Self {
            base_patch: BlobCache::new(&root, Namespace::BASE_PATCH),
            seed: BlobCache::new(&root, Namespace::SEED),
            misc: BlobCache::new(&root, Namespace::MISC),
            config: BlobCache::new(&root, Namespace::CONFIG),
            root,
        }
    }

    /// `<user cache dir>/retropie_alttpr`, or a dot directory in the
    /// working directory on platforms without one.
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .map(|base| base.join("retropie_alttpr"))
            .unwrap_or_else(|| PathBuf::from(".retropie_alttpr"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
