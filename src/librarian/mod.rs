// src/librarian/mod.rs

//! Content-addressed store for package files
//!
//! Bytes live under two trees keyed by SHA-256: `restricted/` for files
//! only private archives may serve, `public/` for everything else.
//! Layout inside each tree: `{first2}/{rest_of_hash}`. Metadata (filename,
//! size, flags) lives in the `library_files` table.

use crate::db::models::LibraryFile;
use crate::error::{Error, Result};
use crate::services::ContentStore;
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default store location
pub const DEFAULT_STORE_ROOT: &str = "/var/lib/depot/librarian";

/// Content-addressed store with public and restricted trees
#[derive(Debug, Clone)]
pub struct CasContentStore {
    root: PathBuf,
}

impl CasContentStore {
    /// Open (creating if needed) a store rooted at `root`
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        for tree in ["public", "restricted"] {
            let dir = root.join(tree);
            if !dir.exists() {
                fs::create_dir_all(&dir)?;
                debug!("Created content store tree: {}", dir.display());
            }
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store `content` and record its metadata
    pub fn add_file(
        &self,
        conn: &Connection,
        filename: &str,
        content: &[u8],
        restricted: bool,
    ) -> Result<LibraryFile> {
        let hash = sha256_hex(content);
        let path = self.object_path(&hash, restricted);

        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            // Write to temp, then rename into place
            let temp_path = path.with_extension("tmp");
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content)?;
            file.sync_all()?;
            fs::rename(&temp_path, &path)?;
            debug!("Stored {} as {} ({} bytes)", filename, hash, content.len());
        }

        let mut lf = LibraryFile::new(filename, hash, content.len() as i64);
        lf.restricted = restricted;
        lf.insert(conn)?;
        Ok(lf)
    }

    /// Read a file's bytes, verifying the hash
    pub fn retrieve(&self, file: &LibraryFile) -> Result<Vec<u8>> {
        let path = self.locate(file).ok_or_else(|| {
            Error::NotFound(format!("content of {} ({})", file.filename, file.sha256))
        })?;
        let content = fs::read(&path)?;
        let computed = sha256_hex(&content);
        if computed != file.sha256 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Hash mismatch: expected {}, got {}", file.sha256, computed),
            )));
        }
        Ok(content)
    }

    /// Drop a file's bytes and flag its metadata expired
    pub fn expire(&self, conn: &Connection, file: &mut LibraryFile) -> Result<()> {
        if let Some(path) = self.locate(file) {
            fs::remove_file(&path)?;
        }
        file.expire(conn)?;
        debug!("Expired {} ({})", file.filename, file.sha256);
        Ok(())
    }

    fn object_path(&self, hash: &str, restricted: bool) -> PathBuf {
        let tree = self.root.join(if restricted { "restricted" } else { "public" });
        if hash.len() < 2 {
            return tree.join(hash);
        }
        let (prefix, suffix) = hash.split_at(2);
        tree.join(prefix).join(suffix)
    }

    fn locate(&self, file: &LibraryFile) -> Option<PathBuf> {
        [file.restricted, !file.restricted]
            .into_iter()
            .map(|restricted| self.object_path(&file.sha256, restricted))
            .find(|path| path.exists())
    }
}

impl ContentStore for CasContentStore {
    fn is_retrievable(&self, file: &LibraryFile) -> bool {
        !file.expired && self.locate(file).is_some()
    }

    fn unembargo(&self, file: &LibraryFile) -> Result<()> {
        let public = self.object_path(&file.sha256, false);
        if public.exists() {
            return Ok(());
        }
        let restricted = self.object_path(&file.sha256, true);
        if !restricted.exists() {
            return Err(Error::NotFound(format!(
                "restricted content of {} ({})",
                file.filename, file.sha256
            )));
        }
        if let Some(parent) = public.parent() {
            fs::create_dir_all(parent)?;
        }
        // Copy rather than move; other restricted files may share the hash
        fs::copy(&restricted, &public)?;
        debug!("Unembargoed {} ({})", file.filename, file.sha256);
        Ok(())
    }
}

/// Hex SHA-256 of `content`
pub fn sha256_hex(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Pool path of a file: `pool/<component>/<prefix>/<source>/<filename>`
///
/// The prefix is the first letter of the source name, or the first four
/// characters for `lib*` sources.
pub fn pool_path(component: &str, source_name: &str, filename: &str) -> String {
    let prefix: String = if source_name.starts_with("lib") && source_name.len() > 3 {
        source_name.chars().take(4).collect()
    } else {
        source_name.chars().take(1).collect()
    };
    format!("pool/{component}/{prefix}/{source_name}/{filename}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use tempfile::TempDir;

    #[test]
    fn test_pool_path() {
        assert_eq!(
            pool_path("main", "foo", "foo_1.0-1.dsc"),
            "pool/main/f/foo/foo_1.0-1.dsc"
        );
        assert_eq!(
            pool_path("universe", "libfoo", "libfoo_2.0.tar.gz"),
            "pool/universe/libf/libfoo/libfoo_2.0.tar.gz"
        );
        assert_eq!(pool_path("main", "lib", "lib_1.dsc"), "pool/main/l/lib/lib_1.dsc");
    }

    #[test]
    fn test_store_retrieve_and_expire() {
        let temp = TempDir::new().unwrap();
        let store = CasContentStore::new(temp.path()).unwrap();
        let conn = db::open_in_memory().unwrap();

        let mut file = store
            .add_file(&conn, "foo_1.0-1.dsc", b"Format: 1.0\n", false)
            .unwrap();
        assert_eq!(file.sha256, sha256_hex(b"Format: 1.0\n"));
        assert!(store.is_retrievable(&file));
        assert_eq!(store.retrieve(&file).unwrap(), b"Format: 1.0\n");

        store.expire(&conn, &mut file).unwrap();
        assert!(file.expired);
        assert!(!store.is_retrievable(&file));
        assert!(store.retrieve(&file).is_err());
    }

    #[test]
    fn test_unembargo_copies_to_public_tree() {
        let temp = TempDir::new().unwrap();
        let store = CasContentStore::new(temp.path()).unwrap();
        let conn = db::open_in_memory().unwrap();

        let mut file = store
            .add_file(&conn, "secret_1.0.dsc", b"private bytes", true)
            .unwrap();
        assert!(store.is_retrievable(&file));
        let public = store.object_path(&file.sha256, false);
        assert!(!public.exists());

        store.unembargo(&file).unwrap();
        assert!(public.exists());
        file.mark_public(&conn).unwrap();
        assert_eq!(store.retrieve(&file).unwrap(), b"private bytes");
        // Idempotent
        store.unembargo(&file).unwrap();
    }
}
