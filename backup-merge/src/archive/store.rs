//! Reading and writing backup archives.
//!
//! Course backups (`.mbz`) are gzip-compressed tar files. The importer only
//! understands plain USTAR headers, so that is the default variant when
//! packing.

use super::{normalize_entry_path, ArchiveTree};
use crate::utils::{MergeError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder, EntryType, Header};
use tracing::{debug, info, warn};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Upper bound on the buffer reserved from an entry's header size
const PREALLOC_LIMIT: u64 = 1 << 20;

/// Tar header variant used when packing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TarFormat {
    #[default]
    Ustar,
    Gnu,
}

/// Extracts archives into trees and packs trees into archives
pub trait ArchiveStore {
    fn extract(&self, archive: &Path) -> Result<ArchiveTree>;

    fn pack(&self, tree: &ArchiveTree, output: &Path, format: TarFormat) -> Result<PathBuf>;
}

/// Gzip tar store. Also accepts uncompressed tars and unpacked directories
/// on extraction.
#[derive(Debug, Clone)]
pub struct TarGzStore {
    compression_level: u32,
    mtime: u64,
}

impl TarGzStore {
    pub fn new(compression_level: u32) -> Self {
        Self {
            compression_level,
            mtime: chrono::Utc::now().timestamp().max(0) as u64,
        }
    }

    /// Fixed modification time for every packed entry
    pub fn with_mtime(mut self, mtime: u64) -> Self {
        self.mtime = mtime;
        self
    }

    fn read_entries<R: Read>(&self, reader: R, source: &Path) -> Result<ArchiveTree> {
        let archive_err = |e: io::Error| MergeError::Archive(format!("{}: {}", source.display(), e));

        let mut archive = Archive::new(reader);
        let mut tree = ArchiveTree::new();

        for entry in archive.entries().map_err(archive_err)? {
            let mut entry = entry.map_err(archive_err)?;
            let raw_path = entry.path().map_err(archive_err)?.to_string_lossy().into_owned();
            let Some(path) = normalize_entry_path(&raw_path) else {
                continue;
            };

            let entry_type = entry.header().entry_type();
            if entry_type.is_dir() {
                tree.insert_dir(&path);
            } else if entry_type.is_file() {
                let mut data = Vec::with_capacity(entry.size().min(PREALLOC_LIMIT) as usize);
                entry.read_to_end(&mut data).map_err(archive_err)?;
                tree.insert_file(&path, data);
            } else {
                warn!("Skipping unsupported entry {} ({:?})", path, entry_type);
            }
        }

        Ok(tree)
    }

    fn entry_header(&self, format: TarFormat, entry_type: EntryType, size: u64) -> Header {
        let mut header = match format {
            TarFormat::Ustar => Header::new_ustar(),
            TarFormat::Gnu => Header::new_gnu(),
        };
        header.set_entry_type(entry_type);
        header.set_mode(if entry_type.is_dir() { 0o755 } else { 0o644 });
        header.set_size(size);
        header.set_mtime(self.mtime);
        header.set_uid(0);
        header.set_gid(0);
        header
    }

    fn append<W: Write, R: Read>(
        &self,
        builder: &mut Builder<W>,
        format: TarFormat,
        mut header: Header,
        path: &str,
        data: R,
    ) -> Result<()> {
        match format {
            // No long-name extension records: a path that does not fit the
            // ustar name/prefix fields is an error
            TarFormat::Ustar => {
                header.set_path(path).map_err(|e| {
                    MergeError::Archive(format!("path not representable in ustar: {}: {}", path, e))
                })?;
                header.set_cksum();
                builder.append(&header, data)?;
            }
            TarFormat::Gnu => builder.append_data(&mut header, path, data)?,
        }
        Ok(())
    }

    fn pack_inner(&self, tree: &ArchiveTree, path: &Path, format: TarFormat) -> Result<()> {
        let file = File::create(path)?;
        let encoder = GzEncoder::new(BufWriter::new(file), Compression::new(self.compression_level));
        let mut builder = Builder::new(encoder);

        // Parents sort before their children
        let mut entries: BTreeMap<&str, Option<&[u8]>> = BTreeMap::new();
        for dir in tree.dirs() {
            entries.insert(dir, None);
        }
        for (file_path, data) in tree.files() {
            entries.insert(file_path, Some(data));
        }

        for (entry_path, data) in entries {
            match data {
                None => {
                    let header = self.entry_header(format, EntryType::Directory, 0);
                    let dir_path = format!("{}/", entry_path);
                    self.append(&mut builder, format, header, &dir_path, io::empty())?;
                }
                Some(data) => {
                    let header = self.entry_header(format, EntryType::Regular, data.len() as u64);
                    self.append(&mut builder, format, header, entry_path, data)?;
                }
            }
        }

        let encoder = builder.into_inner()?;
        let mut writer = encoder.finish()?;
        writer.flush()?;
        Ok(())
    }
}

impl Default for TarGzStore {
    fn default() -> Self {
        Self::new(6)
    }
}

impl ArchiveStore for TarGzStore {
    fn extract(&self, archive: &Path) -> Result<ArchiveTree> {
        if archive.is_dir() {
            info!("Loading unpacked backup {}", archive.display());
            return ArchiveTree::load_dir(archive);
        }

        let file = File::open(archive).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => MergeError::MissingFile(archive.display().to_string()),
            _ => MergeError::Io(e),
        })?;
        let mut reader = BufReader::new(file);
        let compressed = reader.fill_buf()?.starts_with(&GZIP_MAGIC);

        info!("Unpacking {}", archive.display());
        let tree = if compressed {
            self.read_entries(GzDecoder::new(reader), archive)?
        } else {
            self.read_entries(reader, archive)?
        };
        if tree.is_empty() {
            return Err(MergeError::Archive(format!("{}: no entries", archive.display())));
        }

        debug!(
            "Unpacked {} files ({} bytes) from {}",
            tree.file_count(),
            tree.total_bytes(),
            archive.display()
        );
        Ok(tree)
    }

    fn pack(&self, tree: &ArchiveTree, output: &Path, format: TarFormat) -> Result<PathBuf> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut temp_name = output.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        match self.pack_inner(tree, &temp_path, format) {
            Ok(()) => {
                fs::rename(&temp_path, output)?;
                info!("Packed {} files into {} ({:?})", tree.file_count(), output.display(), format);
                Ok(output.to_path_buf())
            }
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_tree() -> ArchiveTree {
        let mut tree = ArchiveTree::new();
        tree.insert_file(".ARCHIVE_INDEX", b"Moodle archive file index. Count: 0\n".to_vec());
        tree.insert_file("moodle_backup.xml", b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<moodle_backup/>".to_vec());
        tree.insert_file("sections/section_1/section.xml", b"<section/>".to_vec());
        tree.insert_dir("files");
        tree
    }

    #[test]
    fn test_pack_then_extract_roundtrip() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let output = temp_dir.path().join("out.mbz");
        let store = TarGzStore::default().with_mtime(1_700_000_000);
        let tree = sample_tree();

        let packed = store.pack(&tree, &output, TarFormat::Ustar)?;
        assert_eq!(packed, output);
        assert!(!temp_dir.path().join("out.mbz.tmp").exists());

        let extracted = store.extract(&output)?;
        assert_eq!(extracted, tree);
        Ok(())
    }

    #[test]
    fn test_ustar_headers() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let output = temp_dir.path().join("out.mbz");
        let store = TarGzStore::default();
        store.pack(&sample_tree(), &output, TarFormat::Ustar)?;

        let mut archive = Archive::new(GzDecoder::new(File::open(&output)?));
        let mut names = Vec::new();
        for entry in archive.entries()? {
            let entry = entry?;
            assert!(entry.header().as_ustar().is_some());
            names.push(entry.path()?.to_string_lossy().trim_end_matches('/').to_string());
        }

        assert_eq!(
            names,
            vec![
                ".ARCHIVE_INDEX",
                "files",
                "moodle_backup.xml",
                "sections",
                "sections/section_1",
                "sections/section_1/section.xml",
            ]
        );
        Ok(())
    }

    #[test]
    fn test_extract_plain_tar() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("plain.tar");

        let mut builder = Builder::new(File::create(&path)?);
        let mut header = Header::new_ustar();
        header.set_size(5);
        header.set_mode(0o644);
        builder.append_data(&mut header, "./files.xml", &b"hello"[..])?;
        builder.into_inner()?.flush()?;

        let tree = TarGzStore::default().extract(&path)?;
        assert_eq!(tree.file("files.xml"), Some(&b"hello"[..]));
        Ok(())
    }

    #[test]
    fn test_extract_directory_input() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let tree = sample_tree();
        tree.write_to_dir(temp_dir.path())?;

        let loaded = TarGzStore::default().extract(temp_dir.path())?;
        assert_eq!(loaded, tree);
        Ok(())
    }

    #[test]
    fn test_extract_empty_archive() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("empty.mbz");
        let builder = Builder::new(GzEncoder::new(File::create(&path)?, Compression::default()));
        builder.into_inner()?.finish()?;

        let result = TarGzStore::default().extract(&path);
        assert!(matches!(result, Err(MergeError::Archive(_))));
        Ok(())
    }

    #[test]
    fn test_oversized_header_does_not_reserve_declared_size() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("corrupt.tar");

        // Header claims 1 TiB but the archive ends right after it
        let mut header = Header::new_ustar();
        header.set_path("files.xml")?;
        header.set_size(1 << 40);
        header.set_mode(0o644);
        header.set_cksum();
        fs::write(&path, header.as_bytes())?;

        let result = TarGzStore::default().extract(&path);
        assert!(matches!(result, Err(MergeError::Archive(_))));
        Ok(())
    }

    #[test]
    fn test_extract_missing_archive() {
        let result = TarGzStore::default().extract(Path::new("/nonexistent/campus.mbz"));
        assert!(matches!(result, Err(MergeError::MissingFile(_))));
    }

    #[test]
    fn test_ustar_rejects_overlong_path() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let mut tree = ArchiveTree::new();
        tree.insert_file(&"x".repeat(300), b"data".to_vec());

        let output = temp_dir.path().join("out.mbz");
        let result = TarGzStore::default().pack(&tree, &output, TarFormat::Ustar);
        assert!(matches!(result, Err(MergeError::Archive(_))));
        assert!(!output.exists());
        Ok(())
    }
}
