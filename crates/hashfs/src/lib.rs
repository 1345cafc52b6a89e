//! Hash-addressed game archive containers.
//!
//! Two revisions of the custom `SCS#` container plus (externally) ZIP share
//! one lookup contract: every file and directory is addressed by the 64-bit
//! city hash of its virtual path, salted per archive. Readers own their file
//! handle; entries are plain value records carrying offsets, so reading is
//! always `archive.read_file(&entry)`.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

pub mod comp;
pub mod hash;
pub mod structs;
mod v1;
mod v2;

pub use comp::Compression;
pub use v1::HashFsV1;
pub use v2::HashFsV2;

use structs::{ImageMeta, PlainMeta, SampleMeta};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid archive magic: {0:?}")]
    InvalidMagic([u8; 4]),

    #[error("Unsupported archive version: {0}")]
    UnsupportedVersion(u16),

    #[error("Unknown hash method: {0:?}")]
    UnknownHashMethod([u8; 4]),

    #[error("Unknown metadata kind: {0:#04x}")]
    UnknownMetadataKind(u8),

    #[error("Duplicate entry hash: {0:#018x}")]
    HashCollision(u64),

    #[error("Size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Unsupported compression: {0:?}")]
    UnsupportedCompression(Compression),

    #[error("Unknown compression tag: {0:#x}")]
    UnknownCompression(u8),

    #[error("Decompression failed: {0}")]
    Decompress(String),

    #[error("Invalid tile stream: {0}")]
    TileStream(String),

    #[error("Malformed archive: {0}")]
    Malformed(String),

    #[error(transparent)]
    BinRw(#[from] binrw::Error),
}

/// A directory inside an archive.
#[derive(Debug, Clone, Copy)]
pub struct DirEntry {
    pub hash: u64,
    pub plain: PlainMeta,
}

#[derive(Debug, Clone, Copy)]
pub enum FileKind {
    Plain,
    /// Reading synthesizes a DDS container around the raw mip-tail payload.
    TextureObject { image: ImageMeta, sample: SampleMeta },
}

/// A file inside an archive.
#[derive(Debug, Clone, Copy)]
pub struct FileEntry {
    pub hash: u64,
    pub plain: PlainMeta,
    pub kind: FileKind,
}

impl FileEntry {
    pub fn is_texture_object(&self) -> bool {
        matches!(self.kind, FileKind::TextureObject { .. })
    }
}

/// Children of a directory entry, names only.
#[derive(Debug, Clone, Default)]
pub struct DirListing {
    pub subdirs: Vec<String>,
    pub files: Vec<String>,
}

/// The hash-indexed directory and file stores of one archive.
#[derive(Debug, Default)]
pub struct EntryStores {
    pub directories: HashMap<u64, DirEntry>,
    pub files: HashMap<u64, FileEntry>,
}

impl EntryStores {
    /// Look up a file by virtual path. Hashing (and the salt rule) stays
    /// internal; callers never see the key representation.
    pub fn lookup_file(&self, path: &str, salt: u16) -> Option<FileEntry> {
        self.files.get(&hash::hash_key(path, salt)).copied()
    }

    pub fn lookup_dir(&self, path: &str, salt: u16) -> Option<DirEntry> {
        self.directories.get(&hash::hash_key(path, salt)).copied()
    }

    pub(crate) fn insert_dir(&mut self, entry: DirEntry) -> Result<()> {
        if self.files.contains_key(&entry.hash) || self.directories.insert(entry.hash, entry).is_some()
        {
            return Err(Error::HashCollision(entry.hash));
        }
        Ok(())
    }

    pub(crate) fn insert_file(&mut self, entry: FileEntry) -> Result<()> {
        if self.directories.contains_key(&entry.hash) || self.files.insert(entry.hash, entry).is_some()
        {
            return Err(Error::HashCollision(entry.hash));
        }
        Ok(())
    }
}

/// One mounted archive container. Implemented by both `SCS#` revisions here
/// and by the ZIP mount in the extractor.
pub trait Archive {
    fn path(&self) -> &Path;

    fn salt(&self) -> u16;

    fn is_valid(&self) -> bool;

    /// Parse (once) and return the entry stores. Idempotent; the result is
    /// cached on first call.
    fn parse_entries(&mut self) -> Result<&EntryStores>;

    fn read_file(&mut self, entry: &FileEntry) -> Result<Vec<u8>>;

    fn read_dir(&mut self, entry: &DirEntry) -> Result<DirListing>;

    fn read_path(&mut self, path: &str) -> Result<Option<Vec<u8>>> {
        let salt = self.salt();
        let Some(entry) = self.parse_entries()?.lookup_file(path, salt) else {
            return Ok(None);
        };
        self.read_file(&entry).map(Some)
    }

    fn list_dir(&mut self, path: &str) -> Result<Option<DirListing>> {
        let salt = self.salt();
        let Some(entry) = self.parse_entries()?.lookup_dir(path, salt) else {
            return Ok(None);
        };
        self.read_dir(&entry).map(Some)
    }
}

/// Archives overlaid into a single namespace, first hit wins.
///
/// Mods are mounted after the base archives they override, so the overlay is
/// consulted in reverse mount order.
#[derive(Default)]
pub struct Overlay {
    mounts: Vec<Box<dyn Archive>>,
}

impl Overlay {
    pub fn new() -> Self {
        Self { mounts: Vec::new() }
    }

    pub fn add_mount(&mut self, mount: Box<dyn Archive>) {
        self.mounts.push(mount);
    }

    pub fn mount_count(&self) -> usize {
        self.mounts.len()
    }

    pub fn read_path(&mut self, path: &str) -> Result<Option<Vec<u8>>> {
        for mount in self.mounts.iter_mut().rev() {
            if let Some(data) = mount.read_path(path)? {
                return Ok(Some(data));
            }
        }
        Ok(None)
    }

    pub fn lookup(&mut self, path: &str) -> Result<Option<FileEntry>> {
        for mount in self.mounts.iter_mut().rev() {
            let salt = mount.salt();
            if let Some(entry) = mount.parse_entries()?.lookup_file(path, salt) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Which container revision the path would be served from. Icon
    /// extraction needs this to decide whether a texture reference already
    /// synthesizes its container.
    pub fn serves_texture_objects(&mut self, path: &str) -> Result<bool> {
        for mount in self.mounts.iter_mut().rev() {
            let salt = mount.salt();
            if let Some(entry) = mount.parse_entries()?.lookup_file(path, salt) {
                return Ok(entry.is_texture_object());
            }
        }
        Ok(false)
    }

    pub fn list_dir(&mut self, path: &str) -> Result<Option<DirListing>> {
        for mount in self.mounts.iter_mut().rev() {
            if let Some(listing) = mount.list_dir(path)? {
                return Ok(Some(listing));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// Minimal in-memory mount for overlay-order tests.
    struct MapArchive {
        path: PathBuf,
        stores: EntryStores,
        contents: HashMap<u64, Vec<u8>>,
    }

    impl MapArchive {
        fn new(files: &[(&str, &[u8])]) -> Self {
            let mut stores = EntryStores::default();
            let mut contents = HashMap::new();
            for (path, data) in files {
                let h = hash::hash_key(path, 0);
                stores
                    .insert_file(FileEntry {
                        hash: h,
                        plain: PlainMeta::parse(&[0u8; 16]).unwrap(),
                        kind: FileKind::Plain,
                    })
                    .unwrap();
                contents.insert(h, data.to_vec());
            }
            Self {
                path: PathBuf::from("<map>"),
                stores,
                contents,
            }
        }
    }

    impl Archive for MapArchive {
        fn path(&self) -> &Path {
            &self.path
        }

        fn salt(&self) -> u16 {
            0
        }

        fn is_valid(&self) -> bool {
            true
        }

        fn parse_entries(&mut self) -> Result<&EntryStores> {
            Ok(&self.stores)
        }

        fn read_file(&mut self, entry: &FileEntry) -> Result<Vec<u8>> {
            Ok(self.contents[&entry.hash].clone())
        }

        fn read_dir(&mut self, _entry: &DirEntry) -> Result<DirListing> {
            Ok(DirListing::default())
        }
    }

    #[test]
    fn later_mounts_shadow_earlier_ones() {
        let mut overlay = Overlay::new();
        overlay.add_mount(Box::new(MapArchive::new(&[
            ("def/city.sii", b"base"),
            ("def/country.sii", b"base only"),
        ])));
        overlay.add_mount(Box::new(MapArchive::new(&[("def/city.sii", b"mod")])));

        assert_eq!(overlay.read_path("def/city.sii").unwrap().unwrap(), b"mod");
        assert_eq!(
            overlay.read_path("def/country.sii").unwrap().unwrap(),
            b"base only"
        );
        assert!(overlay.read_path("def/missing.sii").unwrap().is_none());
    }
}
