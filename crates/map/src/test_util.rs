//! In-memory archive fake for overlay-driven tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rigmap_hashfs::structs::PlainMeta;
use rigmap_hashfs::{
    hash::hash_key, Archive, DirEntry, DirListing, EntryStores, FileEntry, FileKind, Result,
};

pub struct InMemoryArchive {
    path: PathBuf,
    stores: EntryStores,
    files: HashMap<u64, Vec<u8>>,
    dirs: HashMap<u64, DirListing>,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self {
            path: PathBuf::from("<memory>"),
            stores: EntryStores::default(),
            files: HashMap::new(),
            dirs: HashMap::new(),
        }
    }

    fn blank_plain() -> PlainMeta {
        PlainMeta::parse(&[0u8; 16]).unwrap()
    }

    pub fn add_file(&mut self, path: &str, data: &[u8]) {
        let hash = hash_key(path, 0);
        self.stores
            .files
            .insert(
                hash,
                FileEntry {
                    hash,
                    plain: Self::blank_plain(),
                    kind: FileKind::Plain,
                },
            );
        self.files.insert(hash, data.to_vec());
    }

    pub fn add_dir(&mut self, path: &str, subdirs: &[&str], files: &[&str]) {
        let hash = hash_key(path, 0);
        self.stores.directories.insert(
            hash,
            DirEntry {
                hash,
                plain: Self::blank_plain(),
            },
        );
        self.dirs.insert(
            hash,
            DirListing {
                subdirs: subdirs.iter().map(|s| s.to_string()).collect(),
                files: files.iter().map(|s| s.to_string()).collect(),
            },
        );
    }
}

impl Archive for InMemoryArchive {
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
        Ok(self.files[&entry.hash].clone())
    }

    fn read_dir(&mut self, entry: &DirEntry) -> Result<DirListing> {
        Ok(self.dirs[&entry.hash].clone())
    }
}
