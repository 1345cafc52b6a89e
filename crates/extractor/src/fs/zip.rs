use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use rigmap_hashfs::structs::PlainMeta;
use rigmap_hashfs::{
    hash::hash_key, Archive, DirEntry, DirListing, EntryStores, Error, FileEntry, FileKind, Result,
};

/// ZIP container mounted into the hash-addressed namespace: entry names are
/// hashed like hash-fs paths (always salt 0) so the overlay treats all
/// container kinds alike.
pub struct ZipFs {
    zip: zip::ZipArchive<BufReader<File>>,
    path: PathBuf,
    stores: Option<EntryStores>,
    names_by_hash: HashMap<u64, String>,
    listings_by_hash: HashMap<u64, DirListing>,
}

impl ZipFs {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let file = BufReader::new(File::open(&path)?);
        let zip = zip::ZipArchive::new(file)?;
        Ok(Self {
            zip,
            path: path.as_ref().to_path_buf(),
            stores: None,
            names_by_hash: HashMap::new(),
            listings_by_hash: HashMap::new(),
        })
    }

    fn build_stores(&mut self) -> Result<EntryStores> {
        let names: Vec<String> = self.zip.file_names().map(|n| n.to_string()).collect();

        let mut stores = EntryStores::default();
        // Directory path to (subdirs, files), including every intermediate
        // directory and the root "".
        let mut tree: BTreeMap<String, (BTreeSet<String>, BTreeSet<String>)> = BTreeMap::new();
        tree.insert(String::new(), Default::default());

        let blank = PlainMeta::parse(&[0u8; 16]).expect("zeroed plain meta");

        for name in &names {
            let clean = name.trim_start_matches('/').trim_end_matches('/');
            if clean.is_empty() {
                continue;
            }
            let is_dir = name.ends_with('/');

            // Register the chain of parent directories.
            let mut parent = String::new();
            for part in clean.split('/') {
                let full = if parent.is_empty() {
                    part.to_string()
                } else {
                    format!("{parent}/{part}")
                };
                let last = full.len() == clean.len();
                if last && !is_dir {
                    tree.entry(parent.clone())
                        .or_default()
                        .1
                        .insert(part.to_string());
                } else {
                    tree.entry(parent.clone())
                        .or_default()
                        .0
                        .insert(part.to_string());
                    tree.entry(full.clone()).or_default();
                }
                parent = full;
            }

            if !is_dir {
                let hash = hash_key(clean, 0);
                if stores.files.contains_key(&hash) {
                    return Err(Error::HashCollision(hash));
                }
                stores.files.insert(
                    hash,
                    FileEntry {
                        hash,
                        plain: blank,
                        kind: FileKind::Plain,
                    },
                );
                self.names_by_hash.insert(hash, name.clone());
            }
        }

        for (dir, (subdirs, files)) in tree {
            let hash = hash_key(&dir, 0);
            stores.directories.insert(hash, DirEntry { hash, plain: blank });
            self.listings_by_hash.insert(
                hash,
                DirListing {
                    subdirs: subdirs.into_iter().collect(),
                    files: files.into_iter().collect(),
                },
            );
        }

        Ok(stores)
    }
}

impl Archive for ZipFs {
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
        if self.stores.is_none() {
            self.stores = Some(self.build_stores()?);
        }
        Ok(self.stores.as_ref().unwrap())
    }

    fn read_file(&mut self, entry: &FileEntry) -> Result<Vec<u8>> {
        let name = self
            .names_by_hash
            .get(&entry.hash)
            .ok_or_else(|| Error::Malformed("entry does not belong to this archive".into()))?
            .clone();
        let mut file = self
            .zip
            .by_name(&name)
            .map_err(|e| Error::Malformed(format!("zip entry '{name}': {e}")))?;
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)?;
        Ok(data)
    }

    fn read_dir(&mut self, entry: &DirEntry) -> Result<DirListing> {
        self.listings_by_hash
            .get(&entry.hash)
            .cloned()
            .ok_or_else(|| Error::Malformed("directory does not belong to this archive".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn sample_zip() -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        writer.start_file("def/city.sii", options).unwrap();
        writer.write_all(b"city contents").unwrap();
        writer.start_file("map/usa/sec+0000+0000.base", options).unwrap();
        writer.write_all(b"sector").unwrap();
        writer.finish().unwrap().into_inner()
    }

    fn open_fixture() -> (tempfile::TempDir, ZipFs) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.zip");
        std::fs::write(&path, sample_zip()).unwrap();
        let fs = ZipFs::open(&path).unwrap();
        (dir, fs)
    }

    #[test]
    fn hashed_lookup_and_read() {
        let (_dir, mut fs) = open_fixture();
        let stores = fs.parse_entries().unwrap();
        let entry = stores.lookup_file("def/city.sii", 0).unwrap();
        assert_eq!(fs.read_file(&entry).unwrap(), b"city contents");
    }

    #[test]
    fn directory_tree_is_synthesized() {
        let (_dir, mut fs) = open_fixture();
        let root = fs.list_dir("").unwrap().unwrap();
        assert_eq!(root.subdirs, ["def", "map"]);
        let map = fs.list_dir("map").unwrap().unwrap();
        assert_eq!(map.subdirs, ["usa"]);
        let usa = fs.list_dir("map/usa").unwrap().unwrap();
        assert_eq!(usa.files, ["sec+0000+0000.base"]);
    }
}
