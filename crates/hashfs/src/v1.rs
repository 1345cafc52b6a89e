use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use binrw::{BinRead, BinReaderExt};

use crate::structs::{HASH_METHOD_CITY, MAGIC};
use crate::{
    comp, Archive, Compression, DirEntry, DirListing, EntryStores, Error, FileEntry, FileKind,
    Result,
};

use crate::structs::PlainMeta;

/// Version-1 header. Unlike V2 there are no metadata tables; the entry
/// records carry offsets and sizes directly.
#[derive(BinRead, Debug, Clone)]
pub struct V1Header {
    pub magic: [u8; 4],
    pub version: u16,
    pub salt: u16,
    pub hash_method: [u8; 4],
    pub entry_count: u32,
    pub entry_table_offset: u32,
}

/// 32-byte V1 entry record.
#[derive(BinRead, Debug, Clone, Copy)]
pub struct V1EntryRecord {
    pub hash: u64,
    pub offset: u64,
    pub flags: u32,
    pub crc: u32,
    pub size: u32,
    pub compressed_size: u32,
}

impl V1EntryRecord {
    const FLAG_DIRECTORY: u32 = 0x1;
    const FLAG_COMPRESSED: u32 = 0x2;

    pub fn is_directory(&self) -> bool {
        self.flags & Self::FLAG_DIRECTORY != 0
    }

    pub fn is_compressed(&self) -> bool {
        self.flags & Self::FLAG_COMPRESSED != 0
    }
}

/// Reader for version-1 `SCS#` archives: a flat entry table, zlib or stored
/// payloads, newline-separated directory listings.
pub struct HashFsV1<R: Read + Seek> {
    reader: R,
    path: PathBuf,
    pub header: V1Header,
    stores: Option<EntryStores>,
}

impl HashFsV1<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(&path)?);
        Self::new(reader, path.as_ref().to_path_buf())
    }
}

impl<R: Read + Seek> HashFsV1<R> {
    pub fn new(mut reader: R, path: PathBuf) -> Result<Self> {
        let header: V1Header = reader.read_le()?;
        Ok(Self {
            reader,
            path,
            header,
            stores: None,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.header.magic == MAGIC
            && self.header.version == 1
            && self.header.hash_method == HASH_METHOD_CITY
    }

    fn validate(&self) -> Result<()> {
        if self.header.magic != MAGIC {
            return Err(Error::InvalidMagic(self.header.magic));
        }
        if self.header.version != 1 {
            return Err(Error::UnsupportedVersion(self.header.version));
        }
        if self.header.hash_method != HASH_METHOD_CITY {
            return Err(Error::UnknownHashMethod(self.header.hash_method));
        }
        Ok(())
    }

    fn build_stores(&mut self) -> Result<EntryStores> {
        self.validate()?;

        self.reader
            .seek(SeekFrom::Start(self.header.entry_table_offset as u64))?;
        let mut raw = vec![0u8; self.header.entry_count as usize * 32];
        self.reader.read_exact(&mut raw)?;

        let mut stores = EntryStores::default();
        let mut cursor = Cursor::new(&raw);
        for _ in 0..self.header.entry_count {
            let record: V1EntryRecord = cursor.read_le()?;
            let plain = PlainMeta {
                compressed_size: record.compressed_size,
                compression: if record.is_compressed() {
                    Compression::Zlib
                } else {
                    Compression::None
                },
                uncompressed_size: record.size,
                offset: record.offset,
            };
            if record.is_directory() {
                stores.insert_dir(DirEntry {
                    hash: record.hash,
                    plain,
                })?;
            } else {
                stores.insert_file(FileEntry {
                    hash: record.hash,
                    plain,
                    kind: FileKind::Plain,
                })?;
            }
        }
        Ok(stores)
    }

    fn read_payload(&mut self, plain: &PlainMeta) -> Result<Vec<u8>> {
        self.reader.seek(SeekFrom::Start(plain.offset))?;
        let mut buf = vec![0u8; plain.compressed_size as usize];
        self.reader.read_exact(&mut buf)?;
        comp::decompress(&buf, plain.compression, plain.uncompressed_size as usize)
    }
}

/// V1 directory payload: names separated by newlines, `*` marks a
/// subdirectory.
fn parse_dir_listing(raw: &[u8]) -> DirListing {
    let mut listing = DirListing::default();
    for name in String::from_utf8_lossy(raw).lines() {
        if name.is_empty() {
            continue;
        }
        if let Some(subdir) = name.strip_prefix('*') {
            listing.subdirs.push(subdir.to_string());
        } else {
            listing.files.push(name.to_string());
        }
    }
    listing
}

impl<R: Read + Seek> Archive for HashFsV1<R> {
    fn path(&self) -> &Path {
        &self.path
    }

    fn salt(&self) -> u16 {
        self.header.salt
    }

    fn is_valid(&self) -> bool {
        HashFsV1::is_valid(self)
    }

    fn parse_entries(&mut self) -> Result<&EntryStores> {
        if self.stores.is_none() {
            self.stores = Some(self.build_stores()?);
        }
        Ok(self.stores.as_ref().unwrap())
    }

    fn read_file(&mut self, entry: &FileEntry) -> Result<Vec<u8>> {
        self.read_payload(&entry.plain)
    }

    fn read_dir(&mut self, entry: &DirEntry) -> Result<DirListing> {
        let payload = self.read_payload(&entry.plain)?;
        Ok(parse_dir_listing(&payload))
    }
}
