use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use binrw::BinReaderExt;
use tracing::warn;

use crate::structs::{
    meta_kind, EntryRecord, GeometryMeta, HashFsHeader, ImageMeta, MetadataHeader, PlainMeta,
    SampleMeta, HASH_METHOD_CITY, MAGIC,
};
use crate::{
    comp, Archive, Compression, DirEntry, DirListing, EntryStores, Error, FileEntry, FileKind,
    Result,
};

/// Reader for version-2 `SCS#` archives.
///
/// Owns the underlying reader for its whole lifetime; the descriptor is
/// released on drop. Entries are parsed lazily on the first
/// [`parse_entries`](Archive::parse_entries) call and cached.
pub struct HashFsV2<R: Read + Seek> {
    reader: R,
    path: PathBuf,
    pub header: HashFsHeader,
    stores: Option<EntryStores>,
}

impl HashFsV2<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(&path)?);
        Self::new(reader, path.as_ref().to_path_buf())
    }
}

impl<R: Read + Seek> HashFsV2<R> {
    pub fn new(mut reader: R, path: PathBuf) -> Result<Self> {
        let header: HashFsHeader = reader.read_le()?;
        Ok(Self {
            reader,
            path,
            header,
            stores: None,
        })
    }

    /// Header predicate: magic, version and hash method all check out.
    pub fn is_valid(&self) -> bool {
        self.header.magic == MAGIC
            && self.header.version == 2
            && self.header.hash_method == HASH_METHOD_CITY
    }

    fn validate(&self) -> Result<()> {
        if self.header.magic != MAGIC {
            return Err(Error::InvalidMagic(self.header.magic));
        }
        if self.header.version != 2 {
            return Err(Error::UnsupportedVersion(self.header.version));
        }
        if self.header.hash_method != HASH_METHOD_CITY {
            return Err(Error::UnknownHashMethod(self.header.hash_method));
        }
        Ok(())
    }

    /// Read a table blob; tables are zlib-compressed iff the stored size
    /// differs from the expected uncompressed size.
    fn read_table(&mut self, offset: u64, stored_size: usize, size: usize) -> Result<Vec<u8>> {
        self.reader.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; stored_size];
        self.reader.read_exact(&mut buf)?;
        if stored_size == size {
            Ok(buf)
        } else {
            comp::decompress(&buf, Compression::Zlib, size)
        }
    }

    fn build_stores(&mut self) -> Result<EntryStores> {
        self.validate()?;

        let entry_count = self.header.entry_count as usize;
        let entries_raw = self.read_table(
            self.header.entry_table_offset,
            self.header.entry_table_compressed_size as usize,
            entry_count * 16,
        )?;
        let meta_raw = self.read_table(
            self.header.metadata_table_offset,
            self.header.metadata_table_compressed_size as usize,
            self.header.metadata_table_size as usize,
        )?;

        let mut stores = EntryStores::default();
        let mut skipped_kinds = BTreeSet::new();
        let mut cursor = Cursor::new(&entries_raw);

        for _ in 0..entry_count {
            let record: EntryRecord = cursor.read_le()?;
            if let Some(entry) =
                materialize(&record, &meta_raw, &mut skipped_kinds)?
            {
                match entry {
                    Materialized::Dir(d) => stores.insert_dir(d)?,
                    Materialized::File(f) => stores.insert_file(f)?,
                }
            }
        }

        if !skipped_kinds.is_empty() {
            warn!(
                "'{}': skipped metadata kinds {:?}",
                self.path.display(),
                skipped_kinds
            );
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

enum Materialized {
    Dir(DirEntry),
    File(FileEntry),
}

/// Walk one entry's metadata headers and build the entry it describes.
/// Returns `None` when every metadata record was of a skipped kind.
fn materialize(
    record: &EntryRecord,
    meta_raw: &[u8],
    skipped_kinds: &mut BTreeSet<u8>,
) -> Result<Option<Materialized>> {
    let mut image: Option<ImageMeta> = None;
    let mut sample: Option<SampleMeta> = None;
    let mut plain: Option<(u8, PlainMeta)> = None;
    let mut geometry: Option<GeometryMeta> = None;
    let mut skipped = 0usize;

    for i in 0..record.metadata_count as usize {
        let header_offset = 4 * (record.metadata_index as usize + i);
        let raw = meta_raw
            .get(header_offset..header_offset + 4)
            .ok_or_else(|| {
                Error::Malformed(format!(
                    "metadata header {header_offset:#x} out of table bounds"
                ))
            })?;
        let header = MetadataHeader(u32::from_le_bytes(raw.try_into().unwrap()));
        let payload_offset = 4 * header.payload_index() as usize;
        let payload = &meta_raw[payload_offset.min(meta_raw.len())..];

        match header.kind() {
            meta_kind::IMG => image = Some(ImageMeta::parse(payload)?),
            meta_kind::SAMPLE => sample = Some(SampleMeta::parse(payload)?),
            meta_kind::PMA_INFO | meta_kind::PMG_INFO => {
                geometry = Some(GeometryMeta::parse(payload)?)
            }
            kind @ (meta_kind::PLAIN | meta_kind::DIRECTORY | meta_kind::MIP_TAIL) => {
                plain = Some((kind, PlainMeta::parse(payload)?))
            }
            kind @ (meta_kind::MIP_PROXY
            | meta_kind::MIP_0
            | meta_kind::MIP_1
            | meta_kind::INLINE_DIRECTORY) => {
                skipped_kinds.insert(kind);
                skipped += 1;
            }
            unknown => return Err(Error::UnknownMetadataKind(unknown)),
        }
    }
    let _ = geometry;

    match record.metadata_count {
        1 => {
            if skipped == 1 {
                return Ok(None);
            }
            let (kind, plain) = plain.ok_or_else(|| {
                Error::Malformed(format!(
                    "entry {:#018x} has no payload pointer",
                    record.hash
                ))
            })?;
            if record.is_directory() {
                if kind != meta_kind::DIRECTORY {
                    return Err(Error::Malformed(format!(
                        "directory entry {:#018x} has metadata kind {kind:#04x}",
                        record.hash
                    )));
                }
                Ok(Some(Materialized::Dir(DirEntry {
                    hash: record.hash,
                    plain,
                })))
            } else {
                if kind != meta_kind::PLAIN {
                    return Err(Error::Malformed(format!(
                        "file entry {:#018x} has metadata kind {kind:#04x}",
                        record.hash
                    )));
                }
                Ok(Some(Materialized::File(FileEntry {
                    hash: record.hash,
                    plain,
                    kind: FileKind::Plain,
                })))
            }
        }
        3 => {
            if record.is_directory() {
                return Err(Error::Malformed(format!(
                    "directory entry {:#018x} has 3 metadata records",
                    record.hash
                )));
            }
            let image = image.ok_or_else(|| {
                Error::Malformed(format!("texture entry {:#018x} lacks IMG", record.hash))
            })?;
            let sample = sample.ok_or_else(|| {
                Error::Malformed(format!("texture entry {:#018x} lacks SAMPLE", record.hash))
            })?;
            let (kind, plain) = plain.ok_or_else(|| {
                Error::Malformed(format!("texture entry {:#018x} lacks MIP_TAIL", record.hash))
            })?;
            if kind != meta_kind::MIP_TAIL {
                return Err(Error::Malformed(format!(
                    "texture entry {:#018x} has plain kind {kind:#04x}",
                    record.hash
                )));
            }
            Ok(Some(Materialized::File(FileEntry {
                hash: record.hash,
                plain,
                kind: FileKind::TextureObject { image, sample },
            })))
        }
        n => Err(Error::Malformed(format!(
            "entry {:#018x} has {n} metadata records",
            record.hash
        ))),
    }
}

/// V2 directory payload: child count, then one length byte per child, then
/// the names back to back. A leading `/` marks a subdirectory.
fn parse_dir_listing(raw: &[u8]) -> Result<DirListing> {
    if raw.len() < 4 {
        return Err(Error::Malformed("directory payload too short".into()));
    }
    let count = u32::from_le_bytes(raw[0..4].try_into().unwrap()) as usize;
    let lengths = raw
        .get(4..4 + count)
        .ok_or_else(|| Error::Malformed("directory length table truncated".into()))?;

    let mut listing = DirListing::default();
    let mut pos = 4 + count;
    for &len in lengths {
        let name = raw.get(pos..pos + len as usize).ok_or_else(|| {
            Error::Malformed("directory name table truncated".into())
        })?;
        pos += len as usize;
        let name = String::from_utf8_lossy(name);
        if let Some(subdir) = name.strip_prefix('/') {
            listing.subdirs.push(subdir.to_string());
        } else {
            listing.files.push(name.into_owned());
        }
    }
    Ok(listing)
}

impl<R: Read + Seek> Archive for HashFsV2<R> {
    fn path(&self) -> &Path {
        &self.path
    }

    fn salt(&self) -> u16 {
        self.header.salt
    }

    fn is_valid(&self) -> bool {
        HashFsV2::is_valid(self)
    }

    fn parse_entries(&mut self) -> Result<&EntryStores> {
        if self.stores.is_none() {
            self.stores = Some(self.build_stores()?);
        }
        Ok(self.stores.as_ref().unwrap())
    }

    fn read_file(&mut self, entry: &FileEntry) -> Result<Vec<u8>> {
        let payload = self.read_payload(&entry.plain)?;
        match entry.kind {
            FileKind::Plain => Ok(payload),
            // A texture object's payload is the bare mip tail; wrap it into
            // a self-describing DDS container.
            FileKind::TextureObject { image, .. } => {
                Ok(rigmap_dds::synthesize(&image.texture_info(), &payload))
            }
        }
    }

    fn read_dir(&mut self, entry: &DirEntry) -> Result<DirListing> {
        let payload = self.read_payload(&entry.plain)?;
        parse_dir_listing(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_key;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    const HEADER_SIZE: usize = 53;

    struct Fixture {
        salt: u16,
        compress_entry_table: bool,
        entries: Vec<FixtureEntry>,
    }

    struct FixtureEntry {
        path: &'static str,
        directory: bool,
        payload: Vec<u8>,
        compress: bool,
        texture: Option<(u16, u16, u32)>, // width-1, height-1, packed
        hash_override: Option<u64>,
        meta_kind_override: Option<u8>,
    }

    impl FixtureEntry {
        fn file(path: &'static str, payload: &[u8]) -> Self {
            Self {
                path,
                directory: false,
                payload: payload.to_vec(),
                compress: false,
                texture: None,
                hash_override: None,
                meta_kind_override: None,
            }
        }

        fn dir(path: &'static str, children: &[&str]) -> Self {
            let mut payload = (children.len() as u32).to_le_bytes().to_vec();
            payload.extend(children.iter().map(|c| c.len() as u8));
            for c in children {
                payload.extend_from_slice(c.as_bytes());
            }
            Self {
                directory: true,
                ..Self::file(path, &payload)
            }
        }

        fn texture(path: &'static str, payload: &[u8], packed: u32, w: u16, h: u16) -> Self {
            Self {
                texture: Some((w - 1, h - 1, packed)),
                ..Self::file(path, payload)
            }
        }
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    /// Serialize a complete in-memory V2 archive image.
    fn build(fx: &Fixture) -> Vec<u8> {
        let mut meta_table: Vec<u8> = Vec::new();
        let mut entry_table: Vec<u8> = Vec::new();
        let mut payload_blobs: Vec<Vec<u8>> = Vec::new();

        // Data region starts after the header, 16-aligned.
        let mut data_offset = (HEADER_SIZE + 15) / 16 * 16;

        for e in &fx.entries {
            let stored = if e.compress { zlib(&e.payload) } else { e.payload.clone() };

            let mut plain = [0u8; 16];
            plain[0..3].copy_from_slice(&(stored.len() as u32).to_le_bytes()[0..3]);
            plain[3] = if e.compress { 0x10 } else { 0x00 };
            plain[4..7].copy_from_slice(&(e.payload.len() as u32).to_le_bytes()[0..3]);
            plain[12..16].copy_from_slice(&((data_offset / 16) as u32).to_le_bytes());
            data_offset += stored.len().div_ceil(16) * 16;

            let first_header = (meta_table.len() / 4) as u32;
            let mut metadata_count = 1u16;

            if let Some((w, h, packed)) = e.texture {
                // Three headers (IMG, SAMPLE, MIP_TAIL), then the payloads.
                metadata_count = 3;
                let img_at = first_header + 3;
                let sample_at = img_at + 2;
                let tail_at = sample_at + 1;
                meta_table.extend_from_slice(
                    &((meta_kind::IMG as u32) << 24 | img_at).to_le_bytes(),
                );
                meta_table.extend_from_slice(
                    &((meta_kind::SAMPLE as u32) << 24 | sample_at).to_le_bytes(),
                );
                meta_table.extend_from_slice(
                    &((meta_kind::MIP_TAIL as u32) << 24 | tail_at).to_le_bytes(),
                );
                meta_table.extend_from_slice(&w.to_le_bytes());
                meta_table.extend_from_slice(&h.to_le_bytes());
                meta_table.extend_from_slice(&packed.to_le_bytes());
                meta_table.extend_from_slice(&0u32.to_le_bytes()); // sampler
                meta_table.extend_from_slice(&plain);
            } else {
                let kind = e.meta_kind_override.unwrap_or(if e.directory {
                    meta_kind::DIRECTORY
                } else {
                    meta_kind::PLAIN
                });
                let payload_at = first_header + 1;
                meta_table
                    .extend_from_slice(&((kind as u32) << 24 | payload_at).to_le_bytes());
                meta_table.extend_from_slice(&plain);
            }

            let hash = e.hash_override.unwrap_or_else(|| hash_key(e.path, fx.salt));
            entry_table.extend_from_slice(&hash.to_le_bytes());
            entry_table.extend_from_slice(&first_header.to_le_bytes());
            entry_table.extend_from_slice(&metadata_count.to_le_bytes());
            entry_table.push(if e.directory { 1 } else { 0 });
            entry_table.push(0);

            payload_blobs.push(stored);
        }

        let entry_table_stored = if fx.compress_entry_table {
            zlib(&entry_table)
        } else {
            entry_table.clone()
        };

        let entry_table_offset = data_offset as u64;
        let metadata_table_offset = entry_table_offset + entry_table_stored.len() as u64;

        let mut out = Vec::new();
        out.extend_from_slice(b"SCS#");
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&fx.salt.to_le_bytes());
        out.extend_from_slice(b"CITY");
        out.extend_from_slice(&(fx.entries.len() as u32).to_le_bytes());
        out.extend_from_slice(&(entry_table_stored.len() as u32).to_le_bytes());
        out.extend_from_slice(&(meta_table.len() as u32).to_le_bytes());
        out.extend_from_slice(&(meta_table.len() as u32).to_le_bytes());
        out.extend_from_slice(&entry_table_offset.to_le_bytes());
        out.extend_from_slice(&metadata_table_offset.to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes());
        out.push(0);
        assert_eq!(out.len(), HEADER_SIZE);

        out.resize((HEADER_SIZE + 15) / 16 * 16, 0);
        for blob in &payload_blobs {
            out.extend_from_slice(blob);
            out.resize(out.len().div_ceil(16) * 16, 0);
        }
        assert_eq!(out.len() as u64, entry_table_offset);
        out.extend_from_slice(&entry_table_stored);
        out.extend_from_slice(&meta_table);
        out
    }

    fn open(fx: &Fixture) -> HashFsV2<Cursor<Vec<u8>>> {
        HashFsV2::new(Cursor::new(build(fx)), PathBuf::from("<fixture>")).unwrap()
    }

    fn basic_fixture(salt: u16) -> Fixture {
        Fixture {
            salt,
            compress_entry_table: false,
            entries: vec![
                FixtureEntry::dir("material/ui/map", &["road_one.mat", "/road"]),
                FixtureEntry::file("material/ui/map/road_one.mat", b"material: \"ui\""),
            ],
        }
    }

    #[test]
    fn header_validation() {
        let mut fs = open(&basic_fixture(0));
        assert!(fs.is_valid());
        fs.parse_entries().unwrap();

        let mut image = build(&basic_fixture(0));
        image[3] = b'*'; // SCS* is not our magic
        let fs = HashFsV2::new(Cursor::new(image), PathBuf::from("<fixture>")).unwrap();
        assert!(!fs.is_valid());
    }

    #[test]
    fn invalid_header_is_fatal_on_parse() {
        let mut image = build(&basic_fixture(0));
        image[3] = b'*';
        let mut fs = HashFsV2::new(Cursor::new(image), PathBuf::from("<fixture>")).unwrap();
        assert!(matches!(fs.parse_entries(), Err(Error::InvalidMagic(_))));
    }

    #[test]
    fn directory_and_file_lookup() {
        let mut fs = open(&basic_fixture(0));
        let stores = fs.parse_entries().unwrap();
        let dir = stores.lookup_dir("material/ui/map", 0).unwrap();
        assert_eq!(dir.hash, crate::hash::city64(b"material/ui/map"));
        let file = stores
            .lookup_file("material/ui/map/road_one.mat", 0)
            .unwrap();

        let listing = fs.read_dir(&dir).unwrap();
        assert_eq!(listing.files, ["road_one.mat"]);
        assert_eq!(listing.subdirs, ["road"]);

        let data = fs.read_file(&file).unwrap();
        assert_eq!(data, b"material: \"ui\"");
    }

    #[test]
    fn salted_lookup() {
        let mut fs = open(&basic_fixture(7));
        let stores = fs.parse_entries().unwrap();
        assert!(stores.lookup_dir("material/ui/map", 0).is_none());
        let dir = stores.lookup_dir("material/ui/map", 7).unwrap();
        assert_eq!(dir.hash, crate::hash::city64(b"7material/ui/map"));
    }

    #[test]
    fn compressed_tables_and_payloads() {
        let mut fx = basic_fixture(0);
        fx.compress_entry_table = true;
        fx.entries[1].compress = true;
        let mut fs = open(&fx);
        let data = fs
            .read_path("material/ui/map/road_one.mat")
            .unwrap()
            .unwrap();
        assert_eq!(data, b"material: \"ui\"");
    }

    #[test]
    fn read_length_matches_declared_size() {
        let mut fx = basic_fixture(0);
        fx.entries[1].compress = true;
        let mut fs = open(&fx);
        let stores = fs.parse_entries().unwrap();
        let entry = stores
            .lookup_file("material/ui/map/road_one.mat", 0)
            .unwrap();
        let data = fs.read_file(&entry).unwrap();
        assert_eq!(data.len(), entry.plain.uncompressed_size as usize);
    }

    #[test]
    fn texture_object_synthesis() {
        let payload = vec![0x5Au8; 1000];
        // 256x256, 9 mips, format 0x1C
        let packed: u32 = (9 - 1) | (0x1C << 4);
        let fx = Fixture {
            salt: 0,
            compress_entry_table: false,
            entries: vec![FixtureEntry::texture(
                "material/ui/map/icon.tobj",
                &payload,
                packed,
                256,
                256,
            )],
        };
        let mut fs = open(&fx);
        let data = fs.read_path("material/ui/map/icon.tobj").unwrap().unwrap();
        assert_eq!(data.len(), 148 + payload.len());
        assert_eq!(&data[0..4], b"DDS ");
        assert_eq!(&data[84..88], b"DX10");
        let dds = rigmap_dds::Dds::parse(&data).unwrap();
        assert_eq!(dds.header.pitch_or_linear_size, payload.len() as u32);
        let info = dds.info().unwrap();
        assert_eq!((info.width, info.height), (256, 256));
        assert_eq!(info.mipmap_count, 9);
        assert_eq!(info.dxgi_format, 0x1C);
        assert!(!info.cubemap);
    }

    #[test]
    fn texture_object_cubemap_flag() {
        let packed: u32 = (1 << 12) | (0x1C << 4);
        let fx = Fixture {
            salt: 0,
            compress_entry_table: false,
            entries: vec![FixtureEntry::texture("env/sky.tobj", &[1, 2, 3, 4], packed, 64, 64)],
        };
        let mut fs = open(&fx);
        let data = fs.read_path("env/sky.tobj").unwrap().unwrap();
        let dds = rigmap_dds::Dds::parse(&data).unwrap();
        assert!(dds.info().unwrap().cubemap);
    }

    #[test]
    fn hash_collision_is_fatal() {
        let mut fx = basic_fixture(0);
        fx.entries[1].hash_override = Some(hash_key("material/ui/map", 0));
        let mut fs = open(&fx);
        assert!(matches!(fs.parse_entries(), Err(Error::HashCollision(_))));
    }

    #[test]
    fn unknown_metadata_kind_is_fatal() {
        let mut fx = basic_fixture(0);
        fx.entries[1].meta_kind_override = Some(0x42);
        let mut fs = open(&fx);
        assert!(matches!(
            fs.parse_entries(),
            Err(Error::UnknownMetadataKind(0x42))
        ));
    }

    #[test]
    fn skipped_metadata_kind_drops_entry() {
        let mut fx = basic_fixture(0);
        fx.entries[1].meta_kind_override = Some(meta_kind::INLINE_DIRECTORY);
        let mut fs = open(&fx);
        let stores = fs.parse_entries().unwrap();
        assert!(stores
            .lookup_file("material/ui/map/road_one.mat", 0)
            .is_none());
        assert_eq!(stores.files.len(), 0);
        assert_eq!(stores.directories.len(), 1);
    }

    #[test]
    fn parse_entries_is_idempotent() {
        let mut fs = open(&basic_fixture(0));
        let first = fs.parse_entries().unwrap().files.len();
        let second = fs.parse_entries().unwrap().files.len();
        assert_eq!(first, second);
    }
}
