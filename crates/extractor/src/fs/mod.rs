use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use rigmap_hashfs::{Archive, HashFsV1, HashFsV2, Overlay};

pub mod zip;

/// Open an archive file, dispatching on the first six bytes: `SCS#` plus a
/// version selects the hash-fs revision, anything else is treated as ZIP.
pub fn mount_archive(path: impl AsRef<Path>) -> anyhow::Result<Box<dyn Archive>> {
    let path = path.as_ref();
    let mut probe = [0u8; 6];
    let mut file = File::open(path)
        .with_context(|| format!("Failed to open archive '{}'", path.display()))?;
    let read = file.read(&mut probe)?;
    drop(file);

    if read >= 6 && probe[0..4] == *b"SCS#" {
        match u16::from_le_bytes([probe[4], probe[5]]) {
            1 => Ok(Box::new(HashFsV1::open(path)?)),
            2 => Ok(Box::new(HashFsV2::open(path)?)),
            version => anyhow::bail!(
                "'{}': unsupported SCS# version {version}",
                path.display()
            ),
        }
    } else {
        Ok(Box::new(zip::ZipFs::open(path)?))
    }
}

/// Mount every `.scs` archive in the game directory. Base archives are
/// required; any failure here aborts the run.
pub fn mount_game_dir(overlay: &mut Overlay, dir: impl AsRef<Path>) -> anyhow::Result<usize> {
    let dir = dir.as_ref();
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read game directory '{}'", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "scs"))
        .collect();
    paths.sort();

    for path in &paths {
        info!("Mounting '{}'", path.display());
        let mut archive = mount_archive(path)?;
        archive
            .parse_entries()
            .with_context(|| format!("Failed to parse '{}'", path.display()))?;
        overlay.add_mount(archive);
    }
    Ok(paths.len())
}

/// Mount mod archives after the base set so their entries shadow it. Mods
/// are isolated: one failing to open or parse is logged and skipped, the
/// rest still mount.
pub fn mount_mods(overlay: &mut Overlay, mods: &[PathBuf]) -> (usize, usize) {
    let mut mounted = 0;
    let mut failed = 0;
    for path in mods {
        let result = mount_archive(path).and_then(|mut archive| {
            archive.parse_entries()?;
            Ok(archive)
        });
        match result {
            Ok(archive) => {
                info!("Mounted mod '{}'", path.display());
                overlay.add_mount(archive);
                mounted += 1;
            }
            Err(e) => {
                error!("Skipping mod '{}': {e:#}", path.display());
                failed += 1;
            }
        }
    }
    (mounted, failed)
}
