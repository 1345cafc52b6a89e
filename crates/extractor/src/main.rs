use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Parser;
use rigmap_hashfs::{Archive, HashFsV1, HashFsV2, Overlay};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

pub mod args;
pub mod fs;
pub mod game;
pub mod icons;
pub mod sii;
pub mod texture;

#[macro_use]
extern crate tracing;

fn main() -> anyhow::Result<()> {
    tracing::subscriber::set_global_default(
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().compact().without_time())
            .with(
                EnvFilter::builder()
                    .with_default_directive(LevelFilter::INFO.into())
                    .from_env_lossy(),
            ),
    )
    .expect("Failed to set global tracing subscriber");

    let args = args::Args::parse();
    match args.command {
        args::Command::Info { archive } => cmd_info(&archive),
        args::Command::List { archive, dir } => cmd_list(&archive, &dir),
        args::Command::Extract {
            archive,
            path,
            output,
        } => cmd_extract(&archive, &path, output),
        args::Command::Locale {
            game_dir,
            mods,
            output,
        } => cmd_locale(&game_dir, &mods, output),
        args::Command::Icons {
            game_dir,
            mods,
            output,
        } => cmd_icons(&game_dir, &mods, &output),
    }
}

fn cmd_info(path: &Path) -> anyhow::Result<()> {
    let mut probe = [0u8; 6];
    let read = File::open(path)
        .with_context(|| format!("Failed to open archive '{}'", path.display()))?
        .read(&mut probe)?;

    if read >= 6 && probe[0..4] == *b"SCS#" {
        match u16::from_le_bytes([probe[4], probe[5]]) {
            2 => {
                let mut archive = HashFsV2::open(path)?;
                let header = archive.header.clone();
                println!("container:  hash-fs v2");
                println!("valid:      {}", archive.is_valid());
                println!("salt:       {}", header.salt);
                println!(
                    "hash:       {}",
                    String::from_utf8_lossy(&header.hash_method)
                );
                println!("platform:   {:#04x}", header.platform);
                println!("entries:    {}", header.entry_count);
                let stores = archive.parse_entries()?;
                println!(
                    "            {} files, {} directories",
                    stores.files.len(),
                    stores.directories.len()
                );
                let textures = stores
                    .files
                    .values()
                    .filter(|f| f.is_texture_object())
                    .count();
                println!("textures:   {textures} texture objects");
            }
            1 => {
                let mut archive = HashFsV1::open(path)?;
                println!("container:  hash-fs v1");
                println!("valid:      {}", archive.is_valid());
                println!("salt:       {}", archive.header.salt);
                let stores = archive.parse_entries()?;
                println!(
                    "entries:    {} files, {} directories",
                    stores.files.len(),
                    stores.directories.len()
                );
            }
            version => anyhow::bail!("Unsupported SCS# version {version}"),
        }
    } else {
        let mut archive = fs::zip::ZipFs::open(path)?;
        let stores = archive.parse_entries()?;
        println!("container:  zip");
        println!(
            "entries:    {} files, {} directories",
            stores.files.len(),
            stores.directories.len()
        );
    }
    Ok(())
}

fn cmd_list(path: &Path, dir: &str) -> anyhow::Result<()> {
    let mut archive = fs::mount_archive(path)?;
    walk(archive.as_mut(), dir)
}

fn walk(archive: &mut dyn Archive, dir: &str) -> anyhow::Result<()> {
    let Some(listing) = archive.list_dir(dir)? else {
        anyhow::bail!("Directory '{dir}' not found in archive");
    };
    for file in &listing.files {
        println!("{}", join(dir, file));
    }
    for subdir in &listing.subdirs {
        let sub = join(dir, subdir);
        println!("{sub}/");
        walk(archive, &sub)?;
    }
    Ok(())
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

fn cmd_extract(archive_path: &Path, path: &str, output: Option<PathBuf>) -> anyhow::Result<()> {
    let mut archive = fs::mount_archive(archive_path)?;
    let data = archive
        .read_path(path)?
        .with_context(|| format!("'{path}' not found in archive"))?;

    let output = output.unwrap_or_else(|| {
        PathBuf::from(path.rsplit('/').next().unwrap_or(path))
    });
    std::fs::write(&output, &data)
        .with_context(|| format!("Failed to write '{}'", output.display()))?;
    info!("Wrote {} bytes to '{}'", data.len(), output.display());
    Ok(())
}

fn mount_all(game_dir: &Path, mods: &[PathBuf]) -> anyhow::Result<Overlay> {
    let mut overlay = Overlay::new();
    let mounted = fs::mount_game_dir(&mut overlay, game_dir)?;
    if mounted == 0 {
        anyhow::bail!("No .scs archives found in '{}'", game_dir.display());
    }
    let (mod_count, failed) = fs::mount_mods(&mut overlay, mods);
    info!("Mounted {mounted} base archives, {mod_count} mods ({failed} failed)");

    match game::read_version(&mut overlay)? {
        Some(version) => info!("Game version {version}"),
        None => warn!("No version file found"),
    }
    Ok(overlay)
}

fn cmd_locale(game_dir: &Path, mods: &[PathBuf], output: Option<PathBuf>) -> anyhow::Result<()> {
    let mut overlay = mount_all(game_dir, mods)?;
    let locale = game::read_locale(&mut overlay)?;
    let json = serde_json::to_string_pretty(&locale)?;
    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write '{}'", path.display()))?;
            info!(
                "Wrote {} locale entries to '{}'",
                locale.len(),
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_icons(game_dir: &Path, mods: &[PathBuf], output: &Path) -> anyhow::Result<()> {
    let mut overlay = mount_all(game_dir, mods)?;
    let icons = icons::extract_icons(&mut overlay)?;
    std::fs::create_dir_all(output)?;
    for (name, image) in &icons {
        let png = texture::encode_png(image)?;
        std::fs::write(output.join(format!("{name}.png")), png)?;
    }
    info!("Wrote {} icons to '{}'", icons.len(), output.display());
    Ok(())
}
