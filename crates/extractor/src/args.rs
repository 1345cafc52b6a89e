use std::path::PathBuf;

#[derive(clap::Parser)]
#[command(author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand)]
pub enum Command {
    /// Print archive header information
    Info {
        /// Path to the archive file
        archive: PathBuf,
    },
    /// List the contents of an archive
    List {
        /// Path to the archive file
        archive: PathBuf,
        /// Directory to start from
        #[clap(short, long, default_value = "")]
        dir: String,
    },
    /// Extract a single file from an archive
    Extract {
        /// Path to the archive file
        archive: PathBuf,
        /// Virtual path of the file inside the archive
        path: String,
        /// Output file; defaults to the file name portion of the path
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// Dump the English localization bundle from a game installation
    Locale {
        /// Directory containing the game's .scs archives
        game_dir: PathBuf,
        /// Mod archives layered over the base set, in load order
        #[clap(short, long)]
        mods: Vec<PathBuf>,
        /// Output JSON file; stdout when omitted
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// Decode the map UI icons from a game installation
    Icons {
        /// Directory containing the game's .scs archives
        game_dir: PathBuf,
        /// Mod archives layered over the base set, in load order
        #[clap(short, long)]
        mods: Vec<PathBuf>,
        /// Directory the PNG files are written to
        #[clap(short, long, default_value = "icons")]
        output: PathBuf,
    },
}
