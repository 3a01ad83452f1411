//! VFS Patcher - merge mod packages into VFS container archives.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use vfs_patcher::update::{self, ArchiveUpdate};
use vfs_patcher::{ModPackage, PatchConfig, VfsArchive};

#[derive(Parser)]
#[command(name = "vfs-patcher")]
#[command(author, version, about, long_about = None)]
#[command(
    about = "Inspect VFS archives and merge mod packages into them",
    long_about = "Reads VFS container archives, merges the contents of zip mod packages into their directory trees and rewrites them. The original archive is kept as a backup on the first rewrite."
)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a directory inside an archive
    Ls {
        /// Archive file
        archive: PathBuf,

        /// Path inside the archive (default: root)
        #[arg(default_value = "/")]
        path: String,
    },

    /// Print the archive's directory tree
    Tree {
        /// Archive file
        archive: PathBuf,
    },

    /// Show archive statistics
    Info {
        /// Archive file
        archive: PathBuf,
    },

    /// Extract a single file from an archive
    Extract {
        /// Archive file
        archive: PathBuf,

        /// Path of the file inside the archive
        path: String,

        /// Output file (default: stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Merge mod packages into one archive and rewrite it
    Apply {
        /// Archive file
        archive: PathBuf,

        /// Mod packages (zip), applied in order
        #[arg(required = true)]
        mods: Vec<PathBuf>,

        /// Keep existing files instead of replacing them
        #[arg(long)]
        no_overwrite: bool,
    },

    /// Apply mod packages to every archive in a directory
    Update {
        /// Directory containing archives
        dir: PathBuf,

        /// Mod packages (zip), applied in order
        #[arg(required = true)]
        mods: Vec<PathBuf>,

        /// Keep existing files instead of replacing them
        #[arg(long)]
        no_overwrite: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => PatchConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PatchConfig::default(),
    };

    match cli.command {
        Commands::Ls { archive, path } => cmd_ls(&archive, &path, config),
        Commands::Tree { archive } => cmd_tree(&archive, config),
        Commands::Info { archive } => cmd_info(&archive, config),
        Commands::Extract {
            archive,
            path,
            output,
        } => cmd_extract(&archive, &path, output, config),
        Commands::Apply {
            archive,
            mods,
            no_overwrite,
        } => cmd_apply(&archive, &mods, with_overwrite(config, no_overwrite)),
        Commands::Update {
            dir,
            mods,
            no_overwrite,
        } => cmd_update(&dir, &mods, with_overwrite(config, no_overwrite)),
    }
}

fn with_overwrite(mut config: PatchConfig, no_overwrite: bool) -> PatchConfig {
    if no_overwrite {
        config.overwrite = false;
    }
    config
}

fn open_archive(path: &Path, config: PatchConfig) -> Result<VfsArchive> {
    VfsArchive::open(path, config).with_context(|| format!("opening {}", path.display()))
}

fn load_mods(paths: &[PathBuf]) -> Result<Vec<ModPackage>> {
    paths
        .iter()
        .map(|p| ModPackage::open(p).with_context(|| format!("loading mod {}", p.display())))
        .collect()
}

fn cmd_ls(archive: &Path, path: &str, config: PatchConfig) -> Result<()> {
    let archive = open_archive(archive, config)?;
    let entries = archive.list_dir(path)?;

    if entries.is_empty() {
        println!("(empty)");
    } else {
        for entry in entries {
            let type_char = if entry.is_dir { 'd' } else { '-' };
            let size = if entry.is_dir {
                "-".to_string()
            } else {
                format!("{}", entry.size)
            };
            let modified = entry
                .modified
                .map(|t| t.as_unix_secs().to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("{} {:>10} {:>12}  {}", type_char, size, modified, entry.name);
        }
    }

    Ok(())
}

fn cmd_tree(archive: &Path, config: PatchConfig) -> Result<()> {
    let archive = open_archive(archive, config)?;
    for line in archive.render_tree() {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_info(archive: &Path, config: PatchConfig) -> Result<()> {
    let archive = open_archive(archive, config)?;
    let info = archive.info();

    println!("VFS Archive Information");
    println!("=======================");
    println!("Name:             {}", info.name);
    println!("Path:             {}", info.path.display());
    println!("Backup present:   {}", if info.has_backup { "yes" } else { "no" });
    println!();
    println!("Contents:");
    println!("  Directories:    {}", info.dir_count);
    println!("  Files:          {}", info.file_count);
    println!("  Header length:  {} bytes", info.header_length);
    println!("  Payload size:   {} bytes", info.total_file_size);

    Ok(())
}

fn cmd_extract(
    archive: &Path,
    path: &str,
    output: Option<PathBuf>,
    config: PatchConfig,
) -> Result<()> {
    let archive = open_archive(archive, config)?;
    let data = archive.read_file(path)?;

    match output {
        Some(out) => {
            std::fs::write(&out, &data).with_context(|| format!("writing {}", out.display()))?;
            println!("Wrote {} bytes to {}", data.len(), out.display());
        }
        None => {
            io::stdout().write_all(&data)?;
        }
    }

    Ok(())
}

fn cmd_apply(archive: &Path, mods: &[PathBuf], config: PatchConfig) -> Result<()> {
    let packages = load_mods(mods)?;
    match update::apply_mods(archive, &packages, &config)
        .with_context(|| format!("patching {}", archive.display()))?
    {
        Some(applied) => print_update(&applied),
        None => println!("No mod has content for {}", archive.display()),
    }
    Ok(())
}

fn cmd_update(dir: &Path, mods: &[PathBuf], config: PatchConfig) -> Result<()> {
    let packages = load_mods(mods)?;
    let updated = update::update_directory(dir, &packages, &config)
        .with_context(|| format!("updating archives in {}", dir.display()))?;

    for applied in &updated {
        print_update(applied);
    }
    println!("Updated {} archive(s)", updated.len());
    Ok(())
}

fn print_update(applied: &ArchiveUpdate) {
    let report = &applied.report;
    println!(
        "{}: applied {} ({} files, {} bytes)",
        applied.path.display(),
        applied.mods.join(", "),
        report.files_written,
        report.total_bytes
    );
    if report.size_mismatches > 0 {
        println!("  {} file(s) had a payload size mismatch", report.size_mismatches);
    }
}
