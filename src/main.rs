use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

use xamstore::hash::NameHash;
use xamstore::layout::{is_known_arch, KNOWN_ARCHITECTURES, RECORD_FILE};
use xamstore::{
    PackOptions, ReadOptions, StoreAssembler, StoreError, StoreExtractor, StoreFile,
    StoreHeader, StoreResult, UnpackOptions,
};

#[derive(Parser)]
#[command(name = "xamstore", about = "Unpack and repack XABA assembly stores")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Unpack assemblies.blob (and selected arch stores) into individual modules
    Unpack {
        /// Directory containing assemblies.blob and assemblies.manifest
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
        #[arg(short, long, default_value = "out")]
        out: PathBuf,
        /// Architecture store to include: arm64_v8a, armeabi_v7a, x86, x86_64
        #[arg(short, long)]
        arch: Vec<String>,
        /// Remove an existing output directory first
        #[arg(short, long)]
        force: bool,
        /// Dump headers, entries, and hash tables while parsing
        #[arg(long)]
        debug: bool,
    },
    /// Rebuild stores and manifest from an unpack record
    Pack {
        #[arg(short, long, default_value_t = default_record())]
        config: String,
        #[arg(short, long, default_value = "packed")]
        out: PathBuf,
        #[arg(long)]
        debug: bool,
    },
    /// Show a store's header, entries, and hash-table summary
    Info {
        input: PathBuf,
        #[arg(long)]
        debug: bool,
    },
    /// Print the 32/64-bit name hashes used in the hash tables
    Hash {
        #[arg(required = true, num_args = 1..)]
        names: Vec<String>,
    },
}

fn default_record() -> String {
    format!("out/{RECORD_FILE}")
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    match run(Cli::parse().command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(command: Commands) -> StoreResult<()> {
    match command {

        // ── Unpack ───────────────────────────────────────────────────────────
        Commands::Unpack { dir, out, arch, force, debug } => {
            for a in &arch {
                if !is_known_arch(a) {
                    tracing::warn!(
                        "unknown architecture '{}' (known: {})",
                        a,
                        KNOWN_ARCHITECTURES.join(", ")
                    );
                }
            }
            let opts = UnpackOptions {
                input_dir: dir,
                output_dir: out,
                architectures: arch,
                force,
                debug,
            };
            StoreExtractor::new(opts).run()?;
        }

        // ── Pack ─────────────────────────────────────────────────────────────
        Commands::Pack { config, out, debug } => {
            let opts = PackOptions { output_dir: out, debug };
            StoreAssembler::new(opts).run(&PathBuf::from(config))?;
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input, debug } => {
            if !input.exists() {
                return Err(StoreError::MissingInput(input));
            }
            let data = std::fs::read(&input)?;
            let primary = StoreHeader::read(&data[..])?.is_primary();
            let store = StoreFile::parse(&data, primary, &ReadOptions { debug })?;
            let h = &store.header;

            println!("── Assembly store ──────────────────────────────────────");
            println!("  Path           {}", input.display());
            println!("  Size           {} B", data.len());
            println!("  Format version {}", h.version);
            println!("  Store id       {}", h.store_id);
            println!("  Local entries  {}", h.local_entry_count);
            println!("  Global entries {}", h.global_entry_count);
            println!("  Companions     {}", h.has_companions());
            println!("{:>6} {:>10} {:>10} {:>10} {:>10}", "Index", "Offset", "Size", "Debug", "Config");
            for (i, e) in store.entries.iter().enumerate() {
                println!("{:>6} {:>10} {:>10} {:>10} {:>10}",
                    i, e.data_offset, e.data_size, e.debug_size, e.config_size);
            }
            if let Some(tables) = &store.hash_tables {
                println!("  Hash tables    {} + {} records, sorted: {}",
                    tables.hash32.len(), tables.hash64.len(), tables.is_sorted());
            }
        }

        // ── Hash ─────────────────────────────────────────────────────────────
        Commands::Hash { names } => {
            for name in &names {
                let h = NameHash::of(name);
                println!("0x{}  0x{}  {}", h.hex32(), h.hex64(), name);
            }
        }
    }

    Ok(())
}
