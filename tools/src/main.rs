use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use modules::EngineConfig;
use registry::{Platform, ProtocolRegistry, VersionReq};
use tollgate_tools::{
    compile_def, decode_json, decode_with_registry, decode_with_schema, format_compile_report,
    format_decode_pretty, format_discovery, read_capture, DecodedMessage,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "tollgate-tools",
    version,
    about = "tollgate definition, capture and module inspection tools"
)]
struct Cli {
    /// Engine configuration file. Supplies defaults for data and module directories.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a definition file and print its layout.
    Compile {
        /// Paths to `.def` files.
        #[arg(required = true)]
        def_files: Vec<PathBuf>,
    },
    /// Decode captured messages into structured output.
    Decode {
        /// File holding one or more complete messages.
        capture: PathBuf,
        /// Decode every message with this definition file.
        #[arg(long, conflicts_with = "protocol")]
        def: Option<PathBuf>,
        /// Protocol version used to look opcodes up in the registry.
        #[arg(long, required_unless_present = "def")]
        protocol: Option<u32>,
        /// Definition version, `latest` or a number.
        #[arg(long, default_value = "latest")]
        version: VersionReq,
        /// Registry data directory.
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        platform: Option<Platform>,
        /// Output format.
        #[arg(long, value_enum, default_value_t = DecodeFormat::Json)]
        format: DecodeFormat,
    },
    /// Check which modules in a directory would load.
    Modules {
        /// Module directory.
        dir: Option<PathBuf>,
        /// Registry data directory for checking required definitions.
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        platform: Option<Platform>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DecodeFormat {
    Json,
    Pretty,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Command::Compile { def_files } => {
            let mut clean = true;
            for path in &def_files {
                let report = compile_def(path)?;
                clean &= report.is_clean();
                print!("{}", format_compile_report(&report));
            }
            if !clean {
                anyhow::bail!("some definitions did not compile cleanly");
            }
        }
        Command::Decode {
            capture,
            def,
            protocol,
            version,
            data_dir,
            platform,
            format,
        } => {
            let frames = read_capture(&capture, config.limits.wire.clone())?;
            debug!(count = frames.len(), "split capture");
            let decoded: Vec<DecodedMessage> = if let Some(def) = def {
                let report = compile_def(&def)?;
                frames
                    .iter()
                    .map(|frame| decode_with_schema(frame, &report.schema))
                    .collect::<Result<_>>()?
            } else {
                let registry = load_registry(&config, data_dir, platform)?;
                let protocol = protocol.context("--protocol is required without --def")?;
                frames
                    .iter()
                    .map(|frame| decode_with_registry(frame, &registry, protocol, version))
                    .collect::<Result<_>>()?
            };
            match format {
                DecodeFormat::Json => println!("{}", decode_json(&decoded)?),
                DecodeFormat::Pretty => {
                    for message in &decoded {
                        print!("{}", format_decode_pretty(message));
                    }
                }
            }
        }
        Command::Modules {
            dir,
            data_dir,
            platform,
        } => {
            let dir = dir.unwrap_or_else(|| config.module_dir.clone());
            let registry = if data_dir.is_some() || cli.config.is_some() {
                Some(load_registry(&config, data_dir, platform)?)
            } else {
                None
            };
            let discovery =
                modules::discover(&dir, registry.as_ref(), config.support_url.as_deref())
                    .with_context(|| format!("scan modules in {}", dir.display()))?;
            print!("{}", format_discovery(&discovery));
        }
    }
    Ok(())
}

fn load_registry(
    config: &EngineConfig,
    data_dir: Option<PathBuf>,
    platform: Option<Platform>,
) -> Result<ProtocolRegistry> {
    let data_dir = data_dir.unwrap_or_else(|| config.data_dir.clone());
    let platform = platform.unwrap_or(config.platform);
    let registry = ProtocolRegistry::load(&data_dir, platform)
        .with_context(|| format!("load registry from {}", data_dir.display()))?;
    info!(
        platform = %platform,
        protocols = registry.protocols().len(),
        "registry loaded"
    );
    Ok(registry)
}
