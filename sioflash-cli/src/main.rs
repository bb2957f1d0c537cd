//! sioflash CLI - Command-line tool for reflashing ITE SuperIO ECs.
//!
//! ## Features
//!
//! - Probe the SuperIO and report chip, flash size and firmware version
//! - Read the EC flash out to a file
//! - Write signed firmware images with per-chunk verification
//! - Shell completion generation
//! - Environment variable support

use {
    anyhow::Result,
    clap::{Parser, Subcommand, ValueEnum},
    clap_complete::Shell,
    env_logger::Env,
    log::debug,
    std::path::PathBuf,
};

mod commands;

use commands::{cmd_completions, cmd_info, cmd_read, cmd_write};

/// sioflash - reflash ITE SuperIO embedded controllers over `/dev/port`.
///
/// Environment variables:
///   SIOFLASH_DEVICE - Port device path (default: /dev/port)
///   SIOFLASH_CHIP   - Default chipset (it8512, it8587, it8987)
#[derive(Parser)]
#[command(name = "sioflash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Character device exposing the x86 I/O-port space.
    #[arg(
        short = 'd',
        long,
        global = true,
        default_value = sioflash::port::native::DEFAULT_DEVICE_PATH,
        env = "SIOFLASH_DEVICE"
    )]
    device_path: PathBuf,

    /// Target chipset.
    #[arg(
        short,
        long,
        global = true,
        default_value = "it8987",
        env = "SIOFLASH_CHIP"
    )]
    chip: Chip,

    /// SuperIO index port (hex).
    #[arg(long, global = true, default_value = "0x2e", value_parser = parse_hex_u16)]
    sio_port: u16,

    /// Dump register banks and EC parameters during setup.
    #[arg(long, global = true)]
    diagnostics: bool,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Supported chipsets.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Chip {
    /// IT8512 (IT85xx family, read-only).
    It8512,
    /// IT8587 (IT85xx family, read-only).
    It8587,
    /// IT8987 (IT89xx family, default).
    It8987,
}

impl Chip {
    /// Chipset name as listed in the library's known-chipset table.
    fn name(self) -> &'static str {
        match self {
            Self::It8512 => "it8512",
            Self::It8587 => "it8587",
            Self::It8987 => "it8987",
        }
    }
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Probe the EC and show chip information.
    Info {
        /// Output information as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Read the EC flash into a file.
    Read {
        /// Destination file for the flash contents.
        output: PathBuf,
    },

    /// Write a firmware image to the EC flash.
    Write {
        /// Path to the firmware image file.
        firmware: PathBuf,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Parse a hexadecimal port address (supports 0x prefix).
fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let s = s.trim();
    let s = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(s, 16).map_err(|e| format!("Invalid hex port: {e}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "sioflash v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    match &cli.command {
        Commands::Info { json } => cmd_info(&cli, *json),
        Commands::Read { output } => cmd_read(&cli, output),
        Commands::Write { firmware } => cmd_write(&cli, firmware),
        Commands::Completions { shell } => {
            cmd_completions(*shell);
            Ok(())
        }
    }
}
