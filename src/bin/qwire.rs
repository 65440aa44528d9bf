//! qwire: inspect and build q IPC messages from the shell.
//!
//! # Usage
//!
//! ```bash
//! # Decode a message
//! qwire decode 0100000011000000f90100000000000000
//!
//! # Encode a JSON value
//! qwire encode '{"atom":{"long":1}}'
//!
//! # Show only the header
//! qwire inspect 0100000011000000f90100000000000000
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use qwire::prelude::*;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "qwire")]
#[command(version)]
#[command(about = "q/kdb+ IPC message codec", long_about = None)]
#[command(after_help = "EXAMPLES:
    qwire decode 0100000011000000f90100000000000000
    qwire encode '{\"vector\":{\"data\":{\"symbol\":[\"abc\",\"cdefgh\"]}}}'
    qwire types")]
struct Cli {
    /// Config file (defaults to ./qwire.toml, then the user config dir)
    #[arg(long, global = true, env = "QWIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Q,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a message and print its value
    Decode {
        /// Message bytes as hex
        hex: Option<String>,

        /// Read raw message bytes from a file instead
        #[arg(short = 'f', long)]
        file: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "q")]
        format: OutputFormat,
    },
    /// Encode a JSON value and print the message as hex
    Encode {
        /// Value in qwire's JSON form
        json: String,

        /// Protocol version negotiated with the peer
        #[arg(short, long)]
        protocol: Option<u8>,

        /// Write one-char strings as char atoms
        #[arg(long)]
        char_atoms: bool,
    },
    /// Print the header of a message
    Inspect {
        /// Message bytes as hex
        hex: String,
    },
    /// Show the type registry
    Types,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "qwire=debug" } else { "qwire=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    debug!(?config, "loaded config");

    match &cli.command {
        Commands::Decode { hex, file, format } => {
            let bytes = match (hex, file) {
                (_, Some(path)) => std::fs::read(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (Some(hex), None) => parse_hex(hex)?,
                (None, None) => bail!("Provide message hex or --file"),
            };
            decode(&bytes, format, cli.verbose)
        }
        Commands::Encode {
            json,
            protocol,
            char_atoms,
        } => {
            let mut options = config.codec;
            if let Some(version) = protocol {
                options.protocol_version = *version;
            }
            if *char_atoms {
                options.single_char_strings = CharStringPolicy::AsCharAtom;
            }
            encode(json, &options, cli.verbose)
        }
        Commands::Inspect { hex } => inspect(&parse_hex(hex)?),
        Commands::Types => {
            show_types();
            Ok(())
        }
    }
}

fn decode(bytes: &[u8], format: &OutputFormat, verbose: bool) -> Result<()> {
    let message = QDecoder::new().decode_message(bytes)?;
    if verbose {
        print_header(&message.header);
        println!();
    }
    match format {
        OutputFormat::Q => match &message.value {
            Value::Error(text) => println!("{}", format!("'{text}").red()),
            value => println!("{value}"),
        },
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&message.value)?),
    }
    Ok(())
}

fn encode(json: &str, options: &EncodeOptions, verbose: bool) -> Result<()> {
    let value: Value = serde_json::from_str(json).context("Invalid value JSON")?;
    if verbose {
        println!("{} {}", "Value:".dimmed(), value.to_string().yellow());
    }
    let bytes = qwire::encode(&value, options)?;
    if verbose {
        println!("{} {} bytes", "Length:".dimmed(), bytes.len().to_string().cyan());
    }
    println!("{}", to_hex(&bytes));
    Ok(())
}

fn inspect(bytes: &[u8]) -> Result<()> {
    let header = MessageHeader::parse(bytes)?;
    print_header(&header);
    if bytes.len() != header.length {
        println!(
            "{}",
            format!(
                "⚠ header declares {} bytes, {} given",
                header.length,
                bytes.len()
            )
            .yellow()
        );
    }
    Ok(())
}

fn print_header(header: &MessageHeader) {
    println!("{}", "Header:".green().bold());
    println!("  {} {:?}", "Endianness:".dimmed(), header.endianness);
    println!("  {} {:?}", "Type:".dimmed(), header.message_type);
    println!("  {} {}", "Compressed:".dimmed(), header.compressed);
    println!("  {} {}", "Length:".dimmed(), header.length.to_string().cyan());
}

fn show_types() {
    println!("{}", "q Type Registry".cyan().bold());
    println!();
    println!(
        "{:>5} {:18} {:5} {:6} {:8} {}",
        "Code".white().bold(),
        "Name".white().bold(),
        "Char".white().bold(),
        "Width".white().bold(),
        "Version".white().bold(),
        "Null bytes".white().bold()
    );
    println!("{}", "─".repeat(72).dimmed());

    let codes = (0..=127).chain(std::iter::once(-128));
    for tag in codes.filter_map(TypeTag::from_code) {
        let width = tag.width().map(|w| w.to_string()).unwrap_or_else(|| "-".into());
        let null = tag.null_bits().map(to_hex).unwrap_or_default();
        println!(
            "{:>5} {:18} {:5} {:6} {:8} {}",
            tag.code(),
            tag.name().yellow(),
            tag.type_char().map(String::from).unwrap_or_default(),
            width,
            tag.min_protocol_version(),
            null.dimmed()
        );
    }
}

fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits: Vec<u8> = text
        .trim()
        .trim_start_matches("0x")
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        bail!("Hex input has an odd number of digits");
    }
    digits
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair)?;
            u8::from_str_radix(pair, 16).with_context(|| format!("Invalid hex byte '{pair}'"))
        })
        .collect()
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
