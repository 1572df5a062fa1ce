//! # StreamIconv CLI
//!
//! Command-line front end for streaming conversions between code pages.

#[cfg(feature = "cli")]
use std::collections::BTreeMap;
#[cfg(feature = "cli")]
use std::fs::{self, File};
#[cfg(feature = "cli")]
use std::io::{self, BufWriter, Read, Write};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
use anyhow::{Context, Result};
#[cfg(feature = "cli")]
use clap::{Args, Parser, Subcommand, ValueEnum};
#[cfg(feature = "cli")]
use serde::Serialize;
#[cfg(feature = "cli")]
use tracing::{debug, info};
#[cfg(feature = "cli")]
use tracing_subscriber::EnvFilter;

#[cfg(feature = "cli")]
use stream_iconv::{CodePage, CodecDescriptor, DelegateSource, Error, Options, Session, alias};

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI features disabled. Enable with --features cli");
    std::process::exit(1);
}

/// StreamIconv: streaming code-page converter
#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "stream-iconv")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format for reports (text, json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Convert a stream from one encoding to another
    Convert(ConvertArgs),

    /// List the encoding names the resolver accepts
    List(ListArgs),

    /// Describe how an encoding name is resolved
    Info(InfoArgs),
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct ConvertArgs {
    /// Source encoding, optionally with `//nocompat`
    #[arg(short = 'f', long = "from")]
    from: String,

    /// Target encoding, optionally with `//nocompat`
    #[arg(short = 't', long = "to")]
    to: String,

    /// Input file (stdin if not specified)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Read and write buffer size (KB)
    #[arg(long, default_value = "64", value_parser = clap::value_parser!(u32).range(1..))]
    buffer_size: u32,

    #[command(flatten)]
    engine: EngineArgs,
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct EngineArgs {
    /// JSON file with session options
    #[arg(long)]
    config: Option<PathBuf>,

    /// Accept obsolete 5- and 6-byte UTF-8 lead bytes
    #[arg(long)]
    legacy_utf8: bool,

    /// Never hand conversions to an external library
    #[arg(long, conflicts_with = "delegate")]
    no_delegate: bool,

    /// External iconv library to try before the built-in engine
    #[arg(long, value_name = "PATH")]
    delegate: Option<PathBuf>,
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct ListArgs {
    /// Only show names of this code page
    #[arg(long)]
    codepage: Option<u32>,

    /// Show codec family and compatibility table
    #[arg(long)]
    details: bool,
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct InfoArgs {
    /// Encoding name, optionally with `//nocompat`
    encoding: String,

    #[command(flatten)]
    engine: EngineArgs,
}

#[cfg(feature = "cli")]
#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[cfg(feature = "cli")]
#[derive(Serialize)]
struct ConversionResult {
    success: bool,
    from: String,
    to: String,
    delegated: bool,
    bytes_processed: usize,
    bytes_written: usize,
    processing_time_ms: u64,
}

#[cfg(feature = "cli")]
#[derive(Serialize)]
struct CodePageEntry {
    codepage: CodePage,
    names: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    compat_entries: Option<usize>,
}

#[cfg(feature = "cli")]
#[derive(Serialize)]
struct EncodingInfo {
    name: String,
    codepage: CodePage,
    preferred_name: Option<&'static str>,
    builtin: bool,
    family: Option<String>,
    compat_entries: usize,
    delegated: bool,
}

#[cfg(feature = "cli")]
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Convert(ref args) => convert_command(args, &cli)?,
        Commands::List(ref args) => list_command(args, &cli)?,
        Commands::Info(ref args) => info_command(args, &cli)?,
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

#[cfg(feature = "cli")]
impl EngineArgs {
    fn options(&self) -> Result<Options> {
        let mut options = match self.config {
            Some(ref path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Invalid config file: {}", path.display()))?
            }
            None => Options::default(),
        };

        if self.legacy_utf8 {
            options.legacy_utf8 = true;
        }
        if self.no_delegate {
            options.delegate = DelegateSource::Disabled;
        } else if let Some(ref path) = self.delegate {
            options.delegate = DelegateSource::Library(path.clone());
        }
        debug!(?options, "session options");
        Ok(options)
    }
}

#[cfg(feature = "cli")]
#[derive(Default)]
struct Totals {
    consumed: usize,
    produced: usize,
}

#[cfg(feature = "cli")]
fn convert_command(args: &ConvertArgs, cli: &Cli) -> Result<()> {
    let start_time = std::time::Instant::now();
    let options = args.engine.options()?;

    let mut session = Session::open_with(&args.to, &args.from, &options)
        .with_context(|| format!("Cannot convert from {} to {}", args.from, args.to))?;
    info!(
        from = %args.from,
        to = %args.to,
        delegated = session.is_delegated(),
        "session opened"
    );

    let mut reader: Box<dyn Read> = match args.input {
        Some(ref path) => Box::new(
            File::open(path)
                .with_context(|| format!("Failed to open input file: {}", path.display()))?,
        ),
        None => Box::new(io::stdin().lock()),
    };
    let mut writer: Box<dyn Write> = match args.output {
        Some(ref path) => Box::new(BufWriter::new(
            File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let buffer_size = args.buffer_size as usize * 1024;
    let mut chunk = vec![0u8; buffer_size];
    let mut out = vec![0u8; buffer_size];
    let mut pending = Vec::with_capacity(buffer_size);
    let mut totals = Totals::default();

    loop {
        let read = reader.read(&mut chunk).context("Failed to read input")?;
        if read == 0 {
            break;
        }
        pending.extend_from_slice(&chunk[..read]);
        let used = pump(&mut session, &pending, &mut out, &mut writer, &mut totals)?;
        pending.drain(..used);
    }

    if !pending.is_empty() {
        anyhow::bail!(
            "Input ends with an incomplete multibyte sequence at offset {}",
            totals.consumed
        );
    }

    let flushed = session
        .flush(&mut out)
        .context("Failed to reset the output encoding")?;
    writer.write_all(&out[..flushed]).context("Failed to write output")?;
    writer.flush().context("Failed to write output")?;
    totals.produced += flushed;

    let processing_time = start_time.elapsed();
    debug!(
        consumed = totals.consumed,
        produced = totals.produced,
        elapsed = ?processing_time,
        "conversion finished"
    );

    match cli.format {
        OutputFormat::Json => {
            let result = ConversionResult {
                success: true,
                from: args.from.clone(),
                to: args.to.clone(),
                delegated: session.is_delegated(),
                bytes_processed: totals.consumed,
                bytes_written: totals.produced,
                processing_time_ms: processing_time.as_millis() as u64,
            };
            eprintln!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Text => {
            if cli.verbose {
                eprintln!(
                    "Converted {} bytes -> {} bytes in {:?}",
                    totals.consumed, totals.produced, processing_time
                );
            }
        }
    }

    Ok(())
}

/// Feed `input` through the session, writing everything produced.
///
/// Returns how many bytes were consumed. A trailing partial sequence is left
/// for the caller to prepend to the next read.
#[cfg(feature = "cli")]
fn pump(
    session: &mut Session,
    input: &[u8],
    out: &mut [u8],
    writer: &mut dyn Write,
    totals: &mut Totals,
) -> Result<usize> {
    let mut offset = 0;

    while offset < input.len() {
        let (progress, stop) = match session.convert(&input[offset..], out) {
            Ok(progress) => (progress, false),
            Err(Error::OutputFull { consumed, produced }) => {
                if consumed == 0 && produced == 0 {
                    anyhow::bail!("Buffer too small for a single character");
                }
                (stream_iconv::Progress { consumed, produced }, false)
            }
            Err(Error::Incomplete { consumed, produced }) => {
                (stream_iconv::Progress { consumed, produced }, true)
            }
            Err(err) => {
                let position = totals.consumed + err.progress().map_or(0, |p| p.consumed);
                if let Some(progress) = err.progress() {
                    writer
                        .write_all(&out[..progress.produced])
                        .context("Failed to write output")?;
                }
                return Err(anyhow::Error::new(err))
                    .with_context(|| format!("Conversion failed at input offset {position}"));
            }
        };

        writer
            .write_all(&out[..progress.produced])
            .context("Failed to write output")?;
        offset += progress.consumed;
        totals.consumed += progress.consumed;
        totals.produced += progress.produced;

        if stop || progress.consumed == 0 {
            break;
        }
    }

    Ok(offset)
}

#[cfg(feature = "cli")]
fn list_command(args: &ListArgs, cli: &Cli) -> Result<()> {
    let mut grouped: BTreeMap<CodePage, Vec<&'static str>> = BTreeMap::new();
    for (codepage, name) in alias::aliases() {
        if args.codepage.is_some_and(|wanted| wanted != codepage.number()) {
            continue;
        }
        grouped.entry(codepage).or_default().push(name);
    }

    let options = Options::builtin_only();
    let entries: Vec<CodePageEntry> = grouped
        .into_iter()
        .map(|(codepage, names)| {
            let descriptor = if args.details {
                describe(codepage, &options)
            } else {
                None
            };
            CodePageEntry {
                codepage,
                names,
                family: descriptor.as_ref().map(|d| d.family().to_string()),
                compat_entries: descriptor
                    .as_ref()
                    .map(|d| d.compat_table().map_or(0, <[_]>::len)),
            }
        })
        .collect();

    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Text => {
            println!("Supported Encodings ({} code pages):", entries.len());
            println!();

            for entry in &entries {
                println!("{:8} {}", entry.codepage.to_string(), entry.names.join(", "));
                if let Some(ref family) = entry.family {
                    println!("         Family: {}", family);
                }
                if let Some(compat) = entry.compat_entries.filter(|&n| n > 0) {
                    println!("         Compatibility entries: {}", compat);
                }
            }
        }
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn describe(codepage: CodePage, options: &Options) -> Option<CodecDescriptor> {
    let spec = alias::parse(&codepage.number().to_string()).ok()?;
    CodecDescriptor::new(&spec, options).ok()
}

#[cfg(feature = "cli")]
fn info_command(args: &InfoArgs, cli: &Cli) -> Result<()> {
    let options = args.engine.options()?;
    let spec = alias::parse(&args.encoding)
        .with_context(|| format!("Cannot resolve encoding: {}", args.encoding))?;
    let descriptor = CodecDescriptor::new(&spec, &Options::builtin_only()).ok();
    let delegated = Session::open_with(&args.encoding, &args.encoding, &options)
        .map(|session| session.is_delegated())
        .unwrap_or(false);

    let info = EncodingInfo {
        name: spec.name().to_string(),
        codepage: spec.codepage(),
        preferred_name: spec.codepage().name(),
        builtin: descriptor.is_some(),
        family: descriptor.as_ref().map(|d| d.family().to_string()),
        compat_entries: descriptor
            .as_ref()
            .and_then(CodecDescriptor::compat_table)
            .map_or(0, <[_]>::len),
        delegated,
    };

    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        OutputFormat::Text => {
            println!("Encoding: {}", info.name);
            println!("Code page: {}", info.codepage);
            if let Some(preferred) = info.preferred_name {
                println!("Preferred name: {}", preferred);
            }
            match info.family {
                Some(ref family) => println!("Family: {}", family),
                None => println!("Family: none built in"),
            }
            if info.compat_entries > 0 {
                println!("Compatibility entries: {}", info.compat_entries);
            } else if !spec.compat() {
                println!("Compatibility: disabled (//nocompat)");
            }
            println!("Delegated: {}", if info.delegated { "yes" } else { "no" });
        }
    }

    Ok(())
}
