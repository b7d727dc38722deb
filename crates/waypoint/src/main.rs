use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::{fs, process};

use clap::{Parser, Subcommand};
use waypoint_core::breakpoints::{BreakpointKind, BreakpointStore, Confirmation};
use waypoint_core::memory::{MemoryImage, ScannedString};
use waypoint_core::session::SYMBOL_PATH_ENV;
use waypoint_core::symbols::{LoadOutcome, ObjectSymbolGenerator, SymbolGenerator, SymbolTable};
use waypoint_core::{Address, Session, SessionConfig};
use waypoint_utils::{info, init_logging, init_logging_with_level, log_format_from_env, LogLevel};

type CliResult<T> = Result<T, Box<dyn Error>>;

/// Symbol maps, string scanning and breakpoint-safe patching for native debugging.
#[derive(Parser, Debug)]
#[command(name = "waypoint")]
#[command(version)]
#[command(about = "Symbol maps, string scanning and breakpoint-safe patching for native debugging", long_about = None)]
struct Cli
{
    /// Directory holding `<module>.map` symbol files
    #[arg(long, global = true, env = SYMBOL_PATH_ENV)]
    symbol_path: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace); overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,
    /// Never generate missing symbol files
    #[arg(long, global = true, default_value_t = false)]
    no_generate: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Write a symbol file for a module
    Generate
    {
        /// Module (executable or shared library) to read symbols from
        module: PathBuf,
        /// Output file (default: <symbol-path>/<module name>.map)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Load a module's symbol file and print every symbol
    List
    {
        /// Module whose symbols to list
        #[arg(short, long)]
        module: PathBuf,
        /// Load base of the module (hex)
        #[arg(short, long, default_value = "0")]
        base: Address,
    },
    /// Resolve addresses to `module::symbol+offset` and names to addresses
    Resolve
    {
        /// Module whose symbols to use
        #[arg(short, long)]
        module: PathBuf,
        /// Load base of the module (hex)
        #[arg(short, long, default_value = "0")]
        base: Address,
        /// Addresses (0x-prefixed hex) or symbol names
        #[arg(required = true)]
        targets: Vec<String>,
    },
    /// Find printable strings in a file image
    Strings
    {
        /// File to scan
        image: PathBuf,
        /// Address the file is mapped at (hex)
        #[arg(short, long, default_value = "0")]
        base: Address,
        /// Shortest run reported
        #[arg(long, default_value_t = 4)]
        min: usize,
        /// Longest run read
        #[arg(long, default_value_t = 256)]
        max: usize,
        /// Scan for UTF-16LE instead of single-byte text
        #[arg(long, default_value_t = false)]
        wide: bool,
    },
    /// Patch bytes in a file image, guarding software breakpoints
    Patch
    {
        /// File to patch
        image: PathBuf,
        /// Address the file is mapped at (hex)
        #[arg(short, long, default_value = "0")]
        base: Address,
        /// First address to write (hex)
        #[arg(short, long)]
        address: Address,
        /// Replacement bytes as hex, e.g. `9090c3`
        #[arg(long)]
        bytes: String,
        /// Bytes to write (default: length of --bytes); shortfall is filled
        #[arg(long)]
        size: Option<usize>,
        /// Fill byte (hex)
        #[arg(long, default_value = "00")]
        fill: String,
        /// Software breakpoint to assume at this address (repeatable)
        #[arg(long = "breakpoint")]
        breakpoints: Vec<Address>,
        /// Remove overlapping breakpoints without asking
        #[arg(short, long, default_value_t = false)]
        yes: bool,
        /// Where to save the patched image; without it the result is only printed
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main()
{
    let cli = Cli::parse();

    let logging = match cli.log_level {
        Some(level) => log_format_from_env().and_then(|format| init_logging_with_level(level, format)),
        None => init_logging(),
    };
    if let Err(e) = logging {
        eprintln!("Failed to initialize logging: {e}");
        process::exit(1);
    }

    if let Err(e) = run_command(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(cli: Cli) -> CliResult<()>
{
    let config = SessionConfig {
        symbol_path: cli.symbol_path,
        generate_missing: !cli.no_generate,
    };

    match cli.command {
        Commands::Generate { module, output } => generate(&module, output, &config),
        Commands::List { module, base } => {
            let session = module_session(&module, base, &config)?;
            for symbol in session.symbols().all() {
                println!("{}  {:>8x}  {}  {}", symbol.address, symbol.size, symbol.kind, symbol.demangled_name());
            }
            Ok(())
        }
        Commands::Resolve { module, base, targets } => {
            let session = module_session(&module, base, &config)?;
            for target in &targets {
                println!("{target}\t{}", resolve(&session, &module, target));
            }
            Ok(())
        }
        Commands::Strings {
            image,
            base,
            min,
            max,
            wide,
        } => strings(&image, base, min, max, wide, &config),
        Commands::Patch {
            image,
            base,
            address,
            bytes,
            size,
            fill,
            breakpoints,
            yes,
            output,
        } => {
            let request = PatchRequest {
                address,
                bytes: hex::decode(bytes.trim())?,
                size,
                fill: parse_fill(&fill)?,
                breakpoints,
                yes,
            };
            patch(&image, base, &request, output.as_deref(), &config)
        }
    }
}

fn generate(module: &Path, output: Option<PathBuf>, config: &SessionConfig) -> CliResult<()>
{
    let output = match output {
        Some(path) => path,
        None => {
            let directory = config
                .symbol_path
                .clone()
                .ok_or("no --output given and no symbol path configured")?;
            let mut table = SymbolTable::new();
            table.set_search_path(directory);
            table
                .symbol_file_path(module)
                .ok_or_else(|| format!("{} has no file name", module.display()))?
        }
    };

    ObjectSymbolGenerator::new().generate(module, &output)?;
    println!("Wrote {}", output.display());
    Ok(())
}

/// Session with the symbols of `module` loaded at `base`.
fn module_session(module: &Path, base: Address, config: &SessionConfig) -> CliResult<Session>
{
    let mut session = Session::new(Box::new(MemoryImage::new()), config);
    match session.load_module(module, base)? {
        LoadOutcome::Loaded { symbols } => info!(symbols, module = %module.display(), "symbols loaded"),
        LoadOutcome::NoSearchPath => {
            return Err(format!("no symbol path configured (use --symbol-path or {SYMBOL_PATH_ENV})").into())
        }
        LoadOutcome::Deferred | LoadOutcome::GivenUp => {
            return Err(format!("no symbols available for {}", module.display()).into())
        }
        LoadOutcome::AlreadyLoaded => {}
    }
    Ok(session)
}

fn resolve(session: &Session, module: &Path, target: &str) -> String
{
    if target.starts_with("0x") || target.starts_with("0X") {
        if let Ok(address) = target.parse::<Address>() {
            return session
                .describe_address(address)
                .unwrap_or_else(|| "<no symbol>".to_string());
        }
    }

    let symbols = session.symbols();
    let qualified = module
        .file_name()
        .map(|name| format!("{}::{target}", name.to_string_lossy()));
    let found = symbols
        .find_by_name(target)
        .or_else(|| qualified.as_deref().and_then(|name| symbols.find_by_name(name)));
    if let Some(symbol) = found {
        return symbol.address.to_string();
    }
    if let Some(address) = symbols.find_label(target) {
        return address.to_string();
    }
    "<unknown>".to_string()
}

fn strings(image: &Path, base: Address, min: usize, max: usize, wide: bool, config: &SessionConfig) -> CliResult<()>
{
    let session = Session::from_image(image, base, config)?;
    let length = fs::metadata(image)?.len();
    for (address, string) in find_strings(&session, base, length, min, max, wide) {
        println!("{address}  \"{}\"", string.text);
    }
    Ok(())
}

/// Every non-empty string in `[base, base + length)`, scanning forward past
/// each hit. Always advances by at least one unit.
fn find_strings(
    session: &Session,
    base: Address,
    length: u64,
    min: usize,
    max: usize,
    wide: bool,
) -> Vec<(Address, ScannedString)>
{
    let unit: u64 = if wide { 2 } else { 1 };
    let mut found = Vec::new();

    let mut offset = 0;
    while offset < length {
        let address = base + offset;
        let scanned = if wide {
            session.scan_utf16(address, min, max)
        } else {
            session.scan_ascii(address, min, max)
        };
        let units = scanned.as_ref().map_or(0, |string| string.raw_length as u64);
        if let Some(string) = scanned.filter(|string| string.raw_length > 0) {
            found.push((address, string));
        }
        offset += units.max(1) * unit;
    }
    found
}

struct PatchRequest
{
    address: Address,
    bytes: Vec<u8>,
    size: Option<usize>,
    fill: u8,
    breakpoints: Vec<Address>,
    yes: bool,
}

fn patch(image: &Path, base: Address, request: &PatchRequest, output: Option<&Path>, config: &SessionConfig) -> CliResult<()>
{
    let mut store = BreakpointStore::new();
    for &address in &request.breakpoints {
        store.insert(address, BreakpointKind::Software);
    }

    let confirmation: Box<dyn Confirmation> = if request.yes {
        Box::new(|_: &str| true)
    } else {
        Box::new(StdinConfirmation)
    };

    let mut session = Session::from_image(image, base, config)?
        .with_breakpoints(Box::new(store))
        .with_confirmation(confirmation);

    let size = request.size.unwrap_or(request.bytes.len());
    let report = session.patch(request.address, &request.bytes, size, request.fill)?;
    for removed in &report.removed_breakpoints {
        println!("Removed breakpoint at {removed}");
    }

    let (written, _) = session.adaptive_read(request.address, report.written);
    println!("{}  {}", request.address, hex::encode(&written));

    if let Some(output) = output {
        let length = usize::try_from(fs::metadata(image)?.len())?;
        let patched = session.memory().read(base, length)?;
        fs::write(output, patched)?;
        println!("Wrote {}", output.display());
    }
    Ok(())
}

fn parse_fill(text: &str) -> CliResult<u8>
{
    let digits = text
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    Ok(u8::from_str_radix(digits, 16)?)
}

/// Asks on stderr and reads the answer from stdin; anything but `y`/`yes` is a no.
struct StdinConfirmation;

impl Confirmation for StdinConfirmation
{
    fn ask_yes_no(&mut self, message: &str) -> bool
    {
        eprint!("{message} [y/N] ");
        if io::stderr().flush().is_err() {
            return false;
        }

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}
