//! schemaref CLI
//!
//! Command-line interface for resolving, dereferencing, and bundling
//! JSON Schema `$ref`s.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use schemaref::{
    bundle, dereference, parse, resolve, CircularPolicy, Error, Options, PathType,
};

#[derive(Parser)]
#[command(name = "schemaref")]
#[command(about = "Resolve, dereference, and bundle JSON Schema $refs")]
#[command(version)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a single document without following any $refs
    Parse {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Crawl every document reachable from the root and list them
    Resolve {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// Only list locations of this type: file or http
        #[arg(long)]
        r#type: Option<String>,

        /// Output the report as JSON (for automation)
        #[arg(long)]
        json: bool,

        /// Collect per-ref failures instead of stopping at the first one
        #[arg(long)]
        continue_on_error: bool,
    },

    /// Replace every $ref with its target value
    Dereference {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// Circular $ref handling: allow, ignore, or error. Defaults to
        /// error here (unlike the library's allow) because cyclic output
        /// cannot be serialized to JSON anyway.
        #[arg(long, default_value = "error")]
        circular: String,

        /// Collect per-ref failures instead of stopping at the first one
        #[arg(long)]
        continue_on_error: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Inline every external document into the root's $defs
    Bundle {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// Collect per-ref failures instead of stopping at the first one
        #[arg(long)]
        continue_on_error: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    }

    let result = match cli.command {
        Commands::Parse {
            schema,
            output,
            pretty,
        } => run_parse(&schema, output, pretty),

        Commands::Resolve {
            schema,
            r#type,
            json,
            continue_on_error,
        } => run_resolve(&schema, r#type.as_deref(), json, continue_on_error),

        Commands::Dereference {
            schema,
            circular,
            continue_on_error,
            output,
            pretty,
        } => run_dereference(&schema, &circular, continue_on_error, output, pretty),

        Commands::Bundle {
            schema,
            continue_on_error,
            output,
            pretty,
        } => run_bundle(&schema, continue_on_error, output, pretty),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn run_parse(schema: &str, output: Option<PathBuf>, pretty: bool) -> Result<(), u8> {
    let value = parse(schema, &Options::default()).map_err(report)?;
    write_output(&value, output, pretty)
}

fn run_resolve(
    schema: &str,
    type_filter: Option<&str>,
    json: bool,
    continue_on_error: bool,
) -> Result<(), u8> {
    let filter = match type_filter {
        None => None,
        Some("file") => Some(PathType::File),
        Some("http") => Some(PathType::Http),
        Some(other) => {
            eprintln!("Error: unknown type filter \"{}\" (expected file or http)", other);
            return Err(2);
        }
    };

    let options = Options::default().continue_on_error(continue_on_error);
    let refs = resolve(schema, &options).map_err(report)?;

    let paths = refs.paths(filter);
    if json {
        let report = serde_json::json!({
            "root": refs.root_location(),
            "paths": paths,
        });
        println!("{}", report);
    } else {
        for path in paths {
            println!("{}", path);
        }
    }
    Ok(())
}

fn run_dereference(
    schema: &str,
    circular: &str,
    continue_on_error: bool,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let Some(policy) = CircularPolicy::parse(circular) else {
        eprintln!(
            "Error: unknown circular policy \"{}\" (expected allow, ignore, or error)",
            circular
        );
        return Err(2);
    };

    let options = Options::default()
        .circular(policy)
        .continue_on_error(continue_on_error);
    let result = dereference(schema, &options).map_err(report)?;

    // Cycles survive in the graph but cannot be printed as JSON.
    let value = result.to_value().map_err(report)?;
    write_output(&value, output, pretty)
}

fn run_bundle(
    schema: &str,
    continue_on_error: bool,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let options = Options::default().continue_on_error(continue_on_error);
    let value = bundle(schema, &options).map_err(report)?;
    write_output(&value, output, pretty)
}

fn report(e: Error) -> u8 {
    eprintln!("Error: {}", e);
    u8::try_from(e.exit_code()).unwrap_or(1)
}

fn write_output(
    value: &serde_json::Value,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let json_output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}
