use std::env;
use std::fs;
use std::path::PathBuf;

use clap::{ArgAction, ArgGroup, Args, Parser, Subcommand};
use nodl_core::{MergeError, NodlError, merge_documents, parse_documents, parse_with};
use nodl_discovery::discover::{
    Scan, collect_descriptor_paths, descriptor_files_in, discover, file_names, select_files,
};
use nodl_discovery::output::{OutputFormat, format_conflict, format_interface, format_raw};
use nodl_discovery::NodlConfig;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "nodl", version)]
#[command(about = "Inspect and validate node interface descriptors (.nodl.xml)")]
struct Cli {
    /// YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// More log output on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the descriptors installed by a package.
    Show(ShowArgs),
    /// Validate descriptor files.
    Validate(ValidateArgs),
    /// List the descriptor file names a package installs.
    Files(FilesArgs),
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("selection").required(true).args(["all", "file"])))]
struct ShowArgs {
    /// Name of the package to show.
    package: String,
    /// Combine all .nodl.xml files and display the combined output.
    #[arg(short, long, visible_alias = "all-files")]
    all: bool,
    /// Specific .nodl.xml file name(s) to display.
    #[arg(short, long, num_args = 1..)]
    file: Vec<String>,
    /// Print raw file contents, without parsing.
    #[arg(long)]
    raw: bool,
    /// Output format (defaults to the configured one).
    #[arg(long)]
    format: Option<OutputFormat>,
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("selection").required(true).args(["all", "files"])))]
struct ValidateArgs {
    /// Validate all .nodl.xml files in the current directory.
    #[arg(short, long, visible_alias = "all-files")]
    all: bool,
    /// Specific .nodl.xml file(s) or directories to validate.
    files: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct FilesArgs {
    /// Name of the package.
    package: String,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = load_config(cli.config.as_ref()).and_then(|config| match cli.command {
        Command::Show(args) => run_show(args, &config),
        Command::Validate(args) => run_validate(args, &config),
        Command::Files(args) => run_files(args, &config),
    });

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<NodlConfig, String> {
    match path {
        Some(path) => NodlConfig::load(path).map_err(|e| e.to_string()),
        None => Ok(NodlConfig::default()),
    }
}

fn run_show(args: ShowArgs, config: &NodlConfig) -> Result<(), String> {
    let mut paths = discover(&args.package, config).map_err(|e| e.to_string())?;
    if !args.all {
        paths = select_files(&args.package, &paths, &args.file).map_err(|e| e.to_string())?;
    }

    if args.raw {
        for path in &paths {
            let contents = fs::read_to_string(path)
                .map_err(|err| format!("Failed to read '{}': {err}", path.display()))?;
            println!("{}", format_raw(path, &contents));
        }
        return Ok(());
    }

    let documents = parse_documents(&paths, config.parse_options()).map_err(|e| e.to_string())?;
    let merged = merge_documents(&documents).map_err(|err| match err {
        MergeError::Conflict(conflict) => format_conflict(&conflict),
        other => other.to_string(),
    })?;

    let format = args.format.unwrap_or(config.format);
    let rendered = format_interface(&merged, format)?;
    print!("{rendered}");
    if !rendered.ends_with('\n') {
        println!();
    }
    Ok(())
}

fn run_validate(args: ValidateArgs, config: &NodlConfig) -> Result<(), String> {
    let paths = if args.all {
        let cwd = env::current_dir()
            .map_err(|err| format!("Failed to read current directory: {err}"))?;
        descriptor_files_in(&cwd, Scan::TopLevel).map_err(|e| e.to_string())?
    } else {
        collect_descriptor_paths(&args.files).map_err(|e| e.to_string())?
    };

    for path in &paths {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        println!("Validating {name}...");

        match parse_with(path, config.parse_options()) {
            Ok(document) if document.warnings.is_empty() => println!(" Success"),
            Ok(document) => println!(" Success ({} warning(s))", document.warnings.len()),
            Err(err @ NodlError::Io { .. }) => return Err(err.to_string()),
            Err(err) => {
                return Err(format!("Validation of {} failed\n{err}", path.display()));
            }
        }
    }

    println!("All files validated");
    Ok(())
}

fn run_files(args: FilesArgs, config: &NodlConfig) -> Result<(), String> {
    let paths = discover(&args.package, config).map_err(|e| e.to_string())?;
    for name in file_names(&paths) {
        println!("{name}");
    }
    Ok(())
}
