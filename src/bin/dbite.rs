//! # dbite CLI Entry Point
//!
//! Binary entry point for the dbite command-line interface.
//!
//! ## Usage
//!
//! ```bash
//! # Open existing store (created if missing)
//! dbite ./data.db
//!
//! # Create a new store explicitly
//! dbite --create ./new.db
//!
//! # Show version
//! dbite --version
//!
//! # Show help
//! dbite --help
//! ```

use std::env;
use std::path::PathBuf;

use dbite::cli::Repl;
use dbite::Store;
use eyre::{bail, Result, WrapErr};

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    let mut create_mode = false;
    let mut db_path: Option<PathBuf> = None;

    for arg in &args[1..] {
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            "--version" | "-v" => {
                println!("dbite {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--create" | "-c" => {
                create_mode = true;
            }
            arg if arg.starts_with('-') => {
                bail!("Unknown option: {}", arg);
            }
            path => {
                if db_path.is_some() {
                    bail!("Multiple database paths specified");
                }
                db_path = Some(PathBuf::from(path));
            }
        }
    }

    let db_path = match db_path {
        Some(p) => p,
        None => {
            print_usage();
            return Ok(());
        }
    };

    if create_mode && db_path.exists() {
        bail!("'{}' already exists", db_path.display());
    }

    let store = Store::open(&db_path)
        .wrap_err_with(|| format!("failed to open store at {:?}", db_path))?;

    let mut repl = Repl::new(store)?;
    repl.run()?;

    Ok(())
}

fn print_usage() {
    println!("dbite - embedded copy-on-write key/value store");
    println!();
    println!("USAGE:");
    println!("    dbite [OPTIONS] <DATABASE_PATH>");
    println!();
    println!("ARGS:");
    println!("    <DATABASE_PATH>    Path to the store file");
    println!();
    println!("OPTIONS:");
    println!("    -c, --create       Require that the store does not exist yet");
    println!("    -h, --help         Print help information");
    println!("    -v, --version      Print version information");
    println!();
    println!("EXAMPLES:");
    println!("    dbite ./data.db           Open or create a store at ./data.db");
    println!("    dbite --create ./new.db   Create a new store at ./new.db");
}
