//! The `ferroc` build-driver CLI.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser as ClapParser, Subcommand};

use ferroc::dump::dump_crate;
use ferroc::project::{build_order, find_project_root, run_front_end};
use ferroc::token::Edition;

#[derive(ClapParser)]
#[command(name = "ferroc")]
#[command(about = "The ferroc compiler driver", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a single source file and dump the reconstructed source
    Parse {
        /// Source file
        file: PathBuf,
        /// Language edition (2015, 2018, 2021)
        #[arg(long, default_value = "2015")]
        edition: String,
        /// Print the AST dump to stdout
        #[arg(long, short)]
        dump: bool,
    },
    /// Check every package of the current project for front-end errors
    Check,
    /// Run the front end over the whole project in dependency order
    Build,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("error: {}", msg);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Parse {
            file,
            edition,
            dump,
        } => {
            let edition = Edition::from_str(&edition)
                .ok_or_else(|| format!("unknown edition `{}`", edition))?;
            let name = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "crate".to_string());
            let source = std::fs::read_to_string(&file)
                .map_err(|e| format!("unable to read {}: {}", file.display(), e))?;
            let parsed = run_front_end(&name, &file, edition).map_err(|e| match e {
                ferroc::project::BuildError::Parse { error, .. } => {
                    error.display_with_source(&source)
                }
                other => other.to_string(),
            })?;
            if dump {
                print!("{}", dump_crate(&parsed.items));
            } else {
                println!(
                    "{}: {} top-level items (edition {})",
                    file.display(),
                    parsed.items.len(),
                    parsed.edition
                );
            }
            Ok(())
        }
        Commands::Check | Commands::Build => {
            let cwd = std::env::current_dir().map_err(|e| e.to_string())?;
            let root = find_project_root(&cwd)
                .ok_or_else(|| "no Ferroc.toml found in this directory or above".to_string())?;
            let order = build_order(&root).map_err(|e| e.to_string())?;
            for (dir, manifest) in &order {
                let edition = Edition::from_str(&manifest.package.edition)
                    .ok_or_else(|| format!("unknown edition `{}`", manifest.package.edition))?;
                let entry = dir.join(&manifest.package.entry);
                run_front_end(&manifest.package.name, &entry, edition)
                    .map_err(|e| e.to_string())?;
                println!("checked {}", manifest.package.name);
            }
            Ok(())
        }
    }
}
