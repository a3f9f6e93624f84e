//! `mirin`: the standalone MIR interpreter.
//!
//! Loads a textual `.mir` file (and its `crate` imports), locates the start
//! item, and runs it with a zero-initialised `(argc, argv)` pair. Exits 0
//! on a clean return, 1 on any interpreter error.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as ClapParser;

use ferroc::mir::interp::InterpreterThread;
use ferroc::mir::module::ModuleTree;
use ferroc::mir::value::Value;
use ferroc::mir::POINTER_SIZE;

#[derive(ClapParser)]
#[command(name = "mirin")]
#[command(about = "Interpreter for ferroc's post-lowering IR", long_about = None)]
#[command(version)]
struct Cli {
    /// IR file to load
    file: PathBuf,
    /// Arguments forwarded to the interpreted program's argv
    #[arg(last = true)]
    args: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut tree = ModuleTree::new();
    if let Err(e) = tree.load_file(&cli.file) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    let entry = match tree.find_entry() {
        Some(p) => p.clone(),
        None => {
            eprintln!("error: no start item in {}", cli.file.display());
            return ExitCode::FAILURE;
        }
    };

    // `(argc, argv)` - zero-initialised; forwarded arguments only bump argc.
    let argc = Value::new_u64(1 + cli.args.len() as u64, POINTER_SIZE);
    let argv = Value::new_usize(0);

    let mut thread = InterpreterThread::new(&tree);
    let arg_count = tree
        .get_function(&entry)
        .map(|f| f.args.len())
        .unwrap_or(0);
    let args = match arg_count {
        0 => Vec::new(),
        1 => vec![argc],
        _ => vec![argc, argv],
    };
    if let Err(e) = thread.start(&entry, args) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match thread.run() {
        Ok(_result) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            eprint!("{}", thread.backtrace());
            ExitCode::FAILURE
        }
    }
}
