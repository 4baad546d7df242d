//! Interactive REPL for a single Bitcask-style store: argument parsing,
//! the shell loop, and log wiring live here, outside the `bitcask`
//! library itself.

use std::path::PathBuf;
use std::process::ExitCode;

use bitcask::{Engine, Options};
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// A REPL for an embedded Bitcask-style key/value store.
#[derive(Parser, Debug)]
#[command(name = "cask", version, about)]
struct Args {
    /// Path to the database directory (created if it doesn't exist).
    db_path: PathBuf,

    /// Enable CRC verification on reads.
    #[arg(short = 'c', long = "checksum")]
    checksum: bool,

    /// Maximum size, in bytes, of a single log segment before it rotates.
    #[arg(short = 'd', long = "dead-bytes-threshold", default_value_t = 128 * 1024 * 1024)]
    dead_bytes_threshold: u32,
}

fn main() -> ExitCode {
    init_logging();

    let args = Args::parse();

    let options = Options::new(args.dead_bytes_threshold, args.checksum);
    let engine = match Engine::open_with_options(&args.db_path, options) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("Unable to open database at {:?}: {err}", args.db_path);
            return ExitCode::FAILURE;
        }
    };

    run_repl(&engine)
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    tracing_log::LogTracer::init().ok();
    std::panic::set_hook(Box::new(tracing_panic::panic_hook));
}

const HELP: &str = "\
set <key> <value>\tSet the value of a string key to a string
get <key>\t\tGet the string value of a given string key
rm <key>\t\tRemove a given key
help\t\t\tDisplays the help output
clear\t\t\tClear the screen
quit\t\t\tExit the repl";

fn run_repl(engine: &Engine) -> ExitCode {
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("failed to start the line editor: {err}");
            return ExitCode::FAILURE;
        }
    };

    println!("Welcome to cask. Type 'help' for help, 'quit' to exit.");

    loop {
        match rl.readline("cask> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line).ok();

                match dispatch(engine, line) {
                    Dispatch::Continue => {}
                    Dispatch::Clear => {
                        print!("\x1b[2J\x1b[H");
                    }
                    Dispatch::Quit => break,
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("readline error: {err}");
                break;
            }
        }
    }

    ExitCode::SUCCESS
}

enum Dispatch {
    Continue,
    Clear,
    Quit,
}

fn dispatch(engine: &Engine, line: &str) -> Dispatch {
    let Some(command) = shlex::split(line) else {
        eprintln!("error: unbalanced quoting");
        return Dispatch::Continue;
    };

    match command.as_slice() {
        [] => {}
        [cmd] if cmd == "quit" || cmd == "exit" => return Dispatch::Quit,
        [cmd] if cmd == "clear" => return Dispatch::Clear,
        [cmd] if cmd == "help" => println!("{HELP}"),
        [cmd, key] if cmd == "get" => run_get(engine, key.as_bytes()),
        [cmd, key] if cmd == "rm" => run_rm(engine, key.as_bytes()),
        [cmd, key, rest @ ..] if cmd == "set" && !rest.is_empty() => {
            let value = rest.join(" ");
            run_set(engine, key.as_bytes(), value.as_bytes());
        }
        _ => eprintln!("error: unrecognized command, type 'help' for usage"),
    }

    Dispatch::Continue
}

fn run_get(engine: &Engine, key: &[u8]) {
    let mut out = Vec::new();
    match engine.get(key, &mut out) {
        Ok(true) => println!("{}", String::from_utf8_lossy(&out)),
        Ok(false) => println!("(nil)"),
        Err(err) => eprintln!("error: {err}"),
    }
}

fn run_set(engine: &Engine, key: &[u8], value: &[u8]) {
    if let Err(err) = engine.insert(key, value) {
        eprintln!("error: {err}");
    }
}

fn run_rm(engine: &Engine, key: &[u8]) {
    if let Err(err) = engine.delete(key) {
        eprintln!("error: {err}");
    }
}
