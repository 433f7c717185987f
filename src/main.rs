// Spectre: script host with heap snapshot diagnostics

use std::io;
use std::process;
use std::thread;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use spectre::config::{Cli, HostConfig};
use spectre::console::StdConsole;
use spectre::interpreter::engine::Interpreter;
use spectre::session;
use spectre::source::FileSystemSources;

/// Scripts recurse on the native stack, so the session gets a large one
const SESSION_STACK_SIZE: usize = 64 * 1024 * 1024;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("SPECTRE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let status = thread::Builder::new()
        .name("session".to_string())
        .stack_size(SESSION_STACK_SIZE)
        .spawn(move || run(&cli))
        .map(|handle| handle.join().unwrap_or(1))
        .unwrap_or_else(|err| {
            error!(error = %err, "failed to start session thread");
            1
        });

    process::exit(status);
}

fn run(cli: &Cli) -> i32 {
    let config = HostConfig::from(cli);
    let mut interpreter = match Interpreter::new(
        &config,
        Box::new(StdConsole),
        Box::new(FileSystemSources::new()),
    ) {
        Ok(interpreter) => interpreter,
        Err(err) => {
            error!(error = %err, "failed to create execution context");
            return 1;
        }
    };

    if cli.files.is_empty() {
        session::run_interactive(&mut interpreter, io::stdin().lock())
    } else {
        let files: Vec<String> = cli
            .files
            .iter()
            .map(|path| path.to_string_lossy().into_owned())
            .collect();
        session::run_batch(&mut interpreter, &files)
    }
}
