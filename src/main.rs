use agent_telegram::app::{self, cli::Cli};
use agent_telegram::logging;
use agent_telegram::process::daemonize::is_daemon_child;
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // No runtime may exist yet when detaching.
    if cli.command.wants_detach() && !is_daemon_child() {
        return report(app::detach());
    }

    logging::init(is_daemon_child());

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };
    report(runtime.block_on(app::run(cli.command)))
}

fn report(result: anyhow::Result<ExitCode>) -> ExitCode {
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
