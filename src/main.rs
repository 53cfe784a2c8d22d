use argh::FromArgs;
use jobsh::{Config, Interpreter};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// Interactive shell with job control.
struct Args {
    #[argh(option)]
    /// configuration file; defaults to ~/.myshellrc.
    config: Option<PathBuf>,

    #[argh(switch, short = 'v')]
    /// log debug output to standard error.
    verbose: bool,

    #[argh(option, short = 'c')]
    /// run a single command line and exit with its status.
    command: Option<String>,
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();

    let (config, config_error) = match args.config.or_else(Config::default_path) {
        Some(path) => match Config::load(&path) {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        },
        None => (Config::default(), None),
    };
    init_tracing(if args.verbose { "debug" } else { config.log_level.as_str() });
    if let Some(e) = config_error {
        warn!(error = %e, "using default configuration");
    }

    let mut shell = Interpreter::new(config);
    if let Some(command) = args.command {
        let status = shell.dispatch(&command);
        return ExitCode::from(u8::try_from(status).unwrap_or(1));
    }

    match shell.repl() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("jobsh: {e}");
            ExitCode::FAILURE
        }
    }
}
