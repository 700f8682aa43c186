use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "ASSET_EXPLORER_LOG";

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    use asset_relations_explorer::cli::parse;
    let cli = parse();
    init_tracing(cli.verbose, cli.quiet);
    let code = asset_relations_explorer::app::run_cli(cli);
    if code != 0 {
        std::process::exit(code);
    }
}
