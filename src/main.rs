use nvr::cli::App;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let (app, args) = App::parse_env();

    // Initialize logging. stdout belongs to --remote-expr output.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if app.verbose { "debug" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let exit_code = app.run(&args)?;
    std::process::exit(exit_code);
}
