mod cli;
mod logging;
mod run;
mod snapshot;

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("trellis error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run::run(args).await
}
