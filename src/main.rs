use clap::Parser;
use tsdb_router::config::cli::Cli;

fn main() {
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to build tokio runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(tsdb_router::run(cli)) {
        eprintln!("fatal error: {err:#}");
        std::process::exit(1);
    }
}
