use poctopo::cli::Cli;
use poctopo::config::{self, Opt, SessionConfig};
use poctopo::runner::ShellRunner;
use poctopo::session;
use structopt::StructOpt;

#[tokio::main]
async fn main() {
    if config::wants_help(std::env::args()) {
        print!("{}", config::usage());
        std::process::exit(1);
    }

    pretty_env_logger::formatted_builder()
        .parse_filters(&std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let config = SessionConfig::from(Opt::from_args());
    let history = config.history.clone();

    let result = session::run(config, Box::new(ShellRunner), |net| {
        Cli::new(net).run(&history)
    })
    .await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
