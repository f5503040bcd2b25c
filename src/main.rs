use chrono::Local;
use clap::Parser;
use colored::*;
use std::path::PathBuf;
use std::time::Duration;

mod error;
mod flame_tree;
mod heatmap;
mod idle;
mod offset_index;
mod perf_script;
mod range_sampler;
mod scope;
mod server;

use scope::TraceScope;
use server::ServerConfig;

#[derive(Parser)]
#[command(
    name = "flamescope",
    version = "0.1.0",
    about = "Explore perf script traces with heat maps and flame graphs"
)]
struct Cli {
    /// Output of `perf script`. Must be a regular file, it is read more than once
    infile: PathBuf,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8008)]
    port: u16,

    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1")]
    bind: String,

    /// Heatmap rows when a request doesn't ask for a number
    #[arg(
        short,
        long,
        default_value_t = heatmap::DEFAULT_ROWS as u64,
        value_parser = clap::value_parser!(u64).range(1..=heatmap::MAX_ROWS as u64)
    )]
    rows: u64,

    /// Seconds to wait for a client to send its request
    #[arg(short, long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Print debug messages
    #[arg(short, long)]
    debug: bool,
}

fn now() -> String {
    Local::now().format("%a %b %e %H:%M:%S %Y").to_string()
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    println!(
        "{}",
        format!("====> {} Loading infile: {}", now(), cli.infile.display()).green()
    );
    let scope = TraceScope::load(cli.infile)?.with_default_rows(cli.rows as usize);
    match scope.index().bounds() {
        Ok(bounds) => log::debug!(
            "Loaded {} samples from {} to {}",
            scope.index().offsets().len(),
            bounds.start,
            bounds.end
        ),
        Err(_) => log::warn!("{} has no samples", scope.path().display()),
    }

    let config = ServerConfig {
        bind: cli.bind,
        port: cli.port,
        read_timeout: Duration::from_secs(cli.timeout),
    };
    let listener = server::bind(&config)?;
    println!(
        "{}",
        format!(
            "====> {} Server start: http://{}",
            now(),
            listener.local_addr()?
        )
        .green()
    );
    server::serve(&scope, listener, config.read_timeout)?;
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(e) = run(cli) {
        eprintln!("{}", format!("====> Error: {}", e).red());
        std::process::exit(1);
    }
}
