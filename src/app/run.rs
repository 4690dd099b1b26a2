use crate::cli::app_config::Cli;
use crate::cli::request::parse_url;
use crate::http::handler::{Driver, Visit};
use crate::http::proxy::ProxyPolicy;
use crate::http::transport::Transport;
use crate::redirect::follow_redirects;
use crate::report::{print_json, print_visit};
use clap::Parser;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

pub async fn main_with_error() -> Result<Visit, anyhow::Error> {
    let cli: Cli = Cli::parse();
    init_logging(cli.verbosity)?;

    run(cli).await
}

fn init_logging(verbosity: u8) -> Result<(), anyhow::Error> {
    let log_level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy()
        .add_directive("hyper_util=off".parse()?)
        .add_directive("hyper=off".parse()?);
    let subscriber = tracing_subscriber::fmt()
        .without_time()
        .with_level(false)
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
    Ok(())
}

/// Runs one invocation: builds the transport once, then visits the target
/// and, with `-L`, every redirect after it.
pub async fn run(cli: Cli) -> Result<Visit, anyhow::Error> {
    let target = parse_url(&cli.url)?;
    let template = cli.request_template()?;
    let transport = Transport::new(&cli.transport_policy(), ProxyPolicy::from_env())?;

    let mut driver = Driver::new(transport, cli.body_target());
    if cli.json {
        driver = driver.silent();
    }
    let render: fn(&Visit) = if cli.json { print_json } else { print_visit };

    let visit =
        follow_redirects(&mut driver, &template, target, cli.follow_redirects, render).await?;
    Ok(visit)
}
