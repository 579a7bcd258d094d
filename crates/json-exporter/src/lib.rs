//! json-exporter polls upstream HTTP endpoints that return JSON documents,
//! extracts scalar values through a declarative extraction tree, decorates
//! them with labels, applies numeric modifiers and serves the result in the
//! Prometheus text exposition format.

pub mod api;
pub mod arguments;
pub mod config;
pub mod exposition;
pub mod expression;
pub mod extract;
pub mod fetch;
pub mod modifier;
pub mod scrape;

use {
    crate::{fetch::HttpFetcher, scrape::Scraper},
    clap::Parser,
    std::{process::ExitCode, sync::Arc},
};

/// Exit code for configuration errors, distinct from runtime fatals.
const EXIT_CONFIG: u8 = 2;

pub async fn start(args: impl Iterator<Item = String>) -> ExitCode {
    let args = arguments::Arguments::parse_from(args);
    observe::tracing::initialize(&args.log_filter);
    observe::panic_hook::install();
    observe::metrics::setup_registry(Some("json_exporter".to_string()), None);
    tracing::info!("running json-exporter with {args:#?}");

    let config = match config::load(&args.config, args.base_url.as_ref()) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(?err, config = %args.config.display(), "configuration error");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    match run(&args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(?err, "fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &arguments::Arguments, config: config::Config) -> anyhow::Result<()> {
    let fetcher = Arc::new(HttpFetcher::new(args.scrape_timeout)?);
    let scraper = Arc::new(Scraper::new(Arc::new(config), fetcher));
    api::serve(args.listen, scraper).await
}
