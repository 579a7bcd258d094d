//! HTTP surface: the scrape endpoint and a minimal landing page.

use {
    crate::{exposition, scrape::Scraper},
    anyhow::{Context, Result},
    axum::{
        Router,
        extract::State,
        http::header,
        response::{Html, IntoResponse},
        routing::get,
    },
    std::{net::SocketAddr, sync::Arc},
};

const LANDING_PAGE: &str = "<html>\
<head><title>json-exporter</title></head>\
<body><h1>json-exporter</h1><p><a href=\"/metrics\">metrics</a></p></body>\
</html>";

/// Binds the listener and serves until ctrl-c.
pub async fn serve(addr: SocketAddr, scraper: Arc<Scraper>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "serving metrics");
    axum::serve(listener, router(scraper))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await
        .context("http server")
}

pub fn router(scraper: Arc<Scraper>) -> Router {
    Router::new()
        .route("/", get(landing))
        .route("/metrics", get(metrics))
        .with_state(scraper)
}

async fn landing() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

/// Runs a scrape and renders it, appending the process self-metrics. A
/// partial scrape (some endpoints down) is still a 200; the failures show up
/// as `up 0` samples. If the client disconnects, axum drops this future and
/// the in-flight fetches with it.
async fn metrics(State(scraper): State<Arc<Scraper>>) -> impl IntoResponse {
    let samples = scraper.scrape().await;
    let mut body = exposition::render(&samples);
    body.push_str(&observe::metrics::encode(observe::metrics::get_registry()));
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}
