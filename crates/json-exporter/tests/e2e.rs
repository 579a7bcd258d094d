//! Drives a full scrape through the exporter's HTTP surface against a mock
//! upstream server.

use {
    axum::{Json, Router, routing::get},
    json_exporter::{api, config, fetch::HttpFetcher, scrape::Scraper},
    serde_json::json,
    std::{net::SocketAddr, sync::Arc, time::Duration},
    url::Url,
};

/// Spawns a server for the given router on an ephemeral port.
async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    addr
}

/// A pretend Elasticsearch: a cluster health document, a root document for
/// global labels, and nothing else (fetches of other paths fail).
async fn spawn_upstream() -> SocketAddr {
    let app = Router::new()
        .route("/", get(|| async { Json(json!({"cluster_name": "c1"})) }))
        .route(
            "/_cluster/health",
            get(|| async {
                Json(json!({
                    "cluster_name": "c1",
                    "status": "yellow",
                    "number_of_nodes": 3,
                }))
            }),
        );
    spawn(app).await
}

const CONFIG: &str = "
namespace: elasticsearch
global_labels:
- url: /
  labels:
  - name: cluster
    value: '${$.cluster_name}'
endpoints:
- id: health
  url: /_cluster/health
  metrics:
  - path: number_of_nodes
  - path: status
    name: status
    labels:
    - name: color
      value: yellow
    modifiers:
    - name: eq
      args: [yellow]
- id: nodes
  url: /_nodes/stats
  metrics:
  - path: nodes_total
";

#[tokio::test]
async fn scrapes_partial_upstreams_into_text_format() {
    let upstream = spawn_upstream().await;
    let base: Url = format!("http://{upstream}").parse().unwrap();
    let config = config::from_yaml(CONFIG, Some(&base)).unwrap();

    let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(2)).unwrap());
    let scraper = Arc::new(Scraper::new(Arc::new(config), fetcher));
    let exporter = spawn(api::router(scraper)).await;

    let response = reqwest::get(format!("http://{exporter}/metrics"))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(
        response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/plain"),
    );

    let body = response.text().await.unwrap();
    let lines: Vec<&str> = body.lines().collect();

    // Extracted samples, decorated with the global cluster label.
    assert!(lines.contains(&"# TYPE elasticsearch_number_of_nodes gauge"));
    assert!(lines.contains(&"elasticsearch_number_of_nodes{cluster=\"c1\"} 3"));
    assert!(lines.contains(&"elasticsearch_status{cluster=\"c1\",color=\"yellow\"} 1"));

    // The broken endpoint is reported, not fatal: label names in
    // lexicographic order, one family header for both `up` samples.
    assert!(lines.contains(&"# TYPE up gauge"));
    assert!(lines.contains(&"up{cluster=\"c1\",endpoint=\"health\"} 1"));
    assert!(lines.contains(&"up{cluster=\"c1\",endpoint=\"nodes\"} 0"));

    // Process self-metrics are appended after the extracted stream.
    assert!(body.contains("scrape_scrapes"));
}

#[tokio::test]
async fn landing_page_links_to_metrics() {
    let upstream = spawn_upstream().await;
    let base: Url = format!("http://{upstream}").parse().unwrap();
    let config = config::from_yaml(CONFIG, Some(&base)).unwrap();

    let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(2)).unwrap());
    let scraper = Arc::new(Scraper::new(Arc::new(config), fetcher));
    let exporter = spawn(api::router(scraper)).await;

    let response = reqwest::get(format!("http://{exporter}/")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.text().await.unwrap().contains("/metrics"));
}
