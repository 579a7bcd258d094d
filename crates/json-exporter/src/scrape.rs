//! Per-scrape orchestration: concurrent fan-out over endpoints and global
//! label sources, the `up` self-metric, and global label decoration.

use {
    crate::{
        config::{Config, Endpoint, GlobalLabelSource},
        expression::TemplateContext,
        extract::{self, MetricType, Sample},
        fetch::FetchJson,
    },
    futures::future::join_all,
    indexmap::IndexMap,
    std::sync::Arc,
};

#[derive(prometheus_metric_storage::MetricStorage)]
#[metric(subsystem = "scrape")]
struct Metrics {
    /// Total number of scrapes served.
    scrapes: prometheus::IntCounter,
    /// Upstream fetches by endpoint and result.
    #[metric(labels("endpoint", "result"))]
    fetches: prometheus::IntCounterVec,
}

impl Metrics {
    fn get() -> &'static Self {
        Metrics::instance(observe::metrics::get_storage_registry()).unwrap()
    }
}

/// Executes scrapes against the compiled configuration. The scheduler is the
/// only component that fans out; extraction itself is pure.
pub struct Scraper {
    config: Arc<Config>,
    fetcher: Arc<dyn FetchJson>,
}

impl Scraper {
    pub fn new(config: Arc<Config>, fetcher: Arc<dyn FetchJson>) -> Self {
        Self { config, fetcher }
    }

    /// Runs one full scrape. All endpoint and global label fetches run
    /// concurrently; the returned stream keeps endpoint declaration order,
    /// with each endpoint's `up` sample following its extracted samples.
    /// Global labels decorate every sample but never override one the
    /// endpoint already set.
    pub async fn scrape(&self) -> Vec<Sample> {
        Metrics::get().scrapes.inc();

        let endpoints = join_all(
            self.config
                .endpoints
                .iter()
                .map(|endpoint| self.scrape_endpoint(endpoint)),
        );
        let globals = join_all(
            self.config
                .global_labels
                .iter()
                .map(|source| self.resolve_source(source)),
        );
        let (endpoint_samples, global_labels) = futures::join!(endpoints, globals);

        // Later sources override earlier ones on name clashes.
        let mut labels = IndexMap::new();
        for resolved in global_labels {
            labels.extend(resolved);
        }

        let mut samples: Vec<Sample> = endpoint_samples.into_iter().flatten().collect();
        for sample in &mut samples {
            for (name, value) in &labels {
                if !sample.labels.contains_key(name) {
                    sample.labels.insert(name.clone(), value.clone());
                }
            }
        }
        samples
    }

    async fn scrape_endpoint(&self, endpoint: &Endpoint) -> Vec<Sample> {
        let mut samples = match self.fetcher.fetch(&endpoint.url).await {
            Ok(json) => {
                Metrics::get()
                    .fetches
                    .with_label_values(&[&endpoint.id, "ok"])
                    .inc();
                extract::extract(endpoint, &self.config.namespace, &json)
            }
            Err(err) => {
                Metrics::get()
                    .fetches
                    .with_label_values(&[&endpoint.id, "error"])
                    .inc();
                tracing::warn!(endpoint = %endpoint.id, ?err, "upstream fetch failed");
                return vec![up_sample(endpoint, 0.0)];
            }
        };
        samples.push(up_sample(endpoint, 1.0));
        samples
    }

    async fn resolve_source(&self, source: &GlobalLabelSource) -> IndexMap<String, String> {
        let json = match self.fetcher.fetch(&source.url).await {
            Ok(json) => json,
            Err(err) => {
                tracing::warn!(url = %source.url, ?err, "global label fetch failed");
                return IndexMap::new();
            }
        };
        let ctx = TemplateContext {
            node: &json,
            captures: &[],
            local: 0,
        };
        let mut labels = IndexMap::new();
        for label in &source.labels {
            match label.value.render(&ctx) {
                Some(value) => {
                    labels.insert(label.name.clone(), value);
                }
                None => tracing::warn!(
                    label = %label.name,
                    url = %source.url,
                    "global label expression did not resolve",
                ),
            }
        }
        labels
    }
}

fn up_sample(endpoint: &Endpoint, value: f64) -> Sample {
    Sample {
        name: "up".to_string(),
        metric_type: MetricType::Gauge,
        labels: IndexMap::from([("endpoint".to_string(), endpoint.id.clone())]),
        value,
    }
}
