use {
    prometheus::{Registry, TextEncoder},
    prometheus_metric_storage::StorageRegistry,
    std::{collections::HashMap, sync::OnceLock},
};

static REGISTRY: OnceLock<StorageRegistry> = OnceLock::new();

/// Configures the global metrics registry with an optional name prefix and
/// default labels. Must be called before the registry is used; panics if the
/// registry was already initialized.
pub fn setup_registry(prefix: Option<String>, labels: Option<HashMap<String, String>>) {
    let registry = Registry::new_custom(prefix, labels).unwrap();
    let storage = StorageRegistry::new(registry);
    if REGISTRY.set(storage).is_err() {
        panic!("metrics registry already initialized");
    }
}

pub fn get_registry() -> &'static Registry {
    get_storage_registry().registry()
}

pub fn get_storage_registry() -> &'static StorageRegistry {
    REGISTRY.get_or_init(|| StorageRegistry::new(Registry::new()))
}

/// Renders every metric of `registry` in the text exposition format.
pub fn encode(registry: &Registry) -> String {
    let mut buffer = String::new();
    TextEncoder::new()
        .encode_utf8(&registry.gather(), &mut buffer)
        .unwrap();
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_registered_metrics() {
        let registry = Registry::new();
        let counter = prometheus::IntCounter::new("requests", "Total requests.").unwrap();
        registry.register(Box::new(counter.clone())).unwrap();
        counter.inc();

        let encoded = encode(&registry);
        assert!(encoded.contains("# TYPE requests counter"));
        assert!(encoded.contains("requests 1"));
    }
}
