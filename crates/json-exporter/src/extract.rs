//! The extraction engine: walks a JSON document against an endpoint's metric
//! tree and produces the flat sample stream. Extraction is pure over its
//! input, so the stream is deterministic: depth-first, siblings in declared
//! order, wildcard expansions in document order.

use {
    crate::{
        config::{Endpoint, MetricNode},
        expression::TemplateContext,
        modifier::{self, Modifier, Scalar},
    },
    indexmap::IndexMap,
    serde_json::Value,
};

/// Prometheus metric kind. Inherited lexically through the tree and fixed at
/// the leaf.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MetricType {
    #[default]
    Gauge,
    Counter,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Counter => "counter",
        }
    }
}

/// A single extracted measurement, ready for exposition.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub metric_type: MetricType,
    pub labels: IndexMap<String, String>,
    pub value: f64,
}

/// Evaluation state accumulated along a root-to-leaf walk. Children extend a
/// snapshot of the parent's state; nothing is shared backwards.
#[derive(Debug, Clone, Default)]
struct EvalContext {
    prefix: String,
    labels: IndexMap<String, String>,
    metric_type: Option<MetricType>,
    modifiers: Vec<Modifier>,
    captures: Vec<String>,
}

/// Walks `json` against the endpoint's metric tree. Per-sample failures
/// (absent fields, non-numeric leaves, modifier drops) skip the sample
/// silently.
pub fn extract(endpoint: &Endpoint, namespace: &str, json: &Value) -> Vec<Sample> {
    let root = EvalContext {
        prefix: namespace.to_string(),
        ..Default::default()
    };
    let mut samples = Vec::new();
    for node in &endpoint.metrics {
        visit(node, json, &root, &mut samples);
    }
    samples
}

fn visit(node: &MetricNode, json: &Value, parent: &EvalContext, out: &mut Vec<Sample>) {
    for (matched, new_captures) in node.path.resolve(json) {
        let local = new_captures.len();
        let mut captures = parent.captures.clone();
        captures.extend(new_captures);
        let template_ctx = TemplateContext {
            node: matched,
            captures: &captures,
            local,
        };

        let Some(name) = node.name.render(&template_ctx) else {
            tracing::debug!(path = %node.path, "name expression did not resolve, skipping");
            continue;
        };

        let mut labels = parent.labels.clone();
        let resolved = node.labels.iter().all(|label| {
            match label.value.render(&template_ctx) {
                Some(value) => {
                    labels.insert(label.name.clone(), value);
                    true
                }
                None => {
                    tracing::debug!(
                        path = %node.path,
                        label = %label.name,
                        "label expression did not resolve, skipping",
                    );
                    false
                }
            }
        });
        if !resolved {
            continue;
        }

        let context = EvalContext {
            prefix: join_name(&parent.prefix, &name),
            labels,
            metric_type: node.metric_type.or(parent.metric_type),
            modifiers: [parent.modifiers.as_slice(), node.modifiers.as_slice()].concat(),
            captures,
        };

        if node.metrics.is_empty() {
            let Some(scalar) = Scalar::from_json(matched) else {
                tracing::debug!(path = %node.path, "leaf is not a scalar, skipping");
                continue;
            };
            if let Some(value) = modifier::apply(&context.modifiers, scalar) {
                out.push(Sample {
                    name: context.prefix,
                    metric_type: context.metric_type.unwrap_or_default(),
                    labels: context.labels,
                    value,
                });
            }
        } else {
            for child in &node.metrics {
                visit(child, matched, &context, out);
            }
        }
    }
}

fn join_name(prefix: &str, segment: &str) -> String {
    match (prefix.is_empty(), segment.is_empty()) {
        (_, true) => prefix.to_string(),
        (true, false) => segment.to_string(),
        (false, false) => format!("{prefix}_{segment}"),
    }
}
