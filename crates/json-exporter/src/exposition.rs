//! Rendering of the sample stream in the Prometheus text exposition format.

use {
    crate::extract::{MetricType, Sample},
    indexmap::IndexMap,
    std::{borrow::Cow, fmt::Write},
};

/// Renders samples to text format. Families are grouped by metric name in
/// order of first appearance, each preceded by a single `# TYPE` line;
/// within a family, samples keep the order they were received in. Label
/// names serialize in lexicographic order. A sample whose type conflicts
/// with its family is dropped.
pub fn render(samples: &[Sample]) -> String {
    let mut families: IndexMap<&str, (MetricType, Vec<&Sample>)> = IndexMap::new();
    for sample in samples {
        let family = families
            .entry(sample.name.as_str())
            .or_insert_with(|| (sample.metric_type, Vec::new()));
        if family.0 != sample.metric_type {
            tracing::warn!(
                metric = %sample.name,
                "conflicting types within a metric family, dropping sample",
            );
            continue;
        }
        family.1.push(sample);
    }

    let mut out = String::new();
    for (name, (metric_type, samples)) in &families {
        let _ = writeln!(out, "# TYPE {name} {}", metric_type.as_str());
        for sample in samples {
            out.push_str(name);
            write_labels(&mut out, &sample.labels);
            let _ = writeln!(out, " {}", sample.value);
        }
    }
    out
}

fn write_labels(out: &mut String, labels: &IndexMap<String, String>) {
    if labels.is_empty() {
        return;
    }
    let mut names: Vec<&str> = labels.keys().map(String::as_str).collect();
    names.sort_unstable();
    out.push('{');
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{name}=\"{}\"", escape(&labels[*name]));
    }
    out.push('}');
}

/// Escapes a label value per the exposition format: backslash, double quote
/// and line feed.
fn escape(value: &str) -> Cow<'_, str> {
    if !value.contains(['\\', '"', '\n']) {
        return Cow::Borrowed(value);
    }
    let mut escaped = String::with_capacity(value.len() + 2);
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(ch),
        }
    }
    Cow::Owned(escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str, metric_type: MetricType, labels: &[(&str, &str)], value: f64) -> Sample {
        Sample {
            name: name.to_string(),
            metric_type,
            labels: labels
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect::<IndexMap<_, _>>(),
            value,
        }
    }

    #[test]
    fn renders_a_bare_gauge() {
        let samples = [sample("elasticsearch_number_of_nodes", MetricType::Gauge, &[], 3.0)];
        assert_eq!(
            render(&samples),
            "# TYPE elasticsearch_number_of_nodes gauge\nelasticsearch_number_of_nodes 3\n",
        );
    }

    #[test]
    fn renders_counter_families_with_their_type_line() {
        let samples = [sample(
            "elasticsearch_query_time_seconds",
            MetricType::Counter,
            &[],
            2.5,
        )];
        assert_eq!(
            render(&samples),
            "# TYPE elasticsearch_query_time_seconds counter\n\
             elasticsearch_query_time_seconds 2.5\n",
        );
    }

    #[test]
    fn groups_interleaved_samples_by_family_in_first_seen_order() {
        let samples = [
            sample("b_total", MetricType::Counter, &[("id", "1")], 1.0),
            sample("a_size", MetricType::Gauge, &[], 5.0),
            sample("b_total", MetricType::Counter, &[("id", "2")], 2.0),
        ];
        assert_eq!(
            render(&samples),
            "# TYPE b_total counter\n\
             b_total{id=\"1\"} 1\n\
             b_total{id=\"2\"} 2\n\
             # TYPE a_size gauge\n\
             a_size 5\n",
        );
    }

    #[test]
    fn label_names_serialize_in_lexicographic_order() {
        let samples = [sample(
            "up",
            MetricType::Gauge,
            &[("endpoint", "health"), ("cluster", "c1")],
            1.0,
        )];
        assert_eq!(
            render(&samples),
            "# TYPE up gauge\nup{cluster=\"c1\",endpoint=\"health\"} 1\n",
        );
    }

    #[test]
    fn label_values_are_escaped() {
        let samples = [sample(
            "m",
            MetricType::Gauge,
            &[("path", "C:\\data\nline \"two\"")],
            1.0,
        )];
        assert_eq!(
            render(&samples),
            "# TYPE m gauge\nm{path=\"C:\\\\data\\nline \\\"two\\\"\"} 1\n",
        );
    }

    #[test]
    fn conflicting_family_types_drop_the_offending_sample() {
        let samples = [
            sample("m", MetricType::Gauge, &[("id", "1")], 1.0),
            sample("m", MetricType::Counter, &[("id", "2")], 2.0),
            sample("m", MetricType::Gauge, &[("id", "3")], 3.0),
        ];
        assert_eq!(
            render(&samples),
            "# TYPE m gauge\nm{id=\"1\"} 1\nm{id=\"3\"} 3\n",
        );
    }

    #[test]
    fn empty_stream_renders_nothing() {
        assert_eq!(render(&[]), "");
    }
}
