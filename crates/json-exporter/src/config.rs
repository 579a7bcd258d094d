//! Configuration loading: the YAML schema, structural validation and
//! compilation into the immutable extraction tree. Everything dynamic about
//! an expression is parsed here, once; scrapes only evaluate compiled forms.

use {
    crate::{
        expression::{PathExpr, Template},
        extract::MetricType,
        modifier::Modifier,
    },
    anyhow::{Context, Result, anyhow, bail, ensure},
    indexmap::IndexMap,
    serde::Deserialize,
    std::path::Path,
    url::Url,
};

/// Known unit suffixes rewritten when a metric name is derived from its path.
/// Rewrites to other units (e.g. millis to seconds) stay explicit: a `name`
/// override plus a `mul` modifier.
const SUFFIX_REWRITES: &[(&str, &str)] = &[
    ("_in_bytes", "_bytes"),
    ("_in_millis", "_millis"),
    ("_in_seconds", "_seconds"),
];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    namespace: String,
    #[serde(default)]
    global_labels: Vec<RawGlobalLabels>,
    endpoints: Vec<RawEndpoint>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGlobalLabels {
    url: String,
    labels: Vec<RawLabel>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEndpoint {
    #[serde(default)]
    id: Option<String>,
    url: String,
    #[serde(default)]
    url_parts: RawUrlParts,
    metrics: Vec<RawMetric>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawUrlParts {
    #[serde(default)]
    paths: IndexMap<String, String>,
    #[serde(default)]
    params: IndexMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMetric {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "type")]
    metric_type: Option<RawType>,
    #[serde(default)]
    labels: Vec<RawLabel>,
    #[serde(default)]
    modifiers: Vec<RawModifier>,
    #[serde(default)]
    metrics: Vec<RawMetric>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawType {
    Gauge,
    Counter,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLabel {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawModifier {
    name: String,
    #[serde(default)]
    args: Vec<serde_yaml::Value>,
}

/// The compiled configuration. Built once at startup, immutable for the
/// process lifetime.
#[derive(Debug)]
pub struct Config {
    pub namespace: String,
    pub global_labels: Vec<GlobalLabelSource>,
    pub endpoints: Vec<Endpoint>,
}

/// A URL whose JSON response supplies labels attached to every sample of a
/// scrape, unless the sample already carries the label.
#[derive(Debug)]
pub struct GlobalLabelSource {
    pub url: Url,
    pub labels: Vec<Label>,
}

#[derive(Debug)]
pub struct Endpoint {
    /// Identifier used in diagnostics and the `up` sample. Defaults to the
    /// URL path when the configuration does not name the endpoint.
    pub id: String,
    pub url: Url,
    pub metrics: Vec<MetricNode>,
}

/// One node of the extraction tree. Only leaves (no child `metrics`) emit
/// samples.
#[derive(Debug)]
pub struct MetricNode {
    pub path: PathExpr,
    /// Name segment contributed by this node; an empty template contributes
    /// none.
    pub name: Template,
    pub metric_type: Option<MetricType>,
    pub labels: Vec<Label>,
    pub modifiers: Vec<Modifier>,
    pub metrics: Vec<MetricNode>,
}

#[derive(Debug)]
pub struct Label {
    pub name: String,
    pub value: Template,
}

/// Reads and compiles the configuration file.
pub fn load(path: &Path, base_url: Option<&Url>) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    from_yaml(&raw, base_url).with_context(|| format!("loading {}", path.display()))
}

/// Compiles a configuration from its YAML text. Anchors and aliases are
/// expanded to value copies by the YAML parser, so the compiled tree is a
/// pure tree.
pub fn from_yaml(yaml: &str, base_url: Option<&Url>) -> Result<Config> {
    let raw: RawConfig = serde_yaml::from_str(yaml).context("parsing configuration")?;
    ensure!(!raw.namespace.is_empty(), "`namespace` must not be empty");

    let global_labels = raw
        .global_labels
        .into_iter()
        .enumerate()
        .map(|(i, source)| {
            compile_global_labels(source, base_url)
                .with_context(|| format!("global_labels[{i}]"))
        })
        .collect::<Result<_>>()?;

    let endpoints = raw
        .endpoints
        .into_iter()
        .enumerate()
        .map(|(i, endpoint)| {
            compile_endpoint(endpoint, base_url).with_context(|| format!("endpoints[{i}]"))
        })
        .collect::<Result<_>>()?;

    Ok(Config {
        namespace: raw.namespace,
        global_labels,
        endpoints,
    })
}

fn compile_global_labels(raw: RawGlobalLabels, base_url: Option<&Url>) -> Result<GlobalLabelSource> {
    let url = resolve_url(&raw.url, base_url)?;
    let labels = raw
        .labels
        .iter()
        .enumerate()
        // Global label sources have no enclosing path, so no captures are in
        // scope for their value expressions.
        .map(|(i, label)| compile_label(label, 0).with_context(|| format!("labels[{i}]")))
        .collect::<Result<_>>()?;
    Ok(GlobalLabelSource { url, labels })
}

fn compile_endpoint(raw: RawEndpoint, base_url: Option<&Url>) -> Result<Endpoint> {
    let effective = substitute_url_parts(&raw.url, &raw.url_parts)?;
    let url = resolve_url(&effective, base_url)?;
    let id = raw.id.unwrap_or_else(|| url.path().to_string());
    let metrics = raw
        .metrics
        .into_iter()
        .enumerate()
        .map(|(i, metric)| compile_metric(metric, 0).with_context(|| format!("metrics[{i}]")))
        .collect::<Result<_>>()?;
    Ok(Endpoint { id, url, metrics })
}

fn compile_metric(raw: RawMetric, inherited_wildcards: usize) -> Result<MetricNode> {
    let path = PathExpr::parse(raw.path.as_deref().unwrap_or("")).context("invalid path")?;
    let wildcards = inherited_wildcards + path.wildcards();

    let name = match raw.name {
        Some(name) => Template::parse(&name).context("invalid name")?,
        None => {
            let identifier = path.last_identifier().ok_or_else(|| {
                anyhow!("path {path} ends with a wildcard, an explicit `name` is required")
            })?;
            Template::literal(&canonical_name(identifier))
        }
    };
    ensure!(
        name.max_capture() <= wildcards,
        "name references capture ${} but only {wildcards} wildcards are in scope",
        name.max_capture(),
    );

    let labels = raw
        .labels
        .iter()
        .enumerate()
        .map(|(i, label)| compile_label(label, wildcards).with_context(|| format!("labels[{i}]")))
        .collect::<Result<_>>()?;

    let modifiers = raw
        .modifiers
        .iter()
        .enumerate()
        .map(|(i, modifier)| {
            compile_modifier(modifier).with_context(|| format!("modifiers[{i}]"))
        })
        .collect::<Result<_>>()?;

    let metrics = raw
        .metrics
        .into_iter()
        .enumerate()
        .map(|(i, metric)| {
            compile_metric(metric, wildcards).with_context(|| format!("metrics[{i}]"))
        })
        .collect::<Result<_>>()?;

    Ok(MetricNode {
        path,
        name,
        metric_type: raw.metric_type.map(|raw| match raw {
            RawType::Gauge => MetricType::Gauge,
            RawType::Counter => MetricType::Counter,
        }),
        labels,
        modifiers,
        metrics,
    })
}

fn compile_label(raw: &RawLabel, wildcards: usize) -> Result<Label> {
    ensure!(!raw.name.is_empty(), "label name must not be empty");
    let value = Template::parse(&raw.value)
        .with_context(|| format!("invalid value for label {:?}", raw.name))?;
    ensure!(
        value.max_capture() <= wildcards,
        "label {:?} references capture ${} but only {wildcards} wildcards are in scope",
        raw.name,
        value.max_capture(),
    );
    Ok(Label {
        name: raw.name.clone(),
        value,
    })
}

fn compile_modifier(raw: &RawModifier) -> Result<Modifier> {
    match raw.name.as_str() {
        "mul" => {
            ensure!(raw.args.len() == 1, "`mul` takes exactly one argument");
            let factor = raw.args[0]
                .as_f64()
                .ok_or_else(|| anyhow!("`mul` takes a numeric argument"))?;
            Ok(Modifier::Mul(factor))
        }
        "eq" => {
            ensure!(raw.args.len() == 1, "`eq` takes exactly one argument");
            let token = match &raw.args[0] {
                serde_yaml::Value::String(token) => token.clone(),
                serde_yaml::Value::Number(number) => number.to_string(),
                serde_yaml::Value::Bool(value) => value.to_string(),
                _ => bail!("`eq` takes a scalar argument"),
            };
            Ok(Modifier::Eq(token))
        }
        other => bail!("unknown modifier {other:?}"),
    }
}

/// Derives a metric name from the last path identifier, rewriting known unit
/// suffixes.
fn canonical_name(identifier: &str) -> String {
    for (suffix, replacement) in SUFFIX_REWRITES {
        if let Some(stem) = identifier.strip_suffix(suffix) {
            return format!("{stem}{replacement}");
        }
    }
    identifier.to_string()
}

/// Substitutes `{paths=key}` and `{params=key}` tokens with the named
/// fragments of the endpoint's `url_parts`.
fn substitute_url_parts(template: &str, parts: &RawUrlParts) -> Result<String> {
    let mut out = String::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| anyhow!("unterminated `{{` in url {template:?}"))?;
        let token = &after[..end];
        let (section, key) = token
            .split_once('=')
            .ok_or_else(|| anyhow!("malformed url part token {{{token}}}"))?;
        let table = match section {
            "paths" => &parts.paths,
            "params" => &parts.params,
            other => bail!("unknown url part section {other:?}"),
        };
        let fragment = table
            .get(key)
            .ok_or_else(|| anyhow!("url part `{section}.{key}` is not defined"))?;
        out.push_str(fragment);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Turns a configured URL into an absolute one. Relative URLs are prepended
/// with `--base-url`, keeping any path prefix the base carries.
fn resolve_url(configured: &str, base_url: Option<&Url>) -> Result<Url> {
    if let Ok(url) = Url::parse(configured) {
        if matches!(url.scheme(), "http" | "https") {
            return Ok(url);
        }
    }
    let base = base_url
        .ok_or_else(|| anyhow!("relative url {configured:?} requires --base-url"))?;
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        configured.trim_start_matches('/'),
    );
    Url::parse(&joined).with_context(|| format!("joining {configured:?} onto {base}"))
}
