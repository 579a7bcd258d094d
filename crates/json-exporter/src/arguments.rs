use {
    clap::Parser,
    std::{net::SocketAddr, path::PathBuf, time::Duration},
    url::Url,
};

/// Prometheus exporter that turns JSON documents fetched from upstream HTTP
/// APIs into metrics, driven by a declarative YAML configuration.
#[derive(Debug, Parser)]
pub struct Arguments {
    /// Prepended to every relative endpoint URL in the configuration.
    #[clap(long, env)]
    pub base_url: Option<Url>,

    /// Address to serve `/metrics` on.
    #[clap(long, env, default_value = "0.0.0.0:9114")]
    pub listen: SocketAddr,

    /// Deadline for each upstream fetch. Exceeding it cancels that fetch
    /// only; the scrape proceeds with partial data.
    #[clap(
        long,
        env,
        default_value = "30s",
        value_parser = humantime::parse_duration,
    )]
    pub scrape_timeout: Duration,

    /// Log verbosity, in `tracing_subscriber::EnvFilter` directive syntax.
    #[clap(long, env = "LOG", default_value = "info")]
    pub log_filter: String,

    /// Path to the YAML configuration file.
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_defaults() {
        let args = Arguments::parse_from(["json-exporter", "config.yaml"]);
        assert_eq!(args.listen, "0.0.0.0:9114".parse().unwrap());
        assert_eq!(args.scrape_timeout, Duration::from_secs(30));
        assert_eq!(args.log_filter, "info");
        assert_eq!(args.config, PathBuf::from("config.yaml"));
        assert!(args.base_url.is_none());
    }

    #[test]
    fn parses_explicit_flags() {
        let args = Arguments::parse_from([
            "json-exporter",
            "--base-url",
            "http://es:9200",
            "--listen",
            "127.0.0.1:9999",
            "--scrape-timeout",
            "5s",
            "metrics.yaml",
        ]);
        assert_eq!(args.base_url.unwrap().as_str(), "http://es:9200/");
        assert_eq!(args.listen, "127.0.0.1:9999".parse().unwrap());
        assert_eq!(args.scrape_timeout, Duration::from_secs(5));
    }
}
