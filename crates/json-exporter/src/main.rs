use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    json_exporter::start(std::env::args()).await
}
