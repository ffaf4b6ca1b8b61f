use std::env;
use std::path::Path;

use retire::core::ReferenceData;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let raw_args: Vec<String> = env::args().collect();
    match raw_args.get(1).map(|s| s.as_str()) {
        Some("serve") => {
            let port = raw_args
                .get(2)
                .and_then(|s| s.parse::<u16>().ok())
                .unwrap_or(8080);
            let reference = match raw_args.get(3) {
                Some(dir) => ReferenceData::from_dir(Path::new(dir)),
                None => ReferenceData::bundled(),
            };
            let reference = match reference {
                Ok(reference) => reference,
                Err(e) => {
                    error!(error = %e, "could not load reference data");
                    std::process::exit(1);
                }
            };
            if let Err(e) = retire::api::run_http_server(port, reference).await {
                error!(error = %e, "server error");
                std::process::exit(1);
            }
        }
        Some("simulate") => match retire::api::run_cli(&raw_args[2..]) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(2);
            }
        },
        _ => {
            eprintln!("Usage: retire serve [port] [data-dir]");
            eprintln!(
                "       retire simulate --current-age <AGE> --retirement-age <AGE> \
                 --life-expectancy <AGE> --annual-expenses <AMOUNT> [flags]"
            );
            std::process::exit(1);
        }
    }
}
