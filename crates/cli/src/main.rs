use clap::Parser;
use ip2loc_client::{BatchOutcome, Session};
use ip2loc_domain::ClientConfig;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ip2loc")]
#[command(version)]
#[command(about = "Batch IP geolocation lookups over the ip2loc UDP protocol")]
struct Cli {
    /// Shared server password
    #[arg(short = 'p', long)]
    password: String,

    /// Server hostname or address
    #[arg(short = 's', long, default_value = "localhost")]
    server: String,

    /// Server UDP port
    #[arg(long, default_value_t = 10020)]
    port: u16,

    /// Receive window per round, in milliseconds
    #[arg(long, default_value_t = 500.0)]
    timeout: f64,

    /// Extra send/receive rounds after the first
    #[arg(long, default_value_t = 2)]
    retries: u32,

    /// Print records as JSON instead of aligned text
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// IP addresses to resolve (up to 64)
    #[arg(required = true)]
    addresses: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig {
        password: cli.password,
        host: cli.server,
        port: cli.port,
        timeout_ms: cli.timeout,
        retries: cli.retries,
    };

    let mut session = Session::connect(config).await?;
    let outcome = session.resolve(&cli.addresses).await?;
    session.close();
    debug!(
        resolved = outcome.resolved_count(),
        failed = outcome.failed_count(),
        "lookup finished"
    );

    if cli.json {
        print_json(&outcome)?;
    } else {
        print_text(&outcome);
    }

    if !outcome.fully_resolved() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_text(outcome: &BatchOutcome) {
    for (ip_addr, entry) in outcome.iter() {
        match entry {
            Ok(location) => {
                println!("{ip_addr}:");
                println!("  country code : {}", location.country_code);
                println!("  country      : {}", location.country);
                println!("  region       : {}", location.region);
                println!("  city         : {}", location.city);
                println!("  latitude     : {}", location.latitude);
                println!("  longitude    : {}", location.longitude);
            }
            Err(error) => {
                println!("{ip_addr}: lookup failed: {error}");
            }
        }
    }
}

fn print_json(outcome: &BatchOutcome) -> anyhow::Result<()> {
    let mut report = serde_json::Map::new();
    for (ip_addr, entry) in outcome.iter() {
        let value = match entry {
            Ok(location) => serde_json::to_value(location)?,
            Err(error) => serde_json::json!({ "error": error.to_string() }),
        };
        report.insert(ip_addr.to_string(), value);
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::Value::Object(report))?
    );
    Ok(())
}
