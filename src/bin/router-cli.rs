use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "router-cli")]
#[command(about = "Operator CLI for the region router", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Admin API key, required for failover and alert resolution.
    #[arg(short, long, env = "ROUTER_API_KEY", default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the region for a user
    Route {
        user_id: String,
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },
    /// Move a user off a region
    Failover {
        user_id: String,
        from_region: String,
        #[arg(long, default_value = "manual")]
        reason: String,
    },
    /// List region health
    Regions,
    /// Recent health checks of one region
    History {
        region_id: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Failover log of a user
    Failovers { user_id: String },
    /// Record a metric sample
    Record { metric: String, value: f64 },
    /// Overall and per-service health
    Health,
    /// Active alerts
    Alerts,
    /// Resolve an alert
    Resolve {
        alert_id: String,
        #[arg(long, default_value = "router-cli")]
        by: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut admin = HeaderMap::new();
    admin.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let res = match cli.command {
        Commands::Route { user_id, lat, lon } => {
            let mut req = client.get(format!("{}/v1/routing/{}", base, user_id));
            if let (Some(lat), Some(lon)) = (lat, lon) {
                req = req.query(&[("lat", lat), ("lon", lon)]);
            }
            req.send().await?
        }
        Commands::Failover {
            user_id,
            from_region,
            reason,
        } => {
            client
                .post(format!("{}/v1/failover", base))
                .headers(admin)
                .json(&json!({
                    "user_id": user_id,
                    "from_region": from_region,
                    "reason": reason,
                }))
                .send()
                .await?
        }
        Commands::Regions => client.get(format!("{}/v1/regions", base)).send().await?,
        Commands::History { region_id, limit } => {
            let mut req = client.get(format!("{}/v1/regions/{}/history", base, region_id));
            if let Some(limit) = limit {
                req = req.query(&[("limit", limit)]);
            }
            req.send().await?
        }
        Commands::Failovers { user_id } => {
            client
                .get(format!("{}/v1/failovers/{}", base, user_id))
                .send()
                .await?
        }
        Commands::Record { metric, value } => {
            client
                .post(format!("{}/v1/metrics", base))
                .json(&json!({ "metric": metric, "value": value }))
                .send()
                .await?
        }
        Commands::Health => client.get(format!("{}/v1/health", base)).send().await?,
        Commands::Alerts => client.get(format!("{}/v1/alerts", base)).send().await?,
        Commands::Resolve { alert_id, by } => {
            client
                .post(format!("{}/v1/alerts/{}/resolve", base, alert_id))
                .headers(admin)
                .json(&json!({ "resolved_by": by }))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: router returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
