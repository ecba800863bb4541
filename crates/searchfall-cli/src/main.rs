use anyhow::Result;
use clap::{Parser, Subcommand};
use searchfall_core::{SearchRequest, UserSearchPreferences};
use searchfall_local::{default_client, TieredSearch};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "searchfall")]
#[command(about = "Tiered web-search resolution (premium -> api -> scrape)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve one query through the fallback chain and print the text.
    Search(SearchCmd),
    /// Diagnose which tiers are configured (json; no secrets).
    Doctor,
    /// Print version info.
    Version,
}

#[derive(clap::Args, Debug)]
struct SearchCmd {
    /// The search query, e.g. "Tesla stock news".
    #[arg(long)]
    query: String,
    /// Force the premium tier for this call, regardless of profile settings.
    #[arg(long, default_value_t = false)]
    premium: bool,
    /// X handle to search (repeatable; a leading @ is stripped).
    #[arg(long = "handle")]
    handles: Vec<String>,
    /// Start date bound, ISO8601 (YYYY-MM-DD). Premium tier only.
    #[arg(long)]
    from_date: Option<String>,
    /// End date bound, ISO8601 (YYYY-MM-DD). Premium tier only.
    #[arg(long)]
    to_date: Option<String>,
    /// User id for quota/usage accounting.
    #[arg(long)]
    user: Option<uuid::Uuid>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Search(cmd) => run_search(cmd).await,
        Commands::Doctor => run_doctor(),
        Commands::Version => {
            println!("searchfall {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run_search(cmd: SearchCmd) -> Result<()> {
    let client = default_client()?;
    let engine = TieredSearch::from_env(client);

    // The CLI has no profile store; --premium maps to the per-call override.
    let prefs = UserSearchPreferences {
        premium_enabled: false,
    };
    let req = SearchRequest {
        query: cmd.query,
        handles: cmd.handles,
        from_date: cmd.from_date,
        to_date: cmd.to_date,
        force_premium: cmd.premium,
        user: cmd.user,
    };

    let outcome = engine.search(&prefs, &req).await;
    tracing::info!(premium_was_used = outcome.premium_was_used, "search resolved");
    println!("{}", outcome.text);
    Ok(())
}

fn run_doctor() -> Result<()> {
    let client = default_client()?;
    let premium = searchfall_local::xai::XaiLiveSearch::from_env(client.clone()).is_ok();
    let primary = searchfall_local::brave::BraveSearch::from_env(client).is_ok();

    let report = serde_json::json!({
        "tiers": {
            "premium": { "configured": premium, "key_env": "SEARCHFALL_XAI_API_KEY (or XAI_API_KEY)" },
            "primary": { "configured": primary, "key_env": "SEARCHFALL_BRAVE_API_KEY (or BRAVE_SEARCH_API_KEY)" },
            "secondary": { "configured": true, "note": "keyless" },
            "scrape": { "configured": true, "note": "keyless, last resort" },
        },
        "timeout_ms_env": "SEARCHFALL_TIMEOUT_MS",
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
