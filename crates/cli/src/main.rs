use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tradestation_core::domain::allocation::RiskLevel;
use tradestation_core::domain::prompt;
use tradestation_core::domain::session::Session;
use tradestation_core::ingest::{self, yahoo::YahooQuoteProvider, QuoteProvider};
use tradestation_core::llm::gemini::GeminiClient;
use tradestation_core::llm::TextGenerator;

#[derive(Debug, Parser)]
#[command(name = "tradestation", about = "Market scanner with AI commentary")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan the watchlist and print a short AI summary.
    Scan {
        /// Override the configured watchlist (comma-separated).
        #[arg(long)]
        tickers: Option<String>,
    },

    /// Ask the analyst a question.
    Ask {
        #[arg(long)]
        question: String,

        /// Scan the watchlist first and use it as context.
        #[arg(long)]
        scan_first: bool,
    },

    /// Write a 1-month close-price chart as SVG.
    Chart {
        #[arg(long)]
        ticker: String,

        #[arg(long)]
        out: PathBuf,
    },

    /// Allocation, pie chart and advice for an investment.
    Strategy {
        #[arg(long, default_value_t = 1000.0)]
        investment: f64,

        /// Very Low, Low, Medium, High or Very High.
        #[arg(long)]
        risk: RiskLevel,

        /// Where to write the allocation pie (SVG).
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Print the model candidates the next generation would try.
    Models,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = tradestation_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    // Fatal before any command runs, including the ones that never call the model.
    settings.require_gemini_api_key()?;

    let llm = GeminiClient::from_settings(&settings)?;
    let quotes = YahooQuoteProvider::from_settings(&settings)?;
    let mut session = Session::new();

    let result = run(args.command, &settings, &llm, &quotes, &mut session).await;
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %err, "command failed");
    }
    result
}

async fn run(
    command: Command,
    settings: &tradestation_core::config::Settings,
    llm: &GeminiClient,
    quotes: &dyn QuoteProvider,
    session: &mut Session,
) -> anyhow::Result<()> {
    match command {
        Command::Scan { tickers } => {
            let watchlist = tickers
                .as_deref()
                .map(tradestation_core::config::parse_list)
                .unwrap_or_else(|| settings.watchlist.clone());
            anyhow::ensure!(!watchlist.is_empty(), "no tickers to scan");

            let snapshot =
                ingest::scan_watchlist(quotes, &watchlist, settings.scan_headlines).await;
            let market_data = snapshot.display();
            session.record_scan(snapshot);

            print!("{market_data}");
            println!();
            println!("{}", llm.generate(&prompt::market_summary_prompt(&market_data)).await);
        }
        Command::Ask {
            question,
            scan_first,
        } => {
            prompt::require_question(&question)?;
            if scan_first {
                let snapshot =
                    ingest::scan_watchlist(quotes, &settings.watchlist, settings.scan_headlines)
                        .await;
                session.record_scan(snapshot);
            }

            let context = session.market_context();
            tracing::info!(provider = ?llm.provider(), scan_first, "asking analyst");
            println!(
                "{}",
                llm.generate(&prompt::analyst_prompt(context.as_deref(), &question))
                    .await
            );
        }
        Command::Chart { ticker, out } => {
            let history = ingest::fetch_history(quotes, &ticker).await?;
            let svg = tradestation_core::charts::render_price_chart(&ticker, &history)?;
            std::fs::write(&out, svg)
                .with_context(|| format!("failed to write chart to {}", out.display()))?;
            tracing::info!(%ticker, points = history.len(), out = %out.display(), "chart written");
        }
        Command::Strategy {
            investment,
            risk,
            out,
        } => {
            anyhow::ensure!(
                investment.is_finite() && investment >= 0.0,
                "investment must be a non-negative amount (got {investment})"
            );

            let allocation = risk.allocation();
            for (asset, amount) in allocation.split(investment) {
                println!(
                    "{asset}: ${}",
                    tradestation_core::domain::snapshot::format_usd(amount)
                );
            }

            if let Some(out) = out {
                let svg = tradestation_core::charts::render_allocation_pie(&allocation)?;
                std::fs::write(&out, svg)
                    .with_context(|| format!("failed to write pie chart to {}", out.display()))?;
            }

            println!();
            println!(
                "{}",
                llm.generate(&prompt::strategy_prompt(investment, &allocation))
                    .await
            );
        }
        Command::Models => {
            for model in llm.resolved_models().await {
                println!("{model}");
            }
        }
    }
    Ok(())
}

fn init_sentry(settings: &tradestation_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
