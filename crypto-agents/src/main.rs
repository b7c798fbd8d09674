use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use common::env::{get_env_var_opt, load_environment};
use common::logging::init_logging;
use common::{ModelFactory, Settings};
use crypto_agents::agents::{run_loop, Agent, CopyBotAgent, CopyBotDeps, SentimentAgent, SentimentDeps};
use crypto_agents::api::{HuggingFaceModel, SocialMediaClient, VoiceAnnouncer};
use crypto_agents::middleware::cors_middleware;
use crypto_agents::monitoring::{PerformanceMonitor, SystemMonitor};
use crypto_agents::{routes, InstanceManager};
use tokio::sync::Mutex;
use tracing::info;
use trader_solana::{BirdeyeClient, ChainClient, JupiterClient, MarketDataClient, SolanaRpcClient};

#[derive(Parser)]
#[command(author, version, about = "Solana trading and sentiment agents", long_about = None)]
struct Args {
    /// Settings file, layered under AGENTS__* environment overrides
    #[clap(long, env = "AGENTS_CONFIG", default_value = common::config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze the portfolio and resize positions
    Copybot {
        /// Run a single cycle and exit
        #[clap(long)]
        once: bool,

        /// Token mints to track in addition to the portfolio file
        #[clap(long, value_delimiter = ',')]
        tokens: Vec<String>,
    },
    /// Track social sentiment and announce notable moves
    Sentiment {
        #[clap(long)]
        once: bool,
    },
    /// Serve the instance management API
    Serve {
        #[clap(long)]
        host: Option<String>,

        #[clap(long)]
        port: Option<u16>,
    },
}

struct Clients {
    deps: CopyBotDeps,
    monitor: Arc<SystemMonitor>,
}

async fn build_clients(settings: &Settings) -> Result<Clients> {
    let model = ModelFactory::create(&settings.model).await?;
    info!("🧠 Using {} via {}", model.model_name(), settings.model.provider);

    let rpc = Arc::new(SolanaRpcClient::from_env()?);
    let swap = Arc::new(JupiterClient::from_env(rpc.clone())?);
    let market: Arc<dyn MarketDataClient> = Arc::new(BirdeyeClient::from_env(
        settings.trading.ohlcv_lookback_days,
        &settings.trading.ohlcv_timeframe,
    )?);
    let chain: Arc<dyn ChainClient> = rpc;

    let monitor = Arc::new(SystemMonitor::new(
        Some(chain.clone()),
        Arc::new(PerformanceMonitor::new(settings.monitor.history_limit)),
        get_env_var_opt("WALLET_ADDRESS"),
        settings.monitor.clone(),
    ));

    let deps = CopyBotDeps {
        model,
        chain,
        swap,
        market,
        monitor: Some(monitor.clone()),
    };
    Ok(Clients { deps, monitor })
}

async fn run_copybot(settings: Settings, once: bool, tokens: Vec<String>) -> Result<()> {
    let clients = build_clients(&settings).await?;
    let agent = Arc::new(CopyBotAgent::new("copybot", clients.deps, &settings));
    agent.set_tokens(tokens);
    clients.monitor.register_instance(agent.instance_id());

    if once {
        let report = agent.run_analysis_cycle().await?;
        println!(
            "{} {} executed, {} failed, {} skipped",
            "✨ Done:".green(),
            report.executed(),
            report.failed(),
            report.skipped()
        );
        return Ok(());
    }

    agent.set_active(true);
    clients.monitor.set_instance_active(agent.instance_id(), true);
    let handle = tokio::spawn(run_loop(agent.clone()));
    wait_for_shutdown(agent, handle).await
}

async fn run_sentiment(settings: Settings, once: bool) -> Result<()> {
    let sentiment = &settings.sentiment;
    let market: Option<Arc<dyn MarketDataClient>> = match BirdeyeClient::from_env(
        settings.trading.ohlcv_lookback_days,
        &settings.trading.ohlcv_timeframe,
    ) {
        Ok(client) => Some(Arc::new(client) as Arc<dyn MarketDataClient>),
        Err(e) => {
            info!("Volatility feed unavailable, using base threshold: {}", e);
            None
        }
    };

    let deps = SentimentDeps {
        source: Arc::new(SocialMediaClient::from_env(&sentiment.user_agent)?),
        model: Arc::new(HuggingFaceModel::from_env(
            &sentiment.hf_model,
            sentiment.batch_size,
            sentiment.max_length,
        )?),
        announcer: Arc::new(VoiceAnnouncer::from_env(sentiment.voice.clone(), &sentiment.audio_dir)?),
        market,
    };
    let agent = Arc::new(SentimentAgent::new(deps, sentiment.clone()));

    if once {
        agent.run_sentiment_cycle().await?;
        return Ok(());
    }

    agent.set_active(true);
    let handle = tokio::spawn(run_loop(agent.clone()));
    wait_for_shutdown(agent, handle).await
}

async fn wait_for_shutdown<A: Agent + 'static>(agent: Arc<A>, handle: tokio::task::JoinHandle<()>) -> Result<()> {
    tokio::signal::ctrl_c().await?;
    println!("\n{}", "👋 Shutting down gracefully...".yellow());
    agent.set_active(false);
    handle.abort();
    Ok(())
}

async fn serve(settings: Settings, host: Option<String>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);

    let clients = build_clients(&settings).await?;
    let health = clients.monitor.check_system_health().await;
    info!(
        "🩺 CPU {:.1}%, memory {:.1}%, status {:?}",
        health.cpu_usage, health.memory_usage, health.status
    );

    let manager = web::Data::new(Mutex::new(InstanceManager::new(
        clients.deps,
        settings,
        clients.monitor,
    )));

    println!("{} http://{}:{}", "🚀 Serving instance API on".bright_green(), host, port);
    HttpServer::new({
        let manager = manager.clone();
        move || {
            App::new()
                .wrap(cors_middleware())
                .app_data(manager.clone())
                .configure(routes::config)
        }
    })
    .bind((host.as_str(), port))?
    .run()
    .await?;

    manager.lock().await.shutdown();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    load_environment();
    init_logging();

    let args = Args::parse();
    let settings = Settings::load(&args.config)?;

    match args.command {
        Command::Copybot { once, tokens } => run_copybot(settings, once, tokens).await,
        Command::Sentiment { once } => run_sentiment(settings, once).await,
        Command::Serve { host, port } => serve(settings, host, port).await,
    }
}
