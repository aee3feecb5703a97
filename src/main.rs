mod audit;
mod background;
mod commands;
mod config;
mod constants;
mod dispatch;
mod error;
mod event;
mod helpers;
mod localize;
mod media;
mod permissions;
mod retry;
mod router;
mod state;
mod stats;
mod store;
mod traits;
mod webhook;

use clap::Parser;
use reqwest::Client;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::error::AppError;
use crate::localize::ContentLocalizer;
use crate::media::MediaFetcher;
use crate::retry::RetryPolicy;
use crate::router::CommandTable;
use crate::state::{Config, Metrics, State, Stores};
use crate::traits::{ChatApiImpl, CodeApi, CodeApiImpl};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("qqbot=info")),
        )
        .init();

    if let Err(e) = run(Args::parse()).await {
        error!("Fatal: {e}");
        std::process::exit(1);
    }
}

fn build_state(args: &Args) -> Result<State, AppError> {
    std::fs::create_dir_all(&args.data_dir)?;
    let data_dir = std::fs::canonicalize(&args.data_dir)?;
    let db_path = data_dir.join(constants::DATABASE_FILE);
    // Create the schema up front so a bad data directory fails at startup.
    drop(store::open_db(&db_path)?);

    let groups = config::load_group_settings(args.groups.as_deref())?;
    let http = Client::new();
    let retry = RetryPolicy::default();

    let code_api = match &args.code_api_url {
        Some(url) => Some(Box::new(CodeApiImpl::new(
            http.clone(),
            url.clone(),
            constants::CODE_API_TIMEOUT,
            retry,
        )?) as Box<dyn CodeApi>),
        None => {
            if !groups.dynamic_code_groups.is_empty() {
                warn!("Dynamic code groups configured without --code-api-url; lookups there will fail");
            }
            None
        }
    };

    Ok(State {
        metrics: Metrics::new(),
        table: CommandTable::standard(),
        groups,
        stores: Stores::open(&data_dir, &db_path),
        media: MediaFetcher::new(
            http.clone(),
            data_dir.join(constants::MEDIA_DIR),
            constants::MEDIA_TIMEOUT,
            retry,
        ),
        localizer: ContentLocalizer::new()?,
        chat_api: Box::new(ChatApiImpl {
            http,
            api_url: args.api_url.clone(),
            timeout: constants::CHAT_TIMEOUT,
            retry,
        }),
        code_api,
        config: Config {
            api_url: args.api_url.clone(),
            data_dir,
            db_path,
        },
    })
}

async fn run(args: Args) -> Result<(), AppError> {
    let state = Arc::new(build_state(&args)?);
    info!(
        data_dir = %state.config.data_dir.display(),
        api_url = %state.config.api_url,
        monitored = state.groups.monitored.len(),
        commands = state.table.entries().len(),
        "qqbot starting"
    );

    if let Some(days) = args.media_ttl_days {
        background::spawn_media_sweep(&state, days);
    }

    let listener = tokio::net::TcpListener::bind(args.listen.as_str()).await?;
    info!(addr = %listener.local_addr()?, "Webhook receiver listening");
    axum::serve(listener, webhook::router(Arc::clone(&state)))
        .with_graceful_shutdown(background::shutdown_signal())
        .await?;

    audit::log_action(&state.config.db_path, "shutdown", "", "graceful");
    info!("Shutdown complete");
    Ok(())
}
