use std::process::ExitCode;

use anyhow::Context;
use api_router::{api_routes, api_state::ApiState};
use axum::Router;
use clap::Parser;
use common::{
    error::AppError,
    storage::{backend::SearchBackend, db::WeaviateClient, schema::create_schema},
    utils::config::{get_config, AppConfig},
};
use ingestion_pipeline::{
    import_data,
    preprocess::{convert_squad, filter_wiki_data},
    DocumentSource,
};
use retrieval_pipeline::{ask_question, run_inference};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;

use cli::{Cli, Command};

const SCHEMA_EXISTS_MESSAGE: &str =
    "Data Schema already exists. Use --overwrite flag to overwrite schema.";

/// Used when `RUST_LOG` is unset, so `--progress` output is visible.
const DEFAULT_LOG_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter())
        .try_init()
        .ok();

    let cli = Cli::parse();

    let mut config = get_config().context("loading configuration")?;
    if let Some(url) = cli.weaviate_url {
        config.weaviate_url = url;
    }

    run(cli.command, config).await
}

async fn run(command: Command, config: AppConfig) -> anyhow::Result<ExitCode> {
    match command {
        Command::PrepareWiki { input, output } => {
            filter_wiki_data(&input, &output)?;
        }
        Command::PrepareSquad {
            input,
            output,
            max_samples,
        } => {
            convert_squad(&input, &output, max_samples)?;
        }
        Command::Serve { port } => {
            let port = port.unwrap_or(config.http_port);
            let state = ApiState::new(&config)?;
            serve(state, port).await?;
        }
        command => {
            let backend = WeaviateClient::from_config(&config)?;
            return run_backend_command(&backend, command, &config).await;
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_backend_command(
    backend: &dyn SearchBackend,
    command: Command,
    config: &AppConfig,
) -> anyhow::Result<ExitCode> {
    match command {
        Command::Init { overwrite } => match create_schema(backend, overwrite).await {
            Ok(()) => {}
            Err(AppError::SchemaAlreadyExists(class)) => {
                error!(%class, "Schema already exists");
                eprintln!("{SCHEMA_EXISTS_MESSAGE}");
                return Ok(ExitCode::FAILURE);
            }
            Err(err) => return Err(err.into()),
        },
        Command::Index {
            source,
            batch_size,
            progress,
        } => {
            let batch_size = batch_size.unwrap_or(config.batch_size);
            let summary =
                import_data(backend, DocumentSource::Path(source), batch_size, progress).await?;
            if !summary.is_clean() {
                error!(
                    failed_objects = summary.failed_objects,
                    failed_references = summary.failed_references,
                    "Some items were rejected by the backend"
                );
            }
        }
        Command::Ask { question } => {
            let answer = ask_question(backend, &question).await?;
            println!("{answer}");
        }
        Command::Inference {
            questions_file,
            output_file,
            progress,
        } => {
            run_inference(backend, &questions_file, &output_file, progress).await?;
        }
        Command::Serve { .. } | Command::PrepareWiki { .. } | Command::PrepareSquad { .. } => {
            anyhow::bail!("command does not use the search backend directly");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn app(state: ApiState) -> Router {
    Router::new().merge(api_routes()).with_state(state)
}

async fn serve(state: ApiState, port: u16) -> anyhow::Result<()> {
    let serve_address = format!("0.0.0.0:{port}");
    info!("Starting server listening on {serve_address}");
    let listener = tokio::net::TcpListener::bind(&serve_address)
        .await
        .with_context(|| format!("binding {serve_address}"))?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}
