use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use dockhand::db::{Container, Registry, Token, TokenSource};
use dockhand::settings::Settings;
use dockhand::source_control::RepositoryRef;
use dockhand::state::AppState;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// quay.io access token
    #[arg(long, env = "DOCKHAND_QUAY_TOKEN", global = true, hide_env_values = true)]
    quay_token: Option<String>,
    /// bitbucket.org access token
    #[arg(long, env = "DOCKHAND_BITBUCKET_TOKEN", global = true, hide_env_values = true)]
    bitbucket_token: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the namespaces visible to the quay.io token
    Namespaces,
    /// List the tags of a quay.io repository
    Tags {
        namespace: String,
        name: String,
    },
    /// Print a file from a bitbucket.org repository
    ReadFile {
        owner: String,
        repo: String,
        path: String,
        /// Branch, tag or commit (default: the repository's main branch)
        #[arg(long = "ref")]
        reference: Option<String>,
    },
    /// Sync every container of the quay.io account and print the result
    Sync,
}

/// Identity the CLI registers its tokens under
fn local_user() -> Uuid {
    Uuid::nil()
}

async fn register_quay_token(state: &AppState, token: Option<&str>) -> Result<Token> {
    let token = token.context("A quay.io token is required (--quay-token or DOCKHAND_QUAY_TOKEN)")?;
    let token = state
        .token_manager
        .register_access_token(local_user(), token)
        .await
        .context("Failed to register quay.io token")?;
    info!(username = %token.username, "Using quay.io account");
    Ok(token)
}

async fn register_bitbucket_token(state: &AppState, token: Option<&str>) -> Result<Option<Token>> {
    let Some(content) = token else {
        return Ok(None);
    };
    let token = Token::new(TokenSource::BitbucketOrg, local_user(), "", content, None);
    Ok(Some(state.tokens.create(token).await?))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "dockhand=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let settings = Settings::new().context("Failed to load configuration")?;
    let state = AppState::new(settings)?;

    match cli.command {
        Commands::Namespaces => {
            let token = register_quay_token(&state, cli.quay_token.as_deref()).await?;
            let registry = state.registry_for(&token)?;
            print_json(&registry.list_namespaces().await)?;
        }
        Commands::Tags { namespace, name } => {
            let token = register_quay_token(&state, cli.quay_token.as_deref()).await?;
            let registry = state.registry_for(&token)?;
            let container = Container::new(Registry::QuayIo, namespace, name);
            let tags = registry
                .list_tags(&container)
                .await
                .context("Could not fetch repository detail")?;
            print_json(&tags)?;
        }
        Commands::ReadFile {
            owner,
            repo,
            path,
            reference,
        } => {
            let token = register_bitbucket_token(&state, cli.bitbucket_token.as_deref())
                .await?
                .context("A bitbucket.org token is required (--bitbucket-token or DOCKHAND_BITBUCKET_TOKEN)")?;
            let source_repo = state.source_repo_for(&token)?;
            let repository = RepositoryRef::new("bitbucket.org", owner, repo);
            let file = source_repo
                .read_file(&repository, &path, reference.as_deref())
                .await;
            print_json(&file)?;
        }
        Commands::Sync => {
            register_quay_token(&state, cli.quay_token.as_deref()).await?;
            register_bitbucket_token(&state, cli.bitbucket_token.as_deref()).await?;

            let orchestrator = state.orchestrator_for_user(local_user()).await?;
            let containers = orchestrator.refresh_namespaces().await;
            info!(count = containers.len(), "Sync complete");
            print_json(&containers)?;
        }
    }

    Ok(())
}
