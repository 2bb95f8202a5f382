use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use aula_core::bootstrap::{build_context, create_provider, rebuild_index};
use aula_core::config::DEFAULT_CONFIG_PATH;
use aula_core::{Config, LessonPlanRequest, PipelineContext};
use aula_gateway::GatewayServer;
use aula_llm::any::AnyProvider;
use clap::Parser;
use tokio::sync::watch;

/// Generate curriculum-grounded lesson plans.
#[derive(Parser, Debug)]
#[command(name = "aula", version, about, long_about = None)]
struct Cli {
    /// Configuration file path (falls back to AULA_CONFIG, then config/default.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Build the embedding index from the corpus directory
    Index {
        /// Corpus directory, overriding index.corpus_dir
        #[arg(long)]
        corpus: Option<PathBuf>,
    },
    /// Generate one lesson plan and print it as JSON
    Plan {
        /// Theme or content of the lesson
        #[arg(long)]
        tema: String,
        /// Target audience, e.g. "9º ano"
        #[arg(long)]
        publico: String,
        /// Available class time, e.g. "2 aulas de 50 minutos"
        #[arg(long)]
        tempo: String,
        #[arg(long)]
        objetivos: Option<String>,
        #[arg(long)]
        recursos: Option<String>,
        /// Curriculum skills the educator wants covered
        #[arg(long)]
        habilidades: Option<String>,
    },
    /// Serve the HTTP gateway
    Serve,
}

impl Command {
    fn into_request(self) -> Option<LessonPlanRequest> {
        let Self::Plan {
            tema,
            publico,
            tempo,
            objetivos,
            recursos,
            habilidades,
        } = self
        else {
            return None;
        };
        let mut request = LessonPlanRequest::new(tema, publico, tempo);
        request.objetivos = objetivos;
        request.recursos_didaticos = recursos;
        request.habilidades = habilidades;
        Some(request)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config);
    let config = Config::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    config.validate().context("invalid configuration")?;

    let provider = create_provider(&config)?;
    tracing::info!(
        provider = config.llm.provider.as_str(),
        model = %config.llm.model,
        index = %config.index.path.display(),
        "pipeline configured"
    );
    let ctx = build_context(&config, Arc::new(provider));

    match cli.command {
        Command::Index { corpus } => {
            let corpus = corpus.unwrap_or_else(|| config.index.corpus_dir.clone());
            run_index(&ctx, &config, &corpus).await
        }
        Command::Serve => run_serve(ctx, &config).await,
        command @ Command::Plan { .. } => {
            let request = command
                .into_request()
                .context("plan arguments missing")?;
            run_plan(&ctx, &request).await
        }
    }
}

async fn run_index(
    ctx: &PipelineContext<AnyProvider>,
    config: &Config,
    corpus: &Path,
) -> anyhow::Result<()> {
    let report = rebuild_index(ctx, config, corpus)
        .await
        .with_context(|| format!("indexing {}", corpus.display()))?;
    for error in &report.errors {
        tracing::warn!(%error, "file not indexed");
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_plan(
    ctx: &PipelineContext<AnyProvider>,
    request: &LessonPlanRequest,
) -> anyhow::Result<()> {
    let plan = ctx.planner().plan_with_timeout(request).await?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

async fn run_serve(ctx: PipelineContext<AnyProvider>, config: &Config) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    GatewayServer::from_config(&config.gateway, Arc::new(ctx), shutdown_rx)
        .serve()
        .await?;
    Ok(())
}

fn resolve_config_path(flag: Option<PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }
    if let Ok(path) = std::env::var("AULA_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // stdout carries command output; logs go to stderr.
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn parses_plan_command() {
        let cli = Cli::try_parse_from([
            "aula",
            "plan",
            "--tema",
            "Prismas e pirâmides",
            "--publico",
            "9º ano",
            "--tempo",
            "2 aulas de 50 minutos",
            "--recursos",
            "Projetor",
        ])
        .unwrap();
        let request = cli.command.into_request().unwrap();
        assert_eq!(request.tema_conteudo, "Prismas e pirâmides");
        assert_eq!(request.recursos_didaticos.as_deref(), Some("Projetor"));
        assert!(request.objetivos.is_none());
    }

    #[test]
    fn plan_requires_core_fields() {
        assert!(Cli::try_parse_from(["aula", "plan", "--tema", "x"]).is_err());
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["aula", "index", "--config", "custom.toml", "--corpus", "docs"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(
            cli.command,
            Command::Index { corpus: Some(ref p) } if p == Path::new("docs")
        ));
    }

    #[test]
    fn serve_is_not_a_plan() {
        let cli = Cli::try_parse_from(["aula", "serve"]).unwrap();
        assert!(cli.command.into_request().is_none());
    }

    #[test]
    #[serial]
    fn config_path_precedence() {
        unsafe { std::env::remove_var("AULA_CONFIG") };
        assert_eq!(resolve_config_path(None), PathBuf::from(DEFAULT_CONFIG_PATH));

        unsafe { std::env::set_var("AULA_CONFIG", "/etc/aula.toml") };
        assert_eq!(resolve_config_path(None), PathBuf::from("/etc/aula.toml"));
        assert_eq!(
            resolve_config_path(Some(PathBuf::from("flag.toml"))),
            PathBuf::from("flag.toml")
        );
        unsafe { std::env::remove_var("AULA_CONFIG") };
    }
}
