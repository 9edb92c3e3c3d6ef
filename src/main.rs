//! GascAI command-line entry point.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use gascai::agent::{Assistant, SetupRequest, TerminalIo};
use gascai::config::Config;
use gascai::document::{DocumentKind, DocumentSource};
use gascai::persona::PersonaRegistry;
use gascai::pipeline::ModelConfig;
use gascai::providers::Provider;

#[derive(Parser)]
#[command(name = "gascai", version)]
#[command(about = "Chat with a document through one or more AI personas", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines (stderr)
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a document and start an interactive chat about it
    Chat {
        /// Document kind: site, youtube, pdf, csv or txt
        #[arg(long)]
        kind: DocumentKind,
        /// URL (site, youtube) or file path (pdf, csv, txt)
        #[arg(long)]
        source: String,
        /// Model provider: groq or openai
        #[arg(long)]
        provider: Option<Provider>,
        /// Model name (must be offered by the provider)
        #[arg(long)]
        model: Option<String>,
        /// API key; defaults to the config file or GROQ_API_KEY / OPENAI_API_KEY
        #[arg(long)]
        api_key: Option<String>,
        /// Persona to enable (repeatable)
        #[arg(long = "persona")]
        personas: Vec<String>,
        /// Replay only the most recent N messages per turn
        #[arg(long)]
        history_window: Option<usize>,
    },
    /// List the available personas
    Personas,
    /// List providers and their models
    Models,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gascai=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let mut config = Config::load().context("failed to load configuration")?;
    debug!(path = %Config::path().display(), "Configuration loaded");

    match cli.command {
        Commands::Chat {
            kind,
            source,
            provider,
            model,
            api_key,
            personas,
            history_window,
        } => {
            if let Some(provider) = provider {
                if provider != config.model.provider && !provider.supports(&config.model.model) {
                    config.model.model = provider.default_model().to_string();
                }
                config.model.provider = provider;
            }
            if history_window.is_some() {
                config.assistant.history_window = history_window;
            }
            let personas = if personas.is_empty() {
                config.assistant.default_personas.clone()
            } else {
                personas
            };

            let assistant = Assistant::from_config(&config)?;
            let source = DocumentSource::open(kind, &source).await?;
            let request = SetupRequest {
                source,
                personas,
                model: ModelConfig::from_config(&config, model.as_deref(), api_key.as_deref()),
            };

            println!("Loading {} document...", kind);
            assistant
                .initialize(request)
                .await
                .context("failed to initialize the assistant")?;

            let names: Vec<String> = assistant
                .session()
                .personas()
                .await
                .into_iter()
                .map(|p| p.name)
                .collect();
            println!("Welcome to {}! Active personas: {}", assistant.assistant_name(), names.join(", "));
            println!("Type /help for commands.\n");

            let mut io = TerminalIo::new(assistant.assistant_name())?;
            assistant.chat_loop().run(&mut io).await?;
        }
        Commands::Personas => {
            let registry = match &config.assistant.personas_file {
                Some(path) => PersonaRegistry::load_file(path)?,
                None => PersonaRegistry::builtin(),
            };
            for persona in registry.iter() {
                let default = if persona.name == registry.default_name() { " (default)" } else { "" };
                println!("{}{}", persona.name, default);
                println!("  tools: {}", persona.allowed_tools.join(", "));
                println!("  {}\n", persona.description);
            }
        }
        Commands::Models => {
            for provider in Provider::ALL {
                println!("{} ({})", provider, provider.api_key_env());
                for model in provider.models() {
                    let marker = if *model == provider.default_model() { " (default)" } else { "" };
                    println!("  {}{}", model, marker);
                }
            }
        }
    }

    Ok(())
}
