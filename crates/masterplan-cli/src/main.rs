mod config;
mod extract_cmd;
mod formats_cmd;
mod generate_cmd;
mod reconcile_cmd;
mod serve_cmd;
#[cfg(test)]
mod test_util;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use masterplan_core::creative::DEFAULT_ASPECT_RATIOS;
use masterplan_core::keywords::DEFAULT_KEYWORD_COUNT;
use masterplan_core::service::Language;

use config::MasterplanConfig;

#[derive(Parser)]
#[command(name = "masterplan", about = "AI media plan generation and campaign metrics")]
struct Cli {
    /// Generation service API key (overrides MASTERPLAN_API_KEY env var)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Model name (overrides MASTERPLAN_MODEL env var)
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a masterplan config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Show the period and budget found in a prompt
    Extract {
        /// Free-text planning request
        prompt: String,
        /// Reference date for relative periods (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Complete a partial campaign metrics record
    Reconcile(reconcile_cmd::ReconcileArgs),
    /// List channel formats, or check one
    Formats {
        /// Channel to show (omit to list all)
        channel: Option<String>,
        /// Format to validate against the channel
        #[arg(long, requires = "channel")]
        check: Option<String>,
    },
    /// Generate a media plan from a free-text request
    Generate {
        /// Free-text planning request
        prompt: String,
        /// Output language: pt-BR or en
        #[arg(long)]
        language: Option<Language>,
        /// Owner id recorded on the plan
        #[arg(long, default_value = "local")]
        owner: String,
        /// Write the plan JSON to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Regenerate the months of a saved plan from a new request
    Regenerate {
        /// Plan JSON written by `generate --output`
        plan: PathBuf,
        /// Free-text planning request
        prompt: String,
        /// Output language: pt-BR or en
        #[arg(long)]
        language: Option<Language>,
        /// Write the new plan here instead of over the input file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Suggest search keywords for a campaign
    Keywords {
        /// What the campaign is about
        prompt: String,
        /// How many keywords to ask for
        #[arg(long, default_value_t = DEFAULT_KEYWORD_COUNT)]
        count: usize,
        /// Output language: pt-BR or en
        #[arg(long)]
        language: Option<Language>,
    },
    /// Generate creative image concepts per aspect ratio
    Creatives {
        /// What the creatives should show
        prompt: String,
        /// Aspect ratio (repeatable; defaults to 1:1, 9:16, 16:9 and 4:5)
        #[arg(long = "ratio")]
        ratios: Vec<String>,
        /// Output language: pt-BR or en
        #[arg(long)]
        language: Option<Language>,
    },
    /// Serve the JSON API
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port to listen on
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
    /// Print shell completions
    Completions {
        shell: Shell,
    },
}

/// Execute the `masterplan init` command: write config file.
fn cmd_init(api_key: Option<&str>, model: Option<&str>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        generation: config::GenerationSection {
            api_key: api_key.map(str::to_string),
            model: model.map(str::to_string),
            ..Default::default()
        },
        ..Default::default()
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    match api_key {
        Some(key) => {
            let head: String = key.chars().take(4).collect();
            println!("  generation.api_key = {head}...");
        }
        None => println!(
            "  generation.api_key not set; export {} before generating",
            config::API_KEY_ENV
        ),
    }
    if let Some(model) = model {
        println!("  generation.model = {model}");
    }
    println!();
    println!("Next: run `masterplan generate \"<request>\"` to create a plan.");

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let api_key = cli.api_key.as_deref();
    let model = cli.model.as_deref();

    match cli.command {
        Commands::Init { force } => {
            cmd_init(api_key, model, force)?;
        }
        Commands::Extract { prompt, today } => {
            let resolved = MasterplanConfig::resolve(api_key, model)?;
            extract_cmd::run_extract(&prompt, today, &resolved.extractor)?;
        }
        Commands::Reconcile(args) => {
            reconcile_cmd::run_reconcile(&args)?;
        }
        Commands::Formats { channel, check } => {
            let resolved = MasterplanConfig::resolve(api_key, model)?;
            formats_cmd::run_formats(&resolved.table, channel.as_deref(), check.as_deref())?;
        }
        Commands::Generate {
            prompt,
            language,
            owner,
            output,
        } => {
            let resolved = MasterplanConfig::resolve(api_key, model)?;
            let mut pipeline = resolved.pipeline(resolved.gemini_service()?);
            if let Some(language) = language {
                pipeline = pipeline.with_language(language);
            }
            generate_cmd::run_generate(&pipeline, &prompt, &owner, output.as_deref()).await?;
        }
        Commands::Regenerate {
            plan,
            prompt,
            language,
            output,
        } => {
            let resolved = MasterplanConfig::resolve(api_key, model)?;
            let mut pipeline = resolved.pipeline(resolved.gemini_service()?);
            if let Some(language) = language {
                pipeline = pipeline.with_language(language);
            }
            generate_cmd::run_regenerate(&pipeline, &plan, &prompt, output.as_deref()).await?;
        }
        Commands::Keywords {
            prompt,
            count,
            language,
        } => {
            let resolved = MasterplanConfig::resolve(api_key, model)?;
            let pipeline = resolved.pipeline(resolved.gemini_service()?);
            let language = language.unwrap_or(resolved.language);
            generate_cmd::run_keywords(&pipeline, &prompt, count, language).await?;
        }
        Commands::Creatives {
            prompt,
            ratios,
            language,
        } => {
            let resolved = MasterplanConfig::resolve(api_key, model)?;
            let pipeline = resolved.pipeline(resolved.gemini_service()?);
            let ratios = if ratios.is_empty() {
                DEFAULT_ASPECT_RATIOS.iter().map(|r| r.to_string()).collect()
            } else {
                ratios
            };
            let language = language.unwrap_or(resolved.language);
            generate_cmd::run_creatives(&pipeline, &prompt, &ratios, language).await?;
        }
        Commands::Serve { bind, port } => {
            let resolved = MasterplanConfig::resolve(api_key, model)?;
            let pipeline = resolved.pipeline(resolved.gemini_service()?);
            serve_cmd::run_serve(serve_cmd::AppState::new(pipeline), &bind, port).await?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "masterplan",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}
