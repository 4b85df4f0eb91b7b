use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tally_categorize::{
    AutoAccept, Categorizer, CategorizerConfig, EscalationPort, FALLBACK_MODEL, OfflineClient,
    RuleStore, TextGenerationClient, fallback_pattern, recommended_model,
};
use tally_core::CategoryOrigin;
use tally_ingest::{StatementSummary, find_qfx_files, parse_qfx_file};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod llm;
mod notion;
mod prompt;
mod state;

use config::Config;
use llm::OllamaClient;
use notion::NotionPublisher;
use prompt::{TerminalPort, select_model};

#[derive(Parser, Debug)]
#[command(name = "tally", version, about = "Categorize bank exports and publish them to Notion")]
struct Cli {
    /// Confidence below which the operator is asked (overrides config)
    #[arg(long, global = true)]
    threshold: Option<f64>,

    /// Backend model to use (overrides config)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Rules file (overrides config)
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    /// Never prompt; accept the model's suggestion for low-confidence transactions
    #[arg(long, global = true)]
    headless: bool,

    /// Run without a text-generation backend
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse statement files, categorize them and upload to Notion
    Sync {
        /// Directory to scan for .qfx files (default: [input].dir)
        #[arg(long, conflicts_with = "file")]
        input: Option<PathBuf>,

        /// Specific statement file(s)
        #[arg(long)]
        file: Vec<PathBuf>,

        /// Categorize and print, but don't upload
        #[arg(long)]
        dry_run: bool,
    },

    /// Check the backend and Notion connections
    Check,

    /// List models installed on the backend
    Models,

    /// Inspect and extend the rules file
    Rules {
        #[command(subcommand)]
        command: RulesCommand,
    },

    /// Manage ~/.tally/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum RulesCommand {
    /// Print loaded rules and the category set
    List,

    /// Generalize a title into a pattern and save it as a rule
    Learn { title: String, category: String },

    /// Show the pattern a title generalizes to
    Pattern {
        title: String,

        /// Skip the backend and use the deterministic clean-up
        #[arg(long)]
        deterministic: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write the default config file (no-op if it exists)
    Init,

    /// Print the effective config, secrets masked
    Show,
}

type Engine = Categorizer<Box<dyn TextGenerationClient>, Box<dyn EscalationPort>>;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("warn,tally_cli=info,tally_categorize=info,tally_ingest=info")
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if let Command::Config { command } = &cli.command {
        return match command {
            ConfigCommand::Init => config::init_config(),
            ConfigCommand::Show => {
                let cfg = effective_config(&cli)?;
                println!("# {}\n", config::config_path()?.display());
                println!("{}", cfg.redacted()?);
                Ok(())
            }
        };
    }

    let cfg = effective_config(&cli)?;

    match cli.command {
        Command::Sync {
            input,
            file,
            dry_run,
        } => {
            let (files, scanned) = statement_files(input, file, &cfg.input.dir)?;
            sync(&cfg, files, scanned.as_deref(), dry_run).await?;
        }

        Command::Check => check(&cfg).await?,

        Command::Models => {
            let client = backend(&cfg)?;
            let models = client.list_models().context("list backend models")?;
            if models.is_empty() {
                println!("No models installed. Try: ollama pull {FALLBACK_MODEL}");
            }
            let recommended = recommended_model(&models);
            for m in &models {
                let mark = if Some(m.as_str()) == recommended { "  (recommended)" } else { "" };
                println!("{m}{mark}");
            }
        }

        Command::Rules { command } => match command {
            RulesCommand::List => {
                let store = RuleStore::load(&cfg.categorizer.rules_file);
                println!("Rules in {} ({}):", store.path().display(), store.len());
                for (pattern, category) in store.rules() {
                    println!("  {pattern} -> {category}");
                }
                let engine = Categorizer::new(
                    CategorizerConfig::default(),
                    store,
                    OfflineClient,
                    AutoAccept,
                );
                println!("\nCategories:");
                for (i, c) in engine.categories().iter().enumerate() {
                    let origin = match c.origin {
                        CategoryOrigin::BuiltIn => "built-in",
                        _ => "rules file",
                    };
                    println!(
                        "  {:2}. {} - {} [{}]",
                        i + 1,
                        c.name,
                        engine.categories().describe(&c.name),
                        origin
                    );
                }
            }
            RulesCommand::Learn { title, category } => {
                let mut engine = engine(&cfg, false)?;
                let (pattern, outcome) = engine.learn_rule(&title, &category);
                println!("{pattern} -> {category} ({outcome:?})");
                if !outcome.is_durable() {
                    bail!("rule was not written to {}", engine.store().path().display());
                }
            }
            RulesCommand::Pattern {
                title,
                deterministic,
            } => {
                let pattern = if deterministic {
                    fallback_pattern(&title)
                } else {
                    engine(&cfg, false)?.extract_pattern(&title)
                };
                println!("{pattern}");
            }
        },

        Command::Config { .. } => {}
    }

    Ok(())
}

/// File, then environment, then command-line flags.
fn effective_config(cli: &Cli) -> Result<Config> {
    let mut cfg = config::load_config()?;
    if let Some(t) = cli.threshold {
        cfg.categorizer.confidence_threshold = t;
    }
    if let Some(m) = &cli.model {
        cfg.llm.model = Some(m.clone());
    }
    if let Some(r) = &cli.rules {
        cfg.categorizer.rules_file = r.clone();
    }
    if cli.headless {
        cfg.categorizer.interactive = false;
    }
    if cli.offline {
        cfg.llm.provider = "offline".to_string();
    }
    cfg.validate()?;
    Ok(cfg)
}

fn backend(cfg: &Config) -> Result<Box<dyn TextGenerationClient>> {
    Ok(match cfg.llm.provider.as_str() {
        "offline" => Box::new(OfflineClient),
        _ => Box::new(OllamaClient::new(&cfg.llm.base_url, cfg.llm.timeout_secs)?),
    })
}

/// Build the engine. `prompting` puts the operator on the terminal when the
/// config allows it.
fn engine(cfg: &Config, prompting: bool) -> Result<Engine> {
    let client = backend(cfg)?;
    let mut port: Box<dyn EscalationPort> = if prompting && cfg.categorizer.interactive {
        Box::new(TerminalPort::new()?)
    } else {
        Box::new(AutoAccept)
    };

    let model = match (&cfg.llm.model, cfg.llm.provider.as_str()) {
        (Some(m), _) => m.clone(),
        (None, "offline") => FALLBACK_MODEL.to_string(),
        (None, _) => match client.list_models() {
            Ok(models) if prompting && cfg.categorizer.interactive => {
                select_model(&mut port, &models)
            }
            Ok(models) => recommended_model(&models)
                .unwrap_or(FALLBACK_MODEL)
                .to_string(),
            Err(e) => {
                warn!(error = %e, "model discovery failed; using {FALLBACK_MODEL}");
                FALLBACK_MODEL.to_string()
            }
        },
    };

    let store = RuleStore::load(&cfg.categorizer.rules_file);
    let config = CategorizerConfig {
        model,
        confidence_threshold: cfg.categorizer.confidence_threshold,
    };
    Ok(Categorizer::new(config, store, client, port))
}

/// Statement files for `sync`, plus the directory that was scanned when none
/// were named explicitly.
fn statement_files(
    input: Option<PathBuf>,
    file: Vec<PathBuf>,
    default_dir: &Path,
) -> Result<(Vec<PathBuf>, Option<PathBuf>)> {
    if !file.is_empty() {
        return Ok((file, None));
    }
    let dir = input.unwrap_or_else(|| default_dir.to_path_buf());
    let files = find_qfx_files(&dir)?;
    Ok((files, Some(dir)))
}

fn nothing_to_sync(scanned: Option<&Path>) -> String {
    match scanned {
        Some(dir) => format!("No statement files found in {}", dir.display()),
        None => "No statement files given".to_string(),
    }
}

async fn sync(
    cfg: &Config,
    files: Vec<PathBuf>,
    scanned: Option<&Path>,
    dry_run: bool,
) -> Result<()> {
    if files.is_empty() {
        println!("{}", nothing_to_sync(scanned));
        return Ok(());
    }

    let publisher = if dry_run {
        None
    } else {
        Some(NotionPublisher::from_config(&cfg.notion)?)
    };
    let mut engine = engine(cfg, true)?;

    let mut total_txns = 0;
    let mut total_uploaded = 0;
    let mut failed_files = 0;

    for path in &files {
        println!("\n=== {} ===", path.display());
        let txns = match parse_qfx_file(path) {
            Ok(t) => t,
            Err(e) => {
                error!(file = %path.display(), error = %e, "could not parse statement");
                failed_files += 1;
                continue;
            }
        };
        if txns.is_empty() {
            println!("No purchases found.");
            continue;
        }

        let summary = StatementSummary::from_transactions(&txns);
        println!("Transactions: {}", summary.count);
        if let Some((from, to)) = summary.date_range {
            println!("Date range: {from} to {to}");
        }
        println!("Total: ${:.2}\n", summary.total.abs());

        let report = engine.categorize_all(&txns);
        println!("{}", report.render());
        total_txns += txns.len();

        let Some(publisher) = &publisher else {
            println!("\n(dry run: nothing uploaded)");
            continue;
        };
        match publisher.upload_transactions(&txns, &report.categories()).await {
            Ok(n) => {
                println!("\nUploaded {n}/{} transactions", txns.len());
                total_uploaded += n;
            }
            Err(e) => {
                error!(file = %path.display(), error = %format!("{e:#}"), "upload failed");
                failed_files += 1;
            }
        }
    }

    println!(
        "\nDone: {} file(s), {} transaction(s), {} uploaded, {} failed file(s)",
        files.len(),
        total_txns,
        total_uploaded,
        failed_files
    );
    info!(
        files = files.len(),
        transactions = total_txns,
        uploaded = total_uploaded,
        failed = failed_files,
        "sync finished"
    );
    Ok(())
}

async fn check(cfg: &Config) -> Result<()> {
    let engine = engine(cfg, false)?;
    let model = &engine.config().model;
    println!("Backend: {} ({})", cfg.llm.provider, cfg.llm.base_url);
    match engine.check_backend() {
        Ok(check) if check.installed.is_empty() => {
            println!("  no models installed; try: ollama pull {FALLBACK_MODEL}");
        }
        Ok(check) => {
            println!("  installed: {}", check.installed.join(", "));
            if check.model_available {
                println!("  model {model} is available");
            } else {
                println!("  model {model} not found; try: ollama pull {model}");
            }
            if let Some(c) = check.smoke_test {
                println!(
                    "  test: STARBUCKS -> {} (confidence {:.2})",
                    c.category, c.confidence
                );
            }
        }
        Err(e) => println!("  unreachable: {e}"),
    }

    println!("Notion:");
    match NotionPublisher::from_config(&cfg.notion) {
        Ok(publisher) => match publisher.test_connection().await {
            Ok(title) => println!("  connected to database: {title}"),
            Err(e) => println!("  error: {e:#}"),
        },
        Err(e) => println!("  not configured: {e:#}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_input_dir_overrides_configured_dir() {
        let configured = tempfile::tempdir().unwrap();
        fs::write(configured.path().join("old.qfx"), "").unwrap();
        let given = tempfile::tempdir().unwrap();

        let (files, scanned) =
            statement_files(Some(given.path().to_path_buf()), vec![], configured.path()).unwrap();
        assert!(files.is_empty());
        assert_eq!(scanned.as_deref(), Some(given.path()));
        assert_eq!(
            nothing_to_sync(scanned.as_deref()),
            format!("No statement files found in {}", given.path().display())
        );
    }

    #[test]
    fn test_configured_dir_used_without_input() {
        let configured = tempfile::tempdir().unwrap();
        fs::write(configured.path().join("march.qfx"), "").unwrap();

        let (files, scanned) = statement_files(None, vec![], configured.path()).unwrap();
        assert_eq!(files, vec![configured.path().join("march.qfx")]);
        assert_eq!(scanned.as_deref(), Some(configured.path()));
    }

    #[test]
    fn test_explicit_files_skip_scanning() {
        let missing = PathBuf::from("/nonexistent/statements");
        let named = vec![PathBuf::from("a.qfx")];
        let (files, scanned) = statement_files(None, named.clone(), &missing).unwrap();
        assert_eq!(files, named);
        assert!(scanned.is_none());
    }
}
