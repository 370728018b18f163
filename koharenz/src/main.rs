//! Kohärenz Protocol command line.
//!
//! ```bash
//! koharenz                          # bilingual chat REPL (needs ANTHROPIC_API_KEY)
//! koharenz chat --lang de
//! koharenz sandbox --act 4 --turns 8 --seed 42 --save act4.txt
//! koharenz generate scene_request.json --output scene.json
//! koharenz analyze notes.txt --act 2
//! ```

mod repl;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossterm::style::Stylize;
use koharenz_core::analyzer::fragments_from_text;
use koharenz_core::sandbox::SandboxMetrics;
use koharenz_core::{
    logging, GenerationRequest, Kernwelt, KnowledgeStore, KoharenzAnalyzer, Language, Locale,
    OntologyReport, PlatformConfig, PlatformSession, SandboxSession, SceneGenerator, SceneSpec,
    SystemCards,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "koharenz")]
#[command(version)]
#[command(about = "Kohärenz Protocol: philosophical identity analysis and narrative sandbox")]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (default: ./koharenz.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat with the six personas
    Chat {
        /// Interface and answer language (en, de)
        #[arg(long)]
        lang: Option<Language>,

        /// Resume a session saved with /export <file>.json
        #[arg(long)]
        resume: Option<PathBuf>,
    },
    /// Offline dialogue between Kael, AEGIS and Juna/V
    Sandbox {
        /// Narrative act; affects Kael's integration level
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        act: Option<u8>,

        #[arg(long)]
        turns: Option<u32>,

        /// Seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        #[arg(long)]
        topic: Option<String>,

        /// Transcript file name, written under the transcript directory
        #[arg(long)]
        save: Option<String>,
    },
    /// Generate scene fragments from a JSON generation request
    Generate {
        request: PathBuf,

        /// Write the response as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip the ontology report
        #[arg(long)]
        no_analysis: bool,
    },
    /// Ontology metrics for a text file, computed locally
    Analyze {
        file: PathBuf,

        #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..=5))]
        act: u8,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = PlatformConfig::load(cli.config.as_deref()).context("loading configuration")?;
    logging::init(
        &logging::with_verbosity(&config.log_level, cli.verbose),
        cli.log_file.as_deref(),
    )?;
    tracing::debug!(?config, "configuration loaded");

    let cards = SystemCards::load(config.cards_path().as_deref())?;

    match cli.command.unwrap_or(Commands::Chat {
        lang: None,
        resume: None,
    }) {
        Commands::Chat { lang, resume } => run_chat(&config, cards, lang, resume).await,
        Commands::Sandbox {
            act,
            turns,
            seed,
            topic,
            save,
        } => {
            let act = act.unwrap_or(config.sandbox.act);
            let turns = turns.unwrap_or(config.sandbox.turns);
            let topic = topic.unwrap_or_else(|| config.sandbox.topic.clone());
            run_sandbox(&config, &cards, act, turns, seed, &topic, save).await
        }
        Commands::Generate {
            request,
            output,
            no_analysis,
        } => run_generate(&cards, request, output, !no_analysis).await,
        Commands::Analyze { file, act, json } => run_analyze(&cards, file, act, json).await,
    }
}

async fn run_chat(
    config: &PlatformConfig,
    cards: SystemCards,
    lang: Option<Language>,
    resume: Option<PathBuf>,
) -> Result<()> {
    if std::env::var("ANTHROPIC_API_KEY").is_err() {
        eprintln!("Error: ANTHROPIC_API_KEY environment variable not set.");
        eprintln!("Please set it in .env file or with: export ANTHROPIC_API_KEY=your_key_here");
        std::process::exit(1);
    }

    let mut model = claude::Claude::from_env()?;
    if let Some(name) = &config.model {
        model = model.with_model(name);
    }

    let knowledge = match config.knowledge_path() {
        Some(path) => KnowledgeStore::load(&path)
            .await
            .with_context(|| format!("loading knowledge base {}", path.display()))?,
        None => KnowledgeStore::seeded()?,
    };

    let mut session = PlatformSession::with_parts(
        model,
        cards,
        knowledge,
        config.session_settings(),
        lang.unwrap_or(config.language),
    )?;
    if let Some(path) = resume {
        session
            .load(&path)
            .await
            .with_context(|| format!("resuming {}", path.display()))?;
    }

    repl::run(&mut session).await
}

async fn run_sandbox(
    config: &PlatformConfig,
    cards: &SystemCards,
    act: u8,
    turns: u32,
    seed: Option<u64>,
    topic: &str,
    save: Option<String>,
) -> Result<()> {
    let locale = Locale::load(config.locale_dir().as_deref(), config.language)?;
    let mut sandbox = SandboxSession::new(act, seed, cards)?;

    let rule = "=".repeat(70);
    println!("\n{rule}");
    println!("  {}", locale.t_with("sandbox.header", &[("act", act.to_string().as_str())]).bold());
    println!("  {topic}");
    println!("{rule}\n");

    let mut context = topic.to_string();
    for _ in 0..turns {
        let outcome = sandbox.run_turn(&context);
        let turn = outcome.turn.to_string();
        let total = turns.to_string();
        println!(
            "\n--- {} ---\n",
            locale.t_with("sandbox.turn", &[("turn", turn.as_str()), ("turns", total.as_str())])
        );
        println!("{}\n{}\n", "[Kael]".magenta().bold(), outcome.kael);
        println!("{}\n{}\n", "[AEGIS]".cyan().bold(), outcome.aegis);
        if let Some(juna) = &outcome.juna {
            println!("{}\n{}\n", "[Juna/V]".yellow().bold(), juna);
        }
        context = outcome.next_context;
    }

    println!("\n{rule}");
    println!("  {}", locale.t("sandbox.complete"));
    println!("{rule}\n");
    print_metrics(&sandbox.metrics());

    if let Some(name) = save {
        let path = config.sandbox.transcript_dir.join(name);
        sandbox.save_transcript(&path).await?;
        println!(
            "{}",
            locale
                .t_with("sandbox.saved", &[("path", path.display().to_string().as_str())])
                .green()
        );
    }
    Ok(())
}

fn print_metrics(metrics: &SandboxMetrics) {
    println!("=== Session Metrics ===");
    println!("act: {}", metrics.act);
    println!("turns: {}", metrics.turns);
    println!("kael_integration: {:.2}", metrics.kael_integration);
    println!("aegis_coherence: {:.2}", metrics.aegis_coherence);
    println!("aegis_threat_level: {:.1}", metrics.aegis_threat_level);
    println!("paradoxon_active: {}", metrics.paradoxon_active);
    println!("juna_appearances: {}", metrics.juna_appearances);
    println!("system_stability: {:.2}", metrics.kernel_state.system_stability);
    println!("bruchpunkt_reached: {}", metrics.bruchpunkt_reached);
}

async fn run_generate(
    cards: &SystemCards,
    request: PathBuf,
    output: Option<PathBuf>,
    analyze: bool,
) -> Result<()> {
    let raw = tokio::fs::read_to_string(&request)
        .await
        .with_context(|| format!("reading {}", request.display()))?;
    let request: GenerationRequest = serde_json::from_str(&raw)
        .with_context(|| format!("parsing generation request {}", request.display()))?;

    let mut generator = SceneGenerator::new(cards)?;
    let response = if analyze {
        generator.generate_and_analyze(&request)?
    } else {
        generator.generate_scene(&request)?
    };

    println!("=== {} ===\n", request.scene_spec.title.as_str().bold());
    for (i, fragment) in response.fragments.iter().enumerate() {
        println!("--- Fragment {} ---", i + 1);
        println!("Speaker: {}", fragment.speaker);
        if !fragment.secondary_speakers.is_empty() {
            println!("Also: {}", fragment.secondary_speakers.join(", "));
        }
        println!(
            "Coherence: {:.2}  Integration: {:.2}",
            fragment.coherence_score, fragment.integration_score
        );
        println!("\n{}\n", fragment.content);
    }
    if let Some(report) = &response.ontology_report {
        print_report(report);
    }

    if let Some(path) = output {
        tokio::fs::write(&path, serde_json::to_string_pretty(&response)?)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        println!("{}", format!("Response written to {}", path.display()).green());
    }
    Ok(())
}

async fn run_analyze(cards: &SystemCards, file: PathBuf, act: u8, json: bool) -> Result<()> {
    let text = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    if text.trim().is_empty() {
        bail!("{} is empty", file.display());
    }

    let scene_id = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "text".to_string());
    let fragments = fragments_from_text(&scene_id, &text);
    let spec = SceneSpec::new(scene_id.clone(), scene_id, Kernwelt::default(), act);
    let report = KoharenzAnalyzer::from_config(&cards.to_protocol_config())
        .analyze_scene(&spec, &fragments);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Fragments: {}", fragments.len());
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &OntologyReport) {
    println!("=== Ontology Report ===");
    println!("Contradiction density: {:.2}", report.contradiction_density);
    println!("Alter balance:         {:.2}", report.alter_balance_score);
    println!("Riss progression:      {:.2}", report.riss_progression_index);
    println!("Integration:           {:.2}", report.integration_trajectory);
    println!("Φ estimate:            {:.2}", report.phi_estimate);
    for (label, items) in [
        ("Violations", &report.violations),
        ("Suggestions", &report.suggestions),
        ("Gödel vulnerabilities", &report.godel_vulnerabilities),
    ] {
        if !items.is_empty() {
            println!("\n{label}:");
            for item in items {
                println!("  - {item}");
            }
        }
    }
}
