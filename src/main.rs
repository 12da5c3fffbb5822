mod client;
mod config;
mod focus;
mod history;
mod overrides;
mod prompts;
mod session;
mod sessions;
mod telemetry;
mod tui;

use anyhow::{Result, bail};
use clap::{CommandFactory, Parser};

use config::{ConfigFile, ResolvedConfig};

#[derive(Parser, Debug)]
#[command(
    name = "parley",
    about = "Conversational Q&A over your organisation's documents",
    long_about = None,
)]
struct Args {
    /// Question to ask directly (omit to enter interactive TUI mode)
    question: Option<String>,

    /// Profile to use from config file
    #[arg(short, long, env = "PARLEY_PROFILE")]
    profile: Option<String>,

    /// Override backend endpoint URL
    #[arg(long, env = "PARLEY_ENDPOINT")]
    endpoint: Option<String>,

    /// Override API key
    #[arg(long, env = "PARLEY_API_KEY")]
    api_key: Option<String>,

    /// Search index to query (default, group1..group5)
    #[arg(short, long, env = "PARLEY_INDEX")]
    index: Option<String>,

    /// Show supporting content under single-shot answers
    #[arg(long)]
    sources: bool,

    /// Write a default config file to ~/.config/parley/config.toml and exit
    #[arg(long)]
    init: bool,

    /// List available profiles and exit
    #[arg(long)]
    profiles: bool,

    /// Generate shell completions and print to stdout (bash, zsh, fish, elvish)
    #[arg(long, value_name = "SHELL")]
    completions: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ── --init ────────────────────────────────────────────────────────────────
    if args.init {
        let path = ConfigFile::write_default_if_missing()?;
        println!("Config written to: {}", path.display());
        println!("Edit it, then run: parley");
        return Ok(());
    }

    // ── --completions ─────────────────────────────────────────────────────────
    if let Some(shell_name) = &args.completions {
        return generate_completions(shell_name);
    }

    let file = ConfigFile::load()?;

    // ── --profiles ────────────────────────────────────────────────────────────
    if args.profiles {
        print_profiles(&file);
        return Ok(());
    }

    let resolved = ResolvedConfig::resolve(
        &file,
        args.profile.as_deref(),
        args.endpoint.as_deref(),
        args.api_key.as_deref(),
        args.index.as_deref(),
    );

    // ── Single-shot mode (plain stdout, no TUI) ───────────────────────────────
    if let Some(question) = args.question {
        return run_single_shot(question, resolved, args.sources).await;
    }

    // ── Interactive TUI mode ──────────────────────────────────────────────────
    tui::run(resolved).await
}

// ── Single-shot mode ──────────────────────────────────────────────────────────

async fn run_single_shot(question: String, resolved: ResolvedConfig, sources: bool) -> Result<()> {
    use crate::client::ApiClient;
    use crate::overrides::SearchIndex;
    use crate::session::SessionController;

    let mut api = ApiClient::new(resolved.endpoint.clone());
    if let Some(key) = &resolved.api_key {
        api.set_api_key(key.clone());
    }
    if let Some(secs) = resolved.timeout_secs {
        api.set_timeout(secs);
    }

    let mut controller = SessionController::new();
    controller.overrides.index = SearchIndex::parse(&resolved.index);

    if !controller.submit(&api, &question).await {
        bail!("question must not be empty");
    }

    if let Some(err) = controller.error() {
        bail!("{}", err.detail);
    }

    let Some(turn) = controller.turns().last() else {
        bail!("backend returned no answer");
    };

    println!("{}", turn.response.answer_text());

    let citations = turn.response.citations();
    if !citations.is_empty() {
        println!();
        for (i, c) in citations.iter().enumerate() {
            println!("  [{}] {c}", i + 1);
        }
    }

    if sources && !turn.response.data_points.is_empty() {
        println!();
        for d in &turn.response.data_points {
            println!("  · {d}");
        }
    }

    Ok(())
}

// ── --profiles ────────────────────────────────────────────────────────────────

fn print_profiles(file: &ConfigFile) {
    if file.profiles.is_empty() {
        println!("No profiles configured. Run `parley --init` to create a starter config.");
        return;
    }
    let mut names: Vec<&String> = file.profiles.keys().collect();
    names.sort();
    println!("Profiles ({}):", config::config_path().display());
    for name in names {
        let p = &file.profiles[name];
        let marker = if *name == file.default_profile { "*" } else { " " };
        println!("  {marker} {name:<16} {}  index={}", p.endpoint, p.index);
    }
}

// ── --completions ─────────────────────────────────────────────────────────────

fn generate_completions(shell_name: &str) -> Result<()> {
    use clap_complete::{Shell, generate};

    let shell = match shell_name.to_lowercase().as_str() {
        "bash" => Shell::Bash,
        "zsh" => Shell::Zsh,
        "fish" => Shell::Fish,
        "elvish" => Shell::Elvish,
        other => bail!("unsupported shell: {other} (try bash, zsh, fish, elvish)"),
    };

    let mut cmd = Args::command();
    generate(shell, &mut cmd, "parley", &mut std::io::stdout());
    Ok(())
}
