use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use schnapsen_bench::analytics::{ProportionTest, summarize_jsonl};
use schnapsen_bench::config::{AgentKind, BenchmarkConfig};
use schnapsen_bench::logging::{TELEMETRY_FILE, init_logging, telemetry_dir};
use schnapsen_bench::telemetry::{append_highlights_to_markdown, write_summary_outputs};

/// Match series tooling for Schnapsen agents.
#[derive(Debug, Parser)]
#[command(
    name = "schnapsen-bench",
    author,
    version,
    about = "Deterministic Schnapsen match series harness"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load and validate a configuration, then print the lineup.
    Validate(ConfigArgs),
    /// Rebuild the Markdown summary and plot from a results JSONL file.
    Summarize {
        #[command(flatten)]
        config: ConfigArgs,

        /// Results file to read instead of the configured `outputs.jsonl`.
        #[arg(long, value_name = "FILE")]
        results: Option<PathBuf>,
    },
    /// Two-proportion z-test on a pair of win counts.
    Ztest {
        #[arg(long)]
        wins_a: u64,
        #[arg(long)]
        games_a: u64,
        #[arg(long)]
        wins_b: u64,
        #[arg(long)]
        games_b: u64,
        /// Significance level.
        #[arg(long, default_value_t = 0.05)]
        alpha: f64,
    },
}

#[derive(Debug, Args)]
struct ConfigArgs {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "bench/bench.yaml")]
    config: PathBuf,

    /// Override the run identifier (substitutes {run_id} templates).
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Override the number of games per matchup.
    #[arg(long, value_name = "GAMES")]
    games: Option<usize>,

    /// Override the RNG seed for deal generation.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,
}

impl ConfigArgs {
    fn load(&self) -> anyhow::Result<BenchmarkConfig> {
        let mut config = BenchmarkConfig::from_path(&self.config)?;

        if let Some(run_id) = self.run_id.clone() {
            config.run_id = run_id;
        }

        if let Some(games) = self.games {
            config.series.games = games;
        }

        if let Some(seed) = self.seed {
            config.series.seed = Some(seed);
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Validate(args) => validate(&args),
        Command::Summarize { config, results } => summarize(&config, results.as_deref()),
        Command::Ztest {
            wins_a,
            games_a,
            wins_b,
            games_b,
            alpha,
        } => ztest(wins_a, games_a, wins_b, games_b, alpha),
    }
}

fn validate(args: &ConfigArgs) -> anyhow::Result<()> {
    let config = args.load()?;
    let outputs = config.resolved_outputs();
    let _logging_guard = init_logging(&config.logging, &outputs)?;
    let agent_count = config.agents.len();
    info!(
        target: "schnapsen_bench::cli",
        run_id = %config.run_id,
        agents = agent_count,
        matchups = config.matchups.len(),
        "configuration validated"
    );

    println!(
        "Loaded configuration '{}' with {agent_count} agent{} ({} games per matchup, {} seat order{})",
        config.run_id,
        if agent_count == 1 { "" } else { "s" },
        config.series.games,
        config.series.seat_orders,
        if config.series.seat_orders == 1 { "" } else { "s" },
    );
    for agent in &config.agents {
        let kind = match agent.kind {
            AgentKind::Heuristic => "heuristic",
            AgentKind::External => "external (register a factory before running)",
        };
        println!("  agent {}: {kind}", agent.name);
    }
    for matchup in &config.matchups {
        println!(
            "  matchup {}: {} vs {}",
            matchup.id, matchup.agent, matchup.opponent
        );
    }
    for comparison in &config.metrics.comparisons {
        println!(
            "  compare {} against {} at alpha {}",
            comparison.a, comparison.b, config.metrics.significance_level
        );
    }

    println!("Results: {}", outputs.jsonl.display());
    println!("Summary table: {}", outputs.summary_md.display());
    Ok(())
}

fn summarize(args: &ConfigArgs, results: Option<&Path>) -> anyhow::Result<()> {
    let config = args.load()?;
    let outputs = config.resolved_outputs();
    let _logging_guard = init_logging(&config.logging, &outputs)?;
    let results = results.unwrap_or(outputs.jsonl.as_path());

    let summary = summarize_jsonl(&config, results)
        .with_context(|| format!("summarising {}", results.display()))?;

    if let Some(dir) = outputs
        .summary_md
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
    {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating summary directory at {}", dir.display()))?;
    }
    summary.write_markdown(&outputs.summary_md)?;
    info!(
        target: "schnapsen_bench::cli",
        results = %results.display(),
        matchups = summary.matchups.len(),
        comparisons = summary.comparisons.len(),
        "summary rebuilt"
    );
    println!("Summary table: {}", outputs.summary_md.display());

    match summary.render_plot(&outputs.plots_dir) {
        Ok(path) => println!("Win rate plot: {}", path.display()),
        Err(err) => eprintln!("WARN: {err}"),
    }

    for matchup in &summary.matchups {
        println!(
            "  {}: {} {} - {} {} ({:.2}% over {} games)",
            matchup.id,
            matchup.agent,
            matchup.agent_wins,
            matchup.opponent_wins,
            matchup.opponent,
            matchup.win_rate * 100.0,
            matchup.games
        );
    }
    for comparison in &summary.comparisons {
        println!(
            "  {} vs {}: z = {:.3}, p = {:.4} ({})",
            comparison.a,
            comparison.b,
            comparison.test.z,
            comparison.test.p_value,
            if comparison.significant {
                "significant"
            } else {
                "not significant"
            }
        );
    }

    let dir = telemetry_dir(&outputs);
    if let Some(telemetry) = write_summary_outputs(&dir.join(TELEMETRY_FILE), &dir)? {
        append_highlights_to_markdown(&outputs.summary_md, &telemetry)?;
        println!("Telemetry summary (JSON): {}", telemetry.json_path.display());
        println!(
            "Telemetry summary (Markdown): {}",
            telemetry.markdown_path.display()
        );
    }

    Ok(())
}

fn ztest(wins_a: u64, games_a: u64, wins_b: u64, games_b: u64, alpha: f64) -> anyhow::Result<()> {
    anyhow::ensure!(
        alpha > 0.0 && alpha < 1.0,
        "alpha must lie strictly between 0 and 1"
    );
    let test = ProportionTest::two_sided(wins_a, games_a, wins_b, games_b)?;

    println!(
        "Sample A wins: {wins_a}/{games_a} ({:.2}%)",
        test.rate_a * 100.0
    );
    println!(
        "Sample B wins: {wins_b}/{games_b} ({:.2}%)",
        test.rate_b * 100.0
    );
    println!("Z-Score: {}", test.z);
    println!("P-Value: {}", test.p_value);
    if test.is_significant(alpha) {
        println!("The win rates differ significantly at alpha {alpha}.");
    } else {
        println!("No significant difference in win rates at alpha {alpha}.");
    }
    Ok(())
}
