mod roster;
mod seating;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rand::{RngCore, SeedableRng, rngs::StdRng};
use schnapsen_bot::{Bot, PolicyError};
use schnapsen_core::model::perspective::PlayerPerspective;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{Level, event};

use crate::analytics::{AnalyticsCollector, AnalyticsError, AnalyticsSummary};
use crate::config::{BenchmarkConfig, MatchupConfig, ResolvedOutputs};
use crate::logging::LoggingGuard;
use crate::telemetry::{
    TelemetryError, TelemetryOutputs, append_highlights_to_markdown, write_summary_outputs,
};

pub use roster::{AgentError, AgentFactory, AgentRoster};
pub use seating::{SeatOrders, Side, Slot, slot_of};

/// Plays one complete game between two seated players.
///
/// The game rules live behind this trait: trick resolution, scoring and
/// turn order are the implementor's concern. `players[0]` sits in
/// [`Slot::First`].
pub trait MatchEngine {
    type Perspective: PlayerPerspective;
    type Error: std::error::Error + Send + Sync + 'static;

    fn play_game(
        &mut self,
        players: [&mut dyn Bot<Self::Perspective>; 2],
        rng: &mut StdRng,
    ) -> Result<GameOutcome, Self::Error>;
}

/// Result of one game as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameOutcome {
    pub winner: Slot,
    pub game_points: u32,
    pub score: u32,
}

/// Primary entry point for running match series.
pub struct MatchRunner<E: MatchEngine> {
    config: BenchmarkConfig,
    outputs: ResolvedOutputs,
    engine: E,
    roster: AgentRoster<E::Perspective>,
    seat_orders: SeatOrders,
    logging: Option<LoggingGuard>,
}

/// Summary details returned after a run.
pub struct RunSummary {
    pub games_played: usize,
    pub seat_orders: usize,
    pub rows_written: usize,
    pub jsonl_path: PathBuf,
    pub summary_path: PathBuf,
    pub plot_path: Option<PathBuf>,
    pub analytics: AnalyticsSummary,
    pub telemetry_outputs: Option<TelemetryOutputs>,
}

impl<E> MatchRunner<E>
where
    E: MatchEngine,
    E::Perspective: 'static,
{
    /// Build a runner; every agent named by a matchup must be spawnable.
    pub fn new(
        config: BenchmarkConfig,
        outputs: ResolvedOutputs,
        engine: E,
        roster: AgentRoster<E::Perspective>,
    ) -> Result<Self, RunnerError> {
        for matchup in &config.matchups {
            roster.is_ready(&matchup.agent)?;
            roster.is_ready(&matchup.opponent)?;
        }

        let seat_orders = SeatOrders::new(config.series.seat_orders);

        Ok(Self {
            config,
            outputs,
            engine,
            roster,
            seat_orders,
            logging: None,
        })
    }

    /// Hand over the structured logging guard so the run can summarise
    /// `telemetry.jsonl` once every event is flushed.
    pub fn with_logging(mut self, guard: Option<LoggingGuard>) -> Self {
        self.logging = guard;
        self
    }

    /// Execute every matchup, streaming JSONL rows to disk.
    pub fn run(&mut self) -> Result<RunSummary, RunnerError> {
        ensure_parent(self.outputs.jsonl.parent())?;
        ensure_parent(self.outputs.summary_md.parent())?;
        if !self.outputs.plots_dir.as_os_str().is_empty() {
            fs::create_dir_all(&self.outputs.plots_dir)?;
        }

        let mut writer = BufWriter::new(File::create(&self.outputs.jsonl)?);
        let mut analytics = AnalyticsCollector::new(&self.config);
        let mut rows_written = 0usize;
        let series_seed = self.config.series.seed.unwrap_or(0);

        for matchup in &self.config.matchups {
            // Every matchup replays the same deal seeds.
            let mut rng = StdRng::seed_from_u64(series_seed);

            for game_index in 0..self.config.series.games {
                let deal_seed = rng.next_u64();
                let mut seat_seeds = StdRng::seed_from_u64(deal_seed);
                let seeds = SideSeeds {
                    agent: seat_seeds.next_u64(),
                    opponent: seat_seeds.next_u64(),
                };

                for (order_index, order) in self.seat_orders.as_slice().iter().enumerate() {
                    let game = GameSetup {
                        run_id: &self.config.run_id,
                        matchup,
                        game_index,
                        seat_order: order_index,
                        order,
                        deal_seed,
                        seeds,
                    };
                    let row = play_game(&mut self.engine, &self.roster, &game)?;

                    if tracing::enabled!(Level::INFO) {
                        event!(
                            target: "schnapsen_bench::game",
                            Level::INFO,
                            run_id = %row.run_id,
                            matchup = %row.matchup,
                            game_id = %row.game_id,
                            first = %row.first,
                            second = %row.second,
                            winner = %row.winner,
                            game_points = row.game_points,
                            score = row.score,
                            decisions = row.decisions,
                        );
                    }

                    analytics.record_game(&row)?;
                    serde_json::to_writer(&mut writer, &row)?;
                    writer.write_all(b"\n")?;
                    rows_written += 1;
                }
            }
        }

        writer.flush()?;

        let summary = analytics.finalize()?;
        summary.write_markdown(&self.outputs.summary_md)?;
        let plot_path = match summary.render_plot(&self.outputs.plots_dir) {
            Ok(path) => Some(path),
            Err(err) => {
                eprintln!("WARN: {err}");
                None
            }
        };

        let telemetry_outputs = match self.logging.take() {
            Some(guard) => {
                let telemetry_path = guard.telemetry_path.clone();
                // Flushes the background writer.
                drop(guard);
                let dir = telemetry_path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                let outputs = write_summary_outputs(&telemetry_path, &dir)?;
                if let Some(outputs) = outputs.as_ref() {
                    append_highlights_to_markdown(&self.outputs.summary_md, outputs)?;
                }
                outputs
            }
            None => None,
        };

        Ok(RunSummary {
            games_played: self.config.series.games,
            seat_orders: self.seat_orders.as_slice().len(),
            rows_written,
            jsonl_path: self.outputs.jsonl.clone(),
            summary_path: self.outputs.summary_md.clone(),
            plot_path,
            analytics: summary,
            telemetry_outputs,
        })
    }
}

fn ensure_parent(path: Option<&Path>) -> Result<(), RunnerError> {
    if let Some(dir) = path.filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

#[derive(Clone, Copy)]
struct SideSeeds {
    agent: u64,
    opponent: u64,
}

struct GameSetup<'a> {
    run_id: &'a str,
    matchup: &'a MatchupConfig,
    game_index: usize,
    seat_order: usize,
    order: &'a [Side; 2],
    deal_seed: u64,
    seeds: SideSeeds,
}

impl GameSetup<'_> {
    fn game_id(&self) -> String {
        format!(
            "{}_G{:05}_S{}",
            self.matchup.id, self.game_index, self.seat_order
        )
    }

    fn agent_for(&self, side: Side) -> (&str, u64) {
        match side {
            Side::Agent => (&self.matchup.agent, self.seeds.agent),
            Side::Opponent => (&self.matchup.opponent, self.seeds.opponent),
        }
    }
}

fn play_game<E: MatchEngine>(
    engine: &mut E,
    roster: &AgentRoster<E::Perspective>,
    game: &GameSetup<'_>,
) -> Result<GameLogRow, RunnerError>
where
    E::Perspective: 'static,
{
    let game_id = game.game_id();
    let spawn = |side: Side| -> Result<MeteredBot<E::Perspective>, AgentError> {
        let (name, seed) = game.agent_for(side);
        Ok(MeteredBot::new(name, roster.spawn(name, seed)?))
    };
    let mut first = spawn(game.order[0])?;
    let mut second = spawn(game.order[1])?;

    let mut game_rng = StdRng::seed_from_u64(game.deal_seed);
    let outcome = engine
        .play_game(
            [
                &mut first as &mut dyn Bot<E::Perspective>,
                &mut second as &mut dyn Bot<E::Perspective>,
            ],
            &mut game_rng,
        )
        .map_err(|err| RunnerError::Engine {
            game_id: game_id.clone(),
            source: Box::new(err),
        })?;

    let winner = match outcome.winner {
        Slot::First => first.label.clone(),
        Slot::Second => second.label.clone(),
    };
    let first_metrics = first.metrics.finalize();
    let second_metrics = second.metrics.finalize();
    let decisions = first_metrics.decisions + second_metrics.decisions;
    let ms_per_decision = if decisions == 0 {
        0.0
    } else {
        (first_metrics.total_ms + second_metrics.total_ms) / f64::from(decisions)
    };

    Ok(GameLogRow {
        run_id: game.run_id.to_string(),
        matchup: game.matchup.id.clone(),
        game_id,
        game_index: game.game_index,
        seat_order: game.seat_order,
        deal_seed: game.deal_seed,
        first: first.label,
        second: second.label,
        winner_slot: outcome.winner,
        winner,
        game_points: outcome.game_points,
        score: outcome.score,
        decisions,
        ms_per_decision,
    })
}

/// Times every decision of the wrapped player.
struct MeteredBot<P: PlayerPerspective> {
    label: String,
    inner: Box<dyn Bot<P>>,
    metrics: DecisionMetrics,
}

impl<P: PlayerPerspective> MeteredBot<P> {
    fn new(label: &str, inner: Box<dyn Bot<P>>) -> Self {
        Self {
            label: label.to_string(),
            inner,
            metrics: DecisionMetrics::default(),
        }
    }
}

impl<P: PlayerPerspective> Bot<P> for MeteredBot<P> {
    fn name(&self) -> &str {
        &self.label
    }

    fn get_move(
        &mut self,
        perspective: &P,
        leader_move: Option<&P::Move>,
    ) -> Result<P::Move, PolicyError> {
        let start = Instant::now();
        let result = self.inner.get_move(perspective, leader_move);
        self.metrics.record(start.elapsed());
        result
    }
}

#[derive(Default)]
struct DecisionMetrics {
    total: Duration,
    decisions: u32,
}

impl DecisionMetrics {
    fn record(&mut self, duration: Duration) {
        self.total += duration;
        self.decisions += 1;
    }

    fn finalize(&self) -> DecisionSummary {
        DecisionSummary {
            decisions: self.decisions,
            total_ms: self.total.as_secs_f64() * 1000.0,
        }
    }
}

struct DecisionSummary {
    decisions: u32,
    total_ms: f64,
}

/// One line of the results JSONL file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameLogRow {
    pub run_id: String,
    pub matchup: String,
    pub game_id: String,
    pub game_index: usize,
    pub seat_order: usize,
    pub deal_seed: u64,
    pub first: String,
    pub second: String,
    pub winner_slot: Slot,
    pub winner: String,
    pub game_points: u32,
    pub score: u32,
    pub decisions: u32,
    pub ms_per_decision: f64,
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{0}")]
    Agent(#[from] AgentError),
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to serialize log row: {source}")]
    Serialize {
        #[from]
        source: serde_json::Error,
    },
    #[error("game {game_id} failed: {source}")]
    Engine {
        game_id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("analytics error: {0}")]
    Analytics(#[from] AnalyticsError),
    #[error("telemetry summarisation failed: {0}")]
    Telemetry(#[from] TelemetryError),
}
