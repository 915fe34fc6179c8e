use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;

use crate::config::BenchmarkConfig;
use crate::tournament::GameLogRow;

const CONFIDENCE_Z: f64 = 1.96; // 95% CI

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("matchup '{0}' in results is not defined in the configuration")]
    UnknownMatchup(String),
    #[error("winner '{winner}' of game {game_id} is not part of matchup '{matchup}'")]
    UnknownWinner {
        matchup: String,
        game_id: String,
        winner: String,
    },
    #[error("sample {side} has no games")]
    EmptySample { side: &'static str },
    #[error("sample {side} reports {wins} wins out of {games} games")]
    WinsExceedGames {
        side: &'static str,
        wins: u64,
        games: u64,
    },
    #[error("normal distribution unavailable: {0}")]
    Distribution(String),
    #[error("failed to decode result row {line}: {source}")]
    Row {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to render plot: {0}")]
    Plot(String),
}

/// Pooled two-proportion z-test on win counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProportionTest {
    pub rate_a: f64,
    pub rate_b: f64,
    pub z: f64,
    pub p_value: f64,
}

impl ProportionTest {
    pub fn two_sided(
        wins_a: u64,
        games_a: u64,
        wins_b: u64,
        games_b: u64,
    ) -> Result<Self, AnalyticsError> {
        check_sample("a", wins_a, games_a)?;
        check_sample("b", wins_b, games_b)?;

        let (n1, n2) = (games_a as f64, games_b as f64);
        let rate_a = wins_a as f64 / n1;
        let rate_b = wins_b as f64 / n2;
        let pooled = (wins_a + wins_b) as f64 / (n1 + n2);
        let std_error = (pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2)).sqrt();

        if std_error == 0.0 {
            return Ok(Self {
                rate_a,
                rate_b,
                z: 0.0,
                p_value: 1.0,
            });
        }

        let z = (rate_a - rate_b) / std_error;
        let normal =
            Normal::new(0.0, 1.0).map_err(|e| AnalyticsError::Distribution(e.to_string()))?;
        let p_value = (2.0 * (1.0 - normal.cdf(z.abs()))).clamp(0.0, 1.0);

        Ok(Self {
            rate_a,
            rate_b,
            z,
            p_value,
        })
    }

    pub fn is_significant(&self, significance_level: f64) -> bool {
        self.p_value < significance_level
    }
}

fn check_sample(side: &'static str, wins: u64, games: u64) -> Result<(), AnalyticsError> {
    if games == 0 {
        return Err(AnalyticsError::EmptySample { side });
    }
    if wins > games {
        return Err(AnalyticsError::WinsExceedGames { side, wins, games });
    }
    Ok(())
}

/// Accumulates game rows into per-matchup tallies.
pub struct AnalyticsCollector {
    run_id: String,
    significance_level: f64,
    matchups: HashMap<String, MatchupAccumulator>,
    matchup_order: Vec<String>,
    comparisons: Vec<(String, String)>,
}

impl AnalyticsCollector {
    pub fn new(config: &BenchmarkConfig) -> Self {
        let mut matchups = HashMap::new();
        let mut order = Vec::new();
        for matchup in &config.matchups {
            matchups.insert(
                matchup.id.clone(),
                MatchupAccumulator::new(&matchup.agent, &matchup.opponent),
            );
            order.push(matchup.id.clone());
        }

        Self {
            run_id: config.run_id.clone(),
            significance_level: config.metrics.significance_level,
            matchups,
            matchup_order: order,
            comparisons: config
                .metrics
                .comparisons
                .iter()
                .map(|c| (c.a.clone(), c.b.clone()))
                .collect(),
        }
    }

    pub fn record_game(&mut self, row: &GameLogRow) -> Result<(), AnalyticsError> {
        let acc = self
            .matchups
            .get_mut(&row.matchup)
            .ok_or_else(|| AnalyticsError::UnknownMatchup(row.matchup.clone()))?;

        let agent_won = if row.winner == acc.agent {
            true
        } else if row.winner == acc.opponent {
            false
        } else {
            return Err(AnalyticsError::UnknownWinner {
                matchup: row.matchup.clone(),
                game_id: row.game_id.clone(),
                winner: row.winner.clone(),
            });
        };

        acc.record(agent_won, row);
        Ok(())
    }

    pub fn finalize(mut self) -> Result<AnalyticsSummary, AnalyticsError> {
        let mut reports = Vec::new();
        for id in &self.matchup_order {
            if let Some(acc) = self.matchups.remove(id) {
                reports.push(acc.into_report(id.clone()));
            }
        }

        let mut comparisons = Vec::new();
        for (a, b) in &self.comparisons {
            let find = |id: &str| {
                reports
                    .iter()
                    .find(|r| r.id == id)
                    .ok_or_else(|| AnalyticsError::UnknownMatchup(id.to_string()))
            };
            let (report_a, report_b) = (find(a.as_str())?, find(b.as_str())?);
            let test = ProportionTest::two_sided(
                report_a.agent_wins,
                report_a.games,
                report_b.agent_wins,
                report_b.games,
            )?;
            comparisons.push(ComparisonReport {
                a: a.clone(),
                b: b.clone(),
                significant: test.is_significant(self.significance_level),
                test,
            });
        }

        Ok(AnalyticsSummary {
            run_id: self.run_id,
            significance_level: self.significance_level,
            matchups: reports,
            comparisons,
        })
    }
}

/// Rebuild a summary from JSONL rows written by an earlier run.
pub fn summarize_jsonl(
    config: &BenchmarkConfig,
    path: &Path,
) -> Result<AnalyticsSummary, AnalyticsError> {
    let file = File::open(path).map_err(|source| AnalyticsError::Io {
        context: "opening results file",
        source,
    })?;
    summarize_rows(config, BufReader::new(file))
}

pub fn summarize_rows(
    config: &BenchmarkConfig,
    reader: impl BufRead,
) -> Result<AnalyticsSummary, AnalyticsError> {
    let mut collector = AnalyticsCollector::new(config);
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| AnalyticsError::Io {
            context: "reading results line",
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let row: GameLogRow = serde_json::from_str(&line).map_err(|source| AnalyticsError::Row {
            line: index + 1,
            source,
        })?;
        collector.record_game(&row)?;
    }
    collector.finalize()
}

struct MatchupAccumulator {
    agent: String,
    opponent: String,
    games: u64,
    agent_wins: u64,
    agent_win_points: u64,
    opponent_win_points: u64,
    total_latency_ms: f64,
    total_decisions: u64,
}

impl MatchupAccumulator {
    fn new(agent: &str, opponent: &str) -> Self {
        Self {
            agent: agent.to_string(),
            opponent: opponent.to_string(),
            games: 0,
            agent_wins: 0,
            agent_win_points: 0,
            opponent_win_points: 0,
            total_latency_ms: 0.0,
            total_decisions: 0,
        }
    }

    fn record(&mut self, agent_won: bool, row: &GameLogRow) {
        self.games += 1;
        if agent_won {
            self.agent_wins += 1;
            self.agent_win_points += u64::from(row.game_points);
        } else {
            self.opponent_win_points += u64::from(row.game_points);
        }
        self.total_latency_ms += row.ms_per_decision * f64::from(row.decisions);
        self.total_decisions += u64::from(row.decisions);
    }

    fn into_report(self, id: String) -> MatchupReport {
        let opponent_wins = self.games - self.agent_wins;
        let win_rate = ratio(self.agent_wins as f64, self.games);

        MatchupReport {
            id,
            agent: self.agent,
            opponent: self.opponent,
            games: self.games,
            agent_wins: self.agent_wins,
            opponent_wins,
            win_rate,
            ci95: confidence_interval(win_rate, self.games),
            avg_points_per_agent_win: ratio(self.agent_win_points as f64, self.agent_wins),
            avg_points_per_opponent_win: ratio(self.opponent_win_points as f64, opponent_wins),
            average_ms_per_decision: ratio(self.total_latency_ms, self.total_decisions),
        }
    }
}

fn ratio(numerator: f64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        numerator / count as f64
    }
}

/// Normal-approximation interval for a win rate, clamped to [0, 1].
fn confidence_interval(rate: f64, games: u64) -> (f64, f64) {
    if games == 0 {
        return (0.0, 0.0);
    }
    let margin = CONFIDENCE_Z * (rate * (1.0 - rate) / games as f64).sqrt();
    ((rate - margin).max(0.0), (rate + margin).min(1.0))
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchupReport {
    pub id: String,
    pub agent: String,
    pub opponent: String,
    pub games: u64,
    pub agent_wins: u64,
    pub opponent_wins: u64,
    pub win_rate: f64,
    pub ci95: (f64, f64),
    pub avg_points_per_agent_win: f64,
    pub avg_points_per_opponent_win: f64,
    pub average_ms_per_decision: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub a: String,
    pub b: String,
    pub test: ProportionTest,
    pub significant: bool,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsSummary {
    pub run_id: String,
    pub significance_level: f64,
    pub matchups: Vec<MatchupReport>,
    pub comparisons: Vec<ComparisonReport>,
}

impl AnalyticsSummary {
    pub fn matchup(&self, id: &str) -> Option<&MatchupReport> {
        self.matchups.iter().find(|m| m.id == id)
    }

    pub fn render_markdown(&self) -> String {
        let mut rows = String::new();
        rows.push_str("# Match Series Summary\n\n");
        rows.push_str(&format!("Run: `{}`\n\n", self.run_id));
        rows.push_str("| Matchup | Agent | Opponent | Games | Agent Wins | Opponent Wins | Win % | 95% CI | Avg pts/win | Avg ms/decision |\n");
        rows.push_str("|---------|-------|----------|-------|------------|---------------|-------|--------|-------------|------------------|\n");

        for m in &self.matchups {
            rows.push_str(&format!(
                "| {id} | {agent} | {opponent} | {games} | {wins} | {losses} | {rate:.2}% | [{low:.3}, {high:.3}] | {pts:.2} | {latency:.3} |\n",
                id = m.id,
                agent = m.agent,
                opponent = m.opponent,
                games = m.games,
                wins = m.agent_wins,
                losses = m.opponent_wins,
                rate = m.win_rate * 100.0,
                low = m.ci95.0,
                high = m.ci95.1,
                pts = m.avg_points_per_agent_win,
                latency = m.average_ms_per_decision,
            ));
        }

        if !self.comparisons.is_empty() {
            rows.push_str("\n## Significance\n\n");
            rows.push_str(&format!(
                "Two-proportion z-test, significance level {}\n\n",
                self.significance_level
            ));
            rows.push_str("| A | B | Win % A | Win % B | z | p-value | Significant |\n");
            rows.push_str("|---|---|---------|---------|---|---------|-------------|\n");
            for c in &self.comparisons {
                rows.push_str(&format!(
                    "| {a} | {b} | {ra:.2}% | {rb:.2}% | {z:.3} | {p:.4} | {sig} |\n",
                    a = c.a,
                    b = c.b,
                    ra = c.test.rate_a * 100.0,
                    rb = c.test.rate_b * 100.0,
                    z = c.test.z,
                    p = c.test.p_value,
                    sig = if c.significant { "Yes" } else { "No" },
                ));
            }
        }

        rows
    }

    pub fn write_markdown(&self, path: impl AsRef<Path>) -> Result<(), AnalyticsError> {
        fs::write(path.as_ref(), self.render_markdown()).map_err(|e| AnalyticsError::Io {
            context: "writing summary markdown",
            source: e,
        })
    }

    pub fn render_plot(&self, dir: impl AsRef<Path>) -> Result<PathBuf, AnalyticsError> {
        let dir = dir.as_ref();
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).map_err(|e| AnalyticsError::Io {
                context: "creating plots directory",
                source: e,
            })?;
        }

        let output_path = dir.join("win_rate.png");
        let matchups = self.matchups.clone();

        let prev_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(|_| {}));

        let plot_attempt = std::panic::catch_unwind(move || {
            let root = BitMapBackend::new(&output_path, (800, 480)).into_drawing_area();
            root.fill(&WHITE)
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            let mut chart = ChartBuilder::on(&root)
                .margin(20)
                .caption("Agent win rate per matchup", ("sans-serif", 22))
                .set_label_area_size(LabelAreaPosition::Left, 50)
                .set_label_area_size(LabelAreaPosition::Bottom, 60)
                .build_cartesian_2d(0..matchups.len(), 0.0f64..1.0f64)
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            chart
                .configure_mesh()
                .disable_mesh()
                .y_desc("Win rate")
                .x_desc("Matchup")
                .x_label_formatter(&|idx| {
                    matchups
                        .get(*idx)
                        .map(|m| m.id.clone())
                        .unwrap_or_default()
                })
                .draw()
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            chart
                .draw_series(matchups.iter().enumerate().map(|(idx, m)| {
                    let color = if m.win_rate >= 0.5 { &GREEN } else { &RED };
                    Rectangle::new([(idx, 0.0), (idx + 1, m.win_rate)], color.filled())
                }))
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            chart
                .draw_series(matchups.iter().enumerate().map(|(idx, m)| {
                    PathElement::new(
                        vec![(idx, m.ci95.0), (idx, m.ci95.1)],
                        BLACK.stroke_width(2),
                    )
                }))
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            drop(chart);

            root.present()
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            drop(root);

            Ok(output_path)
        });

        std::panic::set_hook(prev_hook);

        match plot_attempt {
            Ok(result) => result,
            Err(_) => Err(AnalyticsError::Plot(
                "plotters panicked while rendering (missing font support?)".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tournament::Slot;

    const CONFIG: &str = r#"
run_id: "analytics"
series:
  games: 10
agents:
  - name: "heuristic"
    kind: "heuristic"
  - name: "random"
    kind: "external"
  - name: "rdeep"
    kind: "external"
matchups:
  - id: "h-r"
    agent: "heuristic"
    opponent: "rdeep"
  - id: "x-r"
    agent: "random"
    opponent: "rdeep"
outputs:
  jsonl: "games.jsonl"
  summary_md: "summary.md"
  plots_dir: "plots"
metrics:
  comparisons:
    - a: "h-r"
      b: "x-r"
"#;

    fn config() -> BenchmarkConfig {
        let mut cfg: BenchmarkConfig = serde_yaml::from_str(CONFIG).expect("yaml");
        cfg.validate().expect("valid");
        cfg
    }

    fn row(matchup: &str, index: usize, winner: &str, points: u32) -> GameLogRow {
        GameLogRow {
            run_id: "analytics".into(),
            matchup: matchup.into(),
            game_id: format!("{matchup}_G{index:05}_S0"),
            game_index: index,
            seat_order: 0,
            deal_seed: index as u64,
            first: "a".into(),
            second: "b".into(),
            winner_slot: Slot::First,
            winner: winner.into(),
            game_points: points,
            score: 66,
            decisions: 10,
            ms_per_decision: 0.5,
        }
    }

    #[test]
    fn ztest_matches_reference_experiment() {
        let test = ProportionTest::two_sided(194, 1000, 65, 1000).unwrap();
        assert!((test.rate_a - 0.194).abs() < 1e-12);
        assert!((test.rate_b - 0.065).abs() < 1e-12);
        assert!((test.z - 8.591).abs() < 0.01, "z = {}", test.z);
        assert!(test.p_value < 1e-10);
        assert!(test.is_significant(0.05));
    }

    #[test]
    fn ztest_moderate_difference() {
        let test = ProportionTest::two_sided(55, 100, 45, 100).unwrap();
        assert!((test.z - 1.4142).abs() < 1e-3);
        assert!((test.p_value - 0.1573).abs() < 1e-3);
        assert!(!test.is_significant(0.05));
        assert!(test.is_significant(0.2));
    }

    #[test]
    fn ztest_is_antisymmetric() {
        let forward = ProportionTest::two_sided(30, 80, 50, 90).unwrap();
        let backward = ProportionTest::two_sided(50, 90, 30, 80).unwrap();
        assert!((forward.z + backward.z).abs() < 1e-12);
        assert!((forward.p_value - backward.p_value).abs() < 1e-12);
    }

    #[test]
    fn ztest_degenerate_samples() {
        let identical = ProportionTest::two_sided(10, 10, 5, 5).unwrap();
        assert_eq!(identical.z, 0.0);
        assert_eq!(identical.p_value, 1.0);

        assert!(matches!(
            ProportionTest::two_sided(0, 0, 3, 10),
            Err(AnalyticsError::EmptySample { side: "a" })
        ));
        assert!(matches!(
            ProportionTest::two_sided(3, 10, 0, 0),
            Err(AnalyticsError::EmptySample { side: "b" })
        ));
        assert!(matches!(
            ProportionTest::two_sided(11, 10, 3, 10),
            Err(AnalyticsError::WinsExceedGames { .. })
        ));
    }

    #[test]
    fn collector_tallies_wins_and_points() {
        let mut collector = AnalyticsCollector::new(&config());
        collector.record_game(&row("h-r", 0, "heuristic", 3)).unwrap();
        collector.record_game(&row("h-r", 1, "heuristic", 1)).unwrap();
        collector.record_game(&row("h-r", 2, "rdeep", 2)).unwrap();
        collector.record_game(&row("x-r", 0, "rdeep", 1)).unwrap();
        collector.record_game(&row("x-r", 1, "random", 2)).unwrap();

        let summary = collector.finalize().unwrap();
        let h = summary.matchup("h-r").unwrap();
        assert_eq!(h.games, 3);
        assert_eq!(h.agent_wins, 2);
        assert_eq!(h.opponent_wins, 1);
        assert!((h.win_rate - 2.0 / 3.0).abs() < 1e-12);
        assert!((h.avg_points_per_agent_win - 2.0).abs() < 1e-12);
        assert!((h.avg_points_per_opponent_win - 2.0).abs() < 1e-12);
        assert!((h.average_ms_per_decision - 0.5).abs() < 1e-12);
        assert!(h.ci95.0 >= 0.0 && h.ci95.1 <= 1.0 && h.ci95.0 < h.win_rate);

        assert_eq!(summary.comparisons.len(), 1);
        let comparison = &summary.comparisons[0];
        assert!((comparison.test.rate_b - 0.5).abs() < 1e-12);
        assert!(!comparison.significant);
    }

    #[test]
    fn collector_rejects_foreign_rows() {
        let mut collector = AnalyticsCollector::new(&config());
        assert!(matches!(
            collector.record_game(&row("nope", 0, "heuristic", 1)),
            Err(AnalyticsError::UnknownMatchup(_))
        ));
        assert!(matches!(
            collector.record_game(&row("h-r", 0, "random", 1)),
            Err(AnalyticsError::UnknownWinner { .. })
        ));
    }

    #[test]
    fn comparison_without_games_is_an_error() {
        let mut collector = AnalyticsCollector::new(&config());
        collector.record_game(&row("h-r", 0, "heuristic", 3)).unwrap();
        assert!(matches!(
            collector.finalize(),
            Err(AnalyticsError::EmptySample { side: "b" })
        ));
    }

    #[test]
    fn summarize_rows_reads_jsonl() {
        let rows = [
            row("h-r", 0, "heuristic", 3),
            row("h-r", 1, "rdeep", 1),
            row("x-r", 0, "rdeep", 2),
        ];
        let mut text = String::new();
        for r in &rows {
            text.push_str(&serde_json::to_string(r).unwrap());
            text.push_str("\n\n");
        }
        let summary = summarize_rows(&config(), text.as_bytes()).unwrap();
        assert_eq!(summary.matchup("h-r").unwrap().agent_wins, 1);
        assert_eq!(summary.matchup("x-r").unwrap().opponent_wins, 1);

        let err = summarize_rows(&config(), "{\"broken\": true}\n".as_bytes()).unwrap_err();
        assert!(matches!(err, AnalyticsError::Row { line: 1, .. }));
    }

    #[test]
    fn markdown_lists_matchups_and_significance() {
        let mut collector = AnalyticsCollector::new(&config());
        for i in 0..4 {
            collector.record_game(&row("h-r", i, "heuristic", 2)).unwrap();
            collector.record_game(&row("x-r", i, "rdeep", 2)).unwrap();
        }
        let markdown = collector.finalize().unwrap().render_markdown();
        assert!(markdown.starts_with("# Match Series Summary"));
        assert!(markdown.contains("| h-r | heuristic | rdeep | 4 | 4 | 0 | 100.00% |"));
        assert!(markdown.contains("## Significance"));
        assert!(markdown.contains("| h-r | x-r | 100.00% | 0.00% |"));
    }

    #[test]
    fn confidence_interval_is_clamped() {
        assert_eq!(confidence_interval(1.0, 10), (1.0, 1.0));
        assert_eq!(confidence_interval(0.0, 0), (0.0, 0.0));
        let (low, high) = confidence_interval(0.5, 100);
        assert!((low - 0.402).abs() < 1e-9);
        assert!((high - 0.598).abs() < 1e-9);
    }
}
