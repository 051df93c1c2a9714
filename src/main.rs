// trade-value entry point.
//
// Startup sequence:
// 1. Initialize tracing (stderr, RUST_LOG aware)
// 2. Load config (copying defaults on first run)
// 3. Load and score the player table
// 4. Tag the roster with the scoring-policy hash
// 5. Dispatch the subcommand; results go to stdout

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use trade_value::config::{self, Config};
use trade_value::query::{self, TargetQuery};
use trade_value::scenario::ScenarioStore;
use trade_value::trade::backtest::{self, BacktestReport};
use trade_value::trade::picks::{self, DraftPick, Protection};
use trade_value::trade::roster::Roster;
use trade_value::trade::simulator::{simulate_trade, TradeProposal, TradeSide, TradeVerdict};
use trade_value::valuation::composite::{CompositeScorer, ScoredPlayer};
use trade_value::valuation::players;
use trade_value::valuation::salary_rule::TieredSalaryRule;

#[derive(Parser, Debug)]
#[command(
    name = "trade-value",
    version,
    about = "Player trade valuation and salary-matched trade simulation"
)]
struct Cli {
    /// Project directory holding config/ and defaults/
    #[arg(long, default_value = ".", global = true)]
    base_dir: PathBuf,

    /// Player CSV (overrides data_paths.players from config)
    #[arg(long, global = true)]
    players: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Json, global = true)]
    format: Format,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Table,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score every player and list them by trade value
    Rank {
        /// Only show the top N players
        #[arg(long)]
        top: Option<usize>,
        /// Also write the scored table (with TRADE_VALUE, VALUE_TIER) to a CSV
        #[arg(long)]
        out: Option<PathBuf>,
        /// Show player counts per tier instead of the ranking
        #[arg(long)]
        tiers: bool,
    },
    /// Simulate a trade between two sides
    Simulate {
        /// Players side A sends (repeatable)
        #[arg(long = "a")]
        side_a: Vec<String>,
        /// Players side B sends (repeatable)
        #[arg(long = "b")]
        side_b: Vec<String>,
        /// Picks side A sends, as N[:PROTECTION[:YEARS]]
        #[arg(long = "a-pick")]
        a_picks: Vec<DraftPick>,
        /// Picks side B sends, as N[:PROTECTION[:YEARS]]
        #[arg(long = "b-pick")]
        b_picks: Vec<DraftPick>,
        /// Read a TradeProposal JSON from a file ("-" for stdin) instead
        #[arg(long, conflicts_with_all = ["side_a", "side_b", "a_picks", "b_picks"])]
        input: Option<String>,
        /// Persist the proposal and verdict under this name
        #[arg(long)]
        save: Option<String>,
    },
    /// Search for trade targets
    Targets {
        #[arg(long)]
        max_salary: Option<f64>,
        #[arg(long)]
        max_age: Option<u32>,
        #[arg(long)]
        play_style: Option<String>,
        /// Accept any of these positions (repeatable)
        #[arg(long = "position")]
        positions: Vec<String>,
        #[arg(long, default_value_t = 20)]
        top: usize,
    },
    /// Compare players side by side, best trade value first
    Compare {
        #[arg(required = true, num_args = 1..)]
        names: Vec<String>,
    },
    /// Sub-score and trade value difference between two players
    Diff { first: String, second: String },
    /// Players with the largest market-value surplus
    Surplus {
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Value of a single draft pick
    PickValue {
        pick_number: u32,
        #[arg(long, default_value = "NONE")]
        protection: Protection,
        #[arg(long, default_value_t = 0)]
        years_out: u32,
    },
    /// Replay historical trades and score the value read against outcomes
    Backtest {
        /// Trades CSV (overrides data_paths.trades from config)
        #[arg(long)]
        trades: Option<PathBuf>,
    },
    /// Manage saved scenarios
    Scenario {
        #[command(subcommand)]
        action: ScenarioAction,
    },
}

#[derive(Subcommand, Debug)]
enum ScenarioAction {
    List,
    Show { name: String },
    Delete { name: String },
    Rename { from: String, to: String },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("trade_value=info,warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let out = Output {
        format: cli.format,
        pretty: cli.pretty,
    };

    match cli.command {
        // Needs neither config nor data.
        Command::PickValue {
            pick_number,
            protection,
            years_out,
        } => {
            let value = picks::pick_value(pick_number, protection, years_out)?;
            let pick = DraftPick {
                pick_number,
                protection,
                years_out,
            };
            out.emit(&serde_json::json!({ "pick": pick, "value": value }), || {
                format!("{pick}: {value:.1}")
            })
        }
        Command::Scenario { action } => {
            let config = load_config(&cli.base_dir)?;
            let store = open_store(&cli.base_dir, &config)?;
            run_scenario(&store, &action, &out)
        }
        Command::Rank { top, out: csv_out, tiers } => {
            let session = Session::load(&cli.base_dir, cli.players.as_deref())?;
            let roster = &session.roster;
            if let Some(path) = csv_out {
                players::write_scored(&path, roster.players())
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }
            if tiers {
                let dist = query::tier_distribution(roster.players());
                let rows: Vec<_> = dist
                    .iter()
                    .map(|(tier, count)| serde_json::json!({ "tier": tier, "count": count }))
                    .collect();
                out.emit(&rows, || {
                    dist.iter()
                        .map(|(tier, count)| format!("{:<16} {count}", tier.label()))
                        .collect::<Vec<_>>()
                        .join("\n")
                })
            } else {
                let n = top.unwrap_or(roster.len());
                let ranked: Vec<&ScoredPlayer> = roster.players().iter().take(n).collect();
                out.emit(&ranked, || player_table(&ranked))
            }
        }
        Command::Simulate {
            side_a,
            side_b,
            a_picks,
            b_picks,
            input,
            save,
        } => {
            let session = Session::load(&cli.base_dir, cli.players.as_deref())?;
            let proposal = match input {
                Some(source) => read_proposal(&source)?,
                None => TradeProposal::new(
                    TradeSide {
                        players: side_a,
                        picks: a_picks,
                    },
                    TradeSide {
                        players: side_b,
                        picks: b_picks,
                    },
                ),
            };
            let verdict = simulate_trade(&session.roster, &proposal, &session.rule)?;
            if let Some(name) = save {
                let store = open_store(&cli.base_dir, &session.config)?;
                let saved = store.save(&name, &proposal, &verdict)?;
                info!("scenario stored as '{}'", saved);
            }
            out.emit(&verdict, || verdict_table(&verdict))
        }
        Command::Targets {
            max_salary,
            max_age,
            play_style,
            positions,
            top,
        } => {
            let session = Session::load(&cli.base_dir, cli.players.as_deref())?;
            let q = TargetQuery {
                max_salary: max_salary.unwrap_or(f64::INFINITY),
                max_age,
                play_style,
                positions,
                top_n: top,
            };
            let found = query::find_targets(session.roster.players(), &q);
            out.emit(&found, || player_table(&found))
        }
        Command::Compare { names } => {
            let session = Session::load(&cli.base_dir, cli.players.as_deref())?;
            let found = query::compare_players(&session.roster, names.as_slice())?;
            out.emit(&found, || player_table(&found))
        }
        Command::Diff { first, second } => {
            let session = Session::load(&cli.base_dir, cli.players.as_deref())?;
            let diff = query::diff_players(&session.roster, &first, &second)?;
            out.emit(&diff, || {
                format!(
                    "{} vs {}\n  perf     {:+.2}\n  contract {:+.2}\n  fit      {:+.2}\n  age adj  {:+.2}\n  value    {:+.2}\n  salary   {:+.2}\n  tiers    {} / {}",
                    diff.first,
                    diff.second,
                    diff.perf_norm,
                    diff.contract_norm,
                    diff.fit_norm,
                    diff.age_adjustment,
                    diff.trade_value,
                    diff.salary,
                    diff.first_tier,
                    diff.second_tier
                )
            })
        }
        Command::Backtest { trades } => {
            let session = Session::load(&cli.base_dir, cli.players.as_deref())?;
            let path = trades
                .unwrap_or_else(|| resolve(&cli.base_dir, &session.config.data_paths.trades));
            let history = backtest::load_trades(&path)
                .with_context(|| format!("failed to load trades from {}", path.display()))?;
            let report = backtest::run_backtest(&session.roster, &history, &session.rule)?;
            out.emit(&report, || backtest_table(&report))
        }
        Command::Surplus { top } => {
            let session = Session::load(&cli.base_dir, cli.players.as_deref())?;
            let best = query::best_surplus(session.roster.players(), top);
            let rows: Vec<_> = best
                .iter()
                .map(|(p, surplus)| {
                    serde_json::json!({ "name": p.name(), "salary": p.record.salary, "surplus": surplus })
                })
                .collect();
            out.emit(&rows, || {
                best.iter()
                    .map(|(p, s)| format!("{:<24} {:>8.2} {:>+8.2}", p.name(), p.record.salary, s))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Output {
    format: Format,
    pretty: bool,
}

impl Output {
    /// Print `value` as JSON, or the `table` rendering in table mode.
    fn emit<T: Serialize + ?Sized>(&self, value: &T, table: impl FnOnce() -> String) -> Result<()> {
        let text = match self.format {
            Format::Table => table(),
            Format::Json if self.pretty => serde_json::to_string_pretty(value)?,
            Format::Json => serde_json::to_string(value)?,
        };
        println!("{text}");
        Ok(())
    }
}

/// Relative data paths are taken from the project directory.
fn resolve(base_dir: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

fn load_config(base_dir: &Path) -> Result<Config> {
    config::load_config(base_dir).context("failed to load configuration")
}

fn open_store(base_dir: &Path, config: &Config) -> Result<ScenarioStore> {
    let path = resolve(base_dir, &config.data_paths.scenarios_db);
    ScenarioStore::open(&path.to_string_lossy())
}

/// Config plus the scored, indexed player table.
struct Session {
    config: Config,
    roster: Roster,
    rule: TieredSalaryRule,
}

impl Session {
    fn load(base_dir: &Path, players_override: Option<&Path>) -> Result<Self> {
        let config = load_config(base_dir)?;
        let path = players_override
            .map(Path::to_path_buf)
            .unwrap_or_else(|| resolve(base_dir, &config.data_paths.players));

        let records = players::load_players(&path)
            .with_context(|| format!("failed to load players from {}", path.display()))?;
        let scorer = CompositeScorer::new(&config.scoring).context("invalid scoring config")?;
        let scored = scorer
            .score_dataset(&records)
            .context("failed to score player table")?;
        info!("scored {} players", scored.len());

        let roster = Roster::new(scored)
            .context("failed to index player table")?
            .with_scoring_hash(config.policy_hash());
        let rule = TieredSalaryRule::new(&config.salary_rule).context("invalid salary rule")?;
        Ok(Self { config, roster, rule })
    }
}

fn read_proposal(source: &str) -> Result<TradeProposal> {
    let json = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read proposal from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("failed to read proposal: {source}"))?
    };
    serde_json::from_str(&json).context("failed to parse TradeProposal JSON")
}

fn run_scenario(store: &ScenarioStore, action: &ScenarioAction, out: &Output) -> Result<()> {
    match action {
        ScenarioAction::List => {
            let names = store.list()?;
            out.emit(&names, || names.join("\n"))
        }
        ScenarioAction::Show { name } => {
            let Some(scenario) = store.load(name)? else {
                bail!("scenario '{name}' not found");
            };
            out.emit(&scenario, || {
                format!(
                    "{} (saved {})\n{}\n{}",
                    scenario.name,
                    scenario.saved_at,
                    scenario.signature,
                    verdict_table(&scenario.verdict)
                )
            })
        }
        ScenarioAction::Delete { name } => {
            store.delete(name)?;
            info!("deleted scenario '{}'", name);
            Ok(())
        }
        ScenarioAction::Rename { from, to } => {
            let renamed = store.rename(from, to)?;
            out.emit(&renamed, || renamed.clone())
        }
    }
}

fn player_table(players: &[&ScoredPlayer]) -> String {
    let mut lines = vec![format!(
        "{:<24} {:>3} {:>8} {:>7}  {}",
        "NAME", "AGE", "SALARY", "VALUE", "TIER"
    )];
    lines.extend(players.iter().map(|p| {
        format!(
            "{:<24} {:>3} {:>8.2} {:>7.2}  {}",
            p.name(),
            p.record.age,
            p.record.salary,
            p.trade_value,
            p.tier
        )
    }));
    lines.join("\n")
}

fn verdict_table(v: &TradeVerdict) -> String {
    let mut lines = vec![
        format!("{:<8} {:>10} {:>10}", "", "SALARY", "VALUE"),
        format!("{:<8} {:>10.2} {:>10.2}", "side A", v.side_a_salary, v.side_a_value),
        format!("{:<8} {:>10.2} {:>10.2}", "side B", v.side_b_salary, v.side_b_value),
        format!("salary difference: {:.2}", v.salary_diff),
        format!("value difference: {:+.2} ({})", v.value_difference, v.summary()),
    ];
    if let Some(hash) = &v.scoring_hash {
        lines.push(format!("scoring policy: {hash}"));
    }
    lines.extend(v.explain().into_iter().map(|b| format!("- {b}")));
    lines.join("\n")
}

fn backtest_table(report: &BacktestReport) -> String {
    let mut lines = vec![format!(
        "{:<20} {:<10} {:<10} {:>8} {:>6}  {}",
        "TRADE", "PREDICTED", "EXPECTED", "DIFF", "SALARY", "CORRECT"
    )];
    lines.extend(report.details.iter().map(|r| {
        format!(
            "{:<20} {:<10} {:<10} {:>+8.2} {:>6}  {}",
            r.trade_id,
            r.predicted_winner,
            r.expected_winner,
            r.value_difference,
            if r.salary_match { "ok" } else { "fail" },
            if r.correct { "yes" } else { "no" }
        )
    }));
    lines.push(format!(
        "trades={} correct={} accuracy={:.2}%",
        report.num_trades,
        report.num_correct(),
        report.accuracy * 100.0
    ));
    lines.join("\n")
}
