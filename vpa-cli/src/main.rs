//! VPA CLI — ingest, backtest, scan, paper, replay, status, health.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use vpa_core::domain::{Bar, IdGen};
use vpa_core::interfaces::{BarStore, Journal, VpaEvent};
use vpa_core::pipeline::run_pipeline;
use vpa_core::risk::{AccountState, TradeIntentStatus};
use vpa_core::safety::SafetyGuard;
use vpa_core::setup::{Direction, SetupComposer};
use vpa_runner::{load_config, run_backtest, JsonlBarStore, JsonlJournal};

#[derive(Parser)]
#[command(name = "vpa")]
#[command(about = "Deterministic Volume-Price-Analysis signal pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,

    /// Directory holding one JSONL bar file per symbol/timeframe
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// Base config document
    #[arg(long, global = true, default_value = "config/base.json")]
    config: PathBuf,

    /// Optional per-symbol config override, deep-merged onto --config
    #[arg(long, global = true)]
    config_override: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Append newline-delimited `Bar` JSON read from stdin into the bar store
    Ingest {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        tf: String,
    },

    /// Run a full-history backtest and print the resulting stats as JSON
    Backtest {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        tf: String,
        #[arg(long)]
        daily_tf: Option<String>,
        #[arg(long, default_value_t = 100_000.0)]
        initial_equity: f64,
    },

    /// Run the pipeline once over the full stored history and print any
    /// trade intents that came out `READY` on the final bar
    Scan {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        tf: String,
    },

    /// Placeholder for live/paper trading — not implemented without a broker adapter
    Paper {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        tf: String,
        #[arg(long)]
        live: bool,
    },

    /// Re-run the pipeline bar by bar, printing a summary and appending the
    /// full structured event stream to a JSONL journal
    Replay {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        tf: String,
        /// Journal file to append events to (defaults to {data_dir}/{symbol}/{tf}.journal.jsonl)
        #[arg(long)]
        journal: Option<PathBuf>,
    },

    /// Report how many bars are stored for a symbol/timeframe
    Status {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        tf: String,
    },

    /// Exit 0 if the config loads and validates, 1 otherwise
    Health,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Ingest { symbol, tf } => ingest(&cli.data_dir, &symbol, &tf),
        Commands::Backtest {
            symbol,
            tf,
            daily_tf,
            initial_equity,
        } => backtest(&cli, &symbol, &tf, daily_tf.as_deref(), initial_equity),
        Commands::Scan { symbol, tf } => scan(&cli, &symbol, &tf),
        Commands::Paper { symbol, tf, live } => paper(&symbol, &tf, live),
        Commands::Replay { symbol, tf, journal } => replay(&cli, &symbol, &tf, journal.as_deref()),
        Commands::Status { symbol, tf } => status(&cli.data_dir, &symbol, &tf),
        Commands::Health => health(&cli),
    }
}

fn ingest(data_dir: &PathBuf, symbol: &str, tf: &str) -> Result<()> {
    let stdin = std::io::stdin();
    let mut bars = Vec::new();
    for line in std::io::BufRead::lines(stdin.lock()) {
        let line = line.context("reading stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        let bar: Bar = serde_json::from_str(&line).context("parsing bar JSON from stdin")?;
        bar.validate().context("bar failed geometry validation")?;
        bars.push(bar);
    }
    if bars.is_empty() {
        bail!("no bars read from stdin");
    }
    let store = JsonlBarStore::new(data_dir);
    store.append(symbol, tf, &bars)?;
    eprintln!("ingested {} bar(s) into {symbol}/{tf}", bars.len());
    Ok(())
}

fn backtest(
    cli: &Cli,
    symbol: &str,
    tf: &str,
    daily_tf: Option<&str>,
    initial_equity: f64,
) -> Result<()> {
    let (config, config_hash) = load_config(&cli.config, cli.config_override.as_deref())?;
    let store = JsonlBarStore::new(&cli.data_dir);
    let bars = store.load(symbol, tf)?;
    if bars.is_empty() {
        bail!("no bars stored for {symbol}/{tf}");
    }
    let daily_bars = match daily_tf {
        Some(dtf) => Some(store.load(symbol, dtf)?),
        None => None,
    };

    eprintln!("running backtest for {symbol}/{tf} ({} bars, config {config_hash})", bars.len());
    let result = run_backtest(symbol, tf, &bars, daily_bars.as_deref(), &config, initial_equity);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn scan(cli: &Cli, symbol: &str, tf: &str) -> Result<()> {
    let (config, _hash) = load_config(&cli.config, cli.config_override.as_deref())?;
    let store = JsonlBarStore::new(&cli.data_dir);
    let bars = store.load(symbol, tf)?;
    if bars.is_empty() {
        bail!("no bars stored for {symbol}/{tf}");
    }

    let mut composer = SetupComposer::new();
    let mut id_gen = IdGen::default();
    let account = AccountState {
        equity: 100_000.0,
        open_positions: 0,
        daily_pnl: 0.0,
    };

    let mut last = None;
    for i in 0..bars.len() {
        last = run_pipeline(&bars[..=i], None, &config, &mut composer, &account, &mut id_gen, tf);
    }

    match last {
        Some(result) => {
            let ready: Vec<_> = result
                .trade_intents
                .iter()
                .filter(|intent| intent.status == TradeIntentStatus::Ready)
                .collect();
            println!("{}", serde_json::to_string_pretty(&ready)?);
        }
        None => println!("[]"),
    }
    Ok(())
}

fn paper(symbol: &str, tf: &str, live: bool) -> Result<()> {
    if live {
        bail!("live paper trading requires a broker adapter, which this build does not carry");
    }
    eprintln!("paper mode for {symbol}/{tf}: no broker adapter configured, nothing to do");
    Ok(())
}

fn replay(cli: &Cli, symbol: &str, tf: &str, journal_path: Option<&std::path::Path>) -> Result<()> {
    let (config, _hash) = load_config(&cli.config, cli.config_override.as_deref())?;
    let store = JsonlBarStore::new(&cli.data_dir);
    let bars = store.load(symbol, tf)?;
    if bars.is_empty() {
        bail!("no bars stored for {symbol}/{tf}");
    }

    let default_path = cli.data_dir.join(symbol).join(format!("{tf}.journal.jsonl"));
    let journal_path = journal_path.unwrap_or(&default_path);
    let mut journal = JsonlJournal::open(journal_path).context("opening replay journal")?;

    let mut composer = SetupComposer::new();
    let mut id_gen = IdGen::default();
    let mut guard = SafetyGuard::new();
    let mut equity = 100_000.0;
    let mut daily_pnl = 0.0;
    let mut current_day: Option<chrono::NaiveDate> = None;
    let mut open_position: Option<ReplayPosition> = None;

    for i in 0..bars.len() {
        let current = &bars[i];
        let bar_day = current.timestamp.date_naive();
        if current_day != Some(bar_day) {
            current_day = Some(bar_day);
            daily_pnl = 0.0;
        }

        if let Some(position) = &open_position {
            let stopped = match position.direction {
                Direction::Long => current.low <= position.stop_price,
                Direction::Short => current.high >= position.stop_price,
            };
            if stopped {
                let position = open_position.take().unwrap();
                let pnl = match position.direction {
                    Direction::Long => (position.stop_price - position.entry_price) * position.quantity as f64,
                    Direction::Short => (position.entry_price - position.stop_price) * position.quantity as f64,
                };
                equity += pnl;
                daily_pnl += pnl;
            }
        }

        let account = AccountState {
            equity,
            open_positions: if open_position.is_some() { 1 } else { 0 },
            daily_pnl,
        };

        let Some(result) = run_pipeline(&bars[..=i], None, &config, &mut composer, &account, &mut id_gen, tf)
        else {
            continue;
        };
        for signal in &result.signals {
            println!("{} signal {} @ {}", result.bar_ts, signal.name, signal.ts);
            journal
                .record(VpaEvent::SignalDetected {
                    ts: result.bar_ts,
                    signal: signal.clone(),
                })
                .context("writing replay journal")?;
        }
        for (signal, gate) in result.signals.iter().zip(&result.gate_results) {
            if gate.blocked {
                journal
                    .record(VpaEvent::GateBlocked {
                        ts: result.bar_ts,
                        signal_key: signal.signal_key(),
                        reasons: gate.block_reasons.clone(),
                    })
                    .context("writing replay journal")?;
            }
        }
        for setup_match in &result.setup_matches {
            println!("{} setup completed {}", result.bar_ts, setup_match.name);
            journal
                .record(VpaEvent::SetupCompleted {
                    ts: result.bar_ts,
                    setup_match: setup_match.clone(),
                })
                .context("writing replay journal")?;
        }
        for intent in &result.trade_intents {
            if intent.status == TradeIntentStatus::Ready {
                let safety = guard.check(bar_day, &account, &config.risk);
                if !safety.allowed {
                    println!("{} intent {} -> halted: {:?}", result.bar_ts, intent.setup_name, safety.reasons);
                    journal
                        .record(VpaEvent::SafetyHalt {
                            ts: result.bar_ts,
                            reasons: safety.reasons,
                        })
                        .context("writing replay journal")?;
                    continue;
                }
                if open_position.is_none() {
                    if let (Some(entry_plan), Some(risk_plan)) = (&intent.entry_plan, &intent.risk_plan) {
                        open_position = Some(ReplayPosition {
                            direction: entry_plan.direction,
                            entry_price: current.close,
                            stop_price: entry_plan.stop_price,
                            quantity: risk_plan.position_size,
                        });
                    }
                }
            }
            println!("{} intent {} -> {:?}", result.bar_ts, intent.setup_name, intent.status);
            let event = match intent.status {
                TradeIntentStatus::Ready => VpaEvent::TradeIntentReady {
                    ts: result.bar_ts,
                    intent: intent.clone(),
                },
                TradeIntentStatus::Rejected => VpaEvent::TradeIntentRejected {
                    ts: result.bar_ts,
                    intent: intent.clone(),
                },
            };
            journal.record(event).context("writing replay journal")?;
        }
    }
    eprintln!("replay journal written to {}", journal.path().display());
    Ok(())
}

/// A notional single-symbol position tracked only so `replay` can exercise
/// the Safety Guard's daily-loss halt against real, bar-driven equity
/// movement instead of a frozen placeholder account.
struct ReplayPosition {
    direction: Direction,
    entry_price: f64,
    stop_price: f64,
    quantity: u64,
}

fn status(data_dir: &PathBuf, symbol: &str, tf: &str) -> Result<()> {
    let store = JsonlBarStore::new(data_dir);
    let bars = store.load(symbol, tf)?;
    println!("symbol={symbol} tf={tf} bars={}", bars.len());
    if let (Some(first), Some(last)) = (bars.first(), bars.last()) {
        println!("range={}..={}", first.timestamp, last.timestamp);
    }
    Ok(())
}

fn health(cli: &Cli) -> Result<()> {
    match load_config(&cli.config, cli.config_override.as_deref()) {
        Ok((_, hash)) => {
            println!("ok config_hash={hash}");
            Ok(())
        }
        Err(err) => {
            eprintln!("config invalid: {err}");
            std::process::exit(1);
        }
    }
}
