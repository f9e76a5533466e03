use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use serde::Serialize;

use lilou_cli::{
    contracts::Deployment,
    ledger::{Call, ChainState, Query, Receipt},
    simulate::Simulator,
};

//==================== CLI ====================//

#[derive(Parser)]
#[command(name = "lilou", version, about = "Run calls against the Lilou coin and collection ledgers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the default deployment (Lilou Coin + Lilou Face) as JSON.
    Genesis {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Execute a JSON-lines call script and print one receipt per call.
    Run {
        #[arg(long)]
        deployment: Option<PathBuf>,
        #[arg(long)]
        calls: PathBuf,
        /// Write receipts here instead of stdout.
        #[arg(long)]
        receipts: Option<PathBuf>,
        /// Write the final snapshot (with state root) here.
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Replay a call script, then answer one query, e.g.
    /// '{"query":"balance_of","account":"0x…"}'.
    Query {
        #[arg(long)]
        deployment: Option<PathBuf>,
        #[arg(long)]
        calls: Option<PathBuf>,
        query: String,
    },
    /// Drive seeded random calls and check both ledgers after each one.
    Simulate {
        #[arg(long)]
        deployment: Option<PathBuf>,
        #[arg(long, default_value_t = 1_000)]
        steps: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

//==================== helpers ====================//

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("error: {msg}");
    std::process::exit(2)
}

fn read_all(p: &Path) -> Vec<u8> {
    fs::read(p).unwrap_or_else(|e| fail(format!("read {}: {e}", p.display())))
}

fn write_all(p: &Path, bytes: &[u8]) {
    if let Some(parent) = p.parent() {
        fs::create_dir_all(parent).ok();
    }
    fs::write(p, bytes).unwrap_or_else(|e| fail(format!("write {}: {e}", p.display())));
}

fn to_json_pretty<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec_pretty(value).unwrap_or_else(|e| fail(format!("encode json: {e}")))
}

fn load_deployment(path: Option<&Path>) -> Deployment {
    match path {
        Some(p) => serde_json::from_slice(&read_all(p))
            .unwrap_or_else(|e| fail(format!("deployment {}: {e}", p.display()))),
        None => Deployment::default(),
    }
}

fn boot(path: Option<&Path>) -> ChainState {
    ChainState::from_deployment(load_deployment(path)).unwrap_or_else(|e| fail(e))
}

/// One call per line; blank lines and lines starting with `#` are skipped.
fn read_calls(p: &Path) -> Vec<Call> {
    let text = String::from_utf8(read_all(p))
        .unwrap_or_else(|e| fail(format!("{}: not utf-8: {e}", p.display())));
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .unwrap_or_else(|e| fail(format!("{}:{}: {e}", p.display(), idx + 1)))
        })
        .collect()
}

fn receipt_line(receipt: &Receipt) -> String {
    serde_json::to_string(receipt).unwrap_or_else(|e| fail(format!("encode receipt: {e}")))
}

//==================== commands ====================//

fn genesis_cmd(out: Option<PathBuf>) {
    let json = to_json_pretty(&Deployment::default());
    match out {
        Some(path) => {
            write_all(&path, &json);
            println!("deployment written → {}", path.display());
        }
        None => println!("{}", String::from_utf8_lossy(&json)),
    }
}

fn run_cmd(
    deployment: Option<PathBuf>,
    calls: PathBuf,
    receipts: Option<PathBuf>,
    snapshot: Option<PathBuf>,
) {
    let mut state = boot(deployment.as_deref());
    let calls = read_calls(&calls);
    let executed = state.execute_all(&calls);
    let accepted = executed.iter().filter(|r| r.is_accepted()).count();

    let lines: Vec<String> = executed.iter().map(receipt_line).collect();
    match receipts {
        Some(path) => {
            let mut body = lines.join("\n");
            body.push('\n');
            write_all(&path, body.as_bytes());
        }
        None => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for line in &lines {
                writeln!(out, "{line}").unwrap_or_else(|e| fail(format!("stdout: {e}")));
            }
        }
    }

    let snap = state.snapshot();
    if let Some(path) = snapshot {
        write_all(&path, &to_json_pretty(&snap));
    }
    eprintln!(
        "executed {} calls ({} accepted, {} rejected), height={}, root={}",
        executed.len(),
        accepted,
        executed.len() - accepted,
        snap.height,
        hex::encode(snap.state_root)
    );
}

fn query_cmd(deployment: Option<PathBuf>, calls: Option<PathBuf>, query: String) {
    let mut state = boot(deployment.as_deref());
    if let Some(path) = calls {
        state.execute_all(&read_calls(&path));
    }
    let query: Query =
        serde_json::from_str(&query).unwrap_or_else(|e| fail(format!("query: {e}")));
    match state.query(&query) {
        Ok(answer) => println!(
            "{}",
            serde_json::to_string(&answer).unwrap_or_else(|e| fail(format!("encode answer: {e}")))
        ),
        Err(err) => fail(err),
    }
}

fn simulate_cmd(deployment: Option<PathBuf>, steps: usize, seed: u64) {
    let mut state = boot(deployment.as_deref());
    let mut simulator = Simulator::new(seed, &state);
    match simulator.run(&mut state, steps) {
        Ok(report) => println!("{}", String::from_utf8_lossy(&to_json_pretty(&report))),
        Err(err) => {
            eprintln!("simulation seed={seed} stopped at height {}", state.height());
            fail(err)
        }
    }
}

//==================== main ====================//

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Command::Genesis { out } => genesis_cmd(out),
        Command::Run {
            deployment,
            calls,
            receipts,
            snapshot,
        } => run_cmd(deployment, calls, receipts, snapshot),
        Command::Query {
            deployment,
            calls,
            query,
        } => query_cmd(deployment, calls, query),
        Command::Simulate {
            deployment,
            steps,
            seed,
        } => simulate_cmd(deployment, steps, seed),
    }
}
