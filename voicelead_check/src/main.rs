// Voice-leading checker CLI.
//
// Loads a JSON score, runs the checker, and prints the diagnostics.
//
// Usage:
//   cargo run -p voicelead_check --bin check -- score.json [--config FILE]
//     [--policy homophonic|species2|species3|species4] [--json]
//
// The policy comes from --policy, then the score file, then homophonic.
// Exit status: 0 clean, 1 diagnostics found, 2 unreadable input or config.
// Set RUST_LOG (e.g. RUST_LOG=voicelead_check=debug) for analysis logging.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use voicelead_check::{CheckerConfig, NctPolicy, Report, analyze, load_score};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    Homophonic,
    Species2,
    Species3,
    Species4,
}

impl From<PolicyArg> for NctPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Homophonic => NctPolicy::Homophonic,
            PolicyArg::Species2 => NctPolicy::Species2,
            PolicyArg::Species3 => NctPolicy::Species3,
            PolicyArg::Species4 => NctPolicy::Species4,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "check", about = "Check a score for part-writing errors")]
struct Args {
    /// Score file (JSON).
    score: PathBuf,

    /// Checker configuration file (JSON). Missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Non-chord-tone policy. Overrides the score file's policy.
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,

    /// Print the full report as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match CheckerConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::from(2);
            }
        },
        None => CheckerConfig::default(),
    };

    let (score, file_policy) = match load_score(&args.score) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(2);
        }
    };
    let policy = args.policy.map(NctPolicy::from).or(file_policy).unwrap_or_default();

    let report = analyze(&score, policy, &config);

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: failed to serialize report: {e}");
                return ExitCode::from(2);
            }
        }
    } else {
        print_report(&report, &score);
    }

    if report.is_clean() { ExitCode::SUCCESS } else { ExitCode::from(1) }
}

fn print_report(report: &Report, score: &voicelead_check::Score) {
    println!("Key: {}", report.key);
    if report.is_clean() {
        println!("No problems found.");
        return;
    }
    let layout = score.layout();
    for d in &report.diagnostics {
        let mut voices: Vec<&str> = Vec::new();
        for voice in d.notes.iter().filter_map(|n| layout.voices.get(n.voice)) {
            if !voices.contains(&voice.as_str()) {
                voices.push(voice.as_str());
            }
        }
        println!("tick {:>6}  {:<18}  {}", d.tick, format!("{:?}", d.category), d.one_line());
        if !voices.is_empty() {
            println!("              voices: {}", voices.join(", "));
        }
    }
    println!();
    println!("{} problem(s) found.", report.diagnostics.len());
}
