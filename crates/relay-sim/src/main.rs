use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use relay_core::RelayConfig;
use relay_sim::{run_simulator, SimulatorConfig, TimeZoneCatalog};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Command::new("relay-sim")
        .version(relay_sim::VERSION)
        .about("Relay change-batch simulator")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("simulate")
                .about("Drive the coalescer with synthetic user updates")
                .arg(
                    Arg::new("users")
                        .long("users")
                        .default_value("100")
                        .value_parser(value_parser!(usize))
                        .help("Number of synthetic users"),
                )
                .arg(
                    Arg::new("rounds")
                        .long("rounds")
                        .default_value("20")
                        .value_parser(value_parser!(u64))
                        .help("Update rounds; every user changes once per round"),
                )
                .arg(
                    Arg::new("tick-secs")
                        .long("tick-secs")
                        .default_value("10")
                        .value_parser(value_parser!(u64))
                        .help("Simulated seconds between rounds"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("queue-depth")
                        .long("queue-depth")
                        .default_value("0")
                        .value_parser(value_parser!(usize))
                        .help("Upper bound of unrelated outstanding jobs per round"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML file with relay settings"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(Command::new("timezones").about("List the time-zone catalog"));

    let matches = cli.get_matches();

    match matches.subcommand() {
        Some(("simulate", args)) => {
            let relay = match args.get_one::<PathBuf>("config") {
                Some(path) => RelayConfig::from_file(path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => RelayConfig::default(),
            };

            let config = SimulatorConfig {
                seed: args.get_one::<u64>("seed").copied().unwrap_or(42),
                users: args.get_one::<usize>("users").copied().unwrap_or(100),
                rounds: args.get_one::<u64>("rounds").copied().unwrap_or(20),
                tick_secs: args.get_one::<u64>("tick-secs").copied().unwrap_or(10),
                max_queue_depth: args.get_one::<usize>("queue-depth").copied().unwrap_or(0),
                relay,
            };
            let json = args.get_flag("json");

            if !json {
                println!("Running Relay Simulator...");
                println!("Users: {}", config.users);
                println!("Rounds: {}", config.rounds);
                println!("Seed: {}", config.seed);
                println!();
            }

            let report = run_simulator(config).await.context("simulation failed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.generate_text());
            }

            std::process::exit(if report.passed() { 0 } else { 1 });
        }
        Some(("timezones", _)) => {
            for zone in TimeZoneCatalog::all() {
                println!("{zone}");
            }
        }
        _ => {}
    }

    Ok(())
}
