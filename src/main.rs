use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::{error, info, warn};

use card_sourcer::config::AppConfig;
use card_sourcer::domain::solver_factory::{SolveOptions, SolverType, StrategyKind};
use card_sourcer::domain::solvers::glpk_solver::{self, WorkerCommand, WORKER_COMMAND};
use card_sourcer::models::PlanDocument;
use card_sourcer::{feed, server, service, Result};

#[derive(Parser)]
#[command(
    name = "card-sourcer",
    version,
    about = "Buy a list of cards across many sellers at minimum total cost"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a purchase plan from catalog and demand files
    Solve(SolveArgs),
    /// Serve the optimizer over HTTP
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Solve one GLPK problem read from stdin; started by the exact strategy
    #[command(name = "glpk-worker", hide = true)]
    GlpkWorker,
}

#[derive(Args)]
struct SolveArgs {
    /// JSON array of listings
    #[arg(long)]
    catalog: PathBuf,
    /// JSON demand document
    #[arg(long)]
    demand: PathBuf,
    /// Where to write the plan (stdout when omitted)
    #[arg(long)]
    output: Option<PathBuf>,
    /// exact or heuristic (overrides SOURCING_STRATEGY)
    #[arg(long, value_parser = parse_strategy)]
    strategy: Option<StrategyKind>,
    /// MIP backend for the exact strategy (overrides SOURCING_BACKEND)
    #[arg(long, value_parser = parse_backend)]
    backend: Option<SolverType>,
    /// Exact strategy time budget in seconds
    #[arg(long)]
    time_limit: Option<u64>,
    /// Heuristic stops after this many seconds without improvement
    #[arg(long)]
    stall_window: Option<u64>,
    /// Prune items with more listings than this in the heuristic; 0 disables
    #[arg(long)]
    prune_above: Option<usize>,
    /// Also write the exact strategy's integer program in LP format
    #[arg(long)]
    dump_model: Option<PathBuf>,
}

impl SolveArgs {
    fn options(&self, config: &AppConfig) -> SolveOptions {
        let mut options = config.solve_options();
        if let Some(strategy) = self.strategy {
            options.strategy = strategy;
        }
        if let Some(backend) = self.backend {
            options.backend = backend;
        }
        if let Some(secs) = self.time_limit {
            options.time_limit = Duration::from_secs(secs);
        }
        if let Some(secs) = self.stall_window {
            options.heuristic.stall_window = Duration::from_secs(secs);
        }
        if let Some(limit) = self.prune_above {
            options.heuristic.prune_above = (limit > 0).then_some(limit);
        }
        options
    }
}

fn parse_strategy(s: &str) -> std::result::Result<StrategyKind, String> {
    StrategyKind::from_str(s).ok_or_else(|| format!("unknown strategy '{}' (expected exact or heuristic)", s))
}

fn parse_backend(s: &str) -> std::result::Result<SolverType, String> {
    SolverType::from_str(s).ok_or_else(|| format!("unknown or unavailable backend '{}'", s))
}

fn solve(args: SolveArgs, config: &AppConfig) -> Result<()> {
    let options = args.options(config);

    let listings = feed::read_listings(&args.catalog)?;
    let demand = feed::read_demand(&args.demand)?;
    let model = service::build_model(listings, &demand)?;

    if let Some(path) = &args.dump_model {
        feed::write_model(&service::exact_model(&model)?, path)?;
    }

    let plan = service::solve_model(&model, &options)?;
    feed::write_plan(&PlanDocument::from(&plan), args.output.as_deref())
}

/// Run GLPK solves in child processes of this executable so timeouts can kill them
fn use_worker_process() {
    match std::env::current_exe() {
        Ok(exe) => {
            glpk_solver::register_worker(WorkerCommand::new(exe).arg(WORKER_COMMAND));
        }
        Err(e) => warn!("cannot locate own executable, GLPK solves run in-process: {}", e),
    }
}

fn report(outcome: Result<()>) -> ExitCode {
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::from(err.exit_code())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let mut config = AppConfig::from_env();

    match cli.command {
        Commands::Solve(args) => {
            use_worker_process();
            report(solve(args, &config))
        }
        Commands::GlpkWorker => report(glpk_solver::serve_worker(io::stdin().lock(), io::stdout().lock())),
        Commands::Serve { port } => {
            use_worker_process();
            if let Some(port) = port {
                config.port = port;
            }
            match actix_web::rt::System::new().block_on(server::run(config)) {
                Ok(()) => {
                    info!("server stopped");
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    error!("server failed: {}", err);
                    ExitCode::FAILURE
                }
            }
        }
    }
}
