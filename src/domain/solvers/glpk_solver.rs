use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::convert::{to_glpk_objective, to_glpk_polyhedron};
use crate::domain::solver::{IlpProblem, IlpSolution, IlpStatus, MipBackend};
use crate::error::{Result, SourcingError};

use glpk_rust::{solve_ilps as glpk_solve_ilps, Solution};

const NO_TERMINAL_OUTPUT: bool = false;
const MINIMIZE: bool = false;

/// Subcommand under which the `card-sourcer` binary hosts a GLPK worker
pub const WORKER_COMMAND: &str = "glpk-worker";

static WORKER: OnceLock<WorkerCommand> = OnceLock::new();

/// A program that reads one `IlpProblem` as JSON on stdin and answers with the
/// `IlpSolution` as JSON on stdout. See [`serve_worker`].
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        WorkerCommand {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn spawn(&self) -> std::io::Result<Child> {
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
    }
}

/// Make every later [`GlpkSolver::new`] solve in a child process started with
/// `command`. Returns false if a worker was already registered.
pub fn register_worker(command: WorkerCommand) -> bool {
    WORKER.set(command).is_ok()
}

/// GLPK solver implementation
///
/// `glpk_rust` has no wall-clock option. With a worker registered, each solve
/// runs in its own child process, which is killed when the time limit expires.
/// Without one, the solve runs on a thread that cannot be stopped and whose
/// late result is dropped.
pub struct GlpkSolver {
    worker: Option<WorkerCommand>,
}

impl GlpkSolver {
    pub fn new() -> Self {
        GlpkSolver {
            worker: WORKER.get().cloned(),
        }
    }

    pub fn with_worker(worker: WorkerCommand) -> Self {
        GlpkSolver {
            worker: Some(worker),
        }
    }
}

impl Default for GlpkSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MipBackend for GlpkSolver {
    fn solve(&self, problem: &IlpProblem, time_limit: Duration) -> Result<IlpSolution> {
        if problem.num_vars() == 0 {
            return Ok(IlpSolution {
                status: IlpStatus::Optimal,
                values: Vec::new(),
                objective: 0,
            });
        }

        if let Some(row) = problem.infeasible_row() {
            debug!("row {} can never hold, GLPK not started", row);
            return Ok(IlpSolution::without_values(IlpStatus::Infeasible));
        }
        // conversion errors surface here with their own kind instead of from the worker
        to_glpk_polyhedron(problem)?;

        match &self.worker {
            Some(worker) => solve_in_child(worker, problem, time_limit),
            None => solve_on_thread(problem, time_limit),
        }
    }

    fn name(&self) -> &str {
        "GLPK"
    }
}

/// Worker side of [`WorkerCommand`]: solve one problem read from `input` in this
/// process and write the solution to `output`.
pub fn serve_worker<R: Read, W: Write>(input: R, mut output: W) -> Result<()> {
    let problem: IlpProblem = serde_json::from_reader(input)?;
    let solution = solve_blocking(&problem)?;
    serde_json::to_writer(&mut output, &solution)?;
    output.flush()?;
    Ok(())
}

fn solve_in_child(worker: &WorkerCommand, problem: &IlpProblem, time_limit: Duration) -> Result<IlpSolution> {
    let payload = serde_json::to_vec(problem)?;
    let mut child = worker.spawn().map_err(|e| {
        SourcingError::Backend(format!(
            "Failed to start GLPK worker {}: {}",
            worker.program.display(),
            e
        ))
    })?;
    debug!("GLPK worker {} started", child.id());

    let (Some(mut stdin), Some(mut stdout)) = (child.stdin.take(), child.stdout.take()) else {
        stop(&mut child);
        return Err(SourcingError::Backend("GLPK worker pipes are missing".to_string()));
    };

    // A killed worker closes its pipes, which ends both helper threads
    let writer = thread::Builder::new().name("glpk-request".to_string()).spawn(move || {
        if let Err(e) = stdin.write_all(&payload) {
            debug!("GLPK worker stopped reading its problem: {}", e);
        }
    });
    let (tx, rx) = mpsc::channel();
    let reader = thread::Builder::new().name("glpk-reply".to_string()).spawn(move || {
        let mut reply = Vec::new();
        let _ = tx.send(stdout.read_to_end(&mut reply).map(|_| reply));
    });
    if let Err(e) = writer.and(reader) {
        stop(&mut child);
        return Err(SourcingError::Backend(format!("Failed to spawn GLPK pipe thread: {}", e)));
    }

    match rx.recv_timeout(time_limit) {
        Ok(reply) => {
            let status = child.wait()?;
            let reply = reply?;
            if !status.success() {
                return Err(SourcingError::Backend(format!("GLPK worker exited with {}", status)));
            }
            serde_json::from_slice(&reply)
                .map_err(|e| SourcingError::Backend(format!("Unreadable GLPK worker reply: {}", e)))
        }
        Err(RecvTimeoutError::Timeout) => {
            warn!(
                "GLPK did not finish within {:?}, stopping worker {}",
                time_limit,
                child.id()
            );
            stop(&mut child);
            Ok(IlpSolution::without_values(IlpStatus::TimeLimit))
        }
        Err(RecvTimeoutError::Disconnected) => {
            stop(&mut child);
            Err(SourcingError::Backend("GLPK worker reply was lost".to_string()))
        }
    }
}

fn stop(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!("GLPK worker {} already gone: {}", child.id(), e);
    }
    if let Err(e) = child.wait() {
        warn!("could not reap GLPK worker {}: {}", child.id(), e);
    }
}

fn solve_on_thread(problem: &IlpProblem, time_limit: Duration) -> Result<IlpSolution> {
    let owned = problem.clone();
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("glpk-solve".to_string())
        .spawn(move || {
            // The receiver is gone if the caller already timed out
            let _ = tx.send(solve_blocking(&owned));
        })
        .map_err(|e| SourcingError::Backend(format!("Failed to spawn GLPK worker: {}", e)))?;

    match rx.recv_timeout(time_limit) {
        Ok(outcome) => outcome,
        Err(RecvTimeoutError::Timeout) => {
            warn!("GLPK did not finish within {:?}", time_limit);
            Ok(IlpSolution::without_values(IlpStatus::TimeLimit))
        }
        Err(RecvTimeoutError::Disconnected) => Err(SourcingError::Backend(
            "GLPK worker exited without a result".to_string(),
        )),
    }
}

fn solve_blocking(problem: &IlpProblem) -> Result<IlpSolution> {
    let mut polyhedron = to_glpk_polyhedron(problem)?;
    let objective = to_glpk_objective(problem);

    let lib_solutions: Vec<Solution> =
        glpk_solve_ilps(&mut polyhedron, vec![objective], MINIMIZE, NO_TERMINAL_OUTPUT);

    let solution = lib_solutions
        .into_iter()
        .next()
        .ok_or_else(|| SourcingError::Backend("GLPK returned no solution".to_string()))?;

    if let Some(error) = &solution.error {
        debug!("GLPK reported: {}", error);
    }

    let status: IlpStatus = solution.status.into();
    if status != IlpStatus::Optimal {
        return Ok(IlpSolution::without_values(status));
    }

    let values: Vec<i64> = problem
        .variables
        .iter()
        .map(|var| {
            solution
                .solution
                .get(var.name.as_str())
                .map(|&v| v as i64)
                .unwrap_or(0)
        })
        .collect();

    // glpk_rust reports the objective as i32; recompute it from the integer values
    let objective = problem.objective_value(&values);

    Ok(IlpSolution {
        status,
        values,
        objective,
    })
}
