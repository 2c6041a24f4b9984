//! Runs stages as subprocesses of the external collaborator programs.
extern crate indicatif;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

use crate::stage::{command_line, Invocation, StageRequest, StageRunner};
use crate::{Error, FailureKind, Result, StageFailure};

pub const DEFAULT_MAP_BUILDER: &str = "rosrun localization_analysis make_map.py";
pub const DEFAULT_REPLAY_RUNNER: &str =
    "rosrun localization_analysis run_offline_replay_and_plot_results.py";

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A collaborator program together with the leading arguments that select it, e.g. `rosrun
/// <package> <script>`.
#[derive(Debug, Clone, PartialEq)]
pub struct CollaboratorCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl CollaboratorCommand {
    pub fn words(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(|a| a.as_str()))
            .collect()
    }
}

/// Parses a whitespace separated command line. Quoting is not supported.
impl FromStr for CollaboratorCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut words = s.split_whitespace().map(|w| w.to_string());
        let program = words
            .next()
            .ok_or_else(|| Error::InvalidCommand(s.to_string()))?;
        Ok(CollaboratorCommand {
            program,
            args: words.collect(),
        })
    }
}

/// The programs implementing map building and offline replay.
#[derive(Debug, Clone, PartialEq)]
pub struct Collaborators {
    pub map_builder: CollaboratorCommand,
    pub replay_runner: CollaboratorCommand,
}

impl Default for Collaborators {
    fn default() -> Self {
        Collaborators {
            map_builder: CollaboratorCommand {
                program: "rosrun".to_string(),
                args: vec!["localization_analysis".to_string(), "make_map.py".to_string()],
            },
            replay_runner: CollaboratorCommand {
                program: "rosrun".to_string(),
                args: vec![
                    "localization_analysis".to_string(),
                    "run_offline_replay_and_plot_results.py".to_string(),
                ],
            },
        }
    }
}

impl Collaborators {
    pub fn command_for(&self, invocation: &Invocation) -> &CollaboratorCommand {
        match invocation {
            Invocation::MapBuild(_) => &self.map_builder,
            Invocation::Replay(_) => &self.replay_runner,
        }
    }

    /// The full command line a stage runs, as written to its command log.
    pub fn command_line(&self, request: &StageRequest) -> String {
        let command = self.command_for(&request.invocation);
        command_line(&command.words(), &request.invocation.args())
    }
}

pub(crate) fn spinner(message: &str, verbose: bool) -> ProgressBar {
    if !verbose {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner} {msg} ({elapsed})"));
    pb.set_message(message);
    pb.enable_steady_tick(100);
    pb
}

/// Runs each stage as a child process and records its output.
///
/// The child runs in the stage's working directory; this process never changes its own. The
/// command log gets the command line followed by everything the child writes to stdout and
/// stderr, whether or not the child succeeds.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    pub collaborators: Collaborators,
    /// Kill a stage that runs longer than this. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Show a spinner while a stage runs.
    pub verbose: bool,
}

impl ProcessRunner {
    pub fn new(collaborators: Collaborators) -> Self {
        ProcessRunner {
            collaborators,
            timeout: None,
            verbose: false,
        }
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Wait for `child`, killing it once `timeout` has passed. Returns `None` on timeout.
fn wait(child: &mut Child, timeout: Option<Duration>) -> std::io::Result<Option<ExitStatus>> {
    let timeout = match timeout {
        None => return child.wait().map(Some),
        Some(t) => t,
    };
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= timeout {
            // the child may exit between try_wait and kill
            if let Err(e) = child.kill() {
                warn!("Could not kill timed out process: {}", e);
            }
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

impl StageRunner for ProcessRunner {
    fn run(&mut self, request: &StageRequest) -> Result<()> {
        let collaborator = self.collaborators.command_for(&request.invocation);
        let args = request.invocation.args();
        let line = command_line(&collaborator.words(), &args);
        info!("Running {}: {}", request.stage, line);

        let mut log = File::create(&request.command_log)?;
        writeln!(log, "{}", line)?;
        log.flush()?;

        let mut command = Command::new(&collaborator.program);
        command
            .args(&collaborator.args)
            .args(&args)
            .current_dir(&request.working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log));

        let pb = spinner(&request.stage.to_string(), self.verbose);
        let outcome = match command.spawn() {
            Ok(mut child) => match wait(&mut child, self.timeout)? {
                Some(status) if status.success() => Ok(()),
                Some(status) => Err(FailureKind::Exit(status.code())),
                None => Err(FailureKind::TimedOut(self.timeout.unwrap_or_default())),
            },
            Err(e) => Err(FailureKind::Spawn(e.to_string())),
        };
        pb.finish_and_clear();
        drop(command);

        if let Some(record) = &request.command_record {
            if record.from.exists() {
                fs::rename(&record.from, &record.to)?;
                debug!(
                    "Moved {} to {}",
                    record.from.display(),
                    record.to.display()
                );
            } else {
                warn!(
                    "{} did not write {}",
                    request.stage,
                    record.from.display()
                );
            }
        }

        match outcome {
            Ok(()) => {
                info!("Finished {}", request.stage);
                Ok(())
            }
            Err(kind) => {
                let mut log = OpenOptions::new().append(true).open(&request.command_log)?;
                writeln!(log, "{} {}", request.stage, kind)?;
                Err(StageFailure {
                    stage: request.stage,
                    kind,
                    command_log: request.command_log.clone(),
                }
                .into())
            }
        }
    }
}
