//! Groundtruth generation for localization bagfiles.
//!
//! A groundtruth run builds a refined map from a bagfile and a base map, replays the bagfile
//! against that map to get a trusted trajectory, and optionally replays the same bagfile against a
//! candidate localization map using the groundtruth trajectory as reference.
//!
//! Example usage:
//! ```no_run
//! use groundtruth::pipeline::Pipeline;
//! use groundtruth::process::ProcessRunner;
//! use groundtruth::request::PipelineRequest;
//!
//! let mut request = PipelineRequest::new("run1.bag", "base.map");
//! request.loc_map = Some("candidate.map".into());
//! // check inputs before anything is written to disk
//! let request = request.validate().expect("invalid inputs");
//! let report = Pipeline::new(request, ProcessRunner::default())
//!     .run()
//!     .expect("pipeline failed");
//! println!("{}", report);
//! ```

extern crate itertools;
extern crate log;
extern crate thiserror;

pub mod artifacts;
pub mod pipeline;
pub mod process;
pub mod request;
pub mod stage;

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub use stage::Stage;

/// An input problem detected before any work starts. Nothing has been written to disk when one of
/// these is returned.
#[derive(Error, Debug)]
pub enum PreconditionError {
    #[error("Bag file {} does not exist.", .0.display())]
    MissingBagfile(PathBuf),
    #[error("Base surf map {} does not exist.", .0.display())]
    MissingBaseMap(PathBuf),
    #[error("Loc map {} does not exist.", .0.display())]
    MissingLocMap(PathBuf),
    #[error("Output directory {} already exists.", .0.display())]
    OutputDirectoryExists(PathBuf),
}

/// Why an external stage did not succeed.
#[derive(Debug)]
pub enum FailureKind {
    /// The collaborator exited unsuccessfully. `None` if it was killed by a signal.
    Exit(Option<i32>),
    TimedOut(Duration),
    /// The collaborator could not be started at all.
    Spawn(String),
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FailureKind::Exit(Some(code)) => write!(f, "exited with status {}", code),
            FailureKind::Exit(None) => write!(f, "terminated by signal"),
            FailureKind::TimedOut(d) => write!(f, "timed out after {}s", d.as_secs_f64()),
            FailureKind::Spawn(e) => write!(f, "could not be started ({})", e),
        }
    }
}

/// A collaborator invocation failed. Artifacts of earlier stages are left on disk.
#[derive(Error, Debug)]
#[error("{stage} {kind}, see {}", .command_log.display())]
pub struct StageFailure {
    pub stage: Stage,
    pub kind: FailureKind,
    pub command_log: PathBuf,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error(transparent)]
    Stage(#[from] StageFailure),
    #[error("Invalid collaborator command: {0:?}")]
    InvalidCommand(String),
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
}

impl Error {
    /// True if the error was raised before anything was written to disk.
    pub fn is_precondition(&self) -> bool {
        match self {
            Error::Precondition(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
