//! Typed requests for the external collaborators a groundtruth run invokes.
//!
//! The map builder and the replay runner are separate programs. Each call to one of them is
//! described by a [StageRequest] and handed to a [StageRunner], which decides how to actually
//! execute it. [crate::process::ProcessRunner] starts real subprocesses; tests substitute fakes.
use itertools::Itertools;

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::PathBuf;

use crate::Result;

/// The stages that invoke an external collaborator, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    BuildMap,
    GroundtruthReplay,
    EvaluationReplay,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Stage::BuildMap => "map build",
            Stage::GroundtruthReplay => "groundtruth replay",
            Stage::EvaluationReplay => "localization evaluation replay",
        };
        write!(f, "{}", name)
    }
}

/// Arguments for the map builder.
#[derive(Debug, Clone, PartialEq)]
pub struct MapBuildInvocation {
    pub bagfile: PathBuf,
    pub map_name: String,
    pub histogram_equalization: bool,
    pub max_low_movement_mean_distance: f64,
    pub base_map: PathBuf,
}

impl MapBuildInvocation {
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            self.bagfile.clone().into(),
            self.base_map.clone().into(),
            "--map-name".into(),
            self.map_name.clone().into(),
            "--max-low-movement-mean-distance".into(),
            self.max_low_movement_mean_distance.to_string().into(),
        ];
        if !self.histogram_equalization {
            args.push("--no-histogram-equalization".into());
        }
        args
    }
}

/// Arguments for the offline replay runner.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayInvocation {
    pub bagfile: PathBuf,
    pub map: PathBuf,
    pub image_topic: String,
    pub output_bag: PathBuf,
    pub loc_output_file: PathBuf,
    pub vio_output_file: PathBuf,
    pub loc_results_csv_file: PathBuf,
    pub vio_results_csv_file: PathBuf,
    /// Reference trajectory to compare the estimates against.
    pub groundtruth_bag: Option<PathBuf>,
    /// Generate image features from raw images instead of using recorded feature messages.
    pub generate_image_features: bool,
}

impl ReplayInvocation {
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            self.bagfile.clone().into(),
            self.map.clone().into(),
            "-i".into(),
            self.image_topic.clone().into(),
            "-o".into(),
            self.output_bag.clone().into(),
            "--loc-output-file".into(),
            self.loc_output_file.clone().into(),
            "--vio-output-file".into(),
            self.vio_output_file.clone().into(),
            "--loc-results-csv-file".into(),
            self.loc_results_csv_file.clone().into(),
            "--vio-results-csv-file".into(),
            self.vio_results_csv_file.clone().into(),
        ];
        if let Some(groundtruth) = &self.groundtruth_bag {
            args.push("-g".into());
            args.push(groundtruth.clone().into());
        }
        if self.generate_image_features {
            args.push("--generate-image-features".into());
        }
        args
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    MapBuild(MapBuildInvocation),
    Replay(ReplayInvocation),
}

impl Invocation {
    pub fn args(&self) -> Vec<OsString> {
        match self {
            Invocation::MapBuild(m) => m.args(),
            Invocation::Replay(r) => r.args(),
        }
    }
}

/// A file the collaborator writes under a fixed name, to be moved to a stage specific name as
/// soon as the stage finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordRename {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// One blocking call to an external collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct StageRequest {
    pub stage: Stage,
    pub invocation: Invocation,
    /// Directory the collaborator runs in. Collaborators drop some outputs into their working
    /// directory.
    pub working_directory: PathBuf,
    /// Receives the command line followed by the collaborator's stdout and stderr.
    pub command_log: PathBuf,
    pub command_record: Option<RecordRename>,
}

impl StageRequest {
    pub fn replay(&self) -> Option<&ReplayInvocation> {
        match &self.invocation {
            Invocation::Replay(r) => Some(r),
            _ => None,
        }
    }

    pub fn map_build(&self) -> Option<&MapBuildInvocation> {
        match &self.invocation {
            Invocation::MapBuild(m) => Some(m),
            _ => None,
        }
    }
}

/// Render a program and its arguments as a single line, the way it is written to command logs.
pub fn command_line<S: AsRef<OsStr>>(program: &[S], args: &[OsString]) -> String {
    program
        .iter()
        .map(|s| s.as_ref())
        .chain(args.iter().map(|s| s.as_os_str()))
        .map(|s| s.to_string_lossy())
        .join(" ")
}

/// Executes stage requests. Every call blocks until the stage has finished.
pub trait StageRunner {
    /// Run the stage, returning an error if the collaborator reported a failure.
    fn run(&mut self, request: &StageRequest) -> Result<()>;
}

impl<'a, R: StageRunner + ?Sized> StageRunner for &'a mut R {
    fn run(&mut self, request: &StageRequest) -> Result<()> {
        (**self).run(request)
    }
}
