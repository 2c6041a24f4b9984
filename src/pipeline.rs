//! Sequencing of a groundtruth run.
//!
//! A run moves through `Init -> BuildMap -> GroundtruthReplay -> EvaluationReplay -> Done`. The
//! evaluation replay only happens when a localization map was given. Any stage failure moves the
//! run to `Failed` and stops it; whatever earlier stages produced stays in the output directory.
use itertools::Itertools;
use log::{info, warn};

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::artifacts::{map_name, OutputLayout, PassArtifacts};
use crate::request::ValidatedRequest;
use crate::stage::{
    Invocation, MapBuildInvocation, RecordRename, ReplayInvocation, Stage, StageRequest,
    StageRunner,
};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    BuildMap,
    GroundtruthReplay,
    EvaluationReplay,
    Done,
    Failed,
}

impl PipelineState {
    fn stage(self) -> Option<Stage> {
        match self {
            PipelineState::BuildMap => Some(Stage::BuildMap),
            PipelineState::GroundtruthReplay => Some(Stage::GroundtruthReplay),
            PipelineState::EvaluationReplay => Some(Stage::EvaluationReplay),
            _ => None,
        }
    }
}

/// Drives a validated request through all of its stages with the given runner.
pub struct Pipeline<R: StageRunner> {
    request: ValidatedRequest,
    layout: OutputLayout,
    runner: R,
    state: PipelineState,
}

impl<R: StageRunner> Pipeline<R> {
    pub fn new(request: ValidatedRequest, runner: R) -> Self {
        let name = map_name(&request.bagfile, request.map_name.as_deref());
        let layout = OutputLayout::new(&request.output_directory, &request.bagfile, &name);
        Pipeline {
            request,
            layout,
            runner,
            state: PipelineState::Init,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    fn replay(
        &self,
        stage: Stage,
        map: &Path,
        artifacts: &PassArtifacts,
        groundtruth_bag: Option<&Path>,
        generate_image_features: bool,
    ) -> StageRequest {
        StageRequest {
            stage,
            invocation: Invocation::Replay(ReplayInvocation {
                bagfile: self.request.bagfile.clone(),
                map: map.to_path_buf(),
                image_topic: self.request.image_topic.clone(),
                output_bag: artifacts.results_bag.clone(),
                loc_output_file: artifacts.loc_pdf.clone(),
                vio_output_file: artifacts.vio_pdf.clone(),
                loc_results_csv_file: artifacts.loc_csv.clone(),
                vio_results_csv_file: artifacts.vio_csv.clone(),
                groundtruth_bag: groundtruth_bag.map(|p| p.to_path_buf()),
                generate_image_features,
            }),
            working_directory: self.layout.directory.clone(),
            command_log: artifacts.command_log.clone(),
            command_record: Some(RecordRename {
                from: self.layout.replay_command_record(),
                to: artifacts.command_record.clone(),
            }),
        }
    }

    /// The request for a single stage.
    pub fn stage_request(&self, stage: Stage) -> StageRequest {
        let layout = &self.layout;
        match stage {
            Stage::BuildMap => StageRequest {
                stage,
                invocation: Invocation::MapBuild(MapBuildInvocation {
                    bagfile: self.request.bagfile.clone(),
                    map_name: layout.map_name.clone(),
                    histogram_equalization: self.request.histogram_equalization,
                    max_low_movement_mean_distance: self.request.max_low_movement_mean_distance,
                    base_map: self.request.base_map.clone(),
                }),
                working_directory: layout.directory.clone(),
                command_log: layout.map_command_log.clone(),
                command_record: None,
            },
            // Groundtruth always regenerates image features so it does not depend on whatever
            // produced the feature messages in the bagfile.
            Stage::GroundtruthReplay => self.replay(
                stage,
                &layout.map_file,
                &layout.groundtruth,
                None,
                true,
            ),
            Stage::EvaluationReplay => self.replay(
                stage,
                self.request
                    .loc_map
                    .as_ref()
                    .map(|p| p.as_path())
                    .unwrap_or_else(|| Path::new("")),
                &layout.evaluation,
                Some(layout.groundtruth.results_bag.as_path()),
                self.request.generate_image_features,
            ),
        }
    }

    /// Stages this request will run, in order.
    pub fn stages(&self) -> Vec<Stage> {
        let mut stages = vec![Stage::BuildMap, Stage::GroundtruthReplay];
        if self.request.loc_map.is_some() {
            stages.push(Stage::EvaluationReplay);
        }
        stages
    }

    /// Every stage request of the run, in order, without touching the filesystem.
    pub fn plan(&self) -> Vec<StageRequest> {
        self.stages()
            .into_iter()
            .map(|s| self.stage_request(s))
            .collect()
    }

    fn next_state(&self) -> PipelineState {
        match self.state {
            PipelineState::Init => PipelineState::BuildMap,
            PipelineState::BuildMap => PipelineState::GroundtruthReplay,
            PipelineState::GroundtruthReplay if self.request.loc_map.is_some() => {
                PipelineState::EvaluationReplay
            }
            PipelineState::GroundtruthReplay | PipelineState::EvaluationReplay => {
                PipelineState::Done
            }
            s => s,
        }
    }

    fn init(&self) -> Result<()> {
        let dir = &self.layout.directory;
        if let Some(parent) = dir.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir(dir)?;
        info!("Created output directory {}", dir.display());
        Ok(())
    }

    /// Advance by one state. Returns the new state.
    pub fn step(&mut self) -> Result<PipelineState> {
        let result = match self.state {
            PipelineState::Init => self.init(),
            s => match s.stage() {
                Some(stage) => {
                    let request = self.stage_request(stage);
                    self.runner.run(&request)
                }
                None => return Ok(self.state),
            },
        };
        match result {
            Ok(()) => {
                self.state = self.next_state();
                Ok(self.state)
            }
            Err(e) => {
                self.state = PipelineState::Failed;
                Err(e)
            }
        }
    }

    /// Run every remaining stage.
    pub fn run(mut self) -> Result<RunReport> {
        if self.request.loc_map.is_none() {
            info!("Skipping the localization evaluation pass, no localization map given");
        }
        let mut stages = Vec::new();
        while self.state != PipelineState::Done && self.state != PipelineState::Failed {
            let stage = self.state.stage();
            self.step()?;
            stages.extend(stage);
        }
        let report = RunReport::new(&self.layout, stages);
        for missing in &report.missing {
            warn!("Expected artifact {} was not produced", missing.display());
        }
        info!("Groundtruth run finished in {}", self.layout.directory.display());
        Ok(report)
    }
}

/// What a successful run did and left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub output_directory: PathBuf,
    pub stages: Vec<Stage>,
    /// Artifacts the collaborators were expected to produce.
    pub artifacts: Vec<PathBuf>,
    /// The subset of `artifacts` not found on disk.
    pub missing: Vec<PathBuf>,
}

impl RunReport {
    fn new(layout: &OutputLayout, stages: Vec<Stage>) -> Self {
        let mut artifacts: Vec<PathBuf> = vec![layout.map_file.clone(), layout.map_bag.clone()];
        for stage in &stages {
            let pass = match stage {
                Stage::GroundtruthReplay => &layout.groundtruth,
                Stage::EvaluationReplay => &layout.evaluation,
                Stage::BuildMap => continue,
            };
            artifacts.extend(pass.outputs().into_iter().map(|p| p.to_path_buf()));
        }
        let artifacts: Vec<PathBuf> = artifacts.into_iter().unique().collect();
        let missing = artifacts.iter().filter(|p| !p.exists()).cloned().collect();
        RunReport {
            output_directory: layout.directory.clone(),
            stages,
            artifacts,
            missing,
        }
    }

    pub fn ran(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Groundtruth run in {}", self.output_directory.display())?;
        writeln!(f, "  stages: {}", self.stages.iter().join(", "))?;
        for artifact in &self.artifacts {
            let name = artifact
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if self.missing.contains(artifact) {
                writeln!(f, "  {} (missing)", name)?;
            } else {
                writeln!(f, "  {}", name)?;
            }
        }
        Ok(())
    }
}
