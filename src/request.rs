//! User configuration of a groundtruth run and the checks performed on it before any work starts.
use log::info;

use std::path::{Path, PathBuf};

use crate::{PreconditionError, Result};

pub const DEFAULT_OUTPUT_DIRECTORY: &str = "groundtruth_creation_output";
pub const DEFAULT_IMAGE_TOPIC: &str = "/mgt/img_sampler/nav_cam/image_record";
pub const DEFAULT_MAX_LOW_MOVEMENT_MEAN_DISTANCE: f64 = 0.09;

/// Everything a user can configure about a groundtruth run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRequest {
    /// Input bagfile to generate groundtruth for.
    pub bagfile: PathBuf,
    /// Existing map used as the basis for groundtruth. Should largely overlap the area covered by
    /// the bagfile.
    pub base_map: PathBuf,
    /// Localization map to evaluate against the groundtruth. The evaluation pass is skipped when
    /// this is `None` or empty.
    pub loc_map: Option<PathBuf>,
    pub output_directory: PathBuf,
    pub image_topic: String,
    /// Prefix for generated map names. Derived from the bagfile name when `None`.
    pub map_name: Option<String>,
    /// Threshold for sequential image removal during map building, the higher the more images
    /// removed.
    pub max_low_movement_mean_distance: f64,
    /// Generate image features during the evaluation pass instead of using the feature messages
    /// recorded in the bagfile. The groundtruth pass always generates them.
    pub generate_image_features: bool,
    /// Histogram equalize images during map building.
    pub histogram_equalization: bool,
}

impl Default for PipelineRequest {
    fn default() -> Self {
        PipelineRequest {
            bagfile: PathBuf::new(),
            base_map: PathBuf::new(),
            loc_map: None,
            output_directory: PathBuf::from(DEFAULT_OUTPUT_DIRECTORY),
            image_topic: DEFAULT_IMAGE_TOPIC.to_string(),
            map_name: None,
            max_low_movement_mean_distance: DEFAULT_MAX_LOW_MOVEMENT_MEAN_DISTANCE,
            generate_image_features: false,
            histogram_equalization: true,
        }
    }
}

impl PipelineRequest {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(bagfile: P, base_map: Q) -> Self {
        PipelineRequest {
            bagfile: bagfile.into(),
            base_map: base_map.into(),
            ..Default::default()
        }
    }

    /// The localization map to evaluate, treating an empty path as absent.
    pub fn evaluation_map(&self) -> Option<&Path> {
        self.loc_map
            .as_ref()
            .map(|p| p.as_path())
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// Check the request against the filesystem and resolve every path to an absolute one.
    ///
    /// Checks run in order: bagfile, base map, localization map (if any), output directory. The
    /// first failing check is returned. The filesystem is never modified.
    pub fn validate(self) -> Result<ValidatedRequest> {
        if !self.bagfile.is_file() {
            return Err(PreconditionError::MissingBagfile(self.bagfile).into());
        }
        if !self.base_map.is_file() {
            return Err(PreconditionError::MissingBaseMap(self.base_map).into());
        }
        let loc_map = match self.evaluation_map() {
            None => {
                info!("No localization map given, not running the map localization comparison");
                None
            }
            Some(p) if !p.is_file() => {
                return Err(PreconditionError::MissingLocMap(p.to_path_buf()).into());
            }
            Some(p) => Some(absolute(p)?),
        };
        if self.output_directory.exists() {
            return Err(PreconditionError::OutputDirectoryExists(self.output_directory).into());
        }

        Ok(ValidatedRequest {
            bagfile: absolute(&self.bagfile)?,
            base_map: absolute(&self.base_map)?,
            loc_map,
            output_directory: absolute(&self.output_directory)?,
            image_topic: self.image_topic,
            map_name: self.map_name.filter(|m| !m.is_empty()),
            max_low_movement_mean_distance: self.max_low_movement_mean_distance,
            generate_image_features: self.generate_image_features,
            histogram_equalization: self.histogram_equalization,
        })
    }
}

/// A request whose inputs were found on disk. All paths are absolute so no later step depends on
/// the process working directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub bagfile: PathBuf,
    pub base_map: PathBuf,
    pub loc_map: Option<PathBuf>,
    pub output_directory: PathBuf,
    pub image_topic: String,
    pub map_name: Option<String>,
    pub max_low_movement_mean_distance: f64,
    pub generate_image_features: bool,
    pub histogram_equalization: bool,
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
