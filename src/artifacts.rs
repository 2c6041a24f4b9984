//! Names of everything a groundtruth run writes into its output directory.
//!
//! Names only depend on the bagfile name, the map name and fixed suffixes, so repeated runs on the
//! same bagfile produce the same layout.
use std::path::{Path, PathBuf};

/// Suffix of the map file produced by the map builder.
pub const MAP_SUFFIX: &str = ".teblid512.vocabdb.map";
/// Name under which the replay collaborator records its own command line in its working
/// directory.
pub const REPLAY_COMMAND_RECORD: &str = "run_offline_replay_command.txt";

/// The bagfile name without directory and final extension. `data/run1.bag` becomes `run1`.
pub fn bag_prefix(bagfile: &Path) -> String {
    bagfile
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// The prefix of generated map names: the explicit name if given, else `<bag prefix>_groundtruth`.
pub fn map_name(bagfile: &Path, explicit: Option<&str>) -> String {
    match explicit {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("{}_groundtruth", bag_prefix(bagfile)),
    }
}

/// Output files of one replay pass. Localization estimator and visual-inertial odometry outputs
/// are told apart by their `loc_` and `vio_` prefixes.
#[derive(Debug, Clone, PartialEq)]
pub struct PassArtifacts {
    pub results_bag: PathBuf,
    pub loc_pdf: PathBuf,
    pub vio_pdf: PathBuf,
    pub loc_csv: PathBuf,
    pub vio_csv: PathBuf,
    /// Log holding the invocation and its captured output.
    pub command_log: PathBuf,
    /// Where the collaborator's own command record is moved once the pass finishes.
    pub command_record: PathBuf,
}

impl PassArtifacts {
    fn new(dir: &Path, results_bag: String, stem: &str, log: &str, record_prefix: &str) -> Self {
        PassArtifacts {
            results_bag: dir.join(results_bag),
            loc_pdf: dir.join(format!("loc_{}.pdf", stem)),
            vio_pdf: dir.join(format!("vio_{}.pdf", stem)),
            loc_csv: dir.join(format!("loc_{}.csv", stem)),
            vio_csv: dir.join(format!("vio_{}.csv", stem)),
            command_log: dir.join(log),
            command_record: dir.join(format!("{}_{}", record_prefix, REPLAY_COMMAND_RECORD)),
        }
    }

    /// Files the collaborator is expected to leave behind.
    pub fn outputs(&self) -> Vec<&Path> {
        vec![
            self.results_bag.as_path(),
            self.loc_pdf.as_path(),
            self.vio_pdf.as_path(),
            self.loc_csv.as_path(),
            self.vio_csv.as_path(),
        ]
    }
}

/// Layout of an output directory.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputLayout {
    pub directory: PathBuf,
    pub map_name: String,
    /// Bagfile recorded by the map builder.
    pub map_bag: PathBuf,
    pub map_file: PathBuf,
    pub map_command_log: PathBuf,
    pub groundtruth: PassArtifacts,
    pub evaluation: PassArtifacts,
}

impl OutputLayout {
    pub fn new(directory: &Path, bagfile: &Path, map_name: &str) -> Self {
        let groundtruth = PassArtifacts::new(
            directory,
            format!("{}.bag", map_name),
            "groundtruth",
            "make_groundtruth.txt",
            "groundtruth",
        );
        let evaluation = PassArtifacts::new(
            directory,
            format!("{}_results.bag", bag_prefix(bagfile)),
            "results",
            "get_loc_results.txt",
            "loc",
        );
        OutputLayout {
            directory: directory.to_path_buf(),
            map_name: map_name.to_string(),
            map_bag: directory.join(format!("{}.bag", map_name)),
            map_file: directory.join(format!("{}{}", map_name, MAP_SUFFIX)),
            map_command_log: directory.join("make_map.txt"),
            groundtruth,
            evaluation,
        }
    }

    /// The fixed place the replay collaborator writes its command record to.
    pub fn replay_command_record(&self) -> PathBuf {
        self.directory.join(REPLAY_COMMAND_RECORD)
    }
}

#[test]
fn test_bag_prefix() {
    assert_eq!(bag_prefix(Path::new("run1.bag")), "run1");
    assert_eq!(bag_prefix(Path::new("/data/bags/run1.bag")), "run1");
    assert_eq!(bag_prefix(Path::new("run1.debug.bag")), "run1.debug");
    assert_eq!(bag_prefix(Path::new("run1")), "run1");
}

#[test]
fn test_map_name() {
    assert_eq!(map_name(Path::new("run1.bag"), None), "run1_groundtruth");
    assert_eq!(map_name(Path::new("run1.bag"), Some("foo")), "foo");
    assert_eq!(map_name(Path::new("run1.bag"), Some("")), "run1_groundtruth");
}

#[test]
fn test_layout() {
    let dir = Path::new("/out");
    let layout = OutputLayout::new(dir, Path::new("/bags/scan.bag"), "scan_groundtruth");
    assert_eq!(
        layout.map_file,
        Path::new("/out/scan_groundtruth.teblid512.vocabdb.map")
    );
    assert_eq!(layout.map_bag, Path::new("/out/scan_groundtruth.bag"));
    assert_eq!(layout.groundtruth.results_bag, layout.map_bag);
    assert_eq!(layout.groundtruth.loc_pdf, Path::new("/out/loc_groundtruth.pdf"));
    assert_eq!(layout.groundtruth.vio_csv, Path::new("/out/vio_groundtruth.csv"));
    assert_eq!(
        layout.groundtruth.command_log,
        Path::new("/out/make_groundtruth.txt")
    );
    assert_eq!(
        layout.groundtruth.command_record,
        Path::new("/out/groundtruth_run_offline_replay_command.txt")
    );
    assert_eq!(layout.evaluation.results_bag, Path::new("/out/scan_results.bag"));
    assert_eq!(layout.evaluation.loc_pdf, Path::new("/out/loc_results.pdf"));
    assert_eq!(layout.evaluation.vio_pdf, Path::new("/out/vio_results.pdf"));
    assert_eq!(layout.evaluation.loc_csv, Path::new("/out/loc_results.csv"));
    assert_eq!(
        layout.evaluation.command_log,
        Path::new("/out/get_loc_results.txt")
    );
    assert_eq!(
        layout.evaluation.command_record,
        Path::new("/out/loc_run_offline_replay_command.txt")
    );
    assert_ne!(layout.groundtruth.command_log, layout.evaluation.command_log);
}
