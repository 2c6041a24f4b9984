extern crate env_logger;
extern crate groundtruth;
extern crate structopt;

use structopt::StructOpt;

use groundtruth::pipeline::Pipeline;
use groundtruth::process::{CollaboratorCommand, Collaborators, ProcessRunner};
use groundtruth::request::PipelineRequest;

use std::time::Duration;

// helper to parse a positive number of seconds with structopt
fn parse_timeout(s: &str) -> Result<Duration, String> {
    let secs = s.parse::<f64>().map_err(|e| e.to_string())?;
    if secs > 0.0 && secs.is_finite() {
        Ok(Duration::from_secs_f64(secs))
    } else {
        Err(format!("{} is not a positive number of seconds", s))
    }
}

/// Generates the groundtruth map and groundtruth bagfile containing groundtruth localization
/// estimates for a given input bagfile. Also tests the input bagfile against a provided
/// localization map and plots the results compared with the newly created groundtruth.
#[derive(StructOpt, Debug)]
#[structopt(name = "make_groundtruth")]
struct Opt {
    /// Input bagfile to generate groundtruth for.
    #[structopt(name = "BAGFILE", parse(from_os_str))]
    bagfile: std::path::PathBuf,

    /// Existing map to use as basis for groundtruth. Should largely overlap area covered in input
    /// bagfile.
    #[structopt(name = "BASE_SURF_MAP", parse(from_os_str))]
    base_surf_map: std::path::PathBuf,

    /// Full path to localization map for bagfile to test localization performance. If not passed
    /// the localization test is not run.
    #[structopt(long = "loc-map", default_value = "", parse(from_os_str))]
    loc_map: std::path::PathBuf,

    #[structopt(
        short = "o",
        long = "output-directory",
        default_value = "groundtruth_creation_output",
        parse(from_os_str)
    )]
    output_directory: std::path::PathBuf,

    /// Image topic.
    #[structopt(
        short = "i",
        long = "image-topic",
        default_value = "/mgt/img_sampler/nav_cam/image_record"
    )]
    image_topic: String,

    /// Prefix for generated map names. Defaults to the bagfile name.
    #[structopt(short = "m", long = "map-name")]
    map_name: Option<String>,

    /// Threshold for sequential image removal, the higher the more images removed.
    #[structopt(short = "l", long = "max-low-movement-mean-distance", default_value = "0.09")]
    max_low_movement_mean_distance: f64,

    /// Generate image features instead of using image features msgs from bagfile. Only affects
    /// the localization map test, groundtruth always generates image features.
    #[structopt(long = "generate-image-features")]
    generate_image_features: bool,

    /// Do not perform histogram equalization on images for map construction.
    #[structopt(long = "no-histogram-equalization")]
    no_histogram_equalization: bool,

    /// Command used to build maps.
    #[structopt(long = "map-builder", default_value = "rosrun localization_analysis make_map.py")]
    map_builder: CollaboratorCommand,

    /// Command used to replay bagfiles and plot results.
    #[structopt(
        long = "replay-runner",
        default_value = "rosrun localization_analysis run_offline_replay_and_plot_results.py"
    )]
    replay_runner: CollaboratorCommand,

    /// Kill any stage running longer than this many seconds. Waits indefinitely if not given.
    #[structopt(long = "stage-timeout", parse(try_from_str = parse_timeout))]
    stage_timeout: Option<Duration>,

    /// Print the commands that would be run without running them.
    #[structopt(long = "dry-run")]
    dry_run: bool,

    /// Show progress while stages run.
    #[structopt(short = "v", long = "verbose")]
    verbose: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opt = Opt::from_args();

    let request = PipelineRequest {
        bagfile: opt.bagfile,
        base_map: opt.base_surf_map,
        loc_map: Some(opt.loc_map),
        output_directory: opt.output_directory,
        image_topic: opt.image_topic,
        map_name: opt.map_name,
        max_low_movement_mean_distance: opt.max_low_movement_mean_distance,
        generate_image_features: opt.generate_image_features,
        histogram_equalization: !opt.no_histogram_equalization,
    };
    let collaborators = Collaborators {
        map_builder: opt.map_builder,
        replay_runner: opt.replay_runner,
    };

    let request = match request.validate() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if opt.dry_run {
        let pipeline = Pipeline::new(request, ProcessRunner::new(collaborators.clone()));
        for stage in pipeline.plan() {
            println!("{}", collaborators.command_line(&stage));
        }
        return;
    }

    let runner = ProcessRunner::new(collaborators)
        .timeout(opt.stage_timeout)
        .verbose(opt.verbose);
    match Pipeline::new(request, runner).run() {
        Ok(report) => print!("{}", report),
        Err(e) => {
            eprintln!("Groundtruth run failed: {}", e);
            std::process::exit(1);
        }
    }
}
