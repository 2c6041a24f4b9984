use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::*;
use std::process::Command;
use tempfile::{tempdir, TempDir};

const FAKE_MAP_BUILDER: &str = r#"name=""
while [ $# -gt 0 ]; do
  if [ "$1" = "--map-name" ]; then name="$2"; fi
  shift
done
touch "$name.bag" "$name.teblid512.vocabdb.map"
"#;

const FAKE_REPLAY_RUNNER: &str = r#"echo "$@" >> "$CALLS"
while [ $# -gt 0 ]; do
  case "$1" in
    -o|--loc-output-file|--vio-output-file|--loc-results-csv-file|--vio-results-csv-file)
      touch "$2"
      shift;;
  esac
  shift
done
echo "replay" > run_offline_replay_command.txt
"#;

/// A scratch directory with a bagfile, a base map, a localization map and fake collaborators.
fn setup() -> Result<TempDir, Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("scan.bag"), b"bag")?;
    fs::write(dir.path().join("base.map"), b"map")?;
    fs::write(dir.path().join("loc.map"), b"map")?;
    fs::write(dir.path().join("map.sh"), FAKE_MAP_BUILDER)?;
    let calls = dir.path().join("calls.txt");
    fs::write(
        dir.path().join("replay.sh"),
        FAKE_REPLAY_RUNNER.replace("$CALLS", &calls.to_string_lossy()),
    )?;
    Ok(dir)
}

fn make_groundtruth(dir: &Path) -> Result<Command, Box<dyn std::error::Error>> {
    with_map_builder(dir, &format!("sh {}", dir.join("map.sh").display()))
}

fn with_map_builder(dir: &Path, map_builder: &str) -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("make_groundtruth")?;
    cmd.current_dir(dir)
        .arg("scan.bag")
        .arg("base.map")
        .arg("--map-builder")
        .arg(map_builder)
        .arg("--replay-runner")
        .arg(format!("sh {}", dir.join("replay.sh").display()));
    Ok(cmd)
}

fn calls(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("calls.txt"))
        .unwrap_or_default()
        .lines()
        .map(|l| l.to_string())
        .collect()
}

#[test]
fn missing_bagfile() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("base.map"), b"map")?;

    let mut cmd = Command::cargo_bin("make_groundtruth")?;
    cmd.current_dir(dir.path()).arg("scan.bag").arg("base.map");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Bag file scan.bag does not exist."));
    assert!(!dir.path().join("groundtruth_creation_output").exists());

    Ok(())
}

#[test]
fn missing_base_map() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("scan.bag"), b"bag")?;

    let mut cmd = Command::cargo_bin("make_groundtruth")?;
    cmd.current_dir(dir.path()).arg("scan.bag").arg("base.map");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Base surf map base.map does not exist."));
    assert!(!dir.path().join("groundtruth_creation_output").exists());

    Ok(())
}

#[test]
fn missing_loc_map() -> Result<(), Box<dyn std::error::Error>> {
    let dir = setup()?;

    let mut cmd = make_groundtruth(dir.path())?;
    cmd.arg("--loc-map").arg("missing.map");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Loc map missing.map does not exist."));
    assert!(!dir.path().join("groundtruth_creation_output").exists());

    Ok(())
}

#[test]
fn existing_output_directory() -> Result<(), Box<dyn std::error::Error>> {
    let dir = setup()?;
    let out = dir.path().join("out");
    fs::create_dir(&out)?;
    fs::write(out.join("previous.txt"), b"previous")?;

    let mut cmd = make_groundtruth(dir.path())?;
    cmd.arg("-o").arg("out");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Output directory out already exists."));
    assert_eq!(fs::read_dir(&out)?.count(), 1);
    assert_eq!(fs::read(out.join("previous.txt"))?, b"previous");
    assert!(calls(dir.path()).is_empty());

    Ok(())
}

#[cfg(unix)]
#[test]
fn groundtruth_only() -> Result<(), Box<dyn std::error::Error>> {
    let dir = setup()?;

    let mut cmd = make_groundtruth(dir.path())?;
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("scan_groundtruth.teblid512.vocabdb.map"))
        .stdout(predicate::str::contains("missing").not());

    let out = dir.path().join("groundtruth_creation_output");
    for name in &[
        "scan_groundtruth.bag",
        "scan_groundtruth.teblid512.vocabdb.map",
        "make_map.txt",
        "make_groundtruth.txt",
        "groundtruth_run_offline_replay_command.txt",
        "loc_groundtruth.pdf",
        "vio_groundtruth.pdf",
        "loc_groundtruth.csv",
        "vio_groundtruth.csv",
    ] {
        assert!(out.join(name).exists(), "{} was not created", name);
    }
    for name in &[
        "scan_results.bag",
        "loc_results.pdf",
        "get_loc_results.txt",
        "loc_run_offline_replay_command.txt",
        "run_offline_replay_command.txt",
    ] {
        assert!(!out.join(name).exists(), "{} should not exist", name);
    }

    let calls = calls(dir.path());
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains("--generate-image-features"));
    assert!(!calls[0].contains(" -g "));

    let log = fs::read_to_string(out.join("make_groundtruth.txt"))?;
    assert!(log.lines().next().unwrap_or("").contains("replay.sh"));

    Ok(())
}

#[cfg(unix)]
#[test]
fn groundtruth_and_evaluation() -> Result<(), Box<dyn std::error::Error>> {
    let dir = setup()?;

    let mut cmd = make_groundtruth(dir.path())?;
    cmd.arg("--loc-map").arg("loc.map").arg("-m").arg("foo");
    cmd.assert().success();

    let out = dir.path().join("groundtruth_creation_output");
    for name in &[
        "foo.teblid512.vocabdb.map",
        "scan_results.bag",
        "loc_results.pdf",
        "vio_results.pdf",
        "loc_results.csv",
        "vio_results.csv",
        "get_loc_results.txt",
        "groundtruth_run_offline_replay_command.txt",
        "loc_run_offline_replay_command.txt",
    ] {
        assert!(out.join(name).exists(), "{} was not created", name);
    }

    let calls = calls(dir.path());
    assert_eq!(calls.len(), 2);
    assert!(calls[0].contains("foo.teblid512.vocabdb.map"));
    assert!(calls[0].contains("--generate-image-features"));
    assert!(calls[1].contains("/loc.map -i "));
    assert!(calls[1].contains(" -g "));
    assert!(calls[1].contains("groundtruth_creation_output/foo.bag"));
    assert!(!calls[1].contains("--generate-image-features"));

    Ok(())
}

#[cfg(unix)]
#[test]
fn evaluation_generates_features_on_request() -> Result<(), Box<dyn std::error::Error>> {
    let dir = setup()?;

    let mut cmd = make_groundtruth(dir.path())?;
    cmd.arg("--loc-map")
        .arg("loc.map")
        .arg("--generate-image-features")
        .arg("--no-histogram-equalization");
    cmd.assert().success();

    let calls = calls(dir.path());
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.contains("--generate-image-features")));
    let map_log =
        fs::read_to_string(dir.path().join("groundtruth_creation_output/make_map.txt"))?;
    assert!(map_log.contains("--no-histogram-equalization"));

    Ok(())
}

#[cfg(unix)]
#[test]
fn map_build_failure_stops_run() -> Result<(), Box<dyn std::error::Error>> {
    let dir = setup()?;

    let mut cmd = with_map_builder(dir.path(), "false")?;
    cmd.arg("--loc-map").arg("loc.map");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("map build exited with status 1"));

    assert!(calls(dir.path()).is_empty());
    let out = dir.path().join("groundtruth_creation_output");
    assert!(out.join("make_map.txt").exists());

    Ok(())
}

#[test]
fn dry_run() -> Result<(), Box<dyn std::error::Error>> {
    let dir = setup()?;

    let mut cmd = Command::cargo_bin("make_groundtruth")?;
    cmd.current_dir(dir.path())
        .arg("scan.bag")
        .arg("base.map")
        .arg("--loc-map")
        .arg("loc.map")
        .arg("--dry-run");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "rosrun localization_analysis make_map.py",
        ))
        .stdout(predicate::str::contains("scan_groundtruth.teblid512.vocabdb.map"))
        .stdout(predicate::str::contains("scan_results.bag"));
    assert!(!dir.path().join("groundtruth_creation_output").exists());

    Ok(())
}
