use assert_cmd::cargo::cargo_bin_cmd;
use beatscope_lib::report::AnalysisReport;
use serde_json::{json, Value};
use std::{error::Error, path::PathBuf};

fn analyze(extra: &[&str]) -> Result<AnalysisReport, Box<dyn Error>> {
    let input = sample_path("test_data/paused_rhythm_5k.wav");
    let mut cmd = cargo_bin_cmd!("beatscope");
    cmd.args(["analyze", "--input", &input]).args(extra);
    let output = cmd.assert().success().get_output().stdout.clone();
    Ok(serde_json::from_slice(&output)?)
}

fn without_timing(mut report: AnalysisReport) -> AnalysisReport {
    report.processing_time_ms = 0;
    report
}

#[test]
fn reference_analyzer_agrees_with_local_pipeline() -> Result<(), Box<dyn Error>> {
    let local = without_timing(analyze(&[])?);
    let bridged = without_timing(analyze(&[
        "--external-analyzer",
        "--analyzer-command",
        env!("CARGO_BIN_EXE_beatscope"),
        "--analyzer-arg",
        "reference-analyzer",
    ])?);
    assert_eq!(bridged, local);
    assert_eq!(bridged.anomalies.len(), 1);
    Ok(())
}

#[test]
fn missing_analyzer_falls_back_to_local() -> Result<(), Box<dyn Error>> {
    let local = without_timing(analyze(&[])?);
    let fallback = without_timing(analyze(&[
        "--external-analyzer",
        "--analyzer-command",
        "/nonexistent/beatscope-analyzer",
    ])?);
    assert_eq!(fallback, local);
    Ok(())
}

#[cfg(unix)]
#[test]
fn bridged_peaks_drive_landmarks() -> Result<(), Box<dyn Error>> {
    let local = analyze(&[])?;
    let bridged = analyze(&[
        "--external-analyzer",
        "--analyzer-command",
        "sh",
        "--analyzer-arg",
        "-c",
        "--analyzer-arg",
        r#"cat > /dev/null; echo '{"peaks":[2502,10502]}'"#,
    ])?;
    assert_eq!(bridged.peaks, vec![2502, 10502]);
    assert_eq!(bridged.q_waves, vec![2402, 10402]);
    assert_eq!(bridged.s_waves, vec![2602, 10602]);
    // Filtered data and anomalies were not overridden.
    assert_eq!(bridged.data_points, local.data_points);
    assert_eq!(bridged.anomalies, local.anomalies);
    Ok(())
}

#[cfg(unix)]
#[test]
fn hung_or_failing_analyzers_fall_back_to_local() -> Result<(), Box<dyn Error>> {
    let local = without_timing(analyze(&[])?);
    let scripts = [
        "sleep 5",
        r#"cat > /dev/null; echo '{"error":"model not loaded"}'"#,
        "cat > /dev/null; echo not-json",
        "cat > /dev/null; exit 2",
        r#"cat > /dev/null; echo '{"filtered_data":{"sampling_rate":5000,"data_points":[1.0]}}'"#,
    ];
    for script in scripts {
        let report = without_timing(analyze(&[
            "--external-analyzer",
            "--analyzer-command",
            "sh",
            "--analyzer-arg",
            "-c",
            "--analyzer-arg",
            script,
            "--analyzer-timeout-ms",
            "300",
        ])?);
        assert_eq!(report, local, "script: {script}");
    }
    Ok(())
}

#[test]
fn reference_analyzer_speaks_the_bridge_protocol() -> Result<(), Box<dyn Error>> {
    let request = json!({
        "sampling_rate": 5000,
        "duration": 0.0016,
        "length": 8,
        "data_points": [0.0, 0.0, 5.0, 10.0, 5.0, 0.0, 0.0, 0.0],
    });
    let mut cmd = cargo_bin_cmd!("beatscope");
    cmd.arg("reference-analyzer")
        .write_stdin(serde_json::to_vec(&request)?);
    let output = cmd.assert().success().get_output().stdout.clone();
    let body: Value = serde_json::from_slice(&output)?;

    assert_eq!(body["filtered_data"]["sampling_rate"], 5000);
    let filtered = body["filtered_data"]["data_points"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    assert_eq!(filtered.len(), 8);
    assert_eq!(body["anomalies"], json!([]));
    assert!(body.get("peaks").is_none());
    assert!(body.get("error").is_none());
    Ok(())
}

#[test]
fn reference_analyzer_reports_bad_payloads() -> Result<(), Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("beatscope");
    cmd.arg("reference-analyzer")
        .write_stdin(r#"{"sampling_rate": 44100, "data_points": [1.0]}"#);
    let output = cmd.assert().success().get_output().stdout.clone();
    let body: Value = serde_json::from_slice(&output)?;
    let message = body["error"].as_str().unwrap_or_default();
    assert!(message.starts_with("invalid waveform payload"), "{message}");
    assert!(body.get("filtered_data").is_none());
    Ok(())
}

fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .expect("crates dir")
        .parent()
        .expect("workspace root")
        .to_path_buf()
}

fn sample_path(relative: &str) -> String {
    workspace_root()
        .join(relative)
        .to_string_lossy()
        .to_string()
}
