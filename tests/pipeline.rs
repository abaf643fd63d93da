use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

use rusty_chroma::{ChromError, Chromatogram, DetectionParams, Peak};

const DT: f64 = 0.01;

fn gaussian(t: f64, t0: f64, sigma: f64, height: f64) -> f64 {
    height * (-0.5 * ((t - t0) / sigma).powi(2)).exp()
}

fn time_axis(n: usize) -> Vec<f64> {
    (0..n).map(|i| i as f64 * DT).collect()
}

/// Write a tab-delimited instrument export and return its path.
fn write_export(dir: &Path, name: &str, time: &[f64], signal: &[f64]) -> PathBuf {
    let mut text = String::new();
    writeln!(text, "Injection Information:").unwrap();
    writeln!(text, "Injection\t{name}").unwrap();
    writeln!(text).unwrap();
    writeln!(text, "Chromatogram Data Information:").unwrap();
    writeln!(text, "Time Min. (min)\t{}", time[0]).unwrap();
    writeln!(text, "Time Max. (min)\t{}", time[time.len() - 1]).unwrap();
    writeln!(text, "Data Points\t{}", time.len()).unwrap();
    writeln!(text, "Channel\tFLR ChA").unwrap();
    writeln!(text).unwrap();
    writeln!(text, "Chromatogram Data:").unwrap();
    writeln!(text, "Time (min)\tStep (s)\tValue (EU)").unwrap();
    for (t, y) in time.iter().zip(signal) {
        writeln!(text, "{t}\tn.a.\t{y}").unwrap();
    }

    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn assert_boundary_invariants(chrom: &Chromatogram, peaks: &[Peak]) {
    let n = chrom.trace().len();
    for p in peaks {
        assert!(p.left_boundary_index < p.apex_index, "{p:?}");
        assert!(p.apex_index < p.right_boundary_index, "{p:?}");
        assert!(p.right_boundary_index < n, "{p:?}");
        assert_eq!(p.retention_time, chrom.trace().time()[p.apex_index]);
    }
}

#[test]
fn single_gaussian_is_found_and_integrated() {
    let dir = tempfile::tempdir().unwrap();
    let (height, sigma) = (100.0, 0.1);
    let time = time_axis(2001);
    let t0 = time[1000];
    let signal: Vec<f64> = time.iter().map(|&t| gaussian(t, t0, sigma, height)).collect();
    let path = write_export(dir.path(), "single.txt", &time, &signal);

    let mut chrom = Chromatogram::load(&path).unwrap();
    let peaks = chrom.detect_peaks(&DetectionParams::default()).unwrap().to_vec();

    assert_eq!(peaks.len(), 1);
    assert!((peaks[0].retention_time - t0).abs() <= DT);
    assert_boundary_invariants(&chrom, &peaks);

    let expected = height * sigma * (2.0 * std::f64::consts::PI).sqrt();
    let area = chrom.calculate_peak_area(&peaks[0]).unwrap();
    assert!(area >= 0.0);
    assert!(
        (area - expected).abs() / expected < 0.03,
        "area {area} vs analytic {expected}"
    );
}

#[test]
fn detection_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let time = time_axis(2001);
    let signal: Vec<f64> = time
        .iter()
        .map(|&t| gaussian(t, 4.0, 0.1, 80.0) + gaussian(t, 12.0, 0.2, 40.0))
        .collect();
    let path = write_export(dir.path(), "twice.txt", &time, &signal);

    let mut chrom = Chromatogram::load(&path).unwrap();
    let params = DetectionParams {
        prominence: 2.0,
        ..Default::default()
    };
    let first = chrom.detect_peaks(&params).unwrap().to_vec();
    let second = chrom.detect_peaks(&params).unwrap().to_vec();

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    assert_eq!(chrom.peaks(), second.as_slice());
    // peaks from the first pass are still valid against the identical second pass
    assert!(chrom.calculate_peak_area(&first[0]).is_ok());
}

#[test]
fn two_separated_peaks_in_order_with_unit_flow_volumes() {
    let dir = tempfile::tempdir().unwrap();
    let time = time_axis(2001);
    let (t1, t2) = (time[500], time[1500]);
    let signal: Vec<f64> = time
        .iter()
        .map(|&t| gaussian(t, t1, 0.1, 60.0) + gaussian(t, t2, 0.15, 90.0))
        .collect();
    let path = write_export(dir.path(), "two.txt", &time, &signal);

    let mut chrom = Chromatogram::load(&path).unwrap();
    let peaks = chrom.detect_peaks(&DetectionParams::default()).unwrap().to_vec();

    assert_eq!(peaks.len(), 2);
    assert!((peaks[0].retention_time - t1).abs() <= DT);
    assert!((peaks[1].retention_time - t2).abs() <= DT);
    assert!(peaks[0].retention_time < peaks[1].retention_time);
    assert_boundary_invariants(&chrom, &peaks);

    for peak in &peaks {
        let volume = chrom.calculate_elution_volume(peak, 1.0).unwrap();
        assert_eq!(volume, peak.retention_time);

        let v = chrom.calculate_elution_volume(peak, 0.35).unwrap();
        let v2 = chrom.calculate_elution_volume(peak, 2.0 * 0.35).unwrap();
        assert_eq!(v2, 2.0 * v);

        assert!(matches!(
            chrom.calculate_elution_volume(peak, 0.0),
            Err(ChromError::Parameter(_))
        ));
        assert!(matches!(
            chrom.calculate_elution_volume(peak, -0.5),
            Err(ChromError::Parameter(_))
        ));
        assert!(chrom.calculate_peak_area(peak).unwrap() >= 0.0);
    }
}

#[test]
fn drifting_baseline_is_removed_before_integration() {
    let dir = tempfile::tempdir().unwrap();
    let time = time_axis(3001);
    let (height, sigma, t0) = (50.0, 0.12, time[1800]);
    let signal: Vec<f64> = time
        .iter()
        .map(|&t| 10.0 + 0.4 * t + gaussian(t, t0, sigma, height))
        .collect();
    let path = write_export(dir.path(), "drift.txt", &time, &signal);

    let mut chrom = Chromatogram::load(&path).unwrap();
    let peaks = chrom.detect_peaks(&DetectionParams::default()).unwrap().to_vec();
    assert_eq!(peaks.len(), 1);
    assert!((peaks[0].apex_height - height).abs() < 0.05 * height);

    let expected = height * sigma * (2.0 * std::f64::consts::PI).sqrt();
    let area = chrom.calculate_peak_area(&peaks[0]).unwrap();
    assert!((area - expected).abs() / expected < 0.03, "area {area}");
}

#[test]
fn rippled_trace_still_yields_one_peak_per_component() {
    let dir = tempfile::tempdir().unwrap();
    let time = time_axis(2001);
    let signal: Vec<f64> = time
        .iter()
        .enumerate()
        .map(|(i, &t)| {
            let ripple = 0.2 * (i as f64 * 2.1).sin();
            gaussian(t, 5.0, 0.15, 70.0) + gaussian(t, 14.0, 0.2, 35.0) + ripple
        })
        .collect();
    let path = write_export(dir.path(), "ripple.txt", &time, &signal);

    let mut chrom = Chromatogram::load(&path).unwrap();
    let peaks = chrom.detect_peaks(&DetectionParams::default()).unwrap().to_vec();
    assert_eq!(peaks.len(), 2, "{peaks:?}");
    assert!((peaks[0].retention_time - 5.0).abs() < 0.05);
    assert!((peaks[1].retention_time - 14.0).abs() < 0.05);
    assert_boundary_invariants(&chrom, &peaks);
}

#[test]
fn two_sample_trace_clamps_smoothing_window() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_export(dir.path(), "short.txt", &[0.0, 0.1], &[1.0, 3.0]);

    let mut chrom = Chromatogram::load(&path).unwrap();
    let peaks = chrom.detect_peaks(&DetectionParams::default()).unwrap();
    assert!(peaks.is_empty());

    let applied = chrom.baseline().params();
    assert!(applied.window_length <= 2);
    assert_eq!(applied.window_length % 2, 1);
    let adjustment = chrom.baseline().adjustment().expect("clamp is recorded");
    assert_eq!(adjustment.requested.window_length, 25);
}

#[test]
fn csv_exports_load_like_tab_exports() {
    let dir = tempfile::tempdir().unwrap();
    let time = time_axis(1001);
    let signal: Vec<f64> = time.iter().map(|&t| gaussian(t, 5.0, 0.1, 30.0)).collect();
    let tab_path = write_export(dir.path(), "run.txt", &time, &signal);
    let csv_path = dir.path().join("run.csv");
    std::fs::write(&csv_path, std::fs::read_to_string(&tab_path).unwrap().replace('\t', ",")).unwrap();

    let mut tab = Chromatogram::load(&tab_path).unwrap();
    let mut csv = Chromatogram::load(&csv_path).unwrap();
    assert_eq!(tab.trace().signal(), csv.trace().signal());
    assert_eq!(csv.metadata().channel().as_deref(), Some("FLR ChA"));

    let a = tab.detect_peaks(&DetectionParams::default()).unwrap()[0];
    let b = csv.detect_peaks(&DetectionParams::default()).unwrap()[0];
    assert_eq!(a.apex_index, b.apex_index);
}

#[test]
fn load_errors_are_typed() {
    let dir = tempfile::tempdir().unwrap();

    let missing = Chromatogram::load(dir.path().join("absent.txt")).unwrap_err();
    assert!(matches!(missing, ChromError::Io { .. }));

    let unsupported = dir.path().join("run.mzML");
    std::fs::write(&unsupported, "").unwrap();
    assert!(matches!(
        Chromatogram::load(&unsupported),
        Err(ChromError::Format(_))
    ));

    let headless = dir.path().join("headless.txt");
    std::fs::write(&headless, "Chromatogram Data:\nTime (min)\tValue (EU)\n0.0\t1.0\n").unwrap();
    assert!(matches!(
        Chromatogram::load(&headless),
        Err(ChromError::Format(_))
    ));
}

#[test]
fn chromatograms_can_be_processed_on_separate_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Chromatogram>();

    let dir = tempfile::tempdir().unwrap();
    let time = time_axis(1001);
    let paths: Vec<PathBuf> = [3.0, 7.0]
        .iter()
        .map(|&t0| {
            let signal: Vec<f64> = time.iter().map(|&t| gaussian(t, t0, 0.1, 50.0)).collect();
            write_export(dir.path(), &format!("worker_{t0}.txt"), &time, &signal)
        })
        .collect();

    let rts: Vec<f64> = std::thread::scope(|scope| {
        let handles: Vec<_> = paths
            .iter()
            .map(|path| {
                scope.spawn(move || {
                    let mut chrom = Chromatogram::load(path).unwrap();
                    chrom.detect_peaks(&DetectionParams::default()).unwrap()[0].retention_time
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!((rts[0] - 3.0).abs() <= DT);
    assert!((rts[1] - 7.0).abs() <= DT);
}

#[test]
fn generated_sample_round_trips_through_the_cli() {
    let dir = tempfile::tempdir().unwrap();
    let sample = dir.path().join("sample.txt");
    let status = Command::new(env!("CARGO_BIN_EXE_generate_sample"))
        .arg("--output")
        .arg(&sample)
        .status()
        .unwrap();
    assert!(status.success());

    let mut chrom = Chromatogram::load(&sample).unwrap();
    let peaks = chrom.detect_peaks(&DetectionParams::default()).unwrap().to_vec();
    let rts: Vec<f64> = peaks.iter().map(|p| p.retention_time).collect();
    assert_eq!(rts.len(), 3, "{rts:?}");
    for (rt, expected) in rts.iter().zip([6.2, 11.5, 19.8]) {
        assert!((rt - expected).abs() < 0.02, "{rt} vs {expected}");
    }

    let report = dir.path().join("peaks.csv");
    let output = Command::new(env!("CARGO_BIN_EXE_rusty-chroma"))
        .arg(&sample)
        .args(["--flow-rate", "0.5", "--format", "csv", "--output"])
        .arg(&report)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let mut reader = csv::Reader::from_path(&report).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);
    let volume: f64 = rows[1][6].parse().unwrap();
    let rt: f64 = rows[1][1].parse().unwrap();
    assert_eq!(volume, rt * 0.5);
}

#[test]
fn json_report_includes_header_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let time = time_axis(1001);
    let signal: Vec<f64> = time.iter().map(|&t| gaussian(t, 5.0, 0.1, 40.0)).collect();
    let path = write_export(dir.path(), "meta.txt", &time, &signal);

    let output = Command::new(env!("CARGO_BIN_EXE_rusty-chroma"))
        .arg(&path)
        .args(["--flow-rate", "0.25", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["channel"], "FLR ChA");
    assert_eq!(report["metadata"]["Injection Information"]["Injection"], "meta.txt");
    assert_eq!(report["samples"], 1001);
    assert_eq!(report["peaks"].as_array().unwrap().len(), 1);
    let rt = report["peaks"][0]["retention_time"].as_f64().unwrap();
    assert_eq!(report["peaks"][0]["elution_volume"].as_f64().unwrap(), rt * 0.25);
}
