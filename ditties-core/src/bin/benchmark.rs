//! Frame resampler + wake-word scan throughput over WAV fixtures.
//!
//! Fixtures must be 48 kHz stereo 16-bit PCM, the voice-channel layout.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use ditties_core::audio::wav::read_wav_bytes;
use ditties_core::audio::{SOURCE_CHANNELS, SOURCE_SAMPLE_RATE};
use ditties_core::wake::energy::DEFAULT_FRAME_LENGTH;
use ditties_core::{
    EnergyTriggerClassifier, FrameResampler, ResampleMode, ResamplerConfig, WakeWordScanner,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

fn main() {
    if let Err(e) = run() {
        eprintln!("benchmark failed: {e}");
        std::process::exit(1);
    }
}

#[derive(Debug)]
struct Args {
    fixtures_dir: PathBuf,
    iterations: usize,
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
struct CaseResult {
    file: String,
    mode: ResampleMode,
    iteration: usize,
    audio_secs: f64,
    elapsed_ms: f64,
    realtime_factor: f64,
    frames: u64,
    detections: usize,
}

#[derive(Debug, Clone, Serialize)]
struct ModeSummary {
    mode: ResampleMode,
    runs: usize,
    p50_elapsed_ms: f64,
    p95_elapsed_ms: f64,
    avg_realtime_factor: f64,
}

#[derive(Debug, Clone, Serialize)]
struct Summary {
    fixtures_dir: String,
    iterations: usize,
    total_files: usize,
    modes: Vec<ModeSummary>,
    cases: Vec<CaseResult>,
}

fn parse_args() -> Result<Args, String> {
    let mut fixtures_dir: Option<PathBuf> = None;
    let mut iterations: usize = 3;
    let mut output: Option<PathBuf> = None;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--fixtures" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --fixtures".into());
                };
                fixtures_dir = Some(PathBuf::from(v));
            }
            "--iterations" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --iterations".into());
                };
                iterations = v
                    .parse::<usize>()
                    .map_err(|_| "invalid value for --iterations".to_string())?
                    .clamp(1, 50);
            }
            "--output" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --output".into());
                };
                output = Some(PathBuf::from(v));
            }
            "--help" | "-h" => {
                println!(
                    "Usage: cargo run -p ditties-core --bin ditties-benchmark -- \\
  --fixtures <dir> [--iterations <n>] [--output <file.json>]"
                );
                std::process::exit(0);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }

    Ok(Args {
        fixtures_dir: fixtures_dir.unwrap_or_else(|| PathBuf::from("benchmarks/fixtures")),
        iterations,
        output,
    })
}

fn collect_wavs(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), String> {
    for entry in std::fs::read_dir(dir).map_err(|e| e.to_string())? {
        let path = entry.map_err(|e| e.to_string())?.path();
        if path.is_dir() {
            collect_wavs(&path, out)?;
        } else if path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.eq_ignore_ascii_case("wav"))
        {
            out.push(path);
        }
    }
    Ok(())
}

fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let idx = ((sorted.len() - 1) as f64 * p.clamp(0.0, 1.0)).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Scan the whole fixture, counting every wake-word trigger.
async fn scan_all(bytes: &[u8], mode: ResampleMode) -> Result<(u64, usize), String> {
    let config = ResamplerConfig {
        mode,
        ..ResamplerConfig::default()
    };
    let mut resampler =
        FrameResampler::new(std::io::Cursor::new(bytes), config).map_err(|e| e.to_string())?;
    let classifier = EnergyTriggerClassifier::new(0.05, 8);
    let mut scanner = WakeWordScanner::new(classifier, &resampler).map_err(|e| e.to_string())?;
    let cancel = CancellationToken::new();

    let mut detections = 0usize;
    loop {
        match scanner
            .scan(&mut resampler, &cancel)
            .await
            .map_err(|e| e.to_string())?
        {
            ditties_core::wake::ScanOutcome::Detected(_) => detections += 1,
            ditties_core::wake::ScanOutcome::StreamEnded => break,
        }
    }
    Ok((scanner.total_frames(), detections))
}

fn run() -> Result<(), String> {
    let args = parse_args()?;
    if !args.fixtures_dir.exists() {
        return Err(format!(
            "fixtures directory not found: {}",
            args.fixtures_dir.display()
        ));
    }

    let mut wav_files = Vec::new();
    collect_wavs(&args.fixtures_dir, &mut wav_files)?;
    wav_files.sort();
    if wav_files.is_empty() {
        return Err(format!(
            "no .wav fixtures found in {}",
            args.fixtures_dir.display()
        ));
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| e.to_string())?;

    println!(
        "Running resampler benchmark on {} fixtures (iterations={}, frame={} samples)",
        wav_files.len(),
        args.iterations,
        DEFAULT_FRAME_LENGTH
    );

    let mut cases = Vec::new();
    for wav in &wav_files {
        let bytes = read_wav_bytes(wav).map_err(|e| e.to_string())?;
        let audio_secs =
            bytes.len() as f64 / (SOURCE_SAMPLE_RATE as f64 * SOURCE_CHANNELS as f64 * 2.0);
        let file = wav
            .strip_prefix(&args.fixtures_dir)
            .unwrap_or(wav)
            .display()
            .to_string();

        for mode in [ResampleMode::Decimate, ResampleMode::Filtered] {
            for iteration in 1..=args.iterations {
                let started = Instant::now();
                let (frames, detections) = runtime.block_on(scan_all(&bytes, mode))?;
                let elapsed = started.elapsed().as_secs_f64();
                cases.push(CaseResult {
                    file: file.clone(),
                    mode,
                    iteration,
                    audio_secs,
                    elapsed_ms: elapsed * 1000.0,
                    realtime_factor: if elapsed > 0.0 { audio_secs / elapsed } else { 0.0 },
                    frames,
                    detections,
                });
                println!(
                    "{file} {mode:?} [{iteration}/{iters}] {ms:.2} ms, {frames} frames, {detections} triggers",
                    iters = args.iterations,
                    ms = elapsed * 1000.0
                );
            }
        }
    }

    let mut grouped: BTreeMap<&'static str, (ResampleMode, Vec<&CaseResult>)> = BTreeMap::new();
    for row in &cases {
        let key = match row.mode {
            ResampleMode::Decimate => "decimate",
            ResampleMode::Filtered => "filtered",
        };
        grouped.entry(key).or_insert((row.mode, Vec::new())).1.push(row);
    }
    let modes = grouped
        .into_values()
        .map(|(mode, rows)| {
            let elapsed = rows.iter().map(|r| r.elapsed_ms).collect::<Vec<_>>();
            ModeSummary {
                mode,
                runs: rows.len(),
                p50_elapsed_ms: percentile(&elapsed, 0.50),
                p95_elapsed_ms: percentile(&elapsed, 0.95),
                avg_realtime_factor: rows.iter().map(|r| r.realtime_factor).sum::<f64>()
                    / rows.len().max(1) as f64,
            }
        })
        .collect::<Vec<_>>();

    for m in &modes {
        println!(
            "{:?}: runs={} p50={:.2}ms p95={:.2}ms realtime x{:.0}",
            m.mode, m.runs, m.p50_elapsed_ms, m.p95_elapsed_ms, m.avg_realtime_factor
        );
    }

    let summary = Summary {
        fixtures_dir: args.fixtures_dir.display().to_string(),
        iterations: args.iterations,
        total_files: wav_files.len(),
        modes,
        cases,
    };
    let json = serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())?;
    if let Some(out) = args.output {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        std::fs::write(&out, json).map_err(|e| e.to_string())?;
        println!("Wrote benchmark report: {}", out.display());
    } else {
        println!("{json}");
    }

    Ok(())
}
