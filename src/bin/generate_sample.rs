use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rusty_chroma::data::loader::BODY_MARKER;
use rusty_chroma::Metadata;

/// Write a synthetic fluorescence trace export for trying out the pipeline.
#[derive(Parser, Debug)]
struct Args {
    #[arg(short, long, default_value = "sample_chromatogram.txt")]
    output: PathBuf,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn gaussian(t: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(t - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

fn generate_signal(
    time: &[f64],
    peaks: &[(f64, f64, f64)],
    drift: (f64, f64),
    noise: &mut DetectorNoise,
) -> Vec<f64> {
    time.iter()
        .map(|&t| {
            let signal: f64 = peaks
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(t, mu, sigma, amp))
                .sum();
            drift.0 + drift.1 * t + signal + noise.sample()
        })
        .collect()
}

/// Seeded white Gaussian noise: SplitMix64 uniforms through the Marsaglia
/// polar method, which yields normals in pairs.
struct DetectorNoise {
    state: u64,
    std_dev: f64,
    spare: Option<f64>,
}

impl DetectorNoise {
    fn new(seed: u64, std_dev: f64) -> Self {
        DetectorNoise {
            state: seed,
            std_dev,
            spare: None,
        }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in `[-1, 1)`.
    fn next_signed(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 52) as f64 - 1.0
    }

    fn sample(&mut self) -> f64 {
        if let Some(z) = self.spare.take() {
            return self.std_dev * z;
        }
        loop {
            let u = self.next_signed();
            let v = self.next_signed();
            let s = u * u + v * v;
            if s > 0.0 && s < 1.0 {
                let factor = (-2.0 * s.ln() / s).sqrt();
                self.spare = Some(v * factor);
                return self.std_dev * u * factor;
            }
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    // 30 min run sampled every 0.1 s
    let step_s = 0.1;
    let n_points = 18001;
    let time: Vec<f64> = (0..n_points).map(|i| i as f64 * step_s / 60.0).collect();

    // (retention time, width, height) in min / min / EU
    let peaks = [(6.2, 0.08, 45.0), (11.5, 0.12, 120.0), (19.8, 0.15, 30.0)];
    let mut noise = DetectorNoise::new(args.seed, 0.15);
    let signal = generate_signal(&time, &peaks, (2.0, 0.05), &mut noise);

    let file = File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "{}:", Metadata::INJECTION)?;
    writeln!(out, "Data Vault\tSynthetic")?;
    writeln!(out, "Injection\tsynthetic seed {}", args.seed)?;
    writeln!(out, "Injection Volume (µl)\t10.000")?;
    writeln!(out)?;
    writeln!(out, "{}:", Metadata::DATA_INFO)?;
    writeln!(out, "{}\t{:.6}", Metadata::TIME_MIN, time[0])?;
    writeln!(out, "{}\t{:.6}", Metadata::TIME_MAX, time[n_points - 1])?;
    writeln!(out, "{}\t{n_points}", Metadata::DATA_POINTS)?;
    writeln!(out, "Detector\tFluorescence")?;
    writeln!(out, "Signal Unit\tEU")?;
    writeln!(out, "{}\tFLR ChA", Metadata::CHANNEL)?;
    writeln!(out)?;
    writeln!(out, "{}:", Metadata::SIGNAL_PARAMETERS)?;
    writeln!(out, "Signal Info\tsynthetic")?;
    writeln!(out)?;
    writeln!(out, "{BODY_MARKER}")?;
    writeln!(out, "Time (min)\tStep (s)\tValue (EU)")?;
    for (i, (t, y)) in time.iter().zip(&signal).enumerate() {
        if i == 0 {
            writeln!(out, "{t:.6}\tn.a.\t{y:.6}")?;
        } else {
            writeln!(out, "{t:.6}\t{step_s:.2}\t{y:.6}")?;
        }
    }
    out.flush()?;

    println!(
        "Wrote {n_points} samples with {} peaks to {}",
        peaks.len(),
        args.output.display()
    );
    Ok(())
}
