//! Generate testdata command implementation.
//!
//! Writes synthetic captured outputs, one `<target>.out` per configured
//! target, which the sampler can consume through `--replay-dir`.

use anyhow::{Context, Result};
use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use remote_proc_sampler::config::{Config, SourceConfig};
use remote_proc_sampler::executor::replay_file_name;
use remote_proc_sampler::parser::{LineFormat, DEFAULT_PROCESS_PREFIX};
use serde::{Deserialize, Serialize};
use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const CONTAINER_NAMES: &[&str] = &[
    "odoo", "nginx", "redis", "postgres", "worker", "cron", "traefik", "mailhog",
];
const DATABASE_NAMES: &[&str] = &["matelec", "demo", "sales", "boggio", "nubeadhoc"];
const NOISE_LINES: &[&str] = &[
    " 0.0  0.0 /bin/bash",
    " 0.0  0.1 ps --sort=-pcpu -Ao pcpu,pmem,args",
    " 0.0  0.4 postgres: checkpointer",
    " 0.0  0.2 postgres: walwriter",
];

/// One generated file in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestdataFile {
    pub target: String,
    pub format: LineFormat,
    pub file: String,
}

/// Root structure of `manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestdataManifest {
    pub version: String,
    pub generated_at: String,
    pub files: Vec<TestdataFile>,
}

/// Generates synthetic captured outputs for every configured target.
pub fn command_generate_testdata(
    output: PathBuf,
    containers: usize,
    backends: usize,
    config: &Config,
) -> Result<TestdataManifest> {
    debug!(
        "Generating test data: containers={}, backends={}, output={}",
        containers,
        backends,
        output.display()
    );

    fs::create_dir_all(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let mut rng = rand::thread_rng();
    let mut files = Vec::new();

    for source in &config.sources {
        for target in &source.targets {
            let content = match source.format {
                LineFormat::ContainerStats => generate_container_stats(&mut rng, containers),
                LineFormat::ProcessList => {
                    generate_process_list(&mut rng, backends, prefix_of(source))
                }
            };
            let file = replay_file_name(target);
            write_file(&output.join(&file), &content)?;
            debug!("Generated {} for {}", file, target);

            files.push(TestdataFile {
                target: target.clone(),
                format: source.format,
                file,
            });
        }
    }

    let manifest = TestdataManifest {
        version: "1.0".to_string(),
        generated_at: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        files,
    };
    let json_content = serde_json::to_string_pretty(&manifest)?;
    write_file(&output.join("manifest.json"), &json_content)?;

    println!(
        "✅ Generated test data: {} target outputs in {}",
        manifest.files.len(),
        output.display()
    );

    Ok(manifest)
}

fn prefix_of(source: &SourceConfig) -> &str {
    source
        .process_prefix
        .as_deref()
        .unwrap_or(DEFAULT_PROCESS_PREFIX)
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Renders a `docker stats --no-stream` table with `count` containers.
fn generate_container_stats(rng: &mut impl Rng, count: usize) -> String {
    let mut out = String::from("NAME                CONTAINER      CPU %     MEM USAGE / LIMIT\n");

    for i in 0..count {
        let base = CONTAINER_NAMES[i % CONTAINER_NAMES.len()];
        let name = format!("{}-{}", base, i / CONTAINER_NAMES.len() + 1);
        let id: String = (0..12)
            .map(|_| char::from_digit(rng.gen_range(0..16), 16).unwrap_or('0'))
            .collect();

        // CPU percent: 0 - 250 (multi-core containers exceed 100)
        let cpu: f64 = rng.gen_range(0.0..250.0);
        let memory = match rng.gen_range(0..3) {
            0 => format!("{:.1}KiB", rng.gen_range(100.0..1000.0)),
            1 => format!("{:.2}MiB", rng.gen_range(10.0..1000.0)),
            _ => format!("{:.3}GiB", rng.gen_range(1.0..4.0)),
        };

        writeln!(out, "{:<19} {} {:>7.2}%  {} / 7.5GiB", name, id, cpu, memory).ok();
    }

    out
}

/// Renders a `ps --sort=-pcpu -Ao pcpu,pmem,args` listing with `count`
/// backends spread over a few databases, plus unrelated processes.
fn generate_process_list(rng: &mut impl Rng, count: usize, prefix: &str) -> String {
    let mut rows: Vec<(f64, String)> = Vec::with_capacity(count + NOISE_LINES.len());

    for _ in 0..count {
        let cpu: f64 = rng.gen_range(0.0..60.0);
        let mem: f64 = rng.gen_range(0.1..5.0);
        let db = DATABASE_NAMES.choose(rng).copied().unwrap_or("demo");
        let client = format!(
            "10.42.{}.{}({})",
            rng.gen_range(0..255),
            rng.gen_range(1..255),
            rng.gen_range(30000..60000)
        );
        let state = ["idle", "SELECT", "idle in transaction"]
            .choose(rng)
            .copied()
            .unwrap_or("idle");
        rows.push((
            cpu,
            format!("{:>4.1} {:>4.1} {}odoo {} {} {}", cpu, mem, prefix, db, client, state),
        ));
    }
    for noise in NOISE_LINES {
        rows.push((0.0, noise.to_string()));
    }

    rows.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut out = String::from("%CPU %MEM COMMAND\n");
    for (_, line) in rows {
        writeln!(out, "{}", line).ok();
    }
    out
}
