//! Prepare command implementation.
//!
//! Runs each source's `setup_command` on its targets, e.g. installing
//! `procps` in database containers before `ps` can be sampled there.

use anyhow::{Context, Result};
use remote_proc_sampler::config::{render_command, Config};
use remote_proc_sampler::executor::RemoteExecutor;
use tracing::{info, info_span, warn};

/// Outcome counts of a prepare run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PrepareSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped_sources: usize,
}

/// Runs setup commands target by target. Remote failures are logged and
/// counted; only a launch failure aborts.
pub fn command_prepare(config: &Config, executor: &dyn RemoteExecutor) -> Result<PrepareSummary> {
    let mut summary = PrepareSummary::default();

    for source in &config.sources {
        let template = match source.setup_command.as_deref() {
            Some(t) => t,
            None => {
                summary.skipped_sources += 1;
                continue;
            }
        };

        for target in &source.targets {
            let _span = info_span!("prepare", target = %target).entered();
            let command = render_command(template, target);
            let output = executor
                .run(target, &command)
                .with_context(|| format!("Failed to launch setup command for {}", target))?;

            if output.success() {
                info!("Setup completed on {}", target);
                summary.succeeded += 1;
            } else {
                warn!(
                    "Setup failed on {} (exit status {}): {}",
                    target,
                    output.status,
                    output.stderr_lossy()
                );
                summary.failed += 1;
            }
        }
    }

    println!(
        "✅ Prepare finished: {} succeeded, {} failed, {} sources without setup command",
        summary.succeeded, summary.failed, summary.skipped_sources
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use remote_proc_sampler::config::SourceConfig;
    use remote_proc_sampler::executor::ShellExecutor;
    use remote_proc_sampler::parser::LineFormat;

    #[test]
    fn test_prepare_runs_setup_per_target() {
        let mut containers = SourceConfig::new(LineFormat::ContainerStats);
        containers.targets = vec!["ad-node4".into()];
        let mut pg = SourceConfig::new(LineFormat::ProcessList);
        pg.setup_command = Some("test {target} = ok-host".into());
        pg.targets = vec!["ok-host".into(), "bad-host".into()];

        let config = Config {
            sources: vec![containers, pg],
            ..Config::default()
        };

        let summary = command_prepare(&config, &ShellExecutor::new()).unwrap();
        assert_eq!(
            summary,
            PrepareSummary {
                succeeded: 1,
                failed: 1,
                skipped_sources: 1,
            }
        );
    }
}
