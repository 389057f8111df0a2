//! Check command implementation.
//!
//! Validates the effective configuration and the metric store, and optionally
//! probes every target without persisting anything.

use anyhow::{bail, Result};
use chrono::Local;
use remote_proc_sampler::collector::SampleCollector;
use remote_proc_sampler::config::{validate_effective_config, Config};
use remote_proc_sampler::executor::RemoteExecutor;
use remote_proc_sampler::report::TargetStatus;
use remote_proc_sampler::store::{MetricStore, SqliteStore};

/// Validates configuration, store and (with `probe`) target reachability.
pub fn command_check(config: &Config, probe: bool, executor: &dyn RemoteExecutor) -> Result<()> {
    println!("🔍 Remote Process Sampler - System Check");
    println!("========================================");

    let mut all_ok = true;

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(()) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            bail!("Configuration invalid");
        }
    }
    for source in &config.sources {
        println!(
            "   ├─ {} → table {} ({} targets, memory in {})",
            source.format,
            source.table_name().map(|t| t.to_string()).unwrap_or_default(),
            source.targets.len(),
            source.format.memory_unit()
        );
    }
    if config.target_count() == 0 {
        println!("   ⚠️  No targets configured");
    }

    let db_path = config.database_path();
    println!("\n💾 Checking metric store {}...", db_path.display());
    let store = match SqliteStore::open(&db_path) {
        Ok(s) => s,
        Err(e) => {
            println!("   ❌ Cannot open store: {}", e);
            bail!("Metric store unavailable");
        }
    };
    for table in config.tables()? {
        let ready = store
            .ensure_schema(&table)
            .and_then(|_| store.row_count(&table));
        match ready {
            Ok(rows) => println!("   ✅ Table {} ready ({} rows)", table, rows),
            Err(e) => {
                println!("   ❌ Table {}: {}", table, e);
                all_ok = false;
            }
        }
    }

    if probe {
        println!("\n📡 Probing targets...");
        let collector = SampleCollector::new(config.resolve_targets()?, executor, &store);
        let now = Local::now();
        for target in collector.targets() {
            match collector.sample_target(target, now) {
                Ok(ts) => match ts.status {
                    TargetStatus::Ok => println!(
                        "   ✅ {} - {} tuples ({} rejected lines)",
                        target.name,
                        ts.sample.tuples.len(),
                        ts.rejected
                    ),
                    TargetStatus::Failed { exit_status } => {
                        println!("   ❌ {} - exit status {}", target.name, exit_status);
                        all_ok = false;
                    }
                },
                Err(e) => {
                    println!("   ❌ {} - cannot launch command: {}", target.name, e);
                    all_ok = false;
                }
            }
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - sampler is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        bail!("Some checks failed")
    }
}
