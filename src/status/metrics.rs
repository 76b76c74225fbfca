/**
 * ============================================================================
 * SERVICE METRICS
 * ============================================================================
 *
 * PURPOSE: Resource usage of one service's process tree
 *
 * FLOW:
 * 1. Ask the OS service manager for the unit's main PID (through the
 *    executor, so the allow-list applies)
 * 2. Read the process table with sysinfo and sum the main process plus
 *    every descendant
 *
 * A unit with no main process (stopped, or launchd without a pid line)
 * reports zero usage rather than an error.
 *
 * ============================================================================
 */

use crate::error::{Result, ServiceError};
use crate::executor::{Executor, ServiceOp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use sysinfo::{Pid, System};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceMetrics {
    pub service_name: String,
    pub main_pid: Option<u32>,
    pub process_count: u32,
    /// Percent of one core, summed over the tree
    pub cpu_usage: f32,
    /// Resident memory in bytes
    pub memory_usage: u64,
    pub memory_total: u64,
    pub disk_read: u64,
    pub disk_write: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct ProcessSample {
    process_count: u32,
    cpu_usage: f32,
    memory_usage: u64,
    memory_total: u64,
    disk_read: u64,
    disk_write: u64,
}

pub async fn collect_metrics(executor: &Executor, name: &str) -> Result<ServiceMetrics> {
    let known = executor.resolve(name)?;
    let result = executor.run_unprivileged(ServiceOp::QueryMainPid, known.name).await?;
    let main_pid = if result.success() {
        executor.control().parse_main_pid(&result)
    } else {
        None
    };

    let sample = match main_pid {
        Some(pid) => tokio::task::spawn_blocking(move || sample_tree(pid))
            .await
            .map_err(|e| ServiceError::ProbeUnavailable {
                service: known.name.to_string(),
                reason: e.to_string(),
            })?,
        None => ProcessSample::default(),
    };

    log::debug!(
        "Metrics for {}: pid {:?}, {} processes, {:.1}% cpu, {} bytes",
        known.name,
        main_pid,
        sample.process_count,
        sample.cpu_usage,
        sample.memory_usage
    );

    Ok(ServiceMetrics {
        service_name: known.name.to_string(),
        main_pid,
        process_count: sample.process_count,
        cpu_usage: sample.cpu_usage,
        memory_usage: sample.memory_usage,
        memory_total: sample.memory_total,
        disk_read: sample.disk_read,
        disk_write: sample.disk_write,
        timestamp: Utc::now(),
    })
}

fn sample_tree(main_pid: u32) -> ProcessSample {
    let mut system = System::new();
    system.refresh_memory();
    system.refresh_processes();
    // CPU usage is the delta between two refreshes
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    system.refresh_processes();

    let mut sample = ProcessSample {
        memory_total: system.total_memory(),
        ..ProcessSample::default()
    };

    let root = Pid::from_u32(main_pid);
    if system.process(root).is_none() {
        log::debug!("Main PID {} is gone", main_pid);
        return sample;
    }

    let parents = system.processes().iter().map(|(pid, p)| (*pid, p.parent()));
    for pid in process_tree(root, parents) {
        if let Some(process) = system.process(pid) {
            let disk = process.disk_usage();
            sample.process_count += 1;
            sample.cpu_usage += process.cpu_usage();
            sample.memory_usage += process.memory();
            sample.disk_read += disk.total_read_bytes;
            sample.disk_write += disk.total_written_bytes;
        }
    }
    sample
}

/**
 * `root` followed by every process whose parent chain reaches it
 */
fn process_tree(root: Pid, parents: impl Iterator<Item = (Pid, Option<Pid>)>) -> Vec<Pid> {
    let mut children: HashMap<Pid, Vec<Pid>> = HashMap::new();
    for (pid, parent) in parents {
        if let Some(parent) = parent {
            children.entry(parent).or_default().push(pid);
        }
    }

    let mut seen = HashSet::from([root]);
    let mut tree = vec![root];
    let mut next = 0;
    while next < tree.len() {
        if let Some(kids) = children.get(&tree[next]) {
            for kid in kids {
                if seen.insert(*kid) {
                    tree.push(*kid);
                }
            }
        }
        next += 1;
    }
    tree
}
