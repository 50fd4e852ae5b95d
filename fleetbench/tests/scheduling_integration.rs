//! Integration tests for fleet-wide scheduling.
//!
//! These tests drive the scheduler the way the server does: every machine
//! in a simulated fleet requests work in turn, and the resulting thread
//! distribution is compared against the workloads' throughput weights.
//!
//! Run with: `cargo test --test scheduling_integration`

use rand::rngs::StdRng;
use rand::SeedableRng;

use fleetbench::scheduler::{Machine, MachineInfo, Scheduler, WorkerDistribution};
use fleetbench::workload::{
    Adjudication, BookSpec, EngineSpec, ResultRecord, Workload, WorkloadId, WorkloadMode, WorkloadProgress,
    WorkloadStatus,
};

// ============================================================================
// Fixtures
// ============================================================================

fn engine(name: &str) -> EngineSpec {
    EngineSpec {
        engine: "Ethereal".to_string(),
        name: name.to_string(),
        source: format!("https://example.com/Ethereal/archive/{}.zip", name),
        sha: "0123456789abcdef0123456789abcdef01234567".to_string(),
        bench: 4_506_523,
        options: "Threads=1 Hash=16".to_string(),
        network: None,
        netname: None,
        time_control: "10+0.1".parse().unwrap(),
        nps: 1_000_000,
        private: false,
        build_path: "src".to_string(),
    }
}

fn workload(id: WorkloadId, throughput: u32) -> Workload {
    Workload {
        id,
        dev: engine("dev-branch"),
        base: engine("master"),
        book: BookSpec {
            name: "UHO_4060_v2.epd".to_string(),
            sha: "abc".to_string(),
            source: "https://example.com/books/UHO_4060_v2.epd.zip".to_string(),
        },
        adjudication: Adjudication::default(),
        mode: WorkloadMode::Sprt {
            elo0: 0.0,
            elo1: 5.0,
            alpha: 0.05,
            beta: 0.05,
        },
        priority: 0,
        throughput,
        max_workers: None,
        max_threads: None,
        workload_size: 32,
        upload_pgns: false,
        status: WorkloadStatus::Active,
        book_index: 0,
        progress: WorkloadProgress::default(),
    }
}

fn fleet(size: u64, threads: u32) -> Vec<Machine> {
    (1..=size)
        .map(|id| {
            Machine::new(
                id,
                MachineInfo {
                    threads,
                    sockets: 1,
                    physical_cores: threads,
                    logical_cores: threads * 2,
                    client_version: fleetbench::protocol::CLIENT_VERSION,
                    ..Default::default()
                },
            )
        })
        .collect()
}

/// Lets every machine request work once, in order.
fn request_round(
    scheduler: &Scheduler,
    machines: &mut [Machine],
    workloads: &mut [Workload],
    records: &mut Vec<ResultRecord>,
    rng: &mut StdRng,
) {
    for i in 0..machines.len() {
        let mut machine = machines[i].clone();
        let assignment = scheduler.assign(&mut machine, workloads, machines, records, &[], rng);
        assert!(assignment.is_some(), "machine {} got no work", machine.id);
        machines[i] = machine;
    }
}

fn threads_on(machines: &[Machine], workload: WorkloadId) -> u32 {
    machines
        .iter()
        .filter(|m| m.workload == Some(workload))
        .map(|m| m.info.threads)
        .sum()
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_threads_follow_throughput_weights() {
    let scheduler = Scheduler::default();
    let mut rng = StdRng::seed_from_u64(7);
    let mut workloads = vec![workload(1, 100), workload(2, 300)];
    let mut machines = fleet(40, 8);
    let mut records = Vec::new();

    request_round(&scheduler, &mut machines, &mut workloads, &mut records, &mut rng);

    assert_eq!(threads_on(&machines, 1), 80);
    assert_eq!(threads_on(&machines, 2), 240);
    assert_eq!(records.len(), 40);
}

#[test]
fn test_balanced_fleet_keeps_its_assignments() {
    let scheduler = Scheduler::default();
    let mut rng = StdRng::seed_from_u64(11);
    let mut workloads = vec![workload(1, 100), workload(2, 300)];
    let mut machines = fleet(40, 8);
    let mut records = Vec::new();

    request_round(&scheduler, &mut machines, &mut workloads, &mut records, &mut rng);
    let first: Vec<Option<WorkloadId>> = machines.iter().map(|m| m.workload).collect();

    request_round(&scheduler, &mut machines, &mut workloads, &mut records, &mut rng);
    let second: Vec<Option<WorkloadId>> = machines.iter().map(|m| m.workload).collect();

    assert_eq!(first, second);
    // Records are reused per (workload, machine).
    assert_eq!(records.len(), 40);
}

#[test]
fn test_new_workload_draws_idle_capacity() {
    let scheduler = Scheduler::default();
    let mut rng = StdRng::seed_from_u64(3);
    let mut workloads = vec![workload(1, 100)];
    let mut machines = fleet(10, 8);
    let mut records = Vec::new();

    request_round(&scheduler, &mut machines, &mut workloads, &mut records, &mut rng);
    assert_eq!(threads_on(&machines, 1), 80);

    // A second, equally weighted workload has no threads yet, so the next
    // requester is moved to it regardless of stickiness.
    workloads.push(workload(2, 100));
    let mut machine = machines[0].clone();
    let assignment = scheduler
        .assign(&mut machine, &mut workloads, &machines, &mut records, &[], &mut rng)
        .unwrap();
    assert_eq!(assignment.workload_id, 2);
}

#[test]
fn test_finished_and_blacklisted_workloads_are_skipped() {
    let scheduler = Scheduler::default();
    let mut rng = StdRng::seed_from_u64(5);
    let mut finished = workload(1, 1000);
    finished.status = WorkloadStatus::Passed;
    let workloads = vec![finished, workload(2, 100), workload(3, 100)];
    let machines = fleet(1, 8);
    let distribution = WorkerDistribution::build(&workloads, &machines, 1);

    let picked = scheduler
        .select_workload(&machines[0], &workloads, &distribution, &[2], &mut rng)
        .unwrap();
    assert_eq!(picked.id, 3);

    assert!(scheduler
        .select_workload(&machines[0], &workloads, &distribution, &[2, 3], &mut rng)
        .is_none());
}

#[test]
fn test_thread_ceiling_caps_assignments() {
    let scheduler = Scheduler::default();
    let mut rng = StdRng::seed_from_u64(9);
    let mut capped = workload(1, 1000);
    capped.max_threads = Some(16);
    let mut workloads = vec![capped, workload(2, 10)];
    let mut machines = fleet(6, 8);
    let mut records = Vec::new();

    request_round(&scheduler, &mut machines, &mut workloads, &mut records, &mut rng);

    assert_eq!(threads_on(&machines, 1), 16);
    assert_eq!(threads_on(&machines, 2), 32);
}
