//! Fixtures shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::aggregator::ResultReport;
use crate::protocol::{Directive, ProtocolError, ServerClient, Session};
use crate::scheduler::{build_assignment, Assignment, MachineInfo};
use crate::stats::spsa::SpsaSchedule;
use crate::workload::{
    Adjudication, BookSpec, EngineSpec, ReportingType, SpsaDistribution, SpsaParameter, SpsaRun,
    ResultRecord, Side, Workload, WorkloadId, WorkloadMode, WorkloadProgress, WorkloadStatus,
};

pub fn sample_engine(name: &str) -> EngineSpec {
    EngineSpec {
        engine: "Ethereal".to_string(),
        name: name.to_string(),
        source: format!("https://example.com/Ethereal/archive/{}.zip", name),
        sha: "0123456789abcdef0123456789abcdef01234567".to_string(),
        bench: 4_506_523,
        options: "Threads=1 Hash=16".to_string(),
        network: None,
        netname: None,
        time_control: "10+0.1".parse().expect("valid time control"),
        nps: 1_000_000,
        private: false,
        build_path: "src".to_string(),
    }
}

pub fn sample_workload(id: u64) -> Workload {
    Workload {
        id,
        dev: sample_engine("dev-branch"),
        base: sample_engine("master"),
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
        throughput: 100,
        max_workers: None,
        max_threads: None,
        workload_size: 32,
        upload_pgns: false,
        status: WorkloadStatus::Active,
        book_index: 0,
        progress: WorkloadProgress::default(),
    }
}

pub fn spsa_workload(id: u64) -> Workload {
    let schedule = SpsaSchedule {
        iterations: 1000,
        pairs_per: 8,
        a_ratio: 0.1,
        alpha: 0.602,
        gamma: 0.101,
    };
    let mut workload = sample_workload(id);
    workload.mode = WorkloadMode::Spsa(SpsaRun {
        schedule,
        distribution: SpsaDistribution::Single,
        reporting: ReportingType::Batched,
        parameters: vec![
            SpsaParameter::new("Alpha", false, 10.0, 0.0, 20.0, 2.0, 0.002, &schedule),
            SpsaParameter::new("Beta", true, 0.5, 0.0, 1.0, 0.05, 0.002, &schedule),
        ],
    });
    workload
}

pub fn sample_machine_info() -> MachineInfo {
    MachineInfo {
        supported_engines: vec!["Ethereal".to_string()],
        syzygy_max: 0,
        threads: 8,
        sockets: 1,
        physical_cores: 8,
        logical_cores: 16,
        cpu_flags: vec!["AVX2".to_string(), "BMI2".to_string(), "POPCNT".to_string()],
        cpu_name: "AMD EPYC 7B12".to_string(),
        os_name: "Linux".to_string(),
        identity: None,
        machine_id: None,
        client_version: crate::protocol::CLIENT_VERSION,
    }
}

pub fn sample_assignment(workload: &mut Workload) -> Assignment {
    let record = ResultRecord::new(7, workload.id, 1);
    let mut rng = StdRng::seed_from_u64(42);
    build_assignment(workload, &record, &sample_machine_info(), &mut rng)
}

/// A request the fake server received.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Register,
    RequestWorkload(Vec<WorkloadId>),
    Results(ResultReport),
    Heartbeat,
    Nps { dev: u64, base: u64 },
    BadBench { side: Side, bench: u64 },
    Error { side: Option<Side>, error: String },
    Pgn(usize),
    FetchNetwork(String),
    Fetch { url: String, token: Option<String> },
}

/// Scripted in-memory server.
///
/// Queued replies are consumed in order; once a queue is empty the server
/// registers machine 1, has no work and answers reports with `Continue`.
#[derive(Default)]
pub struct FakeServer {
    pub calls: Mutex<Vec<Call>>,
    pub downloads: Mutex<HashMap<String, Vec<u8>>>,
    pub networks: Mutex<HashMap<String, Vec<u8>>>,
    pub registrations: Mutex<VecDeque<Result<Session, ProtocolError>>>,
    pub workloads: Mutex<VecDeque<Result<Option<Assignment>, ProtocolError>>>,
    pub directives: Mutex<VecDeque<Result<Directive, ProtocolError>>>,
}

impl FakeServer {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reports(&self) -> Vec<ResultReport> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Results(report) => Some(report),
                _ => None,
            })
            .collect()
    }

    pub fn heartbeats(&self) -> usize {
        self.calls().iter().filter(|c| **c == Call::Heartbeat).count()
    }

    pub fn serve(&self, url: &str, bytes: Vec<u8>) {
        self.downloads.lock().unwrap().insert(url.to_string(), bytes);
    }

    pub fn queue_directive(&self, directive: Result<Directive, ProtocolError>) {
        self.directives.lock().unwrap().push_back(directive);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_directive(&self) -> Result<Directive, ProtocolError> {
        self.directives
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Directive::Continue))
    }
}

impl ServerClient for FakeServer {
    async fn register(&self, _machine: &MachineInfo) -> Result<Session, ProtocolError> {
        self.record(Call::Register);
        self.registrations.lock().unwrap().pop_front().unwrap_or(Ok(Session {
            machine_id: 1,
            secret: "secret".to_string(),
        }))
    }

    async fn request_workload(
        &self,
        _session: &Session,
        blacklist: &[WorkloadId],
    ) -> Result<Option<Assignment>, ProtocolError> {
        self.record(Call::RequestWorkload(blacklist.to_vec()));
        self.workloads.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }

    async fn submit_results(
        &self,
        _session: &Session,
        _assignment: &Assignment,
        report: &ResultReport,
    ) -> Result<Directive, ProtocolError> {
        let reply = self.next_directive();
        if reply.is_ok() {
            self.record(Call::Results(report.clone()));
        }
        reply
    }

    async fn submit_heartbeat(&self, _session: &Session, _assignment: &Assignment) -> Result<Directive, ProtocolError> {
        self.record(Call::Heartbeat);
        self.next_directive()
    }

    async fn submit_nps(
        &self,
        _session: &Session,
        _assignment: &Assignment,
        dev_nps: u64,
        base_nps: u64,
    ) -> Result<(), ProtocolError> {
        self.record(Call::Nps {
            dev: dev_nps,
            base: base_nps,
        });
        Ok(())
    }

    async fn submit_bad_bench(
        &self,
        _session: &Session,
        _assignment: &Assignment,
        side: Side,
        bench: u64,
    ) -> Result<(), ProtocolError> {
        self.record(Call::BadBench { side, bench });
        Ok(())
    }

    async fn submit_error(
        &self,
        _session: &Session,
        _assignment: &Assignment,
        side: Option<Side>,
        error: &str,
        _logs: &str,
    ) -> Result<(), ProtocolError> {
        self.record(Call::Error {
            side,
            error: error.to_string(),
        });
        Ok(())
    }

    async fn submit_pgn(
        &self,
        _session: &Session,
        _assignment: &Assignment,
        compressed: Vec<u8>,
    ) -> Result<(), ProtocolError> {
        self.record(Call::Pgn(compressed.len()));
        Ok(())
    }

    async fn fetch_network(&self, _engine: &str, network: &str) -> Result<Vec<u8>, ProtocolError> {
        self.record(Call::FetchNetwork(network.to_string()));
        self.networks
            .lock()
            .unwrap()
            .get(network)
            .cloned()
            .ok_or_else(|| ProtocolError::Http(format!("no network {}", network)))
    }

    async fn fetch(&self, url: &str, token: Option<&str>) -> Result<Vec<u8>, ProtocolError> {
        self.record(Call::Fetch {
            url: url.to_string(),
            token: token.map(String::from),
        });
        self.downloads
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| ProtocolError::Http(format!("{} returned 404 Not Found", url)))
    }
}

/// Zip archive holding `files` (path, content), stored uncompressed.
pub fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
