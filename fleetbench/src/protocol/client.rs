//! Server client trait and HTTP implementation.

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::error::ProtocolError;
use super::messages::{
    BadBenchReport, Directive, ErrorReport, HeartbeatRequest, NpsReport, RegisterRequest, ResultSubmission,
    ServerReply, Session, WorkloadRequest, WorkloadResponse,
};
use crate::aggregator::ResultReport;
use crate::scheduler::{Assignment, MachineInfo};
use crate::workload::{Side, WorkloadId};

/// Operations a worker performs against the server.
///
/// Telemetry calls (`submit_nps`, `submit_bad_bench`, `submit_error`,
/// `submit_pgn`) are best-effort; callers log and ignore their failures.
pub trait ServerClient: Send + Sync {
    /// Registers the machine and opens a session.
    fn register(&self, machine: &MachineInfo) -> impl Future<Output = Result<Session, ProtocolError>> + Send;

    /// Asks for work; `None` when nothing is eligible.
    fn request_workload(
        &self,
        session: &Session,
        blacklist: &[WorkloadId],
    ) -> impl Future<Output = Result<Option<Assignment>, ProtocolError>> + Send;

    fn submit_results(
        &self,
        session: &Session,
        assignment: &Assignment,
        report: &ResultReport,
    ) -> impl Future<Output = Result<Directive, ProtocolError>> + Send;

    fn submit_heartbeat(
        &self,
        session: &Session,
        assignment: &Assignment,
    ) -> impl Future<Output = Result<Directive, ProtocolError>> + Send;

    fn submit_nps(
        &self,
        session: &Session,
        assignment: &Assignment,
        dev_nps: u64,
        base_nps: u64,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Reports a bench that differs from the expected one.
    fn submit_bad_bench(
        &self,
        session: &Session,
        assignment: &Assignment,
        side: Side,
        bench: u64,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Reports a diagnostic event, optionally tied to one side of the match.
    fn submit_error(
        &self,
        session: &Session,
        assignment: &Assignment,
        side: Option<Side>,
        error: &str,
        logs: &str,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Uploads gzip-compressed PGNs of a finished assignment.
    fn submit_pgn(
        &self,
        session: &Session,
        assignment: &Assignment,
        compressed: Vec<u8>,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Downloads network weights hosted by the server.
    fn fetch_network(&self, engine: &str, network: &str) -> impl Future<Output = Result<Vec<u8>, ProtocolError>> + Send;

    /// Downloads an arbitrary URL, optionally with a bearer token.
    fn fetch(&self, url: &str, token: Option<&str>) -> impl Future<Output = Result<Vec<u8>, ProtocolError>> + Send;
}

/// `reqwest` implementation of [`ServerClient`].
///
/// Holds the account credentials; sessions are passed per call.
pub struct HttpServerClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl HttpServerClient {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProtocolError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("fleetbench-worker/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/worker/{}", self.base_url, path)
    }

    async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R, ProtocolError> {
        let response = self.http.post(self.endpoint(path)).json(body).send().await?;
        self.decode(path, response).await
    }

    async fn decode<R: DeserializeOwned>(&self, path: &str, response: reqwest::Response) -> Result<R, ProtocolError> {
        let status = response.status();
        let bytes = response.bytes().await?;

        debug!(endpoint = path, status = status.as_u16(), bytes = bytes.len(), "Server response");
        decode_body(path, status, &bytes)
    }

    async fn post_reply<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ServerReply, ProtocolError> {
        self.post::<B, ServerReply>(path, body).await?.into_result()
    }

    async fn get_bytes(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, ProtocolError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProtocolError::Http(format!("download returned {}", status)));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Error envelopes take priority over the status code and the expected body shape.
fn decode_body<R: DeserializeOwned>(path: &str, status: reqwest::StatusCode, bytes: &[u8]) -> Result<R, ProtocolError> {
    if let Ok(ServerReply { error: Some(message), .. }) = serde_json::from_slice::<ServerReply>(bytes) {
        return Err(ProtocolError::from_server_message(&message));
    }
    if !status.is_success() {
        return Err(ProtocolError::Http(format!("{} returned {}", path, status)));
    }
    Ok(serde_json::from_slice(bytes)?)
}

impl ServerClient for HttpServerClient {
    async fn register(&self, machine: &MachineInfo) -> Result<Session, ProtocolError> {
        let request = RegisterRequest {
            username: self.username.clone(),
            password: self.password.clone(),
            machine: machine.clone(),
        };
        let reply = self.post_reply("register", &request).await?;

        match (reply.machine_id, reply.secret) {
            (Some(machine_id), Some(secret)) => Ok(Session { machine_id, secret }),
            _ => Err(ProtocolError::Decode("registration reply without session".to_string())),
        }
    }

    async fn request_workload(
        &self,
        session: &Session,
        blacklist: &[WorkloadId],
    ) -> Result<Option<Assignment>, ProtocolError> {
        let request = WorkloadRequest {
            session: session.clone(),
            blacklist: blacklist.to_vec(),
        };
        let response: WorkloadResponse = self.post("workload", &request).await?;
        Ok(response.workload)
    }

    async fn submit_results(
        &self,
        session: &Session,
        assignment: &Assignment,
        report: &ResultReport,
    ) -> Result<Directive, ProtocolError> {
        let submission = ResultSubmission {
            session: session.clone(),
            workload_id: assignment.workload_id,
            result_id: assignment.result_id,
            report: report.clone(),
        };
        Ok(self.post_reply("results", &submission).await?.directive())
    }

    async fn submit_heartbeat(&self, session: &Session, assignment: &Assignment) -> Result<Directive, ProtocolError> {
        let request = HeartbeatRequest {
            session: session.clone(),
            workload_id: assignment.workload_id,
        };
        Ok(self.post_reply("heartbeat", &request).await?.directive())
    }

    async fn submit_nps(
        &self,
        session: &Session,
        assignment: &Assignment,
        dev_nps: u64,
        base_nps: u64,
    ) -> Result<(), ProtocolError> {
        let report = NpsReport {
            session: session.clone(),
            workload_id: assignment.workload_id,
            dev_nps,
            base_nps,
        };
        self.post_reply("nps", &report).await.map(|_| ())
    }

    async fn submit_bad_bench(
        &self,
        session: &Session,
        assignment: &Assignment,
        side: Side,
        bench: u64,
    ) -> Result<(), ProtocolError> {
        let report = BadBenchReport {
            session: session.clone(),
            workload_id: assignment.workload_id,
            side,
            bench,
        };
        self.post_reply("bad-bench", &report).await.map(|_| ())
    }

    async fn submit_error(
        &self,
        session: &Session,
        assignment: &Assignment,
        side: Option<Side>,
        error: &str,
        logs: &str,
    ) -> Result<(), ProtocolError> {
        let report = ErrorReport {
            session: session.clone(),
            workload_id: assignment.workload_id,
            side,
            error: error.to_string(),
            logs: logs.to_string(),
        };
        self.post_reply("error", &report).await.map(|_| ())
    }

    async fn submit_pgn(
        &self,
        session: &Session,
        assignment: &Assignment,
        compressed: Vec<u8>,
    ) -> Result<(), ProtocolError> {
        let games = reqwest::multipart::Part::bytes(compressed)
            .file_name(format!("{}.{}.pgn.gz", assignment.workload_id, assignment.result_id))
            .mime_str("application/gzip")?;
        let form = reqwest::multipart::Form::new()
            .text("machine_id", session.machine_id.to_string())
            .text("secret", session.secret.clone())
            .text("workload_id", assignment.workload_id.to_string())
            .text("result_id", assignment.result_id.to_string())
            .part("games", games);

        let response = self.http.post(self.endpoint("pgn")).multipart(form).send().await?;
        self.decode::<ServerReply>("pgn", response).await?.into_result().map(|_| ())
    }

    async fn fetch_network(&self, engine: &str, network: &str) -> Result<Vec<u8>, ProtocolError> {
        let url = self.endpoint(&format!("network/{}/{}", engine, network));
        let request = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "username": self.username, "password": self.password }));
        self.get_bytes(request).await
    }

    async fn fetch(&self, url: &str, token: Option<&str>) -> Result<Vec<u8>, ProtocolError> {
        let mut request = self.http.get(url);
        if let Some(token) = token {
            request = request.header(reqwest::header::AUTHORIZATION, format!("token {}", token));
        }
        self.get_bytes(request).await
    }
}
