//! Wire messages.

use serde::{Deserialize, Serialize};

use super::error::ProtocolError;
use crate::aggregator::ResultReport;
use crate::scheduler::{Assignment, MachineInfo};
use crate::workload::{ApplyOutcome, Side, WorkloadId};

/// Per-process session issued on registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub machine_id: u64,
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub machine: MachineInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadRequest {
    #[serde(flatten)]
    pub session: Session,
    /// Workloads that failed on this worker during the current session.
    #[serde(default)]
    pub blacklist: Vec<WorkloadId>,
}

/// Empty when no workload is eligible.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkloadResponse {
    #[serde(default)]
    pub workload: Option<Assignment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSubmission {
    #[serde(flatten)]
    pub session: Session,
    pub workload_id: WorkloadId,
    pub result_id: u64,
    #[serde(flatten)]
    pub report: ResultReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    #[serde(flatten)]
    pub session: Session,
    pub workload_id: WorkloadId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpsReport {
    #[serde(flatten)]
    pub session: Session,
    pub workload_id: WorkloadId,
    pub dev_nps: u64,
    pub base_nps: u64,
}

/// Bench mismatch of one side; `bench` is 0 when runs disagreed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadBenchReport {
    #[serde(flatten)]
    pub session: Session,
    pub workload_id: WorkloadId,
    pub side: Side,
    pub bench: u64,
}

/// Diagnostic event: build failures, missing artifacts and abnormal game
/// terminations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    #[serde(flatten)]
    pub session: Session,
    pub workload_id: WorkloadId,
    #[serde(default)]
    pub side: Option<Side>,
    pub error: String,
    #[serde(default)]
    pub logs: String,
}

/// Generic reply envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stop: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl ServerReply {
    pub fn stop() -> Self {
        Self {
            stop: true,
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Maps an `error` envelope to a [`ProtocolError`].
    pub fn into_result(self) -> Result<Self, ProtocolError> {
        match self.error.as_deref() {
            Some(message) => Err(ProtocolError::from_server_message(message)),
            None => Ok(self),
        }
    }

    pub fn directive(&self) -> Directive {
        if self.stop {
            Directive::Stop
        } else {
            Directive::Continue
        }
    }
}

/// Server answer to a result or heartbeat report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Continue,
    Stop,
}

impl From<ApplyOutcome> for Directive {
    fn from(outcome: ApplyOutcome) -> Self {
        match outcome {
            ApplyOutcome::Continue => Directive::Continue,
            ApplyOutcome::Stop => Directive::Stop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session {
            machine_id: 7,
            secret: "s3cret".to_string(),
        }
    }

    #[test]
    fn test_submission_is_flat() {
        let submission = ResultSubmission {
            session: session(),
            workload_id: 3,
            result_id: 9,
            report: ResultReport {
                trinomial: [1, 2, 3],
                pentanomial: [0, 1, 1, 1, 0],
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&submission).unwrap();
        assert_eq!(json["machine_id"], 7);
        assert_eq!(json["workload_id"], 3);
        assert_eq!(json["trinomial"][2], 3);
        assert_eq!(json["pentanomial"][3], 1);
    }

    #[test]
    fn test_reply_envelope() {
        let reply: ServerReply = serde_json::from_str(r#"{"stop": true}"#).unwrap();
        assert_eq!(reply.directive(), Directive::Stop);

        let reply: ServerReply = serde_json::from_str("{}").unwrap();
        assert_eq!(reply.clone().into_result().unwrap().directive(), Directive::Continue);

        let reply: ServerReply = serde_json::from_str(r#"{"error": "Bad Client Version"}"#).unwrap();
        assert_eq!(reply.into_result().unwrap_err(), ProtocolError::BadClientVersion);
    }

    #[test]
    fn test_empty_workload_response() {
        let response: WorkloadResponse = serde_json::from_str("{}").unwrap();
        assert!(response.workload.is_none());
    }
}
