//! JSON-RPC client for an engine process speaking over stdin/stdout.
//!
//! The engine is spawned once per client and receives one request per line.
//! A helper thread reads stdout into a channel so calls can time out; the
//! engine's stderr is forwarded to `tracing` under the `engine` target.
//!
//! # Configuration
//!
//! The engine command is resolved in priority order:
//! 1. `--engine` CLI flag
//! 2. `engine_command` in the config file
//! 3. `SCREENFLOW_ENGINE_COMMAND` environment variable
use super::protocol::{JsonRpcRequest, JsonRpcResponse};
use super::types::{
    lenient_state, BackingRecord, DecisionChange, DecisionReceipt, DecisionSubmission,
    EnrichReport, QueuePage, StatusReport, UpdateDecisionsReport,
};
use super::ReviewEngine;
use crate::error::EngineError;
use crate::queue::{Decision, QueueKind};
use crate::status::{Operation, OperationFacts, RecordState};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// Largest page the engine serves from `get_records`.
const RECORDS_PAGE_LIMIT: usize = 500;

/// How long a closed-stdin engine gets to exit before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct StdioEngineConfig {
    /// The command to spawn (parsed via shell-words).
    pub command: String,
    pub project_id: String,
    pub base_path: PathBuf,
    /// `None` waits indefinitely.
    pub call_timeout: Option<Duration>,
}

impl StdioEngineConfig {
    pub fn new(
        command: impl Into<String>,
        project_id: impl Into<String>,
        base_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            command: command.into(),
            project_id: project_id.into(),
            base_path: base_path.into(),
            call_timeout: None,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }
}

enum ReaderEvent {
    Line(String),
    Failed(String),
}

/// A spawned engine process.
pub struct StdioEngine {
    config: StdioEngineConfig,
    child: Child,
    stdin: Option<ChildStdin>,
    responses: Receiver<ReaderEvent>,
    next_id: u64,
}

impl fmt::Debug for StdioEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdioEngine")
            .field("command", &self.config.command)
            .field("project_id", &self.config.project_id)
            .field("pid", &self.child.id())
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl StdioEngine {
    pub fn spawn(config: StdioEngineConfig) -> Result<Self, EngineError> {
        let args = shell_words::split(&config.command).map_err(|err| {
            EngineError::Transport(format!("parse engine command {:?}: {err}", config.command))
        })?;
        let Some((program, rest)) = args.split_first() else {
            return Err(EngineError::Transport("engine command is empty".to_string()));
        };
        let program_path = which::which(program)
            .map_err(|err| EngineError::Transport(format!("engine executable {program}: {err}")))?;

        let mut child = Command::new(&program_path)
            .args(rest)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| EngineError::Transport(format!("spawn engine {program}: {err}")))?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Transport("engine stdout unavailable".to_string()))?;
        let (sender, responses) = mpsc::channel();
        thread::Builder::new()
            .name("engine-stdout".to_string())
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    let event = match line {
                        Ok(line) => ReaderEvent::Line(line),
                        Err(err) => ReaderEvent::Failed(err.to_string()),
                    };
                    let failed = matches!(event, ReaderEvent::Failed(_));
                    if sender.send(event).is_err() || failed {
                        break;
                    }
                }
            })
            .map_err(|err| EngineError::Transport(format!("start stdout reader: {err}")))?;

        if let Some(stderr) = child.stderr.take() {
            thread::Builder::new()
                .name("engine-stderr".to_string())
                .spawn(move || {
                    for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                        tracing::debug!(target: "engine", "{line}");
                    }
                })
                .map_err(|err| EngineError::Transport(format!("start stderr reader: {err}")))?;
        }

        tracing::info!(
            command = %config.command,
            pid = child.id(),
            project_id = %config.project_id,
            "engine spawned"
        );
        Ok(Self {
            config,
            child,
            stdin,
            responses,
            next_id: 1,
        })
    }

    pub fn config(&self) -> &StdioEngineConfig {
        &self.config
    }

    /// Send one request and decode its `result`.
    fn call<R: DeserializeOwned>(&mut self, method: &str, params: Value) -> Result<R, EngineError> {
        let value = self.call_value(method, params)?;
        serde_json::from_value(value).map_err(|err| EngineError::Protocol {
            method: method.to_string(),
            detail: err.to_string(),
        })
    }

    fn call_value(&mut self, method: &str, params: Value) -> Result<Value, EngineError> {
        let id = self.next_id;
        self.next_id += 1;
        let request = JsonRpcRequest::new(id, method, self.with_project(method, params));
        let line = serde_json::to_string(&request).map_err(|err| EngineError::Protocol {
            method: method.to_string(),
            detail: format!("encode request: {err}"),
        })?;

        let start = Instant::now();
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| EngineError::Transport("engine stdin closed".to_string()))?;
        writeln!(stdin, "{line}")
            .and_then(|()| stdin.flush())
            .map_err(|err| EngineError::Transport(format!("write {method} request: {err}")))?;

        let response = self.await_response(method, id, start)?;
        tracing::debug!(
            method,
            id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            ok = response.error.is_none(),
            "engine call complete"
        );

        if let Some(error) = response.error {
            return Err(EngineError::Rpc {
                method: method.to_string(),
                code: error.code,
                data: error.data_text(),
                message: error.message,
            });
        }
        response.result.ok_or_else(|| EngineError::Protocol {
            method: method.to_string(),
            detail: "response has neither result nor error".to_string(),
        })
    }

    fn await_response(
        &mut self,
        method: &str,
        id: u64,
        start: Instant,
    ) -> Result<JsonRpcResponse, EngineError> {
        let deadline = self.config.call_timeout.map(|timeout| start + timeout);
        loop {
            let event = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match self.responses.recv_timeout(remaining) {
                        Ok(event) => event,
                        Err(RecvTimeoutError::Timeout) => {
                            return Err(EngineError::Timeout {
                                method: method.to_string(),
                                timeout_ms: self
                                    .config
                                    .call_timeout
                                    .map(|timeout| timeout.as_millis() as u64)
                                    .unwrap_or(0),
                            })
                        }
                        Err(RecvTimeoutError::Disconnected) => return Err(closed(method)),
                    }
                }
                None => self.responses.recv().map_err(|_| closed(method))?,
            };

            let line = match event {
                ReaderEvent::Line(line) => line,
                ReaderEvent::Failed(err) => {
                    return Err(EngineError::Transport(format!("read engine stdout: {err}")))
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let response: JsonRpcResponse =
                serde_json::from_str(&line).map_err(|err| EngineError::Protocol {
                    method: method.to_string(),
                    detail: format!("decode response line: {err}"),
                })?;
            match response.id {
                Some(found) if found != id => {
                    tracing::warn!(method, expected = id, found, "discarding stale engine response");
                }
                // A null id answers a request the engine could not parse.
                _ => return Ok(response),
            }
        }
    }

    fn with_project(&self, method: &str, params: Value) -> Value {
        let mut object = match params {
            Value::Object(object) => object,
            Value::Null => Map::new(),
            other => return other,
        };
        if method != "ping" {
            object.insert("project_id".to_string(), json!(self.config.project_id));
            object.insert(
                "base_path".to_string(),
                json!(self.config.base_path.display().to_string()),
            );
        }
        Value::Object(object)
    }

    /// Close stdin, give the engine a moment to exit, then kill it.
    pub fn shutdown(&mut self) {
        drop(self.stdin.take());
        let deadline = Instant::now() + SHUTDOWN_GRACE;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    tracing::info!(%status, "engine exited");
                    return;
                }
                Ok(None) if Instant::now() < deadline => {
                    thread::sleep(Duration::from_millis(20));
                }
                Ok(None) | Err(_) => break,
            }
        }
        tracing::warn!("engine did not exit after stdin closed; killing it");
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for StdioEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn closed(method: &str) -> EngineError {
    EngineError::Transport(format!("engine closed stdout during {method}"))
}

#[derive(Deserialize)]
struct Pong {
    status: String,
}

#[derive(Deserialize)]
struct StatusEnvelope {
    status: StatusReport,
}

#[derive(Deserialize)]
struct RecordEnvelope {
    record: BackingRecord,
}

#[derive(Deserialize)]
struct RecordsPage {
    #[serde(default)]
    records: Vec<BackingRecord>,
    #[serde(default)]
    pagination: Pagination,
}

#[derive(Deserialize, Default)]
struct Pagination {
    #[serde(default)]
    has_more: bool,
}

#[derive(Deserialize)]
struct DecisionEnvelope {
    details: DecisionDetails,
}

#[derive(Deserialize)]
struct DecisionDetails {
    record: DecidedRecord,
    #[serde(default)]
    remaining_count: Option<u64>,
}

#[derive(Deserialize)]
struct DecidedRecord {
    id: String,
    decision: Decision,
    #[serde(default, deserialize_with = "lenient_state")]
    new_status: Option<RecordState>,
}

impl ReviewEngine for StdioEngine {
    fn ping(&mut self) -> Result<(), EngineError> {
        let pong: Pong = self.call("ping", Value::Null)?;
        if pong.status != "pong" {
            return Err(EngineError::Protocol {
                method: "ping".to_string(),
                detail: format!("unexpected ping status {:?}", pong.status),
            });
        }
        Ok(())
    }

    fn get_status(&mut self) -> Result<StatusReport, EngineError> {
        let envelope: StatusEnvelope = self.call("get_status", Value::Null)?;
        Ok(envelope.status)
    }

    fn get_operation_info(&mut self, operation: Operation) -> Result<OperationFacts, EngineError> {
        self.call(
            "get_operation_info",
            json!({ "operation": operation.as_str() }),
        )
    }

    fn get_queue(&mut self, kind: QueueKind, limit: usize) -> Result<QueuePage, EngineError> {
        let method = match kind {
            QueueKind::Prescreen => "get_prescreen_queue",
            QueueKind::Screen => "get_screen_queue",
        };
        self.call(method, json!({ "limit": limit }))
    }

    fn get_record(&mut self, record_id: &str) -> Result<BackingRecord, EngineError> {
        let envelope: RecordEnvelope = self.call("get_record", json!({ "record_id": record_id }))?;
        Ok(envelope.record)
    }

    fn get_records(&mut self, states: &[RecordState]) -> Result<Vec<BackingRecord>, EngineError> {
        let status: Vec<&str> = states.iter().map(RecordState::as_str).collect();
        let mut records = Vec::new();
        let mut offset = 0;
        loop {
            let page: RecordsPage = self.call(
                "get_records",
                json!({
                    "filters": { "status": status },
                    "pagination": { "offset": offset, "limit": RECORDS_PAGE_LIMIT },
                }),
            )?;
            let fetched = page.records.len();
            records.extend(page.records);
            if !page.pagination.has_more || fetched == 0 {
                break;
            }
            offset += fetched;
        }
        Ok(records)
    }

    fn submit_decision(
        &mut self,
        kind: QueueKind,
        submission: &DecisionSubmission,
    ) -> Result<DecisionReceipt, EngineError> {
        let method = match kind {
            QueueKind::Prescreen => "prescreen_record",
            QueueKind::Screen => "screen_record",
        };
        let params = serde_json::to_value(submission).map_err(|err| EngineError::Protocol {
            method: method.to_string(),
            detail: format!("encode submission: {err}"),
        })?;
        let envelope: DecisionEnvelope = self.call(method, params)?;
        let details = envelope.details;
        Ok(DecisionReceipt {
            record_id: details.record.id,
            decision: details.record.decision,
            new_status: details.record.new_status,
            remaining_count: details.remaining_count,
        })
    }

    fn update_screen_decisions(
        &mut self,
        changes: &[DecisionChange],
    ) -> Result<UpdateDecisionsReport, EngineError> {
        self.call("update_screen_decisions", json!({ "changes": changes }))
    }

    fn batch_enrich_records(&mut self, record_ids: &[String]) -> Result<EnrichReport, EngineError> {
        self.call("batch_enrich_records", json!({ "record_ids": record_ids }))
    }
}
