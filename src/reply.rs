use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{ExportError, Result};

pub(crate) const STATUS_READY: i64 = 0;
pub(crate) const STATUS_REJECTED: i64 = 4;
pub(crate) const STATUS_UNREGISTERED: i64 = 6;

/// Body of an `op=exp_request` reply.
#[derive(Debug, Deserialize)]
pub(crate) struct SubmitReply {
    #[serde(deserialize_with = "lenient_int")]
    pub(crate) status: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub(crate) requestid: Option<String>,
    #[serde(default)]
    pub(crate) error: Option<String>,
}

/// Body of an `op=exp_status` reply.
#[derive(Debug, Deserialize)]
pub(crate) struct StatusReply {
    #[serde(deserialize_with = "lenient_int")]
    pub(crate) status: i64,
    #[serde(default, deserialize_with = "lenient_opt_int")]
    pub(crate) wait: Option<i64>,
    #[serde(default)]
    pub(crate) dir: Option<String>,
    #[serde(default)]
    pub(crate) data: Option<Vec<StagedFile>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StagedFile {
    pub(crate) filename: String,
}

/// Snapshot of an export as reported by the status endpoint.
///
/// `dir` and `filenames` are only populated once `status` is 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportStatus {
    pub request_id: String,
    pub status: i64,
    /// Seconds the service expects staging to take, if it said.
    pub wait: Option<u64>,
    pub dir: Option<String>,
    pub filenames: Vec<String>,
}

impl ExportStatus {
    pub fn is_ready(&self) -> bool {
        self.status == STATUS_READY
    }
}

pub(crate) fn parse_submit(url: &str, body: &str) -> Result<SubmitReply> {
    serde_json::from_str(body)
        .map_err(|e| ExportError::malformed(url, format!("invalid submit reply: {e}")))
}

pub(crate) fn parse_status(url: &str, request_id: &str, body: &str) -> Result<ExportStatus> {
    let reply: StatusReply = serde_json::from_str(body)
        .map_err(|e| ExportError::malformed(url, format!("invalid status reply: {e}")))?;

    let mut status = ExportStatus {
        request_id: request_id.to_string(),
        status: reply.status,
        wait: reply.wait.map(i64::unsigned_abs),
        dir: None,
        filenames: Vec::new(),
    };

    if status.is_ready() {
        let dir = reply
            .dir
            .ok_or_else(|| ExportError::malformed(url, "ready reply has no `dir`"))?;
        let data = reply
            .data
            .ok_or_else(|| ExportError::malformed(url, "ready reply has no `data`"))?;
        status.dir = Some(dir);
        status.filenames = data.into_iter().map(|f| f.filename).collect();
    }

    Ok(status)
}

fn value_as_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// The service is not consistent about quoting numbers.
fn lenient_int<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<i64, D::Error> {
    let v = Value::deserialize(d)?;
    value_as_int(&v).ok_or_else(|| serde::de::Error::custom(format!("expected integer, got {v}")))
}

fn lenient_opt_int<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<i64>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.as_ref().and_then(value_as_int))
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(match v {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
