//! Serving status and the pass/fail translation rule.

use std::fmt;

use serde::{Deserialize, Serialize};
use tonic_health::pb::health_check_response::ServingStatus as WireStatus;

use crate::error::ProxyError;

/// Backend-reported serving status, collapsed to the three values the proxy acts on.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServingStatus {
    #[default]
    Unknown = 0,
    Serving = 1,
    NotServing = 2,
}

impl From<u8> for ServingStatus {
    fn from(val: u8) -> Self {
        match val {
            1 => ServingStatus::Serving,
            2 => ServingStatus::NotServing,
            _ => ServingStatus::Unknown,
        }
    }
}

impl From<WireStatus> for ServingStatus {
    fn from(status: WireStatus) -> Self {
        match status {
            WireStatus::Serving => ServingStatus::Serving,
            WireStatus::NotServing => ServingStatus::NotServing,
            // SERVICE_UNKNOWN only exists on Watch streams; treat it like UNKNOWN.
            WireStatus::Unknown | WireStatus::ServiceUnknown => ServingStatus::Unknown,
        }
    }
}

impl ServingStatus {
    /// Gauge value exported for the cached status.
    pub fn as_gauge(self) -> f64 {
        self as u8 as f64
    }
}

impl fmt::Display for ServingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServingStatus::Unknown => "UNKNOWN",
            ServingStatus::Serving => "SERVING",
            ServingStatus::NotServing => "NOT_SERVING",
        };
        f.write_str(s)
    }
}

/// Backend sub-service to ask about. Empty means the backend as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TargetService(String);

impl TargetService {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the whole backend, not a named sub-service, is checked.
    pub fn is_whole_backend(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TargetService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_whole_backend() {
            f.write_str("<server>")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// Collapse a serving status into the load balancer's pass/fail answer.
pub fn translate(status: ServingStatus, service: &TargetService) -> Result<(), ProxyError> {
    match status {
        ServingStatus::Serving => Ok(()),
        ServingStatus::Unknown | ServingStatus::NotServing => Err(ProxyError::ServiceUnavailable {
            service: service.as_str().to_string(),
        }),
    }
}
