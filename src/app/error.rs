use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Serialize)]
pub struct BridgeError {
    pub error: String,
    pub code: String,
    pub trace_id: String,
}

impl BridgeError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        trace_id: impl Into<String>,
    ) -> Self {
        Self {
            error: message.into(),
            code: code.into(),
            trace_id: trace_id.into(),
        }
    }

    /// The bridge shell subprocess could not be launched at all.
    pub fn process_start(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_PROCESS_START", message, trace_id)
    }

    /// The subprocess did not exit within the allowed bound.
    pub fn timeout(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_TIMEOUT", message, trace_id)
    }

    /// A terminal line was present but did not match the expected grammar.
    /// Never downgraded to a default value; a silent zero would misreport
    /// data loss.
    pub fn malformed(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_MALFORMED", message, trace_id)
    }

    /// All authorization attempts were used up without the device accepting.
    pub fn auth_exhausted(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_AUTH_EXHAUSTED", message, trace_id)
    }

    pub fn validation(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_VALIDATION", message, trace_id)
    }

    pub fn system(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_SYSTEM", message, trace_id)
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.code)
    }
}

impl std::error::Error for BridgeError {}
