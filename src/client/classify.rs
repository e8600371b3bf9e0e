use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal status of a remote call, using the gRPC code space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallStatus {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl CallStatus {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => CallStatus::Ok,
            1 => CallStatus::Cancelled,
            3 => CallStatus::InvalidArgument,
            4 => CallStatus::DeadlineExceeded,
            5 => CallStatus::NotFound,
            6 => CallStatus::AlreadyExists,
            7 => CallStatus::PermissionDenied,
            8 => CallStatus::ResourceExhausted,
            9 => CallStatus::FailedPrecondition,
            10 => CallStatus::Aborted,
            11 => CallStatus::OutOfRange,
            12 => CallStatus::Unimplemented,
            13 => CallStatus::Internal,
            14 => CallStatus::Unavailable,
            15 => CallStatus::DataLoss,
            16 => CallStatus::Unauthenticated,
            _ => CallStatus::Unknown,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            CallStatus::Ok => 0,
            CallStatus::Cancelled => 1,
            CallStatus::Unknown => 2,
            CallStatus::InvalidArgument => 3,
            CallStatus::DeadlineExceeded => 4,
            CallStatus::NotFound => 5,
            CallStatus::AlreadyExists => 6,
            CallStatus::PermissionDenied => 7,
            CallStatus::ResourceExhausted => 8,
            CallStatus::FailedPrecondition => 9,
            CallStatus::Aborted => 10,
            CallStatus::OutOfRange => 11,
            CallStatus::Unimplemented => 12,
            CallStatus::Internal => 13,
            CallStatus::Unavailable => 14,
            CallStatus::DataLoss => 15,
            CallStatus::Unauthenticated => 16,
        }
    }
}

impl From<StatusCode> for CallStatus {
    fn from(status: StatusCode) -> Self {
        match status.as_u16() {
            200..=299 => CallStatus::Ok,
            400 => CallStatus::InvalidArgument,
            401 => CallStatus::Unauthenticated,
            402 => CallStatus::FailedPrecondition,
            403 => CallStatus::PermissionDenied,
            404 => CallStatus::NotFound,
            408 | 504 => CallStatus::DeadlineExceeded,
            409 => CallStatus::Aborted,
            429 => CallStatus::ResourceExhausted,
            501 => CallStatus::Unimplemented,
            502 | 503 => CallStatus::Unavailable,
            500..=599 => CallStatus::Internal,
            _ => CallStatus::Unknown,
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// How a failed call should be presented to the person who made it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCategory {
    HighLoad,
    Unavailable,
    Generic,
}

impl FailureCategory {
    pub fn user_message(&self, detail: &str) -> String {
        match self {
            FailureCategory::HighLoad => {
                "Service is under high load, please try again later".to_string()
            }
            FailureCategory::Unavailable => {
                "Service is temporary unavailable, please try again later".to_string()
            }
            FailureCategory::Generic => detail.to_string(),
        }
    }

    /// Whether a caller may run the payment decision again and retry.
    pub fn is_transient(&self) -> bool {
        !matches!(self, FailureCategory::Generic)
    }
}

pub fn classify(status: CallStatus) -> FailureCategory {
    match status {
        CallStatus::ResourceExhausted | CallStatus::DeadlineExceeded => FailureCategory::HighLoad,
        CallStatus::Unavailable => FailureCategory::Unavailable,
        _ => FailureCategory::Generic,
    }
}

/// Status-to-category mapping used by call sites that hold a classifier
/// value rather than calling [`classify`] directly.
#[derive(Clone, Copy, Debug, Default)]
pub struct CallFailureClassifier;

impl CallFailureClassifier {
    pub fn classify(&self, status: CallStatus) -> FailureCategory {
        classify(status)
    }
}
