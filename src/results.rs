// Uniform value objects returned to outer surfaces
//
// Business failures are folded into `success: false` values. Backing-store
// failures are not: `from_result` hands them back as `Err` so the caller
// escalates instead of rendering them as an ordinary rejection.

use serde::Serialize;

use crate::errors::DeskError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MutationResult<T> {
    Ok {
        success: bool,
        data: T,
    },
    Failed {
        success: bool,
        error: String,
        #[serde(rename = "errorKind")]
        error_kind: String,
    },
}

impl<T> MutationResult<T> {
    pub fn ok(data: T) -> Self {
        MutationResult::Ok { success: true, data }
    }

    pub fn failed(error: &DeskError) -> Self {
        MutationResult::Failed {
            success: false,
            error: error.to_string(),
            error_kind: error.code().to_string(),
        }
    }

    pub fn from_result(result: Result<T, DeskError>) -> Result<Self, DeskError> {
        match result {
            Ok(data) => Ok(Self::ok(data)),
            Err(e) if e.is_recoverable() => Ok(Self::failed(&e)),
            Err(e) => Err(e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, MutationResult::Ok { .. })
    }

    pub fn error_kind(&self) -> Option<&str> {
        match self {
            MutationResult::Ok { .. } => None,
            MutationResult::Failed { error_kind, .. } => Some(error_kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ListResult<T> {
    Ok {
        success: bool,
        data: Vec<T>,
        count: usize,
    },
    Failed {
        success: bool,
        error: String,
    },
}

impl<T> ListResult<T> {
    /// `count` is the total number of matches, which may exceed `data.len()`
    pub fn ok(data: Vec<T>, count: usize) -> Self {
        ListResult::Ok {
            success: true,
            data,
            count,
        }
    }

    pub fn failed(error: &DeskError) -> Self {
        ListResult::Failed {
            success: false,
            error: error.to_string(),
        }
    }

    pub fn from_result(result: Result<(Vec<T>, usize), DeskError>) -> Result<Self, DeskError> {
        match result {
            Ok((data, count)) => Ok(Self::ok(data, count)),
            Err(e) if e.is_recoverable() => Ok(Self::failed(&e)),
            Err(e) => Err(e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ListResult::Ok { .. })
    }
}
