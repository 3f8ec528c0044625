//! Typed results of single-contract and batch runs.

use std::fmt;

use serde::Serialize;

use consync_core::OrderNo;

/// Result of pushing one contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ContractOutcome {
    Synced {
        order_no: OrderNo,
        remote_no: OrderNo,
        tasks: usize,
        guarantees: usize,
        areas: usize,
    },
    Failed {
        order_no: OrderNo,
        message: String,
    },
}

impl ContractOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ContractOutcome::Synced { .. })
    }

    pub fn order_no(&self) -> &OrderNo {
        match self {
            ContractOutcome::Synced { order_no, .. } | ContractOutcome::Failed { order_no, .. } => {
                order_no
            }
        }
    }
}

impl fmt::Display for ContractOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractOutcome::Synced {
                order_no,
                remote_no,
                tasks,
                guarantees,
                areas,
            } => write!(
                f,
                "sync succeeded: {order_no} -> {remote_no} ({tasks} tasks, {guarantees} guarantees, {areas} areas)"
            ),
            ContractOutcome::Failed { message, .. } => f.write_str(message),
        }
    }
}

/// Result of one batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum BatchSummary {
    /// No token; no contract was touched.
    TokenFailed { message: String },
    /// The pending query failed.
    SourceFailed { message: String },
    /// Nothing pending.
    Idle,
    Completed {
        succeeded: usize,
        failed: usize,
        outcomes: Vec<ContractOutcome>,
    },
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        match self {
            BatchSummary::Completed { succeeded, .. } => *succeeded,
            _ => 0,
        }
    }

    pub fn failed(&self) -> usize {
        match self {
            BatchSummary::Completed { failed, .. } => *failed,
            _ => 0,
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchSummary::TokenFailed { message } | BatchSummary::SourceFailed { message } => {
                write!(f, "sync failed: {message}")
            }
            BatchSummary::Idle => f.write_str("no contracts to sync"),
            BatchSummary::Completed {
                succeeded, failed, ..
            } => write!(f, "sync complete: {succeeded} succeeded, {failed} failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_strings() {
        assert_eq!(BatchSummary::Idle.to_string(), "no contracts to sync");
        let done = BatchSummary::Completed {
            succeeded: 2,
            failed: 1,
            outcomes: Vec::new(),
        };
        assert_eq!(done.to_string(), "sync complete: 2 succeeded, 1 failed");
        assert_eq!(done.succeeded(), 2);
        assert_eq!(done.failed(), 1);

        let token = BatchSummary::TokenFailed {
            message: "token acquisition failed: bad password".into(),
        };
        assert_eq!(
            token.to_string(),
            "sync failed: token acquisition failed: bad password"
        );
    }

    #[test]
    fn outcomes_serialize_with_result_tag() {
        let outcome = ContractOutcome::Failed {
            order_no: OrderNo::from("HT-1"),
            message: "sync failed: task push failed: x".into(),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["result"], "failed");
        assert_eq!(value["order_no"], "HT-1");
        assert_eq!(outcome.to_string(), "sync failed: task push failed: x");
    }
}
