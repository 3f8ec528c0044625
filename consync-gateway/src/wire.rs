//! JSON wire shapes for the remote contract API.
//!
//! Every write goes out as an envelope
//! `{"Token", "Langz_Code", "PreviousDataList": [...]}` and every answer
//! carries `state` (1 = success) and `mess`.

use serde::{Deserialize, Serialize};

use consync_core::{Contract, ContractGuarantee, ContractTask, OrderNo};

use crate::error::GatewayError;

/// Operation flag sent with every contract, task and guarantee.
///
/// The remote API also accepts update/delete flags, but records are only ever
/// pushed as new, so the flag is fixed here rather than carried on entities.
pub const FLAG_ADD: &str = "ADD";

/// Sub-record id for a record the remote side has not seen yet.
pub const NEW_RECORD_ID: &str = "0";

/// Remote `state` value meaning success.
pub const STATE_SUCCESS: i64 = 1;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    #[serde(rename = "UserName")]
    pub username: &'a str,
    #[serde(rename = "PassWord")]
    pub password: &'a str,
    #[serde(rename = "LangzCode")]
    pub lang_code: &'a str,
}

/// Authenticated write envelope.
#[derive(Debug, Serialize)]
pub struct Envelope<'a, T> {
    #[serde(rename = "Token")]
    pub token: &'a str,
    #[serde(rename = "Langz_Code")]
    pub lang_code: &'a str,
    #[serde(rename = "PreviousDataList")]
    pub previous_data_list: Vec<T>,
}

impl<'a, T> Envelope<'a, T> {
    pub fn new(token: &'a str, lang_code: &'a str, items: Vec<T>) -> Self {
        Self {
            token,
            lang_code,
            previous_data_list: items,
        }
    }
}

/// A contract as the remote upsert expects it. An empty `order_no` creates.
#[derive(Debug, Serialize)]
pub struct ContractPayload<'a> {
    pub flag: &'static str,
    pub order_no: &'a str,
    #[serde(flatten)]
    pub contract: &'a Contract,
}

impl<'a> ContractPayload<'a> {
    pub fn new(contract: &'a Contract) -> Self {
        Self {
            flag: FLAG_ADD,
            order_no: contract.remote_no.as_ref().map(OrderNo::as_str).unwrap_or(""),
            contract,
        }
    }
}

/// A task or guarantee with the fixed flag/id pair.
#[derive(Debug, Serialize)]
pub struct SubRecordPayload<'a, T> {
    pub flag: &'static str,
    pub id: &'static str,
    #[serde(flatten)]
    pub record: &'a T,
}

impl<'a, T> SubRecordPayload<'a, T> {
    pub fn new(record: &'a T) -> Self {
        Self {
            flag: FLAG_ADD,
            id: NEW_RECORD_ID,
            record,
        }
    }
}

pub type TaskPayload<'a> = SubRecordPayload<'a, ContractTask>;
pub type GuaranteePayload<'a> = SubRecordPayload<'a, ContractGuarantee>;

#[derive(Debug, Serialize)]
pub struct DeletePayload<'a> {
    pub order_no: &'a str,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Common response body. `order_no` is only filled by the contract upsert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub state: Option<i64>,
    #[serde(default)]
    pub mess: Option<String>,
    #[serde(default)]
    pub order_no: Option<String>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.state == Some(STATE_SUCCESS)
    }

    pub fn message(&self) -> String {
        self.mess.clone().unwrap_or_default()
    }

    /// Turn a non-success state into [`GatewayError::Remote`].
    pub fn into_result(self, endpoint: &'static str) -> Result<Self, GatewayError> {
        if self.is_success() {
            Ok(self)
        } else {
            let message = match (&self.mess, self.state) {
                (Some(mess), _) if !mess.is_empty() => mess.clone(),
                (_, Some(state)) => format!("state {state} without message"),
                (_, None) => "response carried no state".to_string(),
            };
            Err(GatewayError::Remote { endpoint, message })
        }
    }
}
