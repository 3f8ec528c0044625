//! # consync-gateway
//!
//! The remote contract API behind the [`RemoteGateway`] trait, plus a blocking
//! HTTP+JSON implementation ([`HttpGateway`]).
//!
//! Implementations interpret the response `state` themselves: a call returns
//! `Ok` only when the remote reported success.

pub mod error;
pub mod http;
pub mod wire;

use consync_core::{
    Contract, ContractArea, ContractGuarantee, ContractTask, OrderNo, RawAreaResponse, Token,
};

pub use error::GatewayError;
pub use http::HttpGateway;

/// Successful remote acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ack {
    pub message: String,
}

/// Successful contract upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractAck {
    /// Remote-assigned order number; `None` when the remote left it blank.
    pub order_no: Option<OrderNo>,
    pub message: String,
}

/// Operations of the remote contract system.
pub trait RemoteGateway: Send + Sync {
    fn login(&self, username: &str, password: &str, lang_code: &str)
        -> Result<Token, GatewayError>;

    /// Raw reference data; the caller decides how to treat a failed `state`.
    fn query_area_codes(
        &self,
        token: &Token,
        province: Option<&str>,
    ) -> Result<RawAreaResponse, GatewayError>;

    fn upsert_contract(&self, token: &Token, contract: &Contract)
        -> Result<ContractAck, GatewayError>;

    fn upsert_task(&self, token: &Token, task: &ContractTask) -> Result<Ack, GatewayError>;

    fn upsert_guarantee(
        &self,
        token: &Token,
        guarantee: &ContractGuarantee,
    ) -> Result<Ack, GatewayError>;

    /// All areas of one contract in a single call.
    fn upsert_areas(&self, token: &Token, areas: &[ContractArea]) -> Result<Ack, GatewayError>;

    fn delete_contract(&self, token: &Token, order_no: &OrderNo) -> Result<Ack, GatewayError>;
}
