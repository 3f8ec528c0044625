//! Batch and single-contract synchronization.
//!
//! ## Per-contract push: strict order, each phase gated on the previous
//!
//! 1. Contract upsert. Yields the remote order number, which is persisted
//!    at once so a retry updates the same remote record.
//! 2. Tasks, one call each.
//! 3. Guarantees, one call each.
//! 4. Areas, one call for the whole list.
//!
//! Sub-records are fetched by the source order number and rebound to the
//! remote one before they are sent. A phase with no records makes no call.
//! The first failure ends the contract; the batch moves on.

use std::sync::Arc;

use serde_json::json;

use consync_core::{AreaCode, AreaCodeConverter, Config, Contract, OrderNo, Phase, SyncStatus, Token};
use consync_gateway::RemoteGateway;
use consync_store::{SourceRepository, SyncStatusStore};

use crate::area_cache::AreaCodeCache;
use crate::error::{PushPhase, SyncError};
use crate::outcome::{BatchSummary, ContractOutcome};
use crate::token::{Clock, TokenCache};

/// Status message stored between a successful contract upsert and the end of
/// the sub-record phases.
pub const CREATED_PENDING_MESSAGE: &str = "contract created, sub-records pending";

struct PushReport {
    remote_no: OrderNo,
    tasks: usize,
    guarantees: usize,
    areas: usize,
}

pub struct SyncOrchestrator {
    gateway: Arc<dyn RemoteGateway>,
    source: Arc<dyn SourceRepository>,
    status: Arc<dyn SyncStatusStore>,
    converter: Arc<AreaCodeConverter>,
    tokens: TokenCache,
    area_codes: AreaCodeCache,
    default_batch_size: usize,
}

impl SyncOrchestrator {
    pub fn new(
        config: &Config,
        gateway: Arc<dyn RemoteGateway>,
        source: Arc<dyn SourceRepository>,
        status: Arc<dyn SyncStatusStore>,
        converter: Arc<AreaCodeConverter>,
    ) -> Self {
        Self {
            tokens: TokenCache::new(Arc::clone(&gateway), &config.api),
            area_codes: AreaCodeCache::new(Arc::clone(&gateway)),
            gateway,
            source,
            status,
            converter,
            default_batch_size: config.sync.batch_size as usize,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.tokens = self.tokens.with_clock(clock);
        self
    }

    pub fn converter(&self) -> &AreaCodeConverter {
        &self.converter
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    pub fn area_cache(&self) -> &AreaCodeCache {
        &self.area_codes
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Sync up to `batch_size` pending contracts, newest first.
    ///
    /// A non-positive size falls back to the configured default. Never
    /// fails: every outcome, including a missing token, is in the summary.
    pub fn sync(&self, batch_size: i64) -> BatchSummary {
        let limit = usize::try_from(batch_size)
            .ok()
            .filter(|n| *n > 0)
            .unwrap_or(self.default_batch_size);
        tracing::info!(batch_size = limit, "batch sync started");

        if let Err(err) = self.tokens.get_token() {
            tracing::error!(error = %err, "batch sync aborted");
            return BatchSummary::TokenFailed {
                message: err.to_string(),
            };
        }

        let contracts = match self.source.pending_contracts(limit) {
            Ok(contracts) => contracts,
            Err(err) => {
                let err = SyncError::Source(err);
                tracing::error!(error = %err, "pending contracts unavailable");
                return BatchSummary::SourceFailed {
                    message: err.to_string(),
                };
            }
        };

        if contracts.is_empty() {
            tracing::info!("no contracts to sync");
            return BatchSummary::Idle;
        }
        tracing::info!(count = contracts.len(), "pending contracts found");

        // The token is looked up per contract so a long batch refreshes it
        // once it expires.
        let outcomes: Vec<ContractOutcome> = contracts
            .into_iter()
            .map(|contract| self.sync_contract_record(contract))
            .collect();
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        let summary = BatchSummary::Completed {
            succeeded,
            failed: outcomes.len() - succeeded,
            outcomes,
        };
        tracing::info!("{summary}");
        summary
    }

    /// Sync one contract looked up in the source store by its order number,
    /// whatever its current status.
    pub fn sync_contract(&self, order_no: &OrderNo) -> ContractOutcome {
        let token = match self.tokens.get_token() {
            Ok(token) => token,
            Err(err) => return failed(order_no, &err),
        };
        match self.source.contract(order_no) {
            Ok(Some(contract)) => self.process(&token, contract),
            Ok(None) => ContractOutcome::Failed {
                order_no: order_no.clone(),
                message: format!("sync failed: contract {order_no} not found"),
            },
            Err(err) => failed(order_no, &SyncError::Source(err)),
        }
    }

    /// Sync a contract supplied by the caller instead of the source store.
    pub fn sync_contract_record(&self, contract: Contract) -> ContractOutcome {
        match self.tokens.get_token() {
            Ok(token) => self.process(&token, contract),
            Err(err) => failed(&contract.source_no, &err),
        }
    }

    /// Area hierarchy for `province` (all provinces when `None`), cached.
    pub fn area_codes(&self, province: Option<&str>) -> Result<Arc<Vec<AreaCode>>, SyncError> {
        let token = self.tokens.get_token()?;
        Ok(self.area_codes.get(&token, province)?)
    }

    /// Delete a contract on the remote side by its remote order number.
    ///
    /// Status rows that held the number forget it, so a later sync of the
    /// same source contract creates a fresh remote record.
    pub fn delete_remote(&self, remote_no: &OrderNo) -> Result<String, SyncError> {
        let token = self.tokens.get_token()?;
        let ack = self.gateway.delete_contract(&token, remote_no)?;
        match self.status.clear_remote_order_no(remote_no) {
            Ok(cleared) => {
                for order_no in &cleared {
                    self.log(
                        order_no,
                        Phase::Delete,
                        &format!("remote contract {remote_no} deleted"),
                    );
                }
                tracing::info!(remote_no = %remote_no, local = cleared.len(), "remote contract deleted");
            }
            Err(err) => {
                tracing::warn!(remote_no = %remote_no, error = %err, "remote order number not cleared");
            }
        }
        Ok(ack.message)
    }

    // -----------------------------------------------------------------------
    // Per-contract pipeline
    // -----------------------------------------------------------------------

    fn process(&self, token: &Token, mut contract: Contract) -> ContractOutcome {
        let order_no = contract.source_no.clone();
        let span = tracing::info_span!("contract", order_no = %order_no);
        let _entered = span.enter();

        tracing::info!(name = %contract.contract_name, "contract sync started");
        self.log(
            &order_no,
            Phase::Start,
            &format!("starting contract sync: {}", contract.contract_name),
        );

        match self.push(token, &mut contract) {
            Ok(report) => {
                let payload = json!({
                    "orderNo": report.remote_no,
                    "tasks": report.tasks,
                    "guarantees": report.guarantees,
                    "areas": report.areas,
                })
                .to_string();
                self.record(&order_no, SyncStatus::Success, &payload, Some(&report.remote_no));
                self.log(&order_no, Phase::Complete, "sync complete");
                tracing::info!(remote_no = %report.remote_no, "contract synced");
                ContractOutcome::Synced {
                    order_no,
                    remote_no: report.remote_no,
                    tasks: report.tasks,
                    guarantees: report.guarantees,
                    areas: report.areas,
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "contract sync failed");
                let message = format!("sync failed: {err}");
                self.record(&order_no, SyncStatus::Pending, &message, None);
                self.log(&order_no, Phase::Error, &err.to_string());
                ContractOutcome::Failed { order_no, message }
            }
        }
    }

    fn push(&self, token: &Token, contract: &mut Contract) -> Result<PushReport, SyncError> {
        let source_no = contract.source_no.clone();

        // 1. Contract
        if contract.remote_no.is_none() {
            contract.remote_no = self
                .status
                .status(&source_no)
                .map_err(SyncError::Persistence)?
                .and_then(|record| record.remote_order_no);
        }
        self.converter.convert_contract(contract);
        let ack = self
            .gateway
            .upsert_contract(token, contract)
            .map_err(|e| SyncError::push(PushPhase::Contract, e))?;
        let remote_no = ack
            .order_no
            .or_else(|| contract.remote_no.clone())
            .ok_or(SyncError::NoRemoteOrderNo)?;
        contract.remote_no = Some(remote_no.clone());
        self.record(
            &source_no,
            SyncStatus::Pending,
            CREATED_PENDING_MESSAGE,
            Some(&remote_no),
        );
        self.log(
            &source_no,
            Phase::Create,
            &format!("contract created, order number: {remote_no}"),
        );
        tracing::info!(remote_no = %remote_no, "contract upserted");

        // 2. Tasks
        let tasks = self.source.tasks(&source_no).map_err(SyncError::Source)?;
        for mut task in tasks.iter().cloned() {
            task.order_no = remote_no.clone();
            self.gateway
                .upsert_task(token, &task)
                .map_err(|e| SyncError::push(PushPhase::Task, e))?;
        }
        if !tasks.is_empty() {
            self.log(&source_no, Phase::Task, &format!("tasks pushed: {}", tasks.len()));
            tracing::info!(count = tasks.len(), "tasks pushed");
        }

        // 3. Guarantees
        let guarantees = self
            .source
            .guarantees(&source_no)
            .map_err(SyncError::Source)?;
        for mut guarantee in guarantees.iter().cloned() {
            guarantee.order_no = remote_no.clone();
            self.gateway
                .upsert_guarantee(token, &guarantee)
                .map_err(|e| SyncError::push(PushPhase::Guarantee, e))?;
        }
        if !guarantees.is_empty() {
            self.log(
                &source_no,
                Phase::Guarantee,
                &format!("guarantees pushed: {}", guarantees.len()),
            );
            tracing::info!(count = guarantees.len(), "guarantees pushed");
        }

        // 4. Areas
        let mut areas = self.source.areas(&source_no).map_err(SyncError::Source)?;
        if !areas.is_empty() {
            for area in &mut areas {
                area.order_no = remote_no.clone();
                self.converter.convert_area(area);
            }
            self.gateway
                .upsert_areas(token, &areas)
                .map_err(|e| SyncError::push(PushPhase::Area, e))?;
            self.log(&source_no, Phase::Area, &format!("areas pushed: {}", areas.len()));
            tracing::info!(count = areas.len(), "areas pushed");
        }

        Ok(PushReport {
            remote_no,
            tasks: tasks.len(),
            guarantees: guarantees.len(),
            areas: areas.len(),
        })
    }

    // -----------------------------------------------------------------------
    // Bookkeeping; failures here never change an outcome
    // -----------------------------------------------------------------------

    fn record(
        &self,
        order_no: &OrderNo,
        status: SyncStatus,
        message: &str,
        remote_no: Option<&OrderNo>,
    ) {
        if let Err(err) = self
            .status
            .upsert_status(order_no, status, message, remote_no)
        {
            tracing::warn!(order_no = %order_no, error = %err, "could not record sync status");
        }
    }

    fn log(&self, order_no: &OrderNo, phase: Phase, content: &str) {
        if let Err(err) = self.status.append_log(order_no, phase, content) {
            tracing::warn!(order_no = %order_no, phase = %phase, error = %err, "could not append sync log");
        }
    }
}

fn failed(order_no: &OrderNo, err: &SyncError) -> ContractOutcome {
    ContractOutcome::Failed {
        order_no: order_no.clone(),
        message: format!("sync failed: {err}"),
    }
}
