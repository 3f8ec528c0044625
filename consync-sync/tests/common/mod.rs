#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use consync_core::{
    AreaCodeConverter, Config, Contract, ContractArea, ContractGuarantee, ContractTask, OrderNo,
    RawAreaResponse, RawAreaRow, SyncStatus, Token,
};
use consync_gateway::{Ack, ContractAck, GatewayError, RemoteGateway};
use consync_store::{SourceRepository, SqliteStatusStore, StoreError, SyncStatusStore};
use consync_sync::{Clock, SyncOrchestrator};

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Login,
    AreaQuery(Option<String>),
    Contract(Contract),
    Task(ContractTask),
    Guarantee(ContractGuarantee),
    Areas(Vec<ContractArea>),
    Delete(OrderNo),
}

/// Records every call; replies are scripted per test.
#[derive(Default)]
pub struct FakeGateway {
    pub calls: Mutex<Vec<Call>>,
    login_error: Mutex<Option<String>>,
    /// Keyed by source order number. Missing entries answer `R-<source_no>`.
    contract_replies: Mutex<HashMap<String, Result<Option<String>, String>>>,
    task_error: Mutex<Option<String>>,
    guarantee_error: Mutex<Option<String>>,
    area_error: Mutex<Option<String>>,
    area_response: Mutex<Option<RawAreaResponse>>,
    /// Runs after each contract upsert is recorded.
    contract_hook: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_login(&self, message: &str) {
        *self.login_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn allow_login(&self) {
        *self.login_error.lock().unwrap() = None;
    }

    pub fn reply_contract(&self, source_no: &str, reply: Result<Option<&str>, &str>) {
        let reply = reply.map(|no| no.map(str::to_string)).map_err(str::to_string);
        self.contract_replies
            .lock()
            .unwrap()
            .insert(source_no.to_string(), reply);
    }

    pub fn fail_tasks(&self, message: Option<&str>) {
        *self.task_error.lock().unwrap() = message.map(str::to_string);
    }

    pub fn fail_areas(&self, message: Option<&str>) {
        *self.area_error.lock().unwrap() = message.map(str::to_string);
    }

    pub fn on_contract(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.contract_hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn set_area_response(&self, response: RawAreaResponse) {
        *self.area_response.lock().unwrap() = Some(response);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn logins(&self) -> usize {
        self.count(|c| matches!(c, Call::Login))
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn remote(endpoint: &'static str, message: &str) -> GatewayError {
    GatewayError::Remote {
        endpoint,
        message: message.to_string(),
    }
}

impl RemoteGateway for FakeGateway {
    fn login(&self, _: &str, _: &str, _: &str) -> Result<Token, GatewayError> {
        self.record(Call::Login);
        match self.login_error.lock().unwrap().as_deref() {
            Some(message) => Err(remote("login", message)),
            None => Ok(Token::from("tok-1")),
        }
    }

    fn query_area_codes(
        &self,
        _: &Token,
        province: Option<&str>,
    ) -> Result<RawAreaResponse, GatewayError> {
        self.record(Call::AreaQuery(province.map(str::to_string)));
        Ok(self
            .area_response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_default())
    }

    fn upsert_contract(&self, _: &Token, contract: &Contract) -> Result<ContractAck, GatewayError> {
        self.record(Call::Contract(contract.clone()));
        if let Some(hook) = self.contract_hook.lock().unwrap().as_ref() {
            hook();
        }
        let reply = self
            .contract_replies
            .lock()
            .unwrap()
            .get(contract.source_no.as_str())
            .cloned()
            .unwrap_or_else(|| Ok(Some(format!("R-{}", contract.source_no))));
        match reply {
            Ok(order_no) => Ok(ContractAck {
                order_no: order_no.map(OrderNo::from),
                message: "ok".into(),
            }),
            Err(message) => Err(remote("contract upsert", &message)),
        }
    }

    fn upsert_task(&self, _: &Token, task: &ContractTask) -> Result<Ack, GatewayError> {
        self.record(Call::Task(task.clone()));
        match self.task_error.lock().unwrap().as_deref() {
            Some(message) => Err(remote("task upsert", message)),
            None => Ok(Ack::default()),
        }
    }

    fn upsert_guarantee(
        &self,
        _: &Token,
        guarantee: &ContractGuarantee,
    ) -> Result<Ack, GatewayError> {
        self.record(Call::Guarantee(guarantee.clone()));
        match self.guarantee_error.lock().unwrap().as_deref() {
            Some(message) => Err(remote("guarantee upsert", message)),
            None => Ok(Ack::default()),
        }
    }

    fn upsert_areas(&self, _: &Token, areas: &[ContractArea]) -> Result<Ack, GatewayError> {
        self.record(Call::Areas(areas.to_vec()));
        match self.area_error.lock().unwrap().as_deref() {
            Some(message) => Err(remote("area upsert", message)),
            None => Ok(Ack::default()),
        }
    }

    fn delete_contract(&self, _: &Token, order_no: &OrderNo) -> Result<Ack, GatewayError> {
        self.record(Call::Delete(order_no.clone()));
        Ok(Ack {
            message: "deleted".into(),
        })
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Contracts kept newest first. Pending filtering consults the status store
/// the same way the SQLite join does.
pub struct MemorySource {
    status: Arc<SqliteStatusStore>,
    contracts: Mutex<Vec<Contract>>,
    tasks: Mutex<HashMap<OrderNo, Vec<ContractTask>>>,
    guarantees: Mutex<HashMap<OrderNo, Vec<ContractGuarantee>>>,
    areas: Mutex<HashMap<OrderNo, Vec<ContractArea>>>,
    fail_pending: Mutex<bool>,
}

impl MemorySource {
    pub fn new(status: Arc<SqliteStatusStore>) -> Arc<Self> {
        Arc::new(Self {
            status,
            contracts: Mutex::default(),
            tasks: Mutex::default(),
            guarantees: Mutex::default(),
            areas: Mutex::default(),
            fail_pending: Mutex::new(false),
        })
    }

    pub fn add_contract(&self, source_no: &str, code_prov: &str) {
        self.contracts.lock().unwrap().push(Contract {
            source_no: OrderNo::from(source_no),
            contract_name: format!("contract {source_no}"),
            code_prov: code_prov.to_string(),
            code_city: "4201".to_string(),
            ..Contract::default()
        });
    }

    pub fn add_task(&self, source_no: &str, start_month: &str) {
        let no = OrderNo::from(source_no);
        self.tasks.lock().unwrap().entry(no.clone()).or_default().push(ContractTask {
            order_no: no,
            start_month: start_month.to_string(),
            end_month: "2024-12".to_string(),
            sale_amount: "10".to_string(),
            return_amount: "8".to_string(),
        });
    }

    pub fn add_guarantee(&self, source_no: &str, guarantee_no: &str) {
        let no = OrderNo::from(source_no);
        self.guarantees
            .lock()
            .unwrap()
            .entry(no.clone())
            .or_default()
            .push(ContractGuarantee {
                order_no: no,
                guarantee_no: guarantee_no.to_string(),
                guarantee_amount: "5000".to_string(),
                guarantee_note: String::new(),
            });
    }

    pub fn add_area(&self, source_no: &str, code_prov: &str, code_town: &str) {
        let no = OrderNo::from(source_no);
        self.areas.lock().unwrap().entry(no.clone()).or_default().push(ContractArea {
            order_no: no,
            code_prov: code_prov.to_string(),
            code_city: "4201".to_string(),
            code_coun: String::new(),
            code_town: code_town.to_string(),
        });
    }

    pub fn fail_pending(&self) {
        *self.fail_pending.lock().unwrap() = true;
    }

    fn with_remote_no(&self, mut contract: Contract) -> Contract {
        contract.remote_no = self
            .status
            .status(&contract.source_no)
            .ok()
            .flatten()
            .and_then(|r| r.remote_order_no);
        contract
    }
}

impl SourceRepository for MemorySource {
    fn pending_contracts(&self, limit: usize) -> Result<Vec<Contract>, StoreError> {
        if *self.fail_pending.lock().unwrap() {
            return Err(StoreError::Io {
                path: "source.db".into(),
                source: std::io::Error::other("source offline"),
            });
        }
        let contracts = self.contracts.lock().unwrap().clone();
        Ok(contracts
            .into_iter()
            .filter(|c| {
                !self
                    .status
                    .is_already_synced(&c.source_no)
                    .unwrap_or(false)
            })
            .take(limit)
            .map(|c| self.with_remote_no(c))
            .collect())
    }

    fn contract(&self, order_no: &OrderNo) -> Result<Option<Contract>, StoreError> {
        let found = self
            .contracts
            .lock()
            .unwrap()
            .iter()
            .find(|c| &c.source_no == order_no)
            .cloned();
        Ok(found.map(|c| self.with_remote_no(c)))
    }

    fn tasks(&self, order_no: &OrderNo) -> Result<Vec<ContractTask>, StoreError> {
        Ok(self.tasks.lock().unwrap().get(order_no).cloned().unwrap_or_default())
    }

    fn guarantees(&self, order_no: &OrderNo) -> Result<Vec<ContractGuarantee>, StoreError> {
        Ok(self
            .guarantees
            .lock()
            .unwrap()
            .get(order_no)
            .cloned()
            .unwrap_or_default())
    }

    fn areas(&self, order_no: &OrderNo) -> Result<Vec<ContractArea>, StoreError> {
        Ok(self.areas.lock().unwrap().get(order_no).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Instant::now()),
        })
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub gateway: Arc<FakeGateway>,
    pub source: Arc<MemorySource>,
    pub status: Arc<SqliteStatusStore>,
    pub clock: Arc<ManualClock>,
    pub orchestrator: SyncOrchestrator,
}

pub fn config() -> Config {
    let mut config = Config::template("https://crm.example.com", "sync-user");
    config.api.password = "secret".to_string();
    config.api.token_ttl_secs = 3600;
    config.sync.batch_size = 50;
    config
}

pub fn harness() -> Harness {
    harness_with(config())
}

pub fn harness_with(config: Config) -> Harness {
    let gateway = FakeGateway::new();
    let status = Arc::new(SqliteStatusStore::open_in_memory().unwrap());
    let source = MemorySource::new(Arc::clone(&status));
    let clock = ManualClock::new();
    let orchestrator = SyncOrchestrator::new(
        &config,
        Arc::clone(&gateway) as Arc<dyn RemoteGateway>,
        Arc::clone(&source) as Arc<dyn SourceRepository>,
        Arc::clone(&status) as Arc<dyn SyncStatusStore>,
        Arc::new(AreaCodeConverter::new()),
    )
    .with_clock(Arc::clone(&clock) as Arc<dyn Clock>);
    Harness {
        gateway,
        source,
        status,
        clock,
        orchestrator,
    }
}

pub fn status_of(h: &Harness, source_no: &str) -> (SyncStatus, String, Option<OrderNo>) {
    let record = h
        .status
        .status(&OrderNo::from(source_no))
        .unwrap()
        .expect("status row");
    (record.status, record.message, record.remote_order_no)
}

pub fn log_phases(h: &Harness, source_no: &str) -> Vec<String> {
    h.status
        .logs(&OrderNo::from(source_no))
        .unwrap()
        .into_iter()
        .map(|l| l.phase)
        .collect()
}

pub fn area_row(prov: &str, city: &str, coun: &str, town: &str) -> RawAreaRow {
    RawAreaRow {
        code_prov: prov.to_string(),
        name_prov: format!("P{prov}"),
        code_city: city.to_string(),
        name_city: format!("C{city}"),
        code_coun: coun.to_string(),
        name_coun: format!("D{coun}"),
        code_town: town.to_string(),
        name_town: format!("T{town}"),
    }
}
