use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use consync_core::{
    AreaCodeConverter, Config, Contract, ContractArea, ContractGuarantee, ContractTask, OrderNo,
    RawAreaResponse, Token,
};
use consync_daemon::paths::socket_path;
use consync_daemon::{
    request_map_town, request_status, request_stop, request_sync, serve, DaemonError,
    DaemonSettings,
};
use consync_gateway::{Ack, ContractAck, GatewayError, RemoteGateway};
use consync_store::{SourceRepository, SqliteStatusStore, StoreError};
use consync_sync::SyncOrchestrator;

/// Accepts every call.
struct AcceptingGateway;

impl RemoteGateway for AcceptingGateway {
    fn login(&self, _: &str, _: &str, _: &str) -> Result<Token, GatewayError> {
        Ok(Token::from("tok"))
    }

    fn query_area_codes(&self, _: &Token, _: Option<&str>) -> Result<RawAreaResponse, GatewayError> {
        Ok(RawAreaResponse::default())
    }

    fn upsert_contract(&self, _: &Token, c: &Contract) -> Result<ContractAck, GatewayError> {
        Ok(ContractAck {
            order_no: Some(OrderNo::from(format!("R-{}", c.source_no))),
            message: String::new(),
        })
    }

    fn upsert_task(&self, _: &Token, _: &ContractTask) -> Result<Ack, GatewayError> {
        Ok(Ack::default())
    }

    fn upsert_guarantee(&self, _: &Token, _: &ContractGuarantee) -> Result<Ack, GatewayError> {
        Ok(Ack::default())
    }

    fn upsert_areas(&self, _: &Token, _: &[ContractArea]) -> Result<Ack, GatewayError> {
        Ok(Ack::default())
    }

    fn delete_contract(&self, _: &Token, _: &OrderNo) -> Result<Ack, GatewayError> {
        Ok(Ack::default())
    }
}

/// No contracts at all.
struct EmptySource;

impl SourceRepository for EmptySource {
    fn pending_contracts(&self, _: usize) -> Result<Vec<Contract>, StoreError> {
        Ok(Vec::new())
    }

    fn contract(&self, _: &OrderNo) -> Result<Option<Contract>, StoreError> {
        Ok(None)
    }

    fn tasks(&self, _: &OrderNo) -> Result<Vec<ContractTask>, StoreError> {
        Ok(Vec::new())
    }

    fn guarantees(&self, _: &OrderNo) -> Result<Vec<ContractGuarantee>, StoreError> {
        Ok(Vec::new())
    }

    fn areas(&self, _: &OrderNo) -> Result<Vec<ContractArea>, StoreError> {
        Ok(Vec::new())
    }
}

fn orchestrator() -> Arc<SyncOrchestrator> {
    let config = Config::template("https://crm.example.com", "sync");
    Arc::new(SyncOrchestrator::new(
        &config,
        Arc::new(AcceptingGateway),
        Arc::new(EmptySource),
        Arc::new(SqliteStatusStore::open_in_memory().expect("status store")),
        Arc::new(AreaCodeConverter::new()),
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn socket_roundtrip_status_sync_map_town_and_stop() {
    let home = TempDir::new().expect("home");
    let settings = DaemonSettings {
        interval: Duration::from_secs(3600),
        batch_size: 10,
    };
    let daemon = tokio::spawn(serve(home.path().to_path_buf(), orchestrator(), settings));

    let socket = socket_path(home.path());
    for _ in 0..100 {
        if socket.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(socket.exists(), "daemon socket never appeared");

    let home_path = home.path().to_path_buf();
    let (status, batch, single, mapped, rejected, status_after) =
        tokio::task::spawn_blocking(move || {
            let status = request_status(&home_path).expect("status");
            let batch = request_sync(&home_path, None, Some(5)).expect("batch sync");
            let single =
                request_sync(&home_path, Some("HT-404".to_string()), None).expect("single sync");
            let mapped =
                request_map_town(&home_path, "420102001", "420102100").expect("map_town");
            let rejected = request_map_town(&home_path, "", "420102100").unwrap_err();
            let status_after = request_status(&home_path).expect("status after");
            request_stop(&home_path).expect("stop");
            (status, batch, single, mapped, rejected, status_after)
        })
        .await
        .expect("client thread");

    assert_eq!(status["running"], true);
    assert_eq!(status["runs"], 0);
    assert_eq!(status["interval_secs"], 3600);
    assert_eq!(status["batch_size"], 10);

    assert_eq!(batch["summary"], "no contracts to sync");
    assert_eq!(batch["source"], "socket");
    assert_eq!(batch["target"], "batch:5");
    assert_eq!(batch["detail"]["result"], "idle");

    assert_eq!(single["summary"], "sync failed: contract HT-404 not found");
    assert_eq!(single["failed"], 1);
    assert_eq!(single["detail"]["result"], "failed");

    assert_eq!(mapped["overrides"], 1);
    assert!(matches!(rejected, DaemonError::Protocol(_)));

    assert_eq!(status_after["runs"], 2);
    assert_eq!(status_after["town_overrides"], 1);
    assert_eq!(
        status_after["last_summary"],
        "sync failed: contract HT-404 not found"
    );

    tokio::time::timeout(Duration::from_secs(5), daemon)
        .await
        .expect("daemon stops")
        .expect("join")
        .expect("daemon result");
    assert!(!socket.exists(), "socket should be removed on shutdown");
}

#[test]
fn stop_without_daemon_reports_not_running() {
    let home = TempDir::new().expect("home");
    assert!(matches!(
        request_stop(home.path()),
        Err(DaemonError::DaemonNotRunning { .. })
    ));
}
