
use std::sync::Arc;

use crate::core::dispatch::testing::RecordingDispatcher;
use crate::core::requests::AgentRequestService;
use crate::core::store::SqliteRequestStore;

pub(super) struct Harness {
    pub service: AgentRequestService,
    pub store: Arc<SqliteRequestStore>,
    pub dispatcher: Arc<RecordingDispatcher>,
    _dir: tempfile::TempDir,
}

pub(super) async fn harness(dispatcher: RecordingDispatcher, strict: bool) -> Harness {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = Arc::new(SqliteRequestStore::new(dir.path().join("agent_requests.db")));
    store.init().await.expect("store init");
    let dispatcher = Arc::new(dispatcher);
    let service = AgentRequestService::new(
        store.clone(),
        dispatcher.clone(),
        "http://localhost:11434/v1",
        strict,
    );
    Harness {
        service,
        store,
        dispatcher,
        _dir: dir,
    }
}
