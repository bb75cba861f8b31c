use schemaconsole_client::ApiClient;
use schemaconsole_shared::BackendConfig;
use uuid::Uuid;
use wiremock::MockServer;

use crate::session::Session;

pub(crate) async fn temp_session() -> Session {
    let tmp = std::env::temp_dir().join(format!("sc_core_{}.db", Uuid::now_v7()));
    Session::open(&tmp).await.expect("open temp session")
}

pub(crate) fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(&BackendConfig {
        base_url: server.uri(),
        timeout_secs: 5,
    })
    .expect("build client")
}

pub(crate) fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("../../../fixtures/json/{name}"))
        .unwrap_or_else(|_| panic!("missing fixture: {name}"))
}
