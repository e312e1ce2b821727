use std::fs;
use std::time::Duration;

use confsync::ChangeEvent;
use confsync::Configurator;
use confsync::EtcdClient;
use confsync::KvStore;
use tokio::sync::mpsc;

use crate::commons::drain;
use crate::commons::next_event;
use crate::commons::settings_for;
use crate::commons::EtcdGateway;
use crate::commons::TOKEN;

/// Listen, push a local file, then see an external edit arrive through the timer
#[tokio::test]
async fn test_sync_and_watch_through_gateway() {
    crate::enable_logger();
    let (server, gateway) = EtcdGateway::start().await;
    gateway.insert("/micro/config/old", "x");
    gateway.insert("/micro/other/untouched", "y");

    let configurator = Configurator::<EtcdClient>::connect(&settings_for(&server)).await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    configurator.listen(tx).await.unwrap();
    assert_eq!(drain(&mut rx), vec![ChangeEvent::put("/micro/config/old", "x")]);

    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("app.toml");
    fs::write(&path, "[db]\nhost = \"10.0.0.1\"\n").unwrap();

    let report = configurator.sync(&path).await.unwrap();

    assert_eq!(report.puts, vec!["/micro/config/db/host"]);
    assert_eq!(report.deletes, vec!["/micro/config/old"]);
    assert!(report.ticked);
    assert_eq!(
        drain(&mut rx),
        vec![
            ChangeEvent::put("/micro/config/db/host", "10.0.0.1"),
            ChangeEvent::delete("/micro/config/old"),
        ]
    );
    let remote = gateway.snapshot();
    assert_eq!(remote.get("/micro/config/db/host").map(String::as_str), Some("10.0.0.1"));
    assert!(!remote.contains_key("/micro/config/old"));
    assert!(remote.contains_key("/micro/other/untouched"));

    gateway.insert("/micro/config/feature", "on");
    assert_eq!(next_event(&mut rx).await, ChangeEvent::put("/micro/config/feature", "on"));

    configurator.close().await.unwrap();
}

#[tokio::test]
async fn test_watch_resumes_after_gateway_outage() {
    crate::enable_logger();
    let (server, gateway) = EtcdGateway::start().await;
    gateway.insert("/micro/config/a", "1");

    let configurator = Configurator::<EtcdClient>::connect(&settings_for(&server)).await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    configurator.listen(tx).await.unwrap();
    drain(&mut rx);

    gateway.set_down(true);
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(configurator.is_listening().await);
    assert!(drain(&mut rx).is_empty());

    gateway.set_down(false);
    gateway.insert("/micro/config/b", "2");

    // Nothing was lost or replayed while the gateway was down
    assert_eq!(next_event(&mut rx).await, ChangeEvent::put("/micro/config/b", "2"));
    configurator.close().await.unwrap();
}

#[tokio::test]
async fn test_get_uses_default_for_missing_key() {
    let (server, gateway) = EtcdGateway::start().await;
    gateway.insert("/micro/config/a", "1");

    let configurator = Configurator::<EtcdClient>::connect(&settings_for(&server)).await.unwrap();

    assert_eq!(configurator.get("/micro/config/a", "dflt").await.unwrap(), "1");
    assert_eq!(configurator.get("/micro/config/none", "dflt").await.unwrap(), "dflt");
}

#[tokio::test]
async fn test_configured_user_authenticates_before_first_request() {
    let (server, gateway) = EtcdGateway::start().await;
    gateway.insert("/micro/config/a", "1");
    gateway.set_require_token(true);

    let anonymous = EtcdClient::connect(&settings_for(&server).etcd).await.unwrap();
    let err = anonymous.get("/micro/config/a").await.unwrap_err();
    assert!(err.is_remote_unavailable());

    let mut settings = settings_for(&server);
    settings.etcd.user = "root".to_string();
    settings.etcd.password = "secret".to_string();
    let client = EtcdClient::connect(&settings.etcd).await.unwrap();

    assert_eq!(client.get("/micro/config/a").await.unwrap(), Some("1".to_string()));
    let session = client.authenticate("root", "secret").await.unwrap();
    assert_eq!(session.token, TOKEN);
}

#[tokio::test]
async fn test_sync_against_unreachable_gateway_fails() {
    let (server, gateway) = EtcdGateway::start().await;
    gateway.set_down(true);

    let configurator = Configurator::<EtcdClient>::connect(&settings_for(&server)).await.unwrap();
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("app.json");
    fs::write(&path, r#"{ "a": "1" }"#).unwrap();

    let err = configurator.sync(&path).await.unwrap_err();

    assert!(err.is_remote_unavailable());
}
