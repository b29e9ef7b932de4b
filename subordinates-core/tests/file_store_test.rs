//! The manager over the JSON file store, as the binary wires it

use std::sync::Arc;
use tempfile::TempDir;

use subordinates_core::config::ConfigBuilder;
use subordinates_core::store::{ConfigStore, JsonFileStore, STRUCTURAL_NAMESPACE};
use subordinates_core::test_helpers::{RecordingRestarter, TokenBuilder};
use subordinates_core::{DirectoryLock, MessageBus, SubordinatesManager};

fn manager_in(dir: &TempDir) -> (SubordinatesManager, Arc<RecordingRestarter>) {
    let config = ConfigBuilder::new()
        .controller_id("0000000000000001")
        .bus(MessageBus::Mqtt)
        .store_path(dir.path().join("store.json"))
        .bridges_dir(dir.path().join("bridges"))
        .build()
        .unwrap();
    let store = Arc::new(JsonFileStore::new(&config.store.path));
    let restarter = Arc::new(RecordingRestarter::new());
    let manager = SubordinatesManager::from_config(&config, store, DirectoryLock::new())
        .with_restarter(restarter.clone());
    (manager, restarter)
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = TempDir::new().unwrap();

    {
        let (manager, restarter) = manager_in(&dir);
        let token = TokenBuilder::new("1122334455667788")
            .ipv4("wan", &["10.0.0.2"])
            .build();
        assert!(manager.add_subordinate(&token).await.unwrap().is_applied());
        assert!(manager
            .add_sub_subordinate("8877665544332211", "1122334455667788")
            .await
            .unwrap()
            .is_applied());
        assert!(manager
            .update_subordinate("1122334455667788", "office", None)
            .await
            .unwrap()
            .is_applied());
        assert_eq!(restarter.count(), 2);
    }

    let (manager, _) = manager_in(&dir);
    let listing = manager.list().await.unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].controller_id, "1122334455667788");
    assert_eq!(listing[0].options.custom_name, "office");
    assert_eq!(listing[0].options.ip_address, "10.0.0.2");
    assert_eq!(listing[0].subsubordinates[0].controller_id, "8877665544332211");

    assert!(manager.delete("1122334455667788").await.unwrap().is_applied());
    let reopened = JsonFileStore::new(dir.path().join("store.json"));
    assert!(reopened.read(STRUCTURAL_NAMESPACE).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_address_change_restarts_only_when_different() {
    let dir = TempDir::new().unwrap();
    let (manager, restarter) = manager_in(&dir);
    let token = TokenBuilder::new("1122334455667788").build();
    assert!(manager.add_subordinate(&token).await.unwrap().is_applied());
    let baseline = restarter.count();

    assert!(manager
        .update_subordinate("1122334455667788", "", Some("123.123.123.123"))
        .await
        .unwrap()
        .is_applied());
    assert_eq!(restarter.count(), baseline);

    assert!(manager
        .update_subordinate("1122334455667788", "", Some("192.168.1.9"))
        .await
        .unwrap()
        .is_applied());
    assert_eq!(restarter.count(), baseline + 1);
    assert_eq!(
        manager.list().await.unwrap()[0].options.ip_address,
        "192.168.1.9"
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_credential_file_modes() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let (manager, _) = manager_in(&dir);
    let token = TokenBuilder::new("1122334455667788").build();
    assert!(manager.add_subordinate(&token).await.unwrap().is_applied());

    let key = manager.credentials().path_for("1122334455667788").unwrap().join("token.key");
    let mode = std::fs::metadata(key).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
