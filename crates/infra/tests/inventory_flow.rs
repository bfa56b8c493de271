//! Black-box inventory flow: configuration → store → adapter → snapshots.

use std::collections::HashMap;
use std::time::Duration;

use pantry_core::{ItemName, Quantity};
use pantry_infra::{InventoryError, MutationMode, StoreConfig, StoreError};

fn config(vars: &[(&str, &str)]) -> StoreConfig {
    let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    StoreConfig::from_lookup(|var| map.get(var).cloned()).expect("valid config")
}

fn qty(n: i64) -> Quantity {
    Quantity::new(n).unwrap()
}

#[tokio::test]
async fn pantry_session_from_config() {
    pantry_observability::init();

    for mode in ["read-modify-write", "atomic"] {
        let inventory = config(&[("PANTRY_MUTATION_MODE", mode)])
            .open_inventory()
            .await
            .expect("in-memory store opens");

        // Initial load, as the page does on mount.
        assert!(inventory.list().await.unwrap().is_empty());
        let updates = inventory.subscribe();

        inventory.add("apple").await.unwrap();
        inventory.add("apple").await.unwrap();
        let snapshot = inventory.add("banana").await.unwrap();
        assert_eq!(snapshot.quantity_of("apple"), Some(qty(2)));
        assert_eq!(snapshot.quantity_of("banana"), Some(qty(1)));

        let labels: Vec<_> = snapshot
            .items
            .iter()
            .map(|item| format!("{}: {}", item.name.display_name(), item.quantity))
            .collect();
        assert_eq!(labels, vec!["Apple: 2", "Banana: 1"]);

        inventory.decrease_quantity("apple").await.unwrap();
        let snapshot = inventory.remove("apple").await.unwrap();
        assert!(!snapshot.contains("apple"));
        assert_eq!(snapshot.quantity_of("banana"), Some(Quantity::ONE));

        inventory.increase_quantity("banana").await.unwrap();

        // One published snapshot per operation, newest last.
        let mut seen = 0;
        let mut last = None;
        while let Ok(s) = updates.recv_timeout(Duration::from_millis(10)) {
            seen += 1;
            last = Some(s);
        }
        assert_eq!(seen, 6);
        let last = last.unwrap();
        assert_eq!(last.quantity_of("banana"), Some(qty(2)));
        assert!(inventory.latest().unwrap().same_contents(&last));
    }
}

#[tokio::test]
async fn execute_matches_named_operations() {
    let inventory = config(&[]).open_inventory().await.unwrap();
    assert_eq!(inventory.mode(), MutationMode::ReadModifyWrite);

    let snapshot = inventory
        .execute(ItemName::new("tea"), pantry_inventory::InventoryCommand::Add)
        .await
        .unwrap();
    assert_eq!(snapshot.quantity_of("tea"), Some(Quantity::ONE));
}

#[test]
fn store_failures_convert_into_adapter_errors() {
    let err: InventoryError = StoreError::transport("down").into();
    assert!(!err.mutation_applied());
    assert_eq!(err.store_error(), &StoreError::transport("down"));
    assert_eq!(err.to_string(), "store transport failure: down");
}
