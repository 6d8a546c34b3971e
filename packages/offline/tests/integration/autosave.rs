use std::sync::{Arc, RwLock};
use std::time::Duration;

use offline::AutoSaveController;
use serde::Serialize;
use serde_json::json;

use crate::support::setup;

#[derive(Serialize)]
struct InspectionForm {
    notes: String,
    checked: Vec<String>,
}

#[tokio::test]
async fn typed_form_round_trips_through_filesystem_store() {
    let stores = setup().await;
    let form = Arc::new(RwLock::new(InspectionForm {
        notes: "initial".into(),
        checked: vec![],
    }));
    let mut controller =
        AutoSaveController::new(Arc::clone(&stores.drafts), Duration::from_millis(50));

    assert!(controller.bind("J1", form.clone()).await.unwrap());
    assert!(!controller.save_now().await.unwrap());

    {
        let mut form = form.write().unwrap();
        form.notes = "chimney cracked".into();
        form.checked.push("roof".into());
    }
    assert!(controller.save_now().await.unwrap());
    controller.unbind().await;

    assert_eq!(
        stores.drafts.get("J1").await.unwrap(),
        Some(json!({"notes": "chimney cracked", "checked": ["roof"]}))
    );
}

#[tokio::test]
async fn ticking_persists_changes_in_real_time() {
    let stores = setup().await;
    let form = Arc::new(RwLock::new(json!({"notes": "a"})));
    let mut controller =
        AutoSaveController::new(Arc::clone(&stores.drafts), Duration::from_millis(20));
    controller.bind("J5", form.clone()).await.unwrap();

    *form.write().unwrap() = json!({"notes": "ab"});

    let mut saved = None;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        saved = controller.load().await.unwrap();
        if saved.is_some() {
            break;
        }
    }
    controller.unbind().await;

    assert_eq!(saved, Some(json!({"notes": "ab"})));
}
