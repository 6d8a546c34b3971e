use std::sync::Arc;
use std::time::Duration;

use offline::{BlobStore, FileBlob, StorageError};

use crate::support::{open_files, setup};

fn attachment(name: &str) -> FileBlob {
    FileBlob::new(name, "image/jpeg", format!("bytes of {name}").into_bytes())
}

#[tokio::test]
async fn listing_filters_by_attribute_within_a_job() {
    let stores = setup().await;
    let files = &stores.files;

    let mut a1 = Vec::new();
    for name in ["front.jpg", "back.jpg", "side.jpg"] {
        a1.push(files.put("J2", "A1", attachment(name)).await.unwrap());
    }
    let a2 = files.put("J2", "A2", attachment("meter.jpg")).await.unwrap();
    files.put("J3", "A1", attachment("other-job.jpg")).await.unwrap();

    let listed_a1 = files.list_for_job_and_attribute("J2", "A1").await.unwrap();
    let mut ids: Vec<_> = listed_a1.iter().map(|r| r.file_id.clone()).collect();
    ids.sort();
    a1.sort();
    assert_eq!(ids, a1);
    assert!(listed_a1.iter().all(|r| r.job_id == "J2" && r.attribute_id == "A1"));

    let listed_a2 = files.list_for_job_and_attribute("J2", "A2").await.unwrap();
    assert_eq!(listed_a2.len(), 1);
    assert_eq!(listed_a2[0].file_id, a2);
    assert_eq!(listed_a2[0].blob.name, "meter.jpg");

    assert!(
        files
            .list_for_job_and_attribute("J2", "A9")
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn staged_files_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let blob = FileBlob::new("plan.pdf", "application/pdf", vec![0x25, 0x50, 0x44, 0x46]);

    let id = {
        let store = open_files(&dir).await;
        let id = store.put("J7", "A1", blob.clone()).await.unwrap();
        store.close().await.unwrap();
        id
    };

    let store = open_files(&dir).await;
    assert_eq!(store.get(&id).await.unwrap(), blob);
}

#[tokio::test]
async fn concurrent_initialize_opens_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(BlobStore::new(dir.path().join("nested/files.db")));

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store.initialize().await.map(|_| ())?;
            store
                .put("J1", &format!("A{i}"), attachment("concurrent.jpg"))
                .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for i in 0..8 {
        let listed = store
            .list_for_job_and_attribute("J1", &format!("A{i}"))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
    }
}

#[tokio::test]
async fn evicted_file_reads_as_not_found() {
    let stores = setup().await;
    let id = stores
        .files
        .put("J1", "A1", attachment("old.jpg"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let removed = stores.files.sweep_older_than(Duration::ZERO).await.unwrap();

    assert_eq!(removed, 1);
    assert!(matches!(
        stores.files.get(&id).await,
        Err(StorageError::NotFound(_))
    ));
}
