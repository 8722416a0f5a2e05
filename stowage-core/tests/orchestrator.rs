use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use std::sync::Arc;
use stowage_core::{
    BlobDb, ContentStore, ContentStoreBuilder, MetadataStore, RetrieveBlobOperation,
    RetrieveBlobOperationRequest, SqliteMetadataStore, StoreBlobOperation,
    StoreBlobOperationRequest, StowageError,
};
use tempfile::TempDir;

struct Harness {
    _temp: TempDir,
    content: Arc<dyn ContentStore>,
    metadata: Arc<dyn MetadataStore>,
}

fn harness(backend: &str) -> Harness {
    let temp = tempfile::tempdir().unwrap();
    let db = BlobDb::open(temp.path().join("blobs.db")).unwrap();

    let content = ContentStoreBuilder::new()
        .backend(backend)
        .filesystem_root(temp.path().join("blobs"))
        .database(db.clone())
        .build()
        .unwrap();
    let metadata: Arc<dyn MetadataStore> = Arc::new(SqliteMetadataStore::new(db));

    Harness {
        _temp: temp,
        content,
        metadata,
    }
}

const BACKENDS: [&str; 2] = ["filesystem", "database"];

#[tokio::test]
async fn test_roundtrip_on_local_backends() {
    let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    let encoded = STANDARD.encode(&payload);

    for backend in BACKENDS {
        let h = harness(backend);
        let store = StoreBlobOperation::new(h.content.clone(), h.metadata.clone());
        let retrieve = RetrieveBlobOperation::new(h.content.clone(), h.metadata.clone());

        let stored = store
            .run(StoreBlobOperationRequest {
                data: encoded.clone(),
            })
            .await
            .unwrap();
        assert_eq!(stored.size, payload.len() as u64, "{}", backend);

        let result = retrieve
            .run(RetrieveBlobOperationRequest {
                id: stored.id.clone(),
            })
            .await
            .unwrap();
        assert_eq!(STANDARD.decode(&result.data).unwrap(), payload, "{}", backend);
        assert_eq!(result.size, stored.size);
        assert_eq!(result.created_at, stored.created_at, "{}", backend);
    }
}

#[tokio::test]
async fn test_hello_scenario() {
    let h = harness("filesystem");
    let store = StoreBlobOperation::new(h.content.clone(), h.metadata.clone());
    let retrieve = RetrieveBlobOperation::new(h.content.clone(), h.metadata.clone());

    let stored = store
        .run(StoreBlobOperationRequest {
            data: "SGVsbG8=".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(stored.size, 5);
    assert!((chrono::Utc::now() - stored.created_at).num_seconds() < 5);

    let result = retrieve
        .run(RetrieveBlobOperationRequest { id: stored.id })
        .await
        .unwrap();
    assert_eq!(STANDARD.decode(result.data).unwrap(), b"Hello");
}

#[tokio::test]
async fn test_absent_ids_on_local_backends() {
    for backend in BACKENDS {
        let h = harness(backend);

        assert!(!h.content.exists("never-stored").await.unwrap(), "{}", backend);
        h.content.delete("never-stored").await.unwrap();
        h.content.delete("never-stored").await.unwrap();
        assert!(h.content.get("never-stored").await.unwrap_err().is_not_found());
    }
}

#[tokio::test]
async fn test_delete_then_retrieve_is_io_error() {
    for backend in BACKENDS {
        let h = harness(backend);
        let store = StoreBlobOperation::new(h.content.clone(), h.metadata.clone());
        let retrieve = RetrieveBlobOperation::new(h.content.clone(), h.metadata.clone());

        let stored = store
            .run(StoreBlobOperationRequest {
                data: "AQID".to_string(),
            })
            .await
            .unwrap();
        h.content.delete(&stored.id).await.unwrap();

        let err = retrieve
            .run(RetrieveBlobOperationRequest { id: stored.id })
            .await
            .unwrap_err();
        assert!(matches!(err, StowageError::Io(_)), "{}: {}", backend, err);
    }
}

#[tokio::test]
async fn test_restore_keeps_created_at_in_sqlite() {
    let h = harness("database");
    let first = chrono::Utc::now() - chrono::Duration::minutes(10);

    h.content.save("fixed", Bytes::from("abc")).await.unwrap();
    h.metadata.upsert("fixed", 3, first).await.unwrap();
    h.content.save("fixed", Bytes::from("abcdef")).await.unwrap();
    h.metadata
        .upsert("fixed", 6, chrono::Utc::now())
        .await
        .unwrap();

    let retrieve = RetrieveBlobOperation::new(h.content.clone(), h.metadata.clone());
    let result = retrieve
        .run(RetrieveBlobOperationRequest {
            id: "fixed".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(result.size, 6);
    assert_eq!(result.created_at, first);
}

#[tokio::test]
async fn test_traversal_ids_stay_inside_root() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path().join("blobs");
    let content = ContentStoreBuilder::new()
        .backend("filesystem")
        .filesystem_root(&root)
        .build()
        .unwrap();

    content
        .save("../../etc/passwd", Bytes::from("not really"))
        .await
        .unwrap();

    assert!(!temp.path().join("etc").exists());
    assert!(root.join("etc").join("passwd").is_file());
}
