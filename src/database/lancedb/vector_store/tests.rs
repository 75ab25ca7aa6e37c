use super::*;
use crate::embeddings::DocumentChunk;
use tempfile::TempDir;

async fn create_test_store() -> (VectorStore, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = VectorStore::open(&temp_dir.path().join("vector_index"))
        .await
        .expect("should open vector store");
    (store, temp_dir)
}

fn record(document_id: &str, index: u32, content: &str, vector: Vec<f32>) -> EmbeddingRecord {
    let chunk = DocumentChunk {
        content: content.to_string(),
        page: index,
        source: "uploads/book.pdf".to_string(),
        start_index: 0,
    };
    EmbeddingRecord::from_chunk(document_id, index, &chunk, vector)
}

fn three_records(document_id: &str) -> Vec<EmbeddingRecord> {
    vec![
        record(document_id, 0, "about cells", vec![1.0, 0.0, 0.0]),
        record(document_id, 1, "about stars", vec![0.0, 1.0, 0.0]),
        record(document_id, 2, "about rivers", vec![0.0, 0.0, 1.0]),
    ]
}

#[tokio::test]
async fn open_creates_directory() {
    let (store, _temp_dir) = create_test_store().await;
    assert!(store.path().is_dir());
    assert!(
        store
            .table_names()
            .await
            .expect("should list tables")
            .is_empty()
    );
}

#[tokio::test]
async fn create_index_stores_every_record() {
    let (store, _temp_dir) = create_test_store().await;

    store
        .create_index("doc_a", &three_records("a"))
        .await
        .expect("should create index");

    assert_eq!(store.count_embeddings("doc_a").await.expect("count"), 3);
}

#[tokio::test]
async fn search_returns_nearest_first() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .create_index("doc_a", &three_records("a"))
        .await
        .expect("should create index");

    let results = store
        .search_similar("doc_a", &[0.1, 0.9, 0.0], 2)
        .await
        .expect("search should succeed");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].chunk_metadata.content, "about stars");
    assert_eq!(results[0].chunk_metadata.page, 1);
    assert_eq!(results[0].chunk_metadata.document_id, "a");
    assert!(results[0].distance <= results[1].distance);
}

#[tokio::test]
async fn limit_larger_than_table_returns_everything() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .create_index("doc_a", &three_records("a"))
        .await
        .expect("should create index");

    let results = store
        .search_similar("doc_a", &[1.0, 0.0, 0.0], 10)
        .await
        .expect("search should succeed");

    assert_eq!(results.len(), 3);
}

#[tokio::test]
async fn recreating_index_replaces_contents() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .create_index("doc_a", &three_records("a"))
        .await
        .expect("should create index");

    let replacement = vec![record("a", 0, "only chunk", vec![0.5, 0.5])];
    store
        .create_index("doc_a", &replacement)
        .await
        .expect("should recreate index");

    assert_eq!(store.count_embeddings("doc_a").await.expect("count"), 1);
    let results = store
        .search_similar("doc_a", &[0.5, 0.5], 5)
        .await
        .expect("search should accept the new width");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk_metadata.content, "only chunk");
}

#[tokio::test]
async fn tables_are_isolated() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .create_index("doc_a", &three_records("a"))
        .await
        .expect("should create first index");
    store
        .create_index(
            "doc_b",
            &[record("b", 0, "second book", vec![1.0, 0.0, 0.0])],
        )
        .await
        .expect("should create second index");

    let results = store
        .search_similar("doc_b", &[1.0, 0.0, 0.0], 5)
        .await
        .expect("search should succeed");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk_metadata.content, "second book");
}

#[tokio::test]
async fn empty_or_ragged_records_are_rejected() {
    let (store, _temp_dir) = create_test_store().await;

    let empty = store.create_index("doc_a", &[]).await;
    assert!(matches!(empty, Err(AgentError::Database(_))));

    let ragged = vec![
        record("a", 0, "three", vec![1.0, 0.0, 0.0]),
        record("a", 1, "two", vec![1.0, 0.0]),
    ];
    let error = store
        .create_index("doc_a", &ragged)
        .await
        .expect_err("dimensions differ");
    assert!(error.to_string().contains("Inconsistent embedding dimensions"));
}

#[tokio::test]
async fn drop_table_reports_whether_it_existed() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .create_index("doc_a", &three_records("a"))
        .await
        .expect("should create index");

    assert!(store.drop_table_if_exists("doc_a").await.expect("drop"));
    assert!(!store.drop_table_if_exists("doc_a").await.expect("drop again"));
    assert!(store.search_similar("doc_a", &[1.0, 0.0, 0.0], 1).await.is_err());
}

#[tokio::test]
async fn clearing_removes_only_document_tables() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .create_index("doc_a", &three_records("a"))
        .await
        .expect("should create index");
    store
        .create_index("doc_b", &three_records("b"))
        .await
        .expect("should create index");
    store
        .create_index("notes", &three_records("n"))
        .await
        .expect("should create index");

    let dropped = store.clear_document_tables().await.expect("clear");

    assert_eq!(dropped, 2);
    assert_eq!(
        store.table_names().await.expect("should list tables"),
        vec!["notes".to_string()]
    );
}
