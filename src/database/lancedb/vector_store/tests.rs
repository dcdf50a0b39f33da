use super::escape_literal as escape_literal_impl;
use super::score_rows as score_rows_impl;
use super::source_predicate as source_predicate_impl;
use super::*;
use tempfile::TempDir;

const DIM: usize = 4;

async fn create_test_store() -> (VectorStore, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = VectorStore::open_at(&temp_dir.path().join("vectors"), DIM)
        .await
        .expect("should open store");
    (store, temp_dir)
}

fn record(source: &str, index: u32, vector: [f32; DIM]) -> ChunkRecord {
    ChunkRecord::new(
        source,
        index,
        format!("Chunk {} of {}", index, source),
        vector.to_vec(),
    )
}

#[test]
fn escape_literal() {
    assert_eq!(escape_literal_impl("plain"), "plain");
    assert_eq!(escape_literal_impl("o'brien's"), "o''brien''s");
}

#[test]
fn source_predicate() {
    assert_eq!(
        source_predicate_impl("https://growlity.com"),
        "source_url = 'https://growlity.com'"
    );
    assert_eq!(
        source_predicate_impl("it's.txt"),
        "source_url = 'it''s.txt'"
    );
}

#[test]
fn score_rows() {
    let near = record("https://growlity.com", 0, [1.0, 0.0, 0.0, 0.0]);
    let hits = score_rows_impl(vec![(near.clone(), Some(0.25))]).expect("should score");
    assert_eq!(hits.len(), 1);
    assert!((hits[0].score - 0.75).abs() < 1e-6);
    assert!((hits[0].distance - 0.25).abs() < 1e-6);
    assert_eq!(hits[0].chunk, near);
}

#[test]
fn score_rows_rejects_missing_distance() {
    let rows = vec![
        (record("https://growlity.com", 0, [1.0, 0.0, 0.0, 0.0]), Some(0.1)),
        (record("https://growlity.com", 1, [0.0, 1.0, 0.0, 0.0]), None),
    ];
    let err = score_rows_impl(rows).expect_err("unranked rows must not become hits");
    assert!(err.to_string().contains("_distance"));
}

#[tokio::test]
async fn open_creates_empty_table() {
    let (store, _temp_dir) = create_test_store().await;

    assert_eq!(store.dimension(), DIM);
    assert_eq!(store.table_name, "chunks");
    assert_eq!(store.count_chunks().await.expect("count"), 0);
    assert!(store.sample_chunk().await.expect("sample").is_none());
}

#[tokio::test]
async fn open_from_config_uses_vectors_dir() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config::with_base_dir(temp_dir.path());
    config.gemini.embedding_dimension = 64;

    let store = VectorStore::open(&config).await.expect("should open store");

    assert_eq!(store.dimension(), 64);
    assert!(temp_dir.path().join("vectors").is_dir());
}

#[tokio::test]
async fn zero_dimension_is_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    assert!(VectorStore::open_at(temp_dir.path(), 0).await.is_err());
}

#[tokio::test]
async fn replace_source_chunks_replaces_only_that_source() {
    let (store, _temp_dir) = create_test_store().await;
    let about = "https://growlity.com/about";
    let team = "https://growlity.com/our-team";

    let first = vec![
        record(about, 0, [1.0, 0.0, 0.0, 0.0]),
        record(about, 1, [0.0, 1.0, 0.0, 0.0]),
        record(about, 2, [0.0, 0.0, 1.0, 0.0]),
    ];
    assert_eq!(
        store.replace_source_chunks(about, &first).await.expect("store"),
        3
    );
    store
        .replace_source_chunks(team, &[record(team, 0, [0.0, 0.0, 0.0, 1.0])])
        .await
        .expect("store");

    assert_eq!(store.count_chunks().await.expect("count"), 4);
    assert_eq!(store.count_source_chunks(about).await.expect("count"), 3);

    let second = vec![record(about, 0, [0.5, 0.5, 0.0, 0.0])];
    store
        .replace_source_chunks(about, &second)
        .await
        .expect("replace");

    assert_eq!(store.count_source_chunks(about).await.expect("count"), 1);
    assert_eq!(store.count_source_chunks(team).await.expect("count"), 1);
    assert_eq!(store.count_chunks().await.expect("count"), 2);
}

#[tokio::test]
async fn replace_with_no_records_clears_source() {
    let (store, _temp_dir) = create_test_store().await;
    let source = "company-info.txt";

    store
        .replace_source_chunks(source, &[record(source, 0, [1.0, 1.0, 0.0, 0.0])])
        .await
        .expect("store");
    assert_eq!(
        store.replace_source_chunks(source, &[]).await.expect("clear"),
        0
    );
    assert_eq!(store.count_source_chunks(source).await.expect("count"), 0);
}

#[tokio::test]
async fn wrong_dimension_does_not_delete_existing_chunks() {
    let (store, _temp_dir) = create_test_store().await;
    let source = "https://growlity.com";

    store
        .replace_source_chunks(source, &[record(source, 0, [1.0, 0.0, 0.0, 0.0])])
        .await
        .expect("store");

    let bad = ChunkRecord::new(source, 0, "bad".to_string(), vec![1.0, 2.0]);
    assert!(store.replace_source_chunks(source, &[bad]).await.is_err());
    assert_eq!(store.count_source_chunks(source).await.expect("count"), 1);
}

#[tokio::test]
async fn records_must_belong_to_source() {
    let (store, _temp_dir) = create_test_store().await;
    let foreign = record("https://other.example", 0, [1.0, 0.0, 0.0, 0.0]);

    assert!(
        store
            .replace_source_chunks("https://growlity.com", &[foreign])
            .await
            .is_err()
    );
}

#[tokio::test]
async fn quoted_sources_are_escaped() {
    let (store, _temp_dir) = create_test_store().await;
    let source = "https://example.com/o'brien";

    store
        .replace_source_chunks(source, &[record(source, 0, [1.0, 0.0, 0.0, 0.0])])
        .await
        .expect("store");
    assert_eq!(store.count_source_chunks(source).await.expect("count"), 1);

    store
        .delete_source_chunks(source)
        .await
        .expect("delete");
    assert_eq!(store.count_chunks().await.expect("count"), 0);
}

#[tokio::test]
async fn search_similar_orders_by_cosine_similarity() {
    let (store, _temp_dir) = create_test_store().await;
    let source = "https://growlity.com/solutions";

    let records = vec![
        record(source, 0, [0.0, 1.0, 0.0, 0.0]),
        record(source, 1, [1.0, 0.0, 0.0, 0.0]),
        record(source, 2, [-1.0, 0.0, 0.0, 0.0]),
        record(source, 3, [1.0, 1.0, 0.0, 0.0]),
    ];
    store
        .replace_source_chunks(source, &records)
        .await
        .expect("store");

    let hits = store
        .search_similar(&[2.0, 0.0, 0.0, 0.0], 3)
        .await
        .expect("search");

    assert_eq!(hits.len(), 3);
    let indices: Vec<u32> = hits.iter().map(|h| h.chunk.chunk_index).collect();
    assert_eq!(indices, vec![1, 3, 0]);

    assert!((hits[0].score - 1.0).abs() < 1e-3);
    assert!((hits[1].score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-3);
    assert!(hits[2].score.abs() < 1e-3);
    assert!((hits[0].score + hits[0].distance - 1.0).abs() < 1e-6);

    assert_eq!(hits[0].chunk.text, format!("Chunk 1 of {}", source));
    assert_eq!(hits[0].chunk.source_url, source);
    assert_eq!(hits[0].chunk.vector, vec![1.0, 0.0, 0.0, 0.0]);
}

#[tokio::test]
async fn search_rejects_wrong_dimension() {
    let (store, _temp_dir) = create_test_store().await;
    assert!(store.search_similar(&[1.0, 0.0], 5).await.is_err());
}

#[tokio::test]
async fn sample_chunk_returns_stored_record() {
    let (store, _temp_dir) = create_test_store().await;
    let stored = record("company-info.txt", 0, [0.0, 0.0, 1.0, 0.0]);

    store
        .replace_source_chunks("company-info.txt", std::slice::from_ref(&stored))
        .await
        .expect("store");

    let sample = store
        .sample_chunk()
        .await
        .expect("sample")
        .expect("should have a chunk");
    assert_eq!(sample, stored);
}

#[tokio::test]
async fn reopen_with_new_dimension() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("vectors");

    // Empty table: recreated with the new dimension
    VectorStore::open_at(&path, DIM).await.expect("open");
    let store = VectorStore::open_at(&path, 8).await.expect("reopen empty");
    assert_eq!(store.dimension(), 8);

    let source = "company-info.txt";
    let stored = ChunkRecord::new(source, 0, "text".to_string(), vec![0.5; 8]);
    store
        .replace_source_chunks(source, &[stored])
        .await
        .expect("store");

    // Populated table: refusing protects the stored vectors
    assert!(VectorStore::open_at(&path, DIM).await.is_err());
    let store = VectorStore::open_at(&path, 8).await.expect("reopen same");
    assert_eq!(store.count_chunks().await.expect("count"), 1);
}
