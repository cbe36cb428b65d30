use super::*;
use tempfile::TempDir;

const EPSILON: f32 = 1e-6;

fn entry(id: u64, source: &str, embedding: Vec<f32>) -> StoreEntry {
    StoreEntry {
        id,
        source: source.to_string(),
        text: format!("chunk {} of {}", id, source),
        embedding,
    }
}

fn sample_entries() -> Vec<StoreEntry> {
    vec![
        entry(0, "a.md", vec![1.0, 0.0, 0.0]),
        entry(1, "a.md", vec![0.0, 1.0, 0.0]),
        entry(2, "b.txt", vec![0.7, 0.7, 0.0]),
        entry(3, "b.txt", vec![0.0, 0.0, 1.0]),
    ]
}

#[test]
fn identical_vectors_score_one() {
    let v = [0.3, -1.2, 4.5, 0.01];
    let score = cosine_similarity(&v, &v).expect("same dimension");
    assert!((score - 1.0).abs() < EPSILON, "got {score}");
}

#[test]
fn opposite_vectors_score_minus_one() {
    let v = [0.3, -1.2, 4.5, 0.01];
    let neg: Vec<f32> = v.iter().map(|x| -x).collect();
    let score = cosine_similarity(&v, &neg).expect("same dimension");
    assert!((score + 1.0).abs() < EPSILON, "got {score}");
}

#[test]
fn similarity_is_symmetric() {
    let a = [1.0, 2.0, 3.0];
    let b = [-0.5, 4.0, 0.25];
    let ab = cosine_similarity(&a, &b).expect("same dimension");
    let ba = cosine_similarity(&b, &a).expect("same dimension");
    assert!((ab - ba).abs() < EPSILON);
}

#[test]
fn zero_vector_scores_zero() {
    let zero = [0.0, 0.0, 0.0];
    let v = [1.0, 2.0, 3.0];
    assert_eq!(cosine_similarity(&zero, &v).expect("same dimension"), 0.0);
    assert_eq!(cosine_similarity(&v, &zero).expect("same dimension"), 0.0);
    assert_eq!(cosine_similarity(&zero, &zero).expect("same dimension"), 0.0);
}

#[test]
fn similarity_rejects_mismatched_lengths() {
    let result = cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]);
    assert!(matches!(
        result,
        Err(RagError::DimensionMismatch {
            expected: 2,
            actual: 3
        })
    ));
}

#[test]
fn search_orders_by_descending_score() {
    let entries = sample_entries();
    let results = search(&entries, &[1.0, 0.1, 0.0], 4).expect("search should succeed");

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].id, 0);
    assert_eq!(results[1].id, 2);
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn search_truncates_to_top_k() {
    let entries = sample_entries();
    let results = search(&entries, &[1.0, 0.0, 0.0], 2).expect("search should succeed");
    assert_eq!(results.len(), 2);
}

#[test]
fn search_top_k_larger_than_store_returns_everything() {
    let entries = sample_entries();
    let results =
        search(&entries, &[1.0, 0.0, 0.0], entries.len() + 5).expect("search should succeed");
    assert_eq!(results.len(), entries.len());
}

#[test]
fn search_top_k_zero_returns_nothing() {
    let results = search(&sample_entries(), &[1.0, 0.0, 0.0], 0).expect("search should succeed");
    assert!(results.is_empty());
}

#[test]
fn search_keeps_store_order_on_ties() {
    let entries = vec![
        entry(0, "x", vec![0.0, 1.0]),
        entry(1, "y", vec![1.0, 0.0]),
        entry(2, "z", vec![2.0, 0.0]),
        entry(3, "w", vec![3.0, 0.0]),
    ];

    let results = search(&entries, &[1.0, 0.0], 4).expect("search should succeed");
    let ids: Vec<u64> = results.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 0]);
}

#[test]
fn search_aborts_on_any_dimension_mismatch() {
    let mut entries = sample_entries();
    entries.push(entry(4, "bad.md", vec![1.0, 0.0]));

    let result = search(&entries, &[1.0, 0.0, 0.0], 10);
    assert!(matches!(result, Err(RagError::DimensionMismatch { .. })));
}

#[test]
fn search_result_carries_entry_fields() {
    let entries = sample_entries();
    let results = search(&entries, &[0.0, 0.0, 1.0], 1).expect("search should succeed");

    assert_eq!(results[0].id, 3);
    assert_eq!(results[0].source, "b.txt");
    assert_eq!(results[0].text, "chunk 3 of b.txt");
    assert!((results[0].score - 1.0).abs() < EPSILON);
}

#[test]
fn store_rejects_mixed_dimensions() {
    let mut entries = sample_entries();
    entries.push(entry(4, "bad.md", vec![1.0]));

    let result = VectorStore::new(entries);
    assert!(matches!(
        result,
        Err(RagError::DimensionMismatch {
            expected: 3,
            actual: 1
        })
    ));
}

#[test]
fn store_rejects_non_finite_embeddings() {
    for value in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
        let mut entries = sample_entries();
        entries.push(entry(4, "bad.md", vec![0.5, value, 0.0]));

        match VectorStore::new(entries) {
            Err(RagError::Store(message)) => {
                assert!(message.contains("entry 4 from bad.md"), "{message}");
            }
            other => panic!("expected store error for {value}, got {other:?}"),
        }
    }
}

#[test]
fn load_rejects_embedding_that_overflows_f32() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("store.json");
    std::fs::write(
        &path,
        r#"[{"id": 0, "source": "a.md", "text": "a", "embedding": [1e39, 0.0]}]"#,
    )
    .expect("write store");

    let result = VectorStore::load(&path);
    assert!(matches!(result, Err(RagError::Store(_))));
}

#[test]
fn search_rejects_non_finite_query() {
    let store = VectorStore::new(sample_entries()).expect("valid store");

    let result = store.search(&[f32::NAN, 0.0, 0.0], 2);
    assert!(matches!(result, Err(RagError::Store(_))));
}

#[test]
fn empty_store_searches_to_nothing() {
    let store = VectorStore::new(Vec::new()).expect("empty store is valid");
    assert!(store.is_empty());
    assert_eq!(store.dimension(), None);
    assert!(
        store
            .search(&[1.0, 2.0], 5)
            .expect("search should succeed")
            .is_empty()
    );
}

#[test]
fn save_then_load_round_trips() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("nested").join("store.json");
    let entries = sample_entries();

    save_store(&path, &entries).expect("save should succeed");
    let loaded = load_store(&path).expect("load should succeed");

    assert_eq!(loaded, entries);
    assert!(!temp_dir.path().join("nested").join("store.json.tmp").exists());
}

#[test]
fn save_uses_readable_keys_and_indentation() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("store.json");

    save_store(&path, &sample_entries()[..1]).expect("save should succeed");
    let content = std::fs::read_to_string(&path).expect("store file should exist");

    assert!(content.starts_with("[\n  {\n"));
    for key in ["\"id\"", "\"source\"", "\"text\"", "\"embedding\""] {
        assert!(content.contains(key), "missing {key}");
    }
}

#[test]
fn save_overwrites_whole_snapshot() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("store.json");

    let store = VectorStore::new(sample_entries()).expect("valid store");
    store.save(&path).expect("first save should succeed");

    let smaller = VectorStore::new(vec![entry(0, "only.md", vec![1.0, 1.0])]).expect("valid");
    smaller.save(&path).expect("second save should succeed");

    let loaded = VectorStore::load(&path).expect("load should succeed");
    assert_eq!(loaded, smaller);
    assert_eq!(loaded.dimension(), Some(2));
}

#[test]
fn load_missing_store_is_not_found() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("missing.json");

    let result = load_store(&path);
    assert!(matches!(result, Err(RagError::NotFound(p)) if p == path));
}

#[test]
fn load_corrupt_store_is_store_error() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("store.json");
    std::fs::write(&path, "{ not a store").expect("should write file");

    assert!(matches!(load_store(&path), Err(RagError::Store(_))));
}
