use devagent_code_units::{content_hash, unit_id, CodeUnit, UnitKind};
use devagent_embedding_index::{paths, EmbeddingStore, HashEmbedder};
use devagent_retrieval::{ContextRetriever, RetrievalError, RetrievalQuery};
use std::sync::Arc;
use tempfile::TempDir;

fn unit(file: &str, name: &str, kind: UnitKind, language: &str, source: &str) -> CodeUnit {
    CodeUnit {
        id: unit_id(file, name),
        kind,
        qualified_name: name.to_string(),
        file_path: file.to_string(),
        start_line: 1,
        end_line: source.lines().count().max(1),
        start_byte: 0,
        end_byte: source.len(),
        source: source.to_string(),
        doc: None,
        language: language.to_string(),
        content_hash: content_hash(source),
    }
}

/// Build and persist an index with a small mixed corpus
async fn indexed_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let embedder = HashEmbedder::new();
    let mut store = EmbeddingStore::new(paths::store_path(dir.path()), &embedder);

    let a_units = vec![
        unit(
            "a.py",
            "fetch_user",
            UnitKind::Function,
            "python",
            "def fetch_user(db, user_id):\n    return db.users.get(user_id)",
        ),
        unit(
            "a.py",
            "cache_result",
            UnitKind::Function,
            "python",
            "def cache_result(key, value):\n    cache.set(key, value)",
        ),
    ];
    let b_units = vec![unit(
        "b.py",
        "handler",
        UnitKind::Function,
        "python",
        "def handler(request):\n    user = fetch_user(db, request.user_id)\n    return user",
    )];
    let c_units = vec![unit(
        "web/render.ts",
        "renderPage",
        UnitKind::Function,
        "typescript",
        "function renderPage(template: Template) {\n  return template.html();\n}",
    )];

    store.index_file_units("a.py", a_units, &embedder).await.unwrap();
    store.index_file_units("b.py", b_units, &embedder).await.unwrap();
    store
        .index_file_units("web/render.ts", c_units, &embedder)
        .await
        .unwrap();
    store.save().await.unwrap();
    dir
}

async fn retriever(dir: &TempDir) -> ContextRetriever {
    ContextRetriever::open(dir.path(), Arc::new(HashEmbedder::new()))
        .await
        .unwrap()
}

#[tokio::test]
async fn retrieves_semantically_closest_unit_first() {
    let dir = indexed_project().await;
    let results = retriever(&dir)
        .await
        .retrieve(&RetrievalQuery::new("fetch_user db user_id"))
        .await
        .unwrap();

    assert!(!results.is_empty());
    assert_eq!(results[0].unit.qualified_name, "fetch_user");
}

#[tokio::test]
async fn retrieval_is_deterministic() {
    let dir = indexed_project().await;
    let r = retriever(&dir).await;
    let query = RetrievalQuery::new("user request handling");

    let first = r.retrieve(&query).await.unwrap();
    let second = r.retrieve(&query).await.unwrap();

    let first_ids: Vec<&str> = first.iter().map(|s| s.unit.id.as_str()).collect();
    let second_ids: Vec<&str> = second.iter().map(|s| s.unit.id.as_str()).collect();
    assert_eq!(first_ids, second_ids);
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.score, b.score);
    }
}

#[tokio::test]
async fn k_truncates_results() {
    let dir = indexed_project().await;
    let results = retriever(&dir)
        .await
        .retrieve(&RetrievalQuery::new("anything").with_k(2))
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn language_and_kind_filters_apply() {
    let dir = indexed_project().await;
    let r = retriever(&dir).await;

    let ts_only = r
        .retrieve(&RetrievalQuery::new("render").with_language("typescript"))
        .await
        .unwrap();
    assert!(ts_only.iter().all(|s| s.unit.language == "typescript"));
    assert_eq!(ts_only.len(), 1);

    let py_functions = r
        .retrieve(
            &RetrievalQuery::new("anything")
                .with_language("python")
                .with_kind(UnitKind::Function),
        )
        .await
        .unwrap();
    assert_eq!(py_functions.len(), 3);
}

#[tokio::test]
async fn path_prefix_filter_applies() {
    let dir = indexed_project().await;
    let results = retriever(&dir)
        .await
        .retrieve(&RetrievalQuery::new("anything").with_path_prefix("web/"))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].unit.file_path, "web/render.ts");
}

#[tokio::test]
async fn anchor_bonus_lifts_same_file_units() {
    let dir = indexed_project().await;
    let r = retriever(&dir).await;

    let without = r
        .retrieve(&RetrievalQuery::new("template rendering").with_k(10))
        .await
        .unwrap();
    let with = r
        .retrieve(
            &RetrievalQuery::new("template rendering")
                .with_k(10)
                .with_anchor("fetch_user"),
        )
        .await
        .unwrap();

    let score_of = |results: &[devagent_retrieval::ScoredUnit], name: &str| {
        results
            .iter()
            .find(|s| s.unit.qualified_name == name)
            .map(|s| s.score)
            .unwrap()
    };

    // cache_result shares a.py with the anchor, handler calls the anchor;
    // both gain the bonus, renderPage does not
    let bonus = score_of(&with, "cache_result") - score_of(&without, "cache_result");
    assert!((bonus - 0.15).abs() < 1e-5);
    let bonus = score_of(&with, "handler") - score_of(&without, "handler");
    assert!((bonus - 0.15).abs() < 1e-5);
    let bonus = score_of(&with, "renderPage") - score_of(&without, "renderPage");
    assert!(bonus.abs() < 1e-6);
}

#[tokio::test]
async fn anchor_itself_is_excluded() {
    let dir = indexed_project().await;
    let results = retriever(&dir)
        .await
        .retrieve(
            &RetrievalQuery::new("fetch_user db user_id")
                .with_k(10)
                .with_anchor("fetch_user"),
        )
        .await
        .unwrap();
    assert!(results.iter().all(|s| s.unit.qualified_name != "fetch_user"));
}

#[tokio::test]
async fn unknown_anchor_is_an_error() {
    let dir = indexed_project().await;
    let err = retriever(&dir)
        .await
        .retrieve(&RetrievalQuery::new("x").with_anchor("does_not_exist"))
        .await
        .unwrap_err();
    assert!(matches!(err, RetrievalError::UnknownAnchor(_)));
}

#[tokio::test]
async fn file_units_in_source_order() {
    let dir = indexed_project().await;
    let r = retriever(&dir).await;
    let units = r.file_units("a.py");
    assert_eq!(units.len(), 2);
    let empty = r.file_units("missing.py");
    assert!(empty.is_empty());
}

#[tokio::test]
async fn missing_index_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = ContextRetriever::open(dir.path(), Arc::new(HashEmbedder::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, RetrievalError::NoIndex { .. }));
}

#[tokio::test]
async fn model_mismatch_is_an_error() {
    let dir = TempDir::new().unwrap();
    let small = HashEmbedder::with_dimension(128);
    let mut store = EmbeddingStore::new(paths::store_path(dir.path()), &small);
    store
        .index_file_units(
            "a.py",
            vec![unit(
                "a.py",
                "f",
                UnitKind::Function,
                "python",
                "def f(): pass",
            )],
            &small,
        )
        .await
        .unwrap();
    store.save().await.unwrap();

    let err = ContextRetriever::open(dir.path(), Arc::new(HashEmbedder::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, RetrievalError::ModelMismatch { .. }));
}

#[tokio::test]
async fn empty_store_returns_no_results() {
    let dir = TempDir::new().unwrap();
    let embedder = HashEmbedder::new();
    let mut store = EmbeddingStore::new(paths::store_path(dir.path()), &embedder);
    store
        .upsert(devagent_embedding_index::EmbeddingRecord::new(
            unit("a.py", "f", UnitKind::Function, "python", "def f(): pass"),
            vec![0.0; 384],
        ))
        .unwrap();
    store.remove(&unit_id("a.py", "f"));
    store.save().await.unwrap();

    let results = retriever(&dir)
        .await
        .retrieve(&RetrievalQuery::new("anything"))
        .await
        .unwrap();
    assert!(results.is_empty());
}
