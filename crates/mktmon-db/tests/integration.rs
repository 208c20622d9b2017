//! Database-backed tests for run bookkeeping, seed sync, and semantic search.

use mktmon_db::{DbError, NewDocumentStub};
use sqlx::PgPool;

const EMBEDDING_DIM: usize = 1536;

fn unit_vector(axis: usize) -> pgvector::Vector {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    v[axis] = 1.0;
    pgvector::Vector::from(v)
}

async fn stub(pool: &PgPool, title: &str, url: &str) -> mktmon_db::DocumentRow {
    mktmon_db::insert_document_stub(
        pool,
        &NewDocumentStub {
            title: title.to_string(),
            source_url: url.to_string(),
            document_type: "html".to_string(),
            published_date: None,
            search_run_id: None,
        },
    )
    .await
    .expect("insert stub")
}

#[sqlx::test(migrations = "../../migrations")]
async fn run_transitions_are_guarded(pool: PgPool) {
    let run = mktmon_db::create_search_run(&pool, "monitoring", None)
        .await
        .expect("create run");
    assert_eq!(run.status, "running");

    mktmon_db::complete_search_run(&pool, run.id, 1_234)
        .await
        .expect("first completion");

    let err = mktmon_db::complete_search_run(&pool, run.id, 99)
        .await
        .expect_err("second completion must fail");
    assert!(matches!(err, DbError::InvalidRunTransition { .. }));

    let err = mktmon_db::fail_search_run(&pool, run.id, "late failure")
        .await
        .expect_err("terminal run cannot be failed");
    assert!(matches!(err, DbError::InvalidRunTransition { .. }));

    let row = mktmon_db::get_search_run_by_id(&pool, run.id)
        .await
        .expect("fetch run");
    assert_eq!(row.status, "completed");
    assert_eq!(row.execution_time_ms, Some(1_234));
}

#[sqlx::test(migrations = "../../migrations")]
async fn stage_transitions_are_guarded(pool: PgPool) {
    let run = mktmon_db::create_search_run(&pool, "monitoring", None)
        .await
        .expect("create run");
    let stage = mktmon_db::create_run_stage(&pool, run.id, "source_hunter")
        .await
        .expect("create stage");
    assert_eq!(stage.status, "running");

    mktmon_db::complete_run_stage(&pool, stage.id, 3, &serde_json::json!({ "urls_seen": 3 }))
        .await
        .expect("complete stage");

    let err = mktmon_db::fail_run_stage(&pool, stage.id, "too late")
        .await
        .expect_err("terminal stage cannot be failed");
    assert!(matches!(err, DbError::InvalidStageTransition { .. }));

    let stages = mktmon_db::list_run_stages(&pool, run.id)
        .await
        .expect("list stages");
    assert_eq!(stages.len(), 1);
    assert_eq!(stages[0].status, "success");
    assert_eq!(stages[0].documents_processed, 3);
    assert_eq!(stages[0].metadata["urls_seen"], 3);
}

#[sqlx::test(migrations = "../../migrations")]
async fn totals_accumulate_only_while_running(pool: PgPool) {
    let run = mktmon_db::create_search_run(&pool, "monitoring", None)
        .await
        .expect("create run");

    mktmon_db::add_run_totals(&pool, run.id, 5, 0).await.expect("first totals");
    mktmon_db::add_run_totals(&pool, run.id, 2, 3).await.expect("second totals");
    mktmon_db::complete_search_run(&pool, run.id, 10).await.expect("complete");

    let err = mktmon_db::add_run_totals(&pool, run.id, 1, 1)
        .await
        .expect_err("terminal run rejects totals");
    assert!(matches!(err, DbError::InvalidRunTransition { .. }));

    let row = mktmon_db::get_search_run_by_id(&pool, run.id)
        .await
        .expect("fetch run");
    assert_eq!(row.documents_created, 7);
    assert_eq!(row.events_created, 3);
}

#[sqlx::test(migrations = "../../migrations")]
async fn duplicate_brand_name_is_a_conflict(pool: PgPool) {
    mktmon_db::create_brand(&pool, "Acme Drinks", None)
        .await
        .expect("first brand");
    let err = mktmon_db::create_brand(&pool, "Acme Drinks", None)
        .await
        .expect_err("duplicate must conflict");
    assert!(matches!(err, DbError::Conflict(_)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn seed_sync_is_idempotent(pool: PgPool) {
    let yaml = r"
brands:
  - name: Acme Drinks
segments:
  - name: Functional Beverages
geographies:
  - name: United States
    iso_code: US
event_types:
  - slug: product_launch
    label: Product launch
";
    let seed: mktmon_core::SeedFile = serde_yaml::from_str(yaml).expect("parse seed");

    let first = mktmon_db::sync_seed(&pool, &seed).await.expect("first sync");
    assert_eq!(first.brands, 1);
    let second = mktmon_db::sync_seed(&pool, &seed).await.expect("second sync");
    assert_eq!(second.brands, 1);

    let brands = mktmon_db::list_active_brands(&pool).await.expect("brands");
    assert_eq!(brands.len(), 1, "resync must not duplicate rows");
    let segments = mktmon_db::list_segments(&pool).await.expect("segments");
    assert_eq!(segments.len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn document_lifecycle_updates_fields(pool: PgPool) {
    let doc = stub(&pool, "Launch coverage", "https://news.example.com/launch").await;
    assert!(doc.content_text.is_none());
    assert!(doc.fetched_at.is_none());

    mktmon_db::update_document_content(
        &pool,
        doc.id,
        "Acme launches a new line.",
        Some("<p>Acme launches a new line.</p>"),
        25,
        64,
    )
    .await
    .expect("write content");

    mktmon_db::mark_document_processed(&pool, doc.id, &unit_vector(0))
        .await
        .expect("store embedding");

    let row = mktmon_db::get_document_by_id(&pool, doc.id).await.expect("fetch");
    assert_eq!(row.content_text.as_deref(), Some("Acme launches a new line."));
    assert_eq!(row.content_length, Some(25));
    assert!(row.fetched_at.is_some());
    assert!(row.processed_at.is_some());
    assert!(row.error_message.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn semantic_search_ranks_and_thresholds(pool: PgPool) {
    let matching = stub(&pool, "Exact match", "https://news.example.com/a").await;
    let unrelated = stub(&pool, "Unrelated", "https://news.example.com/b").await;
    let unfetched = stub(&pool, "No embedding", "https://news.example.com/c").await;

    mktmon_db::mark_document_processed(&pool, matching.id, &unit_vector(0))
        .await
        .expect("embed matching");
    mktmon_db::mark_document_processed(&pool, unrelated.id, &unit_vector(1))
        .await
        .expect("embed unrelated");
    let _ = unfetched;

    // Query with the matching document's own vector.
    let hits = mktmon_db::semantic_search(&pool, &unit_vector(0), 0.7, 10)
        .await
        .expect("search");

    assert_eq!(hits.len(), 1, "orthogonal and unembedded documents excluded");
    assert_eq!(hits[0].title, "Exact match");
    assert!(hits[0].similarity >= 0.99, "self-similarity must be ~1.0");

    // Threshold zero admits everything with an embedding, best first.
    let hits = mktmon_db::semantic_search(&pool, &unit_vector(0), 0.0, 10)
        .await
        .expect("search");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].title, "Exact match");
    assert!(hits[0].similarity > hits[1].similarity);
}
