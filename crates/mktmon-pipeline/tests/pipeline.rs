//! End-to-end pipeline tests against a live Postgres (sqlx test databases)
//! with every upstream mocked by wiremock.

use mktmon_ai::{AiClient, AiConfig};
use mktmon_db::{NewMonitoringProfile, SearchRunStageRow};
use mktmon_fetcher::Fetcher;
use mktmon_pipeline::{run_search, PipelineContext, STAGE_ORDER};
use mktmon_search::SearchClient;
use sqlx::PgPool;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EMBEDDING_DIM: usize = 1536;

struct SeededRefs {
    segment: mktmon_db::SegmentRow,
    geography: mktmon_db::GeographyRow,
    brand: mktmon_db::BrandRow,
    event_type: mktmon_db::EventTypeRow,
    prompt: mktmon_db::PromptRow,
}

async fn seed_refs(pool: &PgPool) -> SeededRefs {
    let segment = mktmon_db::create_segment(pool, "Functional Beverages")
        .await
        .expect("seed segment");
    let geography = mktmon_db::create_geography(pool, "United States", Some("US"))
        .await
        .expect("seed geography");
    let brand = mktmon_db::create_brand(pool, "Acme Drinks", None)
        .await
        .expect("seed brand");
    let event_type = mktmon_db::create_event_type(pool, "product_launch", "Product launch")
        .await
        .expect("seed event type");
    let prompt = mktmon_db::create_prompt(pool, "default-hunt", "market events", "source_hunting")
        .await
        .expect("seed prompt");

    SeededRefs {
        segment,
        geography,
        brand,
        event_type,
        prompt,
    }
}

async fn seed_profile(pool: &PgPool, refs: &SeededRefs) -> mktmon_db::MonitoringProfileRow {
    mktmon_db::create_monitoring_profile(
        pool,
        &NewMonitoringProfile {
            name: "beverages-us".to_string(),
            prompt_id: refs.prompt.public_id,
            priority: 10,
            date_range_days: 7,
            segment_ids: vec![refs.segment.public_id],
            brand_ids: vec![refs.brand.public_id],
            geography_ids: vec![refs.geography.public_id],
            event_type_ids: vec![refs.event_type.public_id],
        },
    )
    .await
    .expect("seed profile")
}

fn empty_context() -> PipelineContext {
    PipelineContext::new(None, Fetcher::new(5, "mktmon-test/0.1").expect("fetcher"), None, 0)
}

fn embedding_json() -> serde_json::Value {
    let mut vector = vec![0.0f32; EMBEDDING_DIM];
    vector[0] = 1.0;
    serde_json::json!({ "data": [ { "embedding": vector } ] })
}

/// Stage rows must exist in the fixed order, and no stage may start before
/// the previous one completed.
fn assert_stage_sequence(stages: &[SearchRunStageRow], expected: &[&str]) {
    let names: Vec<&str> = stages.iter().map(|s| s.stage_name.as_str()).collect();
    assert_eq!(names, expected, "stage order mismatch");

    for pair in stages.windows(2) {
        let prior_completed = pair[0]
            .completed_at
            .expect("prior stage must be terminal before the next starts");
        assert!(
            pair[1].started_at >= prior_completed,
            "stage {} started before {} completed",
            pair[1].stage_name,
            pair[0].stage_name
        );
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn run_with_zero_active_sources_completes_empty(pool: PgPool) {
    let refs = seed_refs(&pool).await;
    let profile = seed_profile(&pool, &refs).await;
    // No sources created: the hunt has nothing to search.

    let summary = run_search(&pool, &empty_context(), profile.public_id)
        .await
        .expect("bookkeeping should not fail");

    assert_eq!(summary.status, "completed");
    assert_eq!(summary.documents_created, 0);
    assert_eq!(summary.events_created, 0);
    assert!(summary.error.is_none());

    let run = mktmon_db::get_search_run(&pool, summary.search_run_id)
        .await
        .expect("run row");
    assert_eq!(run.status, "completed");
    assert!(run.completed_at.is_some());
    assert!(run.execution_time_ms.is_some());

    let stages = mktmon_db::list_run_stages(&pool, run.id).await.expect("stages");
    assert_stage_sequence(&stages, &STAGE_ORDER);
    for stage in &stages {
        assert_eq!(stage.status, "success", "stage {} should succeed", stage.stage_name);
        assert_eq!(stage.documents_processed, 0);
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn run_with_unknown_profile_fails_fast(pool: PgPool) {
    let summary = run_search(&pool, &empty_context(), uuid::Uuid::new_v4())
        .await
        .expect("bookkeeping should not fail");

    assert_eq!(summary.status, "failed");
    let error = summary.error.expect("failure message");
    assert!(error.contains("not found"));

    // No stage was ever created.
    let stages = mktmon_db::list_run_stages(&pool, summary.run_id)
        .await
        .expect("stages");
    assert!(stages.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn failed_hunt_aborts_remaining_stages(pool: PgPool) {
    let refs = seed_refs(&pool).await;
    let profile = seed_profile(&pool, &refs).await;
    mktmon_db::create_source(&pool, "Example News", "https://news.example.com", "web")
        .await
        .expect("seed source");

    let search_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&search_server)
        .await;

    let search = SearchClient::with_base_url("test-key", 5, 0, &search_server.uri())
        .expect("search client")
        .with_backoff_base_ms(0);
    let ctx = PipelineContext::new(
        Some(search),
        Fetcher::new(5, "mktmon-test/0.1").expect("fetcher"),
        None,
        0,
    );

    let summary = run_search(&pool, &ctx, profile.public_id)
        .await
        .expect("bookkeeping should not fail");

    assert_eq!(summary.status, "failed");
    assert!(summary.error.expect("error").contains("queries failed"));

    let stages = mktmon_db::list_run_stages(&pool, summary.run_id)
        .await
        .expect("stages");
    assert_eq!(stages.len(), 1, "no stage after the failed one");
    assert_eq!(stages[0].stage_name, "source_hunter");
    assert_eq!(stages[0].status, "failed");
    assert!(stages[0].completed_at.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn full_pipeline_processes_documents_and_survives_one_404(pool: PgPool) {
    let refs = seed_refs(&pool).await;
    let profile = seed_profile(&pool, &refs).await;

    // The content server doubles as the monitored source.
    let content_server = MockServer::start().await;
    mktmon_db::create_source(&pool, "Mock Source", &content_server.uri(), "web")
        .await
        .expect("seed source");

    Mock::given(method("GET"))
        .and(path("/one"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(
                    "<html><body><p>Acme Drinks launches a new zero-proof line \
                     nationwide.</p></body></html>",
                ),
        )
        .mount(&content_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/two"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&content_server)
        .await;

    let search_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [
                {
                    "title": "Acme launch coverage",
                    "url": format!("{}/one", content_server.uri()),
                    "published_date": "2026-07-30"
                },
                {
                    "title": "Dead link",
                    "url": format!("{}/two", content_server.uri())
                }
            ]
        })))
        .mount(&search_server)
        .await;

    let ai_server = MockServer::start().await;
    let classification = serde_json::json!({
        "segment_id": refs.segment.public_id.to_string(),
        "event_type_ids": [refs.event_type.public_id.to_string()],
        "brand_ids": [refs.brand.public_id.to_string()],
        "geography_ids": [refs.geography.public_id.to_string()],
        "events": [
            {
                "title": "Acme launches zero-proof line",
                "description": "Nationwide launch",
                "event_date": "2026-07-28",
                "brand_id": refs.brand.public_id.to_string(),
                "event_type_id": refs.event_type.public_id.to_string(),
                "criticality": 7
            }
        ]
    });
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [ { "message": { "content": classification.to_string() } } ]
        })))
        .mount(&ai_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(embedding_json()))
        .mount(&ai_server)
        .await;

    let search = SearchClient::with_base_url("test-key", 5, 0, &search_server.uri())
        .expect("search client")
        .with_backoff_base_ms(0);
    let ai = AiClient::new(&AiConfig {
        api_key: Some("test-key".to_string()),
        base_url: Some(ai_server.uri()),
        chat_model: "gpt-4o-mini".to_string(),
        embed_model: "text-embedding-3-small".to_string(),
        timeout_secs: 10,
    })
    .expect("ai client");
    let ctx = PipelineContext::new(
        Some(search),
        Fetcher::new(5, "mktmon-test/0.1").expect("fetcher"),
        Some(ai),
        0,
    );

    let summary = run_search(&pool, &ctx, profile.public_id)
        .await
        .expect("bookkeeping should not fail");

    assert_eq!(summary.status, "completed", "error: {:?}", summary.error);
    assert_eq!(summary.documents_created, 2);
    assert_eq!(summary.events_created, 1);

    let stages = mktmon_db::list_run_stages(&pool, summary.run_id)
        .await
        .expect("stages");
    assert_stage_sequence(&stages, &STAGE_ORDER);
    assert_eq!(stages[0].documents_processed, 2, "two stubs hunted");
    assert_eq!(stages[1].documents_processed, 1, "one document fetched");
    assert_eq!(stages[2].documents_processed, 1, "one document processed");
    assert_eq!(stages[2].metadata["status"], "success");
    assert_eq!(
        stages[2].metadata["skipped"].as_array().map(Vec::len),
        Some(1),
        "the 404 document is skipped by the processor"
    );

    let docs = mktmon_db::list_documents(&pool, 10, Some(summary.run_id))
        .await
        .expect("documents");
    assert_eq!(docs.len(), 2);
    let failed = docs
        .iter()
        .find(|d| d.source_url.ends_with("/two"))
        .expect("404 stub exists");
    assert!(
        failed.error_message.as_deref().is_some_and(|m| m.contains("not found")),
        "404 document carries its error message"
    );
    assert!(failed.processed_at.is_none());

    let processed = docs
        .iter()
        .find(|d| d.source_url.ends_with("/one"))
        .expect("fetched stub exists");
    assert!(processed.fetched_at.is_some());
    assert!(processed.processed_at.is_some());
    assert!(processed
        .content_text
        .as_deref()
        .is_some_and(|t| t.contains("zero-proof")));

    let segment_links: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM document_segments WHERE document_id = $1",
    )
    .bind(processed.id)
    .fetch_one(&pool)
    .await
    .expect("segment links");
    assert_eq!(segment_links, 1);

    let brand_links: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM document_brands WHERE document_id = $1")
            .bind(processed.id)
            .fetch_one(&pool)
            .await
            .expect("brand links");
    assert_eq!(brand_links, 1);

    let events = mktmon_db::list_market_events(&pool, 10).await.expect("events");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title, "Acme launches zero-proof line");
    assert_eq!(events[0].criticality, 5, "criticality is clamped to 5");
    assert_eq!(events[0].search_run_id, Some(summary.run_id));
    assert_eq!(events[0].document_id, Some(processed.id));
}

#[sqlx::test(migrations = "../../migrations")]
async fn deleting_a_run_cascades_to_stages(pool: PgPool) {
    let run = mktmon_db::create_search_run(&pool, "monitoring", None)
        .await
        .expect("run");
    for name in STAGE_ORDER {
        let stage = mktmon_db::create_run_stage(&pool, run.id, name).await.expect("stage");
        mktmon_db::complete_run_stage(&pool, stage.id, 0, &serde_json::json!({}))
            .await
            .expect("complete stage");
    }
    mktmon_db::fail_search_run(&pool, run.id, "operator abort")
        .await
        .expect("fail run");

    mktmon_db::delete_search_run(&pool, run.public_id)
        .await
        .expect("delete run");

    let orphans: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM search_run_stages WHERE search_run_id = $1")
            .bind(run.id)
            .fetch_one(&pool)
            .await
            .expect("count stages");
    assert_eq!(orphans, 0, "no orphaned stage records may remain");
}
