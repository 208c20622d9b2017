//! Stage 1: discover candidate documents via the search provider.

use std::collections::HashSet;

use mktmon_core::DocumentType;
use mktmon_db::{documents, SourceRow};
use mktmon_search::SearchQuery;
use sqlx::PgPool;

use crate::context::PipelineContext;
use crate::error::PipelineError;

/// Cap on results requested per rendered query.
const MAX_RESULTS_PER_QUERY: u32 = 10;

/// Input assembled by the orchestrator from the monitoring profile.
#[derive(Debug, Clone)]
pub struct HuntInput {
    pub prompt_template: String,
    pub date_range_days: i32,
    pub search_run_id: i64,
    pub segment_names: Vec<String>,
    pub geography_names: Vec<String>,
    pub sources: Vec<SourceRow>,
}

/// Output of the hunt: created stubs plus per-query provider errors.
#[derive(Debug, Clone, Default)]
pub struct HuntOutcome {
    pub documents_created: usize,
    pub document_ids: Vec<i64>,
    pub urls: Vec<String>,
    pub errors: Vec<String>,
    pub queries_run: usize,
}

impl HuntOutcome {
    #[must_use]
    pub fn metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "queries_run": self.queries_run,
            "urls_seen": self.urls.len(),
            "errors": self.errors,
        })
    }
}

/// Runs the hunt.
///
/// One provider query per (segment × geography) combination — or the bare
/// prompt when a dimension is empty — scoped to the active sources'
/// domains. Distinct result URLs become document stubs; duplicates within
/// this batch are dropped by `url_hash`. Per-query provider errors are
/// collected and the hunt continues; the stage fails only when nothing was
/// created **and** at least one query errored.
///
/// With zero active sources there is nothing to search: the hunt succeeds
/// with zero documents.
///
/// # Errors
///
/// - [`PipelineError::SearchNotConfigured`] when queries exist but no
///   provider client is configured.
/// - [`PipelineError::Db`] on any stub-insert failure (persistence errors
///   abort the stage).
/// - [`PipelineError::Stage`] when every query failed and nothing was
///   created.
pub async fn run(
    pool: &PgPool,
    ctx: &PipelineContext,
    input: &HuntInput,
) -> Result<HuntOutcome, PipelineError> {
    let mut outcome = HuntOutcome::default();

    if input.sources.is_empty() {
        tracing::info!(
            run_id = input.search_run_id,
            "no active sources — hunt yields nothing"
        );
        return Ok(outcome);
    }

    let queries = build_queries(
        &input.prompt_template,
        &input.segment_names,
        &input.geography_names,
    );
    if queries.is_empty() {
        tracing::info!(run_id = input.search_run_id, "empty prompt — nothing to search");
        return Ok(outcome);
    }

    let client = ctx.search.as_ref().ok_or(PipelineError::SearchNotConfigured)?;

    let include_domains: Vec<String> = input
        .sources
        .iter()
        .filter_map(|s| domain_of(&s.url))
        .collect();

    let recency_days = u32::try_from(input.date_range_days.max(0)).ok().filter(|d| *d > 0);

    let mut seen_hashes: HashSet<i64> = HashSet::new();

    for query_text in &queries {
        outcome.queries_run += 1;

        let query = SearchQuery {
            query: query_text.clone(),
            recency_days,
            max_results: MAX_RESULTS_PER_QUERY,
            include_domains: include_domains.clone(),
        };

        let hits = match client.search(&query).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(query = %query_text, error = %e, "search query failed");
                outcome.errors.push(format!("{query_text}: {e}"));
                continue;
            }
        };

        for hit in hits {
            let hash = documents::document_url_hash(&hit.url);
            if !seen_hashes.insert(hash) {
                continue;
            }

            let document_type = DocumentType::infer(hit.content_type.as_deref(), &hit.url);
            let title = if hit.title.trim().is_empty() {
                hit.url.clone()
            } else {
                hit.title.clone()
            };

            let stub = documents::NewDocumentStub {
                title,
                source_url: hit.url.clone(),
                document_type: document_type.as_str().to_string(),
                published_date: hit.published_date,
                search_run_id: Some(input.search_run_id),
            };

            let row = documents::insert_document_stub(pool, &stub).await?;
            outcome.document_ids.push(row.id);
            outcome.urls.push(hit.url);
            outcome.documents_created += 1;
        }
    }

    if outcome.documents_created == 0 && !outcome.errors.is_empty() {
        return Err(PipelineError::Stage {
            stage: "source_hunter",
            message: format!(
                "all {} queries failed: {}",
                outcome.queries_run,
                outcome.errors.join("; ")
            ),
        });
    }

    tracing::info!(
        run_id = input.search_run_id,
        documents = outcome.documents_created,
        queries = outcome.queries_run,
        errors = outcome.errors.len(),
        "hunt finished"
    );

    Ok(outcome)
}

/// Render one query per (segment × geography) combination; a missing
/// dimension collapses to the other, and a bare non-empty prompt renders a
/// single query.
fn build_queries(prompt: &str, segments: &[String], geographies: &[String]) -> Vec<String> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Vec::new();
    }

    match (segments.is_empty(), geographies.is_empty()) {
        (true, true) => vec![prompt.to_string()],
        (false, true) => segments.iter().map(|s| format!("{prompt} {s}")).collect(),
        (true, false) => geographies.iter().map(|g| format!("{prompt} {g}")).collect(),
        (false, false) => segments
            .iter()
            .flat_map(|s| {
                geographies
                    .iter()
                    .map(move |g| format!("{prompt} {s} {g}"))
            })
            .collect(),
    }
}

/// Host portion of a source URL, for provider-side domain scoping.
fn domain_of(url: &str) -> Option<String> {
    let rest = url.split_once("//").map_or(url, |(_, rest)| rest);
    let host = rest.split(['/', '?', '#']).next()?;
    let host = host.trim_start_matches("www.");
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_cross_segments_and_geographies() {
        let queries = build_queries(
            "market events",
            &["Functional Beverages".to_string(), "Snacks".to_string()],
            &["US".to_string()],
        );
        assert_eq!(
            queries,
            vec![
                "market events Functional Beverages US",
                "market events Snacks US"
            ]
        );
    }

    #[test]
    fn bare_prompt_is_one_query() {
        assert_eq!(build_queries("market events", &[], &[]), vec!["market events"]);
    }

    #[test]
    fn blank_prompt_yields_no_queries() {
        assert!(build_queries("   ", &[], &[]).is_empty());
    }

    #[test]
    fn domain_of_strips_scheme_path_and_www() {
        assert_eq!(
            domain_of("https://www.news.example.com/business?x=1"),
            Some("news.example.com".to_string())
        );
        assert_eq!(domain_of("example.org/feed"), Some("example.org".to_string()));
    }
}
