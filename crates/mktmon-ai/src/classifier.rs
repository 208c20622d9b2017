//! JSON-mode classification and market-event extraction.
//!
//! The prompt enumerates the reference catalog (segments, event types,
//! brands, geographies) as `uuid: name` lines; the model answers with ids
//! from those lists, and every id in the answer is filtered back against
//! the catalog so a hallucinated id can never reach the database.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::client::AiClient;
use crate::error::AiError;

/// Document text beyond this many characters is truncated before the call.
const MAX_CONTENT_CHARS: usize = 8_000;

const DEFAULT_CRITICALITY: i16 = 3;

/// One reference row the classifier may assign.
#[derive(Debug, Clone)]
pub struct ReferenceItem {
    pub id: Uuid,
    pub name: String,
}

/// The enumerable reference lists, loaded from the database at call time.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCatalog {
    pub segments: Vec<ReferenceItem>,
    pub event_types: Vec<ReferenceItem>,
    pub brands: Vec<ReferenceItem>,
    pub geographies: Vec<ReferenceItem>,
}

/// Classification result for one document, ids guaranteed to come from the
/// catalog.
#[derive(Debug, Clone, Default)]
pub struct DocumentClassification {
    pub segment_id: Option<Uuid>,
    pub event_type_ids: Vec<Uuid>,
    pub brand_ids: Vec<Uuid>,
    pub geography_ids: Vec<Uuid>,
    pub events: Vec<ExtractedEvent>,
}

/// One market event extracted from a document or an ad-hoc prompt.
#[derive(Debug, Clone)]
pub struct ExtractedEvent {
    pub title: String,
    pub description: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub segment_id: Option<Uuid>,
    pub event_type_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    /// Severity 1–5, clamped.
    pub criticality: i16,
}

#[derive(Debug, Deserialize, Default)]
struct RawClassification {
    #[serde(default)]
    segment_id: Option<String>,
    #[serde(default)]
    event_type_ids: Vec<String>,
    #[serde(default)]
    brand_ids: Vec<String>,
    #[serde(default)]
    geography_ids: Vec<String>,
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    event_date: Option<String>,
    #[serde(default)]
    segment_id: Option<String>,
    #[serde(default)]
    event_type_id: Option<String>,
    #[serde(default)]
    brand_id: Option<String>,
    #[serde(default)]
    criticality: Option<i64>,
}

const CLASSIFY_SYSTEM: &str = "You are a market-intelligence analyst. Classify the document \
against the provided reference lists and extract concrete market events. Use only ids that \
appear in the lists; omit a field rather than inventing an id. Answer with a single JSON \
object of the shape {\"segment_id\": string|null, \"event_type_ids\": [string], \
\"brand_ids\": [string], \"geography_ids\": [string], \"events\": [{\"title\": string, \
\"description\": string, \"event_date\": \"YYYY-MM-DD\", \"segment_id\": string|null, \
\"event_type_id\": string|null, \"brand_id\": string|null, \"criticality\": 1-5}]}.";

const EXTRACT_SYSTEM: &str = "You are a market-intelligence analyst. Extract concrete market \
events matching the request. Use only ids that appear in the provided reference lists. Answer \
with a single JSON object {\"events\": [{\"title\": string, \"description\": string, \
\"event_date\": \"YYYY-MM-DD\", \"segment_id\": string|null, \"event_type_id\": string|null, \
\"brand_id\": string|null, \"criticality\": 1-5}]}.";

/// Classify one document's text against the catalog.
///
/// # Errors
///
/// Returns [`AiError`] when the chat call fails or the answer is unusable.
pub async fn classify_document(
    client: &AiClient,
    catalog: &ReferenceCatalog,
    content_text: &str,
) -> Result<DocumentClassification, AiError> {
    let user = format!(
        "{}\n\nDOCUMENT:\n{}",
        catalog_block(catalog),
        truncate_chars(content_text, MAX_CONTENT_CHARS)
    );

    let answer = client.chat_json(CLASSIFY_SYSTEM, &user).await?;
    let raw: RawClassification = serde_json::from_value(answer).map_err(|e| {
        AiError::BadAnswer(format!("classification shape mismatch: {e}"))
    })?;

    Ok(resolve_classification(raw, catalog))
}

/// Extract market events from an ad-hoc prompt (no document).
///
/// # Errors
///
/// Returns [`AiError`] when the chat call fails or the answer is unusable.
pub async fn extract_events(
    client: &AiClient,
    catalog: &ReferenceCatalog,
    prompt: &str,
) -> Result<Vec<ExtractedEvent>, AiError> {
    let user = format!("{}\n\nREQUEST:\n{prompt}", catalog_block(catalog));

    let answer = client.chat_json(EXTRACT_SYSTEM, &user).await?;
    let raw: RawClassification = serde_json::from_value(answer)
        .map_err(|e| AiError::BadAnswer(format!("events shape mismatch: {e}")))?;

    Ok(resolve_classification(raw, catalog).events)
}

fn resolve_classification(
    raw: RawClassification,
    catalog: &ReferenceCatalog,
) -> DocumentClassification {
    let segments: HashSet<Uuid> = catalog.segments.iter().map(|i| i.id).collect();
    let event_types: HashSet<Uuid> = catalog.event_types.iter().map(|i| i.id).collect();
    let brands: HashSet<Uuid> = catalog.brands.iter().map(|i| i.id).collect();
    let geographies: HashSet<Uuid> = catalog.geographies.iter().map(|i| i.id).collect();

    let events = raw
        .events
        .into_iter()
        .filter_map(|e| {
            let title = e.title?;
            if title.trim().is_empty() {
                return None;
            }
            Some(ExtractedEvent {
                title,
                description: e.description.filter(|d| !d.trim().is_empty()),
                event_date: e
                    .event_date
                    .as_deref()
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
                segment_id: known_id(e.segment_id.as_deref(), &segments),
                event_type_id: known_id(e.event_type_id.as_deref(), &event_types),
                brand_id: known_id(e.brand_id.as_deref(), &brands),
                criticality: clamp_criticality(e.criticality),
            })
        })
        .collect();

    DocumentClassification {
        segment_id: known_id(raw.segment_id.as_deref(), &segments),
        event_type_ids: known_ids(&raw.event_type_ids, &event_types),
        brand_ids: known_ids(&raw.brand_ids, &brands),
        geography_ids: known_ids(&raw.geography_ids, &geographies),
        events,
    }
}

fn known_id(candidate: Option<&str>, catalog: &HashSet<Uuid>) -> Option<Uuid> {
    candidate
        .and_then(|s| Uuid::parse_str(s).ok())
        .filter(|id| catalog.contains(id))
}

fn known_ids(candidates: &[String], catalog: &HashSet<Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .filter_map(|s| Uuid::parse_str(s).ok())
        .filter(|id| catalog.contains(id) && seen.insert(*id))
        .collect()
}

/// Clamp a model-supplied criticality into 1–5, defaulting to 3 when absent.
fn clamp_criticality(value: Option<i64>) -> i16 {
    match value {
        Some(v) => i16::try_from(v.clamp(1, 5)).unwrap_or(DEFAULT_CRITICALITY),
        None => DEFAULT_CRITICALITY,
    }
}

fn catalog_block(catalog: &ReferenceCatalog) -> String {
    fn lines(title: &str, items: &[ReferenceItem]) -> String {
        let mut out = format!("{title}:\n");
        if items.is_empty() {
            out.push_str("(none)\n");
            return out;
        }
        for item in items {
            out.push_str(&format!("{}: {}\n", item.id, item.name));
        }
        out
    }

    format!(
        "{}\n{}\n{}\n{}",
        lines("SEGMENTS", &catalog.segments),
        lines("EVENT TYPES", &catalog.event_types),
        lines("BRANDS", &catalog.brands),
        lines("GEOGRAPHIES", &catalog.geographies),
    )
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::AiConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn item(name: &str) -> ReferenceItem {
        ReferenceItem {
            id: Uuid::new_v4(),
            name: name.to_string(),
        }
    }

    fn catalog() -> ReferenceCatalog {
        ReferenceCatalog {
            segments: vec![item("Functional Beverages")],
            event_types: vec![item("Product launch"), item("Acquisition")],
            brands: vec![item("Acme Drinks")],
            geographies: vec![item("United States")],
        }
    }

    #[test]
    fn clamp_criticality_bounds() {
        assert_eq!(clamp_criticality(Some(0)), 1);
        assert_eq!(clamp_criticality(Some(9)), 5);
        assert_eq!(clamp_criticality(Some(4)), 4);
        assert_eq!(clamp_criticality(None), 3);
    }

    #[test]
    fn unknown_ids_are_filtered_out() {
        let cat = catalog();
        let raw = RawClassification {
            segment_id: Some(Uuid::new_v4().to_string()),
            event_type_ids: vec![
                cat.event_types[0].id.to_string(),
                Uuid::new_v4().to_string(),
                "not-a-uuid".to_string(),
            ],
            brand_ids: vec![cat.brands[0].id.to_string(), cat.brands[0].id.to_string()],
            geography_ids: vec![],
            events: vec![],
        };

        let resolved = resolve_classification(raw, &cat);
        assert!(resolved.segment_id.is_none(), "unknown segment must drop");
        assert_eq!(resolved.event_type_ids, vec![cat.event_types[0].id]);
        assert_eq!(resolved.brand_ids, vec![cat.brands[0].id], "dedup repeats");
    }

    #[test]
    fn events_without_title_are_dropped() {
        let cat = catalog();
        let raw = RawClassification {
            events: vec![
                RawEvent {
                    title: None,
                    description: None,
                    event_date: None,
                    segment_id: None,
                    event_type_id: None,
                    brand_id: None,
                    criticality: None,
                },
                RawEvent {
                    title: Some("Acme acquires Borealis".to_string()),
                    description: Some("All-cash deal".to_string()),
                    event_date: Some("2026-07-01".to_string()),
                    segment_id: Some(cat.segments[0].id.to_string()),
                    event_type_id: Some(cat.event_types[1].id.to_string()),
                    brand_id: Some(cat.brands[0].id.to_string()),
                    criticality: Some(5),
                },
            ],
            ..RawClassification::default()
        };

        let resolved = resolve_classification(raw, &cat);
        assert_eq!(resolved.events.len(), 1);
        let event = &resolved.events[0];
        assert_eq!(event.title, "Acme acquires Borealis");
        assert_eq!(event.criticality, 5);
        assert_eq!(event.event_date.map(|d| d.to_string()), Some("2026-07-01".to_string()));
        assert_eq!(event.event_type_id, Some(cat.event_types[1].id));
    }

    #[test]
    fn catalog_block_enumerates_ids() {
        let cat = catalog();
        let block = catalog_block(&cat);
        assert!(block.contains(&cat.brands[0].id.to_string()));
        assert!(block.contains("Acme Drinks"));
        assert!(block.contains("EVENT TYPES:"));
    }

    #[test]
    fn truncate_chars_respects_boundary() {
        assert_eq!(truncate_chars("héllo", 3), "hél");
        assert_eq!(truncate_chars("ok", 10), "ok");
    }

    /// The same mocked answer must resolve to the same classification on
    /// every call — the processor's idempotence rests on this.
    #[tokio::test]
    async fn classification_is_deterministic_for_fixed_answer() {
        let server = MockServer::start().await;
        let cat = catalog();
        let answer = serde_json::json!({
            "segment_id": cat.segments[0].id.to_string(),
            "event_type_ids": [cat.event_types[0].id.to_string()],
            "brand_ids": [cat.brands[0].id.to_string()],
            "geography_ids": [cat.geographies[0].id.to_string()],
            "events": []
        });

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [ { "message": { "content": answer.to_string() } } ]
            })))
            .mount(&server)
            .await;

        let client = AiClient::new(&AiConfig {
            api_key: Some("test-key".to_string()),
            base_url: Some(server.uri()),
            chat_model: "gpt-4o-mini".to_string(),
            embed_model: "text-embedding-3-small".to_string(),
            timeout_secs: 10,
        })
        .expect("client");

        let first = classify_document(&client, &cat, "Acme launched a new drink.")
            .await
            .expect("first call");
        let second = classify_document(&client, &cat, "Acme launched a new drink.")
            .await
            .expect("second call");

        assert_eq!(first.segment_id, second.segment_id);
        assert_eq!(first.event_type_ids, second.event_type_ids);
        assert_eq!(first.brand_ids, second.brand_ids);
        assert_eq!(first.geography_ids, second.geography_ids);
    }
}
