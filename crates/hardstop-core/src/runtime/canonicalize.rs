// crates/hardstop-core/src/runtime/canonicalize.rs
// ============================================================================
// Module: Canonicalization Operator
// Description: Maps source-shaped raw items to canonical events.
// Purpose: Produce exactly one deterministic event per unprocessed raw item.
// Dependencies: crate::core, regex
// ============================================================================

//! ## Overview
//! Canonicalization turns a [`RawItem`] into exactly one immutable [`Event`].
//! Every derived field is a pure function of the raw item and pinned tables:
//! the event type comes from an ordered keyword table (first match wins), the
//! location from the leftmost `CITY, STATE` match resolved against a pinned
//! state table, and the event id from the canonical id or content hash.
//! Unparseable values degrade to null with a warning, never an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::core::event::Event;
use crate::core::event::EventType;
use crate::core::event::MetadataValue;
use crate::core::hashing::short_token;
use crate::core::identifiers::EventId;
use crate::core::signal::RawItem;
use crate::core::time::TimeParseError;
use crate::core::time::UtcTimestamp;
use crate::runtime::SourceProfile;

// ============================================================================
// SECTION: Pinned Tables
// ============================================================================

/// Ordered keyword table for event-type inference. First match wins.
const EVENT_TYPE_RULES: &[(&str, EventType)] = &[
    ("spill", EventType::SafetyAndOperations),
    ("explosion", EventType::SafetyAndOperations),
    ("fire", EventType::SafetyAndOperations),
    ("derail", EventType::SafetyAndOperations),
    ("evacuation", EventType::SafetyAndOperations),
    ("closure", EventType::SafetyAndOperations),
    ("hazmat", EventType::SafetyAndOperations),
    ("hurricane", EventType::Weather),
    ("tornado", EventType::Weather),
    ("storm", EventType::Weather),
    ("flood", EventType::Weather),
    ("blizzard", EventType::Weather),
    ("wildfire", EventType::Weather),
    ("recall", EventType::Recall),
    ("contamination", EventType::Recall),
    ("outage", EventType::Infrastructure),
    ("bridge collapse", EventType::Infrastructure),
    ("grid failure", EventType::Infrastructure),
    ("strike", EventType::Labor),
    ("walkout", EventType::Labor),
    ("lockout", EventType::Labor),
    ("ransomware", EventType::Cyber),
    ("cyberattack", EventType::Cyber),
    ("data breach", EventType::Cyber),
    ("sanction", EventType::Regulatory),
    ("tariff", EventType::Regulatory),
    ("embargo", EventType::Regulatory),
];

/// Severity guess defaults per inferred event type.
const SEVERITY_DEFAULTS: &[(EventType, u8)] = &[
    (EventType::SafetyAndOperations, 4),
    (EventType::Weather, 3),
    (EventType::Recall, 3),
    (EventType::Infrastructure, 3),
    (EventType::Labor, 2),
    (EventType::Cyber, 3),
    (EventType::Regulatory, 2),
    (EventType::Other, 1),
];

/// Pinned US state table: full names and two-letter codes to canonical codes.
const STATE_TABLE: &[(&str, &str)] = &[
    ("alabama", "AL"),
    ("alaska", "AK"),
    ("arizona", "AZ"),
    ("arkansas", "AR"),
    ("california", "CA"),
    ("colorado", "CO"),
    ("connecticut", "CT"),
    ("delaware", "DE"),
    ("district of columbia", "DC"),
    ("florida", "FL"),
    ("georgia", "GA"),
    ("hawaii", "HI"),
    ("idaho", "ID"),
    ("illinois", "IL"),
    ("indiana", "IN"),
    ("iowa", "IA"),
    ("kansas", "KS"),
    ("kentucky", "KY"),
    ("louisiana", "LA"),
    ("maine", "ME"),
    ("maryland", "MD"),
    ("massachusetts", "MA"),
    ("michigan", "MI"),
    ("minnesota", "MN"),
    ("mississippi", "MS"),
    ("missouri", "MO"),
    ("montana", "MT"),
    ("nebraska", "NE"),
    ("nevada", "NV"),
    ("new hampshire", "NH"),
    ("new jersey", "NJ"),
    ("new mexico", "NM"),
    ("new york", "NY"),
    ("north carolina", "NC"),
    ("north dakota", "ND"),
    ("ohio", "OH"),
    ("oklahoma", "OK"),
    ("oregon", "OR"),
    ("pennsylvania", "PA"),
    ("rhode island", "RI"),
    ("south carolina", "SC"),
    ("south dakota", "SD"),
    ("tennessee", "TN"),
    ("texas", "TX"),
    ("utah", "UT"),
    ("vermont", "VT"),
    ("virginia", "VA"),
    ("washington", "WA"),
    ("west virginia", "WV"),
    ("wisconsin", "WI"),
    ("wyoming", "WY"),
];

/// `CITY, STATE` pattern: capitalized city words, a comma, then a state token.
const LOCATION_PATTERN: &str =
    r"([A-Z][a-z]+(?: [A-Z][a-z]+){0,3}), ([A-Z][A-Za-z]+(?: [A-Z][a-z]+)?)";

/// Compiled location regex, built once from the pinned pattern.
fn location_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        #[allow(clippy::unwrap_used, reason = "pinned pattern is compile-checked by tests")]
        Regex::new(LOCATION_PATTERN).unwrap()
    })
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Canonicalization output: the event plus degradation warnings.
#[derive(Debug, Clone)]
pub struct NormalizedSignal {
    /// Produced event.
    pub event: Event,
    /// Ordered degradation warnings (unparseable dates, unknown types).
    pub warnings: Vec<String>,
}

// ============================================================================
// SECTION: Operator
// ============================================================================

/// Produces the canonical event for one raw item.
///
/// Fully determined by the raw item and the source profile: running twice on
/// the same inputs yields the same event hash.
#[must_use]
pub fn normalize(raw: &RawItem, profile: &SourceProfile) -> NormalizedSignal {
    let mut warnings = Vec::new();

    let haystack = format!("{} {}", raw.title, raw.raw_text);
    let event_type = infer_event_type(&haystack);
    if event_type == EventType::Other {
        warnings.push(format!("no event-type keyword matched item {}", raw.raw_item_id));
    }

    let (city, state) = extract_location(&haystack);
    if raw.published_at_utc.is_none() {
        warnings.push(format!("item {} carries no publication instant", raw.raw_item_id));
    }

    let event = Event {
        event_id: derive_event_id(raw),
        source_type: profile.source_type.clone(),
        source_id: raw.source_id.clone(),
        title: raw.title.clone(),
        raw_text: raw.raw_text.clone(),
        event_type,
        severity_guess: severity_for(event_type),
        city,
        state,
        country: None,
        facilities: Vec::new(),
        lanes: Vec::new(),
        shipments: Vec::new(),
        suppression: None,
        trust_tier: raw.trust_tier,
        tier: raw.tier,
        published_at_utc: raw.published_at_utc,
        url: raw.url.clone(),
        source_metadata: source_metadata(raw),
    };

    NormalizedSignal {
        event,
        warnings,
    }
}

/// Derives the deterministic event identifier for a raw item.
#[must_use]
pub fn derive_event_id(raw: &RawItem) -> EventId {
    let basis = if raw.canonical_id.is_empty() {
        raw.content_hash.value.clone()
    } else {
        raw.canonical_id.clone()
    };
    EventId::new(format!("EVT-{}", short_token(&basis, 12)))
}

/// Infers the event type from the pinned ordered keyword table.
#[must_use]
pub fn infer_event_type(text: &str) -> EventType {
    let lowered = text.to_lowercase();
    for (keyword, event_type) in EVENT_TYPE_RULES {
        if lowered.contains(keyword) {
            return *event_type;
        }
    }
    EventType::Other
}

/// Returns the severity guess default for an event type.
#[must_use]
pub fn severity_for(event_type: EventType) -> u8 {
    SEVERITY_DEFAULTS
        .iter()
        .find(|(candidate, _)| *candidate == event_type)
        .map_or(1, |(_, severity)| *severity)
}

/// Extracts the leftmost `CITY, STATE` location whose state resolves.
///
/// The city is normalized to title case and the state to its two-letter code.
#[must_use]
pub fn extract_location(text: &str) -> (Option<String>, Option<String>) {
    for captures in location_regex().captures_iter(text) {
        let city = captures.get(1).map(|group| group.as_str());
        let state = captures.get(2).map(|group| group.as_str());
        if let (Some(city), Some(state)) = (city, state)
            && let Some(code) = resolve_state(state)
        {
            return (Some(title_case(city)), Some(code.to_string()));
        }
    }
    (None, None)
}

/// Resolves a state token (full name or two-letter code) to its code.
#[must_use]
pub fn resolve_state(token: &str) -> Option<&'static str> {
    let lowered = token.trim().to_lowercase();
    if lowered.len() == 2 {
        return STATE_TABLE
            .iter()
            .find(|(_, code)| code.to_lowercase() == lowered)
            .map(|(_, code)| *code);
    }
    STATE_TABLE.iter().find(|(name, _)| *name == lowered).map(|(_, code)| *code)
}

/// Parses a date or timestamp field: date-only values become end-of-day UTC,
/// offset-bearing instants are converted to UTC.
///
/// # Errors
///
/// Returns [`TimeParseError`] when neither form matches; callers degrade the
/// field to null and record a warning.
pub fn parse_instant_lenient(input: &str) -> Result<UtcTimestamp, TimeParseError> {
    UtcTimestamp::parse_lenient(input)
}

/// Normalizes a string to title case word by word.
fn title_case(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Copies source metadata verbatim into the event's opaque map.
fn source_metadata(raw: &RawItem) -> BTreeMap<String, MetadataValue> {
    let mut metadata = BTreeMap::new();
    metadata.insert(
        "source_id".to_string(),
        MetadataValue::Text(raw.source_id.as_str().to_string()),
    );
    metadata.insert("tier".to_string(), MetadataValue::Text(raw.tier.as_str().to_string()));
    if let Some(url) = &raw.url {
        metadata.insert("url".to_string(), MetadataValue::Text(url.clone()));
    }
    if let Some(published) = raw.published_at_utc {
        metadata.insert("published_at".to_string(), MetadataValue::Text(published.render()));
    }
    metadata
}
