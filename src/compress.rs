//! Pattern-based result compression.
//!
//! Large exact-search result sets blow past the token budget of a
//! downstream LLM consumer. Instead of hard truncation, events are
//! clustered by a normalized message "shape": dynamic substrings (ids,
//! hashes, timestamps, emails, addresses, numbers) are masked out with
//! fixed placeholders, so two messages that differ only in their
//! identifiers share one signature. Clusters are then summarized and a
//! bounded representative subset is selected, biased so that
//! critical-severity events are never dropped.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::models::StoryEvent;

/// Default output budget for compressed result sets.
pub const MAX_EVENTS_IN_OUTPUT: usize = 30;

static RE_UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}\b").unwrap()
});
static RE_HASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b[0-9a-f]{32,}\b").unwrap());
static RE_TIMESTAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}").unwrap());
static RE_EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[\w.-]+@[\w.-]+\.\w+\b").unwrap());
static RE_BUSINESS_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(ord_|req_|ship_|ticket_|trace_|checkout_|user_)[a-z0-9_]+\b").unwrap()
});
static RE_IPV4: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b").unwrap());
static RE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+\b").unwrap());

/// Normalize a message to its pattern signature.
///
/// Replacement order is fixed (uuid, hash, timestamp, email, business
/// id, ip, number) so the same logical message always produces the same
/// signature regardless of its dynamic values.
pub fn extract_pattern(message: &str) -> String {
    let masked = RE_UUID.replace_all(message, "<uuid>");
    let masked = RE_HASH.replace_all(&masked, "<hash>");
    let masked = RE_TIMESTAMP.replace_all(&masked, "<timestamp>");
    let masked = RE_EMAIL.replace_all(&masked, "<email>");
    let masked = RE_BUSINESS_ID.replace_all(&masked, "<id>");
    let masked = RE_IPV4.replace_all(&masked, "<ip>");
    let masked = RE_NUMBER.replace_all(&masked, "<number>");
    masked.into_owned()
}

/// Whether an event's level marks it as must-keep.
pub fn is_critical(level: &str) -> bool {
    matches!(level, "error" | "critical" | "failure")
}

/// A group of ≥3 events sharing one pattern signature.
#[derive(Debug, Clone, Serialize)]
pub struct PatternCluster {
    pub pattern: String,
    pub count: usize,
    /// First, middle, and last member, in that order.
    pub samples: Vec<StoryEvent>,
}

/// Output of [`cluster_by_pattern`].
#[derive(Debug, Clone)]
pub struct Clustered {
    /// Clusters in first-seen order.
    pub clusters: Vec<PatternCluster>,
    /// Events whose signature group has fewer than 3 members; each is
    /// individually eligible for selection.
    pub uncategorized: Vec<StoryEvent>,
}

/// Group events by pattern signature.
pub fn cluster_by_pattern(events: &[StoryEvent]) -> Clustered {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&StoryEvent>> = HashMap::new();

    for event in events {
        let pattern = extract_pattern(&event.message);
        if !groups.contains_key(&pattern) {
            order.push(pattern.clone());
        }
        groups.entry(pattern).or_default().push(event);
    }

    let mut clusters = Vec::new();
    let mut uncategorized = Vec::new();

    for pattern in order {
        let members = &groups[&pattern];
        if members.len() >= 3 {
            let samples = vec![
                members[0].clone(),
                members[members.len() / 2].clone(),
                members[members.len() - 1].clone(),
            ];
            clusters.push(PatternCluster {
                pattern,
                count: members.len(),
                samples,
            });
        } else {
            uncategorized.extend(members.iter().map(|e| (*e).clone()));
        }
    }

    Clustered {
        clusters,
        uncategorized,
    }
}

/// Select a bounded representative subset of `events`.
///
/// If the input already fits the budget it is returned unchanged. When
/// it does not, selection proceeds in priority order: all critical
/// events, the first 3 chronologically, cluster samples cluster by
/// cluster, uncategorized events, the last 3 chronologically, then
/// evenly strided samples from the middle 30–70% window until the budget
/// is reached. The result never exceeds `budget` and re-applying the
/// selection to its own output returns it unchanged.
pub fn select_representative(events: &[StoryEvent], budget: usize) -> Vec<StoryEvent> {
    if events.len() <= budget {
        return events.to_vec();
    }

    let Clustered {
        clusters,
        uncategorized,
    } = cluster_by_pattern(events);

    let mut selected: Vec<StoryEvent> = Vec::with_capacity(budget);
    let mut selected_ids: std::collections::HashSet<&str> = std::collections::HashSet::new();

    // Borrow-friendly insert that respects the budget.
    fn add<'a>(
        event: &'a StoryEvent,
        selected: &mut Vec<StoryEvent>,
        selected_ids: &mut std::collections::HashSet<&'a str>,
        budget: usize,
    ) {
        if selected.len() < budget && selected_ids.insert(event.id.as_str()) {
            selected.push(event.clone());
        }
    }

    for event in events.iter().filter(|e| is_critical(&e.level)) {
        add(event, &mut selected, &mut selected_ids, budget);
    }
    for event in events.iter().take(3) {
        add(event, &mut selected, &mut selected_ids, budget);
    }
    for cluster in &clusters {
        if selected.len() >= budget {
            break;
        }
        for sample in &cluster.samples {
            add(sample, &mut selected, &mut selected_ids, budget);
        }
    }
    for event in &uncategorized {
        if selected.len() >= budget {
            break;
        }
        add(event, &mut selected, &mut selected_ids, budget);
    }
    for event in events.iter().rev().take(3).collect::<Vec<_>>().into_iter().rev() {
        add(event, &mut selected, &mut selected_ids, budget);
    }

    let remaining = budget.saturating_sub(selected.len());
    if remaining > 0 {
        let middle_start = events.len() * 3 / 10;
        let middle_end = events.len() * 7 / 10;
        let middle = &events[middle_start..middle_end];
        let step = (middle.len() / remaining).max(1);
        let mut index = 0;
        while index < middle.len() && selected.len() < budget {
            add(&middle[index], &mut selected, &mut selected_ids, budget);
            index += step;
        }
    }

    selected.truncate(budget);
    selected
}

/// Time span covered by a result set.
#[derive(Debug, Clone, Serialize)]
pub struct TimeRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// A bounded, information-preserving summary of a result set.
///
/// Every event from the original set is accounted for: either it
/// appears in `events` or its pattern cluster appears in `patterns`.
/// Distribution counts cover the full original set, not just the shown
/// subset, so a consumer can detect dominance of an omitted pattern.
#[derive(Debug, Clone, Serialize)]
pub struct CompressedEnvelope {
    pub total: usize,
    pub shown: usize,
    pub events: Vec<StoryEvent>,
    pub patterns: Vec<PatternCluster>,
    pub omitted: usize,
    pub patterns_compressed: usize,
    pub uncategorized_count: usize,
    pub level_distribution: HashMap<String, usize>,
    pub service_distribution: HashMap<String, usize>,
    pub critical_count: usize,
    pub time_range: TimeRange,
}

/// Compress a (timestamp-ascending) event set into the output budget.
///
/// When `events.len() <= budget` the full set is passed through with no
/// clustering overhead.
pub fn summarize(events: &[StoryEvent], budget: usize) -> CompressedEnvelope {
    let mut level_distribution: HashMap<String, usize> = HashMap::new();
    let mut service_distribution: HashMap<String, usize> = HashMap::new();
    let mut critical_count = 0;
    for event in events {
        *level_distribution.entry(event.level.clone()).or_default() += 1;
        *service_distribution
            .entry(event.service.clone())
            .or_default() += 1;
        if is_critical(&event.level) {
            critical_count += 1;
        }
    }

    let time_range = TimeRange {
        start: events.first().map(|e| e.timestamp.clone()),
        end: events.last().map(|e| e.timestamp.clone()),
    };

    if events.len() <= budget {
        return CompressedEnvelope {
            total: events.len(),
            shown: events.len(),
            events: events.to_vec(),
            patterns: Vec::new(),
            omitted: 0,
            patterns_compressed: 0,
            uncategorized_count: 0,
            level_distribution,
            service_distribution,
            critical_count,
            time_range,
        };
    }

    let clustered = cluster_by_pattern(events);
    let selected = select_representative(events, budget);

    CompressedEnvelope {
        total: events.len(),
        shown: selected.len(),
        omitted: events.len() - selected.len(),
        patterns_compressed: clustered.clusters.len(),
        uncategorized_count: clustered.uncategorized.len(),
        events: selected,
        patterns: clustered.clusters,
        level_distribution,
        service_distribution,
        critical_count,
        time_range,
    }
}

/// Sort events ascending by their ISO-8601 timestamp string.
pub fn sort_events_by_timestamp(events: &[StoryEvent]) -> Vec<StoryEvent> {
    let mut sorted = events.to_vec();
    sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    sorted
}
