use crate::feed::types::Alert;
use crate::stream::event::NormalizedEvent;

/// Annotation through which an alert opts out of ingestion
pub const IGNORE_ANNOTATION: &str = "miqIgnore";

/// An alert is relevant unless its `miqIgnore` annotation reads "true",
/// compared case-insensitively.
pub fn is_relevant(alert: &Alert) -> bool {
    match alert.annotation_text(IGNORE_ANNOTATION) {
        Some(value) => !value.eq_ignore_ascii_case("true"),
        None => true,
    }
}

/// Stamp an alert with its originating generation and message index.
///
/// Upstream fields of the same name are replaced by the stamp.
pub fn normalize(mut alert: Alert, generation: &str, index: u64) -> NormalizedEvent {
    alert.extra.remove("generationID");
    alert.extra.remove("index");

    NormalizedEvent {
        alert,
        generation_id: generation.to_string(),
        index,
    }
}
