//! Canonical schema constants for structured logging.
//!
//! Every boundary log line uses these keys so log pipelines can rely on them.

// Canonical field keys
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_REQUEST_ID: &str = "request_id";
pub const FIELD_TRACE_ID: &str = "trace_id";

// Entity identifiers
pub const FIELD_LINEAGE_CODE: &str = "lineage_code";
pub const FIELD_MODULE_ID: &str = "module_id";
pub const FIELD_TARGET_STATE: &str = "target_state";

// Collection sizes
pub const FIELD_RESOLVED_LEN: &str = "resolved_len";
pub const FIELD_MERGED_LEN: &str = "merged_len";
pub const FIELD_RELATIONS_LEN: &str = "relations_len";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_distinct() {
        assert_ne!(EVENT_START, EVENT_END);
        assert_ne!(EVENT_START, EVENT_END_ERROR);
        assert_ne!(EVENT_END, EVENT_END_ERROR);
    }
}
