//! Integration tests for telemetry initialization and span helpers.

#[test]
fn telemetry_initializes_without_endpoint() {
    // A global subscriber can only be set once per process; a second
    // initialization returning Err is acceptable.
    let config = workitem_agent::telemetry::TelemetryConfig {
        endpoint: None,
        service_name: "workitem-agent-test".to_string(),
        default_filter: "debug".to_string(),
    };
    let _guard = workitem_agent::telemetry::init_telemetry(config);
}

#[test]
fn workitem_span_creates_and_records_transition() {
    let span = workitem_agent::telemetry::work::start_workitem_span("default_queue", "wi-1", 0);
    workitem_agent::telemetry::work::record_state_transition(&span, "new", "successful");
}

#[test]
fn metric_instruments_build_without_provider() {
    workitem_agent::telemetry::metrics::workitems_processed().add(1, &[]);
    workitem_agent::telemetry::metrics::processing_duration_ms().record(1.0, &[]);
}
