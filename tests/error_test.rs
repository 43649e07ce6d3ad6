use task_pipeline_rs::{PipelineError, Ticket};

#[test]
fn test_error_types() {
    let err = PipelineError::StoreClosed;
    assert_eq!(err.to_string(), "Store is closed");

    let err = PipelineError::DuplicateResult(Ticket(3));
    assert_eq!(err.to_string(), "Result already published for ticket #3");

    let err = PipelineError::TicketNotClaimed(Ticket(5));
    assert_eq!(
        err.to_string(),
        "Ticket #5 has not been claimed by a consumer"
    );

    let err = PipelineError::ResultTimeout(Ticket(12));
    assert_eq!(err.to_string(), "Timed out waiting for result of ticket #12");
}

#[test]
fn test_serialization_error_conversion() {
    fn parse(raw: &str) -> task_pipeline_rs::Result<Ticket> {
        Ok(serde_json::from_str(raw)?)
    }

    assert_eq!(parse("17").unwrap(), Ticket(17));
    let err = parse("\"seventeen\"").unwrap_err();
    assert!(matches!(err, PipelineError::SerializationError(_)));
    assert!(err.to_string().starts_with("Serialization error:"));
}
