/// Driver report decoding
///
/// The driver leaves one record per test, joined by ASCII record separators;
/// each record is `name`, `kind`, `message` joined by unit separators.
use crate::config::types::{OutcomeKind, Result, SandboxError, TestOutcome};

pub const RECORD_SEPARATOR: char = '\u{1e}';
pub const FIELD_SEPARATOR: char = '\u{1f}';

/// Decode a driver report into outcomes, preserving discovery order
pub fn parse_report(raw: &str) -> Result<Vec<TestOutcome>> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    raw.split(RECORD_SEPARATOR)
        .enumerate()
        .map(|(idx, record)| parse_record(idx, record))
        .collect()
}

fn parse_record(idx: usize, record: &str) -> Result<TestOutcome> {
    let mut fields = record.splitn(3, FIELD_SEPARATOR);
    let (Some(name), Some(kind), Some(message)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(SandboxError::Protocol(format!(
            "report record {} has fewer than 3 fields",
            idx
        )));
    };

    let kind = match kind {
        "passed" => OutcomeKind::Passed,
        "failed" => OutcomeKind::Failed,
        "errored" => OutcomeKind::Errored,
        other => {
            return Err(SandboxError::Protocol(format!(
                "report record {} has unknown outcome {:?}",
                idx, other
            )))
        }
    };

    Ok(TestOutcome {
        name: name.to_string(),
        passed: kind == OutcomeKind::Passed,
        message: message.to_string(),
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, kind: &str, message: &str) -> String {
        [name, kind, message].join(&FIELD_SEPARATOR.to_string())
    }

    #[test]
    fn test_empty_report_means_no_tests() {
        assert!(parse_report("").unwrap().is_empty());
    }

    #[test]
    fn test_records_keep_order_and_kinds() {
        let raw = [
            record("test_a", "passed", "OK"),
            record("test_b", "failed", "expected 3, got 4"),
            record("test_c", "errored", "name 'x' is not defined"),
        ]
        .join(&RECORD_SEPARATOR.to_string());

        let outcomes = parse_report(&raw).unwrap();
        let names: Vec<&str> = outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["test_a", "test_b", "test_c"]);
        assert!(outcomes[0].passed);
        assert_eq!(outcomes[0].message, "OK");
        assert_eq!(outcomes[1].kind, OutcomeKind::Failed);
        assert!(!outcomes[1].passed);
        assert_eq!(outcomes[2].kind, OutcomeKind::Errored);
    }

    #[test]
    fn test_messages_may_be_empty_or_multiline() {
        let raw = [record("test_a", "failed", ""), record("test_b", "errored", "line 1\nline 2")]
            .join(&RECORD_SEPARATOR.to_string());
        let outcomes = parse_report(&raw).unwrap();
        assert_eq!(outcomes[0].message, "");
        assert_eq!(outcomes[1].message, "line 1\nline 2");
    }

    #[test]
    fn test_malformed_records_are_protocol_errors() {
        assert!(matches!(
            parse_report("test_a"),
            Err(SandboxError::Protocol(_))
        ));
        assert!(matches!(
            parse_report(&record("test_a", "skipped", "")),
            Err(SandboxError::Protocol(_))
        ));
    }
}
