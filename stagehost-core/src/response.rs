use std::sync::Arc;

/// Classified controller response line.
///
/// `BUSY` and `DONE` are the only tokens the firmware promises. Anything
/// else is free-form diagnostics, kept verbatim for the log rather than
/// treated as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseEvent {
    Busy,
    Done,
    Info(Arc<str>),
}

/// Classify one decoded response line.
///
/// Matching is exact and case-sensitive after trimming surrounding
/// whitespace.
pub fn classify(line: &str) -> ResponseEvent {
    match line.trim() {
        "BUSY" => ResponseEvent::Busy,
        "DONE" => ResponseEvent::Done,
        other => ResponseEvent::Info(Arc::from(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_status_tokens() {
        assert_eq!(classify("BUSY"), ResponseEvent::Busy);
        assert_eq!(classify("DONE"), ResponseEvent::Done);
        assert_eq!(classify("  DONE\r"), ResponseEvent::Done);
    }

    #[test]
    fn match_is_case_sensitive() {
        assert!(matches!(classify("done"), ResponseEvent::Info(_)));
        assert!(matches!(classify("Busy"), ResponseEvent::Info(_)));
    }

    #[test]
    fn keeps_diagnostics_verbatim() {
        let ResponseEvent::Info(text) = classify("homing axis 1\r") else {
            panic!("diagnostic line should classify as info");
        };
        assert_eq!(&*text, "homing axis 1");
    }
}
