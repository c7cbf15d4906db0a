//! Subject grammar.
//!
//! Subjects are tokens joined by [`DELIMITER`]. Patterns may additionally use
//! [`SINGLE_WILDCARD`] for exactly one token and [`FULL_WILDCARD`] for one or
//! more trailing tokens.

/// Token delimiter.
pub const DELIMITER: char = '.';

/// Matches exactly one token.
pub const SINGLE_WILDCARD: &str = "*";

/// Matches one or more trailing tokens. Only valid as the last token.
pub const FULL_WILDCARD: &str = ">";

/// Maximum subject length in bytes.
pub const MAX_SUBJECT_LENGTH: usize = 1024;

/// Split a subject or pattern into tokens.
pub fn tokens(subject: &str) -> impl Iterator<Item = &str> {
    subject.split(DELIMITER)
}

/// Whether a single token contains only characters allowed in subjects.
#[must_use]
pub fn is_valid_token(token: &str) -> bool {
    !token.is_empty()
        && !token
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == DELIMITER)
}

/// Validate a concrete subject (no wildcards, no empty tokens).
///
/// # Errors
///
/// Returns an error message if the subject is not a valid concrete subject.
pub fn validate_subject(subject: &str) -> Result<(), &'static str> {
    if subject.is_empty() {
        return Err("Subject cannot be empty");
    }
    if subject.len() > MAX_SUBJECT_LENGTH {
        return Err("Subject too long");
    }
    for token in tokens(subject) {
        if !is_valid_token(token) {
            return Err("Subject contains an empty or invalid token");
        }
        if token == SINGLE_WILDCARD || token == FULL_WILDCARD {
            return Err("Subject cannot contain wildcards");
        }
    }
    Ok(())
}

/// Check whether `subject` is matched by `pattern`.
///
/// This is a direct token walk used by transports to pick an endpoint; the
/// router's handler lookup uses its own tree.
#[must_use]
pub fn matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_tokens = tokens(pattern);
    let mut subject_tokens = tokens(subject);

    loop {
        match (pattern_tokens.next(), subject_tokens.next()) {
            (Some(FULL_WILDCARD), Some(_)) => return pattern_tokens.next().is_none(),
            (Some(SINGLE_WILDCARD), Some(_)) => {}
            (Some(p), Some(s)) if p == s => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_subject() {
        assert!(validate_subject("orders.eu.created").is_ok());
        assert!(validate_subject("").is_err());
        assert!(validate_subject("orders..created").is_err());
        assert!(validate_subject("orders.*").is_err());
        assert!(validate_subject("orders.>").is_err());
        assert!(validate_subject("orders. eu").is_err());

        let long = "a".repeat(MAX_SUBJECT_LENGTH + 1);
        assert!(validate_subject(&long).is_err());
    }

    #[test]
    fn test_matches_wildcards() {
        assert!(matches("a.*.c", "a.b.c"));
        assert!(!matches("a.*.c", "a.b.b.c"));
        assert!(matches("a.>", "a.b"));
        assert!(matches("a.>", "a.b.c"));
        assert!(!matches("a.>", "a"));
        assert!(matches(">", "anything.at.all"));
        assert!(!matches("a.b", "a.b.c"));
        assert!(!matches("a.b.c", "a.b"));
    }

    #[test]
    fn test_full_wildcard_must_be_last() {
        assert!(!matches("a.>.c", "a.b.c"));
    }
}
