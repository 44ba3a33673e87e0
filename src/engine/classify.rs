//! Classification of engine failures
//!
//! The engine only reports free-form error text, so every heuristic about
//! what a failure means lives in the pattern tables below. The strategy
//! runner acts on [`FailureClass`] and never inspects messages itself.

use super::EngineFailure;
use crate::error::ServiceError;
use regex::RegexSet;
use std::sync::OnceLock;

/// Bot checks, sign-in walls and throttling: another persona may get through
const CHALLENGE_PATTERNS: &[&str] = &[
    r"(?i)sign in to confirm",
    r"(?i)not a bot",
    r"(?i)captcha",
    r"(?i)http error 429",
    r"(?i)too many requests",
    r"(?i)try again later",
];

/// The media itself cannot be served to anyone: stop trying
const UNAVAILABLE_PATTERNS: &[&str] = &[
    r"(?i)private video",
    r"(?i)video unavailable",
    r"(?i)has been removed",
    r"(?i)no longer available",
    r"(?i)account .* has been terminated",
    r"(?i)members[- ]only",
    r"(?i)copyright",
    r"(?i)unsupported url",
];

/// How the strategy runner should react to a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Bot/sign-in challenge, move on to the next persona
    Challenge,
    /// Private, removed or otherwise unavailable, abort the job
    Unavailable,
    /// Anything else, move on after a short backoff
    Transient,
}

fn challenge_set() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| RegexSet::new(CHALLENGE_PATTERNS).expect("valid challenge patterns"))
}

fn unavailable_set() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| RegexSet::new(UNAVAILABLE_PATTERNS).expect("valid unavailable patterns"))
}

/// Classify an engine error message.
///
/// Challenges are checked first: the site reports throttling as
/// "Video unavailable ... try again later", which must not abort the job.
pub fn classify_message(message: &str) -> FailureClass {
    if challenge_set().is_match(message) {
        FailureClass::Challenge
    } else if unavailable_set().is_match(message) {
        FailureClass::Unavailable
    } else {
        FailureClass::Transient
    }
}

/// Classify a failed invocation. Timeouts and spawn errors are transient.
pub fn classify_failure(failure: &EngineFailure) -> FailureClass {
    match failure {
        EngineFailure::Reported(message) => classify_message(message),
        EngineFailure::TimedOut(_) | EngineFailure::Io(_) | EngineFailure::Output(_) => {
            FailureClass::Transient
        }
    }
}

impl FailureClass {
    /// Error recorded for this attempt
    pub fn into_error(self, message: String) -> ServiceError {
        match self {
            FailureClass::Challenge => ServiceError::ExtractionBlocked(message),
            FailureClass::Unavailable => ServiceError::ResourceUnavailable(message),
            FailureClass::Transient => ServiceError::ExtractionFailed(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_challenges() {
        assert_eq!(
            classify_message("ERROR: [youtube] abc: Sign in to confirm you're not a bot"),
            FailureClass::Challenge
        );
        assert_eq!(
            classify_message("ERROR: unable to download webpage: HTTP Error 429: Too Many Requests"),
            FailureClass::Challenge
        );
        assert_eq!(
            classify_message("Video unavailable. This content isn't available, try again later."),
            FailureClass::Challenge
        );
    }

    #[test]
    fn test_unavailable() {
        assert_eq!(
            classify_message("ERROR: [youtube] abc: Private video. Sign in if you've been granted access"),
            FailureClass::Unavailable
        );
        assert_eq!(
            classify_message("ERROR: [youtube] abc: Video unavailable"),
            FailureClass::Unavailable
        );
        assert_eq!(
            classify_message("This video has been removed by the uploader"),
            FailureClass::Unavailable
        );
    }

    #[test]
    fn test_transient() {
        assert_eq!(
            classify_message("ERROR: unable to download video data: HTTP Error 403: Forbidden"),
            FailureClass::Transient
        );
        assert_eq!(
            classify_failure(&EngineFailure::TimedOut(Duration::from_secs(180))),
            FailureClass::Transient
        );
    }

    #[test]
    fn test_into_error() {
        assert!(matches!(
            FailureClass::Unavailable.into_error("gone".into()),
            ServiceError::ResourceUnavailable(_)
        ));
        assert!(FailureClass::Challenge.into_error("bot".into()).is_retryable());
    }
}
