use thiserror::Error;

/// One failed handler attempt, kept for the aggregate failure report.
#[derive(Clone, Debug)]
pub struct HandlerFailure {
    pub handler: String,
    pub reason: String,
    /// True when the backend could not be reached at all, as opposed to the
    /// backend rejecting the credential.
    pub prevented: bool,
}

fn summarize(attempts: &[HandlerFailure]) -> String {
    if attempts.is_empty() {
        return "no supporting handler succeeded".to_string();
    }
    attempts
        .iter()
        .map(|attempt| {
            if attempt.prevented {
                format!("{} (prevented): {}", attempt.handler, attempt.reason)
            } else {
                format!("{}: {}", attempt.handler, attempt.reason)
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// What the dispatcher reports when no principal could be produced.
#[derive(Debug, Error)]
pub enum AuthnError {
    /// No configured handler supports this credential kind at all.
    #[error("unsupported credentials type: {kind}")]
    UnsupportedCredentials { kind: &'static str },

    /// Every supporting handler failed; the attempts keep handled failures
    /// and prevented attempts apart for operational monitoring.
    #[error("authentication failed: {}", summarize(.attempts))]
    Failed { attempts: Vec<HandlerFailure> },

    /// A handler accepted the credential but the paired resolver produced no
    /// principal. Failing fast here beats granting an anonymous session.
    #[error("handler {handler} accepted the credential but no principal was resolved")]
    PrincipalUnresolved { handler: String },
}

impl AuthnError {
    /// True when every recorded attempt was prevented, i.e. the whole chain
    /// failed on infrastructure rather than credentials.
    #[must_use]
    pub fn prevented_only(&self) -> bool {
        match self {
            Self::Failed { attempts } => {
                !attempts.is_empty() && attempts.iter().all(|attempt| attempt.prevented)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_display_marks_prevented_attempts() {
        let err = AuthnError::Failed {
            attempts: vec![
                HandlerFailure {
                    handler: "local-table".to_string(),
                    reason: "unknown account or bad password".to_string(),
                    prevented: false,
                },
                HandlerFailure {
                    handler: "directory-bind".to_string(),
                    reason: "directory bind timed out".to_string(),
                    prevented: true,
                },
            ],
        };
        let rendered = err.to_string();
        assert!(rendered.contains("local-table: unknown account or bad password"));
        assert!(rendered.contains("directory-bind (prevented): directory bind timed out"));
    }

    #[test]
    fn prevented_only_requires_all_attempts_prevented() {
        let mixed = AuthnError::Failed {
            attempts: vec![
                HandlerFailure {
                    handler: "a".to_string(),
                    reason: "no".to_string(),
                    prevented: false,
                },
                HandlerFailure {
                    handler: "b".to_string(),
                    reason: "down".to_string(),
                    prevented: true,
                },
            ],
        };
        assert!(!mixed.prevented_only());

        let all = AuthnError::Failed {
            attempts: vec![HandlerFailure {
                handler: "b".to_string(),
                reason: "down".to_string(),
                prevented: true,
            }],
        };
        assert!(all.prevented_only());

        assert!(!AuthnError::UnsupportedCredentials { kind: "x" }.prevented_only());
    }
}
