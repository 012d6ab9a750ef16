// ── Poll and control outcomes ──
//
// Every status request ends in exactly one `PollOutcome`; every control
// request in one `ControlResult`. The poll machine drives its transitions
// from these alone, so vendors never touch session or availability state.

use std::time::Duration;

use hablink_api::Error;
use serde::Serialize;

/// Classification of one status request.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<S> {
    /// Well-formed status, ready to publish.
    Ok(S),
    /// Device temporarily refuses requests (another client is in control).
    Busy,
    /// Device is in service mode.
    InService,
    /// Vendor no longer accepts the session.
    SessionExpired,
    /// Network or HTTP failure.
    TransportError(String),
    /// Response arrived but could not be understood.
    ParseError(String),
}

/// [`PollOutcome`] without its payload, for reports and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum OutcomeKind {
    Ok,
    Busy,
    InService,
    SessionExpired,
    TransportError,
    ParseError,
}

impl<S> PollOutcome<S> {
    /// Classify a failed login or status request.
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::Authentication { .. } | Error::SessionExpired => Self::SessionExpired,
            Error::Deserialization { message, .. } => Self::ParseError(message.clone()),
            other => Self::TransportError(other.to_string()),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Ok(_) => OutcomeKind::Ok,
            Self::Busy => OutcomeKind::Busy,
            Self::InService => OutcomeKind::InService,
            Self::SessionExpired => OutcomeKind::SessionExpired,
            Self::TransportError(_) => OutcomeKind::TransportError,
            Self::ParseError(_) => OutcomeKind::ParseError,
        }
    }

    pub fn map<T>(self, f: impl FnOnce(S) -> T) -> PollOutcome<T> {
        match self {
            Self::Ok(s) => PollOutcome::Ok(f(s)),
            Self::Busy => PollOutcome::Busy,
            Self::InService => PollOutcome::InService,
            Self::SessionExpired => PollOutcome::SessionExpired,
            Self::TransportError(r) => PollOutcome::TransportError(r),
            Self::ParseError(r) => PollOutcome::ParseError(r),
        }
    }
}

// ── Control results ──────────────────────────────────────────────────

/// How many follow-up polls confirm an accepted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirm {
    None,
    /// One poll after a second.
    Once,
    /// Polls after one and fifteen seconds; panels apply changes slowly.
    Twice,
}

impl Confirm {
    /// Delays of the follow-up polls, relative to the command.
    pub fn follow_ups(self) -> Vec<Duration> {
        match self {
            Self::None => Vec::new(),
            Self::Once => vec![Duration::from_secs(1)],
            Self::Twice => vec![Duration::from_secs(1), Duration::from_secs(15)],
        }
    }
}

/// Classification of one control request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlResult {
    Accepted(Confirm),
    /// Device asks for additional input (the user code) before acting.
    InputRequired,
    SessionExpired,
    Rejected { code: Option<i64>, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_classify_into_outcomes() {
        let expired: PollOutcome<()> = PollOutcome::from_error(&Error::SessionExpired);
        assert_eq!(expired, PollOutcome::SessionExpired);

        let auth: PollOutcome<()> = PollOutcome::from_error(&Error::Authentication {
            message: "bad token".into(),
        });
        assert_eq!(auth.kind(), OutcomeKind::SessionExpired);

        let parse: PollOutcome<()> = PollOutcome::from_error(&Error::Deserialization {
            message: "eof".into(),
            body: String::new(),
        });
        assert_eq!(parse, PollOutcome::ParseError("eof".into()));

        let transport: PollOutcome<()> =
            PollOutcome::from_error(&Error::Timeout { timeout_secs: 15 });
        assert_eq!(transport.kind(), OutcomeKind::TransportError);
    }

    #[test]
    fn confirm_follow_up_delays() {
        assert!(Confirm::None.follow_ups().is_empty());
        assert_eq!(Confirm::Once.follow_ups(), vec![Duration::from_secs(1)]);
        assert_eq!(
            Confirm::Twice.follow_ups(),
            vec![Duration::from_secs(1), Duration::from_secs(15)]
        );
    }

    #[test]
    fn outcome_kind_display() {
        assert_eq!(OutcomeKind::InService.to_string(), "in-service");
        assert_eq!(PollOutcome::Ok(5).map(|n| n * 2), PollOutcome::Ok(10));
    }
}
