//! Session login-lifecycle state machine.

/// Lifecycle state of one protocol session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Session created; no QR code issued yet.
    #[default]
    Unauthenticated,
    /// Correlation UUID obtained; QR code can be displayed.
    QrIssued,
    /// Polling the login-status endpoint for a scan.
    AwaitingScan,
    /// Scan confirmed; redirect URL obtained, credentials not yet fetched.
    Redirected,
    /// Credentials extracted; the session is authenticated.
    CredentialsSet,
    /// Init completed; sync cursor and contact snapshot are populated.
    Initialized,
    /// Session evicted after remote invalidation; cannot be reused.
    Expired,
}

impl SessionState {
    /// Check if transition to target state is valid.
    ///
    /// Handshake steps are strictly sequential:
    /// `Unauthenticated -> QrIssued -> AwaitingScan -> Redirected ->
    /// CredentialsSet -> Initialized`. A timed-out scan wait stays in
    /// `AwaitingScan` and may re-enter it. Any live state may expire.
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        if target == Expired {
            return *self != Expired;
        }
        matches!(
            (*self, target),
            (Unauthenticated, QrIssued)
                | (QrIssued, AwaitingScan)
                | (AwaitingScan, AwaitingScan)
                | (AwaitingScan, Redirected)
                | (Redirected, CredentialsSet)
                | (CredentialsSet, Initialized)
        )
    }

    /// Attempt to transition to a new state.
    ///
    /// Returns `Ok(())` if the transition is valid, or an error otherwise.
    pub fn transition_to(&mut self, target: SessionState) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(crate::error::WebWxError::InvalidStateTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Check if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Expired)
    }

    /// Whether the handshake has produced credentials.
    pub fn has_credentials(&self) -> bool {
        matches!(self, SessionState::CredentialsSet | SessionState::Initialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_sequence() {
        let mut state = SessionState::Unauthenticated;
        assert!(state.transition_to(SessionState::QrIssued).is_ok());
        assert!(state.transition_to(SessionState::AwaitingScan).is_ok());
        assert!(state.transition_to(SessionState::Redirected).is_ok());
        assert!(state.transition_to(SessionState::CredentialsSet).is_ok());
        assert!(state.transition_to(SessionState::Initialized).is_ok());
        assert_eq!(state, SessionState::Initialized);
    }

    #[test]
    fn test_no_step_skipping() {
        let mut state = SessionState::Unauthenticated;
        assert!(state.transition_to(SessionState::Redirected).is_err());
        assert!(state.transition_to(SessionState::Initialized).is_err());
        // State unchanged after rejected transitions
        assert_eq!(state, SessionState::Unauthenticated);
    }

    #[test]
    fn test_awaiting_scan_reentry() {
        let mut state = SessionState::AwaitingScan;
        // A timed-out wait may be retried
        assert!(state.transition_to(SessionState::AwaitingScan).is_ok());
    }

    #[test]
    fn test_any_live_state_may_expire() {
        for state in [
            SessionState::Unauthenticated,
            SessionState::QrIssued,
            SessionState::AwaitingScan,
            SessionState::Redirected,
            SessionState::CredentialsSet,
            SessionState::Initialized,
        ] {
            let mut state = state;
            assert!(state.transition_to(SessionState::Expired).is_ok());
        }
    }

    #[test]
    fn test_expired_is_terminal() {
        let mut state = SessionState::Expired;
        assert!(state.is_terminal());
        assert!(state.transition_to(SessionState::QrIssued).is_err());
        assert!(state.transition_to(SessionState::Expired).is_err());
    }

    #[test]
    fn test_has_credentials() {
        assert!(!SessionState::Unauthenticated.has_credentials());
        assert!(!SessionState::Redirected.has_credentials());
        assert!(SessionState::CredentialsSet.has_credentials());
        assert!(SessionState::Initialized.has_credentials());
    }

    #[test]
    fn test_default() {
        assert_eq!(SessionState::default(), SessionState::Unauthenticated);
    }
}
