//! Startup credential check and sign-in.

use crate::credentials::CredentialAuthority;
use crate::error::Result;
use serde::Serialize;

/// Where the gate stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    /// No check has run yet.
    Unchecked,
    /// A credential check or sign-in is outstanding.
    Checking,
    /// A credential is available; the studio is usable.
    Ready,
    /// No credential; the user has to sign in.
    NotReady,
}

/// What to do after the sign-in flow reports success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignInPolicy {
    /// Trust the flow and become `Ready` immediately.
    #[default]
    Optimistic,
    /// Ask the authority again and only become `Ready` if it now has a credential.
    Verify,
}

/// Gate that decides whether the studio may be used.
#[derive(Debug, Clone)]
pub struct AccessGate {
    state: GateState,
    policy: SignInPolicy,
}

impl Default for AccessGate {
    fn default() -> Self {
        Self::new(SignInPolicy::default())
    }
}

impl AccessGate {
    /// Creates an unchecked gate.
    pub fn new(policy: SignInPolicy) -> Self {
        Self {
            state: GateState::Unchecked,
            policy,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> GateState {
        self.state
    }

    /// Returns true if the studio may be used.
    pub fn is_ready(&self) -> bool {
        self.state == GateState::Ready
    }

    /// Runs the startup check. With no authority a credential is assumed.
    ///
    /// A failing check leaves the gate `NotReady` and returns the error.
    pub async fn check(&mut self, authority: Option<&dyn CredentialAuthority>) -> Result<GateState> {
        let Some(authority) = authority else {
            self.transition(GateState::Ready);
            return Ok(self.state);
        };

        self.transition(GateState::Checking);
        match authority.has_credential().await {
            Ok(true) => self.transition(GateState::Ready),
            Ok(false) => self.transition(GateState::NotReady),
            Err(e) => {
                self.transition(GateState::NotReady);
                return Err(e);
            }
        }
        Ok(self.state)
    }

    /// Runs the external sign-in flow.
    ///
    /// An error opening the flow puts the gate back where it was.
    pub async fn sign_in(&mut self, authority: Option<&dyn CredentialAuthority>) -> Result<GateState> {
        let Some(authority) = authority else {
            self.transition(GateState::Ready);
            return Ok(self.state);
        };

        let previous = self.state;
        self.transition(GateState::Checking);
        if let Err(e) = authority.request_credential().await {
            tracing::warn!("sign-in failed: {e}");
            self.transition(previous);
            return Err(e);
        }

        match self.policy {
            SignInPolicy::Optimistic => self.transition(GateState::Ready),
            SignInPolicy::Verify => match authority.has_credential().await {
                Ok(true) => self.transition(GateState::Ready),
                Ok(false) => self.transition(GateState::NotReady),
                Err(e) => {
                    self.transition(GateState::NotReady);
                    return Err(e);
                }
            },
        }
        Ok(self.state)
    }

    /// Forces the user back through sign-in.
    pub fn reset(&mut self) {
        self.transition(GateState::NotReady);
    }

    fn transition(&mut self, next: GateState) {
        if self.state != next {
            tracing::info!(from = ?self.state, to = ?next, "access gate");
        }
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StylizeError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeAuthority {
        present: AtomicBool,
        fail_request: bool,
        grant_on_request: bool,
        checks: AtomicUsize,
    }

    #[async_trait]
    impl CredentialAuthority for FakeAuthority {
        async fn has_credential(&self) -> Result<bool> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            Ok(self.present.load(Ordering::SeqCst))
        }

        async fn request_credential(&self) -> Result<()> {
            if self.fail_request {
                return Err(StylizeError::Auth("dialog unavailable".into()));
            }
            if self.grant_on_request {
                self.present.store(true, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_no_authority_assumes_ready() {
        let mut gate = AccessGate::default();
        assert_eq!(gate.state(), GateState::Unchecked);
        assert_eq!(gate.check(None).await.unwrap(), GateState::Ready);
    }

    #[tokio::test]
    async fn test_check_with_and_without_credential() {
        let authority = FakeAuthority::default();
        let mut gate = AccessGate::default();
        assert_eq!(gate.check(Some(&authority)).await.unwrap(), GateState::NotReady);

        authority.present.store(true, Ordering::SeqCst);
        assert_eq!(gate.check(Some(&authority)).await.unwrap(), GateState::Ready);
    }

    #[tokio::test]
    async fn test_optimistic_sign_in_skips_verification() {
        // The dialog "succeeds" without actually producing a credential.
        let authority = FakeAuthority::default();
        let mut gate = AccessGate::new(SignInPolicy::Optimistic);
        gate.check(Some(&authority)).await.unwrap();

        assert_eq!(gate.sign_in(Some(&authority)).await.unwrap(), GateState::Ready);
        assert_eq!(authority.checks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_verified_sign_in() {
        let authority = FakeAuthority::default();
        let mut gate = AccessGate::new(SignInPolicy::Verify);
        assert_eq!(gate.sign_in(Some(&authority)).await.unwrap(), GateState::NotReady);

        let granting = FakeAuthority {
            grant_on_request: true,
            ..Default::default()
        };
        assert_eq!(gate.sign_in(Some(&granting)).await.unwrap(), GateState::Ready);
    }

    #[tokio::test]
    async fn test_sign_in_error_keeps_not_ready() {
        let authority = FakeAuthority {
            fail_request: true,
            ..Default::default()
        };
        let mut gate = AccessGate::default();
        gate.check(Some(&authority)).await.unwrap();

        assert!(gate.sign_in(Some(&authority)).await.is_err());
        assert_eq!(gate.state(), GateState::NotReady);
    }

    #[tokio::test]
    async fn test_failed_re_sign_in_keeps_access() {
        let authority = FakeAuthority {
            fail_request: true,
            ..Default::default()
        };
        authority.present.store(true, Ordering::SeqCst);
        let mut gate = AccessGate::default();
        assert_eq!(gate.check(Some(&authority)).await.unwrap(), GateState::Ready);

        assert!(gate.sign_in(Some(&authority)).await.is_err());
        assert_eq!(gate.state(), GateState::Ready);
    }

    #[tokio::test]
    async fn test_reset() {
        let mut gate = AccessGate::default();
        gate.check(None).await.unwrap();
        gate.reset();
        assert_eq!(gate.state(), GateState::NotReady);
        assert!(!gate.is_ready());
    }
}
