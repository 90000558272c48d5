//! API key storage and the host credential authority.
//!
//! The access gate asks a [`CredentialAuthority`] whether a usable key exists
//! and, when it does not, asks it to obtain one. [`ApiKeyAuthority`] backs
//! that with a [`SharedApiKey`] slot that providers read on every request, so
//! a key entered at sign-in is picked up without rebuilding the provider.

use crate::error::{Result, StylizeError};
use async_trait::async_trait;
use std::sync::{Arc, RwLock};

/// Environment variables consulted for the API key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Host capability that knows whether a credential exists and can obtain one.
#[async_trait]
pub trait CredentialAuthority: Send + Sync {
    /// Returns true if a usable credential is present.
    async fn has_credential(&self) -> Result<bool>;

    /// Runs the external sign-in flow.
    async fn request_credential(&self) -> Result<()>;
}

/// Source of a new API key during sign-in (a prompt, a dialog, a secret store).
#[async_trait]
pub trait KeyPrompt: Send + Sync {
    /// Asks for a key. An empty answer counts as cancellation.
    async fn prompt_for_key(&self) -> Result<String>;
}

/// A cloneable, shared slot holding the current API key.
#[derive(Clone, Default)]
pub struct SharedApiKey {
    inner: Arc<RwLock<Option<String>>>,
}

impl SharedApiKey {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a slot holding `key`.
    pub fn with_key(key: impl Into<String>) -> Self {
        let slot = Self::new();
        slot.set(key);
        slot
    }

    /// Creates a slot seeded from `GEMINI_API_KEY` or `GOOGLE_API_KEY`.
    pub fn from_env() -> Self {
        let slot = Self::new();
        if let Some(key) = API_KEY_ENV_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|v| !v.trim().is_empty())
        {
            slot.set(key);
        }
        slot
    }

    /// Returns the current key, if one is set.
    pub fn get(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Returns true if a non-blank key is set.
    pub fn is_present(&self) -> bool {
        self.get().is_some_and(|k| !k.trim().is_empty())
    }

    /// Stores a key, replacing any previous one.
    pub fn set(&self, key: impl Into<String>) {
        let key = key.into().trim().to_string();
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = Some(key);
    }

    /// Forgets the stored key.
    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl std::fmt::Debug for SharedApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedApiKey")
            .field("present", &self.is_present())
            .finish()
    }
}

/// Credential authority backed by a [`SharedApiKey`].
///
/// Without a prompt, sign-in cannot be performed and fails with
/// [`StylizeError::Auth`].
pub struct ApiKeyAuthority {
    key: SharedApiKey,
    prompt: Option<Box<dyn KeyPrompt>>,
}

impl ApiKeyAuthority {
    /// Creates an authority over `key` with no sign-in flow.
    pub fn new(key: SharedApiKey) -> Self {
        Self { key, prompt: None }
    }

    /// Attaches the prompt used by [`CredentialAuthority::request_credential`].
    pub fn with_prompt(mut self, prompt: impl KeyPrompt + 'static) -> Self {
        self.prompt = Some(Box::new(prompt));
        self
    }

    /// Returns the key slot.
    pub fn key(&self) -> &SharedApiKey {
        &self.key
    }
}

#[async_trait]
impl CredentialAuthority for ApiKeyAuthority {
    async fn has_credential(&self) -> Result<bool> {
        Ok(self.key.is_present())
    }

    async fn request_credential(&self) -> Result<()> {
        let prompt = self.prompt.as_ref().ok_or_else(|| {
            StylizeError::Auth(format!(
                "no sign-in flow available; set {} instead",
                API_KEY_ENV_VARS.join(" or ")
            ))
        })?;

        let key = prompt.prompt_for_key().await?;
        if key.trim().is_empty() {
            return Err(StylizeError::Auth("sign-in cancelled".into()));
        }

        self.key.set(key);
        tracing::debug!("stored API key from sign-in");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedPrompt(&'static str);

    #[async_trait]
    impl KeyPrompt for FixedPrompt {
        async fn prompt_for_key(&self) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_shared_key_is_shared() {
        let a = SharedApiKey::new();
        let b = a.clone();
        assert!(!b.is_present());

        a.set("  secret  ");
        assert_eq!(b.get().as_deref(), Some("secret"));

        b.clear();
        assert!(a.get().is_none());
    }

    #[test]
    fn test_blank_key_is_not_present() {
        assert!(!SharedApiKey::with_key("   ").is_present());
    }

    #[test]
    fn test_debug_hides_key() {
        let debug = format!("{:?}", SharedApiKey::with_key("secret"));
        assert!(!debug.contains("secret"));
        assert!(debug.contains("present: true"));
    }

    #[tokio::test]
    async fn test_sign_in_stores_key() {
        let authority = ApiKeyAuthority::new(SharedApiKey::new()).with_prompt(FixedPrompt("k-123"));
        assert!(!authority.has_credential().await.unwrap());

        authority.request_credential().await.unwrap();
        assert!(authority.has_credential().await.unwrap());
        assert_eq!(authority.key().get().as_deref(), Some("k-123"));
    }

    #[tokio::test]
    async fn test_sign_in_cancelled() {
        let authority = ApiKeyAuthority::new(SharedApiKey::new()).with_prompt(FixedPrompt(""));
        assert!(matches!(
            authority.request_credential().await,
            Err(StylizeError::Auth(_))
        ));
        assert!(!authority.has_credential().await.unwrap());
    }

    #[tokio::test]
    async fn test_sign_in_without_prompt() {
        let authority = ApiKeyAuthority::new(SharedApiKey::new());
        match authority.request_credential().await {
            Err(StylizeError::Auth(msg)) => assert!(msg.contains("GEMINI_API_KEY")),
            other => panic!("expected Auth error, got {other:?}"),
        }
    }
}
