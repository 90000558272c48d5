//! The studio controller: upload, prompt, generation lifecycle and access gate.
//!
//! All state lives in [`AppState`] and changes only through [`Studio`]
//! methods. Every failure lands in a single message slot, replaced by the
//! next one, and none of them leave the studio unusable.
//!
//! A generation is split in two so an event loop can keep handling input
//! while the remote call runs:
//!
//! ```no_run
//! # async fn demo(studio: &mut stylize::Studio, service: &dyn stylize::GenerationService) -> stylize::Result<()> {
//! let ticket = studio.begin_generation()?;
//! let outcome = service
//!     .generate(&ticket.image.base64_data, &ticket.image.mime_type, &ticket.prompt)
//!     .await;
//! studio.finish_generation(ticket, outcome)?;
//! # Ok(())
//! # }
//! ```
//!
//! Uploading a new photo while a request is in flight is allowed. The
//! request's result is discarded when it arrives.

use crate::credentials::CredentialAuthority;
use crate::error::{Result, StylizeError};
use crate::gate::{AccessGate, GateState, SignInPolicy};
use crate::image::{
    decode_data_url, encode_upload, EncodedImage, GenerationService, ImageFormat, SelectedFile,
};
use crate::styles::{self, StyleEntry};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Stage of the generation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPhase {
    /// Nothing happening.
    #[default]
    Idle,
    /// Prerequisites are being checked.
    Validating,
    /// A request is outstanding.
    InFlight,
    /// The last request produced an image.
    Succeeded,
    /// The last request failed.
    Failed,
}

/// The photo the user uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Upload {
    /// File name for display.
    pub file_name: String,
    /// Encoded contents.
    pub image: EncodedImage,
}

/// Everything the interface renders.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    upload: Option<Upload>,
    generated: Option<EncodedImage>,
    style_id: Option<String>,
    prompt: String,
    phase: GenerationPhase,
    error: Option<String>,
}

impl AppState {
    /// The uploaded photo.
    pub fn upload(&self) -> Option<&Upload> {
        self.upload.as_ref()
    }

    /// The last generated image.
    pub fn generated(&self) -> Option<&EncodedImage> {
        self.generated.as_ref()
    }

    /// Id of the style the prompt was seeded from.
    pub fn style_id(&self) -> Option<&str> {
        self.style_id.as_deref()
    }

    /// The working prompt.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Lifecycle stage.
    pub fn phase(&self) -> GenerationPhase {
        self.phase
    }

    /// True while a request is outstanding; submission controls are disabled.
    pub fn is_generating(&self) -> bool {
        self.phase == GenerationPhase::InFlight
    }

    /// The user-visible error, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The image to show: the generated one if present, else the upload.
    pub fn displayed_image(&self) -> Option<&EncodedImage> {
        self.generated
            .as_ref()
            .or_else(|| self.upload.as_ref().map(|u| &u.image))
    }
}

/// Studio construction options.
#[derive(Debug, Clone, Default)]
pub struct StudioOptions {
    sign_in_policy: SignInPolicy,
}

impl StudioOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets what happens after the sign-in flow reports success.
    pub fn with_sign_in_policy(mut self, policy: SignInPolicy) -> Self {
        self.sign_in_policy = policy;
        self
    }
}

/// A validated request, handed out by [`Studio::begin_generation`].
#[derive(Debug, Clone)]
#[must_use = "pass the ticket back to Studio::finish_generation"]
pub struct GenerationTicket {
    epoch: u64,
    started: Instant,
    /// Image to send.
    pub image: EncodedImage,
    /// Prompt to send.
    pub prompt: String,
}

/// What [`Studio::finish_generation`] did with a successful outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The image is now displayed.
    Applied,
    /// The photo changed while the request ran; the outcome was dropped.
    Discarded,
}

/// Single controller owning the application state.
pub struct Studio {
    state: AppState,
    gate: AccessGate,
    authority: Option<Arc<dyn CredentialAuthority>>,
    epoch: u64,
}

impl Studio {
    /// Creates a studio. With no authority, a credential is assumed to exist.
    ///
    /// The prompt starts out seeded from the first catalog style.
    pub fn new(authority: Option<Arc<dyn CredentialAuthority>>, options: StudioOptions) -> Self {
        let style = styles::default_style();
        Self {
            state: AppState {
                style_id: Some(style.id.to_string()),
                prompt: style.prompt_text.to_string(),
                ..AppState::default()
            },
            gate: AccessGate::new(options.sign_in_policy),
            authority,
            epoch: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Current access gate state.
    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    /// Runs the startup credential check.
    pub async fn start(&mut self) -> GateState {
        if let Err(e) = self.gate.check(self.authority.as_deref()).await {
            self.state.error = Some(e.to_string());
        }
        self.gate.state()
    }

    /// Runs the sign-in flow. Errors end up in the message slot.
    pub async fn sign_in(&mut self) -> GateState {
        match self.gate.sign_in(self.authority.as_deref()).await {
            Ok(_) if self.gate.is_ready() => self.state.error = None,
            Ok(_) => {
                self.state.error = Some("sign-in did not produce a usable API key".into());
            }
            Err(e) => self.state.error = Some(e.to_string()),
        }
        self.gate.state()
    }

    /// Accepts a new photo, replacing the previous one and any generated
    /// result. Files outside the allow-list are rejected before being read.
    pub async fn upload(&mut self, file: &SelectedFile) -> Result<()> {
        let image = match encode_upload(file).await {
            Ok(image) => image,
            Err(e) => return Err(self.fail_input(e)),
        };

        self.epoch += 1;
        tracing::debug!(
            epoch = self.epoch,
            file = %file.display_name(),
            size_bytes = image.approx_size(),
            "photo uploaded"
        );

        self.state.upload = Some(Upload {
            file_name: file.display_name(),
            image,
        });
        self.state.generated = None;
        self.state.error = None;
        if !self.state.is_generating() {
            self.state.phase = GenerationPhase::Idle;
        }
        Ok(())
    }

    /// Seeds the prompt from a catalog style.
    pub fn select_style(&mut self, id: &str) -> Result<&'static StyleEntry> {
        let Some(style) = styles::find(id) else {
            return Err(self.fail_input(StylizeError::Validation(format!("unknown style: {id}"))));
        };
        self.state.style_id = Some(style.id.to_string());
        self.state.prompt = style.prompt_text.to_string();
        Ok(style)
    }

    /// Replaces the working prompt. The catalog is untouched.
    ///
    /// Once the text differs from the selected style's prompt, the prompt is
    /// custom and no style is selected any more.
    pub fn set_prompt(&mut self, text: impl Into<String>) {
        self.state.prompt = text.into();
        let still_seeded = self
            .state
            .style_id
            .as_deref()
            .and_then(styles::find)
            .is_some_and(|style| style.prompt_text == self.state.prompt);
        if !still_seeded {
            self.state.style_id = None;
        }
    }

    /// Validates prerequisites and marks a request as in flight.
    ///
    /// Nothing is sent on failure; the phase never reaches `InFlight`.
    pub fn begin_generation(&mut self) -> Result<GenerationTicket> {
        if self.state.is_generating() {
            let err = StylizeError::Validation("a generation is already in progress".into());
            self.state.error = Some(err.to_string());
            return Err(err);
        }

        self.state.phase = GenerationPhase::Validating;
        self.state.error = None;

        if !self.gate.is_ready() {
            return Err(self.fail_validation("sign in with an API key first"));
        }
        let Some(image) = self.state.upload.as_ref().map(|u| u.image.clone()) else {
            return Err(self.fail_validation("upload a photo first"));
        };
        if self.state.prompt.trim().is_empty() {
            return Err(self.fail_validation("enter a prompt first"));
        }

        let ticket = GenerationTicket {
            epoch: self.epoch,
            started: Instant::now(),
            image,
            prompt: self.state.prompt.clone(),
        };
        self.state.phase = GenerationPhase::InFlight;
        tracing::debug!(epoch = ticket.epoch, "generation started");
        Ok(ticket)
    }

    /// Applies the outcome of the remote call.
    ///
    /// Failures are folded into [`StylizeError::AuthExpired`] (which also
    /// resets the access gate) or [`StylizeError::Generation`] and returned.
    /// Outcomes for a photo that has since been replaced are discarded.
    pub fn finish_generation(
        &mut self,
        ticket: GenerationTicket,
        outcome: Result<String>,
    ) -> Result<Completion> {
        let duration_ms = ticket.started.elapsed().as_millis() as u64;

        if ticket.epoch != self.epoch || !self.state.is_generating() {
            tracing::debug!(
                ticket_epoch = ticket.epoch,
                epoch = self.epoch,
                duration_ms,
                "discarding stale generation result"
            );
            if self.state.is_generating() {
                self.state.phase = GenerationPhase::Idle;
            }
            return Ok(Completion::Discarded);
        }

        match outcome
            .and_then(|url| decode_data_url(&url))
            .and_then(check_generated)
        {
            Ok(image) => {
                tracing::debug!(epoch = ticket.epoch, duration_ms, mime_type = %image.mime_type, "generation succeeded");
                self.state.generated = Some(image);
                self.state.phase = GenerationPhase::Succeeded;
                self.state.error = None;
                Ok(Completion::Applied)
            }
            Err(e) => {
                let err = e.classify_remote();
                tracing::warn!(epoch = ticket.epoch, duration_ms, "generation failed: {err}");
                if err.resets_access() {
                    self.gate.reset();
                }
                self.state.phase = GenerationPhase::Failed;
                self.state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Validates, calls `service`, and applies the outcome.
    pub async fn generate(&mut self, service: &dyn GenerationService) -> Result<Completion> {
        let ticket = self.begin_generation()?;
        let outcome = service
            .generate(&ticket.image.base64_data, &ticket.image.mime_type, &ticket.prompt)
            .await;
        self.finish_generation(ticket, outcome)
    }

    /// Drops the generated image and shows the upload again.
    pub fn show_original(&mut self) {
        self.state.generated = None;
        if !self.state.is_generating() {
            self.state.phase = GenerationPhase::Idle;
        }
    }

    /// Clears the upload and result so a different photo can be picked.
    pub fn change_photo(&mut self) {
        self.epoch += 1;
        self.state.upload = None;
        self.state.generated = None;
        self.state.error = None;
        if !self.state.is_generating() {
            self.state.phase = GenerationPhase::Idle;
        }
    }

    /// Clears the message slot.
    pub fn dismiss_error(&mut self) {
        self.state.error = None;
        if self.state.phase == GenerationPhase::Failed {
            self.state.phase = GenerationPhase::Idle;
        }
    }

    fn fail_validation(&mut self, reason: &str) -> StylizeError {
        self.state.phase = GenerationPhase::Idle;
        let err = StylizeError::Validation(reason.to_string());
        self.state.error = Some(err.to_string());
        err
    }

    fn fail_input(&mut self, err: StylizeError) -> StylizeError {
        tracing::debug!("rejected input: {err}");
        self.state.error = Some(err.to_string());
        err
    }
}

/// Checks that a generated payload decodes and labels it with the format its
/// bytes actually have.
fn check_generated(mut image: EncodedImage) -> Result<EncodedImage> {
    let bytes = image.decode_bytes()?;
    if let Some(format) = ImageFormat::from_magic_bytes(&bytes) {
        if !format.mime_type().eq_ignore_ascii_case(&image.mime_type) {
            tracing::debug!(
                claimed = %image.mime_type,
                detected = %format,
                "generated image MIME type corrected"
            );
            image.mime_type = format.mime_type().to_string();
        }
    }
    Ok(image)
}
