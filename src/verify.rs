//! Document verification sub-flow.
//!
//! During registration, PG students upload a university admission proof and
//! hospital staff upload an ID card. Each upload is judged by an external
//! multimodal text-generation service that is asked to answer with the
//! literal token "VERIFIED" or "REJECTED: <reason>". The service is an
//! untrusted, fallible oracle: its reply is free text, so the outcome
//! decision is isolated in `parse_verdict` and unit-tested with canned
//! responses. A failed or errored call must never leave a slot verified.

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::identity::Role;

/// Structured outcome of one verification reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail { reason: String },
}

static REJECTED_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)REJECTED:").unwrap());

/// Decide the outcome of a raw service reply.
///
/// Case-insensitive substring match for "VERIFIED" wins; otherwise the text
/// after a "REJECTED:" marker (trimmed) becomes the rejection reason. A reply
/// with neither marker, or an empty remainder, yields an empty reason that
/// the slot layer replaces with a per-document fallback message.
pub fn parse_verdict(response: &str) -> Verdict {
    if response.to_uppercase().contains("VERIFIED") {
        return Verdict::Pass;
    }
    let reason = match REJECTED_MARKER.find(response) {
        Some(m) => response[m.end()..].trim().to_string(),
        None => String::new(),
    };
    Verdict::Fail { reason }
}

/// The two document slots tracked during registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    UniversityProof,
    IdCard,
}

impl DocumentKind {
    /// Role- and document-specific instruction sent alongside the image.
    pub fn instruction(&self, role: Role) -> String {
        match self {
            DocumentKind::UniversityProof => {
                "Analyze this image and determine if it is a legitimate university admission \
                 proof or medical student ID card. Look for official seals, university logos, \
                 student information, and signs of authenticity. Respond with ONLY \"VERIFIED\" \
                 if it appears to be a genuine university document, or \"REJECTED: [reason]\" \
                 if it appears fake or invalid."
                    .to_string()
            }
            DocumentKind::IdCard => {
                let role_text = if role == Role::HospitalDoctor { "doctor" } else { "hospital authority/staff" };
                format!(
                    "Analyze this image and determine if it is a legitimate {role_text} ID card. \
                     Look for official hospital/medical institution logos, employee information, \
                     photo, designation, and signs of authenticity. Respond with ONLY \"VERIFIED\" \
                     if it appears to be a genuine {role_text} ID card, or \"REJECTED: [reason]\" \
                     if it appears fake or invalid."
                )
            }
        }
    }

    /// Message shown when the service rejects without a usable reason.
    pub fn fallback_reason(&self) -> &'static str {
        match self {
            DocumentKind::UniversityProof => {
                "The uploaded document could not be verified as a legitimate university proof. Please upload a valid document."
            }
            DocumentKind::IdCard => {
                "The uploaded ID card could not be verified as legitimate. Please upload a valid ID card."
            }
        }
    }
}

/// Message shown on transport/service failure.
pub const TRANSPORT_FAILURE_MESSAGE: &str = "Failed to verify document. Please try again.";

/// Errors from the HTTP verifier client. Always caught by the slot layer and
/// mapped to an unverified outcome with a generic user-facing message.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("verification request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("verification service returned HTTP {0}")]
    Status(reqwest::StatusCode),
}

/// External document verifier: sends one user turn (instruction + inline
/// image reference) and returns the raw text reply. Transport errors bubble
/// as `Err` and are treated by the slot layer as an unverified outcome.
#[async_trait]
pub trait DocumentVerifier: Send + Sync {
    async fn generate(&self, instruction: &str, image_uri: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct GenerateTextResponse {
    completion: String,
}

/// HTTP client for a text-and-image generation endpoint.
pub struct GenerateTextClient {
    endpoint: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl GenerateTextClient {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self { endpoint: endpoint.into(), api_key, http: reqwest::Client::new() }
    }
}

#[async_trait]
impl DocumentVerifier for GenerateTextClient {
    async fn generate(&self, instruction: &str, image_uri: &str) -> Result<String> {
        let body = serde_json::json!({
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": instruction },
                    { "type": "image", "image": image_uri }
                ]
            }]
        });
        let mut req = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await.map_err(VerifyError::Transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(VerifyError::Status(status).into());
        }
        let parsed: GenerateTextResponse = resp.json().await.context("invalid verification response body")?;
        debug!(target: "mediconnect::verify", "generate: reply_len={}", parsed.completion.len());
        Ok(parsed.completion)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotStatus {
    #[default]
    Idle,
    InFlight,
    Resolved,
}

/// Per-document upload-and-verify state tracked during registration.
///
/// The epoch counter guards against stale resolutions: a result that arrives
/// after the slot was cleared (user navigated away or reset the form) is
/// dropped instead of being applied.
#[derive(Debug, Clone)]
pub struct VerificationSlot {
    kind: DocumentKind,
    status: SlotStatus,
    uri: Option<String>,
    verified: bool,
    reason: Option<String>,
    epoch: u64,
}

impl VerificationSlot {
    pub fn new(kind: DocumentKind) -> Self {
        Self { kind, status: SlotStatus::Idle, uri: None, verified: false, reason: None, epoch: 0 }
    }

    pub fn kind(&self) -> DocumentKind { self.kind }
    pub fn status(&self) -> SlotStatus { self.status }
    pub fn uri(&self) -> Option<&str> { self.uri.as_deref() }
    pub fn is_verified(&self) -> bool { self.verified }
    pub fn reason(&self) -> Option<&str> { self.reason.as_deref() }

    /// Start a verification attempt for the selected image.
    ///
    /// Returns the attempt's epoch, or `None` while another attempt is still
    /// in flight (at most one outstanding verification per slot).
    pub fn begin(&mut self, uri: impl Into<String>) -> Option<u64> {
        if self.status == SlotStatus::InFlight {
            return None;
        }
        self.epoch += 1;
        self.status = SlotStatus::InFlight;
        self.uri = Some(uri.into());
        self.verified = false;
        self.reason = None;
        Some(self.epoch)
    }

    /// Apply the outcome of the attempt identified by `epoch`.
    ///
    /// Stale epochs are dropped. On pass the uploaded reference is retained;
    /// on rejection or transport error the reference is cleared and a reason
    /// is surfaced, so a failed call can never leave the slot verified.
    pub fn resolve(&mut self, epoch: u64, outcome: Result<String>) {
        if epoch != self.epoch || self.status != SlotStatus::InFlight {
            debug!(target: "mediconnect::verify", "resolve: dropping stale outcome epoch={epoch}");
            return;
        }
        self.status = SlotStatus::Resolved;
        match outcome {
            Ok(text) => match parse_verdict(&text) {
                Verdict::Pass => {
                    self.verified = true;
                    self.reason = None;
                }
                Verdict::Fail { reason } => {
                    self.verified = false;
                    self.uri = None;
                    self.reason = Some(if reason.is_empty() {
                        self.kind.fallback_reason().to_string()
                    } else {
                        reason
                    });
                }
            },
            Err(e) => {
                warn!(target: "mediconnect::verify", "verification call failed: {e:#}");
                self.verified = false;
                self.uri = None;
                self.reason = Some(TRANSPORT_FAILURE_MESSAGE.to_string());
            }
        }
    }

    /// Reset to idle, abandoning any in-flight attempt. Bumping the epoch
    /// guarantees a late result from the abandoned attempt is dropped.
    pub fn clear(&mut self) {
        self.epoch += 1;
        self.status = SlotStatus::Idle;
        self.uri = None;
        self.verified = false;
        self.reason = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verified_matches_any_case_and_position() {
        assert_eq!(parse_verdict("VERIFIED"), Verdict::Pass);
        assert_eq!(parse_verdict("verified"), Verdict::Pass);
        assert_eq!(parse_verdict("The document is Verified."), Verdict::Pass);
    }

    #[test]
    fn rejected_reason_is_extracted_and_trimmed() {
        assert_eq!(
            parse_verdict("REJECTED: blurry image"),
            Verdict::Fail { reason: "blurry image".into() }
        );
        assert_eq!(
            parse_verdict("rejected:   no official seal  "),
            Verdict::Fail { reason: "no official seal".into() }
        );
    }

    #[test]
    fn missing_markers_yield_empty_reason() {
        assert_eq!(parse_verdict("I cannot tell"), Verdict::Fail { reason: String::new() });
        assert_eq!(parse_verdict("REJECTED:"), Verdict::Fail { reason: String::new() });
    }

    #[test]
    fn id_card_instruction_names_the_role() {
        let doc = DocumentKind::IdCard.instruction(Role::HospitalDoctor);
        assert!(doc.contains("doctor ID card"));
        let auth = DocumentKind::IdCard.instruction(Role::HospitalAuthority);
        assert!(auth.contains("hospital authority/staff ID card"));
    }

    #[test]
    fn slot_pass_retains_uri() {
        let mut slot = VerificationSlot::new(DocumentKind::UniversityProof);
        let epoch = slot.begin("file:///proof.png").unwrap();
        assert_eq!(slot.status(), SlotStatus::InFlight);
        slot.resolve(epoch, Ok("VERIFIED".into()));
        assert!(slot.is_verified());
        assert_eq!(slot.uri(), Some("file:///proof.png"));
        assert!(slot.reason().is_none());
    }

    #[test]
    fn slot_rejection_clears_uri_and_surfaces_reason() {
        let mut slot = VerificationSlot::new(DocumentKind::IdCard);
        let epoch = slot.begin("file:///id.png").unwrap();
        slot.resolve(epoch, Ok("REJECTED: blurry image".into()));
        assert!(!slot.is_verified());
        assert!(slot.uri().is_none());
        assert_eq!(slot.reason(), Some("blurry image"));
    }

    #[test]
    fn ambiguous_reply_uses_fallback_reason() {
        let mut slot = VerificationSlot::new(DocumentKind::UniversityProof);
        let epoch = slot.begin("file:///proof.png").unwrap();
        slot.resolve(epoch, Ok("hmm, unclear".into()));
        assert!(!slot.is_verified());
        assert_eq!(slot.reason(), Some(DocumentKind::UniversityProof.fallback_reason()));
    }

    #[test]
    fn transport_error_clears_uri_with_generic_message() {
        let mut slot = VerificationSlot::new(DocumentKind::IdCard);
        let epoch = slot.begin("file:///id.png").unwrap();
        slot.resolve(epoch, Err(anyhow::anyhow!("connection refused")));
        assert!(!slot.is_verified());
        assert!(slot.uri().is_none());
        assert_eq!(slot.reason(), Some(TRANSPORT_FAILURE_MESSAGE));
    }

    #[test]
    fn begin_refuses_while_in_flight() {
        let mut slot = VerificationSlot::new(DocumentKind::UniversityProof);
        let _first = slot.begin("a.png").unwrap();
        assert!(slot.begin("b.png").is_none());
    }

    #[test]
    fn stale_resolution_after_clear_is_dropped() {
        let mut slot = VerificationSlot::new(DocumentKind::UniversityProof);
        let epoch = slot.begin("a.png").unwrap();
        slot.clear();
        slot.resolve(epoch, Ok("VERIFIED".into()));
        assert_eq!(slot.status(), SlotStatus::Idle);
        assert!(!slot.is_verified());
        assert!(slot.uri().is_none());
    }
}
