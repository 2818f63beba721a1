//! Registration/authentication flow.
//!
//! A client-side state machine over the auth screen's view-modes:
//! role selection, the hospital authority/doctor sub-selection, and the
//! login-or-register credential form for a resolved role. The flow owns the
//! form fields and both verification slots, runs the ordered submission
//! validation, and hands a role-shaped identity record to the session store.

use tracing::info;

use crate::error::{AppError, AppResult};
use crate::identity::{RegistrationExtras, Role, SessionStore};
use crate::routing::Destination;
use crate::verify::{DocumentKind, DocumentVerifier, VerificationSlot};

/// View-mode of the auth screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    Select,
    HospitalSelect,
    Login,
    Register,
}

/// The two positions offered on the hospital sub-selection screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HospitalKind {
    Authority,
    Doctor,
}

pub const MSG_MISSING_FIELDS: &str = "Please fill in all fields";
pub const MSG_PASSWORDS_MISMATCH: &str = "Passwords do not match";
pub const MSG_PATIENT_PRIVACY: &str = "For privacy, use an anonymous email without your name";
pub const MSG_PROOF_REQUIRED: &str = "Please upload and verify your university admission proof";
pub const MSG_ID_CARD_REQUIRED: &str = "Please upload and verify your ID card";
pub const MSG_AUTH_FAILED: &str = "Authentication failed. Please try again.";

pub struct AuthFlow {
    mode: AuthMode,
    selected_role: Option<Role>,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    proof: VerificationSlot,
    id_card: VerificationSlot,
    error: Option<String>,
    submitting: bool,
}

impl Default for AuthFlow {
    fn default() -> Self { Self::new() }
}

impl AuthFlow {
    pub fn new() -> Self {
        Self {
            mode: AuthMode::Select,
            selected_role: None,
            email: String::new(),
            password: String::new(),
            confirm_password: String::new(),
            proof: VerificationSlot::new(DocumentKind::UniversityProof),
            id_card: VerificationSlot::new(DocumentKind::IdCard),
            error: None,
            submitting: false,
        }
    }

    pub fn mode(&self) -> AuthMode { self.mode }
    pub fn selected_role(&self) -> Option<Role> { self.selected_role }
    pub fn error(&self) -> Option<&str> { self.error.as_deref() }
    pub fn is_submitting(&self) -> bool { self.submitting }
    pub fn proof_slot(&self) -> &VerificationSlot { &self.proof }
    pub fn id_card_slot(&self) -> &VerificationSlot { &self.id_card }

    /// Choose a concrete role; moves straight to the login form.
    pub fn select_role(&mut self, role: Role) {
        self.selected_role = Some(role);
        self.mode = AuthMode::Login;
        self.error = None;
    }

    /// Choose "hospital staff"; moves to the authority/doctor sub-selection.
    pub fn choose_hospital_staff(&mut self) {
        self.mode = AuthMode::HospitalSelect;
        self.error = None;
    }

    pub fn select_hospital_kind(&mut self, kind: HospitalKind) {
        let role = match kind {
            HospitalKind::Authority => Role::HospitalAuthority,
            HospitalKind::Doctor => Role::HospitalDoctor,
        };
        self.select_role(role);
    }

    /// Return to role selection, clearing all form fields, upload state and
    /// verification results. Abandoned in-flight verifications are dropped.
    pub fn reset(&mut self) {
        self.mode = AuthMode::Select;
        self.selected_role = None;
        self.email.clear();
        self.password.clear();
        self.confirm_password.clear();
        self.proof.clear();
        self.id_card.clear();
        self.error = None;
        // A submit future dropped mid-flight must not wedge later submissions.
        self.submitting = false;
    }

    /// Switch between login and register without changing role or clearing
    /// fields; only the error message is reset.
    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            AuthMode::Login => AuthMode::Register,
            AuthMode::Register => AuthMode::Login,
            other => other,
        };
        self.error = None;
    }

    /// Run the verification sub-flow for a selected image.
    ///
    /// Returns true when the slot ended up verified. Refused while another
    /// attempt on the same slot is in flight.
    pub async fn submit_document(
        &mut self,
        kind: DocumentKind,
        image_uri: &str,
        verifier: &dyn DocumentVerifier,
    ) -> bool {
        let role = self.selected_role.unwrap_or(Role::Patient);
        let instruction = kind.instruction(role);
        let slot = match kind {
            DocumentKind::UniversityProof => &mut self.proof,
            DocumentKind::IdCard => &mut self.id_card,
        };
        let Some(epoch) = slot.begin(image_uri) else { return false };
        self.error = None;
        let outcome = verifier.generate(&instruction, image_uri).await;
        let slot = match kind {
            DocumentKind::UniversityProof => &mut self.proof,
            DocumentKind::IdCard => &mut self.id_card,
        };
        slot.resolve(epoch, outcome);
        slot.is_verified()
    }

    // Ordered submission validation; first failure wins.
    fn validate(&self, role: Role) -> Result<(), &'static str> {
        if self.email.is_empty() || self.password.is_empty() {
            return Err(MSG_MISSING_FIELDS);
        }
        let registering = self.mode == AuthMode::Register;
        if registering && self.password != self.confirm_password {
            return Err(MSG_PASSWORDS_MISMATCH);
        }
        if registering && role == Role::Patient && violates_patient_privacy(&self.email) {
            return Err(MSG_PATIENT_PRIVACY);
        }
        if registering && role.requires_university_proof()
            && (self.proof.uri().is_none() || !self.proof.is_verified())
        {
            return Err(MSG_PROOF_REQUIRED);
        }
        if registering && role.requires_id_card()
            && (self.id_card.uri().is_none() || !self.id_card.is_verified())
        {
            return Err(MSG_ID_CARD_REQUIRED);
        }
        Ok(())
    }

    // Only the fields relevant to the role are carried into registration.
    fn extras_for(&self, role: Role) -> RegistrationExtras {
        let mut extras = RegistrationExtras::default();
        if role.requires_university_proof() {
            extras.university_proof_url = self.proof.uri().map(str::to_string);
            extras.university_proof_verified = Some(self.proof.is_verified());
        }
        if role.requires_id_card() {
            extras.id_card_url = self.id_card.uri().map(str::to_string);
            extras.id_card_verified = Some(self.id_card.is_verified());
            if role == Role::HospitalDoctor {
                extras.credit_score = Some(0);
            }
        }
        extras
    }

    /// Validate and submit the form to the session store.
    ///
    /// On success returns the role's home destination. Validation failures
    /// and store errors are also mirrored into `error()` for the view layer;
    /// no session mutation happens on any failure path.
    pub async fn submit(&mut self, store: &SessionStore) -> AppResult<Destination> {
        if self.submitting {
            return Err(AppError::auth("submit_in_flight", "a submission is already in progress"));
        }
        self.error = None;
        let Some(role) = self.selected_role else {
            return Err(AppError::validation("no_role", "no role selected"));
        };
        if !matches!(self.mode, AuthMode::Login | AuthMode::Register) {
            return Err(AppError::validation("bad_mode", "not on the credential form"));
        }
        if let Err(msg) = self.validate(role) {
            self.error = Some(msg.to_string());
            return Err(AppError::validation("invalid_submission", msg));
        }

        self.submitting = true;
        let result = match self.mode {
            AuthMode::Login => store.login(&self.email, &self.password, role).await,
            AuthMode::Register => {
                store.register(&self.email, &self.password, role, self.extras_for(role)).await
            }
            _ => unreachable!("validated above"),
        };
        self.submitting = false;

        match result {
            Ok(rec) => {
                info!(target: "mediconnect::flow", "submit ok: role={:?} id={}", role, rec.id);
                Ok(Destination::home_for(role))
            }
            Err(e) => {
                self.error = Some(MSG_AUTH_FAILED.to_string());
                Err(AppError::auth("auth_failed".to_string(), format!("{MSG_AUTH_FAILED} ({e:#})")))
            }
        }
    }
}

/// Patient privacy heuristic: the email must contain no space, and the local
/// part (before the first `@`, or the whole address without one) must contain
/// no uppercase letter.
fn violates_patient_privacy(email: &str) -> bool {
    if email.contains(' ') {
        return true;
    }
    let local = email.split('@').next().unwrap_or(email);
    local.chars().any(|c| c.is_ascii_uppercase())
}
