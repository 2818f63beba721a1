use base64::Engine;
use serde::{Deserialize, Serialize};

/// The closed set of principal roles. A role is chosen once during the auth
/// flow and is immutable for the lifetime of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    HospitalAuthority,
    HospitalDoctor,
    PgStudent,
}

impl Role {
    /// Hospital roles must pass an ID-card check before registration.
    pub fn requires_id_card(&self) -> bool {
        matches!(self, Role::HospitalAuthority | Role::HospitalDoctor)
    }

    /// PG students must pass a university-proof check before registration.
    pub fn requires_university_proof(&self) -> bool {
        matches!(self, Role::PgStudent)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Patient => "Patient",
            Role::HospitalAuthority => "Hospital Authority",
            Role::HospitalDoctor => "Doctor",
            Role::PgStudent => "PG Medical Student",
        }
    }
}

fn gen_id() -> String {
    // 128-bit random identifier, base64url without padding
    let mut buf = [0u8; 16];
    let _ = getrandom::getrandom(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

/// The persisted representation of the currently authenticated principal.
///
/// Field names serialize in camelCase so the stored JSON matches the payload
/// shape the mobile clients already persist under the `"user"` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub role: Role,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hospital_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    /// Role-specific onboarding requirements satisfied. True for every role
    /// except PG students, whose records await downstream approval.
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub university_proof_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub university_proof_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_card_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_card_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_score: Option<i64>,
    /// Creation time in epoch milliseconds.
    #[serde(default)]
    pub created_at: i64,
}

impl UserRecord {
    /// Synthesize a fresh record for the given email/role with role defaults:
    /// hospital roles get a placeholder hospital name, doctors start at credit
    /// score zero, and only PG students start unverified.
    pub fn synthesize(email: &str, role: Role) -> Self {
        let mut rec = Self {
            id: gen_id(),
            role,
            email: email.to_string(),
            name: None,
            hospital_name: None,
            student_id: None,
            verified: role != Role::PgStudent,
            university_proof_url: None,
            university_proof_verified: None,
            id_card_url: None,
            id_card_verified: None,
            credit_score: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        };
        if role.requires_id_card() {
            rec.hospital_name = Some("Sample Hospital".to_string());
        }
        if role == Role::HospitalDoctor {
            rec.credit_score = Some(0);
        }
        rec
    }

    /// Merge caller-supplied registration extras into a fresh record.
    pub fn with_extras(mut self, extras: RegistrationExtras) -> Self {
        if extras.university_proof_url.is_some() { self.university_proof_url = extras.university_proof_url; }
        if extras.university_proof_verified.is_some() { self.university_proof_verified = extras.university_proof_verified; }
        if extras.id_card_url.is_some() { self.id_card_url = extras.id_card_url; }
        if extras.id_card_verified.is_some() { self.id_card_verified = extras.id_card_verified; }
        if extras.credit_score.is_some() { self.credit_score = extras.credit_score; }
        self
    }

    /// Merge a partial update into this record. Identifier and role are never
    /// touched; only `Some` fields are applied.
    pub fn apply(&mut self, update: &UserUpdate) {
        if let Some(v) = &update.email { self.email = v.clone(); }
        if let Some(v) = &update.name { self.name = Some(v.clone()); }
        if let Some(v) = &update.hospital_name { self.hospital_name = Some(v.clone()); }
        if let Some(v) = &update.student_id { self.student_id = Some(v.clone()); }
        if let Some(v) = update.verified { self.verified = v; }
        if let Some(v) = &update.university_proof_url { self.university_proof_url = Some(v.clone()); }
        if let Some(v) = update.university_proof_verified { self.university_proof_verified = Some(v); }
        if let Some(v) = &update.id_card_url { self.id_card_url = Some(v.clone()); }
        if let Some(v) = update.id_card_verified { self.id_card_verified = Some(v); }
        if let Some(v) = update.credit_score { self.credit_score = Some(v); }
    }
}

/// Partial update for `UserRecord`. Deliberately omits `id` and `role`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hospital_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub university_proof_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub university_proof_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_card_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_card_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_score: Option<i64>,
}

/// Extra fields carried from the registration flow into record creation:
/// verification results and document references, plus the doctor's initial
/// credit score.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationExtras {
    pub university_proof_url: Option<String>,
    pub university_proof_verified: Option<bool>,
    pub id_card_url: Option<String>,
    pub id_card_verified: Option<bool>,
    pub credit_score: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_per_role() {
        let p = UserRecord::synthesize("anon@example.com", Role::Patient);
        assert!(p.verified);
        assert!(p.hospital_name.is_none());
        assert!(p.credit_score.is_none());

        let a = UserRecord::synthesize("a@h.org", Role::HospitalAuthority);
        assert!(a.verified);
        assert_eq!(a.hospital_name.as_deref(), Some("Sample Hospital"));
        assert!(a.credit_score.is_none());

        let d = UserRecord::synthesize("d@h.org", Role::HospitalDoctor);
        assert!(d.verified);
        assert_eq!(d.hospital_name.as_deref(), Some("Sample Hospital"));
        assert_eq!(d.credit_score, Some(0));

        let s = UserRecord::synthesize("s@uni.edu", Role::PgStudent);
        assert!(!s.verified);
    }

    #[test]
    fn ids_are_unique() {
        let a = UserRecord::synthesize("x@example.com", Role::Patient);
        let b = UserRecord::synthesize("x@example.com", Role::Patient);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn apply_never_touches_id_or_role() {
        let mut rec = UserRecord::synthesize("d@h.org", Role::HospitalDoctor);
        let id = rec.id.clone();
        rec.apply(&UserUpdate { credit_score: Some(42), ..Default::default() });
        assert_eq!(rec.credit_score, Some(42));
        assert_eq!(rec.id, id);
        assert_eq!(rec.role, Role::HospitalDoctor);
    }

    #[test]
    fn empty_update_is_a_no_op() {
        let mut rec = UserRecord::synthesize("s@uni.edu", Role::PgStudent);
        let before = rec.clone();
        rec.apply(&UserUpdate::default());
        assert_eq!(rec, before);
    }

    #[test]
    fn record_serializes_in_camel_case() {
        let rec = UserRecord::synthesize("d@h.org", Role::HospitalDoctor);
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["role"], "hospital_doctor");
        assert_eq!(v["creditScore"], 0);
        assert_eq!(v["hospitalName"], "Sample Hospital");
        // Absent optionals are omitted entirely
        assert!(v.get("universityProofUrl").is_none());
    }
}
