//! Fixed role → destination routing table consumed after login/registration.

use crate::identity::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    PatientHome,
    HospitalHome,
    DoctorHome,
    StudentHome,
    /// Unauthenticated entry point, requested on logout.
    RoleSelect,
}

impl Destination {
    pub fn home_for(role: Role) -> Destination {
        match role {
            Role::Patient => Destination::PatientHome,
            Role::HospitalAuthority => Destination::HospitalHome,
            Role::HospitalDoctor => Destination::DoctorHome,
            Role::PgStudent => Destination::StudentHome,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Destination::PatientHome => "/(patient)/home",
            Destination::HospitalHome => "/(hospital)/home",
            Destination::DoctorHome => "/(doctor)/home",
            Destination::StudentHome => "/(student)/home",
            Destination::RoleSelect => "/auth",
        }
    }
}
