//! Session store integration tests: role defaults, persistence round-trips
//! and the partial-update contract, all against a real temp directory.

use anyhow::Result;
use tempfile::tempdir;

use mediconnect_auth::identity::{RegistrationExtras, Role, SessionStore, UserUpdate, SESSION_KEY};
use mediconnect_auth::storage::SessionStorage;

fn store_at(path: &std::path::Path) -> SessionStore {
    SessionStore::new(SessionStorage::new(path).expect("storage root"))
}

#[tokio::test]
async fn loading_flag_clears_after_first_load() -> Result<()> {
    let tmp = tempdir()?;
    let store = store_at(tmp.path());
    assert!(store.loading());
    store.load().await;
    assert!(!store.loading());
    assert!(store.current().is_none());
    Ok(())
}

#[tokio::test]
async fn login_applies_role_defaults() -> Result<()> {
    let tmp = tempdir()?;
    let store = store_at(tmp.path());

    let patient = store.login("anon@example.com", "pw", Role::Patient).await?;
    assert!(patient.verified);
    assert!(patient.hospital_name.is_none());
    assert!(patient.credit_score.is_none());

    let authority = store.login("a@h.org", "pw", Role::HospitalAuthority).await?;
    assert!(authority.verified);
    assert_eq!(authority.hospital_name.as_deref(), Some("Sample Hospital"));

    let doctor = store.login("d@h.org", "pw", Role::HospitalDoctor).await?;
    assert!(doctor.verified);
    assert_eq!(doctor.credit_score, Some(0));

    let student = store.login("s@uni.edu", "pw", Role::PgStudent).await?;
    assert!(!student.verified, "pg_student records start unverified");
    Ok(())
}

#[tokio::test]
async fn any_password_is_accepted_on_login() -> Result<()> {
    // No credential store exists: login synthesizes a fresh record for any
    // email/password pair. Preserved behavior, not a bug.
    let tmp = tempdir()?;
    let store = store_at(tmp.path());
    assert!(store.login("anon@example.com", "", Role::Patient).await.is_ok());
    assert!(store.login("anon@example.com", "anything", Role::Patient).await.is_ok());
    Ok(())
}

#[tokio::test]
async fn session_round_trips_across_restart() -> Result<()> {
    let tmp = tempdir()?;
    let created = {
        let store = store_at(tmp.path());
        store
            .register(
                "s@uni.edu",
                "pw",
                Role::PgStudent,
                RegistrationExtras {
                    university_proof_url: Some("file:///proof.png".into()),
                    university_proof_verified: Some(true),
                    ..Default::default()
                },
            )
            .await?
    };

    // Fresh store over the same directory simulates an app restart.
    let reborn = store_at(tmp.path());
    reborn.load().await;
    let restored = reborn.current().expect("session should survive restart");
    assert_eq!(restored, created);
    Ok(())
}

#[tokio::test]
async fn logout_then_reload_yields_no_session() -> Result<()> {
    let tmp = tempdir()?;
    let store = store_at(tmp.path());
    store.login("anon@example.com", "pw", Role::Patient).await?;
    store.logout().await?;
    assert!(store.current().is_none());

    let reborn = store_at(tmp.path());
    reborn.load().await;
    assert!(reborn.current().is_none());
    Ok(())
}

#[tokio::test]
async fn update_merges_without_touching_id_or_role() -> Result<()> {
    let tmp = tempdir()?;
    let store = store_at(tmp.path());
    let doctor = store.login("d@h.org", "pw", Role::HospitalDoctor).await?;

    let updated = store
        .update(UserUpdate { credit_score: Some(42), ..Default::default() })
        .await?
        .expect("session exists");
    assert_eq!(updated.credit_score, Some(42));
    assert_eq!(updated.id, doctor.id);
    assert_eq!(updated.role, Role::HospitalDoctor);

    // The merge is persisted, not just in-memory.
    let reborn = store_at(tmp.path());
    reborn.load().await;
    assert_eq!(reborn.current().unwrap().credit_score, Some(42));
    Ok(())
}

#[tokio::test]
async fn empty_update_is_idempotent() -> Result<()> {
    let tmp = tempdir()?;
    let store = store_at(tmp.path());
    let before = store.login("anon@example.com", "pw", Role::Patient).await?;
    let after = store.update(UserUpdate::default()).await?.expect("session exists");
    assert_eq!(after, before);
    Ok(())
}

#[tokio::test]
async fn update_without_session_is_a_no_op() -> Result<()> {
    let tmp = tempdir()?;
    let store = store_at(tmp.path());
    let out = store.update(UserUpdate { credit_score: Some(1), ..Default::default() }).await?;
    assert!(out.is_none());
    assert!(store.current().is_none());
    Ok(())
}

#[tokio::test]
async fn write_failure_preserves_previous_session() -> Result<()> {
    let tmp = tempdir()?;
    let root = tmp.path().join("sessions");
    let store = store_at(&root);
    let first = store.login("anon@example.com", "pw", Role::Patient).await?;

    // Replace the storage root with a plain file so the next write fails.
    std::fs::remove_dir_all(&root)?;
    std::fs::write(&root, b"not a directory")?;

    let err = store.login("other@example.com", "pw", Role::Patient).await;
    assert!(err.is_err(), "login must surface the persistence failure");
    // Persist-before-publish: the previous record is still current.
    assert_eq!(store.current(), Some(first));
    Ok(())
}

#[tokio::test]
async fn corrupt_persisted_session_loads_as_no_session() -> Result<()> {
    let tmp = tempdir()?;
    std::fs::write(tmp.path().join(format!("{SESSION_KEY}.json")), b"{broken")?;
    let store = store_at(tmp.path());
    store.load().await;
    assert!(store.current().is_none());
    assert!(!store.loading());
    Ok(())
}
