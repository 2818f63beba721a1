//!
//! mediconnect-auth demo binary
//! ----------------------------
//! Interactive console walk-through of the registration/authentication flow
//! against a local data directory. Document verification uses the external
//! endpoint when MEDICONNECT_VERIFY_URL is set; otherwise uploads are judged
//! by a local stand-in that always verifies, so the flow can be exercised
//! offline.

use std::io::{self, Write};

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use mediconnect_auth::flow::{AuthFlow, AuthMode, HospitalKind};
use mediconnect_auth::identity::{Role, SessionStore};
use mediconnect_auth::routing::Destination;
use mediconnect_auth::storage::SessionStorage;
use mediconnect_auth::verify::{DocumentKind, DocumentVerifier, GenerateTextClient};

struct AlwaysVerifies;

#[async_trait]
impl DocumentVerifier for AlwaysVerifies {
    async fn generate(&self, _instruction: &str, _image_uri: &str) -> Result<String> {
        Ok("VERIFIED".to_string())
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        anyhow::bail!("stdin closed");
    }
    Ok(line.trim().to_string())
}

fn print_role_menu() {
    println!("MediConnect — select your role:");
    println!("  1) Patient");
    println!("  2) Hospital Staff");
    println!("  3) PG Medical Student");
    println!("  q) quit");
}

async fn upload_if_required(flow: &mut AuthFlow, verifier: &dyn DocumentVerifier) -> Result<()> {
    let Some(role) = flow.selected_role() else { return Ok(()) };
    if flow.mode() != AuthMode::Register {
        return Ok(());
    }
    let kind = if role.requires_university_proof() {
        DocumentKind::UniversityProof
    } else if role.requires_id_card() {
        DocumentKind::IdCard
    } else {
        return Ok(());
    };
    let label = match kind {
        DocumentKind::UniversityProof => "Path to university admission proof image: ",
        DocumentKind::IdCard => "Path to ID card image: ",
    };
    let uri = prompt(label)?;
    if uri.is_empty() {
        println!("no document selected");
        return Ok(());
    }
    println!("Verifying with AI...");
    if flow.submit_document(kind, &uri, verifier).await {
        println!("Document verified");
    } else {
        let slot = match kind {
            DocumentKind::UniversityProof => flow.proof_slot(),
            DocumentKind::IdCard => flow.id_card_slot(),
        };
        println!("Verification failed: {}", slot.reason().unwrap_or("unknown"));
    }
    Ok(())
}

async fn credential_form(
    flow: &mut AuthFlow,
    store: &SessionStore,
    verifier: &dyn DocumentVerifier,
) -> Result<Option<Destination>> {
    let Some(role) = flow.selected_role() else {
        flow.reset();
        return Ok(None);
    };
    loop {
        let verb = if flow.mode() == AuthMode::Login { "Login" } else { "Register" };
        println!("{} as {} ('t' to toggle login/register, 'b' to change role)", verb, role.label());
        let email = prompt("Email: ")?;
        match email.as_str() {
            "t" => {
                flow.toggle_mode();
                continue;
            }
            "b" => {
                flow.reset();
                return Ok(None);
            }
            _ => flow.email = email,
        }
        flow.password = prompt("Password: ")?;
        if flow.mode() == AuthMode::Register {
            flow.confirm_password = prompt("Confirm password: ")?;
        }
        upload_if_required(flow, verifier).await?;
        match flow.submit(store).await {
            Ok(dest) => return Ok(Some(dest)),
            Err(e) => {
                println!("{}", flow.error().unwrap_or(e.message()));
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let data_dir = std::env::var("MEDICONNECT_DATA_DIR").unwrap_or_else(|_| "data".to_string());
    let verify_url = std::env::var("MEDICONNECT_VERIFY_URL").ok();
    let api_key = std::env::var("MEDICONNECT_VERIFY_API_KEY").ok();
    info!(
        target: "mediconnect",
        "mediconnect-auth starting: RUST_LOG='{}', data_dir='{}', verifier={}",
        rust_log,
        data_dir,
        verify_url.as_deref().unwrap_or("<simulated>")
    );

    let storage = SessionStorage::new(&data_dir)?;
    let store = SessionStore::new(storage);
    store.load().await;

    let verifier: Box<dyn DocumentVerifier> = match verify_url {
        Some(url) => Box::new(GenerateTextClient::new(url, api_key)),
        None => Box::new(AlwaysVerifies),
    };

    if let Some(rec) = store.current() {
        println!("Resuming session: {} ({})", rec.email, rec.role.label());
        let answer = prompt("Log out? [y/N] ")?;
        if answer.eq_ignore_ascii_case("y") {
            store.logout().await?;
            println!("Logged out, routing to {}", Destination::RoleSelect.path());
        } else {
            println!("Routing to {}", Destination::home_for(rec.role).path());
            return Ok(());
        }
    }

    let mut flow = AuthFlow::new();
    loop {
        match flow.mode() {
            AuthMode::Select => {
                print_role_menu();
                match prompt("> ")?.as_str() {
                    "1" => flow.select_role(Role::Patient),
                    "2" => flow.choose_hospital_staff(),
                    "3" => flow.select_role(Role::PgStudent),
                    "q" | "quit" | "exit" => break,
                    other => println!("unknown choice '{other}'"),
                }
            }
            AuthMode::HospitalSelect => {
                println!("Hospital staff — choose your position:");
                println!("  1) Hospital Authority");
                println!("  2) Doctor");
                println!("  b) back");
                match prompt("> ")?.as_str() {
                    "1" => flow.select_hospital_kind(HospitalKind::Authority),
                    "2" => flow.select_hospital_kind(HospitalKind::Doctor),
                    "b" => flow.reset(),
                    other => println!("unknown choice '{other}'"),
                }
            }
            AuthMode::Login | AuthMode::Register => {
                if let Some(dest) = credential_form(&mut flow, &store, verifier.as_ref()).await? {
                    println!("Welcome! Routing to {}", dest.path());
                    break;
                }
            }
        }
    }
    Ok(())
}
