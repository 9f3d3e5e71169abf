//! Pipeline tests over the stub backend: dry-run isolation and the
//! two-phase login split

mod common;

use std::time::Duration;

use common::StubBackend;
use crm_automation::admin::AdminPage;
use crm_automation::catalog;
use crm_automation::config::Config;
use crm_automation::contacts::ContactsPage;
use crm_automation::driver::{PageDriver, RunMode};
use crm_automation::login::LoginPage;
use crm_automation::panels::PanelsPage;

fn driver(backend: StubBackend, mode: RunMode) -> PageDriver<StubBackend> {
    PageDriver::new(backend, mode, Duration::from_secs(5), "screenshots")
}

#[tokio::test]
async fn dry_run_pipeline_never_reaches_the_backend() {
    let config = Config::default();
    let driver = driver(StubBackend::new(6), RunMode::DryRun);

    let login = LoginPage::new(&driver);
    let admin = AdminPage::new(&driver, &config);
    let panels = PanelsPage::new(&driver, &config);
    let contacts = ContactsPage::new(&driver, &config);

    login.login("user@example.com").await.unwrap();
    admin.access_account("Clinic Example").await.unwrap();
    panels.go_to_panels().await.unwrap();
    panels
        .create_all_panels(&catalog::default_panels())
        .await
        .unwrap();
    contacts.go_to_contacts().await.unwrap();
    contacts.create_tags(&catalog::DEFAULT_TAGS).await.unwrap();

    assert!(
        driver.backend().calls().is_empty(),
        "dry-run leaked backend calls: {:?}",
        driver.backend().calls()
    );
}

#[tokio::test(start_paused = true)]
async fn resumed_phase_two_replays_phase_one_before_the_code() {
    // Phase 1 alone, as the init-auth step runs it.
    let phase1 = driver(StubBackend::new(6), RunMode::Apply);
    LoginPage::new(&phase1)
        .initiate_login("user@example.com")
        .await
        .unwrap();
    let phase1_calls = phase1.backend().calls();
    assert!(!phase1_calls.is_empty());

    // Phase 2 in a fresh driver, as after a session restore: the email is
    // re-submitted (idempotent on the remote side), then the code goes in.
    let phase2 = driver(StubBackend::new(6), RunMode::Apply);
    let login = LoginPage::new(&phase2);
    login.initiate_login("user@example.com").await.unwrap();
    login.submit_otp("123456").await.unwrap();
    let phase2_calls = phase2.backend().calls();

    // The resumed flow replays phase 1 exactly before entering the code.
    assert!(phase2_calls.len() > phase1_calls.len());
    assert_eq!(&phase2_calls[..phase1_calls.len()], &phase1_calls[..]);

    // Each of the six digits lands in its own field, in order.
    let suffix = &phase2_calls[phase1_calls.len()..];
    let typed: Vec<&String> = suffix
        .iter()
        .filter(|c| c.starts_with("type_chars css:input.otp-input"))
        .collect();
    assert_eq!(typed.len(), 6);
    for (i, call) in typed.iter().enumerate() {
        assert!(
            call.contains(&format!("[{i}]")),
            "digit {i} typed out of order: {call}"
        );
        let digit = (i + 1).to_string();
        assert!(call.ends_with(&format!("{digit:?}")), "unexpected digit: {call}");
    }

    // The dedicated OTP submit control is preferred.
    assert!(suffix
        .iter()
        .any(|c| c.starts_with("click css:[data-cy=\"button-sign-in-otp\"] button")));
}

#[tokio::test(start_paused = true)]
async fn single_code_field_receives_the_whole_code() {
    let driver = driver(StubBackend::new(1), RunMode::Apply);
    let login = LoginPage::new(&driver);

    login.submit_otp("123456").await.unwrap();

    let calls = driver.backend().calls();
    assert!(calls
        .iter()
        .any(|c| c.starts_with("fill css:input.otp-input [0] \"123456\"")));
    assert!(!calls.iter().any(|c| c.starts_with("focus")));
}
