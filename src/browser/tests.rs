use std::sync::Arc;
use std::time::Duration;

use crate::browser::fake::{EventLog, FakeElement, FakePage, FakeSession, FakeSessionFactory, FakeSite};
use crate::browser::{BrowserSession, SessionFactory, TabHandle, UserAgentGenerator};
use crate::error::ScrapeError;
use crate::sources::Locator;

fn site() -> FakeSite {
    FakeSite::new()
        .page(
            "https://news.example.com/",
            FakePage::new()
                .with("//h3/a", FakeElement::link("First story", "https://news.example.com/a/1"))
                .with("//h3/a", FakeElement::link("Second story", "https://news.example.com/a/2"))
                .with("//nav/a", FakeElement::link("World", "https://news.example.com/world").in_new_tab()),
        )
        .page(
            "https://news.example.com/a/1",
            FakePage::new().with("//article", FakeElement::body(&["Paragraph one.", "Paragraph two."])),
        )
}

fn session() -> FakeSession {
    FakeSession::new(Arc::new(site()), EventLog::default())
}

#[tokio::test]
async fn test_user_agent_generation() {
    let generator = UserAgentGenerator::new();
    let user_agent = generator.random_user_agent();

    assert!(!user_agent.is_empty(), "User agent should not be empty");
    assert!(user_agent.contains("Mozilla"), "User agent should contain Mozilla");
}

#[test]
fn test_user_agent_custom_pool() {
    let generator = UserAgentGenerator::with_agents(vec!["TestAgent/1.0".to_string()]);
    assert_eq!(generator.random_user_agent(), "TestAgent/1.0");

    // an empty pool falls back to the built-in agents
    let generator = UserAgentGenerator::with_agents(Vec::new());
    assert!(generator.random_user_agent().contains("Mozilla"));
}

#[tokio::test]
async fn test_wait_for_all_and_nth() {
    let mut session = session();
    session.navigate("https://news.example.com/").await.unwrap();

    let items = session
        .wait_for_all(&Locator::new("//h3/a"), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].href.as_deref(), Some("https://news.example.com/a/2"));

    let second = session
        .wait_for(&Locator::new("//h3/a").nth(1), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(second.text, "Second story");
}

#[tokio::test]
async fn test_missing_locator_times_out() {
    let mut session = session();
    session.navigate("https://news.example.com/").await.unwrap();

    let err = session
        .wait_for(&Locator::new("//div[@id='missing']"), Duration::from_secs(3))
        .await
        .unwrap_err();
    assert!(matches!(err, ScrapeError::LocatorTimeout { .. }));
    assert!(session.find(&Locator::new("//div[@id='missing']")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_click_and_go_back() {
    let mut session = session();
    session.navigate("https://news.example.com/").await.unwrap();
    session.click(&Locator::new("//h3/a").nth(0)).await.unwrap();
    assert_eq!(session.current_url().await.unwrap(), "https://news.example.com/a/1");

    let html = session
        .outer_html(&Locator::new("//article"), Duration::from_secs(1))
        .await
        .unwrap();
    assert!(html.contains("<p>Paragraph one.</p>"));

    session.go_back().await.unwrap();
    assert_eq!(session.current_url().await.unwrap(), "https://news.example.com/");
}

#[tokio::test]
async fn test_tab_lifecycle() {
    let mut session = session();
    let original = session.current_tab().await.unwrap();

    let tab = session.open_new_tab().await.unwrap();
    assert_ne!(tab, original);
    // opening does not steal focus
    assert_eq!(session.current_tab().await.unwrap(), original);

    session.switch_tab(&tab).await.unwrap();
    session.navigate("https://news.example.com/a/1").await.unwrap();
    session.close_current_tab().await.unwrap();

    assert_eq!(session.tabs().await.unwrap(), vec![original.clone()]);
    assert_eq!(session.current_tab().await.unwrap(), original);
    assert!(session.switch_tab(&TabHandle("tab-99".to_string())).await.is_err());
}

#[tokio::test]
async fn test_page_opened_tab_is_listed() {
    let mut session = session();
    session.navigate("https://news.example.com/").await.unwrap();
    session.click(&Locator::new("//nav/a")).await.unwrap();

    let tabs = session.tabs().await.unwrap();
    assert_eq!(tabs.len(), 2);
    session.switch_tab(&tabs[1]).await.unwrap();
    assert_eq!(session.current_url().await.unwrap(), "https://news.example.com/world");
}

#[tokio::test]
async fn test_closed_session_faults() {
    let mut session = session();
    session.close().await.unwrap();
    // closing twice is harmless
    session.close().await.unwrap();

    let err = session.navigate("https://news.example.com/").await.unwrap_err();
    assert!(err.is_session_fault());
}

#[tokio::test]
async fn test_factory_counts_sessions() {
    let factory = FakeSessionFactory::new(site().session_fault_at("https://news.example.com/crash"));
    let mut first = factory.open().await.unwrap();
    let _second = factory.open().await.unwrap();
    assert_eq!(factory.opened(), 2);

    let err = first.navigate("https://news.example.com/crash").await.unwrap_err();
    assert!(err.is_session_fault());
    assert_eq!(factory.log().count("open"), 2);
}
