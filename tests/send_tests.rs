//! Integration tests for composing and delivering a message end to end,
//! driven through scripted SMTP sessions instead of a network.

use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use lettre::Message;
use rmail::config::{AppConfig, Directory, SecurityMode, Settings};
use rmail::errors::{Result, RmailError};
use rmail::mail::{
    html_to_text, mailbox, ConfiguredVault, CredentialSource, DeliveryState, Endpoint, MessageComposer,
    SendPipeline, SendRequest, SmtpConnector, SmtpSession,
};
use rmail::template::NonInteractivePrompter;
use tempfile::TempDir;
use zeroize::Zeroizing;

const DIRECTORY: &str = r#"
[domains."example.com"]
smtp_host = "smtp.example.com"
smtp_port = 587
smtp_user = "me@example.com"
security = "STARTTLS"

[domains."relay.lan"]
smtp_host = "relay.lan"
smtp_port = 25
smtp_user = "unused"
security = "NONE"

[senders.me]
full_name = "Me"
email = "me@example.com"
domain = "example.com"

[senders.relay]
full_name = "Relay"
email = "relay@relay.lan"
domain = "relay.lan"

[receivers.bob]
name = "Bob"
email = "bob@x.com"
"#;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Shared log of what the fake server saw.
#[derive(Default)]
struct Wire {
    calls: Vec<String>,
    sent: Vec<Vec<u8>>,
}

struct FakeConnector(Rc<RefCell<Wire>>);
struct FakeSession(Rc<RefCell<Wire>>);

impl SmtpConnector for FakeConnector {
    fn connect(
        &self,
        endpoint: &Endpoint,
        implicit_tls: bool,
    ) -> std::result::Result<Box<dyn SmtpSession>, String> {
        self.0
            .borrow_mut()
            .calls
            .push(format!("connect {endpoint} tls={implicit_tls}"));
        Ok(Box::new(FakeSession(Rc::clone(&self.0))))
    }
}

impl SmtpSession for FakeSession {
    fn starttls(&mut self) -> std::result::Result<(), String> {
        self.0.borrow_mut().calls.push("starttls".into());
        Ok(())
    }

    fn authenticate(&mut self, user: &str, password: &str) -> std::result::Result<(), String> {
        self.0
            .borrow_mut()
            .calls
            .push(format!("auth {user}:{password}"));
        Ok(())
    }

    fn send(&mut self, message: &Message) -> std::result::Result<(), String> {
        let mut wire = self.0.borrow_mut();
        wire.calls.push("send".into());
        wire.sent.push(message.formatted());
        Ok(())
    }

    fn quit(&mut self) -> std::result::Result<(), String> {
        self.0.borrow_mut().calls.push("quit".into());
        Ok(())
    }
}

/// Refuses the TCP connection outright.
struct Unreachable;

impl SmtpConnector for Unreachable {
    fn connect(&self, _: &Endpoint, _: bool) -> std::result::Result<Box<dyn SmtpSession>, String> {
        Err("connection refused".into())
    }
}

/// Counts lookups and hands out one fixed password.
#[derive(Default)]
struct CountingVault {
    queries: RefCell<Vec<(String, String)>>,
}

impl CredentialSource for CountingVault {
    fn lookup(&self, service: &str, account: &str) -> Result<Option<Zeroizing<String>>> {
        self.queries
            .borrow_mut()
            .push((service.to_string(), account.to_string()));
        Ok(Some(Zeroizing::new("s3cret".to_string())))
    }
}

fn setup() -> (TempDir, AppConfig, Directory) {
    let tmp = TempDir::new().unwrap();
    let config = AppConfig::from_settings(tmp.path().to_path_buf(), &Settings::default());
    fs::create_dir_all(&config.template_dir).unwrap();
    (tmp, config, Directory::parse(DIRECTORY).unwrap())
}

fn hello(sender: &str) -> SendRequest {
    SendRequest {
        sender: sender.into(),
        receiver: "bob@x.com".into(),
        subject: Some("Hi".into()),
        body: Some("<p>hello</p>".into()),
        ..SendRequest::default()
    }
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

#[test]
fn plain_part_is_the_stripped_html() {
    let html = "<h1>Welcome</h1><p>Hello <b>Bob</b>,</p><ul><li>one</li><li>two</li></ul>";
    let composed = MessageComposer
        .compose(
            &mailbox("Me", "me@example.com").unwrap(),
            &mailbox("Bob", "bob@x.com").unwrap(),
            "Hi",
            html,
            &[],
        )
        .unwrap();

    assert_eq!(composed.plain_text, html_to_text(html));
    assert!(composed.plain_text.contains("Welcome"));
    assert!(composed.plain_text.contains("Hello Bob,"));
    assert!(!composed.plain_text.contains('<'));

    let wire = String::from_utf8(composed.formatted()).unwrap();
    assert!(wire.contains("multipart/mixed"));
    assert!(wire.contains("multipart/alternative"));
    assert!(wire.contains("text/plain"));
    assert!(wire.contains("text/html"));
}

#[test]
fn attachments_are_listed_and_missing_ones_fail() {
    let tmp = TempDir::new().unwrap();
    let report = tmp.path().join("report.pdf");
    fs::write(&report, b"%PDF-1.4 fake").unwrap();

    let from = mailbox("Me", "me@example.com").unwrap();
    let to = mailbox("", "bob@x.com").unwrap();

    let composed = MessageComposer
        .compose(&from, &to, "Report", "<p>see attached</p>", &[report.clone()])
        .unwrap();
    assert_eq!(composed.attachments.len(), 1);
    assert_eq!(composed.attachments[0].file_name, "report.pdf");
    assert_eq!(composed.attachments[0].size, 13);
    let wire = String::from_utf8_lossy(&composed.formatted()).into_owned();
    assert!(wire.contains("report.pdf"));

    let missing = tmp.path().join("nope.bin");
    let err = MessageComposer
        .compose(&from, &to, "Report", "<p>x</p>", &[report, missing])
        .unwrap_err();
    assert!(matches!(err, RmailError::AttachmentUnreadable { .. }));
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

#[test]
fn starttls_send_walks_every_state_and_queries_vault_once() {
    let (_tmp, config, directory) = setup();
    let pipeline = SendPipeline::new(&config, &directory);

    let prepared = pipeline
        .prepare(&hello("me"), &mut NonInteractivePrompter)
        .unwrap();

    let wire = Rc::new(RefCell::new(Wire::default()));
    let connector = FakeConnector(Rc::clone(&wire));
    let vault = CountingVault::default();

    let report = pipeline.deliver(&prepared, &connector, &vault).unwrap();

    assert_eq!(
        report.transitions,
        [
            DeliveryState::Idle,
            DeliveryState::Connected,
            DeliveryState::Secured,
            DeliveryState::Authenticated,
            DeliveryState::Sent,
            DeliveryState::Closed,
        ]
    );
    assert_eq!(report.endpoint, Endpoint::new("smtp.example.com", 587));
    assert_eq!(report.security, SecurityMode::Starttls);
    assert_eq!(report.authenticated_as.as_deref(), Some("me@example.com"));

    assert_eq!(
        *vault.queries.borrow(),
        [("example.com".to_string(), "me@example.com".to_string())]
    );

    let wire = wire.borrow();
    assert_eq!(
        wire.calls,
        [
            "connect smtp.example.com:587 tls=false",
            "starttls",
            "auth me@example.com:s3cret",
            "send",
            "quit",
        ]
    );
    let sent = String::from_utf8_lossy(&wire.sent[0]).into_owned();
    assert!(sent.contains("Subject: Hi"));
    assert!(sent.contains("bob@x.com"));
}

#[test]
fn none_mode_never_consults_the_vault() {
    let (_tmp, config, directory) = setup();
    let pipeline = SendPipeline::new(&config, &directory);
    let prepared = pipeline
        .prepare(&hello("relay"), &mut NonInteractivePrompter)
        .unwrap();

    let wire = Rc::new(RefCell::new(Wire::default()));
    let vault = CountingVault::default();
    let report = pipeline
        .deliver(&prepared, &FakeConnector(Rc::clone(&wire)), &vault)
        .unwrap();

    assert!(vault.queries.borrow().is_empty());
    assert_eq!(report.authenticated_as, None);
    assert_eq!(
        report.transitions,
        [
            DeliveryState::Idle,
            DeliveryState::Connected,
            DeliveryState::Sent,
            DeliveryState::Closed,
        ]
    );
    assert!(!wire.borrow().calls.iter().any(|c| c.starts_with("auth")));
    assert!(!wire.borrow().calls.iter().any(|c| c == "starttls"));
}

#[test]
fn unreachable_server_is_a_transport_error() {
    let (_tmp, config, directory) = setup();
    let pipeline = SendPipeline::new(&config, &directory);
    let prepared = pipeline
        .prepare(&hello("me"), &mut NonInteractivePrompter)
        .unwrap();

    let vault = CountingVault::default();
    let err = pipeline.deliver(&prepared, &Unreachable, &vault).unwrap_err();

    assert!(matches!(err, RmailError::TransportError { ref endpoint, .. } if endpoint == "smtp.example.com:587"));
    assert_eq!(err.stage(), "connect");
    assert!(vault.queries.borrow().is_empty());
}

#[test]
fn starttls_without_master_key_stops_before_sending() {
    let (_tmp, mut config, directory) = setup();
    config.master_key_env = "RMAIL_SEND_TESTS_KEY_NEVER_SET".into();
    let pipeline = SendPipeline::new(&config, &directory);
    let prepared = pipeline
        .prepare(&hello("me"), &mut NonInteractivePrompter)
        .unwrap();

    let wire = Rc::new(RefCell::new(Wire::default()));
    let err = pipeline
        .deliver(
            &prepared,
            &FakeConnector(Rc::clone(&wire)),
            &ConfiguredVault::new(&config),
        )
        .unwrap_err();

    assert!(matches!(err, RmailError::MissingMasterKey(ref var) if var == "RMAIL_SEND_TESTS_KEY_NEVER_SET"));
    assert_eq!(err.stage(), "config");
    let wire = wire.borrow();
    assert!(!wire.calls.iter().any(|c| c == "send" || c.starts_with("auth")));
    assert!(wire.sent.is_empty());
}

#[test]
fn receiver_alias_supplies_display_name() {
    let (_tmp, config, directory) = setup();
    let request = SendRequest {
        receiver: "bob".into(),
        ..hello("me")
    };
    let prepared = SendPipeline::new(&config, &directory)
        .prepare(&request, &mut NonInteractivePrompter)
        .unwrap();

    assert_eq!(prepared.receiver.name, "Bob");
    assert_eq!(prepared.context.get("name"), Some("Bob"));
    let wire = String::from_utf8(prepared.composed.formatted()).unwrap();
    assert!(wire.contains("Bob"));
}

#[test]
fn unknown_sender_fails_before_anything_is_composed() {
    let (_tmp, config, directory) = setup();
    let err = SendPipeline::new(&config, &directory)
        .prepare(&hello("ghost"), &mut NonInteractivePrompter)
        .unwrap_err();
    assert!(matches!(err, RmailError::SenderNotFound(ref a) if a == "ghost"));
}
