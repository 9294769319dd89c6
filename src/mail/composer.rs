//! MIME message composition.
//!
//! Every message has the same shape:
//!
//! ```text
//! multipart/mixed
//! ├── multipart/alternative
//! │   ├── text/plain   (extracted from the HTML)
//! │   └── text/html
//! └── application/octet-stream  (one per attachment)
//! ```
//!
//! Attachments are read in full before the message is built, so an
//! unreadable file fails the send before any connection is opened.

use std::path::{Path, PathBuf};

use lettre::message::header::{ContentDisposition, ContentType};
use lettre::message::{Mailbox, Message, MultiPart, SinglePart};
use lettre::Address;
use scraper::{ElementRef, Html};

use crate::errors::{RmailError, Result};

/// Elements whose boundaries become line breaks in the text part.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "footer",
    "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "ol", "p", "pre", "section",
    "table", "tr", "ul",
];

/// Table cells; each is followed by a tab so adjacent cells stay apart.
const CELL_ELEMENTS: &[&str] = &["td", "th"];

/// Elements whose content never reaches the text part.
const SKIPPED_ELEMENTS: &[&str] = &["head", "script", "style", "template", "title"];

/// An attachment as it went into the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentInfo {
    pub file_name: String,
    pub size: usize,
}

/// A message ready to hand to the delivery engine.
#[derive(Debug, Clone)]
pub struct ComposedMessage {
    pub message: Message,
    pub plain_text: String,
    pub attachments: Vec<AttachmentInfo>,
}

impl ComposedMessage {
    /// The RFC 5322 bytes that go over the wire.
    pub fn formatted(&self) -> Vec<u8> {
        self.message.formatted()
    }
}

/// Builds [`ComposedMessage`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageComposer;

impl MessageComposer {
    pub fn compose(
        &self,
        from: &Mailbox,
        to: &Mailbox,
        subject: &str,
        html_body: &str,
        attachment_paths: &[PathBuf],
    ) -> Result<ComposedMessage> {
        let loaded = attachment_paths
            .iter()
            .map(|path| load_attachment(path))
            .collect::<Result<Vec<_>>>()?;

        let plain_text = html_to_text(html_body);

        let mut body = MultiPart::mixed().multipart(MultiPart::alternative_plain_html(
            plain_text.clone(),
            html_body.to_string(),
        ));

        let octet_stream = ContentType::parse("application/octet-stream")
            .map_err(|e| RmailError::MessageBuild(e.to_string()))?;

        let mut attachments = Vec::with_capacity(loaded.len());
        for (file_name, bytes) in loaded {
            attachments.push(AttachmentInfo {
                file_name: file_name.clone(),
                size: bytes.len(),
            });
            body = body.singlepart(
                SinglePart::builder()
                    .header(octet_stream.clone())
                    .header(ContentDisposition::attachment(&file_name))
                    .body(bytes),
            );
        }

        let message = Message::builder()
            .from(from.clone())
            .to(to.clone())
            .subject(subject)
            .multipart(body)
            .map_err(|e| RmailError::MessageBuild(e.to_string()))?;

        tracing::debug!(
            to = %to.email,
            attachments = attachments.len(),
            html_bytes = html_body.len(),
            "message composed"
        );

        Ok(ComposedMessage {
            message,
            plain_text,
            attachments,
        })
    }
}

/// Build a mailbox from a display name (may be empty) and an address.
pub fn mailbox(name: &str, email: &str) -> Result<Mailbox> {
    let address: Address = email
        .trim()
        .parse()
        .map_err(|_| RmailError::InvalidAddress(email.to_string()))?;
    let name = name.trim();
    Ok(Mailbox::new(
        (!name.is_empty()).then(|| name.to_string()),
        address,
    ))
}

fn load_attachment(path: &Path) -> Result<(String, Vec<u8>)> {
    let unreadable = |source| RmailError::AttachmentUnreadable {
        path: path.to_path_buf(),
        source,
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            unreadable(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "path has no file name",
            ))
        })?;

    let bytes = std::fs::read(path).map_err(unreadable)?;
    Ok((file_name, bytes))
}

/// Strip markup from `html`, keeping line breaks at block boundaries.
///
/// Text is taken verbatim (entities decoded); consecutive blank lines
/// are collapsed and the result is trimmed.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::with_capacity(html.len());
    collect_text(document.root_element(), &mut raw);

    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0;
    for line in raw.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    let tag = element.value().name();
    if SKIPPED_ELEMENTS.contains(&tag) {
        return;
    }

    let block = BLOCK_ELEMENTS.contains(&tag);
    if block {
        break_line(out);
    }

    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            collect_text(child_element, out);
        }
    }

    if CELL_ELEMENTS.contains(&tag) {
        out.push('\t');
    }
    if block {
        break_line(out);
    }
}

fn break_line(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn addrs() -> (Mailbox, Mailbox) {
        (
            mailbox("Me Myself", "me@example.com").unwrap(),
            mailbox("", "bob@x.com").unwrap(),
        )
    }

    #[test]
    fn text_of_paragraph() {
        assert_eq!(html_to_text("<p>hello</p>"), "hello");
    }

    #[test]
    fn inline_markup_is_stripped_in_place() {
        let html = "<p>Hello <b>Bob</b>, see <a href=\"https://x\">this</a> &amp; that.</p>";
        assert_eq!(html_to_text(html), "Hello Bob, see this & that.");
    }

    #[test]
    fn blocks_become_lines() {
        let html = "<h1>Title</h1><p>One</p><ul><li>a</li><li>b</li></ul>Tail<br>end";
        assert_eq!(html_to_text(html), "Title\nOne\na\nb\nTail\nend");
    }

    #[test]
    fn table_cells_stay_apart() {
        let html = "<table><tr><th>Name:</th><td>Bob</td></tr><tr><td>Role</td><td>Ops</td></tr></table>";
        assert_eq!(html_to_text(html), "Name:\tBob\nRole\tOps");
    }

    #[test]
    fn scripts_and_styles_are_dropped() {
        let html = "<style>p{color:red}</style><p>shown</p><script>alert(1)</script>";
        assert_eq!(html_to_text(html), "shown");
    }

    #[test]
    fn mailbox_rejects_bad_address() {
        assert!(matches!(
            mailbox("x", "not an address"),
            Err(RmailError::InvalidAddress(_))
        ));
        assert!(mailbox("", "bob@x.com").unwrap().name.is_none());
    }

    #[test]
    fn compose_has_alternative_and_attachment() {
        let dir = TempDir::new().unwrap();
        let report = dir.path().join("report.pdf");
        fs::write(&report, b"%PDF-1.4 fake").unwrap();

        let (from, to) = addrs();
        let composed = MessageComposer
            .compose(&from, &to, "Hi", "<p>hello</p>", &[report])
            .unwrap();

        assert_eq!(composed.plain_text, "hello");
        assert_eq!(
            composed.attachments,
            [AttachmentInfo {
                file_name: "report.pdf".into(),
                size: 13
            }]
        );

        let wire = String::from_utf8(composed.formatted()).unwrap();
        assert!(wire.contains("multipart/mixed"));
        assert!(wire.contains("multipart/alternative"));
        assert!(wire.contains("text/plain"));
        assert!(wire.contains("text/html"));
        assert!(wire.contains("application/octet-stream"));
        assert!(wire.contains("attachment; filename="));
        assert!(wire.contains("report.pdf"));
        assert!(wire.contains("Subject: Hi"));
        assert!(wire.contains("Me Myself"));
        assert!(wire.contains("<me@example.com>"));
    }

    #[test]
    fn missing_attachment_fails_whole_compose() {
        let dir = TempDir::new().unwrap();
        let (from, to) = addrs();
        let err = MessageComposer
            .compose(&from, &to, "Hi", "<p>x</p>", &[dir.path().join("gone.bin")])
            .unwrap_err();
        assert!(matches!(err, RmailError::AttachmentUnreadable { .. }));
        assert_eq!(err.stage(), "compose");
    }
}
