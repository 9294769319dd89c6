//! Send orchestration.
//!
//! `prepare` does everything that needs no network: resolve sender and
//! receiver, build the context, pick and render the body, settle the
//! subject and compose the MIME message.  `deliver` hands the result to
//! the [`DeliveryEngine`].

use std::path::{Path, PathBuf};

use crate::config::{AppConfig, Directory, Receiver, SenderProfile};
use crate::errors::{RmailError, Result};
use crate::template::{
    markdown_to_html, ContextBuilder, Prompter, RenderContext, TemplateRenderer, TemplateResolver,
};

use super::composer::{mailbox, ComposedMessage, MessageComposer};
use super::delivery::{CredentialSource, DeliveryEngine, DeliveryReport, SmtpConnector};

/// Everything the user asked for on one `send`.
#[derive(Debug, Clone, Default)]
pub struct SendRequest {
    pub sender: String,
    pub receiver: String,
    pub subject: Option<String>,
    /// Raw HTML; bypasses templates.
    pub body: Option<String>,
    pub template: Option<String>,
    /// Loaded into `message_body`.
    pub message_file: Option<PathBuf>,
    /// `key=value` overrides.
    pub overrides: Vec<String>,
    pub context_profile: Option<String>,
    pub attachments: Vec<PathBuf>,
    /// Body piped on stdin, already read by the caller.
    pub stdin_body: Option<String>,
}

/// Where the HTML body came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodySource {
    Inline,
    Template(String),
    Stdin,
}

/// A fully composed message and the facts that produced it.
#[derive(Debug)]
pub struct PreparedSend {
    pub sender: SenderProfile,
    pub receiver: Receiver,
    pub subject: String,
    pub html: String,
    pub source: BodySource,
    pub context: RenderContext,
    pub composed: ComposedMessage,
}

/// Prepares and delivers sends against one configuration.
pub struct SendPipeline<'a> {
    directory: &'a Directory,
    resolver: TemplateResolver,
    renderer: TemplateRenderer,
    composer: MessageComposer,
}

impl<'a> SendPipeline<'a> {
    pub fn new(config: &AppConfig, directory: &'a Directory) -> Self {
        Self {
            directory,
            resolver: TemplateResolver::new(&config.template_dir),
            renderer: TemplateRenderer::new(),
            composer: MessageComposer,
        }
    }

    /// Whether piped stdin would be used as the body: nothing inline, no
    /// `--template`, and no template linked from the context profile.
    pub fn wants_stdin(&self, request: &SendRequest) -> Result<bool> {
        if request.body.is_some() || request.template.is_some() {
            return Ok(false);
        }
        match &request.context_profile {
            Some(name) => Ok(self.directory.context_profile(name)?.template.is_none()),
            None => Ok(true),
        }
    }

    /// Run every step up to and including composition.
    pub fn prepare(
        &self,
        request: &SendRequest,
        prompter: &mut dyn Prompter,
    ) -> Result<PreparedSend> {
        let sender = self.directory.sender(&request.sender)?;
        let receiver = self.directory.resolve_receiver(&request.receiver)?;

        // Layers 1-4.
        let mut builder = ContextBuilder::new(&receiver.name, &receiver.email);
        let mut profile_template = None;
        if let Some(name) = &request.context_profile {
            let profile = self.directory.context_profile(name)?;
            tracing::info!(context = %name, values = profile.data.len(), "loaded context profile");
            builder = builder.with_profile(&profile.data);
            profile_template = profile.template;
        }
        if let Some(path) = &request.message_file {
            builder = builder.with_message_body(load_message_file(path)?);
        }
        builder = builder.with_overrides(&request.overrides)?;

        let template_name = request.template.clone().or(profile_template);
        let mut subject = request.subject.clone();

        let (html, source, context) = if let Some(body) = &request.body {
            (body.clone(), BodySource::Inline, builder.build())
        } else if let Some(name) = template_name {
            let template = self.resolver.resolve(&name)?;

            // Layer 5.
            let context = builder
                .resolve_declared(&template.metadata.variables, prompter)?
                .build();

            if subject.is_none() {
                if let Some(expr) = &template.metadata.subject {
                    subject = Some(self.renderer.render_subject(&name, expr, &context)?);
                }
            }

            let html = self
                .renderer
                .render(&name, &template.body, template.kind, &context)?;
            (html, BodySource::Template(name), context)
        } else if let Some(piped) = &request.stdin_body {
            (piped.clone(), BodySource::Stdin, builder.build())
        } else {
            return Err(RmailError::MissingBody);
        };

        let subject = subject
            .filter(|s| !s.trim().is_empty())
            .ok_or(RmailError::MissingSubject)?;

        let from = mailbox(&sender.full_name, &sender.email)?;
        let to = mailbox(&receiver.name, &receiver.email)?;
        let composed = self
            .composer
            .compose(&from, &to, &subject, &html, &request.attachments)?;

        Ok(PreparedSend {
            sender,
            receiver,
            subject,
            html,
            source,
            context,
            composed,
        })
    }

    /// Push a prepared message out through `connector`.
    pub fn deliver(
        &self,
        prepared: &PreparedSend,
        connector: &dyn SmtpConnector,
        credentials: &dyn CredentialSource,
    ) -> Result<DeliveryReport> {
        DeliveryEngine::new(connector, credentials).deliver(&prepared.sender, &prepared.composed)
    }
}

/// Read a `-M` file; `.md` files are converted to HTML.
fn load_message_file(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        RmailError::CommandFailed(format!("cannot read message file {}: {e}", path.display()))
    })?;

    let is_markdown = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md"));

    if is_markdown {
        tracing::info!(file = %path.display(), "converted markdown message file");
        Ok(markdown_to_html(&raw))
    } else {
        Ok(raw)
    }
}
