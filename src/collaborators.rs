//! Document rendering and mail delivery seams
//!
//! The engine only assembles data bags; layout, PDF conversion and mail
//! transport live behind these traits.

use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};
use crate::store::RecordId;

/// Documents the engine asks to have rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentTemplate {
    Forecast,
    Repayment,
    Reminder,
}

impl DocumentTemplate {
    pub fn id(&self) -> &'static str {
        match self {
            DocumentTemplate::Forecast => "forecast",
            DocumentTemplate::Repayment => "repayment",
            DocumentTemplate::Reminder => "reminder",
        }
    }
}

/// Mails the engine sends to customers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MailKind {
    ForecastDelivery,
    RepaymentNotice,
    PaymentReminder,
}

pub trait DocumentRenderer {
    /// Render a template with the given data bag into HTML bytes
    fn render(&mut self, template: DocumentTemplate, data: &serde_json::Value) -> Result<Vec<u8>>;

    /// Convert rendered HTML into the final document, returning its location
    fn to_pdf(&mut self, document_name: &str, html: &[u8]) -> Result<PathBuf>;
}

pub trait Notifier {
    /// Send a mail; `false` means the mail was not accepted
    fn send_mail(&mut self, recipient_user_id: RecordId, kind: MailKind, payload: &serde_json::Value) -> bool;
}

/// Render and convert in one step
pub fn produce_document<R: DocumentRenderer + ?Sized>(
    renderer: &mut R,
    template: DocumentTemplate,
    data: &serde_json::Value,
    document_name: &str,
) -> Result<PathBuf> {
    let html = renderer.render(template, data)?;
    renderer.to_pdf(document_name, &html)
}

/// Send a mail, turning a refusal into a `DownstreamFailure`
pub fn notify<N: Notifier + ?Sized>(
    notifier: &mut N,
    recipient_user_id: RecordId,
    kind: MailKind,
    payload: &serde_json::Value,
) -> Result<()> {
    if notifier.send_mail(recipient_user_id, kind, payload) {
        Ok(())
    } else {
        Err(EngineError::downstream(
            "notification",
            format!("{:?} to user {} was not accepted", kind, recipient_user_id),
        ))
    }
}

/// Dry-run renderer: writes each data bag as pretty JSON into a directory
#[derive(Debug, Clone)]
pub struct JsonDocumentWriter {
    out_dir: PathBuf,
}

impl JsonDocumentWriter {
    pub fn new<P: AsRef<Path>>(out_dir: P) -> Result<Self> {
        std::fs::create_dir_all(out_dir.as_ref())?;
        Ok(Self {
            out_dir: out_dir.as_ref().to_path_buf(),
        })
    }
}

impl DocumentRenderer for JsonDocumentWriter {
    fn render(&mut self, template: DocumentTemplate, data: &serde_json::Value) -> Result<Vec<u8>> {
        let document = serde_json::json!({
            "template": template.id(),
            "data": data,
        });
        Ok(serde_json::to_vec_pretty(&document)?)
    }

    fn to_pdf(&mut self, document_name: &str, html: &[u8]) -> Result<PathBuf> {
        let path = self.out_dir.join(format!("{}.json", document_name));
        std::fs::write(&path, html)
            .map_err(|e| EngineError::downstream("document", format!("{}: {}", path.display(), e)))?;
        Ok(path)
    }
}

/// Notifier that only logs; every mail counts as sent
#[derive(Debug, Clone, Default)]
pub struct LoggingNotifier {
    pub sent: usize,
}

impl Notifier for LoggingNotifier {
    fn send_mail(&mut self, recipient_user_id: RecordId, kind: MailKind, payload: &serde_json::Value) -> bool {
        self.sent += 1;
        info!("Mail {:?} to user {}: {}", kind, recipient_user_id, payload);
        true
    }
}
