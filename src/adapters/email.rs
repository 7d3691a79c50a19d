//! SMTP email sink via `lettre` (STARTTLS, or implicit TLS on port 465).

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::EmailConfig;
use crate::domain::model::DateReport;
use crate::domain::ports::{NotificationSink, SummaryNotice};
use crate::utils::error::{FetcherError, Result};

#[derive(Debug)]
pub struct EmailSink {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl EmailSink {
    pub fn from_config(config: &EmailConfig) -> Result<Self> {
        let from = parse_mailbox("EMAIL_FROM", &config.from)?;
        let to = config
            .to
            .iter()
            .map(|addr| parse_mailbox("EMAIL_TO", addr))
            .collect::<Result<Vec<_>>>()?;
        if to.is_empty() {
            return Err(FetcherError::ConfigError {
                message: "at least one email recipient is required".to_string(),
            });
        }

        let mut builder = if config.smtp_port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        }
        .map_err(|e| FetcherError::ConfigError {
            message: format!("invalid SMTP host {}: {}", config.smtp_host, e),
        })?
        .port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    fn builder(&self) -> lettre::message::MessageBuilder {
        let mut builder = Message::builder().from(self.from.clone());
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }
        builder
    }

    async fn deliver(&self, message: Message) -> Result<()> {
        self.transport
            .send(message)
            .await
            .map_err(|e| self.error(e.to_string()))?;
        tracing::debug!(recipients = self.to.len(), "email delivered");
        Ok(())
    }

    fn error(&self, message: String) -> FetcherError {
        FetcherError::NotificationSinkError {
            sink: self.sink_name().to_string(),
            message,
        }
    }
}

fn parse_mailbox(field: &str, addr: &str) -> Result<Mailbox> {
    addr.parse()
        .map_err(|e: lettre::address::AddressError| FetcherError::InvalidConfigValueError {
            field: field.to_string(),
            value: addr.to_string(),
            reason: e.to_string(),
        })
}

pub fn date_subject(report: &DateReport) -> String {
    format!(
        "Soil moisture {} – {} ({})",
        report.zone, report.date, report.outcome
    )
}

pub fn date_body(report: &DateReport) -> String {
    let mut body = format!(
        "Zone: {}\nDate: {}\nOutcome: {}\n",
        report.zone, report.date, report.outcome
    );
    if let Some(value) = report.value {
        body.push_str(&format!("Mean value: {:.4}\n", value));
    }
    if let Some(label) = &report.label {
        body.push_str(&format!("Class: {}\n", label));
    }
    if let Some(reason) = &report.reason {
        body.push_str(&format!("Reason: {}\n", reason));
    }
    body
}

pub fn summary_body(notice: &SummaryNotice<'_>) -> String {
    let s = notice.summary;
    format!(
        "Soil moisture run for {} from {} to {}.\n\n\
         Inserted: {}\nAlready present: {}\nNo data available: {}\nFailed: {}\n\n\
         The CSV report {} is attached.\n",
        s.zone,
        s.start,
        s.end,
        s.inserted,
        s.already_present,
        s.no_data_available,
        s.failed,
        notice.report_name
    )
}

pub fn summary_html(notice: &SummaryNotice<'_>) -> String {
    let s = notice.summary;
    format!(
        r#"<html>
  <body style="font-family: sans-serif; background-color: #f4f4f4; padding: 20px;">
    <div style="background: white; padding: 20px; border-radius: 10px; max-width: 600px; margin: auto;">
      <h2 style="color: #2e6da4;">Soil moisture report: {zone}</h2>
      <p><strong>Window:</strong> {start} to {end}</p>
      <table>
        <tr><td>Inserted</td><td>{inserted}</td></tr>
        <tr><td>Already present</td><td>{present}</td></tr>
        <tr><td>No data available</td><td>{no_data}</td></tr>
        <tr><td>Failed</td><td>{failed}</td></tr>
      </table>
      <p>The CSV report <code>{report}</code> is attached.</p>
    </div>
  </body>
</html>
"#,
        zone = escape_html(&s.zone),
        start = s.start,
        end = s.end,
        inserted = s.inserted,
        present = s.already_present,
        no_data = s.no_data_available,
        failed = s.failed,
        report = escape_html(notice.report_name),
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl EmailSink {
    /// Plain and HTML bodies as alternatives, with the CSV report attached.
    pub fn summary_message(&self, notice: &SummaryNotice<'_>) -> Result<Message> {
        let s = notice.summary;
        let csv_type =
            ContentType::parse("text/csv").map_err(|e| self.error(e.to_string()))?;
        self.builder()
            .subject(format!(
                "Soil moisture report {} – {} to {}",
                s.zone, s.start, s.end
            ))
            .multipart(
                MultiPart::mixed()
                    .multipart(MultiPart::alternative_plain_html(
                        summary_body(notice),
                        summary_html(notice),
                    ))
                    .singlepart(
                        Attachment::new(notice.report_name.to_string())
                            .body(notice.report_csv.to_vec(), csv_type),
                    ),
            )
            .map_err(|e| self.error(e.to_string()))
    }
}

#[async_trait]
impl NotificationSink for EmailSink {
    async fn send_date(&self, report: &DateReport) -> Result<()> {
        let message = self
            .builder()
            .subject(date_subject(report))
            .header(ContentType::TEXT_PLAIN)
            .body(date_body(report))
            .map_err(|e| self.error(e.to_string()))?;
        self.deliver(message).await
    }

    async fn send_summary(&self, notice: &SummaryNotice<'_>) -> Result<()> {
        let message = self.summary_message(notice)?;
        self.deliver(message).await
    }

    fn sink_name(&self) -> &str {
        "email"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{FailureKind, FailureReason, IngestionOutcome, RunSummary};
    use chrono::NaiveDate;

    fn config() -> EmailConfig {
        EmailConfig {
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
            username: Some("soil".to_string()),
            password: Some("secret".to_string()),
            from: "Soil Monitor <soil@example.com>".to_string(),
            to: vec!["ops@example.com".to_string()],
        }
    }

    #[test]
    fn test_from_config_valid() {
        let sink = EmailSink::from_config(&config()).unwrap();
        assert_eq!(sink.sink_name(), "email");
        assert_eq!(sink.from.email.to_string(), "soil@example.com");
    }

    #[test]
    fn test_from_config_implicit_tls_port() {
        let mut config = config();
        config.smtp_port = 465;
        assert!(EmailSink::from_config(&config).is_ok());
    }

    #[test]
    fn test_from_config_rejects_bad_addresses() {
        let mut bad_from = config();
        bad_from.from = "not-an-email".to_string();
        assert!(EmailSink::from_config(&bad_from).is_err());

        let mut no_recipients = config();
        no_recipients.to.clear();
        let err = EmailSink::from_config(&no_recipients).unwrap_err();
        assert!(err.to_string().contains("at least one email recipient"));
    }

    #[test]
    fn test_date_body_includes_failure_reason() {
        let report = DateReport::new(
            "field",
            NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(),
            &IngestionOutcome::Failed(FailureReason {
                kind: FailureKind::TransientSource,
                message: "rate limited".to_string(),
            }),
        );
        let body = date_body(&report);
        assert!(body.contains("Outcome: failed"));
        assert!(body.contains("Reason: rate limited"));
        assert!(!body.contains("Mean value"));
        assert_eq!(date_subject(&report), "Soil moisture field – 2024-06-02 (failed)");
    }

    #[test]
    fn test_summary_message_has_html_alternative_and_attachment() {
        let sink = EmailSink::from_config(&config()).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        let mut summary = RunSummary::new("north <field>", day, day);
        summary.record(DateReport::new("north <field>", day, &IngestionOutcome::NoDataAvailable));
        let notice = SummaryNotice {
            summary: &summary,
            report_name: "soil_moisture_2024-06-02_2024-06-02.csv",
            report_csv: b"date,outcome,value,label\n2024-06-02,no_data_available,,\n",
        };

        let html = summary_html(&notice);
        assert!(html.contains("north &lt;field&gt;"));
        assert!(html.contains("<tr><td>No data available</td><td>1</td></tr>"));

        let raw = String::from_utf8(sink.summary_message(&notice).unwrap().formatted()).unwrap();
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/html"));
        assert!(raw.contains("soil_moisture_2024-06-02_2024-06-02.csv"));
    }
}
