use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::config::Config;

#[derive(Debug, Clone, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
}

pub type Mailbox = Arc<Mutex<Vec<Email>>>;

/// Outbound mail dispatcher. Delivery runs on its own task and never blocks
/// or fails the request that triggered it; transport errors are only logged.
#[derive(Clone)]
pub enum Mailer {
    /// JSON POST to an HTTP mail relay.
    Http {
        client: reqwest::Client,
        endpoint: String,
        sender: String,
    },
    /// Keeps messages in memory instead of sending them; the test double.
    Capture(Mailbox),
    /// Logs and drops. Used when no relay is configured.
    Disabled,
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Mailer {
        match &config.mail_endpoint {
            Some(endpoint) => Mailer::Http {
                client: reqwest::Client::new(),
                endpoint: endpoint.clone(),
                sender: config.mail_sender.clone(),
            },
            None => Mailer::Disabled,
        }
    }

    pub fn capture() -> (Mailer, Mailbox) {
        let mailbox: Mailbox = Arc::new(Mutex::new(Vec::new()));
        (Mailer::Capture(mailbox.clone()), mailbox)
    }

    pub fn send(&self, email: Email) {
        match self {
            Mailer::Http {
                client,
                endpoint,
                sender,
            } => {
                let client = client.clone();
                let endpoint = endpoint.clone();
                let sender = sender.clone();
                tokio::spawn(async move {
                    let payload = RelayPayload {
                        from: &sender,
                        to: &email.to,
                        subject: &email.subject,
                        text: &email.text,
                    };
                    match client.post(&endpoint).json(&payload).send().await {
                        Ok(response) if response.status().is_success() => {}
                        Ok(response) => tracing::warn!(
                            status = %response.status(),
                            to = %email.to,
                            "mail relay rejected message"
                        ),
                        Err(err) => tracing::warn!(
                            error = %err,
                            to = %email.to,
                            "failed to deliver mail"
                        ),
                    }
                });
            }
            Mailer::Capture(mailbox) => mailbox.lock().unwrap().push(email),
            Mailer::Disabled => {
                tracing::info!(to = %email.to, subject = %email.subject, "mail relay not configured, dropping message");
            }
        }
    }
}
