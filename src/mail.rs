//! Contact form: recipient resolution from catalog record agents, request validation,
//! message composition and SMTP delivery.

use std::collections::BTreeMap;

use async_trait::async_trait;
use lettre::address::AddressError;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::ClientError;
use crate::config::MailConfig;
use crate::record::CatalogRecord;

/// Longest accepted message body, in characters.
pub const MAX_BODY_LEN: usize = 1000;

pub const SUBJECT: &str = "Message from Etsin / Meddelande från Etsin / Viesti Etsimestä";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentRole {
    Contributor,
    Creator,
    Publisher,
    RightsHolder,
    Curator,
}

impl AgentRole {
    pub const ALL: [AgentRole; 5] = [
        AgentRole::Contributor,
        AgentRole::Creator,
        AgentRole::Publisher,
        AgentRole::RightsHolder,
        AgentRole::Curator,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CONTRIBUTOR" => Some(AgentRole::Contributor),
            "CREATOR" => Some(AgentRole::Creator),
            "PUBLISHER" => Some(AgentRole::Publisher),
            "RIGHTS_HOLDER" => Some(AgentRole::RightsHolder),
            "CURATOR" => Some(AgentRole::Curator),
            _ => None,
        }
    }

    /// Key of the role under `research_dataset`.
    pub fn dataset_key(self) -> &'static str {
        match self {
            AgentRole::Contributor => "contributor",
            AgentRole::Creator => "creator",
            AgentRole::Publisher => "publisher",
            AgentRole::RightsHolder => "rights_holder",
            AgentRole::Curator => "curator",
        }
    }
}

fn agent_email(agent: &Value) -> Option<&str> {
    let direct = agent.get("email").and_then(Value::as_str).filter(|s| !s.is_empty());
    direct.or_else(|| agent.get("member_of").and_then(agent_email))
}

/// First email found among the agents of `role`, falling back to their organisations.
pub fn recipient_address(record: &CatalogRecord, role: AgentRole) -> Option<String> {
    record.agents(role.dataset_key()).into_iter().find_map(agent_email).map(str::to_string)
}

/// Which roles can be contacted, keyed by role name. Computed before personal data is stripped.
pub fn email_info(record: &CatalogRecord) -> BTreeMap<AgentRole, bool> {
    AgentRole::ALL.iter().map(|r| (*r, recipient_address(record, *r).is_some())).collect()
}

pub fn is_valid_email(s: &str) -> bool { EMAIL_RE.is_match(s.trim()) }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactRequest {
    pub user_email: Option<String>,
    pub user_subject: Option<String>,
    pub user_body: Option<String>,
    pub agent_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidContact {
    pub user_email: String,
    pub user_subject: String,
    pub user_body: String,
    pub role: AgentRole,
}

fn required(v: &Option<String>, name: &str) -> Result<String, String> {
    match v.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(format!("{} cannot be empty", name)),
    }
}

impl ContactRequest {
    pub fn validate(&self) -> Result<ValidContact, String> {
        let user_email = required(&self.user_email, "user_email")?;
        let user_subject = required(&self.user_subject, "user_subject")?;
        let user_body = required(&self.user_body, "user_body")?;
        let agent_type = required(&self.agent_type, "agent_type")?;
        if !is_valid_email(&user_email) { return Err("user_email is not a valid email address".into()); }
        if user_body.chars().count() > MAX_BODY_LEN {
            return Err(format!("user_body exceeds {} characters", MAX_BODY_LEN));
        }
        let role = AgentRole::parse(&agent_type).ok_or_else(|| format!("unknown agent_type '{}'", agent_type))?;
        Ok(ValidContact { user_email, user_subject, user_body, role })
    }
}

pub fn compose_body(preferred_identifier: &str, user_email: &str, user_subject: &str, user_body: &str) -> String {
    format!(
        "The following message has been sent to you via Etsin regarding the dataset {pid}.\n\
         Seuraava viesti on lähetetty sinulle Etsimen kautta koskien aineistoa {pid}.\n\
         Följande meddelande har skickats till dig via Etsin angående datamängden {pid}.\n\n\
         Sender / Lähettäjä / Avsändare: {email}\n\
         Subject / Aihe / Ämne: {subject}\n\n\
         {body}\n",
        pid = preferred_identifier,
        email = user_email,
        subject = user_subject,
        body = user_body,
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub reply_to: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), ClientError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(cfg: &MailConfig) -> Result<Self, ClientError> {
        let mut builder = if cfg.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.server).map_err(|e| ClientError::Mail(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&cfg.server)
        };
        builder = builder.port(cfg.port);
        if let (Some(user), Some(pass)) = (&cfg.username, &cfg.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(Self { transport: builder.build() })
    }
}

fn build_message(mail: &OutgoingMail) -> Result<Message, ClientError> {
    let parse = |s: &str| -> Result<Mailbox, ClientError> {
        s.parse().map_err(|e: AddressError| ClientError::Mail(e.to_string()))
    };
    Message::builder()
        .from(parse(&mail.from)?)
        .reply_to(parse(&mail.reply_to)?)
        .to(parse(&mail.to)?)
        .subject(mail.subject.clone())
        .header(ContentType::TEXT_PLAIN)
        .body(mail.body.clone())
        .map_err(|e| ClientError::Mail(e.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), ClientError> {
        let message = build_message(mail)?;
        self.transport.send(message).await.map_err(|e| ClientError::Mail(e.to_string()))?;
        Ok(())
    }
}
