use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::principal::{Attrs, Principal};
use crate::client::ClientError;

/// Service-provider side of SAML single sign-on. The identity provider protocol itself
/// (AuthnRequest signing, assertion verification) lives behind this trait.
#[async_trait]
pub trait IdentityBroker: Send + Sync {
    /// Where to send the browser to start a login.
    fn login_url(&self, return_to: Option<&str>) -> Result<String, ClientError>;

    /// Where to send the browser to start a single logout.
    fn logout_url(&self, name_id: Option<&str>, session_index: Option<&str>) -> Result<String, ClientError>;

    /// SP metadata XML, or the list of validation errors.
    fn metadata(&self) -> Result<String, Vec<String>>;

    /// Validate a posted assertion and return the session attributes.
    async fn consume_assertion(&self, form: &HashMap<String, String>) -> Result<Principal, ClientError>;

    /// Process a logout request/response; `Some(url)` when the IdP expects a redirect back.
    async fn process_logout(&self, query: &HashMap<String, String>) -> Result<SamlLogout, ClientError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SamlLogout {
    #[serde(default)]
    pub redirect: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SamlSettings {
    pub broker_url: String,
    pub sp_entity_id: String,
    /// Public base URL of this service; ACS and SLS endpoints hang off it.
    pub server_url: String,
}

impl SamlSettings {
    pub fn acs_url(&self) -> String { format!("{}/acs/", self.server_url) }

    pub fn sls_url(&self) -> String { format!("{}/sls/", self.server_url) }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.sp_entity_id.trim().is_empty() { errors.push("sp_entity_id is empty".to_string()); }
        for (name, url) in [("server_url", &self.server_url), ("broker_url", &self.broker_url)] {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                errors.push(format!("{} must be an absolute http(s) URL", name));
            }
        }
        errors
    }

    pub fn sp_metadata(&self) -> String {
        format!(
            r#"<?xml version="1.0"?>
<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" entityID="{entity}">
  <md:SPSSODescriptor AuthnRequestsSigned="false" WantAssertionsSigned="true" protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
    <md:SingleLogoutService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" Location="{sls}"/>
    <md:NameIDFormat>urn:oasis:names:tc:SAML:2.0:nameid-format:transient</md:NameIDFormat>
    <md:AssertionConsumerService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Location="{acs}" index="1"/>
  </md:SPSSODescriptor>
</md:EntityDescriptor>
"#,
            entity = xml_escape(&self.sp_entity_id),
            sls = xml_escape(&self.sls_url()),
            acs = xml_escape(&self.acs_url()),
        )
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

fn with_query(base: &str, params: &[(&str, &str)]) -> String {
    let qs: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect();
    if qs.is_empty() { base.to_string() } else { format!("{}?{}", base, qs.join("&")) }
}

const SERVICE: &str = "saml-broker";

/// Delegates the IdP protocol to an HTTP broker that signs requests and verifies assertions.
pub struct HttpIdentityBroker {
    client: reqwest::Client,
    settings: SamlSettings,
}

#[derive(Debug, Deserialize)]
struct AssertionPayload {
    #[serde(default)]
    attributes: Attrs,
    #[serde(default)]
    name_id: Option<String>,
    #[serde(default)]
    session_index: Option<String>,
}

impl HttpIdentityBroker {
    pub fn new(client: reqwest::Client, settings: SamlSettings) -> Self { Self { client, settings } }

    fn require_broker(&self) -> Result<&str, ClientError> {
        if self.settings.broker_url.is_empty() {
            return Err(ClientError::Config { service: SERVICE, message: "FINDER_SAML_BROKER_URL is empty".into() });
        }
        Ok(&self.settings.broker_url)
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(&self, path: &str, form: &HashMap<String, String>) -> Result<T, ClientError> {
        let url = format!("{}{}", self.require_broker()?, path);
        let resp = self
            .client
            .post(url)
            .query(&[("sp", self.settings.sp_entity_id.as_str())])
            .form(form)
            .send()
            .await
            .map_err(ClientError::transport(SERVICE))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Status { service: SERVICE, status: status.as_u16() });
        }
        resp.json::<T>().await.map_err(|e| ClientError::Decode { service: SERVICE, message: e.to_string() })
    }
}

#[async_trait]
impl IdentityBroker for HttpIdentityBroker {
    fn login_url(&self, return_to: Option<&str>) -> Result<String, ClientError> {
        let base = format!("{}/login", self.require_broker()?);
        let acs = self.settings.acs_url();
        let mut params = vec![("sp", self.settings.sp_entity_id.as_str()), ("acs", acs.as_str())];
        if let Some(r) = return_to { params.push(("RelayState", r)); }
        Ok(with_query(&base, &params))
    }

    fn logout_url(&self, name_id: Option<&str>, session_index: Option<&str>) -> Result<String, ClientError> {
        let base = format!("{}/logout", self.require_broker()?);
        let sls = self.settings.sls_url();
        let mut params = vec![("sp", self.settings.sp_entity_id.as_str()), ("sls", sls.as_str())];
        if let Some(n) = name_id { params.push(("name_id", n)); }
        if let Some(s) = session_index { params.push(("session_index", s)); }
        Ok(with_query(&base, &params))
    }

    fn metadata(&self) -> Result<String, Vec<String>> {
        let errors = self.settings.validate();
        if errors.is_empty() { Ok(self.settings.sp_metadata()) } else { Err(errors) }
    }

    async fn consume_assertion(&self, form: &HashMap<String, String>) -> Result<Principal, ClientError> {
        let payload: AssertionPayload = self.post_form("/assertions", form).await?;
        debug!(target: "saml", attributes = payload.attributes.len(), "assertion accepted");
        Ok(Principal { attributes: payload.attributes, name_id: payload.name_id, session_index: payload.session_index })
    }

    async fn process_logout(&self, query: &HashMap<String, String>) -> Result<SamlLogout, ClientError> {
        self.post_form("/logout/validate", query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SamlSettings {
        SamlSettings {
            broker_url: "https://sso.example.org".into(),
            sp_entity_id: "https://etsin.test/saml_metadata/".into(),
            server_url: "https://etsin.test".into(),
        }
    }

    #[test]
    fn login_url_carries_acs_and_relay_state() {
        let b = HttpIdentityBroker::new(reqwest::Client::new(), settings());
        let url = b.login_url(Some("https://etsin.test/dataset/1")).unwrap();
        assert!(url.starts_with("https://sso.example.org/login?sp="));
        assert!(url.contains("acs=https%3A%2F%2Fetsin.test%2Facs%2F"));
        assert!(url.contains("RelayState=https%3A%2F%2Fetsin.test%2Fdataset%2F1"));
    }

    #[test]
    fn logout_url_includes_session_identifiers() {
        let b = HttpIdentityBroker::new(reqwest::Client::new(), settings());
        let url = b.logout_url(Some("nid"), Some("idx")).unwrap();
        assert!(url.contains("name_id=nid"));
        assert!(url.contains("session_index=idx"));
        let bare = b.logout_url(None, None).unwrap();
        assert!(!bare.contains("name_id"));
    }

    #[test]
    fn metadata_lists_endpoints() {
        let xml = settings().sp_metadata();
        assert!(xml.contains(r#"entityID="https://etsin.test/saml_metadata/""#));
        assert!(xml.contains(r#"Location="https://etsin.test/acs/""#));
        assert!(xml.contains(r#"Location="https://etsin.test/sls/""#));
    }

    #[test]
    fn metadata_validation_reports_errors() {
        let bad = SamlSettings { broker_url: String::new(), sp_entity_id: " ".into(), server_url: "etsin".into() };
        let b = HttpIdentityBroker::new(reqwest::Client::new(), bad);
        let errors = b.metadata().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(b.login_url(None).is_err());
    }
}
