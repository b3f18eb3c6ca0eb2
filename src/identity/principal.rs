use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// eduPersonPrincipalName
pub const ATTR_USER_ID: &str = "urn:oid:1.3.6.1.4.1.5923.1.1.1.6";
/// cn / commonName
pub const ATTR_DISPLAY_NAME: &str = "urn:oid:2.5.4.3";

/// SAML attribute statement as released by the identity provider.
pub type Attrs = BTreeMap<String, Vec<String>>;

/// Everything the assertion consumer keeps in the session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    #[serde(default)]
    pub attributes: Attrs,
    #[serde(default)]
    pub name_id: Option<String>,
    #[serde(default)]
    pub session_index: Option<String>,
}

impl Principal {
    fn first(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.first()).map(String::as_str).filter(|s| !s.is_empty())
    }

    pub fn user_id(&self) -> Option<&str> { self.first(ATTR_USER_ID) }

    pub fn display_name(&self) -> Option<&str> { self.first(ATTR_DISPLAY_NAME) }

    /// A session only counts as logged in once the IdP has released attributes.
    pub fn has_attributes(&self) -> bool { !self.attributes.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_first_attribute_value() {
        let mut attributes = Attrs::new();
        attributes.insert(ATTR_USER_ID.into(), vec!["teppo@csc.fi".into(), "other".into()]);
        attributes.insert(ATTR_DISPLAY_NAME.into(), vec!["Teppo Testaaja".into()]);
        let p = Principal { attributes, ..Default::default() };
        assert_eq!(p.user_id(), Some("teppo@csc.fi"));
        assert_eq!(p.display_name(), Some("Teppo Testaaja"));
        assert!(p.has_attributes());
    }

    #[test]
    fn empty_values_are_ignored() {
        let mut attributes = Attrs::new();
        attributes.insert(ATTR_USER_ID.into(), vec![String::new()]);
        let p = Principal { attributes, ..Default::default() };
        assert_eq!(p.user_id(), None);
        assert_eq!(p.display_name(), None);
    }
}
