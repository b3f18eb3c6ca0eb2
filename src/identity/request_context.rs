use super::Principal;

/// Caller authentication as seen by access decisions and the response shaper.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub is_authenticated: bool,
    pub user_id: Option<String>,
    pub user_display_name: Option<String>,
}

impl AuthState {
    pub fn anonymous() -> Self { Self::default() }

    pub fn from_principal(principal: Option<&Principal>) -> Self {
        match principal {
            Some(p) if p.has_attributes() => Self {
                is_authenticated: true,
                user_id: p.user_id().map(str::to_string),
                user_display_name: p.display_name().map(str::to_string),
            },
            _ => Self::anonymous(),
        }
    }
}

/// Built once per request from the session cookie and passed explicitly down the call chain.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub auth: AuthState,
    pub principal: Option<Principal>,
    pub session_token: Option<String>,
    pub request_id: String,
}

impl RequestContext {
    pub fn new(principal: Option<Principal>, session_token: Option<String>, request_id: String) -> Self {
        let auth = AuthState::from_principal(principal.as_ref());
        Self { auth, principal, session_token, request_id }
    }

    pub fn is_authenticated(&self) -> bool { self.auth.is_authenticated }

    pub fn user_id(&self) -> Option<&str> { self.auth.user_id.as_deref() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::principal::{Attrs, ATTR_DISPLAY_NAME, ATTR_USER_ID};

    #[test]
    fn no_principal_is_anonymous() {
        let ctx = RequestContext::new(None, None, "r1".into());
        assert!(!ctx.is_authenticated());
        assert_eq!(ctx.user_id(), None);
    }

    #[test]
    fn principal_without_attributes_is_anonymous() {
        let p = Principal { name_id: Some("nid".into()), ..Default::default() };
        assert_eq!(AuthState::from_principal(Some(&p)), AuthState::anonymous());
    }

    #[test]
    fn principal_with_attributes_is_authenticated() {
        let mut attributes = Attrs::new();
        attributes.insert(ATTR_USER_ID.into(), vec!["u@x.fi".into()]);
        attributes.insert(ATTR_DISPLAY_NAME.into(), vec!["U X".into()]);
        let p = Principal { attributes, ..Default::default() };
        let auth = AuthState::from_principal(Some(&p));
        assert!(auth.is_authenticated);
        assert_eq!(auth.user_id.as_deref(), Some("u@x.fi"));
        assert_eq!(auth.user_display_name.as_deref(), Some("U X"));
    }
}
