//! Identity, sessions and SAML single sign-on for the finder frontend.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod session;
mod request_context;
mod broker;

pub use principal::{Principal, Attrs, ATTR_USER_ID, ATTR_DISPLAY_NAME};
pub use session::{Session, SessionToken, SessionManager};
pub use request_context::{AuthState, RequestContext};
pub use broker::{IdentityBroker, HttpIdentityBroker, SamlSettings, SamlLogout};
