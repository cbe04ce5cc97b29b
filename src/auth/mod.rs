//! JWT authentication with role-based access control.
//!
//! Short-lived access tokens (15 min) authorize requests; long-lived refresh
//! tokens (7 days) are accepted only by the refresh endpoint. Every check
//! consults the revocation store, so logout takes effect immediately.

mod cookie;
mod errors;
mod extractors;
mod guard;
mod ip;
mod session;
mod state;
mod types;

pub use cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, clear_cookie, get_cookie, token_cookie};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{
    AdminOnly, AnyRole, Auth, EditorOrAbove, OptionalAuth, RefreshAuth, RoleConstraint,
    access_token_from, bearer_token, refresh_token_from,
};
pub use guard::{REVOCATION_LOOKUP_TIMEOUT, authorize, check_role, check_token};
pub use ip::{HasHeadersAndExtensions, extract_client_ip};
pub use session::revoke_session;
pub use state::HasAuthBackend;
pub use types::AuthenticatedUser;
