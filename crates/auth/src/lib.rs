//! `dcim-auth`: authentication and role-based authorization.
//!
//! Credentials become signed tokens carrying a role snapshot; tokens become
//! claims; claims plus a permission become a decision. Decoupled from HTTP.
//! Identity data is read through [`store::IdentityStore`]; outstanding refresh
//! tokens are tracked by hash in [`refresh::RefreshTokenStore`].

pub mod authorize;
pub mod bearer;
pub mod claims;
pub mod credentials;
pub mod error;
pub mod permissions;
pub mod principal;
pub mod refresh;
pub mod resolver;
pub mod roles;
pub mod store;
pub mod token;

pub use authorize::{AccessEnforcer, AuthorizationExplanation, Decision, Sensitivity};
pub use bearer::extract_bearer;
pub use claims::{Claims, TokenType, validate_claims};
pub use credentials::{CredentialVerifier, HashError, SecretHasher};
pub use error::AuthError;
pub use permissions::{Capabilities, Permission, PermissionSet, UnknownPermission};
pub use principal::{AccountStatus, CredentialRecord, Principal, PrincipalId, RoleAssignment};
pub use refresh::{InMemoryRefreshTokenStore, RefreshStoreError, RefreshTokenStore, hash_refresh_token};
pub use resolver::RoleResolver;
pub use roles::{InvalidRoleName, RoleDefinition, RoleName, RoleTable};
pub use store::{IdentityStore, IdentityStoreError, InMemoryIdentityStore};
pub use token::{SigningKey, TokenIssuer, TokenTtls};
