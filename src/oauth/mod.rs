//! OAuth2 installed-application flow split into logical submodules
//!
//! - config: client secrets and validated flow settings
//! - credential: credential, user key and scope types
//! - store: file and keyring credential caches
//! - callback: one-shot localhost redirect listener
//! - endpoint: token endpoint (code exchange and refresh)
//! - consent: how the user is sent to the authorization URL
//! - flow: the authorization state machine

pub mod callback;
pub mod config;
pub mod consent;
pub mod credential;
pub mod endpoint;
pub mod flow;
pub mod pkce;
pub mod store;

pub use config::{load_application_secret, AuthConfig, ClientIdentity, PortRange};
pub use consent::{BrowserPrompt, ConsentPrompt};
pub use credential::{Credential, ScopeSet, UserKey};
pub use endpoint::{HttpTokenEndpoint, TokenEndpoint};
pub use flow::{AuthResult, AuthorizationFlow, CredentialSource};
pub use store::{CredentialStore, FileCredentialStore, KeyringCredentialStore};
