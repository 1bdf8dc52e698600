use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::error::AppError;
use crate::oauth::config::{DEFAULT_CLIENT_SECRETS_PATH, DEFAULT_SCOPE};
use crate::oauth::{CredentialStore, PortRange, UserKey};
use crate::plus_api::DEFAULT_API_BASE;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Google+ API client with OAuth2 installed-app login", long_about = None)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,

    /// Path to the client secrets JSON downloaded from the API console.
    #[clap(long, global = true, env = "GPLUS_CLIENT_SECRETS", default_value = DEFAULT_CLIENT_SECRETS_PATH)]
    pub client_secrets: PathBuf,

    /// Key the credential is stored under.
    #[clap(long, global = true, env = "GPLUS_USER", default_value = "user")]
    pub user: String,

    /// Credential cache directory (defaults to ~/.store/plus).
    #[clap(long, global = true, env = "GPLUS_STORE_DIR")]
    pub store_dir: Option<PathBuf>,

    /// Keep credentials in the system keyring instead of files.
    #[clap(long, global = true)]
    pub keyring: bool,

    /// Print the authorization URL without opening a browser.
    #[clap(long, global = true)]
    pub no_browser: bool,

    /// Seconds to wait for the browser redirect.
    #[clap(long, global = true, default_value_t = 120)]
    pub timeout_secs: u64,

    /// Callback port or range, e.g. 8080 or 8080-8090 (0 picks a free port).
    #[clap(long, global = true, default_value = "0")]
    pub port_range: PortRange,

    /// OAuth scope to request (repeatable).
    #[clap(long = "scope", global = true, default_value = DEFAULT_SCOPE)]
    pub scopes: Vec<String>,

    /// Base URL of the Google+ REST API.
    #[clap(long, global = true, env = "GPLUS_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Log level (trace, debug, info, warn, error).
    #[clap(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[clap(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Authorize (or refresh) and report the stored credential.
    Login,
    /// Remove the stored credential and exit.
    Logout,
    /// Search for people by name.
    Search {
        name: String,
        #[clap(long, default_value_t = 5)]
        max_results: u32,
    },
    /// List a user's public activities.
    Activities {
        user_id: String,
        #[clap(long, default_value_t = 5)]
        max_results: u32,
    },
    /// Show a single activity.
    Activity { id: String },
    /// Show the signed-in user's profile.
    Profile,
    /// Search for people and show each one's latest activities.
    People {
        name: String,
        #[clap(long, default_value_t = 5)]
        max_results: u32,
    },
}

pub fn handle_logout(store: &dyn CredentialStore, user: &UserKey) -> Result<(), AppError> {
    if store.delete(user)? {
        println!("Credentials for '{}' removed.", user);
    } else {
        println!("No stored credentials for '{}'.", user);
    }
    Ok(())
}
