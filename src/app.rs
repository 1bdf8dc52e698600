use std::time::Duration;
use tracing::{debug, info};

use crate::cli::{handle_logout, Cli, Command};
use crate::display::{format_activity, format_person};
use crate::error::{AppError, AuthError};
use crate::oauth::{
    load_application_secret, AuthConfig, AuthResult, AuthorizationFlow, BrowserPrompt,
    CredentialSource, CredentialStore, FileCredentialStore, HttpTokenEndpoint,
    KeyringCredentialStore, ScopeSet, UserKey,
};
use crate::plus_api::{get_activity, get_profile, list_activities, search_people, PlusClient};

/// Activities shown per person by the `people` command.
const ACTIVITIES_PER_PERSON: u32 = 5;

pub fn open_store(cli: &Cli) -> Result<Box<dyn CredentialStore>, AuthError> {
    if cli.keyring {
        return Ok(Box::new(KeyringCredentialStore::new()));
    }
    let dir = match &cli.store_dir {
        Some(dir) => dir.clone(),
        None => FileCredentialStore::default_dir().ok_or_else(|| {
            AuthError::Configuration(
                "cannot determine home directory; pass --store-dir".to_string(),
            )
        })?,
    };
    debug!(dir = %dir.display(), "using file credential store");
    Ok(Box::new(FileCredentialStore::new(dir)))
}

/// Loads and validates everything the flow needs before any network call.
pub async fn load_config(cli: &Cli) -> Result<AuthConfig, AuthError> {
    let secret = load_application_secret(&cli.client_secrets).await?;
    let scopes = ScopeSet::new(cli.scopes.iter().cloned())?;
    Ok(AuthConfig::new(&secret, scopes)?
        .with_redirect_ports(cli.port_range)
        .with_callback_timeout(Duration::from_secs(cli.timeout_secs.max(1))))
}

pub async fn authenticate(
    cli: &Cli,
    client: &reqwest::Client,
    store: &dyn CredentialStore,
    user: &UserKey,
) -> Result<AuthResult, AuthError> {
    let config = load_config(cli).await?;
    let endpoint = HttpTokenEndpoint::new(
        client.clone(),
        config.endpoints.token_url.clone(),
        config.identity.clone(),
    );
    let prompt = BrowserPrompt {
        open_browser: !cli.no_browser,
    };
    AuthorizationFlow::new(&config, store, &endpoint, &prompt)
        .authorize(user)
        .await
}

pub async fn run(cli: Cli) -> Result<(), AppError> {
    let user = UserKey::new(cli.user.clone())?;
    let store = open_store(&cli)?;

    if cli.command == Command::Logout {
        return handle_logout(store.as_ref(), &user);
    }

    let client = reqwest::Client::new();
    let auth = authenticate(&cli, &client, store.as_ref(), &user).await?;
    info!(user = %user, source = ?auth.source, "authenticated");

    if cli.command == Command::Login {
        let how = match auth.source {
            CredentialSource::Cached => "Using stored credential",
            CredentialSource::Refreshed => "Refreshed stored credential",
            CredentialSource::Authorized => "Authorization complete",
        };
        println!(
            "{} for '{}' (expires {}).",
            how,
            user,
            auth.credential.expires_at.to_rfc2822()
        );
        return Ok(());
    }

    let plus = PlusClient::new(client, &cli.api_base, auth.credential.access_token)?;
    run_command(&plus, cli.command).await
}

pub async fn run_command(plus: &PlusClient, command: Command) -> Result<(), AppError> {
    match command {
        Command::Login | Command::Logout => {}
        Command::Search { name, max_results } => {
            for person in search_people(plus, &name, max_results).await? {
                println!("{}", format_person(&person));
            }
        }
        Command::Activities {
            user_id,
            max_results,
        } => {
            for activity in list_activities(plus, &user_id, max_results).await? {
                println!("{}\n", format_activity(&activity));
            }
        }
        Command::Activity { id } => {
            println!("{}", format_activity(&get_activity(plus, &id).await?));
        }
        Command::Profile => {
            println!("{}", format_person(&get_profile(plus).await?));
        }
        Command::People { name, max_results } => {
            for person in search_people(plus, &name, max_results).await? {
                println!("{}", format_person(&person));
                if let Some(id) = &person.id {
                    for activity in list_activities(plus, id, ACTIVITIES_PER_PERSON).await? {
                        println!("{}\n", format_activity(&activity));
                    }
                }
                println!();
            }
        }
    }
    Ok(())
}
