use tracing::{debug, info};
use url::Url;

/// Directs the user to the authorization URL.
pub trait ConsentPrompt: Send + Sync {
    fn present(&self, authorization_url: &Url);
}

/// Prints the URL to the terminal and, unless disabled, opens the browser.
#[derive(Debug, Clone)]
pub struct BrowserPrompt {
    pub open_browser: bool,
}

impl ConsentPrompt for BrowserPrompt {
    fn present(&self, authorization_url: &Url) {
        eprintln!("Please open the following address in your browser:");
        eprintln!("  {}", authorization_url);
        if self.open_browser {
            match open::that(authorization_url.as_str()) {
                Ok(()) => info!("opened browser for authorization"),
                // Not fatal: the user can still copy the URL.
                Err(e) => debug!(error = %e, "could not open browser"),
            }
        }
    }
}
