//! Runtime tunables.

use std::time::Duration;

/// Paywall runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaywallSettings {
    /// Bound on a forwarded method call; `None` waits forever
    pub call_timeout: Option<Duration>,
    /// Path of the checkout page under the network's checkout application
    pub checkout_path: String,
    /// Page-local storage key for the cached user
    pub storage_key: String,
}

impl Default for PaywallSettings {
    fn default() -> Self {
        Self {
            call_timeout: Some(Duration::from_secs(60)),
            checkout_path: "/checkout".to_string(),
            storage_key: "__unlockProtocol.userInfo".to_string(),
        }
    }
}

impl PaywallSettings {
    /// Checkout URL under `app_url`.
    pub fn checkout_url(&self, app_url: &str) -> String {
        format!("{}{}", app_url.trim_end_matches('/'), self.checkout_path)
    }
}
