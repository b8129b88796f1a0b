use serde::Deserialize;

use super::ProviderConfig;

/// Provider credentials read from `SUPABASE_*` variables.
#[derive(Deserialize, Debug, Clone)]
pub struct ProviderEnv {
    pub url: Option<String>,
    pub anon_key: Option<String>,
}

impl ProviderEnv {
    fn prefix() -> &'static str {
        "SUPABASE_"
    }

    /// Returns `None` when no `SUPABASE_*` variable could be parsed.
    pub fn from_env() -> Option<Self> {
        match envy::prefixed(Self::prefix()).from_env::<ProviderEnv>() {
            Ok(env) => Some(env),
            Err(e) => {
                tracing::warn!("Ignoring malformed {}* environment: {}", Self::prefix(), e);
                None
            }
        }
    }

    pub fn apply(self, provider: &mut ProviderConfig) {
        if let Some(url) = self.url.filter(|u| !u.is_empty()) {
            provider.url = url;
        }
        if let Some(key) = self.anon_key.filter(|k| !k.is_empty()) {
            provider.anon_key = key;
        }
    }
}
