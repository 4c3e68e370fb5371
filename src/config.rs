//! Configuration loaded from `decaptcha.toml`.
//!
//! The [`DecaptchaConfig`] struct holds credentials and optional timing
//! overrides per provider, plus the order in which providers are tried.
//! Missing values fall back to sensible defaults, and `DECAPTCHA_*`
//! environment variables take precedence over the file for secrets.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::DecaptchaError;
use crate::http::HttpClient;
use crate::provider::{
    antigate, avplayer, channel_friend, deathbycaptcha, hydati, jsdati, Antigate, AnyProvider,
    Avplayer, ChannelFriend, DeathByCaptcha, Hydati, Jsdati, Provider, RelayChannel,
};
use crate::state_machine::RetryPolicy;

pub const DEFAULT_PATH: &str = "decaptcha.toml";

/// Every provider name a chain may reference.
pub const KNOWN_PROVIDERS: [&str; 6] = [
    hydati::NAME,
    jsdati::NAME,
    deathbycaptcha::NAME,
    antigate::NAME,
    channel_friend::NAME,
    avplayer::NAME,
];

/// Top-level configuration loaded from `decaptcha.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct DecaptchaConfig {
    /// Provider names in the order they are tried.
    #[serde(default = "default_order")]
    pub order: Vec<String>,

    #[serde(default)]
    pub antigate: AntigateConfig,

    #[serde(default)]
    pub deathbycaptcha: AccountConfig,

    #[serde(default)]
    pub jsdati: AccountConfig,

    #[serde(default)]
    pub hydati: KeyConfig,

    #[serde(default)]
    pub channel_friend: ToggleConfig,

    #[serde(default)]
    pub avplayer: ToggleConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AntigateConfig {
    #[serde(default)]
    pub key: String,

    #[serde(default = "default_antigate_host")]
    pub host: String,

    #[serde(default)]
    pub policy: PolicyConfig,
}

/// Username/password providers (deathbycaptcha, jsdati).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountConfig {
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Overrides the service URL.
    pub base_url: Option<String>,

    #[serde(default)]
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyConfig {
    #[serde(default)]
    pub key: String,

    pub base_url: Option<String>,

    #[serde(default)]
    pub policy: PolicyConfig,
}

/// Providers that need no credentials and are switched on explicitly.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToggleConfig {
    #[serde(default)]
    pub enabled: bool,

    /// `host:port` for TCP providers.
    pub addr: Option<String>,

    #[serde(default)]
    pub policy: PolicyConfig,
}

/// Partial timing override; unset fields keep the provider's defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PolicyConfig {
    pub initial_delay_secs: Option<u64>,
    pub poll_delay_secs: Option<u64>,
    pub max_polls: Option<u32>,
}

impl PolicyConfig {
    pub fn apply(&self, base: RetryPolicy) -> RetryPolicy {
        RetryPolicy {
            initial_delay: self
                .initial_delay_secs
                .map_or(base.initial_delay, Duration::from_secs),
            poll_delay: self
                .poll_delay_secs
                .map_or(base.poll_delay, Duration::from_secs),
            max_attempts: self.max_polls.unwrap_or(base.max_attempts),
        }
    }
}

// Default order: hydati, jsdati, deathbycaptcha, antigate, channel_friend, avplayer.
fn default_order() -> Vec<String> {
    KNOWN_PROVIDERS.iter().map(|name| name.to_string()).collect()
}

fn default_antigate_host() -> String {
    antigate::DEFAULT_HOST.to_string()
}

impl Default for AntigateConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            host: default_antigate_host(),
            policy: PolicyConfig::default(),
        }
    }
}

impl Default for DecaptchaConfig {
    fn default() -> Self {
        Self {
            order: default_order(),
            antigate: AntigateConfig::default(),
            deathbycaptcha: AccountConfig::default(),
            jsdati: AccountConfig::default(),
            hydati: KeyConfig::default(),
            channel_friend: ToggleConfig::default(),
            avplayer: ToggleConfig::default(),
        }
    }
}

/// What the caller adds on top of the file when building a chain.
#[derive(Debug, Clone, Default)]
pub struct ChainOptions {
    /// Restricts the chain to these providers, keeping the configured order.
    pub only: Vec<String>,
    /// Operator relay; `channel_friend` joins the chain only when present.
    pub relay: Option<RelayChannel>,
}

impl DecaptchaConfig {
    /// Loads `path`, using defaults when the file does not exist, then
    /// applies environment overrides.
    pub fn load(path: &Path) -> Result<Self, DecaptchaError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Self::parse(&contents)?
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, DecaptchaError> {
        let config: DecaptchaConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), DecaptchaError> {
        check_names(&self.order)?;
        if let Some(dup) = first_duplicate(&self.order) {
            return Err(DecaptchaError::Config(format!(
                "provider {dup} appears twice in order"
            )));
        }
        Ok(())
    }

    /// Environment variables take precedence over the file for secrets.
    /// Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).filter(|value| !value.is_empty());

        if let Some(key) = var("DECAPTCHA_ANTIGATE_KEY") {
            self.antigate.key = key;
        }
        if let Some(key) = var("DECAPTCHA_HYDATI_KEY") {
            self.hydati.key = key;
        }
        if let Some(username) = var("DECAPTCHA_DBC_USERNAME") {
            self.deathbycaptcha.username = username;
        }
        if let Some(password) = var("DECAPTCHA_DBC_PASSWORD") {
            self.deathbycaptcha.password = password;
        }
        if let Some(username) = var("DECAPTCHA_JSDATI_USERNAME") {
            self.jsdati.username = username;
        }
        if let Some(password) = var("DECAPTCHA_JSDATI_PASSWORD") {
            self.jsdati.password = password;
        }
    }

    /// Builds the provider chain in configured order.
    ///
    /// Providers without credentials (or not enabled) are skipped.
    pub fn build_chain(
        &self,
        http: &HttpClient,
        options: &ChainOptions,
    ) -> Result<Vec<AnyProvider>, DecaptchaError> {
        check_names(&options.only)?;

        let mut chain = Vec::new();
        for name in &self.order {
            if !options.only.is_empty() && !options.only.contains(name) {
                continue;
            }
            match self.provider(name, http, options)? {
                Some(provider) => chain.push(provider),
                None => debug!(provider = %name, "not configured, skipped"),
            }
        }

        for name in &options.only {
            if !chain.iter().any(|p| p.name() == name) {
                warn!(provider = %name, "requested provider is not configured");
            }
        }
        Ok(chain)
    }

    fn provider(
        &self,
        name: &str,
        http: &HttpClient,
        options: &ChainOptions,
    ) -> Result<Option<AnyProvider>, DecaptchaError> {
        let provider = match name {
            antigate::NAME => {
                let cfg = &self.antigate;
                has(&cfg.key).then(|| {
                    AnyProvider::Antigate(
                        Antigate::with_host(http.clone(), &cfg.key, &cfg.host)
                            .with_policy(cfg.policy.apply(antigate::POLICY)),
                    )
                })
            }
            deathbycaptcha::NAME => {
                let cfg = &self.deathbycaptcha;
                (has(&cfg.username) && has(&cfg.password)).then(|| {
                    let base = cfg
                        .base_url
                        .as_deref()
                        .unwrap_or(deathbycaptcha::DEFAULT_BASE_URL);
                    AnyProvider::DeathByCaptcha(
                        DeathByCaptcha::with_base_url(
                            http.clone(),
                            &cfg.username,
                            &cfg.password,
                            base,
                        )
                        .with_policy(cfg.policy.apply(deathbycaptcha::POLICY)),
                    )
                })
            }
            jsdati::NAME => {
                let cfg = &self.jsdati;
                (has(&cfg.username) && has(&cfg.password)).then(|| {
                    let base = cfg.base_url.as_deref().unwrap_or(jsdati::DEFAULT_BASE_URL);
                    AnyProvider::Jsdati(
                        Jsdati::with_base_url(http.clone(), &cfg.username, &cfg.password, base)
                            .with_policy(cfg.policy.apply(jsdati::POLICY)),
                    )
                })
            }
            hydati::NAME => {
                let cfg = &self.hydati;
                has(&cfg.key).then(|| {
                    let base = cfg.base_url.as_deref().unwrap_or(hydati::DEFAULT_BASE_URL);
                    AnyProvider::Hydati(
                        Hydati::with_base_url(http.clone(), &cfg.key, base)
                            .with_policy(cfg.policy.apply(hydati::POLICY)),
                    )
                })
            }
            channel_friend::NAME => options.relay.clone().map(|relay| {
                AnyProvider::ChannelFriend(
                    ChannelFriend::new(relay)
                        .with_policy(self.channel_friend.policy.apply(channel_friend::POLICY)),
                )
            }),
            avplayer::NAME => {
                let cfg = &self.avplayer;
                cfg.enabled.then(|| {
                    let addr = cfg.addr.as_deref().unwrap_or(avplayer::DEFAULT_ADDR);
                    AnyProvider::Avplayer(Avplayer::with_addr(addr))
                })
            }
            other => return Err(DecaptchaError::UnknownProvider(other.to_string())),
        };
        Ok(provider)
    }
}

fn has(value: &str) -> bool {
    !value.trim().is_empty()
}

fn check_names(names: &[String]) -> Result<(), DecaptchaError> {
    match names
        .iter()
        .find(|name| !KNOWN_PROVIDERS.contains(&name.as_str()))
    {
        Some(unknown) => Err(DecaptchaError::UnknownProvider(unknown.clone())),
        None => Ok(()),
    }
}

fn first_duplicate(names: &[String]) -> Option<&str> {
    names
        .iter()
        .enumerate()
        .find(|(i, name)| names[..*i].contains(name))
        .map(|(_, name)| name.as_str())
}
