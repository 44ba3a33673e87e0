//! Client personas used to vary how the engine presents itself

use rand::seq::SliceRandom;
use serde::Serialize;
use std::fmt;

/// Desktop browsers rotated by the web persona
const DESKTOP_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.1 Safari/605.1.15",
    "Mozilla/5.0 (Linux; Android 10; SM-G973F) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36",
];

const ANDROID_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 10) AppleWebKit/537.36";
const IOS_USER_AGENT: &str =
    "Mozilla/5.0 (iPhone; CPU iPhone OS 16_6 like Mac OS X) AppleWebKit/605.1.15";

/// Identity profile the engine impersonates for one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    Web,
    Android,
    Ios,
}

/// Fully resolved request fingerprint for a persona
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaProfile {
    pub user_agent: String,
    pub referer: &'static str,
    /// Player client requested from the extractor, `None` keeps its default
    pub player_client: Option<&'static str>,
}

impl Persona {
    /// Fixed priority order used by the strategy runner
    pub const ALL: [Persona; 3] = [Persona::Web, Persona::Android, Persona::Ios];

    /// Short name used in logs and responses
    pub fn name(&self) -> &'static str {
        match self {
            Persona::Web => "web",
            Persona::Android => "android",
            Persona::Ios => "ios",
        }
    }

    /// Check if this is a mobile persona
    pub fn is_mobile(&self) -> bool {
        matches!(self, Persona::Android | Persona::Ios)
    }

    /// Build the request fingerprint. The web persona picks a desktop
    /// user-agent at random on every call.
    pub fn profile(&self) -> PersonaProfile {
        match self {
            Persona::Web => PersonaProfile {
                user_agent: DESKTOP_USER_AGENTS
                    .choose(&mut rand::thread_rng())
                    .copied()
                    .unwrap_or(DESKTOP_USER_AGENTS[0])
                    .to_string(),
                referer: "https://www.youtube.com/",
                player_client: None,
            },
            Persona::Android => PersonaProfile {
                user_agent: ANDROID_USER_AGENT.to_string(),
                referer: "https://m.youtube.com/",
                player_client: Some("android"),
            },
            Persona::Ios => PersonaProfile {
                user_agent: IOS_USER_AGENT.to_string(),
                referer: "https://m.youtube.com/",
                player_client: Some("ios"),
            },
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
