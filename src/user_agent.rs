//! Shared User-Agent string for listing, detail-page and asset requests.
//!
//! Every request the pipeline issues identifies the tool with one format so
//! site operators can recognize (and contact) the crawler.

/// Project URL advertised in the User-Agent.
const PROJECT_UA_URL: &str = "https://github.com/harvester-rs/harvester";

/// Default User-Agent for all pipeline traffic.
#[must_use]
pub fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("harvester/{version} (dataset-acquisition; +{PROJECT_UA_URL})")
}
