//! Resolve command - fetch an ActivityPub profile

use anyhow::{Context, Result};
use fedkit_lib::cache::{CachingFetcher, DocumentCache};
use fedkit_lib::protocols::activitypub::ActivityPubResolver;
use fedkit_lib::transport::{HttpClient, ProfileResolver};
use fedkit_lib::FederationConfig;

use crate::ui;

pub fn run(id: &str, config: &FederationConfig) -> Result<()> {
    let cache = DocumentCache::from_config(config);
    let resolver = ActivityPubResolver::new(CachingFetcher::new(HttpClient::new(config)?, &cache));

    let spinner = ui::spinner(&format!("Fetching {}...", id));
    let resolved = resolver.resolve(id);
    spinner.finish_and_clear();

    let profile = resolved?.with_context(|| format!("{} did not resolve to a profile", id))?;
    ui::entity(&profile.into());
    Ok(())
}
