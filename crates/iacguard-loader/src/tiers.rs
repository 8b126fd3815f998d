//! Multi-tier policy merging.
//!
//! Tiers are applied lowest priority first: embedded, user-global,
//! workspace-local. A later tier replaces earlier entries with the same ID
//! in place, so listings keep a stable order.

use iacguard_core::PolicyIndex;
use tracing::{debug, info, instrument, warn};

use crate::config::LoaderConfig;
use crate::error::{LoaderError, Result};
use crate::loader::PolicyLoader;

/// Loads and merges every configured tier.
///
/// An absent or failing directory tier contributes nothing. Helper modules
/// accumulate across tiers, so a workspace rule may import a helper that
/// only the embedded tier ships.
///
/// # Errors
///
/// Returns [`LoaderError::EmptyIndex`] if no tier contributed a rule or pack.
#[instrument(skip(config))]
pub fn load_with_fallback(config: &LoaderConfig) -> Result<PolicyIndex> {
    let mut index = config.embedded.clone().unwrap_or_default();
    if config.embedded.is_none() {
        debug!("No embedded index");
    }

    let mut helpers = config.extra_modules.clone();
    for (name, source) in index.lib_modules() {
        helpers.entry(name.clone()).or_insert_with(|| source.clone());
    }

    let tiers = [
        ("user", config.user_dir.as_deref()),
        ("workspace", config.workspace_dir.as_deref()),
    ];

    for (tier, dir) in tiers {
        let Some(dir) = dir else {
            continue;
        };
        if !dir.is_dir() {
            debug!(tier, dir = %dir.display(), "Tier directory absent");
            continue;
        }

        match PolicyLoader::new()
            .with_extra_modules(helpers.clone())
            .load(dir)
        {
            Ok(tier_index) => {
                info!(
                    tier,
                    rules = tier_index.rule_count(),
                    packs = tier_index.pack_count(),
                    "Merging policy tier"
                );
                for (name, source) in tier_index.lib_modules() {
                    helpers.insert(name.clone(), source.clone());
                }
                index = PolicyIndex::merge(&index, &tier_index);
            }
            Err(e) => warn!(tier, dir = %dir.display(), error = %e, "Failed to load policy tier"),
        }
    }

    if index.is_empty() {
        return Err(LoaderError::EmptyIndex);
    }
    Ok(index)
}
