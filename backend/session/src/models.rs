//! Model allow-list and the list of models offered to users.

use std::collections::HashMap;

use infinigpt_config::ModelsConfig;
use infinigpt_core::{BotError, BotResult, ModelInfo};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Keyword that selects the configured default model.
pub const RESET_KEYWORD: &str = "reset";

#[derive(Debug, Default)]
struct Discovered {
    names: Vec<String>,
    ids: HashMap<String, String>,
}

/// Validates model names and maps display names to gateway ids.
///
/// The static allow-list from config is authoritative for validation. The
/// gateway's `/models` listing only changes what `.model` advertises and how
/// names are translated into request ids.
#[derive(Debug)]
pub struct ModelCatalog {
    allowed: Vec<String>,
    restrict: bool,
    default: String,
    discovered: RwLock<Discovered>,
}

impl ModelCatalog {
    pub fn new(allowed: Vec<String>, restrict: bool, default: impl Into<String>) -> Self {
        Self {
            allowed,
            restrict,
            default: default.into(),
            discovered: RwLock::new(Discovered::default()),
        }
    }

    pub fn from_config(config: &ModelsConfig) -> Self {
        Self::new(
            config.allowed.clone(),
            config.restrict,
            config.default_model().to_string(),
        )
    }

    pub fn default_model(&self) -> &str {
        &self.default
    }

    /// Resolve a requested model name to the name a session should store.
    ///
    /// `reset` selects the default. Anything else must be on the allow-list
    /// when the catalog is restricted.
    pub fn validate(&self, requested: &str) -> BotResult<String> {
        let requested = requested.trim();
        if requested.eq_ignore_ascii_case(RESET_KEYWORD) {
            return Ok(self.default.clone());
        }
        let known = self.allowed.iter().any(|m| m == requested);
        if requested.is_empty() || (self.restrict && !known) {
            return Err(BotError::InvalidModel {
                requested: requested.to_string(),
                allowed: self.allowed.clone(),
            });
        }
        Ok(requested.to_string())
    }

    /// Names shown by `.model` with no argument.
    pub async fn offered(&self) -> Vec<String> {
        let discovered = self.discovered.read().await;
        if !discovered.names.is_empty() {
            return discovered.names.clone();
        }
        if self.allowed.is_empty() {
            vec![self.default.clone()]
        } else {
            self.allowed.clone()
        }
    }

    /// Gateway id for a model name, falling back to the name itself.
    pub async fn resolve_id(&self, name: &str) -> String {
        self.discovered
            .read()
            .await
            .ids
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Replace the discovered model list with a fresh gateway listing.
    ///
    /// A restricted catalog keeps only listed models that are also allowed.
    pub async fn refresh(&self, models: Vec<ModelInfo>) {
        let mut kept: Vec<ModelInfo> = models
            .into_iter()
            .filter(|m| !m.name.is_empty())
            .filter(|m| !self.restrict || self.allowed.contains(&m.name))
            .collect();
        kept.sort_by(|a, b| a.name.cmp(&b.name));
        kept.dedup_by(|a, b| a.name == b.name);

        if kept.is_empty() {
            warn!("Gateway model listing had no usable models; keeping previous list");
            return;
        }

        let mut discovered = self.discovered.write().await;
        discovered.names = kept.iter().map(|m| m.name.clone()).collect();
        discovered.ids = kept
            .into_iter()
            .filter(|m| !m.id.is_empty())
            .map(|m| (m.name, m.id))
            .collect();
        debug!(count = discovered.names.len(), "Model list refreshed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn restricted() -> ModelCatalog {
        ModelCatalog::new(vec!["gpt-x".into(), "gpt-y".into()], true, "gpt-x")
    }

    fn info(name: &str, id: &str) -> ModelInfo {
        ModelInfo {
            name: name.into(),
            id: id.into(),
        }
    }

    #[test]
    fn allowed_model_passes() {
        assert_eq!(restricted().validate("gpt-y").unwrap(), "gpt-y");
    }

    #[test]
    fn unknown_model_lists_allowed() {
        let err = restricted().validate("bogus").unwrap_err();
        match &err {
            BotError::InvalidModel { requested, allowed } => {
                assert_eq!(requested, "bogus");
                assert_eq!(allowed, &vec!["gpt-x".to_string(), "gpt-y".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            err.user_message(),
            "Invalid model name. Available models: gpt-x, gpt-y"
        );
    }

    #[test]
    fn reset_selects_default() {
        assert_eq!(restricted().validate("reset").unwrap(), "gpt-x");
        assert_eq!(restricted().validate(" RESET ").unwrap(), "gpt-x");
    }

    #[test]
    fn unrestricted_accepts_any_non_empty_name() {
        let catalog = ModelCatalog::new(vec![], false, "gpt-x");
        assert_eq!(catalog.validate("anything").unwrap(), "anything");
        assert!(catalog.validate("  ").is_err());
    }

    #[tokio::test]
    async fn offered_falls_back_to_allow_list() {
        assert_eq!(restricted().offered().await, vec!["gpt-x", "gpt-y"]);
        let open = ModelCatalog::new(vec![], false, "gpt-x");
        assert_eq!(open.offered().await, vec!["gpt-x"]);
    }

    #[tokio::test]
    async fn refresh_intersects_with_allow_list() {
        let catalog = restricted();
        catalog
            .refresh(vec![
                info("gpt-y", "AI.Models.gpt-y"),
                info("gpt-z", "AI.Models.gpt-z"),
            ])
            .await;
        assert_eq!(catalog.offered().await, vec!["gpt-y"]);
        assert_eq!(catalog.resolve_id("gpt-y").await, "AI.Models.gpt-y");
        assert_eq!(catalog.resolve_id("gpt-x").await, "gpt-x");
        // discovery never widens validation
        assert!(catalog.validate("gpt-z").is_err());
    }

    #[tokio::test]
    async fn empty_refresh_keeps_previous_list() {
        let catalog = ModelCatalog::new(vec![], false, "d");
        catalog.refresh(vec![info("b", "id-b"), info("a", "id-a")]).await;
        catalog.refresh(vec![]).await;
        assert_eq!(catalog.offered().await, vec!["a", "b"]);
    }
}
