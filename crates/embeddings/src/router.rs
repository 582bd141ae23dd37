//! Embedding router: selects the embedding profile for a context type.
//!
//! Handles embedder creation from configuration and routing by type.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tof_config::EmbeddingConfig;
use tof_core::context::ContextType;
use tof_core::embedding::Embedder;
use tof_core::error::{Error, Result};
use tracing::{debug, warn};

use crate::hashing::HashingEmbedder;
use crate::openai_compat::OpenAiCompatEmbedder;

/// One embedding space and the context types it serves.
#[derive(Clone)]
pub struct EmbeddingProfile {
    pub name: String,
    pub embedder: Arc<dyn Embedder>,
    pub context_types: Vec<ContextType>,
}

/// Routes context types to embedding profiles.
pub struct EmbeddingRouter {
    profiles: Vec<EmbeddingProfile>,
    by_type: HashMap<ContextType, usize>,
    fallback: usize,
}

impl EmbeddingRouter {
    /// Create a router whose only profile serves every context type.
    pub fn single(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            profiles: vec![EmbeddingProfile {
                name: embedder.model_id().to_string(),
                embedder,
                context_types: Vec::new(),
            }],
            by_type: HashMap::new(),
            fallback: 0,
        }
    }

    /// Create a router from profiles, using the one named `fallback` for
    /// types no profile claims.
    ///
    /// When two profiles claim a type, the first one wins.
    pub fn new(profiles: Vec<EmbeddingProfile>, fallback: &str) -> Result<Self> {
        let fallback = profiles
            .iter()
            .position(|p| p.name == fallback)
            .ok_or_else(|| Error::Config {
                message: format!("fallback embedding profile '{fallback}' is not defined"),
            })?;

        let mut by_type = HashMap::new();
        for (i, profile) in profiles.iter().enumerate() {
            for t in &profile.context_types {
                by_type.entry(*t).or_insert(i);
            }
        }

        Ok(Self {
            profiles,
            by_type,
            fallback,
        })
    }

    /// The profile serving a context type.
    pub fn profile_for(&self, context_type: ContextType) -> &EmbeddingProfile {
        let i = self.by_type.get(&context_type).copied().unwrap_or(self.fallback);
        &self.profiles[i]
    }

    /// The embedder serving a context type.
    pub fn embedder_for(&self, context_type: ContextType) -> Arc<dyn Embedder> {
        self.profile_for(context_type).embedder.clone()
    }

    pub fn profiles(&self) -> &[EmbeddingProfile] {
        &self.profiles
    }
}

/// Build the embedding router from configuration.
pub fn build_from_config(config: &EmbeddingConfig) -> Result<EmbeddingRouter> {
    let timeout = Duration::from_secs(config.timeout_secs);

    if config.provider == "openai" && config.api_key.is_none() {
        warn!("No embedding API key configured; requests will likely be rejected");
    }

    let mut profiles = Vec::with_capacity(config.profiles.len());
    for profile in &config.profiles {
        let embedder: Arc<dyn Embedder> = match config.provider.as_str() {
            "hashing" => Arc::new(HashingEmbedder::new(&profile.name, profile.dimensions)),
            "openai" => Arc::new(OpenAiCompatEmbedder::new(
                &profile.name,
                &profile.model,
                profile.dimensions,
                &config.base_url,
                config.api_key.clone().unwrap_or_default(),
                timeout,
            )),
            other => {
                return Err(Error::Config {
                    message: format!("unknown embedding provider '{other}'"),
                });
            }
        };
        debug!(
            profile = %profile.name,
            dimensions = profile.dimensions,
            provider = %config.provider,
            "Embedding profile ready"
        );
        profiles.push(EmbeddingProfile {
            name: profile.name.clone(),
            embedder,
            context_types: profile.context_types.clone(),
        });
    }

    EmbeddingRouter::new(profiles, &config.fallback_profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profiles_route_by_type() {
        let router = build_from_config(&EmbeddingConfig::default()).unwrap();

        assert_eq!(router.profile_for(ContextType::Test).name, "test-context");
        assert_eq!(router.embedder_for(ContextType::Test).dimensions(), 384);
        for t in [ContextType::Feeling, ContextType::Participant, ContextType::Emotion] {
            let p = router.profile_for(t);
            assert_eq!(p.name, "sentiment-context");
            assert_eq!(p.embedder.dimensions(), 768);
        }
        for t in [
            ContextType::Tool,
            ContextType::System,
            ContextType::Memory,
            ContextType::Intention,
            ContextType::Learning,
            ContextType::Conversation,
        ] {
            assert_eq!(router.profile_for(t).name, "general-context");
        }
    }

    #[test]
    fn embedder_identity_is_profile_name() {
        let router = build_from_config(&EmbeddingConfig::default()).unwrap();
        assert_eq!(router.embedder_for(ContextType::Emotion).model_id(), "sentiment-context");
    }

    #[test]
    fn missing_fallback_is_config_error() {
        let mut config = EmbeddingConfig::default();
        config.fallback_profile = "nope".into();
        assert!(matches!(build_from_config(&config), Err(Error::Config { .. })));
    }

    #[test]
    fn unknown_provider_is_config_error() {
        let mut config = EmbeddingConfig::default();
        config.provider = "carrier-pigeon".into();
        assert!(matches!(build_from_config(&config), Err(Error::Config { .. })));
    }

    #[test]
    fn single_router_serves_everything() {
        let router = EmbeddingRouter::single(Arc::new(HashingEmbedder::new("only", 8)));
        for t in ContextType::ALL {
            assert_eq!(router.profile_for(t).name, "only");
        }
    }
}
