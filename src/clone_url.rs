//! Clone URL resolution
//!
//! When a hook is configured with clone type `http` or `ssh` the
//! advertised repository URL is derived from the server's clone bases
//! instead of the stored override.

use std::sync::{Arc, RwLock};

use crate::NotifyConfig;
use crate::error::NotifyError;
use crate::events::Repository;

/// Resolves the clone URLs a repository should be advertised under.
pub trait CloneUrlResolver: Send + Sync {
    /// The HTTP clone URL for the repository, with no username embedded.
    fn http_clone_url(&self, repository: &Repository) -> Result<String, NotifyError>;

    /// The SSH clone URL for the repository.
    ///
    /// Resolution runs with repository-read privilege regardless of the
    /// current actor's rights: the triggering user already proved push
    /// access, so the lookup itself must not fail on a more restricted
    /// effective permission.
    fn ssh_clone_url(&self, repository: &Repository) -> Result<String, NotifyError>;
}

/// Resolver backed by the `[server]` section of the service
/// configuration.
pub struct ConfigCloneUrlResolver {
    config: Arc<RwLock<NotifyConfig>>,
}

impl ConfigCloneUrlResolver {
    pub fn new(config: Arc<RwLock<NotifyConfig>>) -> Self {
        Self { config }
    }

    fn base(&self, pick: fn(&NotifyConfig) -> Option<String>, label: &str) -> Result<String, NotifyError> {
        let config = self.config.read().unwrap();
        pick(&config).ok_or_else(|| {
            NotifyError::CloneUrlResolution(format!("{} clone base is not configured", label))
        })
    }
}

impl CloneUrlResolver for ConfigCloneUrlResolver {
    fn http_clone_url(&self, repository: &Repository) -> Result<String, NotifyError> {
        let base = self.base(|c| c.server.http_clone_base.clone(), "HTTP")?;
        Ok(format!(
            "{}/scm/{}/{}.git",
            base.trim_end_matches('/'),
            repository.project.to_lowercase(),
            repository.slug.to_lowercase()
        ))
    }

    fn ssh_clone_url(&self, repository: &Repository) -> Result<String, NotifyError> {
        let base = self.base(|c| c.server.ssh_clone_base.clone(), "SSH")?;
        Ok(format!(
            "{}/{}/{}.git",
            base.trim_end_matches('/'),
            repository.project.to_lowercase(),
            repository.slug.to_lowercase()
        ))
    }
}
