//! Config validation logic.
//! Verifies the buffer size, the charset label, and the endpoint root before
//! any store operation runs.

use anyhow::{Result, bail};
use tracing::{debug, error, info};

use crate::fs_ops::charset::lookup_charset;

use super::types::StoreConfig;

impl StoreConfig {
    /// Validate settings that would otherwise fail in the middle of a write.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            error!("buffer_size must be greater than zero");
            bail!("buffer_size must be greater than zero");
        }

        if let Some(label) = self.charset.as_deref() {
            let charset = lookup_charset(label)?;
            debug!(label, charset = charset.name(), "charset resolved");
        }

        if self.root.exists() && !self.root.is_dir() {
            error!("root exists but isn't a directory: {}", self.root.display());
            bail!("root exists but isn't a directory: {}", self.root.display());
        }
        if !self.root.exists() && !self.auto_create {
            error!("root does not exist and auto_create is off: {}", self.root.display());
            bail!(
                "root does not exist and auto_create is off: {}",
                self.root.display()
            );
        }

        info!(
            "Config validated: root='{}' policy={} buffer_size={}",
            self.root.display(),
            self.policy,
            self.buffer_size
        );
        Ok(())
    }
}
