//! Workspace naming and key layout.
//!
//! Many logical workspaces share one bucket. Each is isolated by an extra
//! key-path segment under the configured prefix:
//!
//! | Object | Key |
//! |---|---|
//! | Default state | `{prefix}/{baseKey}` |
//! | Named state | `{prefix}/{workspace}/{baseKey}` |
//! | Lock file | `{stateKey}.lock` |
//!
//! The default workspace always exists implicitly. Other workspaces exist
//! when at least one object lives under their segment.


use crate::error::{Result, StateError};
use crate::store::ObjectStoreClient;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Name of the implicit workspace.
pub const DEFAULT_WORKSPACE: &str = "default";

/// Suffix appended to a state key to form its lock-file key.
pub const LOCK_SUFFIX: &str = ".lock";

/// Maps workspace names to object keys and enumerates workspaces.
#[derive(Clone)]
pub struct WorkspacePathResolver {
    client: Arc<dyn ObjectStoreClient>,
    prefix: String,
    base_key: String,
    page_size: usize,
}

impl WorkspacePathResolver {
    pub fn new(
        client: Arc<dyn ObjectStoreClient>,
        prefix: &str,
        base_key: &str,
        page_size: usize,
    ) -> Self {
        Self {
            client,
            prefix: prefix.to_string(),
            base_key: base_key.to_string(),
            page_size: page_size.max(1),
        }
    }

    /// Reject names that cannot round-trip through a key.
    pub fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(StateError::UserError("missing state name".to_string()));
        }
        if name.contains('/') {
            return Err(StateError::UserError(format!(
                "invalid workspace name '{}': must not contain '/'",
                name
            )));
        }
        Ok(())
    }

    /// Key prefix under which every workspace object lives (`{prefix}/`).
    fn listing_prefix(&self) -> String {
        if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", self.prefix)
        }
    }

    /// State-object key for workspace `name`.
    pub fn key_for(&self, name: &str) -> String {
        let prefix = self.listing_prefix();
        if name == DEFAULT_WORKSPACE {
            format!("{}{}", prefix, self.base_key)
        } else {
            format!("{}{}/{}", prefix, name, self.base_key)
        }
    }

    /// Lock-file key for workspace `name`.
    pub fn lock_key_for(&self, name: &str) -> String {
        format!("{}{}", self.key_for(name), LOCK_SUFFIX)
    }

    /// Workspace a key belongs to, or `None` for the default workspace's own
    /// objects and for keys outside the prefix.
    pub fn parse_workspace(&self, key: &str) -> Option<String> {
        let remainder = key.strip_prefix(&self.listing_prefix())?;

        if remainder == self.base_key
            || remainder
                .strip_suffix(LOCK_SUFFIX)
                .is_some_and(|stem| stem == self.base_key)
        {
            return None;
        }

        remainder
            .split('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
    }

    /// All workspaces: the default first, then the rest sorted and deduplicated.
    pub fn list(&self) -> Result<Vec<String>> {
        let prefix = self.listing_prefix();
        let mut names = BTreeSet::new();
        let mut token: Option<String> = None;

        loop {
            let page = self
                .client
                .list_by_prefix(&prefix, token.as_deref(), self.page_size)
                .map_err(|source| StateError::Store {
                    action: "list",
                    key: prefix.clone(),
                    source,
                })?;

            if page.entries.is_empty() {
                break;
            }

            for entry in &page.entries {
                if let Some(name) = self.parse_workspace(&entry.key)
                    && name != DEFAULT_WORKSPACE
                {
                    names.insert(name);
                }
            }

            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        debug!(count = names.len(), "listed workspaces");

        let mut workspaces = Vec::with_capacity(names.len() + 1);
        workspaces.push(DEFAULT_WORKSPACE.to_string());
        workspaces.extend(names);
        Ok(workspaces)
    }
}
