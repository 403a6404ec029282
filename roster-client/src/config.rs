//! Directory configuration
//!
//! Every component receives its configuration explicitly at construction;
//! nothing here is process-global.

use serde::{Deserialize, Serialize};

/// How the identifier counter is advanced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStrategy {
    /// Compare-and-swap on the counter version, retried on conflict
    #[default]
    Conditional,
    /// Plain read followed by a blind write. Concurrent callers may receive
    /// the same identifier.
    Unconditional,
}

/// Blob host (image upload) configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobHostConfig {
    /// Upload endpoint; derived from `cloud_name` when unset
    pub endpoint: Option<String>,
    pub cloud_name: String,
    pub upload_preset: String,
    /// Destination folder on the host
    pub folder: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl BlobHostConfig {
    pub fn new(cloud_name: impl Into<String>, upload_preset: impl Into<String>) -> Self {
        Self {
            cloud_name: cloud_name.into(),
            upload_preset: upload_preset.into(),
            ..Self::default()
        }
    }

    /// Override the upload endpoint (e.g. a local test server)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = folder.into();
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_secs = seconds;
        self
    }

    /// Resolved upload URL
    pub fn upload_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!(
                "https://api.cloudinary.com/v1_1/{}/image/upload",
                self.cloud_name
            ),
        }
    }
}

impl Default for BlobHostConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            cloud_name: String::new(),
            upload_preset: "members".to_string(),
            folder: "urail/members".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Directory configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Collection path holding member documents
    pub members_collection: String,
    /// Document path of the shared sequence counter
    pub counter_path: String,
    /// Prefix of allocated identifiers
    pub identifier_prefix: String,
    /// Minimum zero-padded width of the numeric part
    pub identifier_width: usize,
    pub allocation_strategy: AllocationStrategy,
    /// Upper bound on compare-and-swap attempts per allocation
    pub max_allocation_attempts: u32,
    /// Acting user stamped as `userId` on every write
    pub owner_id: Option<String>,
    /// Root under which per-user role documents live
    pub roles_root: String,
    pub blob: BlobHostConfig,
}

impl DirectoryConfig {
    pub fn new(members_collection: impl Into<String>) -> Self {
        Self {
            members_collection: members_collection.into(),
            ..Self::default()
        }
    }

    pub fn with_counter_path(mut self, path: impl Into<String>) -> Self {
        self.counter_path = path.into();
        self
    }

    pub fn with_identifier_format(mut self, prefix: impl Into<String>, width: usize) -> Self {
        self.identifier_prefix = prefix.into();
        self.identifier_width = width;
        self
    }

    pub fn with_allocation_strategy(mut self, strategy: AllocationStrategy) -> Self {
        self.allocation_strategy = strategy;
        self
    }

    pub fn with_max_allocation_attempts(mut self, attempts: u32) -> Self {
        self.max_allocation_attempts = attempts;
        self
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_roles_root(mut self, root: impl Into<String>) -> Self {
        self.roles_root = root.into();
        self
    }

    pub fn with_blob_host(mut self, blob: BlobHostConfig) -> Self {
        self.blob = blob;
        self
    }

    /// Document path of a user's role record
    pub fn role_path(&self, user_id: &str) -> String {
        format!(
            "{}/{}/roles/userRole",
            self.roles_root.trim_end_matches('/'),
            user_id
        )
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            members_collection: "artifacts/st-uriel-portal/members".to_string(),
            counter_path: "artifacts/st-uriel-portal/system/memberIdSequence".to_string(),
            identifier_prefix: "UR".to_string(),
            identifier_width: 4,
            allocation_strategy: AllocationStrategy::Conditional,
            max_allocation_attempts: 16,
            owner_id: None,
            roles_root: "artifacts/st-uriel-portal/users".to_string(),
            blob: BlobHostConfig::default(),
        }
    }
}
