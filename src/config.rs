//! Engine configuration
//!
//! Limits for query options and link registration. Defaults follow the
//! unit-wide configuration of the production deployment this engine serves.

/// Maximum value accepted for `$top` when `$expand` is absent.
pub const DEFAULT_TOP_MAX: i64 = 10_000;

/// Maximum value accepted for `$top` once `$expand` is present.
pub const DEFAULT_TOP_MAX_WITH_EXPAND: i64 = 100;

/// Maximum value accepted for `$skip`.
pub const DEFAULT_SKIP_MAX: i64 = 100_000;

/// Maximum number of navigation properties in `$expand` on a list request.
pub const DEFAULT_EXPAND_MAX_FOR_LIST: usize = 100;

/// Maximum number of navigation properties in `$expand` on a single retrieve.
pub const DEFAULT_EXPAND_MAX_FOR_RETRIEVE: usize = 1_000;

/// Maximum number of links a single anchor may hold in an N:N association.
pub const DEFAULT_NN_LINK_MAX: usize = 10_000;

/// Engine-wide limits and policies.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// `$top` ceiling without `$expand`
    pub top_max: i64,
    /// `$top` ceiling with `$expand`
    pub top_max_with_expand: i64,
    /// `$skip` ceiling
    pub skip_max: i64,
    /// `$expand` navigation count ceiling for list requests
    pub expand_max_for_list: usize,
    /// `$expand` navigation count ceiling for single retrieves
    pub expand_max_for_retrieve: usize,
    /// per-anchor link ceiling when both association ends are `Many`
    pub nn_link_max: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            top_max: DEFAULT_TOP_MAX,
            top_max_with_expand: DEFAULT_TOP_MAX_WITH_EXPAND,
            skip_max: DEFAULT_SKIP_MAX,
            expand_max_for_list: DEFAULT_EXPAND_MAX_FOR_LIST,
            expand_max_for_retrieve: DEFAULT_EXPAND_MAX_FOR_RETRIEVE,
            nn_link_max: DEFAULT_NN_LINK_MAX,
        }
    }
}

impl EngineConfig {
    /// Create a config with the production defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `$top` ceiling used when `$expand` is absent
    pub fn with_top_max(mut self, max: i64) -> Self {
        self.top_max = max;
        self
    }

    /// Set the `$top` ceiling used when `$expand` is present
    pub fn with_top_max_with_expand(mut self, max: i64) -> Self {
        self.top_max_with_expand = max;
        self
    }

    /// Set the `$skip` ceiling
    pub fn with_skip_max(mut self, max: i64) -> Self {
        self.skip_max = max;
        self
    }

    /// Set the `$expand` navigation count ceiling for list requests
    pub fn with_expand_max_for_list(mut self, max: usize) -> Self {
        self.expand_max_for_list = max;
        self
    }

    /// Set the N:N per-anchor link ceiling
    pub fn with_nn_link_max(mut self, max: usize) -> Self {
        self.nn_link_max = max;
        self
    }
}
