//! Engine settings.

use serde::{Deserialize, Serialize};

use crate::assemble::SubjectLabels;
use crate::privacy::PrivacyConfig;
use crate::recurrence::DEFAULT_RECURRENCE_LIMIT;

fn default_recurrence_limit() -> u16 {
    DEFAULT_RECURRENCE_LIMIT
}

/// Settings for [`crate::engine::ReplyEngine`]. Every field has a default,
/// so an empty table is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub privacy: PrivacyConfig,

    #[serde(default)]
    pub subjects: SubjectLabels,

    /// Maximum occurrences materialized when resolving one occurrence
    #[serde(default = "default_recurrence_limit")]
    pub recurrence_limit: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            privacy: PrivacyConfig::default(),
            subjects: SubjectLabels::default(),
            recurrence_limit: DEFAULT_RECURRENCE_LIMIT,
        }
    }
}
