//! Shared value types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::YangError;

/// Root node selection for generated and translated documents.
///
/// `Config` restricts trees to configuration nodes; `Data` also admits
/// operational state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    #[default]
    Config,
    Data,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Config => "config",
            DocumentType::Data => "data",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = YangError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "config" => Ok(DocumentType::Config),
            "data" => Ok(DocumentType::Data),
            other => Err(YangError::InvalidDoctype(other.to_string())),
        }
    }
}
