use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

use crate::config::{DatasetKind, PropertyFilter};
use crate::core::classify::ClassificationTable;
use crate::utils::error::{FetcherError, Result};
use crate::utils::validation::validate_file_extension;

/// Optional TOML job description; environment variables take precedence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobFile {
    pub window_days: Option<u32>,
    pub zone: Option<ZoneSection>,
    pub dataset: Option<DatasetSection>,
    pub classification: Option<ClassificationTable>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneSection {
    pub name: Option<String>,
    pub polygon: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetSection {
    pub kind: Option<DatasetKind>,
    pub collection: Option<String>,
    pub band: Option<String>,
    pub scale: Option<f64>,
    pub filters: Option<Vec<PropertyFilter>>,
}

impl JobFile {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        validate_file_extension("config", &path.as_ref().to_string_lossy(), &["toml"])?;
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content, |name| std::env::var(name).ok());
        toml::from_str(&processed).map_err(|e| FetcherError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }
}

/// Replaces `${VAR}` references; unknown variables are left untouched.
pub fn substitute_env_vars<F>(content: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid pattern"));

    re.replace_all(content, |caps: &Captures| {
        let var_name = &caps[1];
        lookup(var_name).unwrap_or_else(|| format!("${{{}}}", var_name))
    })
    .into_owned()
}
