use serde::{Deserialize, Serialize};

/// A non-fatal warning from a provider, e.g. an unsupported setting that
/// was silently ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CallWarning {
    /// A call setting is not supported by this model.
    #[serde(rename_all = "camelCase")]
    UnsupportedSetting {
        /// The name of the unsupported setting.
        setting: String,
        /// Optional details about the limitation.
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },

    /// Any other warning.
    Other {
        /// The warning message.
        message: String,
    },
}

impl CallWarning {
    /// Creates an unsupported-setting warning.
    pub fn unsupported_setting(setting: impl Into<String>) -> Self {
        Self::UnsupportedSetting {
            setting: setting.into(),
            details: None,
        }
    }

    /// Creates an unsupported-setting warning with details.
    pub fn unsupported_setting_with_details(
        setting: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::UnsupportedSetting {
            setting: setting.into(),
            details: Some(details.into()),
        }
    }

    /// Creates a free-form warning.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}
