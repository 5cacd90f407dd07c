use thiserror::Error;

use crate::ports::store::StoreError;

/// Fatal errors of a synthesis run. Any of these aborts the run; no partial
/// document is ever returned.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SynthesisError {
    /// A store query or row scan failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Two server profiles disagree on a delivery-service parameter
    #[error(
        "profiles {profile} and {other_profile} have conflicting values '{value}' and '{other_value}' for parameter {parameter}"
    )]
    ParameterConflict {
        parameter: String,
        profile: String,
        value: String,
        other_profile: String,
        other_value: String,
    },

    /// Relational state for a delivery service is internally inconsistent
    #[error("decoding delivery service '{xml_id}': {reason}")]
    Decode { xml_id: String, reason: String },
}

impl SynthesisError {
    pub fn decode(xml_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            xml_id: xml_id.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for synthesis operations
pub type SynthesisResult<T> = Result<T, SynthesisError>;
