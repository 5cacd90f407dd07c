pub mod decoder;
pub mod diagnostics;
pub mod error;
pub mod matchsets;
pub mod model;
pub mod params;
pub mod static_dns;
pub mod synthesizer;

pub use diagnostics::{Diagnostic, DiagnosticLevel, Diagnostics};
pub use error::{SynthesisError, SynthesisResult};
pub use model::CrConfigDocument;
pub use synthesizer::{CrConfigSynthesizer, SynthesisReport};
