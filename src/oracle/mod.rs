// ABOUTME: Validation oracle adapter — prompts, transport, and reply normalization.
// ABOUTME: Turns an intent plus a diff into a tagged alignment or vulnerability outcome.

pub mod prompt;
pub mod provider;
pub mod types;
pub mod validator;

pub use prompt::detect_language;
pub use provider::{Oracle, OracleError, OracleRequest, create_oracle, create_oracle_with};
pub use types::*;
pub use validator::IntentValidator;
