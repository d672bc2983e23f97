#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A stored or supplied value is outside what the domain allows.
    #[error("Validation failed: {0}")]
    Validation(String),
}
