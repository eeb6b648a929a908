pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Value rejected before anything is sent to the module
    #[error("Unsupported {setting} value {value} (accepted: {expected})")]
    UnsupportedValue {
        setting: crate::Setting,
        value: String,
        expected: &'static str,
    },

    #[error("Parse error: {0}")]
    Parse(String),
}
