use std::fmt;

#[derive(Debug)]
pub struct CliError(pub String);

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for CliError {}

impl From<String> for CliError {
    fn from(s: String) -> Self {
        CliError(s)
    }
}

impl From<&str> for CliError {
    fn from(s: &str) -> Self {
        CliError(s.to_string())
    }
}

impl From<retain::RetainError> for CliError {
    fn from(e: retain::RetainError) -> Self {
        CliError(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError(format!("JSON error: {e}"))
    }
}

pub type CliResult<T> = Result<T, CliError>;

/// Parse a memory id argument
pub fn parse_id(raw: &str) -> CliResult<uuid::Uuid> {
    uuid::Uuid::parse_str(raw).map_err(|e| CliError(format!("Invalid UUID format: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
        assert!(parse_id("not-a-uuid").unwrap_err().0.starts_with("Invalid UUID"));
    }

    #[test]
    fn test_store_errors_keep_their_message() {
        let id = uuid::Uuid::new_v4();
        let err: CliError = retain::RetainError::memory_not_found(id).into();
        assert!(err.to_string().contains(&id.to_string()));
    }
}
