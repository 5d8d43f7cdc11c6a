use thiserror::Error;

#[derive(Error, Debug)]
pub enum CapmError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Policy manager API error: {0}")]
    ApiError(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Interactive prompt error: {0}")]
    DialoguerError(#[from] dialoguer::Error),

    #[error("Not connected. Run 'capm connect' or configure [credentials] first")]
    NotConnected,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, CapmError>;

pub use CapmError as Error;

/// Turn a backend error body into a readable message with a hint
pub fn enhance_api_error(status: u16, error_response: &str) -> String {
    // The backend answers with {"success": false, "error": "..."}
    let message = serde_json::from_str::<serde_json::Value>(error_response)
        .ok()
        .and_then(|body| body.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| error_response.trim().to_string());

    let hint = match status {
        401 => "\n💡 Hint: The backend session is not connected. Run 'capm connect' first.",
        403 => {
            "\n💡 Hint: The app registration needs Policy.Read.All and Policy.ReadWrite.ConditionalAccess with admin consent."
        }
        404 => "\n💡 Hint: The policy no longer exists. Refresh the list and try again.",
        409 => "\n💡 Hint: A policy with this name already exists. Delete it or rename the template.",
        429 => "\n💡 Hint: Rate limit exceeded. Wait a moment and try again.",
        _ => "",
    };

    if message.is_empty() {
        format!("HTTP {}{}", status, hint)
    } else {
        format!("{}{}", message, hint)
    }
}
