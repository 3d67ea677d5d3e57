/// Errors raised while parsing, validating or running a tool request
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("'input' must be a dictionary.")]
    NotAnObject,

    #[error("could not parse tool request: {0}")]
    Malformed(String),

    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("'{0}' is required and must be a non-empty string.")]
    MissingArgument(&'static str),

    #[error("'{name}' must be {expected}.")]
    InvalidArgument {
        name: &'static str,
        expected: &'static str,
    },

    #[error("deployment '{0}' has no containers")]
    NoContainers(String),

    #[error("{action}: {source}")]
    Cluster {
        action: &'static str,
        #[source]
        source: kube::Error,
    },
}

impl ToolError {
    /// Adapter for `map_err` on cluster calls
    pub fn cluster(action: &'static str) -> impl FnOnce(kube::Error) -> Self {
        move |source| Self::Cluster { action, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            ToolError::MissingArgument("app_name").to_string(),
            "'app_name' is required and must be a non-empty string."
        );
        assert_eq!(
            ToolError::InvalidArgument {
                name: "tail_lines",
                expected: "a positive integer",
            }
            .to_string(),
            "'tail_lines' must be a positive integer."
        );
        assert_eq!(
            ToolError::NotAnObject.to_string(),
            "'input' must be a dictionary."
        );
    }
}
