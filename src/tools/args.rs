/// Typed access to the loosely-typed arguments of a tool request
use serde_json::{Map, Value};

use super::error::ToolError;

/// Arguments of a tool request: every key of the request object except `tool_name`
#[derive(Debug, Clone, Default)]
pub struct ToolArgs(Map<String, Value>);

impl ToolArgs {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// A non-empty string argument
    pub fn required_str(&self, name: &'static str) -> Result<String, ToolError> {
        match self.0.get(name) {
            Some(Value::String(value)) if !value.trim().is_empty() => {
                Ok(value.trim().to_string())
            }
            _ => Err(ToolError::MissingArgument(name)),
        }
    }

    /// An integer argument greater than zero, `default` when absent
    pub fn positive_int(&self, name: &'static str, default: i64) -> Result<i64, ToolError> {
        let value = self.int_or(name, default, "a positive integer")?;
        if value <= 0 {
            return Err(ToolError::InvalidArgument {
                name,
                expected: "a positive integer",
            });
        }
        Ok(value)
    }

    /// An integer argument of zero or more, `default` when absent
    pub fn non_negative_int(&self, name: &'static str, default: i64) -> Result<i64, ToolError> {
        let value = self.int_or(name, default, "a non-negative integer")?;
        if value < 0 {
            return Err(ToolError::InvalidArgument {
                name,
                expected: "a non-negative integer",
            });
        }
        Ok(value)
    }

    /// Replica count that fits the API's 32-bit field
    pub fn replicas(&self, default: i32, allow_zero: bool) -> Result<i32, ToolError> {
        let value = if allow_zero {
            self.non_negative_int("replicas", i64::from(default))?
        } else {
            self.positive_int("replicas", i64::from(default))?
        };
        i32::try_from(value).map_err(|_| ToolError::InvalidArgument {
            name: "replicas",
            expected: "at most 2147483647",
        })
    }

    /// Port to expose: `default` when absent, `None` when explicitly null or zero
    pub fn optional_port(
        &self,
        name: &'static str,
        default: u16,
    ) -> Result<Option<u16>, ToolError> {
        let invalid = ToolError::InvalidArgument {
            name,
            expected: "an integer between 1 and 65535",
        };
        match self.0.get(name) {
            None => Ok(Some(default)),
            Some(Value::Null) => Ok(None),
            Some(value) => match value.as_i64() {
                Some(0) => Ok(None),
                Some(port) => u16::try_from(port).map(Some).map_err(|_| invalid),
                None => Err(invalid),
            },
        }
    }

    fn int_or(
        &self,
        name: &'static str,
        default: i64,
        expected: &'static str,
    ) -> Result<i64, ToolError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(default),
            Some(value) => value
                .as_i64()
                .ok_or(ToolError::InvalidArgument { name, expected }),
        }
    }
}
