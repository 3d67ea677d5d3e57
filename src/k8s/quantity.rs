/// Parsing of Kubernetes resource quantities ("250m", "128Mi", "1.5", "12e6")
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,

    #[error("invalid quantity {0:?}")]
    Invalid(String),

    #[error("unknown quantity suffix {suffix:?} in {quantity:?}")]
    UnknownSuffix { quantity: String, suffix: String },
}

/// Parse a quantity into its base unit (cores for CPU, bytes for memory)
pub fn parse(quantity: &str) -> Result<f64, QuantityError> {
    let quantity = quantity.trim();
    if quantity.is_empty() {
        return Err(QuantityError::Empty);
    }

    let split = quantity
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_alphabetic())
        .last()
        .map_or(quantity.len(), |(idx, _)| idx);
    let (number, suffix) = quantity.split_at(split);

    let multiplier = multiplier(suffix).ok_or_else(|| QuantityError::UnknownSuffix {
        quantity: quantity.to_string(),
        suffix: suffix.to_string(),
    })?;

    let value: f64 = number
        .parse()
        .map_err(|_| QuantityError::Invalid(quantity.to_string()))?;
    if !value.is_finite() || value < 0.0 {
        return Err(QuantityError::Invalid(quantity.to_string()));
    }

    Ok(value * multiplier)
}

/// CPU quantity in millicores
pub fn cpu_millicores(quantity: &str) -> Result<f64, QuantityError> {
    parse(quantity).map(|cores| cores * 1000.0)
}

/// Memory quantity in bytes
pub fn memory_bytes(quantity: &str) -> Result<f64, QuantityError> {
    parse(quantity)
}

/// Memory quantity in kibibytes
pub fn memory_ki(quantity: &str) -> Result<f64, QuantityError> {
    memory_bytes(quantity).map(|bytes| bytes / 1024.0)
}

/// Memory quantity in mebibytes
pub fn memory_mib(quantity: &str) -> Result<f64, QuantityError> {
    memory_bytes(quantity).map(|bytes| bytes / (1024.0 * 1024.0))
}

fn multiplier(suffix: &str) -> Option<f64> {
    let value = match suffix {
        "" => 1.0,
        "n" => 1e-9,
        "u" => 1e-6,
        "m" => 1e-3,
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        "Ki" => 1024.0,
        "Mi" => 1024f64.powi(2),
        "Gi" => 1024f64.powi(3),
        "Ti" => 1024f64.powi(4),
        "Pi" => 1024f64.powi(5),
        "Ei" => 1024f64.powi(6),
        _ => return None,
    };
    Some(value)
}
