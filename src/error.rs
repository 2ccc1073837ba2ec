use std::fmt;

#[derive(Debug)]
pub enum LcAuditError {
    InvalidConfiguration(String),
    InvalidSelector(String),
    InvalidStyleValue { property: String, value: String },
    NonFiniteContrast(String),
    Json(serde_json::Error),
    Io(std::io::Error),
}

impl fmt::Display for LcAuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LcAuditError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            LcAuditError::InvalidSelector(selector) => {
                write!(f, "invalid selector: {}", selector)
            }
            LcAuditError::InvalidStyleValue { property, value } => {
                write!(f, "computed {} value {:?} is not usable", property, value)
            }
            LcAuditError::NonFiniteContrast(message) => {
                write!(f, "contrast calculation produced a non-finite value: {}", message)
            }
            LcAuditError::Json(err) => write!(f, "json error: {}", err),
            LcAuditError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for LcAuditError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LcAuditError::Io(err) => Some(err),
            LcAuditError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LcAuditError {
    fn from(value: std::io::Error) -> Self {
        LcAuditError::Io(value)
    }
}

impl From<serde_json::Error> for LcAuditError {
    fn from(value: serde_json::Error) -> Self {
        LcAuditError::Json(value)
    }
}
