use std::fmt;

#[derive(Debug)]
pub enum CouponSheetError {
    InvalidConfiguration(String),
    Font(String),
    Io(std::io::Error),
    /// The one failure a render call reports; `source` is what actually broke.
    Rendering {
        message: String,
        source: Box<CouponSheetError>,
    },
}

impl CouponSheetError {
    pub(crate) fn rendering(message: impl Into<String>, source: CouponSheetError) -> Self {
        CouponSheetError::Rendering {
            message: message.into(),
            source: Box::new(source),
        }
    }
}

impl fmt::Display for CouponSheetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CouponSheetError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            CouponSheetError::Font(message) => write!(f, "font error: {}", message),
            CouponSheetError::Io(err) => write!(f, "io error: {}", err),
            CouponSheetError::Rendering { message, source } => {
                write!(f, "rendering failed: {}: {}", message, source)
            }
        }
    }
}

impl std::error::Error for CouponSheetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CouponSheetError::Io(err) => Some(err),
            CouponSheetError::Rendering { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CouponSheetError {
    fn from(value: std::io::Error) -> Self {
        CouponSheetError::Io(value)
    }
}
