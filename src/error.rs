use std::fmt;

#[derive(Debug)]
pub enum CvPdfError {
    InvalidConfiguration(String),
    Surface(String),
    Snapshot(String),
    Image(String),
    Pdf(String),
    Locale(String),
    Io(std::io::Error),
}

impl fmt::Display for CvPdfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CvPdfError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            CvPdfError::Surface(message) => write!(f, "render surface error: {}", message),
            CvPdfError::Snapshot(message) => write!(f, "geometry snapshot error: {}", message),
            CvPdfError::Image(message) => write!(f, "page image error: {}", message),
            CvPdfError::Pdf(message) => write!(f, "pdf error: {}", message),
            CvPdfError::Locale(message) => write!(f, "locale error: {}", message),
            CvPdfError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for CvPdfError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CvPdfError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CvPdfError {
    fn from(value: std::io::Error) -> Self {
        CvPdfError::Io(value)
    }
}

impl From<lopdf::Error> for CvPdfError {
    fn from(value: lopdf::Error) -> Self {
        CvPdfError::Pdf(value.to_string())
    }
}

impl From<image::ImageError> for CvPdfError {
    fn from(value: image::ImageError) -> Self {
        CvPdfError::Image(value.to_string())
    }
}
