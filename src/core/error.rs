use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,   // Registry wiring, detected at startup
    Routing,         // Unknown collection or index at call time
    Identity,        // Missing or invalid _id / parent foreign key
    IndexedField,    // Non-string or missing-but-required indexed value
    Expression,      // Malformed condition or filter
    UpdateSpec,      // Empty or structurally invalid update
    Conflict,        // Uniqueness or condition violation reported by the backend
    NotFound,
    Range,           // Unsupported range request
    InvalidArgument,
    ConditionFailed, // Raw conditional-check failure from a backend
    Backend,
    Serialization,
    Internal,        // Backend response inconsistent with the registered layout
}

#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
    /// Location inside a structured input (condition tree, update spec) that
    /// triggered the error, e.g. `$and[1].price.$in`.
    pub path: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context, path: None }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn configuration(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Configuration, context.into())
    }

    pub fn routing(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Routing, context.into())
    }

    pub fn identity(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Identity, context.into())
    }

    pub fn indexed_field(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::IndexedField, context.into())
    }

    pub fn expression(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Expression, context.into())
    }

    pub fn update_spec(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::UpdateSpec, context.into())
    }

    pub fn internal(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Internal, context.into())
    }

    pub fn backend(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Backend, context.into())
    }

    pub fn invalid_argument(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidArgument, context.into())
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{:?} at {}: {}", self.kind, path, self.context),
            None => write!(f, "{:?}: {}", self.kind, self.context),
        }
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::Serialization,
            context: err.to_string(),
            path: None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
