use lineage_core_types::{RequestContext, RequestId, TraceId};
use thiserror::Error;

use crate::model::ModuleState;
use crate::validation::ValidationError;

/// Result type alias using LineageError.
pub type Result<T> = std::result::Result<T, LineageError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy.
///
/// Each kind maps to a stable `ERR_*` code that callers can branch on
/// without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Input
    InvalidInput,
    InvalidLineageCode,
    UnknownObjectType,
    NotFound,

    // Lifecycle
    InvalidTransition,
    Conflict,
    ModuleClosed,
    ValidationFailed,

    // Timeline integrity
    NonMonotonicVersion,

    // Relations
    InvalidPeerType,

    // Integration/IO
    StorageFailure,
    Serialization,
    Config,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::InvalidLineageCode => "ERR_INVALID_LINEAGE_CODE",
            ExErrorKind::UnknownObjectType => "ERR_UNKNOWN_OBJECT_TYPE",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::InvalidTransition => "ERR_INVALID_TRANSITION",
            ExErrorKind::Conflict => "ERR_CONFLICT",
            ExErrorKind::ModuleClosed => "ERR_MODULE_CLOSED",
            ExErrorKind::ValidationFailed => "ERR_VALIDATION_FAILED",
            ExErrorKind::NonMonotonicVersion => "ERR_NON_MONOTONIC_VERSION",
            ExErrorKind::InvalidPeerType => "ERR_INVALID_PEER_TYPE",
            ExErrorKind::StorageFailure => "ERR_STORAGE_FAILURE",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Config => "ERR_CONFIG",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type.
///
/// Carries the classification plus whatever context the failing layer knew:
/// the operation, the lineage or module involved, correlation ids and, for
/// `ValidationFailed`, the blocking validation errors.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_id: Option<String>,
    module_id: Option<i64>,
    request_id: Option<RequestId>,
    trace_id: Option<TraceId>,
    message: String,
    validation_errors: Option<Vec<ValidationError>>,
}

impl ExError {
    /// Create a new error with the specified kind.
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_id: None,
            module_id: None,
            request_id: None,
            trace_id: None,
            message: String::new(),
            validation_errors: None,
        }
    }

    /// Add operation context.
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity (lineage code) context.
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add module context.
    pub fn with_module_id(mut self, module_id: i64) -> Self {
        self.module_id = Some(module_id);
        self
    }

    /// Add correlation ids from a request context.
    pub fn with_context(mut self, ctx: &RequestContext) -> Self {
        self.request_id = Some(ctx.request_id.clone());
        self.trace_id = ctx.trace_id.clone();
        self
    }

    /// Add custom message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attach the validation errors that blocked an operation.
    pub fn with_validation_errors(mut self, errors: Vec<ValidationError>) -> Self {
        self.validation_errors = Some(errors);
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code.
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn module_id(&self) -> Option<i64> {
        self.module_id
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn trace_id(&self) -> Option<&TraceId> {
        self.trace_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Validation errors, populated on `ValidationFailed`.
    pub fn validation_errors(&self) -> &[ValidationError] {
        self.validation_errors.as_deref().unwrap_or(&[])
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (lineage: {})", entity_id)?;
        }
        if let Some(module_id) = self.module_id {
            write!(f, " (module: {})", module_id)?;
        }
        if let Some(errors) = &self.validation_errors {
            write!(f, " ({} validation errors)", errors.len())?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Domain error taxonomy for the pure lineage algorithms.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LineageError {
    // ===== Identifier Errors =====
    #[error("Invalid lineage code '{code}': {reason}")]
    InvalidLineageCode { code: String, reason: String },

    #[error("Unknown object type: {object_type}")]
    UnknownObjectType { object_type: String },

    // ===== Lifecycle Errors =====
    #[error("Module not found: {module_id}")]
    ModuleNotFound { module_id: i64 },

    #[error("Module {module_id} cannot move from {from} to {to}")]
    InvalidTransition {
        module_id: i64,
        from: ModuleState,
        to: ModuleState,
    },

    /// Another writer changed the module first.
    #[error("Module {module_id} was changed concurrently: {reason}")]
    TransitionConflict { module_id: i64, reason: String },

    #[error("Module {module_id} is {state} and no longer accepts edits")]
    ModuleClosed { module_id: i64, state: ModuleState },

    #[error("Module {module_id} failed validation with {} blocking errors", errors.len())]
    ValidationFailed {
        module_id: i64,
        errors: Vec<ValidationError>,
    },

    // ===== Timeline Errors =====
    #[error("Version for {code} in module {module_id} is older than the latest stored version ({latest} > {attempted})")]
    NonMonotonicVersion {
        code: String,
        module_id: i64,
        latest: String,
        attempted: String,
    },

    #[error("Invalid payload for {code}: {reason}")]
    InvalidPayload { code: String, reason: String },

    #[error("No version of {code} exists to derive from")]
    NothingToDerive { code: String, module_id: i64 },

    // ===== Relation Errors =====
    #[error("Relation from {code} to {peer}: object type {peer_type} is not an allowed peer")]
    InvalidPeerType {
        code: String,
        peer: String,
        peer_type: String,
    },

    #[error("Lineage {code} cannot be related to itself")]
    SelfRelation { code: String },

    #[error("Peer {peer} listed more than once for {code}")]
    DuplicatePeer { code: String, peer: String },

    // ===== Generic Errors =====
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<LineageError> for ExError {
    fn from(err: LineageError) -> Self {
        let message = err.to_string();
        match err {
            LineageError::InvalidLineageCode { code, .. } => {
                ExError::new(ExErrorKind::InvalidLineageCode)
                    .with_entity_id(code)
                    .with_message(message)
            }

            LineageError::UnknownObjectType { .. } => {
                ExError::new(ExErrorKind::UnknownObjectType).with_message(message)
            }

            LineageError::ModuleNotFound { module_id } => ExError::new(ExErrorKind::NotFound)
                .with_module_id(module_id)
                .with_message(message),

            LineageError::InvalidTransition { module_id, .. } => {
                ExError::new(ExErrorKind::InvalidTransition)
                    .with_op("transition")
                    .with_module_id(module_id)
                    .with_message(message)
            }

            LineageError::TransitionConflict { module_id, .. } => {
                ExError::new(ExErrorKind::Conflict)
                    .with_op("transition")
                    .with_module_id(module_id)
                    .with_message(message)
            }

            LineageError::ModuleClosed { module_id, .. } => {
                ExError::new(ExErrorKind::ModuleClosed)
                    .with_module_id(module_id)
                    .with_message(message)
            }

            LineageError::ValidationFailed { module_id, errors } => {
                ExError::new(ExErrorKind::ValidationFailed)
                    .with_op("transition")
                    .with_module_id(module_id)
                    .with_message(message)
                    .with_validation_errors(errors)
            }

            LineageError::NonMonotonicVersion {
                code, module_id, ..
            } => ExError::new(ExErrorKind::NonMonotonicVersion)
                .with_entity_id(code)
                .with_module_id(module_id)
                .with_message(message),

            LineageError::InvalidPayload { code, .. } => ExError::new(ExErrorKind::InvalidInput)
                .with_entity_id(code)
                .with_message(message),

            LineageError::NothingToDerive { code, module_id } => {
                ExError::new(ExErrorKind::NotFound)
                    .with_entity_id(code)
                    .with_module_id(module_id)
                    .with_message(message)
            }

            LineageError::InvalidPeerType { code, .. } => {
                ExError::new(ExErrorKind::InvalidPeerType)
                    .with_op("overwrite_relations")
                    .with_entity_id(code)
                    .with_message(message)
            }

            LineageError::SelfRelation { code } | LineageError::DuplicatePeer { code, .. } => {
                ExError::new(ExErrorKind::InvalidInput)
                    .with_op("overwrite_relations")
                    .with_entity_id(code)
                    .with_message(message)
            }

            LineageError::Config { .. } => ExError::new(ExErrorKind::Config).with_message(message),

            LineageError::Serialization { .. } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            LineageError::Internal { .. } => {
                ExError::new(ExErrorKind::Internal).with_message(message)
            }
        }
    }
}

impl From<serde_json::Error> for LineageError {
    fn from(err: serde_json::Error) -> Self {
        LineageError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for LineageError {
    fn from(err: toml::de::Error) -> Self {
        LineageError::Config {
            message: err.to_string(),
        }
    }
}
