use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Errors fall into two groups. Synthesis errors are raised while a
/// [`crate::descriptor::TypeDescriptor`] is being defined or sealed and always abort the whole
/// compilation; there is never a partially compiled type. Runtime errors are raised by the code
/// host while an instance is used (a value that does not fit a slot, a call forwarded through a
/// null target); they propagate to the caller unchanged.
///
/// # Error Categories
///
/// ## Synthesis Errors
/// - [`Error::AmbiguousDescriptor`] - More than one candidate matches an override or attribute binding
/// - [`Error::MissingMember`] - A named capability, base or field member could not be found
/// - [`Error::DoubleCompilation`] - A type descriptor was compiled a second time
/// - [`Error::UnsupportedLiteral`] - The host cannot embed a metadata literal
/// - [`Error::IndexedMemberConflict`] - An indexer requested implicit backing storage
/// - [`Error::InvalidDescriptor`] - A descriptor violates a construction rule
///
/// ## Runtime Errors
/// - [`Error::TypeMismatch`] - A value is not assignable to the declared type
/// - [`Error::NullReference`] - A member was reached through a null reference
/// - [`Error::ArgumentCount`] - A call supplied the wrong number of arguments
///
/// ## Input Errors
/// - [`Error::Malformed`] - Structurally invalid input data
/// - [`Error::Json`] - JSON parsing errors from serde_json
/// - [`Error::Xml`] - XML parsing errors from quick-xml
///
/// # Examples
///
/// ```rust
/// use typeforge::{Error, descriptor::{TypeDescriptor, PropertyMember}, synthesis::Synthesizer};
/// use typeforge::typesystem::TypeSig;
///
/// let synthesizer = Synthesizer::with_default_host();
/// let mut descriptor = TypeDescriptor::new("Sample");
/// descriptor.add_member(PropertyMember::new("Name", TypeSig::String));
///
/// synthesizer.compile(&mut descriptor)?;
/// match synthesizer.compile(&mut descriptor) {
///     Err(Error::DoubleCompilation(name)) => println!("{name} was already compiled"),
///     other => panic!("unexpected: {other:?}"),
/// }
/// # Ok::<(), typeforge::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Synthesis errors
    /// More than one candidate matches an override target or an attribute binding.
    ///
    /// Raised during Define or Finalize, for example when two inherited capabilities both
    /// declare a property with the requested name, or when metadata arguments fit more than one
    /// attribute constructor.
    #[error("Ambiguous descriptor '{member}' - {candidates} candidates match")]
    AmbiguousDescriptor {
        /// The member (or attribute) that could not be bound unambiguously
        member: String,
        /// How many candidates matched
        candidates: usize,
    },

    /// A named member was not found on the declared owner.
    ///
    /// Covers capability members missing from an override target, accessors the target does
    /// not declare, unimplemented capability members at seal time, and field references that
    /// cannot be resolved while generating an accessor body.
    #[error("Member '{member}' not found on '{owner}'")]
    MissingMember {
        /// The type, capability or field container that was searched
        owner: String,
        /// The name of the member that is missing
        member: String,
    },

    /// A type descriptor was compiled a second time.
    ///
    /// A [`crate::descriptor::TypeDescriptor`] compiles exactly once; after a failed compile it
    /// is unusable as well and a fresh descriptor must be built.
    #[error("Type descriptor '{0}' has already been compiled")]
    DoubleCompilation(String),

    /// A metadata value cannot be embedded as a constant by the code host.
    #[error("Literal cannot be embedded by the code host - {0}")]
    UnsupportedLiteral(String),

    /// An indexer property requested implicit backing storage.
    ///
    /// Indexers cannot share one storage cell across index values, their accessors have to be
    /// supplied by the owner.
    #[error("Indexed property '{0}' cannot use implicit backing storage")]
    IndexedMemberConflict(String),

    /// A descriptor violates a construction-time rule.
    #[error("Invalid descriptor - {0}")]
    InvalidDescriptor(String),

    // Runtime errors
    /// A value is not assignable to the declared type.
    #[error("Type mismatch - expected {expected}, found {found}")]
    TypeMismatch {
        /// The declared type
        expected: String,
        /// A description of the supplied value
        found: String,
    },

    /// A member was reached through a null reference.
    #[error("Null reference while accessing '{0}'")]
    NullReference(String),

    /// A call supplied the wrong number of arguments.
    #[error("'{member}' expects {expected} arguments, {found} supplied")]
    ArgumentCount {
        /// The invoked member
        member: String,
        /// Number of declared parameters
        expected: usize,
        /// Number of supplied arguments
        found: usize,
    },

    // Input errors
    /// The input data is damaged and could not be processed.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Error from serde_json while parsing a JSON document.
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// Error from quick-xml while parsing an XML document.
    #[error("{0}")]
    Xml(#[from] quick_xml::Error),

    /// Failed to lock target.
    ///
    /// This error occurs when a lock guarding instance or host state was poisoned by a
    /// panicking thread.
    #[error("Failed to lock target")]
    LockError,

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}

impl Error {
    /// Shorthand for [`Error::MissingMember`].
    pub(crate) fn missing(owner: impl Into<String>, member: impl Into<String>) -> Self {
        Error::MissingMember {
            owner: owner.into(),
            member: member.into(),
        }
    }

    /// Returns `true` for errors raised while defining or sealing a type.
    #[must_use]
    pub fn is_synthesis_error(&self) -> bool {
        matches!(
            self,
            Error::AmbiguousDescriptor { .. }
                | Error::MissingMember { .. }
                | Error::DoubleCompilation(_)
                | Error::UnsupportedLiteral(_)
                | Error::IndexedMemberConflict(_)
                | Error::InvalidDescriptor(_)
        )
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Error::LockError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_macro() {
        let err = malformed_error!("bad {}", 42);
        match err {
            Error::Malformed { message, line, .. } => {
                assert_eq!(message, "bad 42");
                assert!(line > 0);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_synthesis_classification() {
        assert!(Error::missing("IFoo", "Bar").is_synthesis_error());
        assert!(Error::DoubleCompilation("T".into()).is_synthesis_error());
        assert!(!Error::NullReference("x".into()).is_synthesis_error());
        assert!(!Error::LockError.is_synthesis_error());
    }

    #[test]
    fn test_display() {
        let err = Error::missing("IFoo", "Bar");
        assert_eq!(err.to_string(), "Member 'Bar' not found on 'IFoo'");
    }
}
