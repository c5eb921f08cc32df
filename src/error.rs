//! The closed error taxonomy shared by the whole engine.

use thiserror::Error;

/// Engine errors. Every fallible path in the interpreter and the pull
/// protocol reports one of these; the REPL traps them per line and the
/// audio sink converts them to silence.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// User interrupt.
    #[error("halt")]
    Halt,
    /// Unspecified failure, with context.
    #[error("failed : {0}")]
    Failed(String),
    /// An operation that requires a finite sequence was given an
    /// indefinite one.
    #[error("indefinite : {0}")]
    Indefinite(String),
    #[error("wrong type : {0}")]
    WrongType(String),
    #[error("out of range : {0}")]
    OutOfRange(String),
    #[error("syntax : {0}")]
    Syntax(String),
    #[error("internal : {0}")]
    Internal(String),
    #[error("wrong state : {0}")]
    WrongState(String),
    #[error("not found : {0}")]
    NotFound(String),
    #[error("stack underflow")]
    StackUnderflow,
    #[error("stack overflow")]
    StackOverflow,
    #[error("inconsistent inheritance")]
    InconsistentInheritance,
    #[error("undefined operation : {0}")]
    UndefinedOperation(String),
    /// Clean exit requested from the REPL.
    #[error("user quit")]
    UserQuit,
}

pub type Result<T> = core::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Failed(e.to_string())
    }
}

/// A value of an unexpected type was encountered.
/// `msg` names the operation and argument, `expected` the type wanted.
pub fn wrong_type(msg: &str, expected: &str, got: &str) -> Error {
    Error::WrongType(format!("{msg} : expected {expected}, got {got}"))
}

/// An operation met an indefinite sequence where it needs a finite one.
pub fn indefinite_op(msg: &str) -> Error {
    Error::Indefinite(msg.to_string())
}

/// A key lookup failed.
pub fn not_found(key: &str) -> Error {
    Error::NotFound(key.to_string())
}
