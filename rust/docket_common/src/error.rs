use thiserror::Error;

use docket_acl::AclError;
use docket_converter::ConverterError;

#[derive(Error, Debug)]
pub enum CommonError {
    #[error("configuration error: {0}")]
    Config(String),

    /// A name given on the command line matched no record.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error(transparent)]
    Acl(#[from] AclError),

    #[error(transparent)]
    Converter(#[from] ConverterError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CommonError>;
