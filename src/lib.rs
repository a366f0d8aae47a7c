//! xcreeptor - personal text encryption with a layered substitution +
//! AES-256-CBC cipher and a password-protected substitution key file

#![forbid(unsafe_code)]

pub mod account;
pub mod armor;
pub mod blockcrypt;
pub mod config;
pub mod error;
pub mod file_ops;
pub mod keymanager;
pub mod layered;
pub mod password;
pub mod pin;
pub mod session;
pub mod substitution;

pub use error::{ErrorCategory, ErrorKind, Result, XcreeptorError};
