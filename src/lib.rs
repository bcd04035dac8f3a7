#![warn(missing_docs, rust_2018_idioms, unused_lifetimes, unused_qualifications)]

//! A streaming iterator over the direct children of a JSON-Pointer-selected
//! container, built to run in constant memory regardless of document size.
//!
//! ```no_run
//! use json_pointer_stream::JsonPointerIter;
//!
//! # fn main() -> Result<(), json_pointer_stream::Error> {
//! for item in JsonPointerIter::from_path("large.json", "/data/records")? {
//!     let (key, value) = item?;
//!     println!("{key}: {value}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod decode;
pub mod error;
pub mod lexer;
pub mod pointer;
pub mod source;

mod driver;

pub use config::DriverOptions;
pub use decode::{SerdeJsonDecoder, ValueDecoder};
pub use driver::JsonPointerIter;
pub use error::{Error, Span};
pub use pointer::Pointer;
pub use source::{ByteSource, FileSource, ReaderSource, SliceSource};
