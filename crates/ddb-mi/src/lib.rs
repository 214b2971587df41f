#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Incremental GDB/MI parser: turns raw bytes read from a debugger
//! transport into a stream of typed [`MiRecord`]s.

mod error;
mod parser;
mod record;
mod session_response;
mod value;

pub use error::{MiParseError, MiParseResult};
pub use parser::MiParser;
pub use record::{MiRecord, MiRecordKind, Stream};
pub use session_response::SessionResponse;
pub use value::{MiValue, parse_result_list};
