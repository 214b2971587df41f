#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Flag parsing, the closed handler registry, and the remote-backtrace
//! algorithm that together make up "what happens when the user presses
//! enter", grounded in `original_source/ddb/python/iddb/cmd_processor.py`.

mod adapter;
mod command;
mod deadlock;
mod error;
mod handlers;
mod processor;
mod remote_backtrace;
mod transformers;

pub use adapter::{adapter_for, FrameworkAdapter, NuAdapter, ServiceWeaverAdapter};
pub use command::SingleCommand;
pub use error::{ProcessorError, ProcessorResult};
pub use handlers::{Handler, HandlerCtx};
pub use processor::CommandProcessor;
pub use remote_backtrace::{RemoteBacktraceHandler, RemoteBtOptions};
pub use transformers::{render_thread_groups, render_thread_info, NullTransformer};
