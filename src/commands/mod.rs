//! Command Matching
//!
//! - `pattern`: tokenizer matching one pattern against an input line
//! - `command`: command definitions, handlers and invocation context
//! - `registry`: ordered registry with permission-gated lookup

pub mod command;
pub mod pattern;
pub mod registry;

pub use command::{handler, Category, Command, CommandError, CommandKind, Handler, Invocation, Origin};
pub use pattern::match_pattern;
pub use registry::{CommandMatch, CommandRegistry};
