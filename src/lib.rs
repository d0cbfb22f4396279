pub mod path;
pub mod level;
pub mod record;
pub mod redact;
pub mod stage;
pub mod pipeline;

pub mod access;
pub mod logger;
pub mod layer;

pub mod sink;
#[cfg(feature = "console")]
pub mod console;
pub mod noop_sink;
pub mod backend;

pub mod env;
pub mod init;

pub use level::Level;
pub use pipeline::Pipeline;
pub use record::{LogRecord, SerializedRecord};
