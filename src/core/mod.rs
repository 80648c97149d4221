pub mod lock;
pub mod logging;
pub mod status;
pub mod sync;
pub mod timestamp;

pub use logging::{ComponentLogger, LogContext};
pub use status::{LifecycleState, Status};
pub use sync::Signal;
pub use timestamp::*;
