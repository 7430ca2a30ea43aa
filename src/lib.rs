pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod orchestrator;
pub mod probe;
pub mod shutdown;

pub use config::AppConfig;
pub use device::{Device, NoOpDevice};
pub use error::{Result, VigilError};
pub use orchestrator::{Orchestrator, ProbeTask};
pub use probe::{Attempt, Checker, ExecChecker, Supervisor, Terminal};
pub use shutdown::{ShutdownController, ShutdownSignal};
