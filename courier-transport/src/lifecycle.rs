//! 异步命令生命周期通知
//!
//! 引擎为每个跟踪中的异步命令依次发布 `Started`，随后 `Complete` 或 `Error`，最后 `Finished`。
//!
use courier_core::{Command, ExtendedError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandStatus {
    Started,
    Complete,
    Error,
    Finished,
}

#[derive(Debug, Clone)]
pub struct CommandLifecycle {
    pub status: CommandStatus,
    pub command: Command,
    pub error: Option<ExtendedError>,
}

impl CommandLifecycle {
    pub fn new(status: CommandStatus, command: &Command) -> Self {
        Self {
            status,
            command: command.clone(),
            error: None,
        }
    }

    pub fn failed(command: &Command, error: ExtendedError) -> Self {
        Self {
            status: CommandStatus::Error,
            command: command.clone(),
            error: Some(error),
        }
    }
}
