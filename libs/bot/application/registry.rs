//! Local command registry

use super::interactions::InteractionContext;
use crate::domain::{CommandError, CommandScope, PendingCommand, Snowflake};
use crate::error::Result;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Command handler; runs on a dispatcher worker thread
pub type CommandHandler = Arc<dyn Fn(&InteractionContext) -> Result<()> + Send + Sync>;

/// Handle returned when a command is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandHandle(u64);

impl fmt::Display for CommandHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "command-{}", self.0)
    }
}

struct Entry {
    handle: CommandHandle,
    command: PendingCommand,
    handler: Option<CommandHandler>,
}

/// Commands known to this process, with their handlers
#[derive(Default)]
pub struct CommandRegistry {
    entries: RwLock<Vec<Entry>>,
    next_id: AtomicU64,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command without a handler yet
    pub fn declare(&self, command: PendingCommand) -> std::result::Result<CommandHandle, CommandError> {
        self.insert(command, None)
    }

    pub fn register<F>(
        &self,
        command: PendingCommand,
        handler: F,
    ) -> std::result::Result<CommandHandle, CommandError>
    where
        F: Fn(&InteractionContext) -> Result<()> + Send + Sync + 'static,
    {
        self.insert(command, Some(Arc::new(handler)))
    }

    /// Attach a handler to every declared command with this name
    pub fn attach<F>(&self, name: &str, handler: F) -> std::result::Result<Vec<CommandHandle>, CommandError>
    where
        F: Fn(&InteractionContext) -> Result<()> + Send + Sync + 'static,
    {
        let handler: CommandHandler = Arc::new(handler);
        let mut entries = self.entries.write();
        let handles: Vec<CommandHandle> = entries
            .iter_mut()
            .filter(|entry| entry.command.name() == name)
            .map(|entry| {
                entry.handler = Some(Arc::clone(&handler));
                entry.handle
            })
            .collect();

        if handles.is_empty() {
            return Err(CommandError::NotDeclared(name.to_string()));
        }
        Ok(handles)
    }

    fn insert(
        &self,
        command: PendingCommand,
        handler: Option<CommandHandler>,
    ) -> std::result::Result<CommandHandle, CommandError> {
        command.validate()?;

        let mut entries = self.entries.write();
        let taken = entries.iter().any(|entry| {
            entry.command.name() == command.name() && entry.command.scope() == command.scope()
        });
        if taken {
            return Err(CommandError::Duplicate(command.name().to_string()));
        }

        let handle = CommandHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!("Registered command '{}' ({}) as {}", command.name(), command.scope(), handle);
        entries.push(Entry {
            handle,
            command,
            handler,
        });
        Ok(handle)
    }

    pub fn unregister(&self, handle: CommandHandle) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|entry| entry.handle != handle);
        entries.len() != before
    }

    /// Snapshot of every registered command
    pub fn commands(&self) -> Vec<PendingCommand> {
        self.entries
            .read()
            .iter()
            .map(|entry| entry.command.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Handler for an invoked command
    ///
    /// A command private to the invoking guild wins over a global one.
    pub fn handler_for(&self, name: &str, guild: Option<Snowflake>) -> Option<CommandHandler> {
        let entries = self.entries.read();
        // Declared-only entries are skipped so they never hide a handled one
        let find = |scope: CommandScope| {
            entries
                .iter()
                .filter(|entry| entry.command.name() == name && entry.command.scope() == scope)
                .find_map(|entry| entry.handler.clone())
        };

        guild
            .and_then(|guild| find(CommandScope::Guild(guild)))
            .or_else(|| find(CommandScope::Global))
    }
}
