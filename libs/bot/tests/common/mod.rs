//! Common test utilities for bot integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use inkcord_bot::{CommandApi, CommandScope, RegisteredCommand, Result, Snowflake};
use parking_lot::Mutex;
use serde_json::Value;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// One call made against the fake API
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    Fetch(CommandScope),
    Create(CommandScope, Value),
}

/// In-memory `CommandApi` that records every call
#[derive(Default)]
pub struct FakeCommandApi {
    registered: Mutex<Vec<RegisteredCommand>>,
    calls: Mutex<Vec<ApiCall>>,
}

impl FakeCommandApi {
    pub fn with_registered(registered: Vec<RegisteredCommand>) -> Self {
        Self {
            registered: Mutex::new(registered),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().clone()
    }

    pub fn creates(&self) -> Vec<(CommandScope, Value)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::Create(scope, payload) => Some((scope, payload)),
                ApiCall::Fetch(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl CommandApi for FakeCommandApi {
    async fn fetch_registered(
        &self,
        _application_id: Snowflake,
        scope: CommandScope,
    ) -> Result<Vec<RegisteredCommand>> {
        self.calls.lock().push(ApiCall::Fetch(scope));
        Ok(self
            .registered
            .lock()
            .iter()
            .filter(|command| command.scope() == scope)
            .cloned()
            .collect())
    }

    async fn create(
        &self,
        _application_id: Snowflake,
        scope: CommandScope,
        payload: Value,
    ) -> Result<RegisteredCommand> {
        self.calls.lock().push(ApiCall::Create(scope, payload.clone()));
        let name = payload["name"].as_str().unwrap_or_default().to_string();
        let created = RegisteredCommand::new(name, scope);
        self.registered.lock().push(created.clone());
        Ok(created)
    }
}
