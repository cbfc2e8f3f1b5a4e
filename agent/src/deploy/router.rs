//! Target-kind routing
//!
//! A closed registry mapping target kinds to handlers, validated when it is
//! built so a routing miss at call time can only mean an unknown kind.

use std::collections::HashMap;

use crate::errors::AgentError;

/// The handlers a target kind can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// AS3 application deployment driven by an artifact event
    Application,

    /// Ticket staging driven by a node event
    Ticket,
}

/// Registry of target kind handlers.
#[derive(Debug, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, HandlerKind>,
}

impl HandlerRegistry {
    /// Build a registry from (target kind, handler) pairs.
    pub fn new(entries: &[(&str, HandlerKind)]) -> Result<Self, AgentError> {
        let mut handlers = HashMap::new();
        for (kind, handler) in entries {
            if kind.trim().is_empty() {
                return Err(AgentError::ConfigError(
                    "empty target kind in handler table".to_string(),
                ));
            }
            if handlers.insert(kind.to_string(), *handler).is_some() {
                return Err(AgentError::ConfigError(format!(
                    "duplicate handler registration for {}",
                    kind
                )));
            }
        }
        Ok(Self { handlers })
    }

    /// The built-in handler table.
    pub fn defaults() -> Result<Self, AgentError> {
        Self::new(&[
            ("NetautoFlexApplication", HandlerKind::Application),
            ("NetautoL4Application", HandlerKind::Application),
            ("NetautoMtlsApplication", HandlerKind::Application),
            ("NetautoServiceNowTicket", HandlerKind::Ticket),
        ])
    }

    /// Resolve a target kind to its handler.
    ///
    /// Unknown kinds are reported, not retried.
    pub fn resolve(&self, target_kind: &str) -> Result<HandlerKind, AgentError> {
        self.handlers
            .get(target_kind)
            .copied()
            .ok_or_else(|| AgentError::UnsupportedTarget(target_kind.to_string()))
    }
}
