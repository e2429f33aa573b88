//! Interceptor configuration
//!
//! Configuration is plain TOML:
//!
//! ```toml
//! validate_existing_transaction = false
//!
//! [[default_rollback_rules]]
//! code = "order.not_enough_money"
//! rollback = false
//!
//! [components.LevelService]
//! read_only = true
//!
//! [components.LevelService.operations.write]
//! read_only = false
//!
//! [contracts.Levels.operations.audit]
//! propagation = "requires_new"
//! ```
//!
//! A component or contract section declares the whole component only if it
//! sets at least one attribute (`propagation`, `read_only`, `name`,
//! `rollback_for`, `no_rollback_for`) or `transactional = true`. Every
//! `operations.<name>` table is a declaration, even when empty.

use crate::attributes::{AttributeRegistry, TransactionAttribute};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use stratatx_core::{Propagation, Result, RollbackRule, RollbackRules, TransactionError};

/// Optional attribute fields of a section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeConfig {
    pub transactional: Option<bool>,
    pub propagation: Option<Propagation>,
    pub read_only: Option<bool>,
    pub name: Option<String>,
    pub rollback_for: Option<Vec<String>>,
    pub no_rollback_for: Option<Vec<String>>,
}

impl AttributeConfig {
    /// Whether the section declares anything
    pub fn is_declared(&self) -> bool {
        self.transactional.unwrap_or(false)
            || self.propagation.is_some()
            || self.read_only.is_some()
            || self.name.is_some()
            || self.rollback_for.is_some()
            || self.no_rollback_for.is_some()
    }

    pub fn to_attribute(&self) -> TransactionAttribute {
        TransactionAttribute {
            propagation: self.propagation.unwrap_or_default(),
            read_only: self.read_only.unwrap_or(false),
            name: self.name.clone(),
            rollback_for: self.rollback_for.clone().unwrap_or_default(),
            no_rollback_for: self.no_rollback_for.clone().unwrap_or_default(),
        }
    }
}

/// Declarations for one component or contract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeclarationConfig {
    #[serde(flatten)]
    pub attribute: AttributeConfig,
    pub operations: BTreeMap<String, AttributeConfig>,
}

/// Settings for the interception boundary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptorConfig {
    /// Reject read-write participants in read-only transactions
    pub validate_existing_transaction: bool,
    /// Rules consulted after an operation's own rules
    pub default_rollback_rules: Vec<RollbackRule>,
    pub components: BTreeMap<String, DeclarationConfig>,
    pub contracts: BTreeMap<String, DeclarationConfig>,
}

impl InterceptorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).map_err(|e| TransactionError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)
            .map_err(|e| TransactionError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&input)
    }

    /// Serialize back to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| TransactionError::Config(e.to_string()))
    }

    pub fn validate_existing_transaction(mut self, validate: bool) -> Self {
        self.validate_existing_transaction = validate;
        self
    }

    pub fn default_rollback_rule(mut self, rule: RollbackRule) -> Self {
        self.default_rollback_rules.push(rule);
        self
    }

    /// Default rules as a rule set
    pub fn default_rules(&self) -> RollbackRules {
        self.default_rollback_rules
            .iter()
            .cloned()
            .fold(RollbackRules::new(), RollbackRules::with)
    }

    /// Register every configured declaration
    pub fn apply_to(&self, registry: &AttributeRegistry) {
        for (component, section) in &self.components {
            if section.attribute.is_declared() {
                registry.declare_component(component, section.attribute.to_attribute());
            }
            for (operation, attribute) in &section.operations {
                registry.declare_operation(component, operation, attribute.to_attribute());
            }
        }
        for (contract, section) in &self.contracts {
            if section.attribute.is_declared() {
                registry.declare_contract(contract, section.attribute.to_attribute());
            }
            for (operation, attribute) in &section.operations {
                registry.declare_contract_operation(contract, operation, attribute.to_attribute());
            }
        }
    }
}
