//! Transaction declarations and precedence resolution
//!
//! Declarations can be attached at four sites. For one invocation the most
//! specific declaration wins outright; declarations are never merged.
//!
//! | Precedence | Site | Example |
//! |------------|------|---------|
//! | 1 | Operation on the concrete component | `LevelService.write` |
//! | 2 | Concrete component | `LevelService` |
//! | 3 | Operation on an implemented contract | `Levels.write` |
//! | 4 | Implemented contract | `Levels` |
//!
//! Operations with no applicable declaration are not transactional.

use crate::transaction::ComponentDescriptor;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use stratatx_core::{Propagation, RollbackRule, RollbackRules, TransactionDefinition};

/// Where a declaration was found, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeclarationSite {
    /// Operation on the concrete component
    Operation,
    /// Concrete component
    Component,
    /// Operation on an implemented contract
    ContractOperation,
    /// Implemented contract
    Contract,
}

/// A transactional declaration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionAttribute {
    pub propagation: Propagation,
    pub read_only: bool,
    /// Transaction name; defaults to `Component.operation`
    pub name: Option<String>,
    /// Failure codes that always roll back
    pub rollback_for: Vec<String>,
    /// Failure codes that never roll back
    pub no_rollback_for: Vec<String>,
}

impl TransactionAttribute {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn propagation(mut self, propagation: Propagation) -> Self {
        self.propagation = propagation;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn rollback_for(mut self, code: impl Into<String>) -> Self {
        self.rollback_for.push(code.into());
        self
    }

    pub fn no_rollback_for(mut self, code: impl Into<String>) -> Self {
        self.no_rollback_for.push(code.into());
        self
    }

    /// Declared rollback rules, no-rollback rules first
    pub fn rollback_rules(&self) -> RollbackRules {
        self.no_rollback_for
            .iter()
            .map(RollbackRule::no_rollback_for)
            .chain(self.rollback_for.iter().map(RollbackRule::rollback_for))
            .fold(RollbackRules::new(), RollbackRules::with)
    }

    /// Turn the declaration into a definition for one invocation
    pub fn to_definition(&self, default_name: impl Into<String>) -> TransactionDefinition {
        TransactionDefinition::with_propagation(self.propagation)
            .read_only(self.read_only)
            .named(self.name.clone().unwrap_or_else(|| default_name.into()))
            .rollback_rules(self.rollback_rules())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DeclarationKey {
    Operation { component: String, operation: String },
    Component(String),
    ContractOperation { contract: String, operation: String },
    Contract(String),
}

/// Concurrent registry of declarations
#[derive(Debug, Default)]
pub struct AttributeRegistry {
    declarations: DashMap<DeclarationKey, TransactionAttribute>,
}

impl AttributeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare one operation of a concrete component
    pub fn declare_operation(&self, component: &str, operation: &str, attribute: TransactionAttribute) {
        self.declarations.insert(
            DeclarationKey::Operation {
                component: component.to_string(),
                operation: operation.to_string(),
            },
            attribute,
        );
    }

    /// Declare every operation of a concrete component
    pub fn declare_component(&self, component: &str, attribute: TransactionAttribute) {
        self.declarations
            .insert(DeclarationKey::Component(component.to_string()), attribute);
    }

    /// Declare one operation of a contract
    pub fn declare_contract_operation(&self, contract: &str, operation: &str, attribute: TransactionAttribute) {
        self.declarations.insert(
            DeclarationKey::ContractOperation {
                contract: contract.to_string(),
                operation: operation.to_string(),
            },
            attribute,
        );
    }

    /// Declare every operation of a contract
    pub fn declare_contract(&self, contract: &str, attribute: TransactionAttribute) {
        self.declarations
            .insert(DeclarationKey::Contract(contract.to_string()), attribute);
    }

    /// Number of declarations
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Most specific declaration applicable to `operation` of `component`
    pub fn resolve(
        &self,
        component: &ComponentDescriptor,
        operation: &str,
    ) -> Option<(DeclarationSite, TransactionAttribute)> {
        let mut candidates = vec![
            (
                DeclarationSite::Operation,
                DeclarationKey::Operation {
                    component: component.name().to_string(),
                    operation: operation.to_string(),
                },
            ),
            (
                DeclarationSite::Component,
                DeclarationKey::Component(component.name().to_string()),
            ),
        ];
        candidates.extend(component.contracts().iter().map(|contract| {
            (
                DeclarationSite::ContractOperation,
                DeclarationKey::ContractOperation {
                    contract: contract.clone(),
                    operation: operation.to_string(),
                },
            )
        }));
        candidates.extend(
            component
                .contracts()
                .iter()
                .map(|contract| (DeclarationSite::Contract, DeclarationKey::Contract(contract.clone()))),
        );

        candidates.into_iter().find_map(|(site, key)| {
            self.declarations
                .get(&key)
                .map(|attribute| (site, attribute.value().clone()))
        })
    }
}
