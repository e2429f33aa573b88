//! Rollback classification
//!
//! The core never interprets a failure's content. It only asks two things of
//! it through [`Classify`]: its [`Severity`] and its dotted failure code.
//!
//! ## Default policy
//!
//! - `Unchecked` failures (bugs, structural errors) → [`RollbackDecision::MustRollback`]
//! - `Checked` failures (declared business outcomes such as insufficient
//!   funds) → [`RollbackDecision::MayCommit`]
//!
//! ## Rules
//!
//! A [`RollbackRule`] overrides the default for every failure whose code
//! starts with the rule's code, segment-wise: the rule `order` applies to
//! `order` and `order.not_enough_money`, but not to `orders`. When several
//! rules apply, the one with the most segments wins; at equal depth the rule
//! declared first wins.

use serde::{Deserialize, Serialize};

/// Declared nature of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Expected business failure the caller is meant to handle
    Checked,
    /// Unexpected failure (bug, structural error)
    Unchecked,
}

/// Outcome of classifying a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackDecision {
    /// The transaction must be rolled back
    MustRollback,
    /// The transaction may still commit
    MayCommit,
}

/// Classification input supplied by business failure types
pub trait Classify {
    /// Checked or unchecked
    fn severity(&self) -> Severity;

    /// Dotted hierarchical code, most general segment first
    /// (e.g. `order.not_enough_money`)
    fn failure_code(&self) -> &str;
}

/// One allow/deny entry of a rule set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackRule {
    /// Failure code prefix this rule applies to
    pub code: String,
    /// Whether matching failures roll back
    pub rollback: bool,
}

impl RollbackRule {
    /// Roll back on failures under `code`
    pub fn rollback_for(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            rollback: true,
        }
    }

    /// Do not roll back on failures under `code`
    pub fn no_rollback_for(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            rollback: false,
        }
    }

    /// Number of matching segments if this rule applies to `failure_code`
    pub fn depth(&self, failure_code: &str) -> Option<usize> {
        let mut rule = self.code.split('.');
        let mut failure = failure_code.split('.');
        let mut depth = 0;
        loop {
            match (rule.next(), failure.next()) {
                (None, _) => return if depth == 0 { None } else { Some(depth) },
                (Some(r), Some(f)) if r == f && !r.is_empty() => depth += 1,
                _ => return None,
            }
        }
    }

    fn decision(&self) -> RollbackDecision {
        if self.rollback {
            RollbackDecision::MustRollback
        } else {
            RollbackDecision::MayCommit
        }
    }
}

/// Ordered rule set; also the rollback classifier
///
/// A rule set may carry fallback rules, consulted only when none of its own
/// rules apply to a failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackRules {
    rules: Vec<RollbackRule>,
    #[serde(skip)]
    fallback: Option<Box<RollbackRules>>,
}

impl RollbackRules {
    /// Empty rule set (default policy only)
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule
    pub fn with(mut self, rule: RollbackRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Append a rollback-for rule
    pub fn rollback_for(self, code: impl Into<String>) -> Self {
        self.with(RollbackRule::rollback_for(code))
    }

    /// Append a no-rollback-for rule
    pub fn no_rollback_for(self, code: impl Into<String>) -> Self {
        self.with(RollbackRule::no_rollback_for(code))
    }

    /// `self`, falling back to `fallback` for failures no rule of `self` matches
    ///
    /// A matching rule of `self` always wins, however specific the fallback
    /// rules are.
    pub fn or_else(&self, fallback: &RollbackRules) -> RollbackRules {
        let fallback = match &self.fallback {
            Some(existing) => existing.or_else(fallback),
            None => fallback.clone(),
        };
        RollbackRules {
            rules: self.rules.clone(),
            fallback: if fallback.is_empty() {
                None
            } else {
                Some(Box::new(fallback))
            },
        }
    }

    /// Declared rules, without fallbacks
    pub fn rules(&self) -> &[RollbackRule] {
        &self.rules
    }

    /// Check if no rules are declared, including fallbacks
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.fallback.as_ref().map_or(true, |f| f.is_empty())
    }

    /// Most specific own rule applicable to `failure_code`, else the
    /// fallback's
    pub fn matching_rule(&self, failure_code: &str) -> Option<&RollbackRule> {
        let mut best: Option<(usize, &RollbackRule)> = None;
        for rule in &self.rules {
            if let Some(depth) = rule.depth(failure_code) {
                if best.map_or(true, |(d, _)| depth > d) {
                    best = Some((depth, rule));
                }
            }
        }
        best.map(|(_, rule)| rule).or_else(|| {
            self.fallback
                .as_ref()
                .and_then(|fallback| fallback.matching_rule(failure_code))
        })
    }

    /// Classify a failure
    pub fn classify<F: Classify + ?Sized>(&self, failure: &F) -> RollbackDecision {
        match self.matching_rule(failure.failure_code()) {
            Some(rule) => rule.decision(),
            None => match failure.severity() {
                Severity::Unchecked => RollbackDecision::MustRollback,
                Severity::Checked => RollbackDecision::MayCommit,
            },
        }
    }
}
