//! Per-list access policies.
//!
//! Every list carries one rule per CRUD operation, passed in as part of the
//! schema declaration rather than hard-coded in the engine. The database
//! facade consults the policy before touching storage.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Operations a policy can gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Creating new records.
    Create,
    /// Reading records (get, list, relation traversal).
    Query,
    /// Updating existing records.
    Update,
    /// Deleting records.
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Create => "create",
            Operation::Query => "query",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Whether an operation is permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessRule {
    /// Unconditionally permit.
    Allow,
    /// Unconditionally refuse.
    Deny,
}

impl AccessRule {
    /// Check if the rule permits the operation.
    pub fn permits(&self) -> bool {
        matches!(self, AccessRule::Allow)
    }
}

/// One access rule per operation on a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    /// Rule for creating records.
    pub create: AccessRule,
    /// Rule for reading records.
    pub query: AccessRule,
    /// Rule for updating records.
    pub update: AccessRule,
    /// Rule for deleting records.
    pub delete: AccessRule,
}

impl AccessPolicy {
    /// Permit every operation.
    ///
    /// Suitable for prototypes only; production schemas should scope each
    /// operation explicitly.
    pub fn allow_all() -> Self {
        Self {
            create: AccessRule::Allow,
            query: AccessRule::Allow,
            update: AccessRule::Allow,
            delete: AccessRule::Allow,
        }
    }

    /// Refuse every operation.
    pub fn deny_all() -> Self {
        Self {
            create: AccessRule::Deny,
            query: AccessRule::Deny,
            update: AccessRule::Deny,
            delete: AccessRule::Deny,
        }
    }

    /// Permit reads only.
    pub fn read_only() -> Self {
        Self {
            query: AccessRule::Allow,
            ..Self::deny_all()
        }
    }

    /// Override the rule for a single operation.
    pub fn with_rule(mut self, operation: Operation, rule: AccessRule) -> Self {
        match operation {
            Operation::Create => self.create = rule,
            Operation::Query => self.query = rule,
            Operation::Update => self.update = rule,
            Operation::Delete => self.delete = rule,
        }
        self
    }

    /// Look up the rule for an operation.
    pub fn rule(&self, operation: Operation) -> AccessRule {
        match operation {
            Operation::Create => self.create,
            Operation::Query => self.query,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }

    /// Check whether an operation is permitted.
    pub fn permits(&self, operation: Operation) -> bool {
        self.rule(operation).permits()
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::deny_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all() {
        let policy = AccessPolicy::allow_all();
        for op in [
            Operation::Create,
            Operation::Query,
            Operation::Update,
            Operation::Delete,
        ] {
            assert!(policy.permits(op));
        }
    }

    #[test]
    fn test_default_denies() {
        let policy = AccessPolicy::default();
        assert!(!policy.permits(Operation::Create));
        assert!(!policy.permits(Operation::Query));
    }

    #[test]
    fn test_read_only() {
        let policy = AccessPolicy::read_only();
        assert!(policy.permits(Operation::Query));
        assert!(!policy.permits(Operation::Create));
        assert!(!policy.permits(Operation::Update));
        assert!(!policy.permits(Operation::Delete));
    }

    #[test]
    fn test_with_rule_override() {
        let policy = AccessPolicy::deny_all().with_rule(Operation::Create, AccessRule::Allow);
        assert!(policy.permits(Operation::Create));
        assert!(!policy.permits(Operation::Delete));
    }
}
