//! Protected operation table.
//!
//! Operations and the roles allowed to call them are registered explicitly
//! at startup. Lookups never inspect handlers at runtime.

use std::collections::HashMap;

use serde::Serialize;

use super::AuthError;
use crate::models::auth::ClaimSet;

/// Role that may perform every administrative operation.
pub const ADMIN_ROLE: &str = "Admin";

/// One registered operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationInfo {
    pub name: String,
    /// Roles allowed to call it. Empty means any caller.
    pub roles: Vec<String>,
}

/// Operations grouped by the surface that exposes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationGroup {
    pub name: String,
    pub operations: Vec<OperationInfo>,
}

#[derive(Debug, Default, Clone)]
pub struct OperationTable {
    groups: Vec<OperationGroup>,
    /// Operation name → (group index, operation index).
    index: HashMap<String, (usize, usize)>,
}

impl OperationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The operations this crate exposes.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        table
            .register("session", "login", &[])
            .register("session", "renew", &[])
            .register("session", "verify", &[])
            .register("roles", "list-roles", &[ADMIN_ROLE])
            .register("roles", "user-roles", &[ADMIN_ROLE])
            .register("roles", "assign-roles", &[ADMIN_ROLE])
            .register("roles", "create-role", &[ADMIN_ROLE])
            .register("roles", "delete-role", &[ADMIN_ROLE])
            .register("users", "list-users", &[ADMIN_ROLE])
            .register("users", "delete-user", &[ADMIN_ROLE]);
        table
    }

    /// Register `operation` under `group`.
    ///
    /// Re-registering replaces the roles. A different `group` moves the
    /// operation there, and a group left empty is dropped.
    pub fn register(&mut self, group: &str, operation: &str, roles: &[&str]) -> &mut Self {
        let roles: Vec<String> = roles.iter().map(|r| r.to_string()).collect();

        if let Some(&(g, o)) = self.index.get(operation) {
            if self.groups[g].name == group {
                self.groups[g].operations[o].roles = roles;
                return self;
            }
            self.groups[g].operations.remove(o);
            if self.groups[g].operations.is_empty() {
                self.groups.remove(g);
            }
            self.reindex();
        }

        let g = match self.groups.iter().position(|grp| grp.name == group) {
            Some(g) => g,
            None => {
                self.groups.push(OperationGroup {
                    name: group.to_string(),
                    operations: Vec::new(),
                });
                self.groups.len() - 1
            }
        };
        self.groups[g].operations.push(OperationInfo {
            name: operation.to_string(),
            roles,
        });
        let o = self.groups[g].operations.len() - 1;
        self.index.insert(operation.to_string(), (g, o));
        self
    }

    fn reindex(&mut self) {
        self.index = self
            .groups
            .iter()
            .enumerate()
            .flat_map(|(g, grp)| {
                grp.operations
                    .iter()
                    .enumerate()
                    .map(move |(o, op)| (op.name.clone(), (g, o)))
            })
            .collect();
    }

    /// Every group, in registration order.
    pub fn list(&self) -> &[OperationGroup] {
        &self.groups
    }

    pub fn required_roles(&self, operation: &str) -> Option<&[String]> {
        self.index
            .get(operation)
            .map(|&(g, o)| self.groups[g].operations[o].roles.as_slice())
    }

    /// Allow the call when the operation is open or `claims` hold any required role.
    pub fn authorize(&self, claims: &ClaimSet, operation: &str) -> Result<(), AuthError> {
        let required = self
            .required_roles(operation)
            .ok_or_else(|| AuthError::Forbidden(format!("unknown operation '{operation}'")))?;
        if required.is_empty() || required.iter().any(|r| claims.roles.contains(r)) {
            return Ok(());
        }
        Err(AuthError::Forbidden(format!(
            "'{operation}' requires one of [{}]",
            required.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::ProfileAttributes;

    fn claims(roles: &[&str]) -> ClaimSet {
        ClaimSet {
            sub: "p".into(),
            name: "n".into(),
            profile: ProfileAttributes::default(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            jti: "j".into(),
        }
    }

    #[test]
    fn builtin_groups_in_registration_order() {
        let table = OperationTable::builtin();
        let names: Vec<&str> = table.list().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["session", "roles", "users"]);
    }

    #[test]
    fn open_operation_needs_no_role() {
        let table = OperationTable::builtin();
        assert!(table.authorize(&claims(&[]), "renew").is_ok());
    }

    #[test]
    fn admin_operation_requires_admin() {
        let table = OperationTable::builtin();
        assert!(table.authorize(&claims(&["Admin"]), "assign-roles").is_ok());
        assert!(matches!(
            table.authorize(&claims(&["User"]), "assign-roles"),
            Err(AuthError::Forbidden(_))
        ));
    }

    #[test]
    fn unknown_operation_is_forbidden() {
        let table = OperationTable::builtin();
        assert!(table.authorize(&claims(&["Admin"]), "drop-database").is_err());
    }

    #[test]
    fn re_registering_replaces_roles() {
        let mut table = OperationTable::new();
        table
            .register("reports", "export", &["Auditor"])
            .register("reports", "export", &["Auditor", "Admin"]);
        assert_eq!(table.list()[0].operations.len(), 1);
        assert_eq!(
            table.required_roles("export").unwrap(),
            &["Auditor".to_string(), "Admin".to_string()]
        );
    }

    #[test]
    fn re_registering_under_new_group_moves_operation() {
        let mut table = OperationTable::new();
        table
            .register("reports", "export", &["Auditor"])
            .register("reports", "import", &[])
            .register("audit", "purge", &[ADMIN_ROLE])
            .register("audit", "export", &[ADMIN_ROLE]);

        let layout: Vec<(&str, Vec<&str>)> = table
            .list()
            .iter()
            .map(|g| {
                (
                    g.name.as_str(),
                    g.operations.iter().map(|o| o.name.as_str()).collect(),
                )
            })
            .collect();
        assert_eq!(
            layout,
            vec![("reports", vec!["import"]), ("audit", vec!["purge", "export"])]
        );
        assert_eq!(
            table.required_roles("export").unwrap(),
            &[ADMIN_ROLE.to_string()]
        );
        assert!(table.required_roles("import").unwrap().is_empty());
    }

    #[test]
    fn moving_last_operation_drops_empty_group() {
        let mut table = OperationTable::new();
        table
            .register("legacy", "sync", &[])
            .register("jobs", "run", &[])
            .register("jobs", "sync", &["Operator"]);

        let names: Vec<&str> = table.list().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["jobs"]);
        assert_eq!(table.required_roles("run").unwrap().len(), 0);
        assert_eq!(
            table.required_roles("sync").unwrap(),
            &["Operator".to_string()]
        );
    }
}
