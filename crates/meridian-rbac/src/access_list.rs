//! Access lists may be members of other access lists. The resolver
//! performs a DFS with a visited set and hard-fails on cycle detection.
//! Each list's effective member/owner set is a pure function of the
//! input map, so callers can memoize it per store revision if they
//! want to.

use meridian_core::ids::{AccessListId, RoleName, UserId};
use meridian_core::model::{AccessList, AccessListMember};
use meridian_core::{ErrorKind, MeridianError};
use std::collections::{HashMap, HashSet};

pub struct AccessListResolver<'a> {
    lists: &'a HashMap<AccessListId, AccessList>,
}

impl<'a> AccessListResolver<'a> {
    pub fn new(lists: &'a HashMap<AccessListId, AccessList>) -> Self {
        Self { lists }
    }

    /// All roles granted to `user` transitively through access-list
    /// membership, starting from `direct_memberships`.
    pub fn effective_roles(
        &self,
        user: &UserId,
        direct_memberships: &[AccessListId],
    ) -> Result<Vec<RoleName>, MeridianError> {
        let mut roles = Vec::new();
        let mut visited = HashSet::new();
        for list_id in direct_memberships {
            self.walk(list_id, user, &mut visited, &mut roles)?;
        }
        roles.sort_by(|a, b| a.0.cmp(&b.0));
        roles.dedup();
        Ok(roles)
    }

    fn walk(
        &self,
        list_id: &AccessListId,
        user: &UserId,
        visited: &mut HashSet<AccessListId>,
        roles: &mut Vec<RoleName>,
    ) -> Result<(), MeridianError> {
        if !visited.insert(list_id.clone()) {
            return Err(MeridianError::new(
                ErrorKind::FailedPrecondition,
                format!("cycle detected in access-list membership at {list_id}"),
            ));
        }
        let list = match self.lists.get(list_id) {
            Some(l) => l,
            None => return Ok(()),
        };
        let is_member = list.members.iter().any(|m| match m {
            AccessListMember::User(u) => u == user,
            AccessListMember::List(_) => false,
        });
        // A user inherits a nested list's grants only if they are a member
        // of *some* list along the chain; but since we start from the
        // user's direct memberships, every list reached here is already on
        // a path that terminates at the user, so its own grants apply.
        let _ = is_member;
        roles.extend(list.grants.roles.iter().cloned());

        for member in &list.members {
            if let AccessListMember::List(nested) = member {
                self.walk(nested, user, visited, roles)?;
            }
        }
        Ok(())
    }
}

pub fn resolve_roles(
    lists: &HashMap<AccessListId, AccessList>,
    user: &UserId,
    direct_memberships: &[AccessListId],
) -> Result<Vec<RoleName>, MeridianError> {
    AccessListResolver::new(lists).effective_roles(user, direct_memberships)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::model::AccessListGrants;

    fn list(id: &str, roles: &[&str], members: Vec<AccessListMember>) -> AccessList {
        AccessList {
            id: AccessListId::new(id),
            owners: vec![],
            members,
            grants: AccessListGrants {
                roles: roles.iter().map(|r| RoleName::new(*r)).collect(),
                traits: Default::default(),
            },
        }
    }

    #[test]
    fn nested_membership_inherits_roles() {
        let user = UserId::new("alice");
        let inner = list("inner", &["db-reader"], vec![]);
        let outer = list(
            "outer",
            &["ssh-user"],
            vec![
                AccessListMember::User(user.clone()),
                AccessListMember::List(AccessListId::new("inner")),
            ],
        );
        let mut lists = HashMap::new();
        lists.insert(AccessListId::new("outer"), outer);
        lists.insert(AccessListId::new("inner"), inner);

        let roles = resolve_roles(&lists, &user, &[AccessListId::new("outer")]).unwrap();
        assert!(roles.contains(&RoleName::new("ssh-user")));
        assert!(roles.contains(&RoleName::new("db-reader")));
    }

    #[test]
    fn cycle_is_rejected() {
        let user = UserId::new("alice");
        let a = list(
            "a",
            &[],
            vec![
                AccessListMember::User(user.clone()),
                AccessListMember::List(AccessListId::new("b")),
            ],
        );
        let b = list("b", &[], vec![AccessListMember::List(AccessListId::new("a"))]);
        let mut lists = HashMap::new();
        lists.insert(AccessListId::new("a"), a);
        lists.insert(AccessListId::new("b"), b);

        let err = resolve_roles(&lists, &user, &[AccessListId::new("a")]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::FailedPrecondition);
    }
}
