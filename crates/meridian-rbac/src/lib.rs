//! The access-control evaluator: resolves a principal's roles
//! (direct + inherited via access lists) into a concrete permission set
//! against labelled resources, evaluates predicate expressions, and
//! answers authorization questions.

pub mod access_list;
pub mod expr;
pub mod labels;
pub mod locks;
pub mod policy;

pub use access_list::{resolve_roles, AccessListResolver};
pub use expr::Expr;
pub use labels::matches_label;
pub use locks::{LockSet, PrincipalFacts};
pub use policy::{evaluate, AuthContext, EffectivePolicy};
