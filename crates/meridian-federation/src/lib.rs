//! Trusted-cluster federation: exporting and importing CA bundles
//! between clusters, mapping a leaf's remote roles onto local roles, and
//! re-issuing a leaf-local certificate pair for an already-authenticated
//! remote identity.

pub mod bundle;
pub mod mtls;
pub mod reissue;
pub mod role_mapping;

pub use bundle::{export_bundle, import_bundle, CaBundle};
pub use reissue::{reissue_for_leaf, RemoteIdentity};
pub use role_mapping::{RoleMapper, RoleMappingRule};
