//! The CA keystore and signer: holds signing key material for
//! multiple certificate authorities, may delegate private-key operations
//! to an HSM/KMS, and supports multi-key (active/standby) authorities for
//! rotation.

pub mod keystore;
pub mod rotation;
pub mod signer;
pub mod suite;

pub use keystore::{CertAuthority, KeyHandle, KeystoreBackend};
pub use rotation::{RotationPhase, RotationState};
pub use signer::{KeySigner, Signature, SoftwareSigner};
pub use suite::SignatureSuite;
