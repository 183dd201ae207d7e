//! X.509 certificate construction via `rcgen`. The CA's signing key
//! never leaves `meridian-ca`: it is wrapped as an `rcgen::RemoteKeyPair`
//! so `rcgen` calls back into `KeySigner::sign` for the actual operation
//! instead of being handed key bytes.

use crate::claims::IdentityClaims;
use meridian_ca::KeySigner;
use meridian_core::MeridianError;
use rcgen::{CertificateParams, CustomExtension, DistinguishedName, DnType, KeyPair, RemoteKeyPair, SanType};

#[derive(Debug, Clone)]
pub struct TlsCertificate {
    pub der: Vec<u8>,
    pub subject: String,
    pub claims: IdentityClaims,
}

struct CaRemoteKey<'a> {
    signer: &'a dyn KeySigner,
    public_key: Vec<u8>,
}

impl<'a> RemoteKeyPair for CaRemoteKey<'a> {
    fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    fn sign(&self, msg: &[u8]) -> Result<Vec<u8>, rcgen::Error> {
        self.signer
            .sign(msg)
            .map(|s| s.0)
            .map_err(|_| rcgen::Error::RemoteKeyError)
    }

    fn algorithm(&self) -> &'static rcgen::SignatureAlgorithm {
        &rcgen::PKCS_ED25519
    }
}

pub fn issue(
    claims: &IdentityClaims,
    _subject_public_key: &[u8],
    signer: &dyn KeySigner,
) -> Result<TlsCertificate, MeridianError> {
    let remote = CaRemoteKey {
        signer,
        public_key: signer.public_key(),
    };
    let key_pair = KeyPair::from_remote(Box::new(remote)).map_err(|e| {
        MeridianError::with_source(
            meridian_core::ErrorKind::FailedPrecondition,
            "failed to wrap CA signer for X.509 issuance",
            e,
        )
    })?;

    let subject = claims.user.as_str().to_string();
    let mut params = CertificateParams::new(vec![subject.clone()]).map_err(|e| {
        MeridianError::with_source(
            meridian_core::ErrorKind::InvalidArgument,
            "invalid subject alt name for certificate",
            e,
        )
    })?;
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, subject.clone());
    params.distinguished_name = dn;
    params.subject_alt_names = vec![SanType::DnsName(
        subject
            .clone()
            .try_into()
            .unwrap_or_else(|_| rcgen::Ia5String::try_from("invalid".to_string()).unwrap()),
    )];
    params.not_before = time::OffsetDateTime::from_unix_timestamp(claims.issued_at.timestamp())
        .unwrap_or(time::OffsetDateTime::UNIX_EPOCH);
    params.not_after = time::OffsetDateTime::from_unix_timestamp(claims.expires_at.timestamp())
        .unwrap_or(time::OffsetDateTime::UNIX_EPOCH);
    params
        .custom_extensions
        .push(CustomExtension::from_oid_content(
            &[1, 3, 6, 1, 4, 1, 57501, 1],
            claims.to_json(),
        ));

    let cert = params.self_signed(&key_pair).map_err(|e| {
        MeridianError::with_source(
            meridian_core::ErrorKind::FailedPrecondition,
            "failed to sign X.509 certificate",
            e,
        )
    })?;

    Ok(TlsCertificate {
        der: cert.der().to_vec(),
        subject,
        claims: claims.clone(),
    })
}
