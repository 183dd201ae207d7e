//! SSH certificate construction. Encodes principals and the identity
//! claims into a length-prefixed body, then signs it with the CA's
//! active key. This is a purpose-built encoding rather than a verbatim
//! implementation of the OpenSSH certificate wire format, since nothing
//! in the dependency stack parses that format and the proxy/auth sides
//! here both only need to agree with each other.

use crate::claims::IdentityClaims;
use meridian_ca::KeySigner;
use meridian_core::MeridianError;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
pub struct SshCertificate {
    pub cert_bytes: Vec<u8>,
    pub principals: Vec<String>,
    pub claims: IdentityClaims,
}

pub fn issue(
    claims: &IdentityClaims,
    subject_public_key: &[u8],
    signer: &dyn KeySigner,
) -> Result<SshCertificate, MeridianError> {
    let body = encode_body(subject_public_key, claims);
    let digest = Sha256::digest(&body);
    let signature = signer.sign(&digest)?;

    let mut cert_bytes = Vec::with_capacity(body.len() + signature.0.len() + 4);
    write_bytes(&mut cert_bytes, &body);
    write_bytes(&mut cert_bytes, &signature.0);

    Ok(SshCertificate {
        cert_bytes,
        principals: claims.logins.clone(),
        claims: claims.clone(),
    })
}

fn encode_body(subject_public_key: &[u8], claims: &IdentityClaims) -> Vec<u8> {
    let mut body = Vec::new();
    write_bytes(&mut body, subject_public_key);
    write_bytes(&mut body, claims.to_json().as_slice());
    write_bytes(
        &mut body,
        claims.expires_at.timestamp().to_be_bytes().as_slice(),
    );
    body
}

fn write_bytes(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use meridian_ca::signer::Ed25519Signer;
    use meridian_core::ids::UserId;

    #[test]
    fn issued_cert_carries_logins_and_claims() {
        let signer = Ed25519Signer::generate();
        let claims = IdentityClaims {
            user: UserId::new("alice"),
            logins: vec!["alice".into(), "root".into()],
            route_info: "cluster1".into(),
            mfa_required: true,
            issued_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        };
        let cert = issue(&claims, b"subject-key", &signer).unwrap();
        assert_eq!(cert.principals, claims.logins);
        assert!(!cert.cert_bytes.is_empty());
    }
}
