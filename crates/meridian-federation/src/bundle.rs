//! CA bundle export/import: the PEM blocks a root cluster publishes at
//! `/webapi/auth/export` and a leaf cluster imports to learn which keys
//! to trust for a given CA type. Each block carries a comment header
//! naming the CA type, the PEM analogue of an HTTP header.

use base64::Engine;
use meridian_ca::CertAuthority;
use meridian_core::model::CaType;
use meridian_core::{ErrorKind, MeridianError};

const HEADER_NAME: &str = "X-Meridian-CA-Type";
const BEGIN: &str = "-----BEGIN MERIDIAN CA KEY-----";
const END: &str = "-----END MERIDIAN CA KEY-----";

#[derive(Debug, Clone)]
pub struct CaBundle {
    pub ca_type: CaType,
    pub public_keys: Vec<Vec<u8>>,
}

/// Exports every currently-trusted public key for one CA (active, plus
/// additional-trusted keys mid-rotation) as a single PEM document.
pub fn export_bundle(ca: &CertAuthority) -> String {
    let mut out = String::new();
    for key in ca.exported_public_keys() {
        out.push_str(BEGIN);
        out.push('\n');
        out.push_str(&format!("{HEADER_NAME}: {:?}\n", ca.ca_type));
        out.push('\n');
        let encoded = base64::engine::general_purpose::STANDARD.encode(&key);
        for chunk in encoded.as_bytes().chunks(64) {
            out.push_str(std::str::from_utf8(chunk).unwrap());
            out.push('\n');
        }
        out.push_str(END);
        out.push('\n');
    }
    out
}

/// Parses a PEM document produced by [`export_bundle`], grouping the
/// contained keys by their declared CA type. Every block must carry a
/// matching `X-Meridian-CA-Type` header; mixed-type bundles come back as
/// multiple [`CaBundle`] entries.
pub fn import_bundle(pem: &str) -> Result<Vec<CaBundle>, MeridianError> {
    let mut bundles: Vec<CaBundle> = Vec::new();
    let mut lines = pem.lines().peekable();

    while let Some(line) = lines.next() {
        if line.trim() != BEGIN {
            continue;
        }
        let header_line = lines
            .next()
            .ok_or_else(|| MeridianError::invalid_argument("CA bundle block missing header"))?;
        let ca_type = parse_ca_type_header(header_line)?;

        let mut body = String::new();
        for body_line in lines.by_ref() {
            if body_line.trim() == END {
                break;
            }
            if !body_line.trim().is_empty() {
                body.push_str(body_line.trim());
            }
        }
        if body.is_empty() {
            return Err(MeridianError::invalid_argument("CA bundle block missing base64 body"));
        }
        let key = base64::engine::general_purpose::STANDARD
            .decode(body)
            .map_err(|e| MeridianError::with_source(ErrorKind::InvalidArgument, "CA bundle block is not valid base64", e))?;

        match bundles.iter_mut().find(|b| b.ca_type == ca_type) {
            Some(existing) => existing.public_keys.push(key),
            None => bundles.push(CaBundle { ca_type, public_keys: vec![key] }),
        }
    }

    if bundles.is_empty() {
        return Err(MeridianError::invalid_argument("CA bundle contains no blocks"));
    }
    Ok(bundles)
}

fn parse_ca_type_header(line: &str) -> Result<CaType, MeridianError> {
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| MeridianError::invalid_argument("CA bundle header is malformed"))?;
    if name.trim() != HEADER_NAME {
        return Err(MeridianError::invalid_argument(format!("expected header {HEADER_NAME}, got {name}")));
    }
    match value.trim() {
        "Host" => Ok(CaType::Host),
        "User" => Ok(CaType::User),
        "Db" => Ok(CaType::Db),
        "DbClient" => Ok(CaType::DbClient),
        "Openssh" => Ok(CaType::Openssh),
        "Jwt" => Ok(CaType::Jwt),
        "SamlIdp" => Ok(CaType::SamlIdp),
        "Spiffe" => Ok(CaType::Spiffe),
        "OidcIdp" => Ok(CaType::OidcIdp),
        other => Err(MeridianError::invalid_argument(format!("unknown CA type '{other}' in bundle"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_ca::KeystoreBackend;

    #[test]
    fn export_then_import_round_trips_active_key() {
        let ca = CertAuthority::bootstrap(CaType::User, KeystoreBackend::Software, chrono::Utc::now());
        let pem = export_bundle(&ca);
        assert!(pem.contains("X-Meridian-CA-Type: User"));

        let bundles = import_bundle(&pem).unwrap();
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].ca_type, CaType::User);
        assert_eq!(bundles[0].public_keys, vec![ca.active.public_key.clone()]);
    }

    #[test]
    fn import_rejects_missing_header() {
        let broken = format!("{BEGIN}\n\nYWJj\n{END}\n");
        assert!(import_bundle(&broken).is_err());
    }
}
