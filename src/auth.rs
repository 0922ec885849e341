use core::fmt;

use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::protocol::AUTH_CODE_LEN;
use crate::types::AuthType;

/// Width of user names and passwords on the wire.
pub(crate) const CREDENTIAL_LEN: usize = 16;

/// A password held as a fixed 16-byte, zero-padded buffer that zeroizes
/// its contents on drop and never shows up in `Debug` output.
#[derive(Clone)]
pub(crate) struct SecretBytes([u8; CREDENTIAL_LEN]);

impl SecretBytes {
    /// Pad (or truncate) `secret` to the wire width.
    pub(crate) fn new(secret: &[u8]) -> Self {
        Self(pad_credential(secret))
    }

    pub(crate) fn expose(&self) -> &[u8; CREDENTIAL_LEN] {
        &self.0
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<secret>")
    }
}

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Normalize a user name or password into the 16-byte wire field.
pub(crate) fn pad_credential(value: &[u8]) -> [u8; CREDENTIAL_LEN] {
    let mut out = [0u8; CREDENTIAL_LEN];
    let n = value.len().min(out.len());
    out[..n].copy_from_slice(&value[..n]);
    out
}

pub(crate) fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Auth code a message in a session of type `auth_type` must carry.
///
/// Only straight-password authentication produces a code; digests are
/// never negotiated by this endpoint.
pub(crate) fn auth_code_for(
    auth_type: AuthType,
    password: &SecretBytes,
) -> Option<[u8; AUTH_CODE_LEN]> {
    match auth_type {
        AuthType::Straight => Some(*password.expose()),
        _ => None,
    }
}

/// Check the auth code presented on an inbound message.
pub(crate) fn verify_auth_code(
    auth_type: AuthType,
    password: &SecretBytes,
    presented: Option<&[u8; AUTH_CODE_LEN]>,
) -> bool {
    match auth_type {
        AuthType::None => presented.is_none(),
        AuthType::Straight => presented.is_some_and(|code| ct_eq(code, password.expose())),
        // MD2/MD5/OEM digests are not implemented; fail closed.
        _ => false,
    }
}
