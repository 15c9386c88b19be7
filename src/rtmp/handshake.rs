// RTMP handshake
//
// The plain/legacy handshake: C0/C1 -> S0/S1/S2 -> C2, with the 1536-byte
// C1/C2 payloads treated as opaque (no Adobe HMAC-SHA256 digest
// verification). This intentionally does not interoperate with clients or
// servers that refuse to complete a handshake without a valid digest.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::error::ProtocolError;

use super::constants::{RTMP_HANDSHAKE_SIG_SIZE, RTMP_VERSION};

/// Where a connection's handshake currently stands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeState {
    /// Accepted connection, waiting for C0+C1
    AwaitingC0C1,
    /// Accepted connection, sent S0+S1+S2, waiting for C2
    AwaitingC2,
    /// Dialed connection, waiting for S0+S1
    AwaitingS0S1,
    /// Dialed connection, sent C2, waiting for S2
    AwaitingS2,
    /// Handshake complete, chunk stream may begin
    Done,
}

/// Builds a 1536-byte handshake signature: 4-byte zero timestamp, 4-byte
/// zero (the "zero" field used by the digest handshake, unused here), and
/// 1528 random bytes.
pub fn build_signature() -> Vec<u8> {
    let mut sig = vec![0u8; RTMP_HANDSHAKE_SIG_SIZE];
    let mut random_part = vec![0u8; RTMP_HANDSHAKE_SIG_SIZE - 8];
    let mut rng = StdRng::from_os_rng();
    rng.fill_bytes(&mut random_part);
    sig[8..].copy_from_slice(&random_part);
    sig
}

/// Server side: validates C0 and builds S0+S1+S2 to send back.
///
/// S2 simply echoes C1 back to the peer, which is what the plain
/// handshake's "acknowledgement" amounts to.
pub fn respond_to_c0_c1(c0: u8, c1: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if c0 != RTMP_VERSION {
        return Err(ProtocolError::UnsupportedVersion(c0));
    }
    if c1.len() != RTMP_HANDSHAKE_SIG_SIZE {
        return Err(ProtocolError::Truncated);
    }

    let mut out = Vec::with_capacity(1 + RTMP_HANDSHAKE_SIG_SIZE * 2);
    out.push(RTMP_VERSION);
    out.extend(build_signature());
    out.extend_from_slice(c1);
    Ok(out)
}

/// Client side: builds the initial C0+C1 to send when dialing out.
pub fn build_c0_c1() -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + RTMP_HANDSHAKE_SIG_SIZE);
    out.push(RTMP_VERSION);
    out.extend(build_signature());
    out
}

/// Client side: validates S0+S1 and builds C2 (an echo of S1).
pub fn respond_to_s0_s1(s0: u8, s1: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if s0 != RTMP_VERSION {
        return Err(ProtocolError::UnsupportedVersion(s0));
    }
    if s1.len() != RTMP_HANDSHAKE_SIG_SIZE {
        return Err(ProtocolError::Truncated);
    }

    Ok(s1.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_accepts_matching_version_and_echoes_c1_in_s2() {
        let c1 = build_signature();
        let response = respond_to_c0_c1(RTMP_VERSION, &c1).unwrap();

        assert_eq!(response[0], RTMP_VERSION);
        let s1 = &response[1..1 + RTMP_HANDSHAKE_SIG_SIZE];
        let s2 = &response[1 + RTMP_HANDSHAKE_SIG_SIZE..];
        assert_eq!(s2, c1.as_slice());
        assert_eq!(s1.len(), RTMP_HANDSHAKE_SIG_SIZE);
    }

    #[test]
    fn server_rejects_bad_version_byte() {
        let c1 = build_signature();
        let err = respond_to_c0_c1(0x06, &c1).unwrap_err();
        assert!(matches!(err, ProtocolError::UnsupportedVersion(0x06)));
    }

    #[test]
    fn client_echoes_s1_back_as_c2() {
        let s1 = build_signature();
        let c2 = respond_to_s0_s1(RTMP_VERSION, &s1).unwrap();
        assert_eq!(c2, s1);
    }
}
