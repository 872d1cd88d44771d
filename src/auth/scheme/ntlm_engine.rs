//! NTLM message generation (MS-NLMP).
//!
//! Only the messages a client sends are produced: Type 1 (negotiate) and
//! Type 3 (authenticate, NTLMv2 and LMv2 responses). Type 2 (challenge) is
//! decoded just far enough to read the server challenge and target info.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use md4::{Digest, Md4};
use md5::Md5;

use crate::auth::AuthError;

type HmacMd5 = Hmac<Md5>;

const SIGNATURE: &[u8; 8] = b"NTLMSSP\0";

const NEGOTIATE_UNICODE: u32 = 0x0000_0001;
const NEGOTIATE_OEM: u32 = 0x0000_0002;
const REQUEST_TARGET: u32 = 0x0000_0004;
const NEGOTIATE_NTLM: u32 = 0x0000_0200;
const NEGOTIATE_DOMAIN_SUPPLIED: u32 = 0x0000_1000;
const NEGOTIATE_WORKSTATION_SUPPLIED: u32 = 0x0000_2000;
const NEGOTIATE_ALWAYS_SIGN: u32 = 0x0000_8000;
const NEGOTIATE_EXTENDED_SESSION_SECURITY: u32 = 0x0008_0000;
const NEGOTIATE_TARGET_INFO: u32 = 0x0080_0000;
const NEGOTIATE_128: u32 = 0x2000_0000;
const NEGOTIATE_56: u32 = 0x8000_0000;

/// Seconds between 1601-01-01 and 1970-01-01.
const EPOCH_DIFFERENCE_SECS: u64 = 11_644_473_600;

/// Produces NTLM handshake messages as base64 strings.
pub trait NtlmEngine: fmt::Debug + Send + Sync {
    /// Builds the Type 1 message.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Authentication`] when the message cannot be built.
    fn type1_message(
        &self,
        domain: Option<&str>,
        workstation: Option<&str>,
    ) -> Result<String, AuthError>;

    /// Builds the Type 3 message answering the base64 Type 2 `challenge`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Authentication`] when the challenge cannot be
    /// decoded.
    fn type3_message(
        &self,
        user: &str,
        password: &str,
        domain: Option<&str>,
        workstation: Option<&str>,
        challenge: &str,
    ) -> Result<String, AuthError>;
}

/// NTLMv2 engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct NtlmV2Engine;

impl NtlmV2Engine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl NtlmEngine for NtlmV2Engine {
    fn type1_message(
        &self,
        domain: Option<&str>,
        workstation: Option<&str>,
    ) -> Result<String, AuthError> {
        let domain = domain.map(str::to_uppercase).unwrap_or_default();
        let workstation = workstation.map(str::to_uppercase).unwrap_or_default();

        let mut flags = NEGOTIATE_UNICODE
            | NEGOTIATE_OEM
            | REQUEST_TARGET
            | NEGOTIATE_NTLM
            | NEGOTIATE_ALWAYS_SIGN
            | NEGOTIATE_EXTENDED_SESSION_SECURITY
            | NEGOTIATE_128
            | NEGOTIATE_56;
        if !domain.is_empty() {
            flags |= NEGOTIATE_DOMAIN_SUPPLIED;
        }
        if !workstation.is_empty() {
            flags |= NEGOTIATE_WORKSTATION_SUPPLIED;
        }

        // Type 1 strings are OEM encoded.
        let mut message = MessageWriter::new(1, 32);
        message.put_u32(flags);
        let domain_slot = message.reserve_buffer();
        let workstation_slot = message.reserve_buffer();
        message.append_buffer(domain_slot, domain.as_bytes())?;
        message.append_buffer(workstation_slot, workstation.as_bytes())?;
        Ok(STANDARD.encode(message.finish()))
    }

    fn type3_message(
        &self,
        user: &str,
        password: &str,
        domain: Option<&str>,
        workstation: Option<&str>,
        challenge: &str,
    ) -> Result<String, AuthError> {
        let type2 = Type2Message::decode(challenge)?;
        let domain = domain.unwrap_or_default();
        let workstation = workstation.unwrap_or_default();

        let client_challenge: [u8; 8] = rand::random();
        let key = ntowf_v2(user, domain, password)?;
        let blob = client_blob(&client_challenge, windows_timestamp(), &type2.target_info);
        let nt_response = ntlm_v2_response(&key, &type2.challenge, &blob)?;
        let lm_response = lm_v2_response(&key, &type2.challenge, &client_challenge)?;

        let flags = type2.flags
            & (NEGOTIATE_UNICODE
                | REQUEST_TARGET
                | NEGOTIATE_NTLM
                | NEGOTIATE_ALWAYS_SIGN
                | NEGOTIATE_EXTENDED_SESSION_SECURITY
                | NEGOTIATE_TARGET_INFO
                | NEGOTIATE_128
                | NEGOTIATE_56);

        let mut message = MessageWriter::new(3, 64);
        let lm_slot = message.reserve_buffer();
        let nt_slot = message.reserve_buffer();
        let domain_slot = message.reserve_buffer();
        let user_slot = message.reserve_buffer();
        let workstation_slot = message.reserve_buffer();
        let session_key_slot = message.reserve_buffer();
        message.put_u32(flags | NEGOTIATE_UNICODE);
        message.append_buffer(lm_slot, &lm_response)?;
        message.append_buffer(nt_slot, &nt_response)?;
        message.append_buffer(domain_slot, &utf16le(domain))?;
        message.append_buffer(user_slot, &utf16le(user))?;
        message.append_buffer(workstation_slot, &utf16le(workstation))?;
        message.append_buffer(session_key_slot, &[])?;
        Ok(STANDARD.encode(message.finish()))
    }
}

/// The parts of a Type 2 message the client needs.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Type2Message {
    flags: u32,
    challenge: [u8; 8],
    target_info: Vec<u8>,
}

impl Type2Message {
    fn decode(encoded: &str) -> Result<Self, AuthError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| AuthError::authentication(format!("invalid NTLM challenge encoding: {e}")))?;
        if bytes.len() < 32 || &bytes[..8] != SIGNATURE || read_u32(&bytes, 8) != Some(2) {
            return Err(AuthError::authentication("NTLM challenge is not a Type 2 message"));
        }
        let flags = read_u32(&bytes, 20)
            .ok_or_else(|| AuthError::authentication("truncated NTLM challenge"))?;
        let mut challenge = [0_u8; 8];
        challenge.copy_from_slice(&bytes[24..32]);

        let target_info = if bytes.len() >= 48 {
            read_buffer(&bytes, 40)
                .ok_or_else(|| AuthError::authentication("NTLM target info out of bounds"))?
                .to_vec()
        } else {
            Vec::new()
        };
        Ok(Self {
            flags,
            challenge,
            target_info,
        })
    }
}

/// Builds a message with a fixed header followed by a payload of security
/// buffers.
struct MessageWriter {
    header: Vec<u8>,
    payload: Vec<u8>,
    header_len: usize,
}

impl MessageWriter {
    fn new(message_type: u32, header_len: usize) -> Self {
        let mut header = Vec::with_capacity(header_len);
        header.extend_from_slice(SIGNATURE);
        header.extend_from_slice(&message_type.to_le_bytes());
        Self {
            header,
            payload: Vec::new(),
            header_len,
        }
    }

    fn put_u32(&mut self, value: u32) {
        self.header.extend_from_slice(&value.to_le_bytes());
    }

    /// Reserves an 8-byte security buffer descriptor; returns its position.
    fn reserve_buffer(&mut self) -> usize {
        let slot = self.header.len();
        self.header.extend_from_slice(&[0; 8]);
        slot
    }

    fn append_buffer(&mut self, slot: usize, data: &[u8]) -> Result<(), AuthError> {
        let too_large = || AuthError::authentication("NTLM message field too large");
        let len = u16::try_from(data.len()).map_err(|_| too_large())?;
        let offset = u32::try_from(self.header_len + self.payload.len()).map_err(|_| too_large())?;
        self.header[slot..slot + 2].copy_from_slice(&len.to_le_bytes());
        self.header[slot + 2..slot + 4].copy_from_slice(&len.to_le_bytes());
        self.header[slot + 4..slot + 8].copy_from_slice(&offset.to_le_bytes());
        self.payload.extend_from_slice(data);
        Ok(())
    }

    fn finish(mut self) -> Vec<u8> {
        self.header.resize(self.header_len, 0);
        self.header.extend_from_slice(&self.payload);
        self.header
    }
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let raw: [u8; 4] = bytes.get(at..at + 4)?.try_into().ok()?;
    Some(u32::from_le_bytes(raw))
}

fn read_buffer(bytes: &[u8], at: usize) -> Option<&[u8]> {
    let len: [u8; 2] = bytes.get(at..at + 2)?.try_into().ok()?;
    let len = usize::from(u16::from_le_bytes(len));
    let offset = usize::try_from(read_u32(bytes, at + 4)?).ok()?;
    bytes.get(offset..offset.checked_add(len)?)
}

fn utf16le(value: &str) -> Vec<u8> {
    value.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

fn hmac_md5(key: &[u8], parts: &[&[u8]]) -> Result<[u8; 16], AuthError> {
    let mut mac = HmacMd5::new_from_slice(key)
        .map_err(|_| AuthError::authentication("invalid HMAC key"))?;
    for part in parts {
        mac.update(part);
    }
    Ok(to_block(&mac.finalize().into_bytes()))
}

fn to_block(digest: &[u8]) -> [u8; 16] {
    let mut block = [0_u8; 16];
    block.copy_from_slice(&digest[..16]);
    block
}

/// MD4 of the UTF-16LE password.
fn nt_hash(password: &str) -> [u8; 16] {
    to_block(&Md4::digest(utf16le(password)))
}

/// NTOWFv2: HMAC-MD5 keyed by the NT hash over upper-cased user and domain.
fn ntowf_v2(user: &str, domain: &str, password: &str) -> Result<[u8; 16], AuthError> {
    let identity = utf16le(&format!("{}{domain}", user.to_uppercase()));
    hmac_md5(&nt_hash(password), &[&identity])
}

/// Tenths of microseconds since 1601-01-01.
fn windows_timestamp() -> u64 {
    let unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (unix.as_secs() + EPOCH_DIFFERENCE_SECS) * 10_000_000 + u64::from(unix.subsec_nanos() / 100)
}

fn client_blob(client_challenge: &[u8; 8], timestamp: u64, target_info: &[u8]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(32 + target_info.len());
    blob.extend_from_slice(&[0x01, 0x01, 0x00, 0x00]);
    blob.extend_from_slice(&[0; 4]);
    blob.extend_from_slice(&timestamp.to_le_bytes());
    blob.extend_from_slice(client_challenge);
    blob.extend_from_slice(&[0; 4]);
    blob.extend_from_slice(target_info);
    blob.extend_from_slice(&[0; 4]);
    blob
}

fn ntlm_v2_response(
    key: &[u8; 16],
    server_challenge: &[u8; 8],
    blob: &[u8],
) -> Result<Vec<u8>, AuthError> {
    let proof = hmac_md5(key, &[server_challenge, blob])?;
    let mut response = proof.to_vec();
    response.extend_from_slice(blob);
    Ok(response)
}

fn lm_v2_response(
    key: &[u8; 16],
    server_challenge: &[u8; 8],
    client_challenge: &[u8; 8],
) -> Result<Vec<u8>, AuthError> {
    let proof = hmac_md5(key, &[server_challenge, client_challenge])?;
    let mut response = proof.to_vec();
    response.extend_from_slice(client_challenge);
    Ok(response)
}
