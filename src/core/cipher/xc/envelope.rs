//! xc message format.
//!
//! ```text
//! {
//!   "version": 1,
//!   "header": {
//!     "sender": "<fingerprint>",
//!     "recipients": { "<fingerprint>": "<base64 wrapped session key>", ... },
//!     "metadata": { ... }
//!   },
//!   "compressed": false,
//!   "chunks": [ "<base64 ciphertext>", ... ]
//! }
//! ```
//!
//! The body is split into 16 KiB chunks, each sealed with XChaCha20-Poly1305
//! under the session key. Chunk `i` uses the nonce `be64(i) || 0^16` and
//! authenticates `be64(count) || be32(version) || compressed` as associated
//! data, so reordering, dropping or appending chunks, or flipping the
//! compression flag, fails to open. A message always carries at least one
//! chunk.
//!
//! The session key is wrapped per recipient: X25519(sender, recipient) is
//! run through HKDF-SHA256 bound to both public keys, and the result seals
//! the session key with a random 24-byte nonce prepended.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::Zeroizing;

use super::encoding::Blob;
use crate::error::{CipherError, Result};

pub const VERSION: u32 = 1;
pub const CHUNK_SIZE: usize = 16 * 1024;

const WRAP_INFO: &[u8] = b"cellar xc v1 key wrap";
const NONCE_LEN: usize = 24;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Header {
    pub sender: String,
    pub recipients: BTreeMap<String, Blob>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub version: u32,
    pub header: Header,
    #[serde(default)]
    pub compressed: bool,
    pub chunks: Vec<Blob>,
}

impl Message {
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let msg: Message =
            serde_json::from_slice(buf).map_err(|e| CipherError::Malformed(e.to_string()))?;
        if msg.version != VERSION {
            return Err(CipherError::Malformed(format!(
                "unsupported version {}",
                msg.version
            ))
            .into());
        }
        if msg.header.recipients.is_empty() {
            return Err(CipherError::Malformed("no recipients in header".to_string()).into());
        }
        Ok(msg)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Sorted recipient fingerprints.
    pub fn recipient_ids(&self) -> Vec<String> {
        self.header.recipients.keys().cloned().collect()
    }
}

/// A fresh random 32-byte session key.
pub fn session_key() -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    OsRng.fill_bytes(&mut key[..]);
    key
}

/// Gzip `data` if that makes it smaller. Returns the body and whether it
/// was compressed.
pub fn compress(data: &[u8]) -> Result<(Zeroizing<Vec<u8>>, bool)> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data)?;
    let packed = Zeroizing::new(enc.finish()?);
    if packed.len() < data.len() {
        Ok((packed, true))
    } else {
        Ok((Zeroizing::new(data.to_vec()), false))
    }
}

pub fn decompress(data: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let mut out = Zeroizing::new(Vec::new());
    GzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|_| CipherError::DecryptFailed)?;
    Ok(out)
}

fn chunk_nonce(index: u64) -> XNonce {
    let mut nonce = [0u8; NONCE_LEN];
    nonce[..8].copy_from_slice(&index.to_be_bytes());
    XNonce::clone_from_slice(&nonce)
}

fn chunk_aad(count: usize, compressed: bool) -> [u8; 13] {
    let mut aad = [0u8; 13];
    aad[..8].copy_from_slice(&(count as u64).to_be_bytes());
    aad[8..12].copy_from_slice(&VERSION.to_be_bytes());
    aad[12] = u8::from(compressed);
    aad
}

/// Seal `data` into chunks under `key`. `compressed` must match the flag
/// stored next to the chunks.
pub fn seal_chunks(key: &[u8; 32], data: &[u8], compressed: bool) -> Result<Vec<Blob>> {
    let cipher = XChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| CipherError::EncryptFailed(e.to_string()))?;

    let pieces: Vec<&[u8]> = if data.is_empty() {
        vec![&[][..]]
    } else {
        data.chunks(CHUNK_SIZE).collect()
    };
    let aad = chunk_aad(pieces.len(), compressed);

    pieces
        .iter()
        .enumerate()
        .map(|(i, piece)| {
            cipher
                .encrypt(
                    &chunk_nonce(i as u64),
                    Payload {
                        msg: piece,
                        aad: &aad,
                    },
                )
                .map(Blob)
                .map_err(|e| CipherError::EncryptFailed(e.to_string()).into())
        })
        .collect()
}

/// Open chunks sealed by [`seal_chunks`].
pub fn open_chunks(key: &[u8; 32], chunks: &[Blob], compressed: bool) -> Result<Zeroizing<Vec<u8>>> {
    if chunks.is_empty() {
        return Err(CipherError::DecryptFailed.into());
    }
    let cipher = XChaCha20Poly1305::new_from_slice(key).map_err(|_| CipherError::DecryptFailed)?;
    let aad = chunk_aad(chunks.len(), compressed);

    // bounded by what was actually read, not by the claimed chunk count
    let sealed: usize = chunks.iter().map(|c| c.len()).sum();
    let mut out = Zeroizing::new(Vec::with_capacity(sealed));
    for (i, chunk) in chunks.iter().enumerate() {
        let plain = Zeroizing::new(
            cipher
                .decrypt(
                    &chunk_nonce(i as u64),
                    Payload {
                        msg: chunk,
                        aad: &aad,
                    },
                )
                .map_err(|_| CipherError::DecryptFailed)?,
        );
        out.extend_from_slice(&plain);
    }
    Ok(out)
}

fn wrapping_key(
    shared: &x25519_dalek::SharedSecret,
    sender: &X25519Public,
    recipient: &X25519Public,
) -> Option<Zeroizing<[u8; 32]>> {
    if !shared.was_contributory() {
        return None;
    }
    let mut info = Vec::with_capacity(WRAP_INFO.len() + 64);
    info.extend_from_slice(WRAP_INFO);
    info.extend_from_slice(sender.as_bytes());
    info.extend_from_slice(recipient.as_bytes());

    let hk = Hkdf::<Sha256>::new(None, shared.as_bytes());
    let mut okm = Zeroizing::new([0u8; 32]);
    hk.expand(&info, &mut okm[..]).ok()?;
    Some(okm)
}

/// Wrap the session key for one recipient.
pub fn wrap_key(
    sender: &StaticSecret,
    recipient: &X25519Public,
    session: &[u8; 32],
) -> Result<Vec<u8>> {
    let sender_pub = X25519Public::from(sender);
    let shared = sender.diffie_hellman(recipient);
    let key = wrapping_key(&shared, &sender_pub, recipient)
        .ok_or_else(|| CipherError::EncryptFailed("degenerate recipient key".to_string()))?;

    let cipher = XChaCha20Poly1305::new_from_slice(&key[..])
        .map_err(|e| CipherError::EncryptFailed(e.to_string()))?;
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    let sealed = cipher
        .encrypt(XNonce::from_slice(&nonce), &session[..])
        .map_err(|e| CipherError::EncryptFailed(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Recover the session key. Every failure is the same `DecryptFailed`.
pub fn unwrap_key(
    recipient: &StaticSecret,
    sender: &X25519Public,
    wrapped: &[u8],
) -> Result<Zeroizing<[u8; 32]>> {
    if wrapped.len() <= NONCE_LEN {
        return Err(CipherError::DecryptFailed.into());
    }
    let recipient_pub = X25519Public::from(recipient);
    let shared = recipient.diffie_hellman(sender);
    let key = wrapping_key(&shared, sender, &recipient_pub).ok_or(CipherError::DecryptFailed)?;

    let cipher =
        XChaCha20Poly1305::new_from_slice(&key[..]).map_err(|_| CipherError::DecryptFailed)?;
    let (nonce, sealed) = wrapped.split_at(NONCE_LEN);
    let plain = Zeroizing::new(
        cipher
            .decrypt(XNonce::from_slice(nonce), sealed)
            .map_err(|_| CipherError::DecryptFailed)?,
    );
    let raw: [u8; 32] = plain
        .as_slice()
        .try_into()
        .map_err(|_| CipherError::DecryptFailed)?;
    Ok(Zeroizing::new(raw))
}
