// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Integrity tagging: HMAC-SHA256 over stored payloads, plus plain SHA-256
// fingerprints for audit subjects.

use std::io::{self, Read};

use ring::hmac;
use sha2::{Digest, Sha256};

use crate::fingerprint::DerivedKey;

/// SHA-256 of everything `reader` yields, as lowercase hex.  The input is
/// streamed through the hasher, never buffered whole.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Bytes covered by a tag: the storage key, a NUL separator, then the payload.
/// Binding the key means an envelope copied under another key fails to verify.
fn tagged_message(storage_key: &str, payload: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(storage_key.len() + 1 + payload.len());
    message.extend_from_slice(storage_key.as_bytes());
    message.push(0);
    message.extend_from_slice(payload);
    message
}

/// HMAC-SHA256 tag for `payload` stored under `storage_key`, as lowercase hex.
pub fn sign(key: &DerivedKey, storage_key: &str, payload: &[u8]) -> String {
    let mac_key = hmac::Key::new(hmac::HMAC_SHA256, key.mac_bytes());
    let tag = hmac::sign(&mac_key, &tagged_message(storage_key, payload));
    hex::encode(tag.as_ref())
}

/// Check a hex tag in constant time.  Anything other than canonical
/// lowercase hex is rejected outright so that re-cased tags cannot verify.
pub fn verify(key: &DerivedKey, storage_key: &str, payload: &[u8], tag_hex: &str) -> bool {
    let Some(tag) = decode_lower_hex(tag_hex) else {
        return false;
    };
    let mac_key = hmac::Key::new(hmac::HMAC_SHA256, key.mac_bytes());
    hmac::verify(&mac_key, &tagged_message(storage_key, payload), &tag).is_ok()
}

/// Decode strictly lowercase hex.  `hex::decode` also accepts upper case,
/// which would let a single-byte edit of a stored string go unnoticed.
pub fn decode_lower_hex(s: &str) -> Option<Vec<u8>> {
    if !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return None;
    }
    hex::decode(s).ok()
}
