//! Nostr event model and Schnorr signing.

use anyhow::{anyhow, Result};
use secp256k1::{schnorr::Signature, Keypair, Message, Secp256k1, XOnlyPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Kind number for a plain text note (NIP-01).
pub const KIND_TEXT_NOTE: u32 = 1;
/// Kind number for a picture post (NIP-68).
pub const KIND_PICTURE: u32 = 20;

/// Wrapper for a Nostr tag expressed as an array of strings.
///
/// Tags appear as small arrays where the first element denotes the type and the
/// following elements hold data. The bot emits:
///
/// - `t` – free-form topic or hashtag
/// - `d` – date identifier for the calendar entry (`YYYY-MM-DD`)
/// - `r` – reference URL
/// - `title`, `summary`, `m`, `imeta` – picture-post metadata
///
/// Each tag is stored verbatim, so a `["t", "history"]` topic is represented as
/// `Tag(vec!["t".into(), "history".into()])`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag(pub Vec<String>);

/// Signed Nostr event as transmitted to relays.
///
/// ```json
/// {
///   "id": "aa11",
///   "pubkey": "deadbeef...",
///   "kind": 1,
///   "created_at": 1700000000,
///   "tags": [["t", "history"], ["d", "2009-01-03"]],
///   "content": "Genesis Block",
///   "sig": "deadbeef"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Event identifier (hex of SHA-256 hash).
    pub id: String,
    /// Author public key (hex).
    pub pubkey: String,
    /// Kind number, e.g. `1` or `20`.
    pub kind: u32,
    /// Unix timestamp of creation.
    pub created_at: u64,
    /// Structured metadata tags.
    pub tags: Vec<Tag>,
    /// Event content body.
    pub content: String,
    /// Schnorr signature over the event hash.
    pub sig: String,
}

/// An event that has been composed but not yet bound to an identity.
///
/// Drafts carry everything except the author fields; signing derives the
/// pubkey, the content-addressed id, and the signature in one step.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    /// Unix timestamp of creation.
    pub created_at: u64,
    /// Kind number.
    pub kind: u32,
    /// Structured metadata tags.
    pub tags: Vec<Tag>,
    /// Event content body.
    pub content: String,
}

impl EventDraft {
    /// Sign the draft with a hex-encoded secret key, producing the wire event.
    ///
    /// The id is the SHA-256 of the canonical
    /// `[0, pubkey, created_at, kind, tags, content]` serialization.
    pub fn sign(&self, secret_hex: &str) -> Result<Event> {
        let secp = Secp256k1::new();
        let bytes =
            hex::decode(secret_hex.trim()).map_err(|e| anyhow!("private key is not hex: {e}"))?;
        let keypair = Keypair::from_seckey_slice(&secp, &bytes)
            .map_err(|e| anyhow!("invalid private key: {e}"))?;
        let pubkey = hex::encode(keypair.x_only_public_key().0.serialize());
        let hash = canonical_hash(&pubkey, self.created_at, self.kind, &self.tags, &self.content);
        let msg = Message::from_digest_slice(&hash)?;
        let sig = secp.sign_schnorr_no_aux_rand(&msg, &keypair);
        Ok(Event {
            id: hex::encode(hash),
            pubkey,
            kind: self.kind,
            created_at: self.created_at,
            tags: self.tags.clone(),
            content: self.content.clone(),
            sig: hex::encode(sig.as_ref()),
        })
    }
}

/// Compute the canonical NIP-01 event hash.
fn canonical_hash(
    pubkey: &str,
    created_at: u64,
    kind: u32,
    tags: &[Tag],
    content: &str,
) -> [u8; 32] {
    let arr = serde_json::json!([0, pubkey, created_at, kind, tags, content]);
    Sha256::digest(arr.to_string().as_bytes()).into()
}

/// Verify that an event's id matches its contents and that the Schnorr
/// signature is valid for the embedded pubkey.
pub fn verify_event(ev: &Event) -> Result<()> {
    let hash = canonical_hash(&ev.pubkey, ev.created_at, ev.kind, &ev.tags, &ev.content);
    if hex::encode(hash) != ev.id {
        return Err(anyhow!("id mismatch"));
    }
    let sig = Signature::from_slice(&hex::decode(&ev.sig)?)?;
    let pk = XOnlyPublicKey::from_slice(&hex::decode(&ev.pubkey)?)?;
    let secp = Secp256k1::verification_only();
    let msg = Message::from_digest_slice(&hash)?;
    secp.verify_schnorr(&sig, &msg, &pk)?;
    Ok(())
}
