//! # Authzn
//!
//! Core primitives for passkey-style authentication: the WebAuthn binary
//! decoders, the OATH HOTP/TOTP engine and the cross-context handshake
//! protocol that carries credential artifacts between an isolated
//! authentication surface and a requesting application.
//!
//! Ledger verification, rendering and account management are external
//! collaborators; this crate only produces and consumes byte buffers and
//! protocol messages.

pub mod handshake;
pub mod oath;
pub mod webauthn;
