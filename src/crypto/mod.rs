// ABOUTME: Cryptographic primitives for the LTI tool: key pair, RS256 tokens, and key sets
// ABOUTME: Signs and verifies self-issued tokens and verifies LMS-issued id_tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// JSON Web Key types and remote key set lookup
pub mod jwks;

/// Tool RSA key pair and RS256 token operations
pub mod keys;

pub use jwks::{fetch_remote_key, JsonWebKey, JsonWebKeySet};
pub use keys::{decode_unverified, random_nonce, verify_with_key, DecodedToken, ToolKeyPair};
