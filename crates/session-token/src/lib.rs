//! Signed, time-limited session tokens
//!
//! A session token binds an anonymous client to a pending (and later
//! completed) OAuth handshake without a server-side table of pending
//! sessions. The token carries a random session identifier and its issue
//! time, signed with HMAC-SHA256 under the relay's signing secret:
//!
//! ```text
//! base64url({"sid":"<uuid>","iat":<unix secs>}) "." base64url(hmac)
//! ```
//!
//! Verification checks the signature first, then freshness against the
//! caller-supplied maximum age.

pub mod codec;
pub mod error;

pub use codec::{SessionCodec, new_identifier};
pub use error::{Error, Result};
