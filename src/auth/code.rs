use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use time::{Duration, OffsetDateTime};

type HmacSha256 = Hmac<Sha256>;

/// A code is only redeemable this long after it was issued.
pub const CODE_TTL: Duration = Duration::minutes(5);

/// Which challenge a code belongs to. The two never mix: each purpose has its
/// own column pair and its own mail subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodePurpose {
    Verification,
    PasswordReset,
}

impl CodePurpose {
    pub fn subject(self) -> &'static str {
        match self {
            CodePurpose::Verification => "Verification Code",
            CodePurpose::PasswordReset => "Forgot Password Code",
        }
    }

    pub fn delivery_failure(self) -> &'static str {
        match self {
            CodePurpose::Verification => "Failed to send verification code",
            CodePurpose::PasswordReset => "Failed to send forgot password code",
        }
    }
}

/// Up to six decimal digits, no zero padding.
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(0..1_000_000u32).to_string()
}

/// Keyed fingerprint of a code, hex-encoded. Only fingerprints are stored;
/// the raw code exists in the outbound mail alone.
pub fn fingerprint(code: &str, key: &str) -> anyhow::Result<String> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| anyhow::anyhow!("hmac key error: {e}"))?;
    mac.update(code.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Strictly older than the TTL; a code redeemed exactly at the boundary still
/// counts.
pub fn expired(issued_at: OffsetDateTime, now: OffsetDateTime) -> bool {
    now - issued_at > CODE_TTL
}

/// Challenge state loaded for one purpose. Both columns must be present for
/// the pair to count as pending; a half-written pair is no code at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeState {
    None,
    Issued {
        fingerprint: String,
        issued_at: OffsetDateTime,
    },
}

impl CodeState {
    pub fn from_parts(fingerprint: Option<String>, issued_at: Option<OffsetDateTime>) -> Self {
        match (fingerprint, issued_at) {
            (Some(fingerprint), Some(issued_at)) => Self::Issued {
                fingerprint,
                issued_at,
            },
            _ => Self::None,
        }
    }
}
