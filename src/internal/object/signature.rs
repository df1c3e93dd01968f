//! Author/committer/tagger identity lines.

use std::fmt::Display;

use bstr::ByteSlice;
use chrono::{DateTime, FixedOffset, TimeZone};
use serde::{Deserialize, Serialize};

use crate::errors::GitError;

/// Which header the signature came from.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureRole {
    Author,
    Committer,
    Tagger,
}

impl SignatureRole {
    fn as_str(&self) -> &'static str {
        match self {
            SignatureRole::Author => "author",
            SignatureRole::Committer => "committer",
            SignatureRole::Tagger => "tagger",
        }
    }

    fn from_str(s: &str) -> Result<SignatureRole, GitError> {
        match s {
            "author" => Ok(SignatureRole::Author),
            "committer" => Ok(SignatureRole::Committer),
            "tagger" => Ok(SignatureRole::Tagger),
            _ => Err(GitError::InvalidSignatureType(s.to_string())),
        }
    }
}

/// One `role name <email> epoch tz` identity line from a commit or tag.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    pub role: SignatureRole,
    pub name: String,
    pub email: String,
    pub when: DateTime<FixedOffset>,
}

impl Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} {} <{}> {} {}",
            self.role.as_str(),
            self.name,
            self.email,
            self.when.timestamp(),
            self.when.format("%z"),
        )
    }
}

impl Signature {
    /// Parse a signature line, e.g.
    /// `author Eli Ma <eli@patch.sh> 1678101573 +0800`.
    pub fn from_data(data: &[u8]) -> Result<Signature, GitError> {
        let line = data
            .to_str()
            .map_err(|e| GitError::InvalidSignatureType(e.to_string()))?
            .trim_end();

        let (role_str, rest) = line
            .split_once(' ')
            .ok_or_else(|| GitError::InvalidSignatureType(line.to_string()))?;
        let role = SignatureRole::from_str(role_str)?;

        let open = rest
            .find('<')
            .ok_or_else(|| GitError::InvalidSignatureType(line.to_string()))?;
        let close = rest
            .find('>')
            .filter(|c| *c >= open)
            .ok_or_else(|| GitError::InvalidSignatureType(line.to_string()))?;

        let name = rest[..open].trim().to_string();
        let email = rest[open + 1..close].to_string();

        let mut when_parts = rest[close + 1..].split_ascii_whitespace();
        let epoch: i64 = when_parts
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| GitError::InvalidSignatureType(line.to_string()))?;
        let tz = when_parts.next().unwrap_or("+0000");
        let offset = parse_timezone(tz)
            .ok_or_else(|| GitError::InvalidSignatureType(line.to_string()))?;
        let when = offset
            .timestamp_opt(epoch, 0)
            .single()
            .ok_or_else(|| GitError::InvalidSignatureType(line.to_string()))?;

        Ok(Signature {
            role,
            name,
            email,
            when,
        })
    }
}

/// Parse a `+HHMM`/`-HHMM` timezone suffix.
fn parse_timezone(tz: &str) -> Option<FixedOffset> {
    if tz.len() != 5 {
        return None;
    }
    let sign = match tz.as_bytes()[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let hours: i32 = tz[1..3].parse().ok()?;
    let minutes: i32 = tz[3..5].parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
