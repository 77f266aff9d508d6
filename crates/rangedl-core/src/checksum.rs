//! Checksum computation and post-download verification (SHA-256, SHA-1, MD5).
//!
//! Digests are computed on demand after the output file is complete, not inline
//! with the transfer, so hashing never slows the chunk workers down.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

use crate::error::DownloadError;

const BUF_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha256,
    Sha1,
    Md5,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "SHA256",
            HashAlgorithm::Sha1 => "SHA1",
            HashAlgorithm::Md5 => "MD5",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha1" => Ok(HashAlgorithm::Sha1),
            "md5" => Ok(HashAlgorithm::Md5),
            other => anyhow::bail!("unknown hash algorithm: {other}"),
        }
    }
}

/// Expected digests for a download, lowercase or uppercase hex.
/// Only the algorithms that are set are checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedDigests {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
}

impl ExpectedDigests {
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Set digests in SHA-256, SHA-1, MD5 order. Empty strings count as unset.
    pub fn iter(&self) -> impl Iterator<Item = (HashAlgorithm, &str)> {
        [
            (HashAlgorithm::Sha256, self.sha256.as_deref()),
            (HashAlgorithm::Sha1, self.sha1.as_deref()),
            (HashAlgorithm::Md5, self.md5.as_deref()),
        ]
        .into_iter()
        .filter_map(|(alg, v)| v.filter(|s| !s.is_empty()).map(|s| (alg, s)))
    }

    pub fn set(&mut self, alg: HashAlgorithm, hex: impl Into<String>) {
        let slot = match alg {
            HashAlgorithm::Sha256 => &mut self.sha256,
            HashAlgorithm::Sha1 => &mut self.sha1,
            HashAlgorithm::Md5 => &mut self.md5,
        };
        *slot = Some(hex.into());
    }
}

fn hash_file<D: Digest>(path: &Path) -> io::Result<String> {
    let mut f = File::open(path)?;
    let mut hasher = D::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compute the digest of a file as lowercase hex, reading in fixed-size blocks.
pub fn digest_path(path: &Path, alg: HashAlgorithm) -> io::Result<String> {
    match alg {
        HashAlgorithm::Sha256 => hash_file::<Sha256>(path),
        HashAlgorithm::Sha1 => hash_file::<sha1::Sha1>(path),
        HashAlgorithm::Md5 => hash_file::<md5::Md5>(path),
    }
}

pub fn sha256_path(path: &Path) -> io::Result<String> {
    digest_path(path, HashAlgorithm::Sha256)
}

/// Check every expected digest against the file. The first mismatch is returned
/// as `DownloadError::Verification`; the file itself is never touched.
pub fn verify_file(path: &Path, expected: &ExpectedDigests) -> Result<(), DownloadError> {
    for (alg, want) in expected.iter() {
        let actual = digest_path(path, alg)
            .map_err(|e| DownloadError::io(format!("hash {}", path.display()), e))?;
        if !actual.eq_ignore_ascii_case(want.trim()) {
            return Err(DownloadError::Verification {
                algorithm: alg,
                path: path.to_path_buf(),
                expected: want.trim().to_ascii_lowercase(),
                actual,
            });
        }
        tracing::debug!(algorithm = %alg, path = %path.display(), "checksum verified");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn hello_file() -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn sha256_path_empty_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(
            sha256_path(f.path()).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn known_digests_of_hello() {
        let f = hello_file();
        assert_eq!(
            digest_path(f.path(), HashAlgorithm::Sha256).unwrap(),
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
        assert_eq!(
            digest_path(f.path(), HashAlgorithm::Sha1).unwrap(),
            "f572d396fae9206628714fb2ce00f72e94f2258f"
        );
        assert_eq!(
            digest_path(f.path(), HashAlgorithm::Md5).unwrap(),
            "b1946ac92492d2347c6235b4d2611184"
        );
    }

    #[test]
    fn verify_accepts_uppercase_hex() {
        let f = hello_file();
        let expected = ExpectedDigests {
            md5: Some("B1946AC92492D2347C6235B4D2611184".into()),
            ..Default::default()
        };
        verify_file(f.path(), &expected).unwrap();
    }

    #[test]
    fn verify_reports_first_mismatch_and_keeps_file() {
        let f = hello_file();
        let expected = ExpectedDigests {
            sha256: Some("5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03".into()),
            sha1: Some("0000000000000000000000000000000000000000".into()),
            md5: None,
        };
        match verify_file(f.path(), &expected) {
            Err(DownloadError::Verification { algorithm, actual, .. }) => {
                assert_eq!(algorithm, HashAlgorithm::Sha1);
                assert_eq!(actual, "f572d396fae9206628714fb2ce00f72e94f2258f");
            }
            other => panic!("expected verification error, got {other:?}"),
        }
        assert!(f.path().exists());
    }

    #[test]
    fn empty_expectations_skip() {
        let expected = ExpectedDigests {
            sha256: Some(String::new()),
            ..Default::default()
        };
        assert!(expected.is_empty());
        verify_file(Path::new("/nonexistent/never/read"), &expected).unwrap();
    }

    #[test]
    fn algorithm_names_parse() {
        assert_eq!("sha256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!("SHA-1".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha1);
        assert_eq!("md5".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Md5);
        assert!("crc32".parse::<HashAlgorithm>().is_err());
    }
}
