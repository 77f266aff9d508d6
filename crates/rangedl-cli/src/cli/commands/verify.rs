//! `rangedl verify <path>` – check digests, or print SHA-256 when none are given.

use std::path::Path;

use anyhow::Result;
use rangedl_core::checksum::{self, ExpectedDigests, HashAlgorithm};

pub async fn run_verify(path: &Path, expected: &[(HashAlgorithm, String)]) -> Result<()> {
    if expected.is_empty() {
        let digest = checksum::sha256_path(path)?;
        println!("{}  {}", digest, path.display());
        return Ok(());
    }
    let mut digests = ExpectedDigests::default();
    for (alg, hex) in expected {
        digests.set(*alg, hex.clone());
    }
    checksum::verify_file(path, &digests)?;
    let names: Vec<&str> = digests.iter().map(|(alg, _)| alg.as_str()).collect();
    println!("{}: OK ({})", path.display(), names.join(", "));
    Ok(())
}
