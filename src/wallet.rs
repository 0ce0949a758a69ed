use anyhow::{Context, Result, bail};
use solana_sdk::signature::Keypair;
use std::path::Path;

/// Parse one base58-encoded 64-byte secret key.
pub fn parse_keypair(encoded: &str) -> Result<Keypair> {
    let bytes = bs58::decode(encoded.trim())
        .into_vec()
        .context("invalid base58 in private key")?;
    Keypair::try_from(&bytes[..]).map_err(|e| anyhow::anyhow!("invalid private key: {e}"))
}

/// Load the wallet fleet from a line-delimited key file. Blank lines are
/// ignored; a missing or empty file aborts the run before any RPC traffic.
pub fn load_keypairs<P: AsRef<Path>>(path: P) -> Result<Vec<Keypair>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read key file: {}", path.display()))?;

    let mut keypairs = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let keypair = parse_keypair(line)
            .with_context(|| format!("{}:{}", path.display(), line_no + 1))?;
        keypairs.push(keypair);
    }

    if keypairs.is_empty() {
        bail!("No private keys found in {}", path.display());
    }
    Ok(keypairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::Signer;
    use std::io::Write;

    fn encoded_key() -> (Keypair, String) {
        let keypair = Keypair::new();
        let encoded = bs58::encode(keypair.to_bytes()).into_string();
        (keypair, encoded)
    }

    #[test]
    fn parses_base58_secret_key() {
        let (keypair, encoded) = encoded_key();
        let parsed = parse_keypair(&encoded).unwrap();
        assert_eq!(parsed.pubkey(), keypair.pubkey());
    }

    #[test]
    fn loads_key_file_skipping_blank_lines() {
        let (a, enc_a) = encoded_key();
        let (b, enc_b) = encoded_key();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{enc_a}").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  {enc_b}  ").unwrap();

        let keypairs = load_keypairs(file.path()).unwrap();
        assert_eq!(keypairs.len(), 2);
        assert_eq!(keypairs[0].pubkey(), a.pubkey());
        assert_eq!(keypairs[1].pubkey(), b.pubkey());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_keypairs("does-not-exist.txt").is_err());
    }

    #[test]
    fn empty_file_is_an_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(load_keypairs(file.path()).is_err());
    }

    #[test]
    fn garbage_line_reports_location() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not-a-key").unwrap();
        let err = load_keypairs(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains(":1"));
    }
}
