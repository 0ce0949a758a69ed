use anyhow::{Context, Result};
use chrono::Local;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::types::{BatchRun, WalletStatus};

/// Write the per-run report. The file is recreated on every run so it
/// always reflects exactly the latest batch.
pub fn write_report(path: &Path, title: &str, run: &BatchRun) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create report file: {}", path.display()))?;

    writeln!(file, "{title}")?;
    writeln!(file, "{}", "=".repeat(title.len()))?;
    writeln!(file, "Generated: {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(file)?;

    for record in &run.records {
        writeln!(file, "Wallet: {}", record.wallet)?;
        match &record.status {
            WalletStatus::Succeeded { signature, detail } => {
                writeln!(file, "Result: {detail}")?;
                writeln!(file, "Signature: {signature}")?;
            }
            WalletStatus::Skipped(reason) => writeln!(file, "Skipped: {reason}")?,
            WalletStatus::Failed(error) => writeln!(file, "Error: {error}")?,
            WalletStatus::Checked(detail) => writeln!(file, "{detail}")?,
        }
        writeln!(file)?;
    }

    writeln!(file, "Processed: {}", run.processed)?;
    writeln!(file, "Succeeded: {}", run.succeeded)?;
    writeln!(file, "Skipped: {}", run.skipped)?;
    writeln!(file, "Failed: {}", run.failed)?;

    Ok(())
}
