//! Local media validation without uploading.

use super::load_config;
use anyhow::{Result, bail};
use ara_core::upload::{UploadPayload, UploadPolicy};
use ara_infrastructure::{AraPaths, load_media};
use colored::Colorize;
use std::path::PathBuf;

/// Prints a verdict per file and for the batch as a whole.
///
/// Fails when any file or the batch would be rejected.
pub async fn run(config_path: Option<PathBuf>, files: Vec<PathBuf>) -> Result<()> {
    let paths = AraPaths::new()?;
    let config = load_config(config_path, &paths)?;
    let policy: &UploadPolicy = &config.upload;

    let mut passed = true;
    let mut items = Vec::with_capacity(files.len());
    for path in &files {
        let item = match load_media(path).await {
            Ok(item) => item,
            Err(err) => {
                passed = false;
                println!("{} {}: {}", "✗".red(), path.display(), err.user_message());
                continue;
            }
        };

        match policy.check_item(&item) {
            None => println!(
                "{} {} ({}, {} bytes)",
                "✓".green(),
                item.name,
                item.mime_type,
                item.size()
            ),
            Some(reason) => {
                passed = false;
                println!("{} {}: {}", "✗".red(), item.name, reason);
            }
        }
        items.push(item);
    }

    match policy.validate(&UploadPayload::Files(items)) {
        Ok(kind) => println!("{} Batch accepted ({kind})", "✓".green().bold()),
        Err(err) => {
            passed = false;
            println!("{} Batch rejected: {}", "✗".red().bold(), err);
        }
    }

    if !passed {
        bail!("media check failed");
    }
    Ok(())
}
