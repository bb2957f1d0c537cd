//! Flash read-out command implementation.

use {
    super::open_device,
    crate::Cli,
    anyhow::{Context, Result},
    console::style,
    indicatif::{ProgressBar, ProgressStyle},
    std::{fs, path::Path},
};

/// Read command implementation.
pub(crate) fn cmd_read(cli: &Cli, output: &Path) -> Result<()> {
    let mut dev = open_device(cli)?;

    let pb = if cli.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(u64::from(dev.size()));
        #[allow(clippy::unwrap_used)] // Static template string
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes}",
                )
                .unwrap()
                .progress_chars("#>-"),
        );
        pb
    };

    let firmware = dev
        .read_firmware(Some(&mut |done, _total| pb.set_position(done as u64)))
        .context("failed to read EC flash")?;
    pb.finish_and_clear();

    fs::write(output, &firmware)
        .with_context(|| format!("failed to write {}", output.display()))?;
    dev.close()?;

    eprintln!(
        "{} Read {} bytes to {}",
        style("✓").green().bold(),
        firmware.len(),
        output.display()
    );
    Ok(())
}
