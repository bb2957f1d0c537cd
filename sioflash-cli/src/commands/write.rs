//! Firmware write command implementation.

use {
    super::open_device,
    crate::Cli,
    anyhow::{Context, Result},
    console::style,
    indicatif::{ProgressBar, ProgressStyle},
    log::warn,
    sioflash::CHUNK_SIZE,
    std::{fs, path::Path},
};

/// Write command implementation.
pub(crate) fn cmd_write(cli: &Cli, firmware: &Path) -> Result<()> {
    let image = fs::read(firmware)
        .with_context(|| format!("failed to read {}", firmware.display()))?;

    let mut dev = open_device(cli)?;
    dev.prepare_firmware(&image)
        .context("firmware image rejected")?;

    let pb = if cli.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(image.len().div_ceil(CHUNK_SIZE) as u64);
        #[allow(clippy::unwrap_used)] // Static template string
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] chunk {pos}/{len}",
                )
                .unwrap()
                .progress_chars("#>-"),
        );
        pb
    };

    dev.detach().context("failed to detach EC")?;
    let result = dev.write_firmware(
        &image,
        Some(&mut |done, _total| pb.set_position(done as u64)),
    );
    // Resume EC duty even when the write failed, or the machine is left
    // without fan and battery management.
    if let Err(e) = dev.attach() {
        warn!("failed to re-attach EC: {e}");
    }
    result.context("failed to write firmware")?;
    pb.finish_and_clear();
    dev.close()?;

    eprintln!(
        "{} Wrote {} ({} bytes)",
        style("✓").green().bold(),
        firmware.display(),
        image.len()
    );
    Ok(())
}
