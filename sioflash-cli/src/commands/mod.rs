//! CLI command implementations.
//!
//! Each subcommand is implemented in its own module for clean separation.

pub(crate) mod completions;
pub(crate) mod info;
pub(crate) mod read;
pub(crate) mod write;

pub(crate) use {
    completions::cmd_completions, info::cmd_info, read::cmd_read, write::cmd_write,
};

use {
    crate::Cli,
    anyhow::{Context, Result},
    sioflash::{DevPort, SuperioDevice},
};

/// Open the port device and bring the EC session up.
pub(crate) fn open_device(cli: &Cli) -> Result<SuperioDevice<DevPort>> {
    let expected_id = sioflash::chipset_id(cli.chip.name())
        .with_context(|| format!("chipset {} is not in the known-chipset table", cli.chip.name()))?;
    let mut dev = SuperioDevice::open(&cli.device_path, cli.sio_port, expected_id)
        .with_context(|| {
            format!(
                "failed to open {} (root privileges are required)",
                cli.device_path.display()
            )
        })?;
    dev.set_diagnostics(cli.diagnostics);
    dev.probe().context("failed to probe SuperIO")?;
    dev.setup().context("failed to set up EC")?;
    Ok(dev)
}
