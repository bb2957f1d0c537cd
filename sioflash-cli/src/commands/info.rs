//! Chip information command implementation.

use {
    super::open_device,
    crate::Cli,
    anyhow::Result,
    console::style,
};

/// Info command implementation.
pub(crate) fn cmd_info(cli: &Cli, json: bool) -> Result<()> {
    let mut dev = open_device(cli)?;

    if json {
        let output = serde_json::json!({
            "ok": true,
            "data": {
                "instance_id": dev.instance_id(),
                "chip_id": format!("0x{:04x}", dev.chip_id()),
                "family": dev.family().map(|f| f.to_string()),
                "flash_size": dev.size(),
                "name": dev.name(),
                "version": dev.version(),
            }
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        eprintln!("{}", style("SuperIO EC").bold().underlined());
        println!("{dev}");
    }

    dev.close()?;
    Ok(())
}
