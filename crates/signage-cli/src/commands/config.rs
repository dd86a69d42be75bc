//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use signage_core::images::ImageNaming;
use signage_core::Config;

use crate::output::{Output, OutputFormat};

fn naming_name(naming: ImageNaming) -> &'static str {
    match naming {
        ImageNaming::Flat => "flat",
        ImageNaming::Folder => "folder",
    }
}

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "max_image_bytes": config.max_image_bytes,
                    "image_naming": naming_name(config.image_naming),
                    "list_page_size": config.list_page_size,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:        {}", config.data_dir.display());
            println!("  max_image_bytes: {}", config.max_image_bytes);
            println!("  image_naming:    {}", naming_name(config.image_naming));
            println!("  list_page_size:  {}", config.list_page_size);
            println!(
                "  log_file:        {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));
    if key == "max_image_bytes" && !config.image_ceiling_recommended() {
        output.message("Note: the recommended image size ceiling is 3-5 MiB (3145728-5242880 bytes)");
    }

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "max_image_bytes" => {
            let bytes: u64 = value
                .parse()
                .context("Invalid value for max_image_bytes. Use a number of bytes.")?;
            if bytes == 0 {
                bail!("max_image_bytes must be greater than zero");
            }
            config.max_image_bytes = bytes;
        }
        "image_naming" => {
            config.image_naming = match value {
                "flat" => ImageNaming::Flat,
                "folder" => ImageNaming::Folder,
                _ => bail!("Invalid value for image_naming. Use 'flat' or 'folder'."),
            };
        }
        "list_page_size" => {
            let size: usize = value
                .parse()
                .context("Invalid value for list_page_size. Use a positive number.")?;
            if size == 0 {
                bail!("list_page_size must be greater than zero");
            }
            config.list_page_size = size;
        }
        "log_file" => {
            config.log_file = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.into())
            };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, max_image_bytes, image_naming, list_page_size, log_file",
                key
            );
        }
    }
    Ok(())
}
