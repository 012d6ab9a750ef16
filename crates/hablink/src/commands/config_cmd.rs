//! Config command handlers: path, show, init, set-password.

use hablink_config::{Config, SecretKind};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

const MASK: &str = "********";

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match &args.command {
        ConfigCommand::Path => {
            let path = crate::config::config_path(global);
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let mut cfg = crate::config::load(global)?;
            mask_secrets(&mut cfg);
            let rendered = match global.output {
                OutputFormat::Json => serde_json::to_string_pretty(&cfg)?,
                OutputFormat::JsonCompact => serde_json::to_string(&cfg)?,
                OutputFormat::Yaml => serde_yaml::to_string(&cfg)?,
                OutputFormat::Table | OutputFormat::Plain => toml::to_string_pretty(&cfg)?,
            };
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            let path = crate::config::config_path(global);
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, hablink_config::sample_config())?;
            if !global.quiet {
                eprintln!("Config written to {}", path.display());
            }
            Ok(())
        }

        ConfigCommand::SetPassword { device, secret } => {
            let cfg = crate::config::load(global)?;
            let entry = cfg.devices.get(device).ok_or_else(|| CliError::NotFound {
                resource_type: "device".into(),
                identifier: device.clone(),
                list_command: "devices".into(),
            })?;

            let kind = match secret {
                Some(name) => name.parse::<SecretKind>().map_err(|_| CliError::Validation {
                    field: "--secret".into(),
                    reason: format!("expected password, code or token, got '{name}'"),
                })?,
                None => SecretKind::primary_for(entry.kind).ok_or_else(|| {
                    CliError::Validation {
                        field: "device".into(),
                        reason: format!("{} devices have no secret to store", entry.kind),
                    }
                })?,
            };

            let value = rpassword::prompt_password(format!("{kind} for {device}: "))?;
            hablink_config::store_secret(device, kind, &value)?;
            if !global.quiet {
                eprintln!("Stored {kind} for '{device}' in the system keyring");
            }
            Ok(())
        }
    }
}

/// Replace plaintext secrets so `config show` never prints them.
fn mask_secrets(cfg: &mut Config) {
    for entry in cfg.devices.values_mut() {
        for secret in [&mut entry.password, &mut entry.code, &mut entry.token] {
            if secret.is_some() {
                *secret = Some(MASK.into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use hablink_config::DeviceEntry;
    use hablink_core::DeviceKind;

    use super::*;

    #[test]
    fn show_masks_plaintext_secrets() {
        let mut cfg = Config::default();
        let mut entry = DeviceEntry::new(DeviceKind::Oasis);
        entry.password = Some("hunter2".into());
        entry.password_env = Some("JABLOTRON_PASSWORD".into());
        cfg.devices.insert("house".into(), entry);

        mask_secrets(&mut cfg);
        let entry = &cfg.devices["house"];
        assert_eq!(entry.password.as_deref(), Some(MASK));
        assert_eq!(entry.password_env.as_deref(), Some("JABLOTRON_PASSWORD"));
        assert_eq!(entry.code, None);
    }
}
