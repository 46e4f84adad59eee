use super::Preset;
use anyhow::{bail, Result};
use colored::*;
use std::path::Path;

pub fn show(preset: Preset) -> Result<()> {
    print!("{}", preset.config().to_toml_string()?);
    Ok(())
}

pub fn init(path: &Path, preset: Preset, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    preset.config().save_toml(path)?;

    println!(
        "{} {}",
        "Created".green().bold(),
        path.display().to_string().white().bold()
    );
    println!(
        "  {} shmsync run --config {}",
        "Next:".cyan(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shmsync_core::ExchangeConfig;

    #[test]
    fn test_init_writes_loadable_preset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sleepy.toml");
        init(&path, Preset::PetersonSleepy, false).unwrap();

        let loaded = ExchangeConfig::load(&path).unwrap();
        assert_eq!(loaded, ExchangeConfig::peterson_sleepy_reader());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exchange.toml");
        std::fs::write(&path, "cycles = 1\n").unwrap();

        assert!(init(&path, Preset::Reference, false).is_err());
        init(&path, Preset::Reference, true).unwrap();
        assert_eq!(
            ExchangeConfig::load(&path).unwrap(),
            ExchangeConfig::head_tail_reference()
        );
    }
}
