//! `onuctl config` handlers: profile wizard, inspection and selection.

use std::fmt::Write as _;

use dialoguer::{Confirm, Input, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

const MASK: &str = "****";

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(),
        ConfigCommand::Show => show(global),
        ConfigCommand::SetPassword => set_password(global),
        ConfigCommand::Profiles => {
            list_profiles();
            Ok(())
        }
        ConfigCommand::Use { name } => use_profile(name),
        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }
    }
}

fn init() -> Result<(), CliError> {
    let path = config::config_path();
    eprintln!("Setting up an OLT profile in {}\n", path.display());

    let name = ask("Profile name", Some("default"))?;
    let host = ask("OLT management address", Some("192.168.1.1"))?;
    let port: u16 = Input::new()
        .with_prompt("SSH port")
        .default(22)
        .interact_text()
        .map_err(prompt_err)?;
    let username = ask("Login user", Some("admin"))?;

    let secret = read_password("Login password: ")?;
    let password = choose_password_home(&name, &secret)?;

    let vlan_prefix: String = Input::new()
        .with_prompt("VLAN profile prefix (blank for none)")
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;
    let onu_type = ask("ONU type", Some("ALL"))?;
    let auto_write = Confirm::new()
        .with_prompt("Run `write` whenever the command buffer is flushed?")
        .default(false)
        .interact()
        .map_err(prompt_err)?;

    let mut cfg = config::load_config_or_default();
    cfg.profiles.insert(
        name.clone(),
        Profile {
            host,
            port,
            username,
            password,
            vlan_prefix,
            onu_type,
            auto_write,
            ..Profile::default()
        },
    );
    cfg.default_profile = Some(name.clone());
    config::save_config(&cfg)?;

    eprintln!("\nSaved profile '{name}' as the default.");
    eprintln!("Next: onuctl run --mode register <work-order.csv>");
    Ok(())
}

fn show(global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load_config_or_default();
    for profile in cfg.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some(MASK.into());
        }
    }
    let rendered = output::render_single(&global.output, &cfg, describe, |_| {
        config::config_path().display().to_string()
    });
    output::print_output(&rendered, global.quiet);
    Ok(())
}

fn set_password(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config_or_default();
    let name = config::active_profile_name(global, &cfg);
    if !cfg.profiles.contains_key(&name) {
        return Err(CliError::ProfileNotFound {
            available: profile_names(&cfg),
            name,
        });
    }

    let secret = read_password(&format!("New password for '{name}': "))?;
    config::store_password(&name, &secret)?;
    eprintln!("Keyring entry for '{name}' updated.");
    Ok(())
}

fn list_profiles() {
    let cfg = config::load_config_or_default();
    if cfg.profiles.is_empty() {
        eprintln!("No profiles yet. Create one with: onuctl config init");
        return;
    }
    let active = cfg.default_profile.as_deref().unwrap_or("default");
    let mut names: Vec<&String> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        if name == active {
            println!("{name} *");
        } else {
            println!("{name}");
        }
    }
}

fn use_profile(name: String) -> Result<(), CliError> {
    let mut cfg = config::load_config_or_default();
    if !cfg.profiles.contains_key(&name) {
        return Err(CliError::ProfileNotFound {
            available: profile_names(&cfg),
            name,
        });
    }
    cfg.default_profile = Some(name.clone());
    config::save_config(&cfg)?;
    eprintln!("Now using profile '{name}'.");
    Ok(())
}

// ── Prompts ─────────────────────────────────────────────────────────

fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn ask(prompt: &str, default: Option<&str>) -> Result<String, CliError> {
    let mut input = Input::<String>::new().with_prompt(prompt);
    if let Some(default) = default {
        input = input.default(default.to_owned());
    }
    input.interact_text().map_err(prompt_err)
}

fn read_password(prompt: &str) -> Result<String, CliError> {
    let secret = rpassword::prompt_password(prompt).map_err(prompt_err)?;
    if secret.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "password cannot be empty".into(),
        });
    }
    Ok(secret)
}

/// Keyring or plaintext. Returns the value to keep in the profile, which
/// is `None` once the keyring holds it.
fn choose_password_home(profile: &str, secret: &str) -> Result<Option<String>, CliError> {
    let picked = Select::new()
        .with_prompt("Keep the password where?")
        .items(&["system keyring", "config file (plaintext)"])
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if picked == 0 {
        config::store_password(profile, secret)?;
        Ok(None)
    } else {
        Ok(Some(secret.to_owned()))
    }
}

// ── Rendering ───────────────────────────────────────────────────────

fn profile_names(cfg: &Config) -> String {
    let mut names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort_unstable();
    names.join(", ")
}

/// TOML-like listing of the effective configuration. Passwords arrive
/// already masked.
fn describe(cfg: &Config) -> String {
    let mut text = String::new();
    if let Some(active) = &cfg.default_profile {
        let _ = writeln!(text, "default_profile = {active:?}\n");
    }

    let d = &cfg.defaults;
    let _ = writeln!(text, "[defaults]");
    let _ = writeln!(text, "ledger = {:?}", d.ledger.display().to_string());
    if let Some(path) = &d.transcript {
        let _ = writeln!(text, "transcript = {:?}", path.display().to_string());
    }
    let _ = writeln!(text, "output = {:?}", d.output);
    let _ = writeln!(text, "color = {:?}", d.color);
    let _ = writeln!(text, "pool_size = {}", d.pool_size);

    let mut entries: Vec<(&String, &Profile)> = cfg.profiles.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    for (name, p) in entries {
        let _ = writeln!(text, "\n[profiles.{name}]");
        let _ = writeln!(text, "host = {:?}", p.host);
        let _ = writeln!(text, "port = {}", p.port);
        let _ = writeln!(text, "username = {:?}", p.username);
        if let Some(masked) = &p.password {
            let _ = writeln!(text, "password = {masked:?}");
        }
        if let Some(var) = &p.password_env {
            let _ = writeln!(text, "password_env = {var:?}");
        }
        let _ = writeln!(text, "vlan_prefix = {:?}", p.vlan_prefix);
        let _ = writeln!(text, "onu_type = {:?}", p.onu_type);
        if let Some(n) = p.config_workers {
            let _ = writeln!(text, "config_workers = {n}");
        }
        if p.auto_write {
            let _ = writeln!(text, "auto_write = true");
        }
        if let Some(secs) = p.connect_timeout {
            let _ = writeln!(text, "connect_timeout = {secs}");
        }
        if p.tuning != onuctl_config::TuningOverrides::default() {
            let _ = writeln!(text, "# [profiles.{name}.tuning] overrides set");
        }
    }
    text
}
