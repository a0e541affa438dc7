use std::path::Path;

pub fn normalize_command_path(value: &str) -> String {
    let trimmed = value.trim();
    if let Some(inner) = trimmed
        .strip_prefix('"')
        .and_then(|candidate| candidate.strip_suffix('"'))
    {
        return inner.trim().to_string();
    }
    if let Some(inner) = trimmed
        .strip_prefix('\'')
        .and_then(|candidate| candidate.strip_suffix('\''))
    {
        return inner.trim().to_string();
    }
    trimmed.to_string()
}

/// Empty configuration falls back to `adb` on PATH.
pub fn resolve_bridge_program(config_command_path: &str) -> String {
    let normalized = normalize_command_path(config_command_path);
    if normalized.is_empty() {
        "adb".to_string()
    } else {
        normalized
    }
}

pub fn validate_bridge_program(program: &str) -> Result<(), String> {
    if program.trim().is_empty() {
        return Err("Bridge command is empty".to_string());
    }
    if program == "adb" {
        return Ok(());
    }
    let path = Path::new(program);
    if path.is_dir() {
        return Err("Bridge path must point to an executable file".to_string());
    }
    if !path.exists() {
        return Err("Bridge executable not found at the configured path".to_string());
    }
    Ok(())
}
