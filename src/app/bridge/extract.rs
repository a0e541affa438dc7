use regex::Regex;

use crate::app::error::BridgeError;
use crate::app::models::{AuthStatus, Device};

/// Pure functions turning accumulated significant lines into domain results.
/// Each implements a small grammar against best-effort bridge output; none of
/// them touch the subprocess.

/// One device per line of `adb devices` output: tab-separated
/// `[identifier, statusToken, ...]`. Lines without a status token are
/// skipped.
pub fn parse_device_list(lines: &[String]) -> Vec<Device> {
    lines
        .iter()
        .filter_map(|line| {
            let mut tokens = line.split('\t');
            let id = tokens.next()?.trim();
            let status = tokens.next()?.trim();
            if id.is_empty() || status.is_empty() {
                return None;
            }
            let auth = if status == "device" {
                AuthStatus::Authorized
            } else {
                AuthStatus::Unauthorized
            };
            Some(Device::new(id, auth))
        })
        .collect()
}

/// The model query prints property chatter first; the last significant line
/// is the value itself.
pub fn extract_model(lines: &[String]) -> Option<String> {
    lines
        .iter()
        .rev()
        .map(|line| line.trim())
        .find(|line| !line.is_empty())
        .map(|line| line.to_string())
}

/// An authorize round succeeded iff some line names the target id with the
/// literal status token `device`.
pub fn confirm_authorized(lines: &[String], id: &str) -> bool {
    lines.iter().any(|line| {
        line.contains(id)
            && line
                .split('\t')
                .nth(1)
                .map(|token| token.trim() == "device")
                .unwrap_or(false)
    })
}

pub fn confirm_connected(lines: &[String]) -> bool {
    lines
        .last()
        .map(|line| line.contains("connected"))
        .unwrap_or(false)
}

pub fn confirm_paired(lines: &[String]) -> bool {
    lines
        .last()
        .map(|line| line.contains("paired"))
        .unwrap_or(false)
}

/// Push terminal lines embed the skipped count between `", "` and
/// `" skipped"`, e.g. `"... 12 files pushed, 3 skipped."`.
pub fn extract_push_skipped(line: &str, trace_id: &str) -> Result<u64, BridgeError> {
    slice_between(line, ", ", " skipped", trace_id)
}

/// Pull terminal lines carry two counts, e.g.
/// `"/sdcard/DCIM/: 12 files pulled, 2 skipped."`.
pub fn extract_pull_counts(line: &str, trace_id: &str) -> Result<(u64, u64), BridgeError> {
    let pulled = slice_between(line, ": ", " file", trace_id)?;
    let skipped = slice_between(line, ", ", " skipped", trace_id)?;
    Ok((pulled, skipped))
}

fn slice_between(
    line: &str,
    open: &str,
    close: &str,
    trace_id: &str,
) -> Result<u64, BridgeError> {
    let start = line.find(open).ok_or_else(|| {
        BridgeError::malformed(
            format!("Terminal line missing '{open}' delimiter: {line}"),
            trace_id,
        )
    })? + open.len();
    let end = line[start..].find(close).ok_or_else(|| {
        BridgeError::malformed(
            format!("Terminal line missing '{close}' delimiter: {line}"),
            trace_id,
        )
    })? + start;
    line[start..end].trim().parse::<u64>().map_err(|_| {
        BridgeError::malformed(
            format!("Terminal line count is not numeric: {line}"),
            trace_id,
        )
    })
}

/// `pm list packages` rows: `package:<name>`.
pub fn parse_package_list(lines: &[String]) -> Vec<String> {
    let row = Regex::new(r"^package:(\S+)").expect("static package pattern");
    lines
        .iter()
        .filter_map(|line| {
            row.captures(line.trim())
                .map(|caps| caps[1].to_string())
        })
        .collect()
}

pub fn confirm_uninstalled(lines: &[String]) -> bool {
    lines.iter().any(|line| line.contains("Success"))
}
