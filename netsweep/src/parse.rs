//! Structured output parsing with TextFSM templates.
//!
//! Templates are bundled with the crate and indexed by device type and a
//! command pattern, so abbreviated commands (`sh cdp nei det`) resolve to the
//! same template as the full form.

use std::collections::HashMap;

use log::trace;
use once_cell::sync::Lazy;
use regex::Regex;
use textfsm_rust::Template;

use crate::error::{ParseError, Result};
use crate::platform::DeviceType;

/// One parsed row, keyed by template value name.
pub type Record = HashMap<String, String>;

struct IndexEntry {
    device_type: DeviceType,
    command: Regex,
    name: &'static str,
    source: &'static str,
}

static INDEX: Lazy<Vec<IndexEntry>> = Lazy::new(|| {
    let entries = [
        (
            DeviceType::CiscoIos,
            r"^sh(o(w)?)?\s+cdp\s+nei(g(h(b(o(r(s)?)?)?)?)?)?\s+det(a(i(l)?)?)?\s*$",
            "cisco_ios_show_cdp_neighbors_detail",
            include_str!("../templates/cisco_ios_show_cdp_neighbors_detail.textfsm"),
        ),
        (
            DeviceType::CiscoIos,
            r"^sh(o(w)?)?\s+inv(e(n(t(o(r(y)?)?)?)?)?)?\s*$",
            "cisco_ios_show_inventory",
            include_str!("../templates/cisco_ios_show_inventory.textfsm"),
        ),
    ];

    entries
        .into_iter()
        .map(|(device_type, pattern, name, source)| IndexEntry {
            device_type,
            command: Regex::new(pattern).expect("template command pattern"),
            name,
            source,
        })
        .collect()
});

/// Name of the template indexed for this device type and command, if any.
pub fn template_for(device_type: DeviceType, command: &str) -> Option<&'static str> {
    lookup(device_type, command).map(|entry| entry.name)
}

fn lookup(device_type: DeviceType, command: &str) -> Option<&'static IndexEntry> {
    let device_type = device_type.normalized();
    let command = command.trim();
    INDEX
        .iter()
        .find(|entry| entry.device_type == device_type && entry.command.is_match(command))
}

/// Parse `output` with the template indexed for `command`.
///
/// Returns `Ok(None)` when no template applies.
pub fn parse_output(
    device_type: DeviceType,
    command: &str,
    output: &str,
) -> Result<Option<Vec<Record>>> {
    match lookup(device_type, command) {
        Some(entry) => parse_with_template(entry.name, entry.source, output).map(Some),
        None => Ok(None),
    }
}

/// Compile `source` and run it over `output`.
pub fn parse_with_template(name: &str, source: &str, output: &str) -> Result<Vec<Record>> {
    let template = Template::parse_str(source).map_err(|e| template_error(name, e))?;
    let mut parser = template.parser();
    let records = parser
        .parse_text_to_dicts(output)
        .map_err(|e| template_error(name, e))?;

    trace!("{}: {} records", name, records.len());
    Ok(records)
}

fn template_error(name: &str, e: impl std::fmt::Display) -> ParseError {
    ParseError::Template {
        template: name.to_string(),
        message: e.to_string(),
    }
}

/// Look up a field case-insensitively, returning the trimmed value.
pub fn field<'a>(record: &'a Record, name: &str) -> Option<&'a str> {
    record
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.trim())
}
