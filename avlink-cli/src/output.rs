//! Text and JSON rendering of device state

use anyhow::Result;
use serde_json::json;

use avlink::{ComponentStatus, ErrorStatus, Input, LampStatus, ProjectorInfo, StateUpdate};

pub fn print_state(updates: &[StateUpdate], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(updates)?);
        return Ok(());
    }

    if updates.is_empty() {
        println!("No state reported");
        return Ok(());
    }
    for line in state_lines(updates) {
        println!("{line}");
    }
    Ok(())
}

pub fn print_update(update: &StateUpdate, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(update)?);
    } else {
        println!("{update}");
    }
    Ok(())
}

pub fn print_projector_info(
    info: &ProjectorInfo,
    lamps: &[LampStatus],
    inputs: &[Input],
    errors: &ErrorStatus,
    json: bool,
) -> Result<()> {
    let inputs: Vec<String> = inputs.iter().map(Input::text).collect();
    let problems = error_lines(errors);

    if json {
        let value = json!({
            "info": info,
            "lamps": lamps
                .iter()
                .map(|lamp| json!({ "hours": lamp.hours, "on": lamp.on }))
                .collect::<Vec<_>>(),
            "inputs": inputs,
            "errors": problems,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Name:           {}", info.name);
    println!("Manufacturer:   {}", info.manufacturer);
    println!("Model:          {}", info.model);
    println!("Class:          {}", info.class);
    if !info.other_information.is_empty() {
        println!("Information:    {}", info.other_information);
    }
    for (index, lamp) in lamps.iter().enumerate() {
        let state = if lamp.on { "on" } else { "off" };
        println!("Lamp {}:         {} h, {}", index + 1, lamp.hours, state);
    }
    println!("Inputs:         {}", inputs.join(", "));
    if problems.is_empty() {
        println!("Errors:         none");
    } else {
        println!("Errors:         {}", problems.join(", "));
    }
    Ok(())
}

/// Components that are not OK, e.g. `lamp: warning`
fn error_lines(errors: &ErrorStatus) -> Vec<String> {
    [
        ("fan", errors.fan),
        ("lamp", errors.lamp),
        ("temperature", errors.temperature),
        ("cover", errors.cover_open),
        ("filter", errors.filter),
        ("other", errors.other),
    ]
    .into_iter()
    .filter_map(|(name, status)| match status {
        ComponentStatus::Ok => None,
        ComponentStatus::Warning => Some(format!("{name}: warning")),
        ComponentStatus::Error => Some(format!("{name}: error")),
    })
    .collect()
}

/// One line per channel, grouped by zone
fn state_lines(updates: &[StateUpdate]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut zone = None;
    for update in updates {
        if zone != Some(update.zone) {
            zone = Some(update.zone);
            lines.push(format!("Zone {}", update.zone));
        }
        lines.push(format!("  {:<20} {}", update.channel.to_string(), update.value));
    }
    lines
}
