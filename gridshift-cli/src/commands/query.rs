use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct ShiftResponse {
    eastings: f64,
    northings: f64,
    x_shift: f64,
    y_shift: f64,
    z_shift: f64,
}

pub fn run(data: Option<PathBuf>, eastings: f64, northings: f64, json: bool) -> Result<()> {
    let service = super::load_service(data)?;

    let shift = service
        .get_shifts((eastings, northings))
        .context("Failed to get shifts")?;

    if json {
        let response = ShiftResponse {
            eastings,
            northings,
            x_shift: shift.x_shift,
            y_shift: shift.y_shift,
            z_shift: shift.z_shift,
        };
        println!("{}", serde_json::to_string(&response)?);
    } else {
        println!("{} {} {}", shift.x_shift, shift.y_shift, shift.z_shift);
    }

    Ok(())
}
