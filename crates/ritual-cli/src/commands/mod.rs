pub mod config;
pub mod focus;
pub mod particles;
pub mod release;

use serde::Serialize;

/// Print one value as a single JSON line on stdout.
pub fn emit<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
