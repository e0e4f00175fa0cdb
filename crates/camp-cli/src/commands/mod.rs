pub mod compare;
pub mod expand;
pub mod inspect;
pub mod preflight;
pub mod run;

use std::error::Error;

use camp_core::serde::to_canonical_json_bytes;
use serde::Serialize;

/// Prints `value` as canonical JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    let bytes = to_canonical_json_bytes(value)?;
    println!("{}", String::from_utf8(bytes)?);
    Ok(())
}
