use epsolar_core::{SerialReader, StatusReader};

use super::{CommandResult, DeviceArgs};

pub fn run(args: &DeviceArgs) -> CommandResult {
    let reader = SerialReader::new(args.settings());
    let record = reader.read(&args.device)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
