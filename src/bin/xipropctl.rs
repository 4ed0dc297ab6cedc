use structopt::StructOpt;

use xiprop::{Config, DeviceId, DeviceProps};

#[derive(StructOpt)]
#[structopt(about = "read and write XInput device properties")]
enum Opt {
    /// Read a property, expecting exactly `nitems` elements.
    Get {
        device: DeviceId,
        property: String,
        nitems: u32,
    },
    /// Write boolean values, given as 0 or 1.
    SetBool {
        device: DeviceId,
        property: String,
        values: Vec<u8>,
    },
    /// Write 32-bit integer values.
    SetInt {
        device: DeviceId,
        property: String,
        values: Vec<i32>,
    },
    /// Write 32-bit float values.
    SetFloat {
        device: DeviceId,
        property: String,
        values: Vec<f32>,
    },
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    simple_logger::SimpleLogger::new().init()?;
    let opt = Opt::from_args();
    let config = Config::load()?;
    let props = DeviceProps::with_config(&config);
    match opt {
        Opt::Get {
            device,
            property,
            nitems,
        } => println!("{:?}", props.read(device, &property, nitems)?),
        Opt::SetBool {
            device,
            property,
            values,
        } => {
            let values: Vec<bool> = values.iter().map(|v| *v != 0).collect();
            props.write_bools(device, &property, &values)?;
        }
        Opt::SetInt {
            device,
            property,
            values,
        } => props.write_int32s(device, &property, &values)?,
        Opt::SetFloat {
            device,
            property,
            values,
        } => props.write_floats(device, &property, &values)?,
    }
    Ok(())
}
