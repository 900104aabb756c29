use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use octofhir_convert::VersionBridge;
use octofhir_core::FhirVersion;
use octofhir_transform::{FhirFormat, decode, encode};

use crate::setup::file_format;

pub fn convert(
    bridge: &dyn VersionBridge,
    file: &str,
    from: FhirVersion,
    to: FhirVersion,
    xml: bool,
) -> Result<()> {
    let path = Path::new(file);
    let bytes = std::fs::read(path).with_context(|| format!("reading {file}"))?;
    let resource = decode(&bytes, file_format(path))?;
    let converted = bridge.convert(&resource, from, to)?;

    let out = if xml { FhirFormat::Xml } else { FhirFormat::Json };
    let body = encode(&converted, out)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&body)?;
    stdout.write_all(b"\n")?;
    Ok(())
}
