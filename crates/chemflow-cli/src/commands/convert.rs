use crate::error::Result;
use chemflow::workflows;
use std::path::Path;
use tracing::info;

pub fn run_convert(input: &Path, output: &Path) -> Result<()> {
    let frames = workflows::convert(input, output)?;
    info!("Converted {} frame(s) from {:?}", frames, input);
    println!("Wrote {} frame(s) to {}", frames, output.display());
    Ok(())
}

pub fn run_extract(trajectory: &Path, index: isize, output: &Path) -> Result<()> {
    workflows::extract(trajectory, index, output)?;
    println!("Wrote file: {}", output.display());
    Ok(())
}

pub fn run_to_car(input: &Path, output: &Path) -> Result<()> {
    workflows::to_car(input, output)?;
    println!("Wrote file: {}", output.display());
    Ok(())
}
