use anyhow::Result;
use log::info;

use crate::{cli::PreviewArgs, load_input, table};

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let (frame, _) = load_input(&args.source)?;
    print!("{}", table::render_frame(&frame, args.rows));
    info!(
        "Displayed {} of {} row(s) from {:?}",
        frame.len().min(args.rows),
        frame.len(),
        args.source.input
    );
    Ok(())
}
