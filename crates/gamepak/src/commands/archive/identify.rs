use clap::Args;
use gamepak_archive::try_identify;
use miette::{Context, IntoDiagnostic, Result};
use owo_colors::{OwoColorize, Stream::Stdout};
use std::{fs::File, io::BufReader, path::PathBuf};
use tracing::debug;

#[derive(Args)]
pub struct IdentifyArgs {
    /// Files to inspect
    #[arg(required = true, value_name = "FILES")]
    files: Vec<PathBuf>,
}

impl IdentifyArgs {
    pub fn handle(&self) -> Result<()> {
        for path in &self.files {
            let file = File::open(path)
                .into_diagnostic()
                .context(format!("path: {}", path.display()))?;
            let mut reader = BufReader::new(file);

            let hint = super::name_hint(path);
            let found = try_identify(&mut reader, hint.as_deref());
            debug!(path = %path.display(), ?found, "identified");

            match found {
                Some(format) => println!(
                    "{}: {}",
                    path.display(),
                    format.if_supports_color(Stdout, |f| f.green())
                ),
                None => println!(
                    "{}: {}",
                    path.display(),
                    "unknown".if_supports_color(Stdout, |t| t.dimmed())
                ),
            }
        }
        Ok(())
    }
}
