use clap::Args;
use gamepak_archive::ArchiveReader;
use miette::{Context, IntoDiagnostic, Result};
use owo_colors::{OwoColorize, Stream::Stdout};
use std::{fs::File, io::BufReader, path::PathBuf};

#[derive(Args)]
pub struct ListArgs {
    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let file = File::open(&self.file)
            .into_diagnostic()
            .context(format!("path: {}", &self.file.display()))?;
        let hint = super::name_hint(&self.file);
        let archive = ArchiveReader::with_hint(BufReader::new(file), hint.as_deref())?;

        println!(
            "{} archive, {} entries",
            archive.format().if_supports_color(Stdout, |f| f.green()),
            archive.len()
        );

        for entry in archive.entries() {
            let path = if entry.path().is_empty() {
                "<unnamed>"
                    .if_supports_color(Stdout, |t| t.dimmed())
                    .to_string()
            } else {
                entry.path().to_owned()
            };

            match archive
                .texture_metadata(entry.index())
                .and_then(|metadata| metadata.global_index)
            {
                Some(global_index) => println!(
                    "{:>5} {:#010x} {:>10} {} (gbix {global_index})",
                    entry.index(),
                    entry.offset(),
                    entry.length(),
                    path
                ),
                None => println!(
                    "{:>5} {:#010x} {:>10} {}",
                    entry.index(),
                    entry.offset(),
                    entry.length(),
                    path
                ),
            }
        }
        Ok(())
    }
}
