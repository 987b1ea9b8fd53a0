use clap::{Args, ValueEnum};
use gamepak_archive::{error::RejectedContent, AfsVersion, ArchiveFormat, ArchiveWriter, WriterOptions};
use itertools::Itertools;
use miette::{miette, Context, IntoDiagnostic, Result};
use owo_colors::{OwoColorize, Stream::Stderr};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Where AFS archives keep the pointer to their name table
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum AfsLayout {
    /// Just before the first entry
    V1,
    /// Right after the entry table
    #[default]
    V2,
}

impl From<AfsLayout> for AfsVersion {
    fn from(value: AfsLayout) -> Self {
        match value {
            AfsLayout::V1 => AfsVersion::V1,
            AfsLayout::V2 => AfsVersion::V2,
        }
    }
}

#[derive(Args)]
pub struct CreateArgs {
    /// An input directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// A target archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Format of the archive, by name or extension (afs, narc, pvm, u8, ...)
    #[arg(long, value_name = "FMT")]
    format: ArchiveFormat,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    /// Layout of AFS archives
    #[arg(long, value_enum, default_value_t = AfsLayout::V2)]
    afs_version: AfsLayout,

    /// Leave entry names out of formats where they are optional
    #[arg(long, default_value_t = false)]
    no_names: bool,
}

impl CreateArgs {
    pub fn handle(&self) -> Result<()> {
        info!("creating {} archive {}", self.format, &self.file.display());

        let files = WalkDir::new(&self.directory)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| !e.file_type().is_dir())
            .collect::<Vec<_>>();

        let options = WriterOptions::builder()
            .afs_version(self.afs_version.into())
            .store_names(!self.no_names)
            .build();
        let mut archive = ArchiveWriter::new(self.create_target()?, self.format, options);
        archive.on_entry_written(|progress| {
            info!("[{}/{}] wrote {}", progress.index + 1, progress.total, progress.name);
        });

        let mut rejected: Vec<RejectedContent> = Vec::new();
        for file in files {
            let relative = file
                .path()
                .strip_prefix(&self.directory)
                .into_diagnostic()?;
            let name = relative
                .components()
                .map(|component| {
                    component.as_os_str().to_str().ok_or(miette!(
                        "unable to convert {} to a string",
                        relative.display()
                    ))
                })
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .join("/");

            let source = File::open(file.path())
                .into_diagnostic()
                .context(format!("opening {}", file.path().display()))?;

            if let Err(error) = archive.add(name.as_str(), source) {
                let Some(rejection) = error.rejection().cloned() else {
                    return Err(error).context(format!("adding {}", file.path().display()));
                };
                warn!("skipping {}: {}", name, rejection.reason);
                rejected.push(rejection);
            }
        }

        let count = archive.len();
        let mut out = archive.finish().context("finalizing archive")?;
        out.flush().into_diagnostic()?;
        info!("wrote {count} entries to {}", self.file.display());

        for rejection in &rejected {
            eprintln!(
                "{}: {}",
                "warning".if_supports_color(Stderr, |t| t.yellow()),
                rejection
            );
        }

        Ok(())
    }

    fn create_target(&self) -> Result<BufWriter<File>> {
        let file = if self.overwrite {
            File::create(&self.file)
        } else {
            File::create_new(&self.file)
        };
        Ok(BufWriter::new(
            file.into_diagnostic()
                .context(format!("creating {}", &self.file.display()))?,
        ))
    }
}
