use clap::Args;
use gamepak_archive::{entry::Entry, try_identify, ArchiveReader};
use miette::{Context, IntoDiagnostic, Result};
use std::{
    fs::File,
    io::{BufReader, Cursor, Read, Seek, Write},
    path::{Path, PathBuf},
};
use tracing::{info, warn};

#[derive(Args)]
pub struct ExtractArgs {
    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    /// Unpack extracted entries that are archives themselves into `<entry>.d`
    #[arg(long, default_value_t = false)]
    recursive: bool,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let file = File::open(&self.file)
            .into_diagnostic()
            .context(format!("path: {}", &self.file.display()))?;
        let hint = super::name_hint(&self.file);
        let mut archive = ArchiveReader::with_hint(BufReader::new(file), hint.as_deref())?;
        info!(format = %archive.format(), entries = archive.len(), "opened {}", self.file.display());

        self.unpack(&mut archive, &self.directory)
    }

    fn unpack<R: Read + Seek>(&self, archive: &mut ArchiveReader<R>, directory: &Path) -> Result<()> {
        for index in 0..archive.len() {
            let target = directory.join(relative_path(&archive.entries()[index]));
            info!("writing {}", target.display());

            if !self.recursive {
                archive
                    .extract_to_path(index, &target, self.overwrite)
                    .context(format!("extracting {}", target.display()))?;
                continue;
            }

            let mut data = Vec::new();
            archive.extract_to(index, &mut data)?;
            self.create(&target)?.write_all(&data).into_diagnostic()?;

            let mut content = Cursor::new(data);
            let hint = super::name_hint(&target);
            let Some(format) = try_identify(&mut content, hint.as_deref()) else {
                continue;
            };

            match ArchiveReader::with_format(content, format) {
                Ok(mut nested) => {
                    let mut nested_directory = target.into_os_string();
                    nested_directory.push(".d");
                    self.unpack(&mut nested, Path::new(&nested_directory))?;
                }
                Err(error) => warn!("{} looked like a {format} archive: {error}", target.display()),
            }
        }
        Ok(())
    }

    fn create(&self, path: &Path) -> Result<File> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .into_diagnostic()
                .context(format!("creating {}", parent.display()))?;
        }

        let file = if self.overwrite {
            File::create(path)
        } else {
            File::create_new(path)
        };
        file.into_diagnostic()
            .context(format!("creating {}", path.display()))
    }
}

/// Location of an entry below the target directory
///
/// Components that would escape the directory are dropped, unnamed entries are numbered.
fn relative_path(entry: &Entry) -> PathBuf {
    let path: PathBuf = entry
        .path()
        .split(['/', '\\'])
        .filter(|component| !matches!(*component, "" | "." | ".."))
        .collect();

    if path.as_os_str().is_empty() {
        PathBuf::from(format!("{:05}.bin", entry.index()))
    } else {
        path
    }
}
