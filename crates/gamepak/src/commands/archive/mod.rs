use std::path::Path;

pub mod create;
pub mod extract;
pub mod identify;
pub mod list;

#[derive(clap::Subcommand)]
pub enum ArchiveCommands {
    /// Detect the format of archive files
    Identify(identify::IdentifyArgs),
    /// List the entries of an archive
    List(list::ListArgs),
    /// Extract an archive into a directory
    Extract(extract::ExtractArgs),
    /// Build an archive from a directory
    Create(create::CreateArgs),
}

impl ArchiveCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            ArchiveCommands::Identify(identify) => identify.handle(),
            ArchiveCommands::List(list) => list.handle(),
            ArchiveCommands::Extract(extract) => extract.handle(),
            ArchiveCommands::Create(create) => create.handle(),
        }
    }
}

/// File name of `path`, used by the formats that are only recognized by their extension
fn name_hint(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}
