use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_SOURCE: &str = "allen_mouse_25um";

/// Startup options, resolved once and immutable afterwards
#[derive(Clone, Debug, Parser)]
#[command(name = "atlas-slicer")]
#[command(about = "Browse slices of a volumetric brain reference atlas and annotate features")]
#[command(version)]
pub struct Config {
    /// Atlas source name.
    #[arg(long, default_value = DEFAULT_SOURCE)]
    pub use_source: String,

    /// Check the atlas source version against the latest release.
    #[arg(long)]
    pub check_latest: bool,

    /// Local atlas cache directory (default: ~/.brainglobe).
    #[arg(long)]
    pub atlas_dir: Option<PathBuf>,

    /// Address the viewer listens on.
    #[arg(long, default_value = "127.0.0.1:5006")]
    pub bind: SocketAddr,
}

impl Config {
    pub fn atlas_dir(&self) -> PathBuf {
        self.atlas_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".brainglobe")
        })
    }
}
