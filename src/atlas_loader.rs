use crate::volume::Volume;

use flate2::read::GzDecoder;
use ndarray::{Array2, Array3, s};
use std::{
    fs::{self, File},
    io::{BufReader, Read},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tiff::decoder::{Decoder, DecodingResult};
use tracing::{debug, info, warn};

/// Published atlas index and archives
pub const REMOTE_ROOT: &str = "https://gin.g-node.org/brainglobe/atlases/raw/master";
const VERSIONS_FILE: &str = "last_versions.conf";
const REFERENCE_FILE: &str = "reference.tiff";

#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("Atlas {0} is not available locally and could not be fetched")]
    NotAvailable(String),

    #[error("Atlas {0} is not listed in the remote version index")]
    UnknownSource(String),

    #[error("Reference volume has no planes")]
    NoPlanes,

    #[error("Inconsistent plane dimensions")]
    InconsistentDimensions,

    #[error("Unsupported reference sample format")]
    UnsupportedFormat,

    #[error("Download failed: {0}")]
    Download(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),
}

/// Anything able to hand out a reference volume for a source name
pub trait AtlasProvider {
    fn reference(&self, source: &str) -> Result<Volume, AtlasError>;
}

/// `major.minor` atlas release
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct AtlasVersion {
    pub major: u32,
    pub minor: u32,
}

impl AtlasVersion {
    pub fn parse(text: &str) -> Option<Self> {
        let (major, minor) = text.trim().split_once('.')?;
        Some(Self {
            major: major.parse().ok()?,
            minor: minor.parse().ok()?,
        })
    }
}

impl std::fmt::Display for AtlasVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Source of the published version index and atlas archives
pub trait AtlasRemote {
    fn versions(&self) -> Result<String, AtlasError>;
    fn archive(&self, source: &str, version: AtlasVersion) -> Result<Box<dyn Read>, AtlasError>;
}

/// The BrainGlobe GIN repository over HTTPS
pub struct GinRemote {
    root: String,
}

impl Default for GinRemote {
    fn default() -> Self {
        Self {
            root: REMOTE_ROOT.to_string(),
        }
    }
}

impl AtlasRemote for GinRemote {
    fn versions(&self) -> Result<String, AtlasError> {
        let url = format!("{}/{VERSIONS_FILE}", self.root);
        debug!(%url, "fetching atlas version index");
        ureq::get(&url)
            .call()
            .map_err(|e| AtlasError::Download(e.to_string()))?
            .into_string()
            .map_err(AtlasError::Io)
    }

    fn archive(&self, source: &str, version: AtlasVersion) -> Result<Box<dyn Read>, AtlasError> {
        let url = format!("{}/{source}_v{version}.tar.gz", self.root);
        info!(%url, "downloading atlas");
        let response = ureq::get(&url)
            .call()
            .map_err(|e| AtlasError::Download(e.to_string()))?;
        Ok(Box::new(response.into_reader()))
    }
}

/// BrainGlobe-style cache: `<root>/<source>_v<major>.<minor>/reference.tiff`
pub struct BrainGlobeCache<R = GinRemote> {
    root: PathBuf,
    check_latest: bool,
    remote: R,
}

impl BrainGlobeCache<GinRemote> {
    pub fn new(root: impl Into<PathBuf>, check_latest: bool) -> Self {
        Self::with_remote(root, check_latest, GinRemote::default())
    }
}

impl<R: AtlasRemote> BrainGlobeCache<R> {
    pub fn with_remote(root: impl Into<PathBuf>, check_latest: bool, remote: R) -> Self {
        Self {
            root: root.into(),
            check_latest,
            remote,
        }
    }

    /// Highest locally cached release of `source`
    pub fn local_version(&self, source: &str) -> Option<(AtlasVersion, PathBuf)> {
        let prefix = format!("{source}_v");
        fs::read_dir(&self.root)
            .ok()?
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let version = AtlasVersion::parse(name.strip_prefix(&prefix)?)?;
                Some((version, entry.path()))
            })
            .max_by_key(|(version, _)| *version)
    }

    fn remote_version(&self, source: &str) -> Result<AtlasVersion, AtlasError> {
        let index = self.remote.versions()?;
        parse_version_index(&index, source).ok_or_else(|| AtlasError::UnknownSource(source.to_string()))
    }

    /// Unpack into a staging directory under the cache root and move the
    /// atlas into place only once extraction has completed.
    fn download(&self, source: &str, version: AtlasVersion) -> Result<PathBuf, AtlasError> {
        fs::create_dir_all(&self.root)?;
        let staging = tempfile::Builder::new()
            .prefix(".download-")
            .tempdir_in(&self.root)?;

        let archive = self.remote.archive(source, version)?;
        tar::Archive::new(GzDecoder::new(archive)).unpack(staging.path())?;

        let name = format!("{source}_v{version}");
        let unpacked = staging.path().join(&name);
        if !unpacked.join(REFERENCE_FILE).is_file() {
            return Err(AtlasError::NotAvailable(source.to_string()));
        }

        let dir = self.root.join(&name);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::rename(&unpacked, &dir)?;
        info!(path = %dir.display(), "atlas extracted");
        Ok(dir)
    }

    /// Directory holding the atlas files, fetching them when needed
    pub fn resolve(&self, source: &str) -> Result<PathBuf, AtlasError> {
        let local = self.local_version(source);
        if !self.check_latest {
            if let Some((version, dir)) = &local {
                debug!(%source, %version, "using cached atlas");
                return Ok(dir.clone());
            }
        }

        let remote = match self.remote_version(source) {
            Ok(version) => version,
            Err(err) => {
                return match local {
                    Some((version, dir)) => {
                        warn!(%source, %version, error = %err, "could not check latest atlas version, using cached copy");
                        Ok(dir)
                    }
                    None => Err(err),
                };
            }
        };

        match local {
            Some((version, dir)) if version >= remote => {
                info!(%source, %version, "cached atlas is up to date");
                Ok(dir)
            }
            Some((version, _)) => {
                info!(%source, from = %version, to = %remote, "updating atlas");
                self.download(source, remote)
            }
            None => self.download(source, remote),
        }
    }
}

impl<R: AtlasRemote> AtlasProvider for BrainGlobeCache<R> {
    fn reference(&self, source: &str) -> Result<Volume, AtlasError> {
        let dir = self.resolve(source)?;
        load_reference(dir.join(REFERENCE_FILE))
    }
}

/// Find `source = major.minor` in the INI-style version index
pub fn parse_version_index(index: &str, source: &str) -> Option<AtlasVersion> {
    index
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('[') && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .find(|(name, _)| name.trim() == source)
        .and_then(|(_, version)| AtlasVersion::parse(version))
}

/// Read a multi-page TIFF where page `i` is the `ap = i` plane
pub fn load_reference(path: impl AsRef<Path>) -> Result<Volume, AtlasError> {
    let path = path.as_ref();
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;

    let mut planes = Vec::new();
    loop {
        planes.push(decode_plane(&mut decoder)?);
        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }

    let volume = Volume::new(build_volume_array(&planes)?);
    info!(path = %path.display(), dim = ?volume.dim(), "reference volume loaded");
    Ok(volume)
}

fn decode_plane<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<Array2<u16>, AtlasError> {
    let (width, height) = decoder.dimensions()?;
    let shape = (height as usize, width as usize);
    let samples: Vec<u16> = match decoder.read_image()? {
        DecodingResult::U16(data) => data,
        DecodingResult::U8(data) => data.into_iter().map(u16::from).collect(),
        _ => return Err(AtlasError::UnsupportedFormat),
    };
    Array2::from_shape_vec(shape, samples).map_err(|_| AtlasError::InconsistentDimensions)
}

fn build_volume_array(planes: &[Array2<u16>]) -> Result<Array3<u16>, AtlasError> {
    let first = planes.first().ok_or(AtlasError::NoPlanes)?;
    let (height, width) = first.dim();
    if planes.iter().any(|plane| plane.dim() != (height, width)) {
        return Err(AtlasError::InconsistentDimensions);
    }

    let mut volume = Array3::<u16>::zeros((planes.len(), height, width));
    for (i, plane) in planes.iter().enumerate() {
        volume.slice_mut(s![i, .., ..]).assign(plane);
    }
    Ok(volume)
}
