//! Clients for the external generation services.
//!
//! - [`VideoGenerationService`]: submit/poll clip generation
//! - [`ImageGenerationService`]: reference image generation
//! - [`ArtifactDownloader`]: streaming download of generated artifacts

pub mod config;
pub mod download;
pub mod error;
pub mod image;
pub mod video;

pub use config::{ImageServiceConfig, VideoServiceConfig, DEFAULT_DOWNLOAD_TIMEOUT, DEFAULT_VIDEO_MODEL};
pub use download::{ArtifactDownloader, HttpDownloader};
pub use error::{ClientError, ClientResult};
pub use image::{HttpImageClient, ImageGenerationService, IMAGE_SIZE};
pub use video::{HttpVideoClient, RemoteStatus, VideoGenerationService, VideoRequest};
