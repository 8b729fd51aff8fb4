use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::info;

use onebridge_media::{
    hash_file, read_base64_when_ready, wait_for_file, AudioConverter, Ffmpeg, SilkCodec,
    SilkEncoderCli, SilkTranscoder, TranscodedAudio,
};
use onebridge_net::Downloader;
use onebridge_shared::{Entity, EntityKind};
use onebridge_store::Database;

use crate::config::BridgeConfig;
use crate::entities::{EntityCache, EntitySource};
use crate::error::CoreError;
use crate::resolver::{FileCacheLookup, ResolvedResource, ResourceResolver};

/// The surface protocol handlers call into.
pub struct Bridge {
    config: BridgeConfig,
    entities: Arc<EntityCache>,
    resolver: ResourceResolver,
    transcoder: SilkTranscoder,
}

impl Bridge {
    /// Build a bridge whose opaque references are looked up in the file cache
    /// database under `config.data_dir`.
    pub fn open(config: BridgeConfig, source: Arc<dyn EntitySource>) -> Result<Self, CoreError> {
        let db = Database::open_in_dir(&config.data_dir)?;
        Self::new(config, source, Box::new(Mutex::new(db)))
    }

    /// Build a bridge using the external ffmpeg and silk encoder binaries
    /// named in `config`. Creates the temp and data directories.
    pub fn new(
        config: BridgeConfig,
        source: Arc<dyn EntitySource>,
        file_cache: Box<dyn FileCacheLookup>,
    ) -> Result<Self, CoreError> {
        let converter: Arc<dyn AudioConverter> = Arc::new(Ffmpeg::new(&config.ffmpeg_path));
        let codec: Arc<dyn SilkCodec> = Arc::new(SilkEncoderCli::new(
            &config.silk_encoder_path,
            &config.temp_dir,
        ));
        Self::with_parts(config, source, file_cache, converter, codec)
    }

    /// Build a bridge with explicit transcoding collaborators.
    pub fn with_parts(
        config: BridgeConfig,
        source: Arc<dyn EntitySource>,
        file_cache: Box<dyn FileCacheLookup>,
        converter: Arc<dyn AudioConverter>,
        codec: Arc<dyn SilkCodec>,
    ) -> Result<Self, CoreError> {
        config.ensure_dirs()?;

        let downloader = Downloader::new()?;
        let resolver =
            ResourceResolver::new(&config.temp_dir, config.path_style, downloader, file_cache);
        let transcoder = SilkTranscoder::new(&config.data_dir, converter, codec)
            .with_policy(config.duration)
            .with_sample_rate(config.sample_rate);

        info!(
            temp_dir = %config.temp_dir.display(),
            data_dir = %config.data_dir.display(),
            "Bridge initialised"
        );

        Ok(Self {
            config,
            entities: Arc::new(EntityCache::new(source)),
            resolver,
            transcoder,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The entity cache, for the operations not surfaced here directly.
    pub fn entities(&self) -> Arc<EntityCache> {
        Arc::clone(&self.entities)
    }

    pub async fn resolve_entity(&self, kind: &EntityKind, identifier: &str) -> Option<Entity> {
        self.entities.resolve_entity(kind, identifier).await
    }

    pub async fn refresh_group_members(&self, group_code: &str) -> Result<(), CoreError> {
        self.entities.refresh_group_members(group_code).await
    }

    pub async fn delete_group(&self, group_code: &str) -> bool {
        self.entities.delete_group(group_code).await
    }

    pub async fn get_uid_by_uin(&self, uin: &str) -> Option<String> {
        self.entities.uid_by_uin(uin).await
    }

    pub async fn resolve_resource(&self, uri: &str, hint: Option<&str>) -> ResolvedResource {
        self.resolver.resolve(uri, hint).await
    }

    pub async fn transcode_audio(&self, path: &Path) -> Option<TranscodedAudio> {
        self.transcoder.transcode(path).await
    }

    /// Hex blake3 digest of the file's contents.
    pub async fn hash_file(&self, path: &Path) -> Result<String, CoreError> {
        Ok(hash_file(path).await?)
    }

    /// Wait up to the configured timeout for `path` to appear.
    pub async fn wait_for_file(&self, path: &Path) -> Result<(), CoreError> {
        Ok(wait_for_file(path, self.config.file_wait_timeout).await?)
    }

    pub async fn file_to_base64(&self, path: &Path) -> Result<String, CoreError> {
        Ok(read_base64_when_ready(path, self.config.file_wait_timeout).await?)
    }
}
