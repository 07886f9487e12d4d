use std::sync::Arc;

use crate::{
    auth::Authenticator,
    classify::MetadataProbe,
    config::Configuration,
    ffmpeg::Remuxer,
    repo::ArcRepo,
    store::{file_store::FileStore, object_store::ObjectStore},
    tmp_file::ArcTmpDir,
};

#[derive(Clone)]
pub(crate) struct State {
    pub(super) config: Configuration,
    pub(super) tmp_dir: ArcTmpDir,
    pub(super) repo: ArcRepo,
    pub(super) auth: Authenticator,
    pub(super) assets: FileStore,
    pub(super) videos: ObjectStore,
    pub(super) probe: Arc<dyn MetadataProbe>,
    pub(super) remuxer: Arc<dyn Remuxer>,
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("tmp_dir", &self.tmp_dir)
            .field("repo", &self.repo)
            .field("assets", &self.assets)
            .field("videos", &self.videos)
            .finish()
    }
}
