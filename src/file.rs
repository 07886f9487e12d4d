use actix_web::web::Bytes;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

pub(crate) struct File {
    inner: tokio::fs::File,
}

impl File {
    pub(crate) async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(File {
            inner: tokio::fs::File::open(path).await?,
        })
    }

    pub(crate) async fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(File {
            inner: tokio::fs::File::create(path).await?,
        })
    }

    pub(crate) async fn write_from_bytes(&mut self, mut bytes: Bytes) -> std::io::Result<()> {
        self.inner.write_all_buf(&mut bytes).await?;
        Ok(())
    }

    pub(crate) async fn close(mut self) -> std::io::Result<()> {
        self.inner.flush().await?;
        self.inner.sync_all().await
    }

    pub(crate) fn read_to_stream(self) -> ReaderStream<tokio::fs::File> {
        ReaderStream::new(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::File;
    use actix_web::web::Bytes;
    use futures_util::TryStreamExt;

    #[actix_rt::test]
    async fn chunks_written_then_read_back() {
        let dir = tempfile::tempdir().expect("Created tempdir");
        let path = dir.path().join("chunks");

        let mut file = File::create(&path).await.expect("Created file");
        file.write_from_bytes(Bytes::from_static(b"hello "))
            .await
            .expect("Wrote chunk");
        file.write_from_bytes(Bytes::from_static(b"world"))
            .await
            .expect("Wrote chunk");
        file.close().await.expect("Closed file");

        let read = File::open(&path)
            .await
            .expect("Opened file")
            .read_to_stream()
            .try_fold(Vec::new(), |mut acc, bytes| async move {
                acc.extend_from_slice(&bytes);
                Ok(acc)
            })
            .await
            .expect("Read file");

        assert_eq!(read, b"hello world");
    }

    #[actix_rt::test]
    async fn opening_a_missing_file_fails() {
        let dir = tempfile::tempdir().expect("Created tempdir");

        let res = File::open(dir.path().join("missing")).await;

        assert!(matches!(res, Err(e) if e.kind() == std::io::ErrorKind::NotFound));
    }
}
