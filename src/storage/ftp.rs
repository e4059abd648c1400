use super::{FileInfo, FileMeta, Storage, StorageError, IO_TIMEOUT_SECS, OP_TIMEOUT_SECS};
use async_trait::async_trait;
use futures::TryStreamExt;
use opendal::layers::{RetryLayer, TimeoutLayer};
use opendal::{Metakey, Operator};
use std::time::Duration;

pub struct FtpStorage {
    operator: Operator,
    name: String,
}

impl FtpStorage {
    pub async fn new(
        host: &str,
        port: u16,
        user: &str,
        password: &str,
        secure: bool,
        root: Option<String>,
    ) -> Result<Self, StorageError> {
        use opendal::services::Ftp;

        let scheme = if secure { "ftps" } else { "ftp" };
        let endpoint = format!("{}://{}:{}", scheme, host, port);

        let mut builder = Ftp::default()
            .endpoint(&endpoint)
            .user(user)
            .password(password);

        if let Some(ref r) = root {
            builder = builder.root(r);
        }

        // 重试和超时都交给传输层处理
        let operator = Operator::new(builder)
            .map_err(|e| StorageError::Other(e.to_string()))?
            .layer(RetryLayer::new().with_max_times(3))
            .layer(
                TimeoutLayer::default()
                    .with_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
                    .with_io_timeout(Duration::from_secs(IO_TIMEOUT_SECS)),
            )
            .finish();

        // 提前验证连接：登录被拒或主机不可达在这里就终止
        if let Err(e) = operator.check().await {
            return Err(match e.kind() {
                opendal::ErrorKind::PermissionDenied => {
                    StorageError::Auth(format!("{}@{}: {}", user, host, e))
                }
                _ => StorageError::Network(format!("{}: {}", endpoint, e)),
            });
        }

        let name = format!(
            "{}://{}:{}{}",
            scheme,
            host,
            port,
            root.as_deref()
                .map(|r| format!("/{}", r.trim_start_matches('/')))
                .unwrap_or_default()
        );

        Ok(Self { operator, name })
    }

    /// 逐级建立父目录链，已存在的层级静默跳过
    async fn ensure_parent_dirs(&self, path: &str) -> Result<(), StorageError> {
        let parent = match std::path::Path::new(path).parent() {
            Some(p) => p.to_string_lossy().replace('\\', "/"),
            None => return Ok(()),
        };
        if parent.is_empty() || parent == "." || parent == "/" {
            return Ok(());
        }

        let mut current = String::new();
        for part in parent.split('/').filter(|s| !s.is_empty()) {
            current.push_str(part);
            current.push('/');
            match self.operator.create_dir(&current).await {
                Ok(()) => {}
                Err(e) if e.kind() == opendal::ErrorKind::AlreadyExists => {}
                Err(e) if e.kind() == opendal::ErrorKind::PermissionDenied => {
                    return Err(StorageError::Permission(format!("{}: {}", current, e)));
                }
                // 部分服务器对已存在的目录返回一般错误，留给写入本身去失败
                Err(e) => tracing::debug!("创建目录 {} 返回: {}", current, e),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for FtpStorage {
    async fn list_dir(&self, path: &str) -> Result<Vec<FileInfo>, StorageError> {
        let dir = if path.is_empty() || path.ends_with('/') {
            path.to_string()
        } else {
            format!("{}/", path)
        };

        let mut lister = self
            .operator
            .lister_with(&dir)
            .metakey(Metakey::ContentLength | Metakey::LastModified | Metakey::Mode)
            .await
            .map_err(|e| StorageError::from_opendal(e, path))?;

        let mut files = Vec::new();
        while let Some(entry) = lister
            .try_next()
            .await
            .map_err(|e| StorageError::from_opendal(e, path))?
        {
            let path_str = entry.path().trim_matches('/').to_string();

            // 跳过目录自身
            if path_str.is_empty() || path_str == dir.trim_matches('/') {
                continue;
            }

            let meta = entry.metadata();

            files.push(FileInfo {
                path: path_str,
                size: meta.content_length(),
                modified_time: meta.last_modified().map_or(0, |t| t.timestamp()),
                is_dir: meta.is_dir(),
            });
        }

        Ok(files)
    }

    async fn stat(&self, path: &str) -> Result<Option<FileMeta>, StorageError> {
        match self.operator.stat(path).await {
            Ok(meta) => Ok(Some(FileMeta {
                size: meta.content_length(),
                modified_time: meta.last_modified().map_or(0, |t| t.timestamp()),
                is_dir: meta.is_dir(),
            })),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::from_opendal(e, path)),
        }
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let data = self
            .operator
            .read(path)
            .await
            .map_err(|e| StorageError::from_opendal(e, path))?;
        Ok(data.to_vec())
    }

    async fn write(&self, path: &str, data: Vec<u8>) -> Result<(), StorageError> {
        let path = path.replace('\\', "/");
        let path = path.trim_start_matches('/');

        self.ensure_parent_dirs(path).await?;

        self.operator
            .write(path, data)
            .await
            .map_err(|e| StorageError::from_opendal(e, path))?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        match self.operator.delete(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::from_opendal(e, path)),
        }
    }

    async fn create_dir(&self, path: &str) -> Result<(), StorageError> {
        let dir_path = if path.ends_with('/') {
            path.to_string()
        } else {
            format!("{}/", path)
        };
        self.operator
            .create_dir(&dir_path)
            .await
            .map_err(|e| StorageError::from_opendal(e, path))?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
