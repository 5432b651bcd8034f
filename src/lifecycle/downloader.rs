//! 插件包下载器
//!
//! 从 URL 下载插件压缩包到临时文件，支持 SHA-256 校验。
//! 下载只是把远端来源变成本地路径，之后走统一的路径安装流程。

use futures::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::manager::InstallError;

/// 下载器
pub struct PluginDownloader {
    client: Client,
}

impl Default for PluginDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginDownloader {
    /// 创建新的下载器
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(300))
                .user_agent("ModelCast")
                .build()
                .unwrap_or_default(),
        }
    }

    /// 下载到指定目录，返回本地文件路径
    ///
    /// 文件名取 URL 最后一段。响应体边下边写盘并同步计算摘要，
    /// 大插件包不会整体驻留内存；`expected_sha256` 存在且不匹配时
    /// 删除已写入的文件并失败。
    pub async fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        expected_sha256: Option<&str>,
    ) -> Result<PathBuf, InstallError> {
        let file_name = url
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| InstallError::Download(format!("URL 缺少文件名: {}", url)))?;

        fs::create_dir_all(dest_dir)
            .await
            .map_err(InstallError::Io)?;
        let dest = dest_dir.join(file_name);

        info!("下载插件包: {} -> {}", url, dest.display());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| InstallError::Download(format!("请求失败: {}", e)))?;

        if !response.status().is_success() {
            return Err(InstallError::Download(format!(
                "HTTP 状态异常: {}",
                response.status()
            )));
        }

        let mut file = fs::File::create(&dest).await.map_err(InstallError::Io)?;
        let mut hasher = Sha256::new();
        let mut total: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    drop(file);
                    let _ = fs::remove_file(&dest).await;
                    return Err(InstallError::Download(format!("读取响应失败: {}", e)));
                }
            };
            hasher.update(&chunk);
            file.write_all(&chunk).await.map_err(InstallError::Io)?;
            total += chunk.len() as u64;
        }
        file.flush().await.map_err(InstallError::Io)?;
        drop(file);

        if let Some(expected) = expected_sha256 {
            let actual = format!("{:x}", hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected) {
                let _ = fs::remove_file(&dest).await;
                return Err(InstallError::ChecksumMismatch {
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        info!("下载完成: {} ({} bytes)", dest.display(), total);
        Ok(dest)
    }
}
