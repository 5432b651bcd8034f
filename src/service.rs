//! 插件服务门面
//!
//! 管理端调用的统一入口：安装预览、各生命周期操作的转发、
//! 安装列表的过滤与分页。业务逻辑都在下层，这里只做编排与视图拼装。

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::descriptor::{
    DescriptorParser, PluginDescriptor, PluginValidator, ProviderDescriptor, ValidationResult,
};
use crate::lifecycle::{
    InstallError, InstallationStore, NoopProgressCallback, PluginLifecycleManager, PluginStatus,
    ProgressCallback,
};
use crate::provider::ModelConfig;

/// 安装预览结果
///
/// 校验是非致命路径：缺陷累积返回而不是首错即停，
/// 解析不出来的部分留空。
#[derive(Debug)]
pub struct InstallPreview {
    /// 插件描述符（清单可解析时）
    pub descriptor: Option<PluginDescriptor>,
    /// Provider 描述符（model 插件且可解析时）
    pub provider: Option<ProviderDescriptor>,
    /// 模型定义数量
    pub model_count: usize,
    /// 校验结果（错误 + 警告）
    pub validation: ValidationResult,
}

/// 插件列表过滤条件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginFilter {
    /// 按状态过滤
    #[serde(default)]
    pub status: Option<PluginStatus>,
    /// 按插件 ID / 名称关键字过滤
    #[serde(default)]
    pub keyword: Option<String>,
}

/// 分页结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    /// 当前页数据
    pub items: Vec<T>,
    /// 过滤后的总条数
    pub total: usize,
    /// 页码（从 1 开始）
    pub page: usize,
    /// 每页条数
    pub page_size: usize,
}

/// 插件视图（安装记录 + 描述符）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginView {
    /// 插件 ID
    pub plugin_id: String,
    /// 当前状态
    pub status: PluginStatus,
    /// 插件名称（描述符可读时）
    pub name: Option<String>,
    /// 版本（描述符可读时）
    pub version: Option<String>,
    /// 安装目录
    pub install_path: Option<String>,
    /// 安装时间
    pub installed_at: chrono::DateTime<chrono::Utc>,
}

/// 插件服务
pub struct PluginService {
    manager: Arc<PluginLifecycleManager>,
    store: Arc<dyn InstallationStore>,
    parser: DescriptorParser,
    validator: PluginValidator,
}

impl PluginService {
    /// 创建服务
    pub fn new(manager: Arc<PluginLifecycleManager>, store: Arc<dyn InstallationStore>) -> Self {
        Self {
            manager,
            store,
            parser: DescriptorParser::new(),
            validator: PluginValidator::new(),
        }
    }

    /// 安装预览：校验压缩包并提取描述符，不触发任何状态变更
    pub fn preview(&self, archive: &Path) -> InstallPreview {
        let validation = self.validator.validate_archive(archive);
        let descriptor = self.parser.parse_plugin(archive).ok();
        let provider = self.parser.parse_provider(archive).ok();
        let model_count = provider
            .as_ref()
            .and_then(|p| self.parser.parse_model_definitions(p, archive).ok())
            .map(|models| models.len())
            .unwrap_or(0);

        InstallPreview {
            descriptor,
            provider,
            model_count,
            validation,
        }
    }

    /// 从本地路径安装
    pub async fn install(
        &self,
        tenant_id: &str,
        archive: &Path,
    ) -> Result<PluginDescriptor, InstallError> {
        self.manager
            .install(tenant_id, archive, &NoopProgressCallback)
            .await
    }

    /// 从本地路径安装并上报进度
    pub async fn install_with_progress(
        &self,
        tenant_id: &str,
        archive: &Path,
        progress: &dyn ProgressCallback,
    ) -> Result<PluginDescriptor, InstallError> {
        self.manager.install(tenant_id, archive, progress).await
    }

    /// 从 URL 安装
    pub async fn install_by_url(
        &self,
        tenant_id: &str,
        url: &str,
        expected_sha256: Option<&str>,
    ) -> Result<PluginDescriptor, InstallError> {
        self.manager
            .install_by_url(tenant_id, url, expected_sha256, &NoopProgressCallback)
            .await
    }

    /// 从插件市场安装
    ///
    /// 市场只是另一种下载来源：按约定路径拼出包地址后走 URL 安装。
    pub async fn install_from_marketplace(
        &self,
        tenant_id: &str,
        marketplace_url: &str,
        plugin_id: &str,
        version: &str,
    ) -> Result<PluginDescriptor, InstallError> {
        let url = format!(
            "{}/plugins/{}-{}.zip",
            marketplace_url.trim_end_matches('/'),
            plugin_id,
            version
        );
        self.manager
            .install_by_url(tenant_id, &url, None, &NoopProgressCallback)
            .await
    }

    /// 从上传的字节安装
    pub async fn install_bytes(
        &self,
        tenant_id: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<PluginDescriptor, InstallError> {
        self.manager
            .install_bytes(tenant_id, file_name, bytes, &NoopProgressCallback)
            .await
    }

    /// 启用插件
    pub async fn enable(&self, tenant_id: &str, plugin_id: &str) -> Result<(), InstallError> {
        self.manager.enable(tenant_id, plugin_id).await
    }

    /// 禁用插件
    pub async fn disable(&self, tenant_id: &str, plugin_id: &str) -> Result<(), InstallError> {
        self.manager.disable(tenant_id, plugin_id).await
    }

    /// 卸载插件
    pub async fn uninstall(&self, tenant_id: &str, plugin_id: &str) -> Result<(), InstallError> {
        self.manager.uninstall(tenant_id, plugin_id).await
    }

    /// 更新模型运行配置
    pub async fn update_model_config(
        &self,
        tenant_id: &str,
        plugin_id: &str,
        full_model_id: &str,
        config: ModelConfig,
    ) -> Result<(), InstallError> {
        self.manager
            .update_model_config(tenant_id, plugin_id, full_model_id, config)
            .await
    }

    /// 查询单个插件
    pub async fn get_plugin(&self, tenant_id: &str, plugin_id: &str) -> Option<PluginView> {
        let record = self.store.get(tenant_id, plugin_id).await.ok()??;
        Some(self.to_view(record))
    }

    /// 按条件分页列出插件，按插件 ID 稳定排序
    pub async fn get_plugins(
        &self,
        tenant_id: &str,
        filter: &PluginFilter,
        page: usize,
        page_size: usize,
    ) -> Page<PluginView> {
        let records = self.store.list(tenant_id).await.unwrap_or_default();
        let mut views: Vec<PluginView> = records
            .into_iter()
            .map(|r| self.to_view(r))
            .filter(|v| Self::matches(v, filter))
            .collect();
        views.sort_by(|a, b| a.plugin_id.cmp(&b.plugin_id));

        let total = views.len();
        let page = page.max(1);
        let page_size = page_size.max(1);
        let start = (page - 1) * page_size;
        let items = if start >= total {
            Vec::new()
        } else {
            views
                .into_iter()
                .skip(start)
                .take(page_size)
                .collect()
        };

        Page {
            items,
            total,
            page,
            page_size,
        }
    }

    fn matches(view: &PluginView, filter: &PluginFilter) -> bool {
        if let Some(status) = filter.status {
            if view.status != status {
                return false;
            }
        }
        if let Some(keyword) = filter.keyword.as_deref().filter(|k| !k.is_empty()) {
            let keyword = keyword.to_lowercase();
            let hit_id = view.plugin_id.to_lowercase().contains(&keyword);
            let hit_name = view
                .name
                .as_deref()
                .map(|n| n.to_lowercase().contains(&keyword))
                .unwrap_or(false);
            if !hit_id && !hit_name {
                return false;
            }
        }
        true
    }

    fn to_view(&self, record: crate::lifecycle::PluginInstallationRecord) -> PluginView {
        let descriptor = record
            .install_path
            .as_deref()
            .map(Path::new)
            .and_then(find_archive_in)
            .and_then(|archive| self.parser.parse_plugin(&archive).ok());

        PluginView {
            plugin_id: record.plugin_id,
            status: record.status,
            name: descriptor.as_ref().map(|d| d.name.clone()),
            version: descriptor.as_ref().map(|d| d.version.clone()),
            install_path: record.install_path,
            installed_at: record.installed_at,
        }
    }
}

/// 在安装目录下定位插件压缩包
fn find_archive_in(dir: &Path) -> Option<std::path::PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() && crate::descriptor::PackageFormat::from_extension(&path).is_some() {
            return Some(path);
        }
    }
    None
}
