//! 插件生命周期管理器
//!
//! 编排 install / enable / disable / uninstall 的完整流程：
//! 校验状态机允许当前转换 → 执行阶段性工作 → 成功则落状态并发事件，
//! 失败则进入对应 `*_failed` 状态并发布携带失败阶段的错误事件。
//! 失败不做静默回滚，半成品资源留给重试路径处理。
//!
//! 并发约定：同一插件（同租户）上的生命周期操作互斥，
//! 不同插件的操作完全并行。

use dashmap::DashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::descriptor::{
    DescriptorError, DescriptorParser, ModelDefinition, PackageFormat, PluginDescriptor,
    PluginValidator, ProviderDescriptor,
};
use crate::loader::{LoadError, LoadStage, ProviderLoader};
use crate::logger::sanitize_log_message;
use crate::provider::ModelConfig;
use crate::registry::{
    split_model_id, ModelMetadata, ModelRegistry, NamespaceFactoryRegistry,
    OptionsHandlerRegistry, ProviderModelFactory,
};

use super::downloader::PluginDownloader;
use super::events::{LifecycleEvent, LifecycleEventBus, LifecycleEventKind};
use super::status::{transition, PluginAction, PluginStatus, StateError};
use super::store::{InstallationStore, PluginInstallationRecord, StoreError};

/// 安装阶段
///
/// 错误按起源阶段打标，方便运维定位失败环节。
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStage {
    /// 下载
    Download,
    /// 包校验
    Validation,
    /// 清单解析
    Parsing,
    /// 依赖检查（入口解析）
    DependencyCheck,
    /// 文件复制 / 解压
    FileCopy,
    /// 模型注册
    Registration,
    /// Provider 实例化
    Initialization,
    /// 清理
    Cleanup,
    /// 完成
    Complete,
    /// 失败
    Failed,
}

impl std::fmt::Display for InstallStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InstallStage::Download => "download",
            InstallStage::Validation => "validation",
            InstallStage::Parsing => "parsing",
            InstallStage::DependencyCheck => "dependency_check",
            InstallStage::FileCopy => "file_copy",
            InstallStage::Registration => "registration",
            InstallStage::Initialization => "initialization",
            InstallStage::Cleanup => "cleanup",
            InstallStage::Complete => "complete",
            InstallStage::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// 生命周期操作错误
#[derive(Error, Debug)]
pub enum InstallError {
    /// 下载失败
    #[error("下载失败: {0}")]
    Download(String),

    /// 校验失败（含累积的缺陷数）
    #[error("校验失败: {0}")]
    Validation(String),

    /// 校验和不匹配
    #[error("校验和不匹配: 期望 {expected}, 实际 {actual}")]
    ChecksumMismatch {
        /// 期望摘要
        expected: String,
        /// 实际摘要
        actual: String,
    },

    /// 解析失败
    #[error("解析失败: {0}")]
    Parse(#[from] DescriptorError),

    /// Provider 加载失败
    #[error("Provider 加载失败: {0}")]
    Load(#[from] LoadError),

    /// 文件复制失败
    #[error("文件复制失败: {0}")]
    FileCopy(String),

    /// 模型注册失败
    #[error("模型注册失败: {0}")]
    Registration(String),

    /// 清理失败
    #[error("清理失败: {0}")]
    Cleanup(String),

    /// 非法状态转换
    #[error(transparent)]
    State(#[from] StateError),

    /// 存储失败
    #[error(transparent)]
    Store(#[from] StoreError),

    /// 插件未安装
    #[error("插件未安装: {0}")]
    NotInstalled(String),

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl InstallError {
    /// 错误起源阶段
    pub fn stage(&self) -> InstallStage {
        match self {
            InstallError::Download(_) | InstallError::ChecksumMismatch { .. } => {
                InstallStage::Download
            }
            InstallError::Validation(_) => InstallStage::Validation,
            InstallError::Parse(_) => InstallStage::Parsing,
            InstallError::Load(e) => match e.stage() {
                LoadStage::DependencyCheck => InstallStage::DependencyCheck,
                LoadStage::Initialization => InstallStage::Initialization,
            },
            InstallError::FileCopy(_) | InstallError::Io(_) => InstallStage::FileCopy,
            InstallError::Registration(_) | InstallError::Store(_) => InstallStage::Registration,
            InstallError::Cleanup(_) => InstallStage::Cleanup,
            InstallError::State(_) | InstallError::NotInstalled(_) => InstallStage::Validation,
        }
    }
}

/// 安装进度
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InstallProgress {
    /// 当前阶段
    pub stage: InstallStage,
    /// 进度百分比 (0-100)
    pub percent: u8,
    /// 状态消息
    pub message: String,
}

impl InstallProgress {
    /// 创建进度
    pub fn new(stage: InstallStage, percent: u8, message: impl Into<String>) -> Self {
        Self {
            stage,
            percent: percent.min(100),
            message: message.into(),
        }
    }
}

/// 进度回调
pub trait ProgressCallback: Send + Sync {
    /// 进度更新
    fn on_progress(&self, progress: InstallProgress);
}

/// 空进度回调
pub struct NoopProgressCallback;

impl ProgressCallback for NoopProgressCallback {
    fn on_progress(&self, _progress: InstallProgress) {}
}

/// 生命周期管理器配置
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// 插件目录
    pub plugins_dir: PathBuf,
    /// 临时目录（下载与字节安装）
    pub temp_dir: PathBuf,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        let base = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("modelcast");
        Self {
            plugins_dir: base.join("plugins"),
            temp_dir: base.join("tmp"),
        }
    }
}

/// 插件生命周期管理器
pub struct PluginLifecycleManager {
    config: LifecycleConfig,
    parser: DescriptorParser,
    validator: PluginValidator,
    loader: ProviderLoader,
    downloader: PluginDownloader,
    model_registry: Arc<ModelRegistry>,
    factory_registry: Arc<NamespaceFactoryRegistry>,
    options_registry: Arc<OptionsHandlerRegistry>,
    store: Arc<dyn InstallationStore>,
    events: Arc<LifecycleEventBus>,
    /// 每插件互斥锁 (tenant/plugin -> lock)
    locks: DashMap<String, Arc<Mutex<()>>>,
    /// 运行时状态 (tenant/plugin -> status)
    statuses: DashMap<String, PluginStatus>,
}

impl PluginLifecycleManager {
    /// 创建管理器
    pub fn new(
        config: LifecycleConfig,
        loader: ProviderLoader,
        model_registry: Arc<ModelRegistry>,
        factory_registry: Arc<NamespaceFactoryRegistry>,
        options_registry: Arc<OptionsHandlerRegistry>,
        store: Arc<dyn InstallationStore>,
        events: Arc<LifecycleEventBus>,
    ) -> Self {
        Self {
            config,
            parser: DescriptorParser::new(),
            validator: PluginValidator::new(),
            loader,
            downloader: PluginDownloader::new(),
            model_registry,
            factory_registry,
            options_registry,
            store,
            events,
            locks: DashMap::new(),
            statuses: DashMap::new(),
        }
    }

    /// 事件总线句柄
    pub fn events(&self) -> Arc<LifecycleEventBus> {
        Arc::clone(&self.events)
    }

    fn lock_key(tenant_id: &str, plugin_id: &str) -> String {
        format!("{}/{}", tenant_id, plugin_id)
    }

    fn plugin_lock(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// 查询当前状态（内存优先，回落存储）
    pub async fn status(&self, tenant_id: &str, plugin_id: &str) -> PluginStatus {
        let key = Self::lock_key(tenant_id, plugin_id);
        if let Some(status) = self.statuses.get(&key) {
            return *status;
        }
        match self.store.get(tenant_id, plugin_id).await {
            Ok(Some(record)) => record.status,
            _ => PluginStatus::NotInstalled,
        }
    }

    async fn set_status(&self, tenant_id: &str, plugin_id: &str, status: PluginStatus) {
        let key = Self::lock_key(tenant_id, plugin_id);
        self.statuses.insert(key, status);
        if let Err(e) = self.store.update_status(tenant_id, plugin_id, status).await {
            tracing::warn!("持久化插件状态失败: 插件={} 状态={} 错误={}", plugin_id, status, e);
        }
    }

    fn publish(&self, plugin_id: &str, kind: LifecycleEventKind, status: PluginStatus) {
        self.events
            .publish(&LifecycleEvent::new(plugin_id, kind, status));
    }

    fn publish_error(&self, plugin_id: &str, stage: InstallStage, status: PluginStatus, message: &str) {
        self.events.publish(
            &LifecycleEvent::new(
                plugin_id,
                LifecycleEventKind::Error {
                    stage: stage.to_string(),
                },
                status,
            )
            .with_message(message),
        );
    }

    /// 从本地压缩包安装插件
    ///
    /// 流程: 校验 → 解析 → 状态转换 → 解压复制 → 落记录。
    /// 成功后状态为 `installed_disabled`，模型注册发生在 enable。
    pub async fn install(
        &self,
        tenant_id: &str,
        archive_path: &Path,
        progress: &dyn ProgressCallback,
    ) -> Result<PluginDescriptor, InstallError> {
        progress.on_progress(InstallProgress::new(InstallStage::Validation, 0, "校验包格式"));
        let validation = self.validator.validate_archive(archive_path);
        if !validation.is_valid() {
            let summary = validation
                .errors
                .iter()
                .map(|i| format!("{}: {}", i.field, i.message))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(InstallError::Validation(summary));
        }

        progress.on_progress(InstallProgress::new(InstallStage::Parsing, 10, "解析清单"));
        let descriptor = self.parser.parse_plugin(archive_path)?;
        let plugin_id = descriptor.id.clone();

        let key = Self::lock_key(tenant_id, &plugin_id);
        let lock = self.plugin_lock(&key);
        let _guard = lock.lock().await;

        let current = self.status(tenant_id, &plugin_id).await;
        let installing = transition(current, PluginAction::Install)?;

        // 进入过渡态前先落记录，失败态也要可见
        let mut record = PluginInstallationRecord::new(&plugin_id, tenant_id);
        record.status = installing;
        self.store.upsert(record).await?;
        self.statuses.insert(key.clone(), installing);

        match self
            .do_install_work(tenant_id, &plugin_id, archive_path, progress)
            .await
        {
            Ok(install_path) => {
                let done = transition(installing, PluginAction::Succeed)?;
                self.set_status(tenant_id, &plugin_id, done).await;
                if let Ok(Some(mut record)) = self.store.get(tenant_id, &plugin_id).await {
                    record.install_path = Some(install_path.to_string_lossy().to_string());
                    record.status = done;
                    let _ = self.store.upsert(record).await;
                }
                progress.on_progress(InstallProgress::new(
                    InstallStage::Complete,
                    100,
                    format!("插件 {} v{} 安装成功", descriptor.name, descriptor.version),
                ));
                self.publish(&plugin_id, LifecycleEventKind::Installed, done);
                tracing::info!("插件安装成功: {} v{}", plugin_id, descriptor.version);
                Ok(descriptor)
            }
            Err(e) => {
                let failed = transition(installing, PluginAction::Fail)?;
                self.set_status(tenant_id, &plugin_id, failed).await;
                let detail = sanitize_log_message(&e.to_string());
                progress.on_progress(InstallProgress::new(InstallStage::Failed, 0, detail.clone()));
                self.publish_error(&plugin_id, e.stage(), failed, &detail);
                tracing::warn!("插件安装失败: {} 阶段={} 错误={}", plugin_id, e.stage(), detail);
                Err(e)
            }
        }
    }

    /// 安装的阶段性工作：解压到插件目录并保留原始压缩包
    async fn do_install_work(
        &self,
        _tenant_id: &str,
        plugin_id: &str,
        archive_path: &Path,
        progress: &dyn ProgressCallback,
    ) -> Result<PathBuf, InstallError> {
        let plugin_dir = self.config.plugins_dir.join(plugin_id);
        tokio::fs::create_dir_all(&plugin_dir).await?;

        progress.on_progress(InstallProgress::new(InstallStage::FileCopy, 40, "解压插件包"));
        extract_archive(&self.parser, archive_path, &plugin_dir)?;

        // 保留原始压缩包，enable 时重新解析描述符
        let file_name = archive_path
            .file_name()
            .ok_or_else(|| InstallError::FileCopy("压缩包路径缺少文件名".to_string()))?;
        let stored_archive = plugin_dir.join(file_name);
        if stored_archive != archive_path {
            tokio::fs::copy(archive_path, &stored_archive).await?;
        }

        Ok(plugin_dir)
    }

    /// 从 URL 下载并安装
    pub async fn install_by_url(
        &self,
        tenant_id: &str,
        url: &str,
        expected_sha256: Option<&str>,
        progress: &dyn ProgressCallback,
    ) -> Result<PluginDescriptor, InstallError> {
        progress.on_progress(InstallProgress::new(InstallStage::Download, 0, "下载插件包"));
        let local = self
            .downloader
            .download(url, &self.config.temp_dir, expected_sha256)
            .await?;
        let result = self.install(tenant_id, &local, progress).await;
        let _ = tokio::fs::remove_file(&local).await;
        result
    }

    /// 从内存字节安装（上传场景）
    pub async fn install_bytes(
        &self,
        tenant_id: &str,
        file_name: &str,
        bytes: &[u8],
        progress: &dyn ProgressCallback,
    ) -> Result<PluginDescriptor, InstallError> {
        tokio::fs::create_dir_all(&self.config.temp_dir).await?;
        let temp_path = self.config.temp_dir.join(file_name);
        tokio::fs::write(&temp_path, bytes).await?;
        let result = self.install(tenant_id, &temp_path, progress).await;
        let _ = tokio::fs::remove_file(&temp_path).await;
        result
    }

    /// 启用插件
    ///
    /// 加载 Provider、注册工厂，并把插件声明的全部模型注册进模型注册表。
    pub async fn enable(&self, tenant_id: &str, plugin_id: &str) -> Result<(), InstallError> {
        let key = Self::lock_key(tenant_id, plugin_id);
        let lock = self.plugin_lock(&key);
        let _guard = lock.lock().await;

        let current = self.status(tenant_id, plugin_id).await;
        let enabling = transition(current, PluginAction::Enable)?;
        self.set_status(tenant_id, plugin_id, enabling).await;

        match self.do_enable_work(tenant_id, plugin_id).await {
            Ok(()) => {
                let done = transition(enabling, PluginAction::Succeed)?;
                self.set_status(tenant_id, plugin_id, done).await;
                self.publish(plugin_id, LifecycleEventKind::Enabled, done);
                tracing::info!("插件启用成功: {}", plugin_id);
                Ok(())
            }
            Err(e) => {
                let failed = transition(enabling, PluginAction::Fail)?;
                self.set_status(tenant_id, plugin_id, failed).await;
                let detail = sanitize_log_message(&e.to_string());
                self.publish_error(plugin_id, e.stage(), failed, &detail);
                tracing::warn!("插件启用失败: {} 阶段={} 错误={}", plugin_id, e.stage(), detail);
                Err(e)
            }
        }
    }

    async fn do_enable_work(&self, tenant_id: &str, plugin_id: &str) -> Result<(), InstallError> {
        let archive = self.installed_archive(tenant_id, plugin_id).await?;
        let (plugin, provider_descriptor, models) = self.parse_descriptors(&archive)?;

        let provider = self.loader.load(&plugin, &provider_descriptor)?;
        let namespace = provider.namespace().to_string();

        let factory = Arc::new(ProviderModelFactory::new(provider));
        self.factory_registry.register_factory(&namespace, factory);

        // 模型定义的命名空间即 Provider 代号，注册前二者必然一致
        for definition in models {
            let metadata =
                ModelMetadata::new(namespace.clone(), definition, ModelConfig::default());
            self.model_registry.register_model(metadata);
        }

        Ok(())
    }

    /// 禁用插件
    ///
    /// 注销该插件命名空间下的全部模型并移除工厂，级联触发缓存失效。
    pub async fn disable(&self, tenant_id: &str, plugin_id: &str) -> Result<(), InstallError> {
        let key = Self::lock_key(tenant_id, plugin_id);
        let lock = self.plugin_lock(&key);
        let _guard = lock.lock().await;

        let current = self.status(tenant_id, plugin_id).await;
        let disabling = transition(current, PluginAction::Disable)?;
        self.set_status(tenant_id, plugin_id, disabling).await;

        match self.do_disable_work(tenant_id, plugin_id).await {
            Ok(()) => {
                let done = transition(disabling, PluginAction::Succeed)?;
                self.set_status(tenant_id, plugin_id, done).await;
                self.publish(plugin_id, LifecycleEventKind::Disabled, done);
                tracing::info!("插件禁用成功: {}", plugin_id);
                Ok(())
            }
            Err(e) => {
                let failed = transition(disabling, PluginAction::Fail)?;
                self.set_status(tenant_id, plugin_id, failed).await;
                self.publish_error(plugin_id, e.stage(), failed, &sanitize_log_message(&e.to_string()));
                Err(e)
            }
        }
    }

    async fn do_disable_work(&self, tenant_id: &str, plugin_id: &str) -> Result<(), InstallError> {
        let namespace = self.plugin_namespace(tenant_id, plugin_id).await?;
        self.model_registry.unregister_namespace(&namespace);
        self.factory_registry.remove_factory(&namespace);
        self.options_registry.remove_provider(&namespace);
        Ok(())
    }

    /// 卸载插件
    ///
    /// 注销模型与工厂（若仍注册），删除插件目录与安装记录。
    pub async fn uninstall(&self, tenant_id: &str, plugin_id: &str) -> Result<(), InstallError> {
        let key = Self::lock_key(tenant_id, plugin_id);
        let lock = self.plugin_lock(&key);
        let _guard = lock.lock().await;

        let current = self.status(tenant_id, plugin_id).await;
        let uninstalling = transition(current, PluginAction::Uninstall)?;
        self.set_status(tenant_id, plugin_id, uninstalling).await;

        match self.do_uninstall_work(tenant_id, plugin_id).await {
            Ok(()) => {
                let done = transition(uninstalling, PluginAction::Succeed)?;
                let lock_key = Self::lock_key(tenant_id, plugin_id);
                self.statuses.insert(lock_key, done);
                let _ = self.store.remove(tenant_id, plugin_id).await;
                self.publish(plugin_id, LifecycleEventKind::Uninstalled, done);
                tracing::info!("插件卸载成功: {}", plugin_id);
                Ok(())
            }
            Err(e) => {
                let failed = transition(uninstalling, PluginAction::Fail)?;
                self.set_status(tenant_id, plugin_id, failed).await;
                self.publish_error(plugin_id, e.stage(), failed, &sanitize_log_message(&e.to_string()));
                Err(e)
            }
        }
    }

    async fn do_uninstall_work(&self, tenant_id: &str, plugin_id: &str) -> Result<(), InstallError> {
        // 插件可能在启用状态下直接卸载，先做与 disable 相同的注销
        if let Ok(namespace) = self.plugin_namespace(tenant_id, plugin_id).await {
            self.model_registry.unregister_namespace(&namespace);
            self.factory_registry.remove_factory(&namespace);
            self.options_registry.remove_provider(&namespace);
        }

        let plugin_dir = self.config.plugins_dir.join(plugin_id);
        if plugin_dir.exists() {
            tokio::fs::remove_dir_all(&plugin_dir)
                .await
                .map_err(|e| InstallError::Cleanup(format!("删除插件目录失败: {}", e)))?;
        }
        Ok(())
    }

    /// 更新某个模型的运行配置，发布 `config_updated` 事件
    ///
    /// 模型必须属于该插件 Provider 的命名空间，
    /// 否则配置事件会被归因到错误的插件。
    pub async fn update_model_config(
        &self,
        tenant_id: &str,
        plugin_id: &str,
        full_model_id: &str,
        config: ModelConfig,
    ) -> Result<(), InstallError> {
        let namespace = self.plugin_namespace(tenant_id, plugin_id).await?;
        let (model_namespace, _) = split_model_id(full_model_id)
            .map_err(|e| InstallError::Registration(e.to_string()))?;
        if model_namespace != namespace {
            return Err(InstallError::Registration(format!(
                "模型 {} 不属于插件 {} 的命名空间 {}",
                full_model_id, plugin_id, namespace
            )));
        }

        let status = self.status(tenant_id, plugin_id).await;
        if !self.model_registry.update_config(full_model_id, config) {
            return Err(InstallError::Registration(format!(
                "模型不存在: {}",
                full_model_id
            )));
        }
        self.publish(plugin_id, LifecycleEventKind::ConfigUpdated, status);
        Ok(())
    }

    /// 已安装插件的压缩包路径
    async fn installed_archive(
        &self,
        tenant_id: &str,
        plugin_id: &str,
    ) -> Result<PathBuf, InstallError> {
        let record = self
            .store
            .get(tenant_id, plugin_id)
            .await?
            .ok_or_else(|| InstallError::NotInstalled(plugin_id.to_string()))?;
        let dir = record
            .install_path
            .map(PathBuf::from)
            .unwrap_or_else(|| self.config.plugins_dir.join(plugin_id));
        find_archive(&dir).ok_or_else(|| InstallError::NotInstalled(plugin_id.to_string()))
    }

    /// 插件的 Provider 命名空间（从已安装压缩包解析）
    async fn plugin_namespace(
        &self,
        tenant_id: &str,
        plugin_id: &str,
    ) -> Result<String, InstallError> {
        let archive = self.installed_archive(tenant_id, plugin_id).await?;
        let provider = self.parser.parse_provider(&archive)?;
        Ok(provider.code)
    }

    fn parse_descriptors(
        &self,
        archive: &Path,
    ) -> Result<(PluginDescriptor, ProviderDescriptor, Vec<ModelDefinition>), InstallError> {
        let plugin = self.parser.parse_plugin(archive)?;
        let provider = self.parser.parse_provider(archive)?;
        let models = self.parser.parse_model_definitions(&provider, archive)?;
        Ok((plugin, provider, models))
    }

    /// 扫描插件目录，返回已落盘的插件描述符
    pub async fn scan(&self) -> Result<Vec<(PathBuf, PluginDescriptor)>, InstallError> {
        let mut found = Vec::new();
        if !self.config.plugins_dir.exists() {
            return Ok(found);
        }
        let mut entries = tokio::fs::read_dir(&self.config.plugins_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let Some(archive) = find_archive(&dir) else {
                continue;
            };
            match self.parser.parse_plugin(&archive) {
                Ok(descriptor) => found.push((dir, descriptor)),
                Err(e) => {
                    tracing::warn!("跳过无法解析的插件目录 {}: {}", dir.display(), e);
                }
            }
        }
        Ok(found)
    }
}

/// 在目录下定位插件压缩包
fn find_archive(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() && PackageFormat::from_extension(&path).is_some() {
            return Some(path);
        }
    }
    None
}

/// 解压压缩包到目标目录
///
/// 拒绝指向目录外的条目路径（zip-slip）。
fn extract_archive(
    parser: &DescriptorParser,
    archive_path: &Path,
    dest: &Path,
) -> Result<(), InstallError> {
    let format = parser.detect_format(archive_path)?;
    match format {
        PackageFormat::Zip => {
            let file = File::open(archive_path)?;
            let mut archive = zip::ZipArchive::new(file)
                .map_err(|e| InstallError::FileCopy(format!("无法读取 ZIP 文件: {}", e)))?;
            for i in 0..archive.len() {
                let mut entry = archive
                    .by_index(i)
                    .map_err(|e| InstallError::FileCopy(format!("ZIP 条目 {} 损坏: {}", i, e)))?;
                let Some(rel) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
                    return Err(InstallError::FileCopy(format!(
                        "ZIP 条目路径越界: {}",
                        entry.name()
                    )));
                };
                let out = dest.join(rel);
                if entry.is_dir() {
                    std::fs::create_dir_all(&out)?;
                } else {
                    if let Some(parent) = out.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    let mut out_file = File::create(&out)?;
                    std::io::copy(&mut entry, &mut out_file)?;
                }
            }
        }
        PackageFormat::TarGz => {
            let file = File::open(archive_path)?;
            let gz = flate2::read::GzDecoder::new(file);
            let mut archive = tar::Archive::new(gz);
            archive
                .unpack(dest)
                .map_err(|e| InstallError::FileCopy(format!("解压 tar.gz 失败: {}", e)))?;
        }
    }
    Ok(())
}
