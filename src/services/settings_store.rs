//! # 设置存储服务
//!
//! 负责用户设置文件（`~/.smart-lookup`）的加载、合并、自愈写回和内存持有。
//!
//! ## 加载规则
//! 1. 文件存在：解析为 JSON 对象，逐键覆盖在默认值之上；
//!    如果合并结果与磁盘内容不完全相同（缺少新字段等），将合并结果写回（自愈升级）
//! 2. 文件不存在：直接写入默认设置
//! 3. 读取或解析失败：记录日志，使用纯默认值，**不**写回，避免覆盖用户的手动编辑
//!
//! ## 线程安全
//! 当前设置保存在 `std::sync::RwLock` 中，只有本服务会修改它；
//! 前端每次拿到的都是一份独立的快照。

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde_json::{Map, Value};

use crate::models::settings::Settings;

/// 设置加载错误
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// 文件读写失败（含文件不存在）
    #[error("读取设置文件失败: {0}")]
    Io(#[from] std::io::Error),
    /// 内容不是合法 JSON，或字段类型不符
    #[error("解析设置文件失败: {0}")]
    Parse(#[from] serde_json::Error),
    /// 顶层是数组、字符串等非对象值
    #[error("设置文件顶层不是 JSON 对象")]
    NotAnObject,
}

/// 一次加载的结果类型（用于日志和测试）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// 文件内容已是完整设置，无需写回
    Loaded,
    /// 文件缺少字段，已将合并结果写回
    Upgraded,
    /// 文件不存在，已写入默认设置
    CreatedDefaults,
    /// 读取或解析失败，使用默认设置且未写回
    FellBack,
}

/// 将磁盘上的设置文档逐键合并到默认值之上
///
/// 磁盘上的值覆盖默认值；默认值中存在而文档中缺失的键保留默认值；
/// 文档中的未知键原样保留。该操作是幂等的：
/// `merge(d, merge(d, x)) == merge(d, x)`。
///
/// # 参数
/// - `defaults` - 内置默认设置
/// - `loaded` - 磁盘上读取到的 JSON 对象
pub fn merge(defaults: &Settings, loaded: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = defaults.to_object();
    for (key, value) in loaded {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// 解析设置文档文本为 JSON 对象
fn parse_document(content: &str) -> Result<Map<String, Value>, SettingsError> {
    match serde_json::from_str::<Value>(content)? {
        Value::Object(map) => Ok(map),
        _ => Err(SettingsError::NotAnObject),
    }
}

/// 读取设置文件并与默认值合并（不写回）
///
/// # 返回值
/// - `Ok(Some((settings, document, merged)))` - 文件存在且合并成功
/// - `Ok(None)` - 文件不存在
async fn read_merged(
    path: &Path,
) -> Result<Option<(Settings, Map<String, Value>, Map<String, Value>)>, SettingsError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let document = parse_document(&content)?;
    let merged = merge(&Settings::default(), &document);
    // 字段类型不符（如 "model": 5）同样视为解析失败
    let settings: Settings = serde_json::from_value(Value::Object(merged.clone()))?;
    Ok(Some((settings, document, merged)))
}

/// 以 2 空格缩进写入设置文档
async fn write_document(path: &Path, document: &Map<String, Value>) -> Result<(), SettingsError> {
    let content = serde_json::to_string_pretty(document)?;
    tokio::fs::write(path, content).await?;
    Ok(())
}

/// 按加载规则从指定路径加载设置
///
/// 本函数永不失败：任何错误都会记录日志并退回默认设置。
///
/// # 参数
/// - `path` - 设置文件路径
///
/// # 返回值
/// 生效的设置，以及这次加载属于哪种情况
pub async fn load_from(path: &Path) -> (Settings, LoadOutcome) {
    match read_merged(path).await {
        Ok(Some((settings, document, merged))) => {
            log::info!("已加载设置: {:?}", settings);
            if merged == document {
                return (settings, LoadOutcome::Loaded);
            }
            match write_document(path, &merged).await {
                Ok(()) => log::info!("已用新的默认值更新设置文件"),
                Err(e) => log::error!("写回设置文件失败: {}", e),
            }
            (settings, LoadOutcome::Upgraded)
        }
        Ok(None) => {
            log::warn!("未找到设置文件 {}，写入默认设置", path.display());
            let defaults = Settings::default();
            if let Err(e) = write_document(path, &defaults.to_object()).await {
                log::error!("写入默认设置失败: {}", e);
            }
            (defaults, LoadOutcome::CreatedDefaults)
        }
        Err(e) => {
            log::error!("加载设置失败: {}", e);
            (Settings::default(), LoadOutcome::FellBack)
        }
    }
}

/// 应用设置存储
///
/// 通过 Tauri 的 `manage()` 注册为应用状态，command 函数通过
/// `State<SettingsStore>` 访问。
pub struct SettingsStore {
    /// 设置文件路径
    path: PathBuf,
    /// 当前生效的设置
    current: RwLock<Settings>,
}

impl SettingsStore {
    /// 创建持有默认设置的存储（尚未读取磁盘）
    ///
    /// # 参数
    /// - `path` - 设置文件路径（通常是 `~/.smart-lookup`）
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            current: RwLock::new(Settings::default()),
        }
    }

    /// 设置文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 从磁盘加载设置并替换当前值
    ///
    /// 规则同 [`load_from`]：缺失时写入默认值，内容不完整时写回合并结果。
    pub async fn load(&self) -> Settings {
        let (settings, outcome) = load_from(&self.path).await;
        log::debug!("设置加载结果: {:?}", outcome);
        self.replace(settings.clone());
        settings
    }

    /// 设置文件变化后重新读取并合并（不写回）
    ///
    /// 文件被删除或内容损坏时保留当前设置并返回错误。
    pub async fn reload(&self) -> Result<Settings, SettingsError> {
        let settings = match read_merged(&self.path).await? {
            Some((settings, _, _)) => settings,
            None => {
                return Err(SettingsError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "设置文件已被删除",
                )));
            }
        };
        self.replace(settings.clone());
        Ok(settings)
    }

    /// 获取当前设置的快照
    pub fn current(&self) -> Settings {
        self.current
            .read()
            .map(|settings| settings.clone())
            .unwrap_or_default()
    }

    fn replace(&self, settings: Settings) {
        if let Ok(mut current) = self.current.write() {
            *current = settings;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    async fn read_disk(path: &Path) -> Value {
        let content = tokio::fs::read_to_string(path).await.unwrap();
        serde_json::from_str(&content).unwrap()
    }

    #[test]
    fn test_merge_is_idempotent() {
        let defaults = Settings::default();
        let samples = [
            json!({}),
            json!({"model": "x"}),
            json!({"model": "x", "runOnStartup": true, "custom": [1, 2]}),
            json!({"foregroundColor": null}),
        ];
        for sample in samples {
            let once = merge(&defaults, &object(sample));
            let twice = merge(&defaults, &once);
            assert_eq!(twice, once);
        }
    }

    #[test]
    fn test_merge_keeps_defaults_for_missing_keys() {
        let merged = merge(&Settings::default(), &object(json!({"model": "x"})));
        let mut expected = Settings::default();
        expected.model = "x".into();
        assert_eq!(merged, expected.to_object());
    }

    #[tokio::test]
    async fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".smart-lookup");

        let (settings, outcome) = load_from(&path).await;

        assert_eq!(outcome, LoadOutcome::CreatedDefaults);
        assert_eq!(settings, Settings::default());
        assert_eq!(
            read_disk(&path).await,
            serde_json::to_value(Settings::default()).unwrap()
        );
    }

    #[tokio::test]
    async fn test_partial_file_is_merged_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".smart-lookup");
        tokio::fs::write(&path, r#"{"model":"x"}"#).await.unwrap();

        let (settings, outcome) = load_from(&path).await;

        let mut expected = Settings::default();
        expected.model = "x".into();
        assert_eq!(outcome, LoadOutcome::Upgraded);
        assert_eq!(settings, expected);
        assert_eq!(read_disk(&path).await, serde_json::to_value(&expected).unwrap());
    }

    #[tokio::test]
    async fn test_complete_file_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".smart-lookup");
        // 紧凑格式：如果被写回，会变成带缩进的格式
        let compact = serde_json::to_string(&Settings::default()).unwrap();
        tokio::fs::write(&path, &compact).await.unwrap();

        let (_, outcome) = load_from(&path).await;

        assert_eq!(outcome, LoadOutcome::Loaded);
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), compact);
    }

    #[tokio::test]
    async fn test_malformed_file_falls_back_without_persisting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".smart-lookup");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let (settings, outcome) = load_from(&path).await;

        assert_eq!(outcome, LoadOutcome::FellBack);
        assert_eq!(settings, Settings::default());
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "{ not json");
    }

    #[tokio::test]
    async fn test_wrong_field_type_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".smart-lookup");
        tokio::fs::write(&path, r#"{"model": 5}"#).await.unwrap();

        let (settings, outcome) = load_from(&path).await;

        assert_eq!(outcome, LoadOutcome::FellBack);
        assert_eq!(settings, Settings::default());
    }

    #[tokio::test]
    async fn test_store_reload_picks_up_manual_edit() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join(".smart-lookup"));
        store.load().await;

        tokio::fs::write(store.path(), r##"{"backgroundColor":"#222"}"##)
            .await
            .unwrap();
        let reloaded = store.reload().await.unwrap();

        assert_eq!(reloaded.background_color, "#222");
        assert_eq!(reloaded.model, "llama3.1");
        assert_eq!(store.current(), reloaded);
    }

    #[tokio::test]
    async fn test_store_reload_keeps_current_on_bad_edit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".smart-lookup");
        tokio::fs::write(&path, r#"{"model":"x"}"#).await.unwrap();
        let store = SettingsStore::new(path.clone());
        store.load().await;

        tokio::fs::write(&path, "[]").await.unwrap();

        assert!(store.reload().await.is_err());
        assert_eq!(store.current().model, "x");
    }
}
