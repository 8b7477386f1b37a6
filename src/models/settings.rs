//! # 用户设置数据模型
//!
//! 定义 Smart Lookup 的用户设置（`Settings`）及其内置默认值。
//! 设置文件位于 `~/.smart-lookup`，格式为带 2 空格缩进的 JSON 对象。
//!
//! 对应前端接收到的 `update-settings` 事件载荷。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 用户设置数据结构
///
/// 每个字段都有内置默认值（见 [`Settings::default`]），磁盘上的设置文件
/// 按键覆盖在默认值之上。
///
/// 设计决策：
/// - 使用 `#[serde(flatten)] extra` 保存未知字段，用户手动添加的键或新版本
///   写入的键在读取后再次保存时不会被丢弃。
///
/// 对应前端 TypeScript 接口：
/// ```typescript
/// interface Settings {
///   model: string;
///   foregroundColor: string;
///   backgroundColor: string;
///   runOnStartup: boolean;
///   keyboardShortcut: string;
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// 推理服务使用的模型名称（如 "llama3.1"）
    pub model: String,

    /// 浮窗前景色（CSS 颜色值）
    pub foreground_color: String,

    /// 浮窗背景色（CSS 颜色值）
    pub background_color: String,

    /// 是否开机自启动
    pub run_on_startup: bool,

    /// 唤出浮窗的全局快捷键（如 "Alt+Space"）
    pub keyboard_shortcut: String,

    /// 设置文件中不属于上述字段的其他键，原样保留
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: "llama3.1".to_string(),
            foreground_color: "black".to_string(),
            background_color: "whitesmoke".to_string(),
            run_on_startup: false,
            keyboard_shortcut: "Alt+Space".to_string(),
            extra: Map::new(),
        }
    }
}

impl Settings {
    /// 将设置转换为 JSON 对象（字段名为 camelCase）
    ///
    /// 用于与磁盘上的原始文档逐键合并和比较。
    pub fn to_object(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_settings_serialize_camel_case() {
        let value = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "llama3.1",
                "foregroundColor": "black",
                "backgroundColor": "whitesmoke",
                "runOnStartup": false,
                "keyboardShortcut": "Alt+Space",
            })
        );
    }

    #[test]
    fn test_unknown_keys_survive_round_trip() {
        let mut object = Settings::default().to_object();
        object.insert("fontSize".into(), json!(14));

        let settings: Settings = serde_json::from_value(Value::Object(object)).unwrap();
        assert_eq!(settings.extra.get("fontSize"), Some(&json!(14)));
        assert_eq!(settings.to_object().get("fontSize"), Some(&json!(14)));
    }
}
