//! # 跨进程消息定义
//!
//! 后台进程与前端 webview 之间只通过异步消息通信。
//! 本模块把后台推送给前端的消息固定为有限的枚举，作为双方的接口契约。

use serde::Deserialize;

use crate::models::session::ViewState;
use crate::models::settings::Settings;

/// `update-settings` 事件名
pub const EVENT_UPDATE_SETTINGS: &str = "update-settings";

/// `session-view` 事件名
pub const EVENT_SESSION_VIEW: &str = "session-view";

/// 后台 → 前端的消息
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// 推送一份设置快照；前端应用颜色并记住模型名
    UpdateSettings(Settings),
    /// 推送一份会话视图快照
    SessionView(ViewState),
    /// 阻塞式提示（错误通知），由原生对话框展示
    Notice {
        /// 对话框标题
        title: String,
        /// 对话框正文
        message: String,
    },
}

/// `resize_window` 命令的载荷
///
/// 对应前端 TypeScript 接口：
/// ```typescript
/// interface ResizeRequest {
///   width?: number;
///   height: number;
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ResizeRequest {
    /// 目标宽度（逻辑像素），缺省表示保持当前宽度
    #[serde(default)]
    pub width: Option<f64>,
    /// 目标高度（逻辑像素）
    pub height: f64,
}
