//! # 跨进程桥接服务
//!
//! 后台向前端推送消息的唯一出口。业务代码只依赖 [`UiBridge`] trait，
//! 运行时由 [`TauriBridge`] 通过 Tauri 事件和原生对话框实现，测试中可替换为内存记录。

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tauri::{AppHandle, Emitter, Runtime};
use tauri_plugin_dialog::{DialogExt, MessageDialogKind};

use crate::models::bridge::{EVENT_SESSION_VIEW, EVENT_UPDATE_SETTINGS, UiEvent};
use crate::services::window::MAIN_WINDOW;

/// 后台 → 前端的消息通道
pub trait UiBridge: Send + Sync {
    /// 发送一条消息（即发即忘，发送失败只记录日志）
    fn send(&self, event: UiEvent);
}

/// 注册为 Tauri managed state 的共享桥接
pub type SharedBridge = Arc<dyn UiBridge>;

/// 基于 Tauri 事件的桥接实现
pub struct TauriBridge<R: Runtime> {
    app: AppHandle<R>,
}

impl<R: Runtime> TauriBridge<R> {
    /// 创建向主窗口推送事件的桥接
    ///
    /// # 参数
    /// - `app` - 应用句柄，用于 `emit_to` 和弹出对话框
    pub fn new(app: AppHandle<R>) -> Self {
        Self { app }
    }
}

impl<R: Runtime> UiBridge for TauriBridge<R> {
    fn send(&self, event: UiEvent) {
        let result = match event {
            UiEvent::UpdateSettings(settings) => {
                self.app.emit_to(MAIN_WINDOW, EVENT_UPDATE_SETTINGS, settings)
            }
            UiEvent::SessionView(view) => self.app.emit_to(MAIN_WINDOW, EVENT_SESSION_VIEW, view),
            UiEvent::Notice { title, message } => {
                show_notice(&self.app, &title, &message);
                Ok(())
            }
        };

        if let Err(e) = result {
            log::error!("向前端推送消息失败: {}", e);
        }
    }
}

/// 当前打开的提示框计数
///
/// 提示框会夺走浮窗焦点；计数不为零时失去焦点不应隐藏浮窗。
#[derive(Debug, Default)]
pub struct NoticeTracker {
    open: AtomicUsize,
}

impl NoticeTracker {
    /// 是否有提示框处于打开状态
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) > 0
    }

    /// 记录一个提示框打开，返回的守卫被丢弃时记录关闭
    pub fn open(&self) -> NoticeGuard<'_> {
        self.open.fetch_add(1, Ordering::SeqCst);
        NoticeGuard { tracker: self }
    }
}

/// 提示框打开期间持有的守卫
pub struct NoticeGuard<'a> {
    tracker: &'a NoticeTracker,
}

impl Drop for NoticeGuard<'_> {
    fn drop(&mut self) {
        self.tracker.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 全应用共用的提示框计数
static NOTICES: NoticeTracker = NoticeTracker {
    open: AtomicUsize::new(0),
};

/// 是否有提示框处于打开状态（窗口失焦处理使用）
pub fn notice_open() -> bool {
    NOTICES.is_open()
}

/// 弹出阻塞式错误提示框
///
/// 对话框本身是模态的，但调用不会阻塞当前线程。
/// 对话框关闭前 [`notice_open`] 返回 `true`。
///
/// # 参数
/// - `app` - 应用句柄
/// - `title` - 对话框标题
/// - `message` - 对话框正文
pub fn show_notice<R: Runtime>(app: &AppHandle<R>, title: &str, message: &str) {
    let guard = NOTICES.open();
    app.dialog()
        .message(message)
        .title(title)
        .kind(MessageDialogKind::Error)
        .show(move |_| drop(guard));
}
