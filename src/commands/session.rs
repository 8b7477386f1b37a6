//! # 生成会话 Tauri Commands
//!
//! 前端只负责转发用户操作，所有状态都保存在后台的 [`SessionController`] 中。
//! 视图变化通过 `session-view` 事件推送回前端。
//!
//! 改变会话状态的 command 都是同步 command：Tauri 在主线程上按到达顺序执行它们，
//! 先发出的提交一定先于之后的 Escape 生效。

use std::sync::Arc;

use tauri::State;

use crate::models::session::{EscapeAction, RenderedOutput};
use crate::services::session::SessionController;
use crate::services::settings_store::SettingsStore;

/// 提交一次生成
///
/// 生成在 command 返回前就已进入 `Generating`，之后到达的 Escape 一定会取消它；
/// 只有片段流的消费放在后台任务中。空输入或已有生成进行中时提交被忽略。
///
/// # 参数
/// - `prompt` - 用户输入的原始文本
/// - `model` - 前端当前持有的模型名（来自最近一次 `update-settings`），
///   为空时使用当前设置中的模型
///
/// # 返回值
/// 是否开始了新的生成
#[tauri::command]
pub fn submit_prompt(
    prompt: String,
    model: String,
    session: State<'_, Arc<SessionController>>,
    store: State<'_, Arc<SettingsStore>>,
) -> Result<bool, String> {
    let model = if model.trim().is_empty() {
        store.current().model
    } else {
        model
    };

    let Some(stream) = session.start(&prompt, &model) else {
        return Ok(false);
    };
    let session = Arc::clone(session.inner());
    tauri::async_runtime::spawn(async move {
        let outcome = session.run(stream).await;
        log::debug!("生成结束: {:?}", outcome);
    });
    Ok(true)
}

/// 取消正在进行的生成
///
/// # 返回值
/// 确实有生成被取消时返回 `true`
#[tauri::command]
pub fn cancel_generation(session: State<'_, Arc<SessionController>>) -> Result<bool, String> {
    Ok(session.cancel())
}

/// Escape 键
///
/// # 参数
/// - `input_text` - 输入框当前内容
///
/// # 返回值
/// 实际执行的动作；`hide_window` 由前端接着调用 `hide_window` command
#[tauri::command]
pub fn escape_pressed(
    input_text: String,
    session: State<'_, Arc<SessionController>>,
) -> Result<EscapeAction, String> {
    Ok(session.escape(!input_text.is_empty()))
}

/// 清空输出区域（生成进行中时无效）
#[tauri::command]
pub fn clear_output(session: State<'_, Arc<SessionController>>) -> Result<(), String> {
    session.clear();
    Ok(())
}

/// 获取当前渲染结果，供"复制"按钮写入剪贴板
#[tauri::command]
pub async fn get_rendered_output(
    session: State<'_, Arc<SessionController>>,
) -> Result<RenderedOutput, String> {
    Ok(session.rendered_output())
}
