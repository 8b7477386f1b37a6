//! # 生成会话数据模型
//!
//! 定义一次生成会话的状态机状态、推送给前端的视图快照以及渲染结果。

use serde::Serialize;

/// 会话状态
///
/// 合法的状态序列只有三种：
/// - `Idle → Generating → Completed → Idle`
/// - `Idle → Generating → Cancelled → Idle`
/// - `Idle → Generating → Errored → Idle`
///
/// `Completed` / `Cancelled` / `Errored` 是瞬时状态，会话在同一临界区内立刻回到 `Idle`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// 空闲：可以接受新的提交
    Idle,
    /// 生成中：正在消费推理服务的片段流
    Generating,
    /// 片段流正常结束
    Completed,
    /// 用户主动取消
    Cancelled,
    /// 传输或服务错误
    Errored,
}

impl SessionState {
    /// 是否允许从当前状态迁移到 `next`
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Generating)
                | (Generating, Completed)
                | (Generating, Cancelled)
                | (Generating, Errored)
                | (Completed, Idle)
                | (Cancelled, Idle)
                | (Errored, Idle)
        )
    }
}

/// 一次 `submit` 调用的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// 提交被忽略：会话不在 `Idle` 或输入为空
    Ignored,
    /// 生成正常完成
    Completed,
    /// 生成被取消
    Cancelled,
    /// 生成失败，附带错误描述
    Errored(String),
}

/// Markdown 渲染结果
///
/// 对应前端 TypeScript 接口：
/// ```typescript
/// interface RenderedOutput {
///   html: string;
///   rawMarkdown: string;
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedOutput {
    /// 经过清洗和语法高亮的 HTML
    pub html: String,
    /// 去除开头多余代码围栏后的原始 Markdown，供"复制"按钮原样复制
    pub raw_markdown: String,
}

/// 推送给前端的视图快照（`session-view` 事件载荷）
///
/// 前端每收到一次快照就更新 DOM，然后测量内容高度并请求调整窗口大小。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    /// 输入框是否可用（生成中禁用）
    pub input_enabled: bool,
    /// 是否显示加载指示器
    pub loader_visible: bool,
    /// 是否显示复制按钮
    pub copy_visible: bool,
    /// 输出区域是否隐藏（累计文本为空时隐藏）
    pub output_hidden: bool,
    /// 输出区域的 HTML 内容
    pub html: String,
    /// 前端是否应将焦点移回输入框
    pub focus_input: bool,
}

impl ViewState {
    /// 空闲且无输出时的初始视图
    pub fn idle() -> Self {
        Self {
            input_enabled: true,
            loader_visible: false,
            copy_visible: false,
            output_hidden: true,
            html: String::new(),
            focus_input: true,
        }
    }
}

/// Escape 键的处理结果
///
/// 前端根据结果决定是否清空输入框；`HideWindow` 时前端请求隐藏窗口。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscapeAction {
    /// 正在生成：已取消，不做其他处理
    Cancelled,
    /// 输入框有内容：已清空输出，前端清空输入并保持焦点
    Cleared,
    /// 输入框为空：请求隐藏窗口
    HideWindow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_lifecycle_transitions_are_allowed() {
        use SessionState::*;
        let all = [Idle, Generating, Completed, Cancelled, Errored];
        let allowed = [
            (Idle, Generating),
            (Generating, Completed),
            (Generating, Cancelled),
            (Generating, Errored),
            (Completed, Idle),
            (Cancelled, Idle),
            (Errored, Idle),
        ];
        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{:?} -> {:?}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_view_state_serializes_camel_case() {
        let value = serde_json::to_value(ViewState::idle()).unwrap();
        assert_eq!(value["inputEnabled"], true);
        assert_eq!(value["outputHidden"], true);
        assert_eq!(value["focusInput"], true);
    }
}
