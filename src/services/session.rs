//! # 生成会话控制器
//!
//! 管理一次生成的完整生命周期：
//! `Idle → Generating → {Completed, Cancelled, Errored} → Idle`。
//!
//! ## 职责
//! - 保证同一时间最多只有一个会话处于 `Generating`（由状态本身保证，不依赖额外的锁）
//! - 按到达顺序把片段追加到累计文本，每个片段都重新渲染并推送视图快照
//!   （前端收到快照后测量内容高度并请求调整窗口大小）
//! - 取消是协作式的：取消令牌只表达意图，消费循环在下一次等待片段时观察到它
//! - 取消从不提示用户；其他错误以阻塞式提示框展示
//!
//! ## 锁的使用
//! 内部状态保存在 `std::sync::Mutex` 中，临界区只做内存操作，从不跨越 `.await`。

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::models::bridge::UiEvent;
use crate::models::session::{
    EscapeAction, RenderedOutput, SessionOutcome, SessionState, ViewState,
};
use crate::services::bridge::UiBridge;
use crate::services::inference::{FragmentStream, InferenceClient, StreamEvent};
use crate::services::markdown::MarkdownRenderer;

/// 生成失败时附加在错误信息后的提示
pub const SERVICE_HINT: &str = "推理服务（Ollama）是否正在运行？";

/// 状态迁移广播的缓冲容量（一次会话最多产生 3 次迁移）
const TRANSITION_CHANNEL_CAPACITY: usize = 16;

/// 用固定模板包装用户输入，引导模型输出 Markdown
///
/// # 参数
/// - `input` - 用户输入的原始文本，原样嵌入模板
pub fn build_prompt(input: &str) -> String {
    format!(
        "<!-- Request -->\n\n{}\n\n<!-- Response in Markdown syntax -->\n\n",
        input
    )
}

/// 控制器内部状态
struct SessionInner {
    state: SessionState,
    accumulated: String,
    cancel: Option<CancellationToken>,
}

/// 会话控制器
///
/// 通过 Tauri 的 `manage()` 注册为应用状态（包装在 `Arc` 中，
/// 以便 `run` 在后台任务中运行）。
pub struct SessionController {
    client: Arc<dyn InferenceClient>,
    renderer: MarkdownRenderer,
    bridge: Arc<dyn UiBridge>,
    inner: Mutex<SessionInner>,
    transitions: broadcast::Sender<SessionState>,
}

impl SessionController {
    /// 创建空闲的会话控制器
    ///
    /// # 参数
    /// - `client` - 推理客户端
    /// - `renderer` - 每个片段后用于重新渲染累计文本
    /// - `bridge` - 视图快照和错误提示的推送通道
    pub fn new(
        client: Arc<dyn InferenceClient>,
        renderer: MarkdownRenderer,
        bridge: Arc<dyn UiBridge>,
    ) -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_CHANNEL_CAPACITY);
        Self {
            client,
            renderer,
            bridge,
            inner: Mutex::new(SessionInner {
                state: SessionState::Idle,
                accumulated: String::new(),
                cancel: None,
            }),
            transitions,
        }
    }

    /// 订阅状态迁移（只会收到订阅之后发生的迁移）
    ///
    /// 每次生成依次广播 `Generating`、终止状态、`Idle`。
    pub fn subscribe(&self) -> broadcast::Receiver<SessionState> {
        self.transitions.subscribe()
    }

    /// 当前状态
    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// 当前累计文本
    pub fn accumulated_text(&self) -> String {
        self.lock().accumulated.clone()
    }

    /// 当前渲染结果（供"复制"按钮使用）
    pub fn rendered_output(&self) -> RenderedOutput {
        let text = self.accumulated_text();
        self.renderer.render(&text)
    }

    /// 提交一次生成并消费到结束
    ///
    /// 等价于 [`SessionController::start`] 之后 [`SessionController::run`]。
    ///
    /// # 返回值
    /// 没有开始生成时返回 `SessionOutcome::Ignored`，否则返回生成的结束方式
    pub async fn submit(&self, prompt: &str, model: &str) -> SessionOutcome {
        match self.start(prompt, model) {
            Some(stream) => self.run(stream).await,
            None => SessionOutcome::Ignored,
        }
    }

    /// 开始一次生成（同步）
    ///
    /// 只有在 `Idle` 且输入去除空白后非空时才会开始，此时状态立即变为
    /// `Generating`，随后的 `cancel` / `escape` 都能观察到这次生成。
    /// 不满足条件时状态和累计文本都不变。
    ///
    /// # 参数
    /// - `prompt` - 用户输入的原始文本（尚未套用模板）
    /// - `model` - 模型名
    ///
    /// # 返回值
    /// 开始成功时返回待消费的片段流，需交给 [`SessionController::run`]
    pub fn start(&self, prompt: &str, model: &str) -> Option<FragmentStream> {
        if prompt.trim().is_empty() {
            return None;
        }

        let mut inner = self.lock();
        if inner.state != SessionState::Idle {
            log::debug!("生成进行中，忽略新的提交");
            return None;
        }
        let stream = self.client.generate(model, &build_prompt(prompt));
        inner.accumulated.clear();
        inner.cancel = Some(stream.cancel_handle());
        self.set_state(&mut inner, SessionState::Generating);
        log::info!("开始生成（模型: {}）", model);

        // 先清空上一次的输出，再等待第一个片段
        self.push_view(ViewState {
            input_enabled: false,
            loader_visible: true,
            copy_visible: false,
            output_hidden: true,
            html: String::new(),
            focus_input: false,
        });
        Some(stream)
    }

    /// 消费 [`SessionController::start`] 返回的片段流直到结束，然后回到 `Idle`
    ///
    /// # 返回值
    /// `Completed`、`Cancelled` 或 `Errored`
    pub async fn run(&self, mut stream: FragmentStream) -> SessionOutcome {
        let outcome = loop {
            match stream.next_event().await {
                StreamEvent::Fragment(fragment) => self.append(&fragment),
                StreamEvent::Done => break SessionOutcome::Completed,
                StreamEvent::Cancelled => break SessionOutcome::Cancelled,
                StreamEvent::Failed(e) => break SessionOutcome::Errored(e.to_string()),
            }
        };

        self.finish(&outcome);
        outcome
    }

    /// 取消正在进行的生成
    ///
    /// # 返回值
    /// 只有在 `Generating` 状态下才会触发取消并返回 `true`
    pub fn cancel(&self) -> bool {
        let inner = self.lock();
        if inner.state != SessionState::Generating {
            return false;
        }
        match &inner.cancel {
            Some(token) => {
                token.cancel();
                log::info!("已请求取消生成");
                true
            }
            None => false,
        }
    }

    /// 清空输出（仅在 `Idle` 时有效）
    ///
    /// 清空后推送初始视图 [`ViewState::idle`]。
    pub fn clear(&self) {
        {
            let mut inner = self.lock();
            if inner.state != SessionState::Idle {
                return;
            }
            inner.accumulated.clear();
        }
        self.push_view(ViewState::idle());
    }

    /// Escape 键处理
    ///
    /// 1. 正在生成：取消，到此为止
    /// 2. 输入框有内容：清空输出，由前端清空输入并保持焦点
    /// 3. 否则：请求隐藏窗口
    ///
    /// # 参数
    /// - `input_has_text` - 输入框当前是否有内容
    ///
    /// # 返回值
    /// 实际执行的动作；`HideWindow` 需要调用方隐藏窗口
    pub fn escape(&self, input_has_text: bool) -> EscapeAction {
        if self.cancel() {
            return EscapeAction::Cancelled;
        }
        if input_has_text {
            self.clear();
            return EscapeAction::Cleared;
        }
        EscapeAction::HideWindow
    }

    // ======== 生命周期内部步骤 ========

    fn append(&self, fragment: &str) {
        let text = {
            let mut inner = self.lock();
            if inner.state != SessionState::Generating {
                return;
            }
            inner.accumulated.push_str(fragment);
            inner.accumulated.clone()
        };

        let rendered = self.renderer.render(&text);
        self.push_view(ViewState {
            input_enabled: false,
            loader_visible: true,
            copy_visible: false,
            output_hidden: text.is_empty(),
            html: rendered.html,
            focus_input: false,
        });
    }

    fn finish(&self, outcome: &SessionOutcome) {
        let terminal = match outcome {
            SessionOutcome::Completed => SessionState::Completed,
            SessionOutcome::Cancelled => SessionState::Cancelled,
            SessionOutcome::Errored(_) => SessionState::Errored,
            SessionOutcome::Ignored => return,
        };

        let text = {
            let mut inner = self.lock();
            self.set_state(&mut inner, terminal);
            // 取消后丢弃已显示的部分结果
            if terminal == SessionState::Cancelled {
                inner.accumulated.clear();
            }
            inner.cancel = None;
            self.set_state(&mut inner, SessionState::Idle);
            inner.accumulated.clone()
        };

        match outcome {
            SessionOutcome::Completed => log::info!("生成完成（{} 字节）", text.len()),
            SessionOutcome::Cancelled => log::info!("生成已取消"),
            SessionOutcome::Errored(message) => log::error!("生成失败: {}", message),
            SessionOutcome::Ignored => {}
        }

        let rendered = self.renderer.render(&text);
        self.push_view(ViewState {
            input_enabled: true,
            loader_visible: false,
            copy_visible: !text.is_empty(),
            output_hidden: text.is_empty(),
            html: rendered.html,
            focus_input: true,
        });

        if let SessionOutcome::Errored(message) = outcome {
            self.bridge.send(UiEvent::Notice {
                title: "生成失败".to_string(),
                message: format!("{}\n\n{}", message, SERVICE_HINT),
            });
        }
    }

    fn set_state(&self, inner: &mut SessionInner, next: SessionState) {
        debug_assert!(
            inner.state.can_transition_to(next),
            "非法的会话状态迁移: {:?} -> {:?}",
            inner.state,
            next
        );
        inner.state = next;
        // 没有订阅者时发送失败，忽略即可
        let _ = self.transitions.send(next);
    }

    fn push_view(&self, view: ViewState) {
        self.bridge.send(UiEvent::SessionView(view));
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
