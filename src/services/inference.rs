//! # 推理服务客户端
//!
//! 将一次对本地推理服务（Ollama 兼容 API）的流式请求包装为可取消、惰性消费的片段流。
//!
//! ## 契约
//! - 每次 `generate` 最多发起一次网络请求，且只在首次拉取时发起；不做任何重试
//! - 片段按服务端发送顺序逐个交付，空片段被丢弃
//! - 流结束后继续拉取只会得到 `StreamEvent::Done`
//! - 取消后不再交付任何片段，消费方得到 `StreamEvent::Cancelled`，
//!   它与正常结束、传输错误都可区分
//!
//! ## 线路格式
//! 响应体为换行分隔的 JSON（NDJSON）。每行携带一段增量文本：
//! `generate` 模式在 `response` 字段，`chat` 模式在 `message.content` 字段；
//! `done: true` 为结束标记，`{"error": "..."}` 为服务端错误。

use std::time::Duration;

use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// 推理服务默认地址（Ollama 默认监听端口）
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";

/// 覆盖服务地址的环境变量，与 Ollama 自身使用的变量一致
pub const HOST_ENV_VAR: &str = "OLLAMA_HOST";

/// 推理服务错误
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    /// 连接失败或读取响应体时出错
    #[error("请求推理服务失败: {0}")]
    Transport(#[from] reqwest::Error),
    /// 服务返回非 2xx 状态码，附带响应正文
    #[error("推理服务返回状态码 {status}: {body}")]
    Status { status: u16, body: String },
    /// 某一行不是合法的 JSON
    #[error("无法解析推理服务响应: {0}")]
    Decode(#[from] serde_json::Error),
    /// 服务在流中返回 `{"error": "..."}`
    #[error("推理服务报告错误: {0}")]
    Service(String),
}

/// 消费片段流时得到的事件
#[derive(Debug)]
pub enum StreamEvent {
    /// 一段非空增量文本
    Fragment(String),
    /// 流正常结束
    Done,
    /// 流已被取消
    Cancelled,
    /// 传输或服务错误，流随之结束
    Failed(InferenceError),
}

/// 流的终止方式，决定结束后继续拉取时返回什么
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminal {
    Done,
    Cancelled,
}

/// 可取消的片段流
///
/// 消费方循环调用 [`FragmentStream::next_event`]，每次等待"下一个片段或取消"。
/// 取消令牌可以通过 [`FragmentStream::cancel_handle`] 交给其他任务。
pub struct FragmentStream {
    inner: BoxStream<'static, Result<String, InferenceError>>,
    cancel: CancellationToken,
    terminal: Option<Terminal>,
}

impl FragmentStream {
    /// 用任意文本结果流构造片段流
    ///
    /// # 参数
    /// - `inner` - 按顺序产出增量文本的流；产出 `Err` 后片段流随之结束
    pub fn new<S>(inner: S) -> Self
    where
        S: Stream<Item = Result<String, InferenceError>> + Send + 'static,
    {
        Self {
            inner: inner.boxed(),
            cancel: CancellationToken::new(),
            terminal: None,
        }
    }

    /// 获取取消令牌的克隆
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 请求取消（协作式：在下一次 `next_event` 时生效）
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// 等待下一个事件
    ///
    /// 取消信号优先于已就绪的片段，保证取消后不再追加任何文本。
    ///
    /// # 返回值
    /// 非空片段，或 `Done` / `Cancelled` / `Failed` 之一；
    /// `Done` 和 `Cancelled` 之后再次调用会重复返回同一终止事件
    pub async fn next_event(&mut self) -> StreamEvent {
        loop {
            match self.terminal {
                Some(Terminal::Done) => return StreamEvent::Done,
                Some(Terminal::Cancelled) => return StreamEvent::Cancelled,
                None => {}
            }

            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                next = self.inner.next() => Some(next),
            };

            match next {
                None => {
                    // 丢弃底层流，立即释放 HTTP 连接
                    self.inner = futures_util::stream::empty().boxed();
                    self.terminal = Some(Terminal::Cancelled);
                }
                Some(Some(Ok(text))) if text.is_empty() => continue,
                Some(Some(Ok(text))) => return StreamEvent::Fragment(text),
                Some(Some(Err(e))) => {
                    self.terminal = Some(Terminal::Done);
                    return StreamEvent::Failed(e);
                }
                Some(None) => self.terminal = Some(Terminal::Done),
            }
        }
    }
}

/// 推理客户端抽象
///
/// 会话控制器只依赖此 trait，测试中可替换为内存实现。
pub trait InferenceClient: Send + Sync {
    /// 为给定模型和提示词创建片段流（惰性：此时不发起网络请求）
    fn generate(&self, model: &str, prompt: &str) -> FragmentStream;
}

/// 调用方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvocationMode {
    /// `POST /api/generate`，增量文本在 `response` 字段
    #[default]
    Generate,
    /// `POST /api/chat`，增量文本在 `message.content` 字段
    Chat,
}

impl InvocationMode {
    fn path(self) -> &'static str {
        match self {
            InvocationMode::Generate => "/api/generate",
            InvocationMode::Chat => "/api/chat",
        }
    }

    fn request_body(self, model: &str, prompt: &str) -> Value {
        match self {
            InvocationMode::Generate => json!({
                "model": model,
                "prompt": prompt,
                "stream": true,
            }),
            InvocationMode::Chat => json!({
                "model": model,
                "messages": [{ "role": "user", "content": prompt }],
                "stream": true,
            }),
        }
    }
}

/// 客户端配置
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// 服务根地址（不含结尾斜杠）
    pub base_url: String,
    /// 调用方式
    pub mode: InvocationMode,
    /// 建立连接的超时时间；生成本身不设超时
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            mode: InvocationMode::Generate,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// 读取 `OLLAMA_HOST` 覆盖默认地址
    ///
    /// 只有 `host:port` 时补全 `http://`；变量缺失或为空时使用默认地址。
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(url) = std::env::var(HOST_ENV_VAR)
            .ok()
            .and_then(|host| normalize_base_url(&host))
        {
            config.base_url = url;
        }
        config
    }
}

/// 规范化服务地址：补全协议头、去掉结尾斜杠
fn normalize_base_url(host: &str) -> Option<String> {
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() {
        return None;
    }
    if host.starts_with("http://") || host.starts_with("https://") {
        Some(host.to_string())
    } else {
        Some(format!("http://{}", host))
    }
}

/// Ollama HTTP 客户端
pub struct OllamaClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl OllamaClient {
    /// 按配置创建客户端
    ///
    /// # 参数
    /// - `config` - 服务地址、调用方式和连接超时
    ///
    /// # 错误
    /// 底层 HTTP 客户端初始化失败（如 TLS 后端不可用）时返回错误
    pub fn new(config: ClientConfig) -> Result<Self, InferenceError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self { http, config })
    }
}

impl InferenceClient for OllamaClient {
    fn generate(&self, model: &str, prompt: &str) -> FragmentStream {
        let http = self.http.clone();
        let mode = self.config.mode;
        let url = format!("{}{}", self.config.base_url, mode.path());
        let body = mode.request_body(model, prompt);

        FragmentStream::new(async_stream::stream! {
            let response = match send_request(&http, &url, &body).await {
                Ok(response) => response,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let mut lines = LineBuffer::default();
            let mut bytes = response.bytes_stream();
            loop {
                let (batch, finished) = match bytes.next().await {
                    Some(Ok(chunk)) => (lines.push(&chunk), false),
                    Some(Err(e)) => {
                        yield Err(InferenceError::Transport(e));
                        return;
                    }
                    None => (lines.finish().into_iter().collect::<Vec<_>>(), true),
                };

                for line in batch {
                    match decode_line(&line) {
                        Ok(delta) => {
                            yield Ok(delta.text);
                            if delta.done {
                                return;
                            }
                        }
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }

                if finished {
                    return;
                }
            }
        })
    }
}

/// 发送请求并检查状态码
async fn send_request(
    http: &reqwest::Client,
    url: &str,
    body: &Value,
) -> Result<reqwest::Response, InferenceError> {
    log::debug!("请求推理服务: {}", url);
    let response = http.post(url).json(body).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(InferenceError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// NDJSON 行缓冲
///
/// 按字节缓冲并在 `\n` 处切分，不会把一个 UTF-8 字符拆到两行里。
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// 追加一个数据块，返回其中所有完整的非空行
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line).trim().to_string();
            if !text.is_empty() {
                lines.push(text);
            }
        }
        lines
    }

    /// 输入结束：返回末尾没有换行符的最后一行
    fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

/// 单行 NDJSON 的结构（两种调用方式共用）
#[derive(Debug, Default, Deserialize)]
struct StreamLine {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

/// 解码后的增量
#[derive(Debug, PartialEq, Eq)]
struct Delta {
    text: String,
    done: bool,
}

fn decode_line(line: &str) -> Result<Delta, InferenceError> {
    let parsed: StreamLine = serde_json::from_str(line)?;
    if let Some(error) = parsed.error {
        return Err(InferenceError::Service(error));
    }
    let text = parsed
        .response
        .or_else(|| parsed.message.map(|message| message.content))
        .unwrap_or_default();
    Ok(Delta {
        text,
        done: parsed.done,
    })
}
