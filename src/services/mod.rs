//! # 业务逻辑服务模块
//!
//! 包含核心业务逻辑的实现，与 Tauri command 层解耦：
//! - `session` - 生成会话控制器（状态机、片段累计、取消）
//! - `inference` - Ollama 流式推理客户端
//! - `markdown` - 累计文本到清洗后 HTML 的渲染
//! - `highlight` - 代码块语法高亮后端
//! - `settings_store` - 设置文件的加载、合并与自愈写回
//! - `settings_watcher` - 可选的设置文件变化监听
//! - `bridge` - 后台向前端推送事件和提示框
//! - `window` - 浮窗显示、隐藏和尺寸调整

pub mod bridge;
pub mod highlight;
pub mod inference;
pub mod markdown;
pub mod session;
pub mod settings_store;
pub mod settings_watcher;
pub mod window;
