//! # Smart Lookup - Tauri 应用核心初始化模块
//!
//! 本模块负责 Tauri 应用的完整初始化流程，包括：
//! - 注册 Tauri 官方插件（日志、对话框、Opener、全局快捷键）
//! - 加载用户设置并初始化应用全局状态（设置存储、生成会话控制器、前端桥接）
//! - 注册全局快捷键，失去焦点时隐藏浮窗
//! - 注册自定义 Tauri commands
//!
//! ## 模块结构
//! - `commands/` - Tauri command 处理函数（IPC 接口层）
//! - `models/` - 数据模型（对应前端 TypeScript 类型）
//! - `services/` - 核心业务逻辑（会话、推理、渲染、设置）
//! - `utils/` - 通用工具函数

mod commands;
mod models;
mod services;
mod utils;

use std::sync::{Arc, Mutex};

use tauri::{AppHandle, Manager, WindowEvent};
use tauri_plugin_global_shortcut::{GlobalShortcutExt, ShortcutState};

use services::bridge::{self, SharedBridge, TauriBridge};
use services::inference::{ClientConfig, OllamaClient};
use services::markdown::MarkdownRenderer;
use services::session::SessionController;
use services::settings_store::SettingsStore;
use services::settings_watcher::{self, SettingsWatcher};
use services::window;

/// 注册显示浮窗的全局快捷键
///
/// 快捷键字符串无效或已被其他程序占用时记录日志并弹出提示，应用继续运行。
fn register_shortcut(app: &AppHandle, shortcut: &str) {
    let result = app
        .global_shortcut()
        .on_shortcut(shortcut, |app, _shortcut, event| {
            if event.state == ShortcutState::Pressed {
                window::show_main(app);
            }
        });

    match result {
        Ok(()) => log::info!("已注册全局快捷键: {}", shortcut),
        Err(e) => {
            log::error!("注册全局快捷键失败 {}: {}", shortcut, e);
            bridge::show_notice(
                app,
                "快捷键不可用",
                &format!("无法注册快捷键 {}：{}", shortcut, e),
            );
        }
    }
}

/// 后台未处理的 panic：记录日志并弹出提示，不让进程静默退出
fn install_panic_hook(app: AppHandle) {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log::error!("后台发生未处理的错误: {}", info);
        bridge::show_notice(&app, "发生错误", &info.to_string());
        default_hook(info);
    }));
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
/// Tauri 应用启动函数
///
/// 构建并运行 Tauri 应用实例。该函数完成以下工作：
/// 1. 注册所需的 Tauri 插件
/// 2. 在 `setup` 钩子中加载设置（缺失时写入默认设置）并注册 managed state
/// 3. 注册全局快捷键和可选的设置文件监听
/// 4. 注册所有自定义 Tauri commands
/// 5. 生成应用上下文并启动主事件循环
///
/// # Panics
/// 如果 Tauri 应用启动失败（例如配置文件缺失或窗口创建失败），
/// 将通过 `.expect()` 触发 panic 并输出错误信息。
pub fn run() {
    tauri::Builder::default()
        // === 官方插件注册 ===
        // 日志插件：输出到 stdout 和应用日志目录
        .plugin(
            tauri_plugin_log::Builder::default()
                .level(if cfg!(debug_assertions) {
                    log::LevelFilter::Debug
                } else {
                    log::LevelFilter::Info
                })
                .build(),
        )
        // 对话框插件：生成失败和未处理错误的原生提示框
        .plugin(tauri_plugin_dialog::init())
        // Opener 插件：打开设置文件和输出中的外部链接
        .plugin(tauri_plugin_opener::init())
        // 全局快捷键插件：快捷键本身在 setup 中按设置注册
        .plugin(tauri_plugin_global_shortcut::Builder::new().build())
        .setup(|app| {
            let handle = app.handle().clone();
            install_panic_hook(handle.clone());

            // === 设置 ===
            let settings_path = utils::path::get_settings_path()?;
            let store = Arc::new(SettingsStore::new(settings_path));
            let settings = tauri::async_runtime::block_on(store.load());
            if settings.run_on_startup {
                log::warn!("runOnStartup 已开启，但当前版本不会注册开机自启动");
            }

            // === 应用全局状态 ===
            let bridge: SharedBridge = Arc::new(TauriBridge::new(handle.clone()));
            let client = OllamaClient::new(ClientConfig::from_env())?;
            let session = Arc::new(SessionController::new(
                Arc::new(client),
                MarkdownRenderer::default(),
                Arc::clone(&bridge),
            ));

            if settings_watcher::enabled_from_env() {
                match SettingsWatcher::start(Arc::clone(&store), Arc::clone(&bridge)) {
                    Ok(watcher) => {
                        app.manage(Mutex::new(watcher));
                    }
                    Err(e) => log::warn!("{}", e),
                }
            }

            app.manage(store);
            app.manage(bridge);
            app.manage(session);

            register_shortcut(&handle, &settings.keyboard_shortcut);
            Ok(())
        })
        // 浮窗失去焦点即隐藏；焦点被提示框夺走时保留浮窗
        .on_window_event(|window, event| {
            if let WindowEvent::Focused(false) = event {
                if bridge::notice_open() {
                    return;
                }
                if let Err(e) = window.hide() {
                    log::warn!("隐藏窗口失败: {}", e);
                }
            }
        })
        // === 自定义 Tauri Commands 注册 ===
        .invoke_handler(tauri::generate_handler![
            // 生成会话 commands
            commands::session::submit_prompt,
            commands::session::cancel_generation,
            commands::session::escape_pressed,
            commands::session::clear_output,
            commands::session::get_rendered_output,
            // 设置 commands
            commands::settings::get_settings,
            commands::settings::open_settings_file,
            // 窗口 commands
            commands::window::resize_window,
            commands::window::hide_window,
            // 应用级 commands
            commands::app::report_ui_error,
            commands::app::open_external_link,
        ])
        // `tauri::generate_context!()` 宏：在编译时读取 `tauri.conf.json` 配置文件，
        // 生成包含应用名称、窗口配置、安全策略等信息的上下文对象。
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
