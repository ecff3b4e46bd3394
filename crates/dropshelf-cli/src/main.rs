//! Dropshelf CLI
//!
//! dropit 兼容文件分享服务的命令行客户端

mod prompt;
mod view;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use dropshelf_core::format::{ExpirationFormat, SizeFormat};
use dropshelf_core::{
    AliasKind, AlwaysConfirm, AppSettings, Backend, ClientError, Confirm, EntryId, ExtendTarget,
    FileCache, FileEntry, HttpBackend, LogLevel, Session, UploadProgress, extension_choices,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;
use view::ViewOptions;

#[derive(Parser)]
#[command(name = "dropshelf", version, about = "dropit 文件分享命令行客户端")]
struct Cli {
    /// 服务器地址（覆盖配置文件）
    #[arg(long, global = true, env = "DROPSHELF_SERVER")]
    server: Option<String>,
    /// 配置文件路径
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// 跳过所有确认
    #[arg(short, long, global = true)]
    yes: bool,
    /// 日志级别 (error/warn/info/debug/trace)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 上传文件
    Upload {
        /// 要上传的文件
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// 列出文件
    List {
        /// 以字节显示大小
        #[arg(long)]
        bytes: bool,
        /// 显示过期日期而不是剩余时长
        #[arg(long)]
        date: bool,
        /// 为每个可用文件显示短链接二维码
        #[arg(long)]
        qr: bool,
    },
    /// 持续扫描过期文件，直到 Ctrl+C
    Watch,
    /// 立即扫描一次过期文件
    Check,
    /// 重新生成别名
    Alias {
        /// 序号（从 1 开始）或别名
        entry: String,
        /// short / long / both
        #[arg(default_value = "both")]
        kind: AliasKind,
    },
    /// 延长过期时间
    Extend {
        /// 序号（从 1 开始）或别名
        entry: String,
        /// initial / max / 秒数
        target: ExtendTarget,
    },
    /// 设置最大下载次数（0 = 不限）
    Downloads {
        /// 序号（从 1 开始）或别名
        entry: String,
        count: u16,
    },
    /// 从本地列表移除（服务端文件保留）
    Forget {
        /// 序号（从 1 开始）或别名
        entry: String,
    },
    /// 移除出错或已过期的条目
    Dismiss {
        /// 序号（从 1 开始）或别名
        entry: String,
    },
    /// 删除服务端文件
    Revoke {
        /// 序号（从 1 开始）或别名
        entry: String,
    },
    /// 清空列表
    Clear {
        /// 只移除已过期的条目
        #[arg(long)]
        expired: bool,
    },
    /// 显示短链接二维码
    Qr {
        /// 序号（从 1 开始）或别名
        entry: String,
    },
    /// 下载文件到本地目录
    Download {
        /// 序号（从 1 开始）或别名
        entry: String,
        /// 保存目录
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// 登录服务器并保存会话令牌
    Login {
        #[arg(short, long, env = "DROPSHELF_USERNAME")]
        username: Option<String>,
        /// 省略时从终端读取（不回显）
        #[arg(short, long, env = "DROPSHELF_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// 退出登录
    Logout,
    /// 打印打包下载所有可用文件的链接
    Archive,
    /// 查看可选的延长时长与下载次数
    Choices {
        /// 序号（从 1 开始）或别名
        entry: String,
    },
}

fn init_logging(level: Option<LogLevel>) {
    // 桥接 log crate（dropshelf-core 使用）到 tracing
    let _ = tracing_log::LogTracer::init();

    let filter = match level {
        Some(level) => {
            if level >= LogLevel::Debug {
                eprintln!("{}", level_banner(level));
            }
            EnvFilter::new(level.directive())
        }
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(LogLevel::Info.directive())),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn level_banner(level: LogLevel) -> String {
    format!("{} 日志级别: {}", level.icon(), level)
}

/// 启动时的登录检查结果
#[derive(Debug, PartialEq, Eq)]
enum AuthCheck {
    Ready,
    LoginRequired,
    /// 服务端不再认可已保存的令牌
    TokenExpired,
}

fn classify_auth(required: bool, has_token: bool) -> AuthCheck {
    match (required, has_token) {
        (false, _) => AuthCheck::Ready,
        (true, false) => AuthCheck::LoginRequired,
        (true, true) => AuthCheck::TokenExpired,
    }
}

struct App {
    settings: AppSettings,
    config_path: PathBuf,
    session: Session,
}

fn build(cli: &Cli) -> Result<App> {
    let config_path = cli.config.clone().unwrap_or_else(AppSettings::config_path);
    let mut settings = AppSettings::load_from(&config_path);
    if let Some(server) = &cli.server {
        settings.server.clone_from(server);
    }
    if cli.yes {
        settings.assume_yes = true;
    }

    let backend = HttpBackend::new(&settings.server)
        .with_context(|| format!("无法创建 HTTP 客户端: {}", settings.server))?
        .with_session_token(settings.session_token.clone())
        .with_timeout(settings.request_timeout());
    let confirm: Arc<dyn Confirm> = if settings.assume_yes {
        Arc::new(AlwaysConfirm)
    } else {
        Arc::new(prompt::StdinConfirm)
    };
    let session = Session::new(
        Arc::new(backend),
        Arc::new(FileCache::new(settings.cache_path.clone())),
        confirm,
    )
    .with_progress_delay(settings.progress_delay());

    Ok(App {
        settings,
        config_path,
        session,
    })
}

/// 按序号（从 1 开始）或别名查找条目
fn select(session: &Session, selector: &str) -> Result<FileEntry> {
    if let Ok(index) = selector.parse::<usize>() {
        let entries = session.entries();
        return index
            .checked_sub(1)
            .and_then(|i| entries.get(i).cloned())
            .with_context(|| format!("没有第 {index} 个文件（共 {} 个）", entries.len()));
    }
    session
        .find_by_alias(selector)
        .with_context(|| format!("找不到别名为 {selector} 的文件"))
}

/// 用户取消不算失败
fn cancelled(result: dropshelf_core::Result<()>) -> Result<()> {
    match result {
        Err(ClientError::Cancelled) => {
            println!("↩️  已取消");
            Ok(())
        }
        other => Ok(other?),
    }
}

fn print_entry(session: &Session, id: EntryId) {
    let entries = session.entries();
    if let Some(index) = entries.iter().position(|e| e.id() == id) {
        println!("{}", view::render_entry(index, &entries[index], ViewOptions::default()));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let App {
        mut settings,
        config_path,
        session,
    } = build(&cli)?;

    match &cli.command {
        Commands::Login { username, password } => {
            return login(
                &session,
                &mut settings,
                &config_path,
                username.clone(),
                password.clone(),
            )
            .await;
        }
        Commands::Logout => {
            settings.session_token = None;
            settings.save_to(&config_path)?;
            println!("👋 已退出登录");
            return Ok(());
        }
        _ => {}
    }

    // 已保存的令牌也可能过期，每次都向服务端确认
    match session.auth_required().await {
        Ok(required) => match classify_auth(required, settings.session_token.is_some()) {
            AuthCheck::Ready => {}
            AuthCheck::LoginRequired => {
                bail!("{} 需要登录，请先运行 'dropshelf login'", settings.server)
            }
            AuthCheck::TokenExpired => {
                settings.session_token = None;
                settings.save_to(&config_path)?;
                bail!(
                    "🔒 {} 的会话已失效，请重新运行 'dropshelf login'",
                    settings.server
                );
            }
        },
        Err(e) => tracing::warn!("An error occurred while checking for session token: {}", e),
    }

    let report = session.load().await?;
    tracing::debug!(
        "Loaded {} entries, {} expired, {} drained",
        session.entries().len(),
        report.expired.len(),
        report.drained.len()
    );

    match cli.command {
        Commands::Upload { files } => {
            let ids = session.enqueue(files).await?;
            if ids.is_empty() {
                bail!("没有可上传的常规文件");
            }
            println!("📤 上传 {} 个文件到 {}", ids.len(), settings.server);
            let results = session
                .upload_pending(|id| {
                    session.entry(id).map(|entry| {
                        Arc::new(prompt::ProgressPrinter::new(entry.name()))
                            as Arc<dyn UploadProgress>
                    })
                })
                .await;
            for (id, result) in results {
                if let Err(e) = result {
                    tracing::warn!("Entry {} could not be updated: {}", id, e);
                }
                print_entry(&session, id);
            }
        }
        Commands::List { bytes, date, qr } => {
            let mut options = ViewOptions::default();
            if bytes {
                options.size = SizeFormat::Bytes;
            }
            if date {
                options.expiration = ExpirationFormat::Date;
            }
            let entries = session.entries();
            if qr {
                view::print_entries_with_qr(&entries, options);
            } else {
                view::print_entries(&entries, options);
            }
            view::print_affordances(&session.affordances(), &settings.server);
        }
        Commands::Watch => {
            println!("👀 监视中 (每 {}s 扫描一次，Ctrl+C 退出)", settings.sweep_interval_secs);
            view::print_entries(&session.entries(), ViewOptions::default());
            watch(&session, &settings).await;
        }
        Commands::Check => {
            let report = session.sweep().await?;
            println!(
                "🔍 扫描完成: {} 个已过期, {} 个已失效{}",
                report.expired.len(),
                report.drained.len(),
                if report.checked_remote { "" } else { "（未查询服务端）" }
            );
            view::print_entries(&session.entries(), ViewOptions::default());
        }
        Commands::Alias { entry, kind } => {
            let entry = select(&session, &entry)?;
            cancelled(session.regenerate_alias(entry.id(), kind).await)?;
            print_entry(&session, entry.id());
        }
        Commands::Extend { entry, target } => {
            let entry = select(&session, &entry)?;
            let label = match target {
                ExtendTarget::Seconds(seconds) => entry.record().and_then(|record| {
                    extension_choices(record.expiration.allowed.seconds)
                        .into_iter()
                        .find(|choice| choice.seconds == seconds)
                        .map(|choice| choice.label)
                }),
                _ => None,
            };
            cancelled(session.extend(entry.id(), target, label).await)?;
            print_entry(&session, entry.id());
        }
        Commands::Downloads { entry, count } => {
            let entry = select(&session, &entry)?;
            session.set_downloads(entry.id(), count).await?;
            println!(
                "⬇️  {} 的下载次数限制: {}",
                entry.name(),
                dropshelf_core::download_limit_label(count)
            );
        }
        Commands::Forget { entry } => {
            let entry = select(&session, &entry)?;
            match session.forget(entry.id()) {
                Ok(_) => println!("🗑️  已从列表移除 {}", entry.name()),
                Err(e) => cancelled(Err(e))?,
            }
        }
        Commands::Dismiss { entry } => {
            let entry = select(&session, &entry)?;
            if entry.is_available() {
                bail!("{} 仍然可用，请使用 forget 或 revoke", entry.name());
            }
            session.dismiss(entry.id())?;
            println!("🗑️  已移除 {}", entry.name());
        }
        Commands::Revoke { entry } => {
            let entry = select(&session, &entry)?;
            match session.revoke(entry.id()).await {
                Ok(()) => println!("🔥 已删除 {}", entry.name()),
                Err(e) => cancelled(Err(e))?,
            }
        }
        Commands::Clear { expired } => {
            if expired {
                let removed = session.clear_expired()?;
                println!("🧹 移除了 {removed} 个已过期的文件");
            } else {
                match session.clear() {
                    Ok(()) => println!("🧹 列表已清空"),
                    Err(e) => cancelled(Err(e))?,
                }
            }
        }
        Commands::Archive => {
            let affordances = session.affordances();
            if affordances.has_availables {
                println!("{}", affordances.archive_link(&settings.server));
            } else {
                bail!("至少需要两个可用文件才能打包下载");
            }
        }
        Commands::Choices { entry } => {
            let entry = select(&session, &entry)?;
            view::print_choices(&entry);
        }
        Commands::Qr { entry } => {
            let entry = select(&session, &entry)?;
            let record = entry.available_record()?;
            println!("{}", record.link.short);
            println!("{}", view::render_qr(&record.link.short)?);
        }
        Commands::Download { entry, output } => {
            let entry = select(&session, &entry)?;
            let progress: Arc<dyn UploadProgress> =
                Arc::new(prompt::ProgressPrinter::new(entry.name()));
            let path = session.download(entry.id(), &output, Some(progress)).await?;
            println!("📥 已保存到 {}", path.display());
        }
        Commands::Login { .. } | Commands::Logout => {}
    }

    Ok(())
}

async fn watch(session: &Session, settings: &AppSettings) {
    let mut events = session.subscribe();
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let sweeper = session.run_sweeper(settings.sweep_interval(), shutdown);
    tokio::pin!(sweeper);

    loop {
        tokio::select! {
            () = &mut sweeper => break,
            event = events.recv() => match event {
                Ok(event) => view::print_event(session, &event, ViewOptions::default()),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Skipped {} store events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    println!("👋 停止监视");
}

async fn login(
    session: &Session,
    settings: &mut AppSettings,
    config_path: &Path,
    username: Option<String>,
    password: Option<String>,
) -> Result<()> {
    if !session.auth_required().await? {
        println!("ℹ️  {} 不需要登录", settings.server);
        return Ok(());
    }
    let username = match username {
        Some(username) => username,
        None => prompt::read_line("用户名")?,
    };
    let password = match password {
        Some(password) => password,
        None => rpassword::prompt_password("密码: ")?,
    };
    let token = session.backend().login(&username, &password).await?;
    settings.session_token = Some(token);
    settings.save_to(config_path)?;
    println!("🔑 登录成功，令牌已保存到 {}", config_path.display());
    Ok(())
}
