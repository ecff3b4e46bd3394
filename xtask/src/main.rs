use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use xshell::{Shell, cmd};

#[derive(Parser)]
#[command(name = "xtask", about = "Dropshelf 开发任务自动化")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 构建命令行客户端 (release)
    Build,
    /// 以开发模式运行 watch，连接本地服务器
    Dev {
        /// 服务器地址
        #[arg(short, long, default_value = "http://localhost:8080")]
        server: String,
        /// 日志级别 (trace, debug, info, warn, error)
        #[arg(short, long, default_value = "debug")]
        log_level: String,
    },
    /// 安装 dropshelf 到 ~/.cargo/bin
    Install,
    /// 卸载 dropshelf
    Uninstall,
    /// 打包发布 (tar.gz)
    Dist,
    /// 格式检查与 clippy
    Lint,
    /// 运行测试
    Test,
    /// 运行测试并生成覆盖率报告
    Coverage,
    /// 清理构建产物
    Clean,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;

    // 确保在项目根目录执行
    let project_root = match std::env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir)
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
        Err(_) => std::env::current_dir()?,
    };
    sh.change_dir(&project_root);

    match cli.command {
        Commands::Build => build(&sh)?,
        Commands::Dev { server, log_level } => dev(&sh, &server, &log_level)?,
        Commands::Install => install(&sh)?,
        Commands::Uninstall => uninstall(&sh)?,
        Commands::Dist => dist(&sh)?,
        Commands::Lint => lint(&sh)?,
        Commands::Test => test(&sh)?,
        Commands::Coverage => coverage(&sh)?,
        Commands::Clean => clean(&sh)?,
    }

    Ok(())
}

fn build(sh: &Shell) -> Result<()> {
    println!("🔨 构建 dropshelf...");
    cmd!(sh, "cargo build --release -p dropshelf-cli").run()?;
    println!("✅ 构建完成: target/release/dropshelf");
    Ok(())
}

fn dev(sh: &Shell, server: &str, log_level: &str) -> Result<()> {
    println!("🚀 开发模式 (服务器: {server}, 日志级别: {log_level})");
    cmd!(
        sh,
        "cargo run -p dropshelf-cli -- --server {server} --log-level {log_level} watch"
    )
    .run()?;
    Ok(())
}

fn install(sh: &Shell) -> Result<()> {
    println!("📦 安装 dropshelf...");
    cmd!(sh, "cargo install --path crates/dropshelf-cli --locked").run()?;
    println!("✅ 安装完成");
    println!("   使用 'dropshelf --help' 查看命令");
    println!("   使用 'dropshelf login' 登录需要认证的服务器");
    Ok(())
}

fn uninstall(sh: &Shell) -> Result<()> {
    println!("🗑️  卸载 dropshelf...");
    cmd!(sh, "cargo uninstall dropshelf-cli").run()?;
    println!("✅ 卸载完成");
    println!("   配置与文件列表快照保留在用户目录中");
    Ok(())
}

fn dist(sh: &Shell) -> Result<()> {
    println!("📦 打包发布...");

    build(sh)?;

    let version = env!("CARGO_PKG_VERSION");
    let dist_name = format!("dropshelf-{version}-{}", std::env::consts::ARCH);

    sh.create_dir(format!("dist/{dist_name}"))?;
    sh.copy_file("target/release/dropshelf", format!("dist/{dist_name}/"))?;
    if sh.path_exists("README.md") {
        sh.copy_file("README.md", format!("dist/{dist_name}/"))?;
    }

    sh.change_dir("dist");
    cmd!(sh, "tar -czvf {dist_name}.tar.gz {dist_name}").run()?;

    println!("✅ 打包完成: dist/{dist_name}.tar.gz");
    Ok(())
}

fn lint(sh: &Shell) -> Result<()> {
    println!("🔍 检查代码...");
    cmd!(sh, "cargo fmt --all -- --check").run()?;
    cmd!(sh, "cargo clippy --workspace --all-targets").run()?;
    println!("✅ 检查通过");
    Ok(())
}

fn test(sh: &Shell) -> Result<()> {
    println!("🧪 运行测试...");
    cmd!(sh, "cargo test --workspace").run()?;
    println!("✅ 测试完成");
    Ok(())
}

fn coverage(sh: &Shell) -> Result<()> {
    println!("📊 运行测试覆盖率分析...");

    // 检查 cargo-tarpaulin 是否安装
    if cmd!(sh, "cargo tarpaulin --version").run().is_err() {
        println!("📦 安装 cargo-tarpaulin...");
        cmd!(sh, "cargo install cargo-tarpaulin").run()?;
    }

    println!("🔍 分析中...");
    cmd!(
        sh,
        "cargo tarpaulin --packages dropshelf-core --out Html --output-dir target/coverage"
    )
    .run()?;

    println!("✅ 覆盖率报告已生成");
    println!("   HTML 报告: target/coverage/tarpaulin-report.html");
    Ok(())
}

fn clean(sh: &Shell) -> Result<()> {
    println!("🧹 清理构建产物...");
    cmd!(sh, "cargo clean").run()?;
    sh.remove_path("dist")?;
    println!("✅ 清理完成");
    Ok(())
}
