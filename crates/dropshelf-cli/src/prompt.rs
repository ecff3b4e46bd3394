//! 终端交互：确认提示与上传进度

use dropshelf_core::{Confirm, Prompt, UploadProgress};
use std::io::{self, BufRead, Write};

/// 从标准输入读取 y/N
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &Prompt) -> bool {
        print!("❓ {} [y/N] ", prompt.message());
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        is_yes(&answer)
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// 读取一行输入（登录用户名）
pub fn read_line(label: &str) -> anyhow::Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// 在同一行刷新上传百分比
pub struct ProgressPrinter {
    name: String,
}

impl ProgressPrinter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl UploadProgress for ProgressPrinter {
    fn on_progress(&self, sent: u64, total: u64) {
        let percent = dropshelf_core::upload::fraction(sent, total) * 100.0;
        eprint!("\r   ⏳ {} {:>5.1}%", self.name, percent);
        if sent >= total {
            eprintln!();
        }
    }
}
