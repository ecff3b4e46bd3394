//! 文件列表的终端渲染

use dropshelf_core::format::{ExpirationFormat, SizeFormat, title_case};
use dropshelf_core::{
    Affordances, DOWNLOAD_LIMITS, EntryState, FileEntry, Session, StoreEvent,
    download_limit_label, grouped_extension_choices,
};
use qrcode::QrCode;
use qrcode::render::unicode::Dense1x2;

#[derive(Debug, Clone, Copy, Default)]
pub struct ViewOptions {
    pub size: SizeFormat,
    pub expiration: ExpirationFormat,
}

fn state_icon(state: &EntryState) -> &'static str {
    match state {
        EntryState::Upload { .. } => "⏳",
        EntryState::Available => "✅",
        EntryState::Error { .. } => "❌",
        EntryState::Expired { .. } => "⌛",
    }
}

/// 单个条目的显示文本（可能多行）
pub fn render_entry(index: usize, entry: &FileEntry, options: ViewOptions) -> String {
    let state = entry.state();
    let mut out = format!(
        "[{}] {} {} ({})",
        index + 1,
        state_icon(state),
        entry.name(),
        state.label()
    );
    match state {
        EntryState::Upload { progress } => {
            out.push_str(&format!("\n      进度: {:.1}%", progress * 100.0));
        }
        EntryState::Error { message } => {
            out.push_str(&format!("\n      错误: {}", title_case(message)));
        }
        EntryState::Available | EntryState::Expired { .. } => {
            if let Some(record) = entry.record() {
                out.push_str(&format!(
                    "\n      链接: {}  |  {}",
                    record.link.short, record.link.long
                ));
                out.push_str(&format!(
                    "\n      大小: {}  |  {}: {}",
                    options.size.render(record),
                    options.expiration.label(),
                    options.expiration.render(record)
                ));
            }
        }
    }
    out
}

pub fn print_entries(entries: &[FileEntry], options: ViewOptions) {
    if entries.is_empty() {
        println!("   (没有文件)");
        return;
    }
    for (index, entry) in entries.iter().enumerate() {
        println!("{}", render_entry(index, entry, options));
    }
}

/// 终端二维码（浅色模块在深色背景上）
pub fn render_qr(data: &str) -> anyhow::Result<String> {
    let code = QrCode::new(data.as_bytes())?;
    Ok(code
        .render::<Dense1x2>()
        .dark_color(Dense1x2::Light)
        .light_color(Dense1x2::Dark)
        .build())
}

/// 与 [`print_entries`] 相同，可用文件额外附带短链接二维码
pub fn print_entries_with_qr(entries: &[FileEntry], options: ViewOptions) {
    if entries.is_empty() {
        println!("   (没有文件)");
        return;
    }
    for (index, entry) in entries.iter().enumerate() {
        println!("{}", render_entry(index, entry, options));
        let Some(record) = entry.record().filter(|_| entry.is_available()) else {
            continue;
        };
        match render_qr(&record.link.short) {
            Ok(qr) => println!("{qr}"),
            Err(e) => tracing::warn!("Could not render QR code for {}: {}", record.link.short, e),
        }
    }
}

pub fn print_affordances(affordances: &Affordances, server: &str) {
    if affordances.has_availables {
        println!("📦 打包下载: {}", affordances.archive_link(server));
    }
}

/// `watch` 模式下的变化通知
pub fn print_event(session: &Session, event: &StoreEvent, options: ViewOptions) {
    match event {
        StoreEvent::Added(id) | StoreEvent::Changed(id) => {
            let entries = session.entries();
            if let Some(index) = entries.iter().position(|e| e.id() == *id) {
                println!("{}", render_entry(index, &entries[index], options));
            }
        }
        StoreEvent::Removed(id) => println!("🗑️  已移除 {id}"),
        StoreEvent::Cleared => println!("🧹 列表已清空"),
    }
}

/// 延长时长与下载次数的可选值
pub fn print_choices(entry: &FileEntry) {
    let Some(record) = entry.record() else {
        println!("   该条目还没有服务端信息");
        return;
    };
    let allowed = record.expiration.allowed.seconds;
    println!("⏱️  延长选项 (最长 {allowed} 秒):");
    println!("   initial  重置为初始时长");
    println!("   max      设置为最大时长");
    for (group, choices) in grouped_extension_choices(allowed) {
        let items: Vec<String> = choices
            .iter()
            .map(|c| format!("{} ({}s)", c.label, c.seconds))
            .collect();
        println!("   {group}: {}", items.join(", "));
    }
    let limits: Vec<String> = DOWNLOAD_LIMITS
        .iter()
        .map(|n| format!("{n}={}", download_limit_label(*n)))
        .collect();
    println!("⬇️  下载次数: {}", limits.join(", "));
}

#[cfg(test)]
mod tests {
    use super::*;
    use dropshelf_core::record::{
        Aliases, AllowedExpiration, CurrentExpiration, Expiration, ExpirationDate,
        ExpirationDuration, Links, Size,
    };
    use dropshelf_core::{EntryId, FileRecord};

    fn record() -> FileRecord {
        FileRecord {
            name: "a.txt".to_string(),
            alias: Aliases {
                short: "abc".to_string(),
                long: "long-abc".to_string(),
            },
            link: Links {
                short: "http://drop.local/abc".to_string(),
                long: "http://drop.local/long-abc".to_string(),
            },
            size: Size {
                bytes: 12345,
                readable: "12.3 kB".to_string(),
            },
            expiration: Expiration {
                current: CurrentExpiration {
                    date: ExpirationDate {
                        timestamp: 0,
                        readable: "2026-10-20 10:00".to_string(),
                    },
                    duration: ExpirationDuration {
                        readable: "in 1h".to_string(),
                        seconds: None,
                    },
                },
                allowed: AllowedExpiration { seconds: 7200 },
            },
            admin_token: "admin".to_string(),
        }
    }

    #[test]
    fn test_render_available() {
        let entry = FileEntry::from_record(EntryId::from(1), record());
        let text = render_entry(0, &entry, ViewOptions::default());
        assert!(text.starts_with("[1] ✅ a.txt (Available)"));
        assert!(text.contains("http://drop.local/abc  |  http://drop.local/long-abc"));
        assert!(text.contains("12.3 kB"));
        assert!(text.contains("Duration: in 1h"));
    }

    #[test]
    fn test_render_error_title_cased() {
        let mut entry = FileEntry::pending(EntryId::from(2), "big.bin", "/tmp/big.bin");
        entry.fail_upload("file too large").unwrap();
        let text = render_entry(1, &entry, ViewOptions::default());
        assert!(text.starts_with("[2] ❌ big.bin (Error)"));
        assert!(text.ends_with("错误: File too large"));
    }

    #[test]
    fn test_render_bytes_and_date() {
        let entry = FileEntry::from_record(EntryId::from(1), record());
        let options = ViewOptions {
            size: SizeFormat::Bytes,
            expiration: ExpirationFormat::Date,
        };
        let text = render_entry(2, &entry, options);
        assert!(text.starts_with("[3]"));
        assert!(text.contains("12,345 B"));
        assert!(text.contains("Expiration: 2026-10-20 10:00"));
    }

    #[test]
    fn test_render_qr_is_square_block() {
        let qr = render_qr("http://drop.local/abc").unwrap();
        let widths: Vec<usize> = qr.lines().map(|l| l.chars().count()).collect();
        assert!(widths.len() > 10);
        assert!(widths.iter().all(|w| *w == widths[0]));
        assert!(qr.contains('█') || qr.contains('▀') || qr.contains('▄'));
    }
}
