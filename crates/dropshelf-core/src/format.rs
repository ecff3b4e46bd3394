//! 显示辅助函数

use crate::record::FileRecord;

/// 首字母大写
pub fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `n >= 2` 时加复数后缀
pub fn plural(word: &str, n: u64) -> String {
    if n >= 2 {
        format!("{word}s")
    } else {
        word.to_string()
    }
}

/// 千位分组: 1234567 -> "1,234,567"
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// 大小的两种显示格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeFormat {
    #[default]
    Readable,
    Bytes,
}

impl SizeFormat {
    pub fn toggle(self) -> Self {
        match self {
            SizeFormat::Readable => SizeFormat::Bytes,
            SizeFormat::Bytes => SizeFormat::Readable,
        }
    }

    pub fn render(self, record: &FileRecord) -> String {
        match self {
            SizeFormat::Readable => record.size.readable.clone(),
            SizeFormat::Bytes => format!("{} B", group_thousands(record.size.bytes)),
        }
    }
}

/// 过期时间的两种显示格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpirationFormat {
    #[default]
    Duration,
    Date,
}

impl ExpirationFormat {
    pub fn toggle(self) -> Self {
        match self {
            ExpirationFormat::Duration => ExpirationFormat::Date,
            ExpirationFormat::Date => ExpirationFormat::Duration,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExpirationFormat::Duration => "Duration",
            ExpirationFormat::Date => "Expiration",
        }
    }

    pub fn render(self, record: &FileRecord) -> String {
        let current = &record.expiration.current;
        match self {
            ExpirationFormat::Duration => current.duration.readable.clone(),
            ExpirationFormat::Date => current.date.readable.clone(),
        }
    }
}
