//! 管理操作
//!
//! 别名重新生成、延长过期时间、下载次数限制、遗忘与撤销，
//! 以及执行前需要用户确认的提示文本。

use crate::format::{plural, title_case};
use std::fmt;
use std::str::FromStr;

/// 重新生成哪一侧的别名
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasKind {
    Short,
    Long,
    Both,
}

impl AliasKind {
    pub fn touches_short(self) -> bool {
        matches!(self, AliasKind::Short | AliasKind::Both)
    }

    pub fn touches_long(self) -> bool {
        matches!(self, AliasKind::Long | AliasKind::Both)
    }

    /// 请求路径后缀，`Both` 没有后缀
    pub fn path_suffix(self) -> Option<&'static str> {
        match self {
            AliasKind::Short => Some("short"),
            AliasKind::Long => Some("long"),
            AliasKind::Both => None,
        }
    }

    fn noun(self) -> &'static str {
        match self {
            AliasKind::Both => "new aliases",
            _ => "a new alias",
        }
    }
}

impl FromStr for AliasKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "short" => Ok(AliasKind::Short),
            "long" => Ok(AliasKind::Long),
            "both" => Ok(AliasKind::Both),
            other => Err(format!("unknown alias kind: {other}")),
        }
    }
}

impl fmt::Display for AliasKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AliasKind::Short => f.write_str("short"),
            AliasKind::Long => f.write_str("long"),
            AliasKind::Both => f.write_str("both"),
        }
    }
}

/// 延长过期时间的目标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendTarget {
    /// 重置为初始时长
    Initial,
    /// 设置为允许的最大时长
    Max,
    /// 从现在起的秒数，上限由服务端按 `allowed.seconds` 强制
    Seconds(u64),
}

impl ExtendTarget {
    pub fn path_segment(self) -> String {
        match self {
            ExtendTarget::Initial => "initial".to_string(),
            ExtendTarget::Max => "max".to_string(),
            ExtendTarget::Seconds(s) => s.to_string(),
        }
    }
}

impl FromStr for ExtendTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial" => Ok(ExtendTarget::Initial),
            "max" => Ok(ExtendTarget::Max),
            other => other
                .parse::<u64>()
                .map(ExtendTarget::Seconds)
                .map_err(|_| format!("expected 'initial', 'max' or a number of seconds, got {other}")),
        }
    }
}

/// 需要确认的操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    RegenerateAlias(AliasKind),
    Extend {
        target: ExtendTarget,
        label: Option<String>,
    },
    Forget,
    Revoke,
    ClearSession,
}

impl Prompt {
    pub fn message(&self) -> String {
        match self {
            Prompt::RegenerateAlias(kind) => format!(
                "Generating {} will make all people with a current link unable to access it. Confirm?",
                kind.noun()
            ),
            Prompt::Extend {
                target: ExtendTarget::Initial,
                ..
            } => "Extending this file will try to reset its duration to its initial one, which will still count toward your quota. Confirm?".to_string(),
            Prompt::Extend {
                target: ExtendTarget::Max,
                ..
            } => "Extending this file will try to set its duration to its maximum, which will still count toward your quota. Confirm?".to_string(),
            Prompt::Extend {
                target: ExtendTarget::Seconds(seconds),
                label,
            } => format!(
                "Extending this file will try to set its duration to {}, which will still count toward your quota. Confirm?",
                label.clone().unwrap_or_else(|| format!("{seconds} {}", plural("second", *seconds)))
            ),
            Prompt::Forget => {
                "Forgetting this file will still count toward your quota. Confirm?".to_string()
            }
            Prompt::Revoke => {
                "Revoking this file will make all people with a link unable to access it. Confirm?"
                    .to_string()
            }
            Prompt::ClearSession => "You are about to clear all your files, but they will still count toward your quota. Confirm?".to_string(),
        }
    }
}

/// 用户确认
///
/// 所有修改类管理操作在发出网络请求之前都会询问一次。
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &Prompt) -> bool;
}

/// 总是同意（`--yes` 或测试）
pub struct AlwaysConfirm;

impl Confirm for AlwaysConfirm {
    fn confirm(&self, _prompt: &Prompt) -> bool {
        true
    }
}

/// 延长菜单中的一个预设时长
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionChoice {
    pub unit: &'static str,
    pub seconds: u64,
    pub label: String,
}

const EXTENSION_GROUPS: &[(&str, u64, &[u64])] = &[
    ("second", 1, &[15, 30, 45]),
    ("minute", 60, &[1, 2, 3, 5, 10, 15, 30, 45]),
    ("hour", 60 * 60, &[1, 2, 3, 6, 12]),
    ("day", 60 * 60 * 24, &[1, 2, 3, 7, 14, 21]),
    ("month", 60 * 60 * 24 * 30, &[1, 2, 3, 6, 9]),
    ("year", 60 * 60 * 24 * 365, &[1, 2, 3, 5]),
];

/// 按单位分组的菜单阈值：允许时长超过两分钟时才按单位分组显示
pub const GROUPED_MENU_THRESHOLD_SECS: u64 = 2 * 60;

/// 列出不超过 `allowed_seconds` 的预设时长
///
/// 遇到第一个超出上限的值即停止，后续分组不再枚举。
pub fn extension_choices(allowed_seconds: u64) -> Vec<ExtensionChoice> {
    let mut choices = Vec::new();
    for (unit, factor, values) in EXTENSION_GROUPS {
        for v in *values {
            let seconds = factor * v;
            if seconds > allowed_seconds {
                return choices;
            }
            choices.push(ExtensionChoice {
                unit: *unit,
                seconds,
                label: format!("{v} {}", plural(unit, *v)),
            });
        }
    }
    choices
}

/// 按单位分组，组名为首字母大写的单位名
pub fn grouped_extension_choices(allowed_seconds: u64) -> Vec<(String, Vec<ExtensionChoice>)> {
    let mut groups: Vec<(String, Vec<ExtensionChoice>)> = Vec::new();
    for choice in extension_choices(allowed_seconds) {
        let name = title_case(choice.unit);
        if let Some((last, items)) = groups.last_mut() {
            if *last == name {
                items.push(choice);
                continue;
            }
        }
        groups.push((name, vec![choice]));
    }
    groups
}

/// 下载次数限制预设，0 表示不限
pub const DOWNLOAD_LIMITS: [u16; 7] = [1, 3, 5, 10, 25, 100, 0];

pub fn download_limit_label(count: u16) -> String {
    if count == 0 {
        "Unlimited".to_string()
    } else {
        format!("{count} {}", plural("download", u64::from(count)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_choices_bounded() {
        let choices = extension_choices(7200);
        let last = choices.last().unwrap();
        assert_eq!(last.seconds, 7200);
        assert_eq!(last.label, "2 hours");
        assert!(choices.iter().all(|c| c.seconds <= 7200));
        assert_eq!(choices[0].label, "15 seconds");
    }

    #[test]
    fn test_extension_choices_stop_at_first_overflow() {
        // 100 秒: 15/30/45 秒, 1 分钟, 然后 2 分钟超出
        let choices = extension_choices(100);
        let labels: Vec<_> = choices.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, ["15 seconds", "30 seconds", "45 seconds", "1 minute"]);
    }

    #[test]
    fn test_grouped_choices() {
        let groups = grouped_extension_choices(60 * 60 * 24);
        let names: Vec<_> = groups.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["Second", "Minute", "Hour", "Day"]);
        assert_eq!(groups[3].1.len(), 1);
    }

    #[test]
    fn test_extend_target_parse() {
        assert_eq!("max".parse::<ExtendTarget>(), Ok(ExtendTarget::Max));
        assert_eq!("3600".parse::<ExtendTarget>(), Ok(ExtendTarget::Seconds(3600)));
        assert!("soon".parse::<ExtendTarget>().is_err());
        assert_eq!(ExtendTarget::Seconds(60).path_segment(), "60");
    }

    #[test]
    fn test_alias_kind_suffix() {
        assert_eq!(AliasKind::Short.path_suffix(), Some("short"));
        assert_eq!(AliasKind::Both.path_suffix(), None);
        assert!(AliasKind::Both.touches_short() && AliasKind::Both.touches_long());
    }

    #[test]
    fn test_prompt_messages() {
        assert!(
            Prompt::RegenerateAlias(AliasKind::Both)
                .message()
                .starts_with("Generating new aliases will")
        );
        let extend = Prompt::Extend {
            target: ExtendTarget::Seconds(3600),
            label: Some("1 hour".to_string()),
        };
        assert!(extend.message().contains("to 1 hour,"));
    }

    #[test]
    fn test_download_limit_labels() {
        assert_eq!(download_limit_label(0), "Unlimited");
        assert_eq!(download_limit_label(1), "1 download");
        assert_eq!(download_limit_label(25), "25 downloads");
    }
}
