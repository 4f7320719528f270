// ==========================================
// 国际化 (i18n) 模块
// ==========================================
// 使用 rust-i18n 库
// 支持阿拉伯语（默认）和英文
// ==========================================
// 注意: rust_i18n::i18n! 宏已在 lib.rs 中初始化
// ==========================================

/// 默认语言
pub const DEFAULT_LOCALE: &str = "ar";

/// 获取当前语言
pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// 设置语言
///
/// # 参数
/// - locale: 语言代码（"ar" 或 "en"）
pub fn set_locale(locale: &str) {
    rust_i18n::set_locale(locale);
}

/// 翻译消息（无参数）
///
/// # 示例
/// ```no_run
/// use textile_stock::i18n::t;
/// let msg = t("reconciliation.nothing_to_save");
/// ```
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// 翻译消息（带参数，占位符形如 `%{name}`）
///
/// # 示例
/// ```no_run
/// use textile_stock::i18n::t_with_args;
/// let msg = t_with_args("reconciliation.committed", &[("count", "3")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    let mut result = rust_i18n::t!(key).to_string();
    for (k, v) in args {
        let placeholder = format!("%{{{}}}", k);
        result = result.replace(&placeholder, v);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // locale 为全局状态，测试默认并行执行，这里串行化
    static LOCALE_TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_set_locale() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("en");
        assert_eq!(current_locale(), "en");

        set_locale(DEFAULT_LOCALE);
        assert_eq!(current_locale(), "ar");
    }

    #[test]
    fn test_translate_simple() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("en");
        assert_eq!(t("reconciliation.nothing_to_save"), "Nothing to save");

        set_locale("ar");
        assert_eq!(t("unit.kg"), "كغ");
        assert_eq!(t("unit.m"), "متر");

        set_locale(DEFAULT_LOCALE);
    }

    #[test]
    fn test_translate_with_args() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("en");
        let msg = t_with_args(
            "import.summary",
            &[
                ("inserted", "4"),
                ("skipped", "1"),
                ("failed", "0"),
                ("img_ok", "3"),
                ("img_fail", "1"),
            ],
        );
        assert!(msg.contains("Inserted 4"));
        assert!(msg.contains("3 ok"));
        assert!(!msg.contains("%{"));

        set_locale(DEFAULT_LOCALE);
    }
}
