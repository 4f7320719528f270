// ==========================================
// 纺织品库存台账系统 - 文本规范化
// ==========================================
// 职责: 输入清洗与自然键规范化的纯函数
// 红线: 自然键比较只经过 normalize_key_part，禁止拼接分隔符字符串
// ==========================================

/// 去首尾空白并把连续空白折叠为一个空格
pub fn clean_text(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 阿拉伯-印度数字（٠-٩）及扩展形式（۰-۹）转为 ASCII 数字
pub fn normalize_arabic_digits(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
            '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
            _ => c,
        })
        .collect()
}

/// 自然键字段规范化：清洗空白 + 数字归一 + 小写
pub fn normalize_key_part(value: &str) -> String {
    normalize_arabic_digits(&clean_text(value)).to_lowercase()
}

/// 可选文本：清洗后为空视为缺失
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(clean_text).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  قطن \t  ممشط \n"), "قطن ممشط");
        assert_eq!(clean_text("   "), "");
    }

    #[test]
    fn test_normalize_arabic_digits() {
        assert_eq!(normalize_arabic_digits("C-١٢٣"), "C-123");
        assert_eq!(normalize_arabic_digits("۴۵"), "45");
    }

    #[test]
    fn test_normalize_key_part() {
        assert_eq!(normalize_key_part("  Red   A١ "), "red a1");
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  ")), None);
        assert_eq!(non_empty(Some(" x ")), Some("x".to_string()));
        assert_eq!(non_empty(None), None);
    }
}
