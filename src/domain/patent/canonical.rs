//! Patent Context - 专利号码规范化

/// 计算与数据库无关的规范专利号
///
/// 规则:
/// 1. 去掉最后一个 `:` 之前的数据库前缀
/// 2. 只保留 ASCII 字母与数字，并转为大写
/// 3. 若结尾为紧跟数字之后的公开种类代码（一个字母，可再跟一个数字），将其去除
///
/// 国家代码被保留，不同国家的相同序号不会被合并。
pub fn canonical_number(raw: &str) -> String {
    let unqualified = match raw.rfind(':') {
        Some(pos) => &raw[pos + 1..],
        None => raw,
    };

    let mut chars: Vec<char> = unqualified
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let kind_code_len = match chars.as_slice() {
        [.., a, b, c] if a.is_ascii_digit() && b.is_ascii_alphabetic() && c.is_ascii_digit() => 2,
        [.., a, b] if a.is_ascii_digit() && b.is_ascii_alphabetic() => 1,
        _ => 0,
    };
    chars.truncate(chars.len() - kind_code_len);

    chars.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_qualifier_and_kind_code() {
        assert_eq!(canonical_number("USPTO:US 10,123,456 B2"), "US10123456");
        assert_eq!(canonical_number("twpat:TW I-654321 B"), "TWI654321");
        assert_eq!(canonical_number("EPO:EP3456789A1"), "EP3456789");
    }

    #[test]
    fn test_same_patent_from_different_databases() {
        assert_eq!(
            canonical_number("USPTO:US10123456B2"),
            canonical_number("epo:us-10123456")
        );
    }

    #[test]
    fn test_country_prefix_is_kept() {
        assert_ne!(canonical_number("US1234567"), canonical_number("JP1234567"));
    }

    #[test]
    fn test_without_kind_code_or_qualifier() {
        assert_eq!(canonical_number("wo2020123456"), "WO2020123456");
        assert_eq!(canonical_number("B2"), "B2");
        assert_eq!(canonical_number(""), "");
    }
}
