//! PRI 파서: `<facility*8+severity>` 접두어 추출과 이중 PRI 판별
//!
//! 커널 메시지는 `<6>eth0: link up`처럼 PRI로 시작합니다. systemd 등
//! 사용자 공간 프로그램이 `/dev/kmsg`에 쓴 메시지는 커널이 붙인 바깥 PRI 뒤에
//! 원래 PRI가 한 번 더 나타납니다.
//!
//! ```text
//! <6><30>systemd[1]: Started Session 1.      ← 3바이트 위치에 내부 PRI
//! <6> <30>systemd[1]: Started Session 1.     ← 공백 뒤 4바이트 위치에 내부 PRI
//! ```
//!
//! 내부 PRI가 `[8, 192]` 범위이면 내부 값을 사용하고 두 PRI를 모두 제거합니다.
//! 범위 검사는 내부 PRI에만 적용되며 바깥 PRI는 문법만 검사합니다.

use std::fmt;

use crate::error::InputError;

/// 내부(두 번째) PRI로 인정하는 최솟값 (커널 facility 제외)
pub const SECONDARY_PRI_MIN: u32 = 8;

/// 내부(두 번째) PRI로 인정하는 최댓값
pub const SECONDARY_PRI_MAX: u32 = 192;

/// 줄 선두에서 `<digits>` 형식의 PRI를 파싱합니다.
///
/// 성공하면 값을 반환하고 `cursor`를 `>` 다음으로 옮깁니다.
/// 실패하면 `cursor`는 변경되지 않습니다.
///
/// 자릿수 제한은 없으며 선행 0도 허용합니다. `u32` 범위를 넘는 값은 `u32::MAX`로 포화됩니다.
pub fn parse_pri(cursor: &mut &[u8]) -> Result<u32, InputError> {
    let input = *cursor;

    if input.first() != Some(&b'<') {
        return Err(InputError::InvalidPriFormat {
            offset: 0,
            reason: "expected '<'",
        });
    }

    let digits = input[1..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits == 0 {
        return Err(InputError::InvalidPriFormat {
            offset: 1,
            reason: "expected digit after '<'",
        });
    }

    let close = 1 + digits;
    if input.get(close) != Some(&b'>') {
        return Err(InputError::InvalidPriFormat {
            offset: close,
            reason: "expected '>' after digits",
        });
    }

    let value = input[1..close].iter().fold(0u32, |acc, b| {
        acc.saturating_mul(10).saturating_add(u32::from(b - b'0'))
    });

    *cursor = &input[close + 1..];
    Ok(value)
}

/// PRI 결정 출처
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriSource {
    /// 3(또는 4)바이트 위치의 내부 PRI
    Secondary,
    /// 줄 선두의 PRI
    Primary,
    /// PRI 없음, 드라이버 기본값 사용
    Default,
}

impl PriSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Secondary => "secondary",
            Self::Primary => "primary",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for PriSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 한 줄에 대한 PRI 결정 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriResolution {
    /// 결정된 PRI 값
    pub priority: u32,
    /// 페이로드 시작 바이트 오프셋 (소비된 PRI 제외)
    pub payload_offset: usize,
    /// 결정 출처
    pub source: PriSource,
}

/// 원시 줄에서 PRI를 결정합니다.
///
/// 1. 3바이트 위치가 `<`이거나, 3바이트 위치가 공백이고 4바이트 위치가 `<`이면
///    그 위치에서 PRI를 파싱합니다. 성공하고 값이 `[8, 192]`이면 그 값을 사용합니다.
/// 2. 그렇지 않으면 줄 선두에서 PRI를 파싱합니다.
/// 3. 둘 다 실패하면 `default_priority`를 사용하고 줄 전체가 페이로드가 됩니다.
pub fn resolve_priority(line: &[u8], default_priority: u32) -> PriResolution {
    let secondary_at = match (line.get(3), line.get(4)) {
        (Some(b'<'), _) => Some(3),
        (Some(b' '), Some(b'<')) => Some(4),
        _ => None,
    };

    if let Some(start) = secondary_at {
        let mut cursor = &line[start..];
        if let Ok(pri) = parse_pri(&mut cursor)
            && (SECONDARY_PRI_MIN..=SECONDARY_PRI_MAX).contains(&pri)
        {
            return PriResolution {
                priority: pri,
                payload_offset: line.len() - cursor.len(),
                source: PriSource::Secondary,
            };
        }
    }

    let mut cursor = line;
    match parse_pri(&mut cursor) {
        Ok(pri) => PriResolution {
            priority: pri,
            payload_offset: line.len() - cursor.len(),
            source: PriSource::Primary,
        },
        Err(_) => PriResolution {
            priority: default_priority,
            payload_offset: 0,
            source: PriSource::Default,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &[u8]) -> (Result<u32, InputError>, usize) {
        let mut cursor = input;
        let result = parse_pri(&mut cursor);
        (result, input.len() - cursor.len())
    }

    // ── parse_pri ──

    #[test]
    fn parses_simple_pri_and_advances_cursor() {
        let mut cursor: &[u8] = b"<5>kernel panic";
        assert_eq!(parse_pri(&mut cursor).unwrap(), 5);
        assert_eq!(cursor, b"kernel panic");
    }

    #[test]
    fn accepts_leading_zeros_and_long_digit_runs() {
        let (result, consumed) = parse(b"<0006>x");
        assert_eq!(result.unwrap(), 6);
        assert_eq!(consumed, 6);

        let (result, _) = parse(b"<99999999999999999999>x");
        assert_eq!(result.unwrap(), u32::MAX);
    }

    #[test]
    fn out_of_range_value_is_syntactically_valid() {
        let (result, _) = parse(b"<1000>x");
        assert_eq!(result.unwrap(), 1000);
    }

    #[test]
    fn rejects_missing_open_bracket() {
        let (result, consumed) = parse(b"5>oops");
        assert!(matches!(
            result,
            Err(InputError::InvalidPriFormat { offset: 0, .. })
        ));
        assert_eq!(consumed, 0);
    }

    #[test]
    fn rejects_non_digit_after_open_bracket() {
        let (result, _) = parse(b"<>x");
        assert!(matches!(
            result,
            Err(InputError::InvalidPriFormat { offset: 1, .. })
        ));
        let (result, _) = parse(b"<a>x");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_unterminated_digits() {
        let (result, consumed) = parse(b"<13");
        assert!(matches!(
            result,
            Err(InputError::InvalidPriFormat { offset: 3, .. })
        ));
        assert_eq!(consumed, 0);
        assert!(parse(b"<13 >x").0.is_err());
    }

    #[test]
    fn rejects_empty_input() {
        assert!(parse(b"").0.is_err());
        assert!(parse(b"<").0.is_err());
    }

    // ── resolve_priority ──

    #[test]
    fn primary_pri_is_used_and_stripped() {
        let line = b"<5>kernel panic";
        let r = resolve_priority(line, 14);
        assert_eq!(r.priority, 5);
        assert_eq!(r.source, PriSource::Primary);
        assert_eq!(&line[r.payload_offset..], b"kernel panic");
    }

    #[test]
    fn secondary_pri_at_offset_three_wins() {
        let line = b"<6><30>systemd[1]: Started";
        let r = resolve_priority(line, 14);
        assert_eq!(r.priority, 30);
        assert_eq!(r.source, PriSource::Secondary);
        assert_eq!(&line[r.payload_offset..], b"systemd[1]: Started");
    }

    #[test]
    fn secondary_pri_after_space_wins() {
        let line = b"<6> <30>systemd[1]: Started";
        let r = resolve_priority(line, 14);
        assert_eq!(r.priority, 30);
        assert_eq!(&line[r.payload_offset..], b"systemd[1]: Started");
    }

    #[test]
    fn secondary_band_is_inclusive() {
        assert_eq!(resolve_priority(b"<6><8>x", 14).priority, 8);
        assert_eq!(resolve_priority(b"<6><192>x", 14).priority, 192);
    }

    #[test]
    fn secondary_out_of_band_falls_back_to_primary() {
        let line = b"<6><7>low";
        let r = resolve_priority(line, 14);
        assert_eq!(r.priority, 6);
        assert_eq!(r.source, PriSource::Primary);
        assert_eq!(&line[r.payload_offset..], b"<7>low");

        let r = resolve_priority(b"<6><193>high", 14);
        assert_eq!(r.priority, 6);
    }

    #[test]
    fn malformed_secondary_falls_back_to_primary() {
        let line = b"<6><abc>x";
        let r = resolve_priority(line, 14);
        assert_eq!(r.priority, 6);
        assert_eq!(r.payload_offset, 3);
    }

    #[test]
    fn secondary_without_outer_pri_still_applies() {
        // 3바이트 위치만 검사하므로 바깥 PRI 유무와 무관
        let line = b"xxx<13>boot ok";
        let r = resolve_priority(line, 14);
        assert_eq!(r.priority, 13);
        assert_eq!(&line[r.payload_offset..], b"boot ok");
    }

    #[test]
    fn no_pri_anywhere_uses_default_and_full_text() {
        let line = b"xx<13>boot ok";
        let r = resolve_priority(line, 14);
        assert_eq!(r.priority, 14);
        assert_eq!(r.source, PriSource::Default);
        assert_eq!(r.payload_offset, 0);
    }

    #[test]
    fn short_lines_are_bounds_checked() {
        for line in [&b""[..], b"<", b"<6", b"<6>", b"<6> "] {
            let r = resolve_priority(line, 14);
            assert!(r.payload_offset <= line.len());
        }
        assert_eq!(resolve_priority(b"<6>", 14).priority, 6);
        assert_eq!(resolve_priority(b"abc", 14).priority, 14);
        assert_eq!(resolve_priority(b"<6> ", 14).priority, 6);
    }

    #[test]
    fn pri_source_display() {
        assert_eq!(PriSource::Secondary.to_string(), "secondary");
        assert_eq!(PriSource::Default.to_string(), "default");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn arbitrary_bytes_do_not_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
                let r = resolve_priority(&bytes, 14);
                prop_assert!(r.payload_offset <= bytes.len());
            }

            #[test]
            fn input_not_starting_with_lt_digit_fails(
                first in any::<u8>(),
                second in any::<u8>(),
                rest in prop::collection::vec(any::<u8>(), 0..64),
            ) {
                prop_assume!(first != b'<' || !second.is_ascii_digit());
                let mut input = vec![first, second];
                input.extend(rest);
                let mut cursor = &input[..];
                prop_assert!(parse_pri(&mut cursor).is_err());
            }

            #[test]
            fn well_formed_pri_yields_value_and_rest(n in 0u32..100_000, rest in ".{0,64}") {
                let raw = format!("<{n}>{rest}");
                let mut cursor = raw.as_bytes();
                prop_assert_eq!(parse_pri(&mut cursor).unwrap(), n);
                prop_assert_eq!(cursor, rest.as_bytes());
            }

            #[test]
            fn in_band_secondary_is_authoritative(
                outer in 0u32..1000,
                inner in SECONDARY_PRI_MIN..=SECONDARY_PRI_MAX,
                spaced in any::<bool>(),
                msg in "[a-z ]{0,32}",
            ) {
                // 바깥 PRI가 정확히 3바이트를 차지해야 함
                let outer = format!("<{}>", outer % 10);
                let sep = if spaced { " " } else { "" };
                let raw = format!("{outer}{sep}<{inner}>{msg}");
                let r = resolve_priority(raw.as_bytes(), 14);
                prop_assert_eq!(r.priority, inner);
                prop_assert_eq!(r.source, PriSource::Secondary);
                prop_assert_eq!(&raw.as_bytes()[r.payload_offset..], msg.as_bytes());
            }
        }
    }
}
