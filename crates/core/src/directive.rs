//! 레거시 지시어 파일 리더
//!
//! 한 줄에 하나의 `$Name argument` 지시어를 담는 레거시 설정 형식을 읽습니다.
//! 지시어 이름의 의미 해석은 각 입력 모듈이 담당하며, 여기서는 줄 단위 분해만 합니다.
//!
//! ```text
//! # 주석
//! $KLogPermitNonKernelFacility on
//! $KLogInternalMsgFacility local0
//! $ResetConfigVariables
//! ```

use std::path::Path;

use crate::error::{ConfigError, KernlogError};

/// 파싱된 지시어 한 줄
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveLine {
    /// 1부터 시작하는 줄 번호
    pub line: usize,
    /// `$` 뒤의 지시어 이름 (원문 대소문자 유지)
    pub name: String,
    /// 인자 (없으면 빈 문자열)
    pub argument: String,
}

/// 지시어 한 줄을 파싱합니다.
///
/// 빈 줄, `#` 주석, `$`로 시작하지 않는 줄은 `Ok(None)`을 반환합니다.
/// 인자 뒤에 붙은 `#` 주석은 제거됩니다.
pub fn parse_directive_line(line_no: usize, raw: &str) -> Result<Option<DirectiveLine>, ConfigError> {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix('$') else {
        return Ok(None);
    };

    let (name, argument) = match rest.find(char::is_whitespace) {
        Some(idx) => (&rest[..idx], rest[idx..].trim_start()),
        None => (rest, ""),
    };

    if name.is_empty() {
        return Err(ConfigError::MalformedDirective {
            line: line_no,
            reason: "missing directive name after '$'".to_owned(),
        });
    }

    let argument = match argument.find('#') {
        Some(idx) => argument[..idx].trim_end(),
        None => argument,
    };

    Ok(Some(DirectiveLine {
        line: line_no,
        name: name.to_owned(),
        argument: argument.to_owned(),
    }))
}

/// 지시어 문서 전체를 파싱합니다.
pub fn parse_directives(content: &str) -> Result<Vec<DirectiveLine>, ConfigError> {
    let mut directives = Vec::new();
    for (idx, raw) in content.lines().enumerate() {
        if let Some(directive) = parse_directive_line(idx + 1, raw)? {
            directives.push(directive);
        }
    }
    Ok(directives)
}

/// 파일에서 지시어를 읽습니다.
pub async fn load_directives(path: impl AsRef<Path>) -> Result<Vec<DirectiveLine>, KernlogError> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            KernlogError::Config(ConfigError::FileNotFound {
                path: path.display().to_string(),
            })
        } else {
            KernlogError::Io(e)
        }
    })?;
    Ok(parse_directives(&content)?)
}
