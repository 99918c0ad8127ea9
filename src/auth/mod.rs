/// 세션 협력자
/// 자격 증명을 사용자 신원으로 매핑하고 세션 쿠키를 발급/해석한다.
/// 해싱이나 쿠키 보안 강화는 코어 범위 밖이며, 데모 계정 체계
/// (user1..user40 / password1..password40)를 그대로 따른다.
// region:    --- Imports
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::info;

// endregion: --- Imports

// region:    --- Identity

pub const SESSION_COOKIE_NAME: &str = "meraki_session";
const SESSION_MAX_AGE_SECONDS: i64 = 60 * 60 * 24; // 24시간
const MAX_DEMO_USER: i64 = 40;

/// 인증된 사용자 신원
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Identity {
    pub id: i64,
    pub username: String,
}

// endregion: --- Identity

// region:    --- Auth Collaborator

/// 자격 증명 검증: userN / passwordN (N은 1..=40)
pub fn authenticate(username: &str, password: &str) -> Option<Identity> {
    let identity = identity_from_username(username)?;
    let expected_password = format!("password{}", identity.id);
    if password == expected_password {
        info!("{:<12} --> 로그인 성공: {}", "Auth", identity.username);
        Some(identity)
    } else {
        None
    }
}

/// 요청 헤더에서 현재 신원 추출. 세션이 없으면 None.
pub fn current_identity(headers: &HeaderMap) -> Option<Identity> {
    let session_value = session_cookie_value(headers)?;
    identity_from_username(&session_value)
}

/// 로그인 성공 시 내려줄 Set-Cookie 값
pub fn session_cookie(username: &str) -> String {
    format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}; SameSite=Lax",
        SESSION_COOKIE_NAME, username, SESSION_MAX_AGE_SECONDS
    )
}

/// 로그아웃 시 내려줄 Set-Cookie 값 (세션 제거)
pub fn clear_session_cookie() -> String {
    format!(
        "{}=; HttpOnly; Path=/; Max-Age=0; SameSite=Lax",
        SESSION_COOKIE_NAME
    )
}

/// Cookie 헤더에서 세션 값 파싱
fn session_cookie_value(headers: &HeaderMap) -> Option<String> {
    let cookie_header = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    for pair in cookie_header.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        let name = parts.next()?;
        if name == SESSION_COOKIE_NAME {
            return parts.next().map(|v| v.to_string());
        }
    }
    None
}

/// "userN" 형태의 사용자 이름을 신원으로 해석
fn identity_from_username(username: &str) -> Option<Identity> {
    let number = username.strip_prefix("user")?;
    let id = number.parse::<i64>().ok()?;
    if (1..=MAX_DEMO_USER).contains(&id) {
        Some(Identity {
            id,
            username: username.to_string(),
        })
    } else {
        None
    }
}

// endregion: --- Auth Collaborator

// endregion: --- Tests
