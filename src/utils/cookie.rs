use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::core::constants::{ACCESS_TOKEN_COOKIE, CSRF_COOKIE};

/// Access Token Cookie：HttpOnly，前端脚本不可读
pub fn access_token_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((ACCESS_TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// CSRF Cookie：前端需要读取后放进 X-CSRF-Token 头，因此不能 HttpOnly
pub fn csrf_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((CSRF_COOKIE, token))
        .path("/")
        .http_only(false)
        .secure(secure)
        .same_site(SameSite::Strict)
        .build()
}

/// 登出时清除会话相关 Cookie
pub fn clear_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ACCESS_TOKEN_COOKIE).path("/"))
        .remove(Cookie::build(CSRF_COOKIE).path("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_cookie_is_http_only() {
        let cookie = access_token_cookie("jwt".to_string(), true);
        assert_eq!(cookie.name(), ACCESS_TOKEN_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
    }

    #[test]
    fn csrf_cookie_is_readable_by_scripts() {
        let cookie = csrf_cookie("tok".to_string(), false);
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.http_only(), Some(false));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
    }
}
