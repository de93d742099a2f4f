use std::time::Duration;

/// Builds the `Set-Cookie` value mirroring the bearer token for browser
/// clients. Always HttpOnly; Secure + SameSite=None only behind https,
/// since browsers refuse Secure cookies on plain http origins.
pub fn jwt_cookie(token: &str, max_age: Duration, secure: bool) -> String {
    let mut cookie = format!("jwt={}; Path=/; Max-Age={}; HttpOnly", token, max_age.as_secs());
    if secure {
        cookie.push_str("; Secure; SameSite=None");
    } else {
        cookie.push_str("; SameSite=Lax");
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_cookie_is_httponly_and_lax() {
        let cookie = jwt_cookie("abc.def.ghi", Duration::from_secs(3600), false);
        assert!(cookie.starts_with("jwt=abc.def.ghi; "));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(!cookie.contains("Secure"));
        assert!(cookie.contains("Max-Age=3600"));
    }

    #[test]
    fn production_cookie_is_secure_cross_site() {
        let cookie = jwt_cookie("t", Duration::from_secs(60), true);
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=None"));
        assert!(cookie.contains("HttpOnly"));
    }
}
